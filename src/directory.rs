// src/directory.rs
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use log::{debug, error, info, warn};
use reqwest::StatusCode;
use serde_json::Value;
use crate::config::Config;
use crate::models::server::{RawEntry, ServerRecord};
use crate::normalize::{is_address_query, normalize, Rejected};
use crate::view::LookupOutcome;

#[derive(Debug)]
pub enum DirectoryError {
    Transport(reqwest::Error),
    Status(StatusCode),
    Decode(String),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "directory request failed: {}", e),
            Self::Status(status) => write!(f, "directory responded with {}", status),
            Self::Decode(e) => write!(f, "directory sent an unreadable body: {}", e),
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Read-only client for the public server directory.
#[derive(Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
    listing_limit: usize,
}

impl DirectoryClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.directory_timeout_secs))
            .user_agent(concat!("sampweb/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.directory_base_url.trim_end_matches('/').to_string(),
            listing_limit: config.listing_limit,
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value, DirectoryError> {
        let response = self.http.get(url).send().await.map_err(DirectoryError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))
    }

    pub async fn fetch_listing(&self) -> Result<Vec<ServerRecord>, DirectoryError> {
        let body = self.get_json(&format!("{}/servers", self.base_url)).await?;
        let records = records_from_listing(&body, self.listing_limit);
        info!("Fetched {} servers from the directory", records.len());
        Ok(records)
    }

    pub async fn lookup(&self, address: &str) -> LookupOutcome {
        if !is_address_query(address) {
            warn!("Refusing lookup for malformed address: {}", address);
            return LookupOutcome::NotFound;
        }

        match self.get_json(&format!("{}/server/{}", self.base_url, address)).await {
            Ok(body) => record_from_lookup(address, &body),
            Err(e) => {
                error!("Lookup for {} failed: {}", address, e);
                LookupOutcome::Failed
            }
        }
    }
}

/// Normalizes a bulk listing body. Accepts an object keyed by `"ip:port"` (key order kept)
/// or an array whose entries carry their own `ip`. Rejected and duplicate entries are dropped.
pub fn records_from_listing(body: &Value, limit: usize) -> Vec<ServerRecord> {
    let entries: Vec<(Option<&str>, &Value)> = match body {
        Value::Object(map) => map.iter().map(|(key, entry)| (Some(key.as_str()), entry)).collect(),
        Value::Array(items) => items
            .iter()
            .map(|entry| (entry.get("ip").and_then(Value::as_str), entry))
            .collect(),
        _ => {
            warn!("Directory listing is neither an object nor an array");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for (key, payload) in entries {
        if records.len() >= limit {
            break;
        }
        let Some(key) = key else {
            debug!("Skipping listing entry without an address");
            continue;
        };

        match normalize(RawEntry::Listing { key, payload }) {
            Ok(record) => {
                if seen.insert(record.id.clone()) {
                    records.push(record);
                } else {
                    debug!("Skipping duplicate listing entry {}", key);
                }
            }
            Err(reason) => debug!("Skipping listing entry {}: {}", key, reason),
        }
    }

    records
}

pub fn record_from_lookup(query: &str, body: &Value) -> LookupOutcome {
    match normalize(RawEntry::Lookup { query, payload: body }) {
        Ok(record) => LookupOutcome::Found(record),
        Err(Rejected::MissingHostname) => {
            debug!("Server {} not found or offline", query);
            LookupOutcome::NotFound
        }
        Err(reason) => {
            debug!("Unusable lookup response for {}: {}", query, reason);
            LookupOutcome::NotFound
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers exactly one HTTP request with `status` and `body`, returning the base URL.
    pub(crate) async fn serve_once(status: &'static str, body: &'static str) -> String {
        serve_times(status, body, 1).await
    }

    /// Answers `times` connections with the same response, then stops listening.
    pub(crate) async fn serve_times(status: &'static str, body: &'static str, times: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for _ in 0..times {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    pub(crate) fn client_for(base_url: String) -> DirectoryClient {
        let config = Config {
            directory_base_url: base_url,
            directory_timeout_secs: 2,
            ..Config::default()
        };
        DirectoryClient::new(&config).unwrap()
    }

    #[test]
    fn keyed_listing_keeps_order_and_drops_bad_entries() {
        let body = json!({
            "9.9.9.9:7777": { "ip": "9.9.9.9:7777", "hn": "Zulu", "pc": 1, "pm": 50, "gm": "Race", "la": "de" },
            "1.1.1.1:7777": { "ip": "1.1.1.1:7777", "pc": 2 },
            "2.2.2.2:bad": { "ip": "2.2.2.2:bad", "hn": "Broken" },
            "3.3.3.3:7777": { "hn": "Alpha", "gm": "Roleplay" }
        });
        let records = records_from_listing(&body, 200);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["9.9.9.9:7777", "3.3.3.3:7777"]);
        assert_eq!(records[1].address, "3.3.3.3");
    }

    #[test]
    fn array_listing_dedupes_and_caps() {
        let body = json!([
            { "ip": "1.1.1.1:7777", "hn": "One" },
            { "ip": "1.1.1.1:7777", "hn": "One again" },
            { "hn": "No address" },
            { "ip": "2.2.2.2:7777", "hn": "Two" },
            { "ip": "3.3.3.3:7777", "hn": "Three" }
        ]);
        let records = records_from_listing(&body, 2);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["One", "Two"]);
    }

    #[test]
    fn scalar_listing_is_empty() {
        assert!(records_from_listing(&json!("maintenance"), 200).is_empty());
    }

    #[test]
    fn lookup_without_hostname_is_not_found() {
        assert_eq!(record_from_lookup("1.2.3.4:7777", &json!({ "ip": "1.2.3.4:7777" })), LookupOutcome::NotFound);
        assert_eq!(record_from_lookup("1.2.3.4:7777", &json!(null)), LookupOutcome::NotFound);
        assert!(matches!(
            record_from_lookup("1.2.3.4:7777", &json!({ "hn": "Here" })),
            LookupOutcome::Found(_)
        ));
    }

    #[tokio::test]
    async fn failed_listing_is_an_error_not_a_panic() {
        let base = serve_once("503 Service Unavailable", "{}").await;
        let result = client_for(base).fetch_listing().await;
        assert!(matches!(result, Err(DirectoryError::Status(StatusCode::SERVICE_UNAVAILABLE))));
    }

    #[tokio::test]
    async fn listing_is_fetched_and_normalized() {
        let base = serve_once("200 OK", r#"{"5.5.5.5:7777":{"ip":"5.5.5.5:7777","hn":"Five","pc":5,"pm":10,"gm":"DM","la":"us"}}"#).await;
        let records = client_for(base).fetch_listing().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Five");
        assert_eq!(records[0].player_count, 5);
    }

    #[tokio::test]
    async fn lookup_outcomes_follow_response() {
        let base = serve_once("200 OK", r#"{"ip":"5.5.5.5:7777"}"#).await;
        assert_eq!(client_for(base).lookup("5.5.5.5:7777").await, LookupOutcome::NotFound);

        let base = serve_once("500 Internal Server Error", "oops").await;
        assert_eq!(client_for(base).lookup("5.5.5.5:7777").await, LookupOutcome::Failed);

        let base = serve_once("200 OK", "not json").await;
        assert_eq!(client_for(base).lookup("5.5.5.5:7777").await, LookupOutcome::Failed);
    }

    #[tokio::test]
    async fn malformed_lookup_address_skips_the_request() {
        let client = client_for("http://127.0.0.1:9".to_string());
        assert_eq!(client.lookup("example.net:7777").await, LookupOutcome::NotFound);
    }
}
