// src/models/server.rs
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Where a record came from. The two never share one displayed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordOrigin {
    Listing,
    Lookup,
}

/// Canonical server record. Everything past the normalizer works on this type only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub player_count: u32,
    pub max_players: u32,
    pub game_mode: String,
    pub online: bool,
    pub region_code: String,
    pub origin: RecordOrigin,
}

impl ServerRecord {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn connect_uri(&self) -> String {
        format!("samp://{}", self.endpoint())
    }
}

/// Untrusted directory payload, tagged with the shape it arrived in.
#[derive(Debug, Clone, Copy)]
pub enum RawEntry<'a> {
    /// One entry of the bulk listing; `key` is the `"ip:port"` it was listed under.
    Listing { key: &'a str, payload: &'a Value },
    /// Response of a single-address lookup for `query`.
    Lookup { query: &'a str, payload: &'a Value },
}

/// Abbreviated directory fields. Every field may be missing, null or of the wrong type;
/// a wrongly typed field reads as missing.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawServer {
    #[serde(default, deserialize_with = "lenient")]
    pub ip: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub hn: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub pc: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub pm: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub gm: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub la: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub ol: Option<bool>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}
