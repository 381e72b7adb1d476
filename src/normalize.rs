// src/normalize.rs
use std::fmt;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use crate::models::server::{RawEntry, RawServer, RecordOrigin, ServerRecord};

pub const UNNAMED_SERVER: &str = "Unnamed Server";
pub const UNKNOWN_MODE: &str = "Unknown";

lazy_static! {
    static ref ADDRESS_QUERY: Regex =
        Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}:\d+$").expect("address pattern compiles");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    MissingHostname,
    MalformedAddress(String),
    InvalidPayload(String),
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHostname => write!(f, "payload has no hostname"),
            Self::MalformedAddress(addr) => write!(f, "malformed address: {}", addr),
            Self::InvalidPayload(reason) => write!(f, "invalid payload: {}", reason),
        }
    }
}

/// True when `text` is a full IPv4 `a.b.c.d:port` query.
pub fn is_address_query(text: &str) -> bool {
    ADDRESS_QUERY.is_match(text)
}

/// Splits `host:port` on the final colon.
pub fn split_address(raw: &str) -> Result<(String, u16), Rejected> {
    let malformed = || Rejected::MalformedAddress(raw.to_string());

    let (host, port) = raw.rsplit_once(':').ok_or_else(malformed)?;
    if host.is_empty()
        || !host.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(malformed());
    }

    match port.parse::<u16>() {
        Ok(port) if port > 0 => Ok((host.to_string(), port)),
        _ => Err(malformed()),
    }
}

pub fn normalize(entry: RawEntry<'_>) -> Result<ServerRecord, Rejected> {
    let (key, payload, origin) = match entry {
        RawEntry::Listing { key, payload } => (key, payload, RecordOrigin::Listing),
        RawEntry::Lookup { query, payload } => (query, payload, RecordOrigin::Lookup),
    };

    if !payload.is_object() {
        return Err(Rejected::InvalidPayload("not an object".to_string()));
    }
    let raw = RawServer::deserialize(payload)
        .map_err(|e| Rejected::InvalidPayload(e.to_string()))?;

    let name = raw.hn.ok_or(Rejected::MissingHostname)?;

    let source = raw.ip.as_deref().filter(|ip| !ip.is_empty()).unwrap_or(key);
    let (address, port) = split_address(source)?;

    let online = match origin {
        RecordOrigin::Listing => true,
        RecordOrigin::Lookup => raw.ol.unwrap_or(true),
    };

    Ok(ServerRecord {
        id: key.to_string(),
        name: non_blank(Some(name)).unwrap_or_else(|| UNNAMED_SERVER.to_string()),
        address,
        port,
        player_count: raw.pc.unwrap_or(0),
        max_players: raw.pm.unwrap_or(0),
        game_mode: non_blank(raw.gm).unwrap_or_else(|| UNKNOWN_MODE.to_string()),
        online,
        region_code: raw.la.unwrap_or_default(),
        origin,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
