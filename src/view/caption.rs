// src/view/caption.rs
use std::fmt;
use serde::Serialize;

/// Status line under the server table. Exactly one applies to any view state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Caption {
    LookupPending { address: String },
    LookupNotFound { address: String },
    LookupFailed { address: String },
    LookupFound { address: String, port: u16 },
    DirectoryUnavailable,
    NoSearchMatches,
    NoGamemodeMatches,
    ListingCapped { from: usize, to: usize, shown: usize },
    Showing { from: usize, to: usize, total: usize, fetched: usize },
}

impl fmt::Display for Caption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LookupPending { address } => write!(f, "Looking up details for {}...", address),
            Self::LookupNotFound { address } => write!(
                f,
                "Server {} was not found. Try a general search or check the IP:Port.",
                address
            ),
            Self::LookupFailed { address } => write!(f, "Failed to fetch details for {}.", address),
            Self::LookupFound { address, port } => {
                write!(f, "Showing details for server {}:{}.", address, port)
            }
            Self::DirectoryUnavailable => write!(
                f,
                "No servers found or the server directory is unavailable. Please try again later."
            ),
            Self::NoSearchMatches => write!(f, "No servers match your search or filters."),
            Self::NoGamemodeMatches => write!(f, "No servers match your gamemode filter."),
            Self::ListingCapped { from, to, shown } => write!(
                f,
                "Showing {}-{} of the first {} servers from the directory. Narrow your search or use a filter for more specific results. Data refreshes periodically.",
                from, to, shown
            ),
            Self::Showing { from, to, total, fetched } => write!(
                f,
                "Showing {}-{} of {} servers ({} fetched). Data refreshes periodically.",
                from, to, total, fetched
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_range() {
        let caption = Caption::Showing { from: 21, to: 40, total: 45, fetched: 200 };
        assert_eq!(
            caption.to_string(),
            "Showing 21-40 of 45 servers (200 fetched). Data refreshes periodically."
        );
    }

    #[test]
    fn lookup_captions_name_the_address() {
        let caption = Caption::LookupNotFound { address: "1.2.3.4:7777".to_string() };
        assert!(caption.to_string().contains("1.2.3.4:7777"));
        let caption = Caption::LookupFound { address: "1.2.3.4".to_string(), port: 7777 };
        assert!(caption.to_string().contains("1.2.3.4:7777"));
    }
}
