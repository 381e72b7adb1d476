// src/utils.rs
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use actix_web::http::header;
use governor::{RateLimiter, clock::DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use log::{debug, warn};
use serde_json::json;
use std::fmt;
use std::net::IpAddr;
use crate::models::user::Session;
use crate::storage::sessions::{SessionStorage, SESSION_COOKIE};

pub type IpRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Limits bulk listing and view traffic.
pub struct ListingLimiter(pub IpRateLimiter);

/// Limits single-address lookups.
pub struct LookupLimiter(pub IpRateLimiter);

/// Limits sign-in, sign-up and OAuth starts.
pub struct AuthLimiter(pub IpRateLimiter);

#[derive(Debug)]
pub enum RequestError {
    MissingPeerIP,
    RateLimitExceeded,
    InvalidAddress(String),
    InvalidQuery(String),
    ViewNotFound,
    ViewLimitReached(String),
    Identity(String),
    SignUpRejected(String),
    Upstream(String),
    Internal(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPeerIP => write!(f, "Failed to extract client IP"),
            Self::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            Self::InvalidAddress(addr) => write!(f, "Not an IP:Port address: {}", addr),
            Self::InvalidQuery(reason) => write!(f, "Invalid query: {}", reason),
            Self::ViewNotFound => write!(f, "View not found"),
            Self::ViewLimitReached(reason) => write!(f, "{}", reason),
            Self::Identity(message) | Self::SignUpRejected(message) => write!(f, "{}", message),
            Self::Upstream(reason) => write!(f, "{}", reason),
            Self::Internal(reason) => write!(f, "Internal error: {}", reason),
        }
    }
}

impl ResponseError for RequestError {
    fn error_response(&self) -> HttpResponse {
        let body = json!({ "error": self.to_string() });
        match self {
            Self::RateLimitExceeded | Self::ViewLimitReached(_) => {
                HttpResponse::TooManyRequests().json(body)
            }
            Self::ViewNotFound => HttpResponse::NotFound().json(body),
            Self::Identity(_) => HttpResponse::Unauthorized().json(body),
            Self::Upstream(_) => HttpResponse::BadGateway().json(body),
            Self::Internal(_) => HttpResponse::InternalServerError().json(body),
            _ => HttpResponse::BadRequest().json(body),
        }
    }
}

/// Client IP for rate limiting: first `X-Forwarded-For` entry, else the peer address.
pub fn extract_client_ip(req: &HttpRequest) -> Result<IpAddr, RequestError> {
    if let Some(forwarded_for) = req.headers().get("X-Forwarded-For") {
        if let Ok(ip_str) = forwarded_for.to_str() {
            if let Some(first_ip) = ip_str.split(',').next() {
                match first_ip.trim().parse::<IpAddr>() {
                    Ok(ip) => return Ok(ip),
                    Err(_) => warn!("Ignoring unparseable X-Forwarded-For: {}", ip_str),
                }
            }
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip())
        .ok_or(RequestError::MissingPeerIP)
}

pub fn check_rate(limiter: &IpRateLimiter, req: &HttpRequest) -> Result<IpAddr, RequestError> {
    let ip = extract_client_ip(req)?;
    if limiter.check_key(&ip).is_err() {
        debug!("Rate limit exceeded for {}", ip);
        return Err(RequestError::RateLimitExceeded);
    }
    Ok(ip)
}

/// Session context for this request, if the visitor is signed in.
pub fn current_session(req: &HttpRequest, sessions: &SessionStorage) -> Option<(String, Session)> {
    let id = req.cookie(SESSION_COOKIE)?.value().to_string();
    let session = sessions.get(&id)?;
    Some((id, session))
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}
