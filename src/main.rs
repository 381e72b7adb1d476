// src/main.rs
mod config;
mod directory;
mod flags;
mod handlers;
mod identity;
mod models;
mod normalize;
mod storage;
mod utils;
mod view;

use std::time::Duration;
use actix_web::{App, HttpServer};
use env_logger::Env;
use log::{debug, info};
use crate::config::Config;
use crate::handlers::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env();
    let cleanup_every = Duration::from_secs(config.view_cleanup_interval_secs.max(1));

    // Get bind address and port from environment or use defaults
    let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let bind = format!("{}:{}", bind_address, port);

    let state = AppState::new(config).map_err(|e| {
        log::error!("Failed to build HTTP clients: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e)
    })?;

    let views = state.views.clone();
    let cache = state.cache.clone();
    let sessions = state.sessions.clone();
    let (session_ttl, oauth_state_ttl) = (state.config.session_ttl(), state.config.oauth_state_ttl());
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_every);
        loop {
            interval.tick().await;
            let removed = views.cleanup_stale_views();
            if removed > 0 {
                debug!("Dropped {} idle views", removed);
            }
            let expired = sessions.cleanup_expired(session_ttl, oauth_state_ttl);
            if expired > 0 {
                debug!(
                    "Expired {} sessions and sign-in flows ({} sessions, {} flows left)",
                    expired,
                    sessions.len(),
                    sessions.pending_oauth()
                );
            }
            cache.purge_expired_lookups();
        }
    });

    info!("Starting server on {}", bind);
    HttpServer::new(move || {
        let state = state.clone();
        App::new().configure(move |cfg| state.register(cfg))
    })
        .bind(&bind)?
        .run().await
}
