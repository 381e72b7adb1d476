// src/handlers/mod.rs
pub mod account;
pub mod auth;
pub mod index;
pub mod servers;
pub mod views;

use actix_web::web;
use governor::RateLimiter;
use crate::config::Config;
use crate::directory::DirectoryClient;
use crate::identity::IdentityClient;
use crate::storage::cache::DirectoryCache;
use crate::storage::memory::ViewStorage;
use crate::storage::sessions::SessionStorage;
use crate::utils::{AuthLimiter, ListingLimiter, LookupLimiter};

/// Everything the handlers share. Each piece is registered as its own `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub config: web::Data<Config>,
    pub cache: web::Data<DirectoryCache>,
    pub views: web::Data<ViewStorage>,
    pub sessions: web::Data<SessionStorage>,
    pub identity: web::Data<IdentityClient>,
    pub listing_limiter: web::Data<ListingLimiter>,
    pub lookup_limiter: web::Data<LookupLimiter>,
    pub auth_limiter: web::Data<AuthLimiter>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let directory = DirectoryClient::new(&config)?;
        let identity = IdentityClient::new(&config)?;

        Ok(Self {
            cache: web::Data::new(DirectoryCache::new(directory, &config)),
            views: web::Data::new(ViewStorage::new(config.clone())),
            sessions: web::Data::new(SessionStorage::new()),
            identity: web::Data::new(identity),
            listing_limiter: web::Data::new(ListingLimiter(RateLimiter::keyed(config.listing_quota()))),
            lookup_limiter: web::Data::new(LookupLimiter(RateLimiter::keyed(config.lookup_quota()))),
            auth_limiter: web::Data::new(AuthLimiter(RateLimiter::keyed(config.auth_quota()))),
            config: web::Data::new(config),
        })
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.config.clone())
            .app_data(self.cache.clone())
            .app_data(self.views.clone())
            .app_data(self.sessions.clone())
            .app_data(self.identity.clone())
            .app_data(self.listing_limiter.clone())
            .app_data(self.lookup_limiter.clone())
            .app_data(self.auth_limiter.clone());
        routes(cfg);
    }
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index::index))
        .route("/servers", web::get().to(servers::get_servers))
        .route("/servers/{address}", web::get().to(servers::get_server))
        .route("/views", web::post().to(views::mount_view))
        .route("/views/{id}", web::get().to(views::get_view))
        .route("/views/{id}", web::delete().to(views::unmount_view))
        .route("/views/{id}/search", web::post().to(views::search))
        .route("/views/{id}/filter", web::post().to(views::filter))
        .route("/views/{id}/sort", web::post().to(views::sort))
        .route("/views/{id}/page", web::post().to(views::page))
        .route("/auth/register", web::post().to(auth::register))
        .route("/auth/login", web::post().to(auth::login))
        .route("/auth/oauth/{provider}", web::get().to(auth::oauth_start))
        .route("/auth/callback", web::get().to(auth::oauth_callback))
        .route("/auth/logout", web::post().to(auth::logout))
        .route("/profile", web::get().to(account::profile))
        .route("/admin", web::get().to(account::admin));
}
