use std::env;
use std::str::FromStr;
use std::time::Duration;
use std::num::NonZeroU32;
use governor::Quota;

#[derive(Clone, Debug)]
pub struct Config {
    // Upstream directory
    pub directory_base_url: String,
    pub directory_timeout_secs: u64,
    pub listing_revalidate_secs: u64,
    pub lookup_revalidate_secs: u64,
    pub listing_limit: usize,

    // List view behaviour
    pub page_size: usize,
    pub search_debounce_ms: u64,

    // Mounted views
    pub max_views_per_ip: usize,
    pub view_timeout_secs: u64,
    pub view_cleanup_interval_secs: u64,

    // Rate limiting configs
    pub listing_period_secs: u64,
    pub listing_burst_limit: u32,
    pub lookup_period_secs: u64,
    pub lookup_burst_limit: u32,
    pub auth_period_secs: u64,
    pub auth_burst_limit: u32,

    // Identity provider
    pub identity_url: String,
    pub identity_anon_key: String,
    pub oauth_redirect_url: String,
    pub session_ttl_secs: u64,
    pub oauth_state_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory_base_url: "https://api.open.mp".to_string(),
            directory_timeout_secs: 10,
            listing_revalidate_secs: 60,
            lookup_revalidate_secs: 10,
            listing_limit: 200,
            page_size: 20,
            search_debounce_ms: 500,
            max_views_per_ip: 8,
            view_timeout_secs: 900, // 15 minutes
            view_cleanup_interval_secs: 60,
            listing_period_secs: 1,
            listing_burst_limit: 30,
            lookup_period_secs: 1,
            lookup_burst_limit: 10,
            auth_period_secs: 6,
            auth_burst_limit: 10,
            identity_url: "http://localhost:54321".to_string(),
            identity_anon_key: String::new(),
            oauth_redirect_url: "http://localhost:8080/auth/callback".to_string(),
            session_ttl_secs: 7 * 24 * 60 * 60,
            oauth_state_ttl_secs: 600,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            directory_base_url: env_or("DIRECTORY_BASE_URL", defaults.directory_base_url),
            directory_timeout_secs: env_or("DIRECTORY_TIMEOUT_SECS", defaults.directory_timeout_secs),
            listing_revalidate_secs: env_or("LISTING_REVALIDATE_SECS", defaults.listing_revalidate_secs),
            lookup_revalidate_secs: env_or("LOOKUP_REVALIDATE_SECS", defaults.lookup_revalidate_secs),
            listing_limit: env_or("LISTING_LIMIT", defaults.listing_limit),

            page_size: env_or("PAGE_SIZE", defaults.page_size).max(1),
            search_debounce_ms: env_or("SEARCH_DEBOUNCE_MS", defaults.search_debounce_ms),

            max_views_per_ip: env_or("MAX_VIEWS_PER_IP", defaults.max_views_per_ip),
            view_timeout_secs: env_or("VIEW_TIMEOUT_SECS", defaults.view_timeout_secs),
            view_cleanup_interval_secs: env_or(
                "VIEW_CLEANUP_INTERVAL_SECS",
                defaults.view_cleanup_interval_secs,
            ),

            listing_period_secs: env_or("LISTING_PERIOD_SECS", defaults.listing_period_secs),
            listing_burst_limit: env_or("LISTING_BURST_LIMIT", defaults.listing_burst_limit),
            lookup_period_secs: env_or("LOOKUP_PERIOD_SECS", defaults.lookup_period_secs),
            lookup_burst_limit: env_or("LOOKUP_BURST_LIMIT", defaults.lookup_burst_limit),
            auth_period_secs: env_or("AUTH_PERIOD_SECS", defaults.auth_period_secs),
            auth_burst_limit: env_or("AUTH_BURST_LIMIT", defaults.auth_burst_limit),

            identity_url: env_or("SUPABASE_URL", defaults.identity_url),
            identity_anon_key: env_or("SUPABASE_ANON_KEY", defaults.identity_anon_key),
            oauth_redirect_url: env_or("OAUTH_REDIRECT_URL", defaults.oauth_redirect_url),
            session_ttl_secs: env_or("SESSION_TTL_SECS", defaults.session_ttl_secs),
            oauth_state_ttl_secs: env_or("OAUTH_STATE_TTL_SECS", defaults.oauth_state_ttl_secs),
        }
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn listing_quota(&self) -> Quota {
        quota(self.listing_period_secs, self.listing_burst_limit)
    }

    pub fn lookup_quota(&self) -> Quota {
        quota(self.lookup_period_secs, self.lookup_burst_limit)
    }

    pub fn auth_quota(&self) -> Quota {
        quota(self.auth_period_secs, self.auth_burst_limit)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn oauth_state_ttl(&self) -> Duration {
        Duration::from_secs(self.oauth_state_ttl_secs)
    }
}

// A zero period or burst falls back to one request per second.
fn quota(period_secs: u64, burst: u32) -> Quota {
    Quota::with_period(Duration::from_secs(period_secs))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN))
}
