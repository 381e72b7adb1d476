// src/storage/memory.rs
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use crate::config::Config;
use crate::view::ListView;

/// A list view mounted by one visitor.
pub struct MountedView {
    pub owner: IpAddr,
    pub view: ListView,
    pub last_seen: Instant,
}

pub type ViewHandle = Arc<Mutex<MountedView>>;

pub struct ViewStorage {
    views: DashMap<String, ViewHandle>,
    // Held across the per-IP count and the insert in `mount`.
    mount_guard: Mutex<()>,
    config: Config,
}

impl ViewStorage {
    pub fn new(config: Config) -> Self {
        Self {
            views: DashMap::new(),
            mount_guard: Mutex::new(()),
            config,
        }
    }

    pub fn mount(&self, owner: IpAddr, view: ListView) -> Result<String, String> {
        let _guard = self.mount_guard.lock();
        let mounted = self.views
            .iter()
            .filter(|r| r.value().lock().owner == owner)
            .count();

        if mounted >= self.config.max_views_per_ip {
            return Err(format!("Maximum number of views ({}) reached for this IP", self.config.max_views_per_ip));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let handle = Arc::new(Mutex::new(MountedView {
            owner,
            view,
            last_seen: Instant::now(),
        }));
        self.views.insert(id.clone(), handle);
        Ok(id)
    }

    /// Looks up a view and marks it as seen.
    pub fn get(&self, id: &str) -> Option<ViewHandle> {
        let handle = self.views.get(id).map(|r| r.value().clone())?;
        handle.lock().last_seen = Instant::now();
        Some(handle)
    }

    pub fn unmount(&self, id: &str) -> bool {
        self.views.remove(id).is_some()
    }

    pub fn cleanup_stale_views(&self) -> usize {
        let timeout = Duration::from_secs(self.config.view_timeout_secs);
        let now = Instant::now();
        let before = self.views.len();

        self.views.retain(|_, handle| {
            now.duration_since(handle.lock().last_seen) < timeout
        });
        before.saturating_sub(self.views.len())
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }
}
