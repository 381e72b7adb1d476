// src/handlers/views.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use crate::config::Config;
use crate::storage::cache::DirectoryCache;
use crate::storage::memory::{ViewHandle, ViewStorage};
use crate::utils::{check_rate, ListingLimiter, LookupLimiter, RequestError};
use crate::view::{ListView, LookupOutcome, SortMode, ViewSettings};

#[derive(Debug, Deserialize)]
pub struct SearchInput {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
pub struct FilterInput {
    #[serde(default)]
    mode: String,
}

#[derive(Debug, Deserialize)]
pub struct SortInput {
    #[serde(default)]
    sort: String,
}

#[derive(Debug, Deserialize)]
pub struct PageInput {
    page: usize,
}

fn find(views: &ViewStorage, id: &str) -> Result<ViewHandle, RequestError> {
    views.get(id).ok_or(RequestError::ViewNotFound)
}

/// Settles the view's debounced search; when that yields an address, runs the lookup
/// in the background and hands the result back under its ticket. Lookups count against
/// the view owner's lookup quota; an over-quota lookup resolves as failed.
fn settle(
    handle: &ViewHandle,
    cache: &web::Data<DirectoryCache>,
    limiter: &web::Data<LookupLimiter>,
) {
    let (ticket, owner) = {
        let mut mounted = handle.lock();
        let ticket = mounted.view.poll(Instant::now());
        (ticket, mounted.owner)
    };
    let Some(ticket) = ticket else {
        return;
    };

    if limiter.0.check_key(&owner).is_err() {
        warn!("Lookup quota exceeded for {}, not looking up {}", owner, ticket.address);
        handle.lock().view.resolve_lookup(&ticket, LookupOutcome::Failed);
        return;
    }

    let handle = handle.clone();
    let cache = cache.clone();
    actix_web::rt::spawn(async move {
        let outcome = cache.lookup(&ticket.address).await;
        if !handle.lock().view.resolve_lookup(&ticket, outcome) {
            debug!("Lookup for {} was superseded", ticket.address);
        }
    });
}

pub async fn mount_view(
    req: HttpRequest,
    cache: web::Data<DirectoryCache>,
    views: web::Data<ViewStorage>,
    config: web::Data<Config>,
    limiter: web::Data<ListingLimiter>,
) -> Result<HttpResponse, RequestError> {
    let ip = check_rate(&limiter.0, &req)?;

    let records = cache.listing().await;
    let mut view = ListView::new(ViewSettings::from(config.get_ref()));
    view.set_bulk_records(records.as_ref().clone());
    let snapshot = view.snapshot();

    let id = views.mount(ip, view).map_err(RequestError::ViewLimitReached)?;
    info!("Mounted view {} for {}", id, ip);

    Ok(HttpResponse::Created().json(json!({ "id": id, "view": snapshot })))
}

pub async fn get_view(
    path: web::Path<String>,
    cache: web::Data<DirectoryCache>,
    views: web::Data<ViewStorage>,
    lookup_limiter: web::Data<LookupLimiter>,
) -> Result<HttpResponse, RequestError> {
    let handle = find(&views, &path)?;
    settle(&handle, &cache, &lookup_limiter);
    let snapshot = handle.lock().view.snapshot();
    Ok(HttpResponse::Ok().json(snapshot))
}

pub async fn search(
    req: HttpRequest,
    path: web::Path<String>,
    input: web::Json<SearchInput>,
    cache: web::Data<DirectoryCache>,
    views: web::Data<ViewStorage>,
    listing_limiter: web::Data<ListingLimiter>,
    lookup_limiter: web::Data<LookupLimiter>,
) -> Result<HttpResponse, RequestError> {
    check_rate(&listing_limiter.0, &req)?;
    let handle = find(&views, &path)?;

    let (deadline, snapshot) = {
        let mut mounted = handle.lock();
        mounted.view.type_search(&input.text, Instant::now());
        (mounted.view.search_deadline(), mounted.view.snapshot())
    };

    // Each keystroke arms its own timer; only the one after the last keystroke finds
    // the quiet period over.
    if let Some(deadline) = deadline {
        let cache = cache.clone();
        let lookup_limiter = lookup_limiter.clone();
        actix_web::rt::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            settle(&handle, &cache, &lookup_limiter);
        });
    }

    Ok(HttpResponse::Ok().json(snapshot))
}

pub async fn filter(
    path: web::Path<String>,
    input: web::Json<FilterInput>,
    views: web::Data<ViewStorage>,
) -> Result<HttpResponse, RequestError> {
    let handle = find(&views, &path)?;
    let mut mounted = handle.lock();
    if !mounted.view.set_gamemode_filter(&input.mode) {
        debug!("Gamemode filter ignored while a lookup result is shown");
    }
    let snapshot = mounted.view.snapshot();
    Ok(HttpResponse::Ok().json(snapshot))
}

pub async fn sort(
    path: web::Path<String>,
    input: web::Json<SortInput>,
    views: web::Data<ViewStorage>,
) -> Result<HttpResponse, RequestError> {
    let mode = input.sort.parse::<SortMode>().map_err(RequestError::InvalidQuery)?;
    let handle = find(&views, &path)?;
    let mut mounted = handle.lock();
    if !mounted.view.set_sort_mode(mode) {
        debug!("Sort change ignored while a lookup result is shown");
    }
    let snapshot = mounted.view.snapshot();
    Ok(HttpResponse::Ok().json(snapshot))
}

pub async fn page(
    path: web::Path<String>,
    input: web::Json<PageInput>,
    views: web::Data<ViewStorage>,
) -> Result<HttpResponse, RequestError> {
    let handle = find(&views, &path)?;
    let mut mounted = handle.lock();
    mounted.view.set_page(input.page);
    let snapshot = mounted.view.snapshot();
    Ok(HttpResponse::Ok().json(snapshot))
}

pub async fn unmount_view(
    path: web::Path<String>,
    views: web::Data<ViewStorage>,
) -> Result<HttpResponse, RequestError> {
    if !views.unmount(&path) {
        return Err(RequestError::ViewNotFound);
    }
    info!("Unmounted view {}", path.as_str());
    Ok(HttpResponse::NoContent().finish())
}
