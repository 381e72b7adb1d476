// src/handlers/servers.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::debug;
use serde::Deserialize;
use serde_json::json;
use crate::config::Config;
use crate::normalize::is_address_query;
use crate::storage::cache::DirectoryCache;
use crate::utils::{check_rate, ListingLimiter, LookupLimiter, RequestError};
use crate::view::controller::{ServerRow, ALL_GAMEMODES};
use crate::view::{ListView, LookupOutcome, SortMode, ViewSettings};

#[derive(Debug, Deserialize)]
pub struct ServerListQuery {
    #[serde(default)]
    search: String,
    mode: Option<String>,
    sort: Option<String>,
    page: Option<usize>,
}

/// One-shot run of the list pipeline: search, filter, sort and page in a single request.
pub async fn get_servers(
    req: HttpRequest,
    query: web::Query<ServerListQuery>,
    cache: web::Data<DirectoryCache>,
    config: web::Data<Config>,
    listing_limiter: web::Data<ListingLimiter>,
    lookup_limiter: web::Data<LookupLimiter>,
) -> Result<HttpResponse, RequestError> {
    check_rate(&listing_limiter.0, &req)?;

    let sort = query
        .sort
        .as_deref()
        .unwrap_or_default()
        .parse::<SortMode>()
        .map_err(RequestError::InvalidQuery)?;

    let records = cache.listing().await;
    let mut view = ListView::new(ViewSettings::from(config.get_ref()));
    view.set_bulk_records(records.as_ref().clone());
    view.set_gamemode_filter(query.mode.as_deref().unwrap_or(ALL_GAMEMODES));
    view.set_sort_mode(sort);

    if let Some(ticket) = view.submit_search(&query.search) {
        check_rate(&lookup_limiter.0, &req)?;
        let outcome = cache.lookup(&ticket.address).await;
        view.resolve_lookup(&ticket, outcome);
    }
    view.set_page(query.page.unwrap_or(1));

    debug!("Serving {:?}", view);
    Ok(HttpResponse::Ok().json(view.snapshot()))
}

pub async fn get_server(
    req: HttpRequest,
    path: web::Path<String>,
    cache: web::Data<DirectoryCache>,
    lookup_limiter: web::Data<LookupLimiter>,
) -> Result<HttpResponse, RequestError> {
    check_rate(&lookup_limiter.0, &req)?;

    let address = path.into_inner();
    if !is_address_query(&address) {
        return Err(RequestError::InvalidAddress(address));
    }

    match cache.lookup(&address).await {
        LookupOutcome::Found(record) => Ok(HttpResponse::Ok().json(ServerRow::from(&record))),
        LookupOutcome::NotFound => Ok(HttpResponse::NotFound()
            .json(json!({ "error": format!("Server {} was not found", address) }))),
        LookupOutcome::Failed => Err(RequestError::Upstream(format!(
            "Failed to fetch details for {}",
            address
        ))),
    }
}
