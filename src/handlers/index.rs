// src/handlers/index.rs
use actix_web::{web, HttpResponse};
use serde_json::json;
use crate::storage::memory::ViewStorage;

pub async fn index(views: web::Data<ViewStorage>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "mountedViews": views.len(),
    }))
}
