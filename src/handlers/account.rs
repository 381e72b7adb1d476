// src/handlers/account.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, warn};
use serde_json::json;
use crate::identity::{IdentityClient, IdentityError};
use crate::storage::sessions::SessionStorage;
use crate::utils::{current_session, redirect};

const LOGIN_PAGE: &str = "/auth/login";

pub async fn profile(
    req: HttpRequest,
    identity: web::Data<IdentityClient>,
    sessions: web::Data<SessionStorage>,
) -> HttpResponse {
    let Some((id, session)) = current_session(&req, &sessions) else {
        return redirect(LOGIN_PAGE);
    };

    let user = match identity.current_user(&session.access_token).await {
        Ok(user) => user,
        Err(IdentityError::Rejected(reason)) => {
            debug!("Session for {} no longer valid: {}", session.user.email, reason);
            sessions.remove(&id);
            return redirect(LOGIN_PAGE);
        }
        Err(e) => {
            warn!("Could not refresh user {}: {}", session.user.email, e);
            session.user
        }
    };

    HttpResponse::Ok().json(json!({
        "email": user.email,
        "username": user.username.as_deref().unwrap_or("Not set"),
        "role": user.role,
    }))
}

pub async fn admin(req: HttpRequest, sessions: web::Data<SessionStorage>) -> HttpResponse {
    let Some((_, session)) = current_session(&req, &sessions) else {
        return redirect(LOGIN_PAGE);
    };

    if !session.is_admin() {
        debug!("Non-admin {} sent away from the admin panel", session.user.email);
        return redirect("/");
    }

    HttpResponse::Ok().json(json!({
        "message": format!("Welcome, {}", session.user.email),
        "user": session.user,
        "signedInAt": session.created_at,
    }))
}
