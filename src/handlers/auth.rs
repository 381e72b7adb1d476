// src/handlers/auth.rs
use actix_web::cookie::Cookie;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use crate::config::Config;
use crate::identity::{new_code_verifier, IdentityClient, IdentityError, SignedIn};
use crate::storage::sessions::{SessionStorage, OAUTH_STATE_COOKIE, SESSION_COOKIE};
use crate::utils::{check_rate, current_session, redirect, AuthLimiter, RequestError};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    email: String,
    password: String,
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    error_description: Option<String>,
}

fn session_cookie(value: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, value)
        .path("/")
        .http_only(true)
        .finish()
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "").path("/").finish();
    cookie.make_removal();
    cookie
}

/// Provider refusals go back to the user verbatim; anything else is an upstream failure.
fn identity_error(e: IdentityError, rejected: fn(String) -> RequestError) -> RequestError {
    match e {
        IdentityError::Rejected(message) => rejected(message),
        other => {
            error!("Identity provider error: {}", other);
            RequestError::Upstream(other.to_string())
        }
    }
}

fn start_session(sessions: &SessionStorage, signed_in: SignedIn) -> String {
    info!("User {} signed in", signed_in.user.email);
    sessions.create(signed_in.user, signed_in.access_token)
}

pub async fn register(
    req: HttpRequest,
    identity: web::Data<IdentityClient>,
    limiter: web::Data<AuthLimiter>,
    form: web::Json<Registration>,
) -> Result<HttpResponse, RequestError> {
    check_rate(&limiter.0, &req)?;
    identity
        .sign_up(&form.email, &form.password, form.username.trim())
        .await
        .map_err(|e| identity_error(e, RequestError::SignUpRejected))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Check your email to verify your account!",
        "next": "/auth/login",
    })))
}

pub async fn login(
    req: HttpRequest,
    identity: web::Data<IdentityClient>,
    sessions: web::Data<SessionStorage>,
    limiter: web::Data<AuthLimiter>,
    form: web::Json<Credentials>,
) -> Result<HttpResponse, RequestError> {
    check_rate(&limiter.0, &req)?;
    let signed_in = identity
        .sign_in_with_password(&form.email, &form.password)
        .await
        .map_err(|e| identity_error(e, RequestError::Identity))?;

    let user = signed_in.user.clone();
    let id = start_session(&sessions, signed_in);

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(id))
        .json(json!({ "user": user, "next": "/profile" })))
}

pub async fn oauth_start(
    req: HttpRequest,
    path: web::Path<String>,
    identity: web::Data<IdentityClient>,
    sessions: web::Data<SessionStorage>,
    config: web::Data<Config>,
    limiter: web::Data<AuthLimiter>,
) -> Result<HttpResponse, RequestError> {
    check_rate(&limiter.0, &req)?;
    let provider = path.into_inner();
    if provider.is_empty() || !provider.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RequestError::InvalidQuery(format!("unknown provider: {}", provider)));
    }

    let verifier = new_code_verifier();
    let url = identity
        .authorize_url(&provider, &config.oauth_redirect_url, &verifier)
        .map_err(|e| RequestError::Internal(e.to_string()))?;
    let state = sessions.begin_oauth(verifier);

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, url.as_str()))
        .cookie(Cookie::build(OAUTH_STATE_COOKIE, state).path("/").http_only(true).finish())
        .finish())
}

pub async fn oauth_callback(
    req: HttpRequest,
    query: web::Query<CallbackQuery>,
    identity: web::Data<IdentityClient>,
    sessions: web::Data<SessionStorage>,
) -> Result<HttpResponse, RequestError> {
    if let Some(message) = &query.error_description {
        return Err(RequestError::Identity(message.clone()));
    }
    let code = query
        .code
        .as_deref()
        .ok_or_else(|| RequestError::InvalidQuery("missing code".to_string()))?;

    let verifier = req
        .cookie(OAUTH_STATE_COOKIE)
        .and_then(|state| sessions.take_oauth_verifier(state.value()))
        .ok_or_else(|| RequestError::Identity("Sign-in session expired, please try again".to_string()))?;

    let signed_in = identity
        .exchange_code(code, &verifier)
        .await
        .map_err(|e| identity_error(e, RequestError::Identity))?;
    let id = start_session(&sessions, signed_in);

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, "/profile"))
        .cookie(session_cookie(id))
        .cookie(expired_cookie(OAUTH_STATE_COOKIE))
        .finish())
}

pub async fn logout(
    req: HttpRequest,
    identity: web::Data<IdentityClient>,
    sessions: web::Data<SessionStorage>,
) -> HttpResponse {
    if let Some((id, session)) = current_session(&req, &sessions) {
        if let Err(e) = identity.sign_out(&session.access_token).await {
            warn!("Provider sign-out failed for {}: {}", session.user.email, e);
        }
        sessions.remove(&id);
        info!("User {} signed out", session.user.email);
    }

    let mut response = redirect("/");
    if let Err(e) = response.add_cookie(&expired_cookie(SESSION_COOKIE)) {
        error!("Failed to clear session cookie: {}", e);
    }
    response
}
