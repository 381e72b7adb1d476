// src/identity.rs
use std::fmt;
use std::time::Duration;
use log::{debug, error};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use crate::config::Config;
use crate::models::user::{ProviderUser, User};

// Role tag given to every self-registered account.
const DEFAULT_ROLE: &str = "user";

#[derive(Debug)]
pub enum IdentityError {
    /// The provider refused the request; the message is shown to the user as is.
    Rejected(String),
    Transport(reqwest::Error),
    Malformed(String),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(msg) => write!(f, "{}", msg),
            Self::Transport(e) => write!(f, "Identity provider unreachable: {}", e),
            Self::Malformed(e) => write!(f, "Unexpected identity provider response: {}", e),
        }
    }
}

impl std::error::Error for IdentityError {}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: ProviderUser,
}

/// Signed-in user plus the token used for follow-up calls.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub access_token: String,
}

/// Client for a GoTrue-compatible auth service.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl IdentityClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: config.identity_url.trim_end_matches('/').to_string(),
            anon_key: config.identity_anon_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    pub async fn sign_up(&self, email: &str, password: &str, username: &str) -> Result<(), IdentityError> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "username": username, "role": DEFAULT_ROLE },
        });
        let response = self.http
            .post(self.endpoint("signup"))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send().await
            .map_err(IdentityError::Transport)?;

        check(response).await?;
        debug!("Registered {}", email);
        Ok(())
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignedIn, IdentityError> {
        let response = self.http
            .post(self.endpoint("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send().await
            .map_err(IdentityError::Transport)?;

        signed_in(check(response).await?).await
    }

    /// URL to send the browser to for an OAuth sign-in.
    pub fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> Result<Url, IdentityError> {
        Url::parse_with_params(&self.endpoint("authorize"), &[
            ("provider", provider),
            ("redirect_to", redirect_to),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "plain"),
        ])
        .map_err(|e| IdentityError::Malformed(e.to_string()))
    }

    pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<SignedIn, IdentityError> {
        let response = self.http
            .post(self.endpoint("token"))
            .query(&[("grant_type", "pkce")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "auth_code": code, "code_verifier": verifier }))
            .send().await
            .map_err(IdentityError::Transport)?;

        signed_in(check(response).await?).await
    }

    pub async fn current_user(&self, access_token: &str) -> Result<User, IdentityError> {
        let response = self.http
            .get(self.endpoint("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send().await
            .map_err(IdentityError::Transport)?;

        let user = check(response).await?
            .json::<ProviderUser>().await
            .map_err(|e| IdentityError::Malformed(e.to_string()))?;
        Ok(user.into())
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self.http
            .post(self.endpoint("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send().await
            .map_err(IdentityError::Transport)?;

        check(response).await.map(|_| ())
    }
}

/// Random PKCE verifier. With the `plain` method it doubles as the challenge.
pub fn new_code_verifier() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

async fn check(response: Response) -> Result<Response, IdentityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    let message = provider_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request rejected").to_string());
    error!("Identity provider rejected request ({}): {}", status, message);
    Err(IdentityError::Rejected(message))
}

async fn signed_in(response: Response) -> Result<SignedIn, IdentityError> {
    let token = response
        .json::<TokenResponse>().await
        .map_err(|e| IdentityError::Malformed(e.to_string()))?;

    Ok(SignedIn {
        user: token.user.into(),
        access_token: token.access_token,
    })
}

/// Human readable error text from a provider error body.
fn provider_message(body: &Value) -> Option<String> {
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
        .map(str::to_string)
}
