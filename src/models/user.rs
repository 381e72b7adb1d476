// src/models/user.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Only the literal `admin` tag grants the admin role.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("admin") => Role::Admin,
            _ => Role::User,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// User object as returned by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub role: Role,
}

impl From<ProviderUser> for User {
    fn from(user: ProviderUser) -> Self {
        let metadata = user.user_metadata.unwrap_or_default();
        Self {
            id: user.id,
            email: user.email.unwrap_or_default(),
            username: metadata.username.filter(|name| !name.trim().is_empty()),
            role: Role::from_tag(metadata.role.as_deref()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub created_at: u64,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }
}
