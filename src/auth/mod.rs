//! Session credentials.
//!
//! Online-mode servers only admit a client after it has told the session
//! server which server hash it is joining. The connection does that through
//! [`AuthToken`]; [`SessionToken`] is the implementation backed by the
//! Mojang session and profile services.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common::error::AuthError;
use crate::config::types::AccountConfig;

pub const SESSION_SERVER: &str = "https://sessionserver.mojang.com/session/minecraft";
pub const PROFILE_URL: &str = "https://api.minecraftservices.com/minecraft/profile";

/// Credential handed to a connection for online-mode logins.
pub trait AuthToken: Send + Sync {
    fn is_valid(&self) -> bool;

    /// Tell the session server we are joining the server identified by
    /// `server_hash`.
    fn join(&self, server_hash: &str) -> impl Future<Output = Result<(), AuthError>> + Send;
}

/// Player profile as returned by the profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    /// Undashed UUID.
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest<'a> {
    access_token: &'a str,
    selected_profile: &'a str,
    server_id: &'a str,
}

/// Bearer access token for the Minecraft services.
#[derive(Debug, Clone)]
pub struct SessionToken {
    access_token: String,
    token_type: String,
    profile_id: Option<String>,
    created_at: DateTime<Utc>,
    expires_in: Option<Duration>,
    http: reqwest::Client,
}

impl SessionToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            profile_id: None,
            created_at: Utc::now(),
            expires_in: None,
            http: reqwest::Client::new(),
        }
    }

    /// Build a token from the account section. `None` when no access token
    /// is configured.
    pub fn from_config(account: &AccountConfig) -> Option<Self> {
        let access_token = account.access_token.as_deref()?;
        let mut token = Self::new(access_token);
        if let Some(ref token_type) = account.token_type {
            token.token_type = token_type.clone();
        }
        token.expires_in = account.expires_in.and_then(Duration::try_seconds);
        token.profile_id = account.profile_id.clone();
        Some(token)
    }

    pub fn with_profile_id(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }

    pub fn with_expiry(mut self, created_at: DateTime<Utc>, expires_in: Duration) -> Self {
        self.created_at = created_at;
        self.expires_in = Some(expires_in);
        self
    }

    pub fn profile_id(&self) -> Option<&str> {
        self.profile_id.as_deref()
    }

    /// `None` for tokens of unknown lifetime.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in.map(|lifetime| self.created_at + lifetime)
    }

    /// Replace the access token after it was renewed elsewhere.
    pub fn refresh(&mut self, access_token: impl Into<String>, expires_in: Option<Duration>) {
        self.access_token = access_token.into();
        self.created_at = Utc::now();
        self.expires_in = expires_in;
        info!("Access token refreshed");
    }

    fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Fetch the profile that owns this token.
    pub async fn fetch_profile(&self) -> Result<Profile, AuthError> {
        if !self.is_valid() {
            return Err(AuthError::TokenExpired);
        }

        let response = self
            .http
            .get(PROFILE_URL)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Session {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let profile: Profile = response.json().await?;
        debug!("Resolved profile {} ({})", profile.name, profile.id);
        Ok(profile)
    }

    /// Look the profile id up once and keep it.
    pub async fn resolve_profile_id(&mut self) -> Result<&str, AuthError> {
        if self.profile_id.is_none() {
            self.profile_id = Some(self.fetch_profile().await?.id);
        }
        Ok(self.profile_id.as_deref().unwrap_or_default())
    }
}

impl AuthToken for SessionToken {
    fn is_valid(&self) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expires_at() {
            Some(expires_at) => expires_at > Utc::now(),
            None => true,
        }
    }

    async fn join(&self, server_hash: &str) -> Result<(), AuthError> {
        let profile_id = match self.profile_id {
            Some(ref id) => id.clone(),
            None => self.fetch_profile().await?.id,
        };

        let request = JoinRequest {
            access_token: &self.access_token,
            selected_profile: &profile_id,
            server_id: server_hash,
        };

        let response = self
            .http
            .post(format!("{}/join", SESSION_SERVER))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Session {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        debug!("Joined session for server hash {}", server_hash);
        Ok(())
    }
}
