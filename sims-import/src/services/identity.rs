//! Identity provider port and the hosted auth (GoTrue) client
//!
//! The provider owns credentials: it resolves session tokens to accounts
//! and creates confirmed accounts with the service-role key.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::error::UpstreamError;
use crate::models::{AccountId, NewAccount};
use crate::services::upstream::{build_http_client, rejection};

/// Identity provider operations used by the importer
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a session token to its account
    ///
    /// `Ok(None)` means the token is unknown or expired.
    async fn resolve_token(&self, token: &str) -> Result<Option<AccountId>, UpstreamError>;

    /// Create an account whose email is already confirmed
    async fn create_confirmed_account(
        &self,
        account: NewAccount<'_>,
    ) -> Result<AccountId, UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: AccountId,
}

/// GoTrue client for the hosted backend's `/auth/v1` API
pub struct GoTrueClient {
    http_client: Client,
    base_url: String,
    service_role_key: String,
}

impl GoTrueClient {
    pub fn new(
        base_url: &str,
        service_role_key: &str,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn resolve_token(&self, token: &str) -> Result<Option<AccountId>, UpstreamError> {
        debug!("Resolving caller token");

        let response = self
            .http_client
            .get(self.url("/user"))
            .header("apikey", &self.service_role_key)
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let user: AuthUser = response.json().await?;
                Ok(Some(user.id))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            _ => Err(rejection(response).await),
        }
    }

    async fn create_confirmed_account(
        &self,
        account: NewAccount<'_>,
    ) -> Result<AccountId, UpstreamError> {
        debug!(email = account.email, "Creating confirmed account");

        let response = self
            .http_client
            .post(self.url("/admin/users"))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .json(&json!({
                "email": account.email,
                "password": account.password,
                "email_confirm": true,
                "user_metadata": { "nama": account.nama },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let user: AuthUser = response.json().await?;
        Ok(user.id)
    }
}
