//! Relational store port and the PostgREST client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sims_common::AppRole;
use std::time::Duration;
use tracing::debug;

use crate::error::UpstreamError;
use crate::models::{AccountId, ProfileRecord, RoleAssignment};
use crate::services::upstream::{build_http_client, rejection};

/// Relational store operations used by the importer
///
/// Each call is a single-row read or write; uniqueness and foreign keys
/// are enforced by the store.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Role of an account
    ///
    /// `Ok(None)` unless exactly one `user_roles` row exists.
    async fn role_of(&self, account: AccountId) -> Result<Option<AppRole>, UpstreamError>;

    async fn insert_role_assignment(
        &self,
        assignment: &RoleAssignment,
    ) -> Result<(), UpstreamError>;

    async fn insert_profile(&self, profile: &ProfileRecord) -> Result<(), UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    role: AppRole,
}

/// PostgREST client for the hosted backend's `/rest/v1` API
///
/// Authenticates with the service-role key, which bypasses row-level
/// security.
pub struct PostgrestStore {
    http_client: Client,
    base_url: String,
    service_role_key: String,
}

impl PostgrestStore {
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

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<(), UpstreamError> {
        debug!(table, "Inserting row");

        let response = self
            .http_client
            .post(self.table_url(table))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl RelationalStore for PostgrestStore {
    async fn role_of(&self, account: AccountId) -> Result<Option<AppRole>, UpstreamError> {
        let user_filter = format!("eq.{}", account);
        let response = self
            .http_client
            .get(self.table_url("user_roles"))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .query(&[("select", "role"), ("user_id", user_filter.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let rows: Vec<RoleRow> = response.json().await?;
        match rows.as_slice() {
            [only] => Ok(Some(only.role)),
            _ => Ok(None),
        }
    }

    async fn insert_role_assignment(
        &self,
        assignment: &RoleAssignment,
    ) -> Result<(), UpstreamError> {
        self.insert("user_roles", assignment).await
    }

    async fn insert_profile(&self, profile: &ProfileRecord) -> Result<(), UpstreamError> {
        self.insert(profile.table(), profile).await
    }
}
