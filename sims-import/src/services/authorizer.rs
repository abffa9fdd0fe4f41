//! Caller authorization
//!
//! The importer only asks "which role does this token belong to"; how that
//! is answered lives behind [`AuthorizationPort`].

use async_trait::async_trait;
use sims_common::AppRole;
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::services::identity::IdentityProvider;
use crate::services::store::RelationalStore;

pub const MISSING_AUTH_MESSAGE: &str = "Missing authorization header";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token";
pub const ADMIN_ONLY_MESSAGE: &str = "Only admins can bulk import users";

/// Why a caller role could not be established
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Token unknown, expired, or the identity provider could not check it
    #[error("{}", INVALID_TOKEN_MESSAGE)]
    InvalidToken,

    /// Token is valid but the account has no single role assignment
    #[error("No role assigned")]
    NoRole,
}

#[async_trait]
pub trait AuthorizationPort: Send + Sync {
    async fn resolve_caller_role(&self, token: &str) -> Result<AppRole, AuthError>;
}

/// Require the caller to be an admin
///
/// Invalid tokens are 401; every other outcome short of `admin` is 403.
pub async fn require_admin(port: &dyn AuthorizationPort, token: &str) -> Result<(), ApiError> {
    match port.resolve_caller_role(token).await {
        Ok(role) if role.is_admin() => Ok(()),
        Ok(role) => {
            warn!(%role, "Non-admin caller refused");
            Err(ApiError::Forbidden(ADMIN_ONLY_MESSAGE.to_string()))
        }
        Err(AuthError::InvalidToken) => {
            Err(ApiError::Unauthenticated(INVALID_TOKEN_MESSAGE.to_string()))
        }
        Err(AuthError::NoRole) => {
            warn!("Caller without role assignment refused");
            Err(ApiError::Forbidden(ADMIN_ONLY_MESSAGE.to_string()))
        }
    }
}

/// Resolves the token with the identity provider, then reads the caller's
/// row in `user_roles`
pub struct RoleTableAuthorizer {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn RelationalStore>,
}

impl RoleTableAuthorizer {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn RelationalStore>) -> Self {
        Self { identity, store }
    }
}

#[async_trait]
impl AuthorizationPort for RoleTableAuthorizer {
    async fn resolve_caller_role(&self, token: &str) -> Result<AppRole, AuthError> {
        let account = match self.identity.resolve_token(token).await {
            Ok(Some(account)) => account,
            Ok(None) => return Err(AuthError::InvalidToken),
            Err(e) => {
                warn!(error = %e, "Token resolution failed");
                return Err(AuthError::InvalidToken);
            }
        };

        match self.store.role_of(account).await {
            Ok(Some(role)) => Ok(role),
            Ok(None) => Err(AuthError::NoRole),
            Err(e) => {
                warn!(%account, error = %e, "Role lookup failed");
                Err(AuthError::NoRole)
            }
        }
    }
}
