//! Batch user importer
//!
//! Rows are processed strictly one at a time in input order. Each row is
//! isolated: validation failures, upstream rejections and even panics in an
//! adapter are recorded as that row's result and the loop moves on. A row's
//! three writes (account, role assignment, profile) are not transactional;
//! an account whose later writes fail is left in place.

use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{ApiError, UpstreamError};
use crate::models::{
    AccountId, GeneratedCredential, GuruRecord, ImportRequestRow, ImportResponse,
    ImportResultRow, NewAccount, NewUser, OrangTuaRecord, ProfileRecord, RoleAssignment,
    RoleProfile, SiswaRecord, MAX_BATCH_SIZE, UNKNOWN_EMAIL,
};
use crate::services::identity::IdentityProvider;
use crate::services::store::RelationalStore;

pub const NO_USERS_MESSAGE: &str = "No users provided";
pub const BATCH_TOO_LARGE_MESSAGE: &str = "Maximum 50 users per batch";

/// Prefix of undecodable row errors
pub const INVALID_ENTRY_MESSAGE: &str = "Invalid user entry";

/// Prefix of generated student numbers
pub const FALLBACK_NIS_PREFIX: &str = "NIS-";

/// Reject empty and oversized batches before any row is touched
pub fn validate_batch_size(len: usize) -> Result<(), ApiError> {
    if len == 0 {
        return Err(ApiError::InvalidArgument(NO_USERS_MESSAGE.to_string()));
    }
    if len > MAX_BATCH_SIZE {
        return Err(ApiError::InvalidArgument(BATCH_TOO_LARGE_MESSAGE.to_string()));
    }
    Ok(())
}

/// Wall clock used for fallback student numbers
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        sims_common::time::now_millis()
    }
}

/// Student number for rows that did not supply `nis`
///
/// Millisecond resolution only; two rows created in the same millisecond
/// get the same value and the store's uniqueness constraint decides.
pub fn fallback_nis(millis: i64) -> String {
    format!("{}{}", FALLBACK_NIS_PREFIX, millis)
}

/// One entry of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum RowInput {
    Decoded(ImportRequestRow),
    /// The submitted value was not a row object
    Undecodable { email: String, error: String },
}

impl RowInput {
    /// Decode one element of the `users` array
    pub fn from_value(value: Value) -> Self {
        let email = value
            .get("email")
            .and_then(Value::as_str)
            .filter(|e| !e.is_empty())
            .unwrap_or(UNKNOWN_EMAIL)
            .to_string();

        if !value.is_object() {
            return RowInput::Undecodable {
                email,
                error: format!("{}: expected an object", INVALID_ENTRY_MESSAGE),
            };
        }

        match serde_json::from_value::<ImportRequestRow>(value) {
            Ok(row) => RowInput::Decoded(row),
            Err(e) => RowInput::Undecodable {
                email,
                error: format!("{}: {}", INVALID_ENTRY_MESSAGE, e),
            },
        }
    }
}

/// Failure of a row after validation passed
#[derive(Debug, Error)]
pub enum RowFailure {
    #[error("{0}")]
    AccountCreation(UpstreamError),

    #[error("User created but role assignment failed: {0}")]
    RoleAssignment(UpstreamError),

    #[error("User created but {table} record failed: {source}")]
    Profile {
        table: &'static str,
        source: UpstreamError,
    },
}

/// Results of one batch, in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub results: Vec<ImportResultRow>,
}

impl ImportReport {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    pub fn message(&self) -> String {
        format!(
            "Import completed: {} success, {} failed",
            self.success_count(),
            self.failure_count()
        )
    }

    pub fn into_response(self, credentials: Vec<GeneratedCredential>) -> ImportResponse {
        ImportResponse {
            message: self.message(),
            results: self.results,
            credentials,
        }
    }
}

pub struct BatchImporter {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn RelationalStore>,
    clock: Arc<dyn Clock>,
}

impl BatchImporter {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn RelationalStore>) -> Self {
        Self {
            identity,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Process every row and report one result per row
    ///
    /// Batch size is the caller's concern; see [`validate_batch_size`].
    pub async fn import(&self, rows: Vec<RowInput>) -> ImportReport {
        info!(rows = rows.len(), "Starting bulk import");

        let mut results = Vec::with_capacity(rows.len());
        for (index, input) in rows.into_iter().enumerate() {
            let result = match input {
                RowInput::Decoded(row) => self.import_isolated(&row).await,
                RowInput::Undecodable { email, error } => ImportResultRow::failed(email, error),
            };

            match &result.error {
                Some(error) => {
                    warn!(row = index, email = %result.email, %error, "Row import failed")
                }
                None => debug!(row = index, email = %result.email, "Row imported"),
            }
            results.push(result);
        }

        let report = ImportReport { results };
        info!(
            success = report.success_count(),
            failed = report.failure_count(),
            "Bulk import finished"
        );
        report
    }

    /// Import one row, converting a panic into a failed result
    async fn import_isolated(&self, row: &ImportRequestRow) -> ImportResultRow {
        match AssertUnwindSafe(self.import_row(row)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => ImportResultRow::failed(row.reported_email(), panic_message(&*payload)),
        }
    }

    pub async fn import_row(&self, row: &ImportRequestRow) -> ImportResultRow {
        let user = match NewUser::from_row(row) {
            Ok(user) => user,
            Err(e) => return ImportResultRow::failed(row.reported_email(), e.to_string()),
        };

        match self.create_user(&user).await {
            Ok(account) => {
                debug!(email = %user.email, %account, role = %user.role(), "User created");
                ImportResultRow::succeeded(user.email)
            }
            Err(failure) => ImportResultRow::failed(user.email, failure.to_string()),
        }
    }

    async fn create_user(&self, user: &NewUser) -> Result<AccountId, RowFailure> {
        let account = self
            .identity
            .create_confirmed_account(NewAccount::from(user))
            .await
            .map_err(RowFailure::AccountCreation)?;

        self.store
            .insert_role_assignment(&RoleAssignment {
                user_id: account,
                role: user.role(),
            })
            .await
            .map_err(RowFailure::RoleAssignment)?;

        let profile = self.profile_record(account, &user.profile);
        self.store
            .insert_profile(&profile)
            .await
            .map_err(|source| RowFailure::Profile {
                table: profile.table(),
                source,
            })?;

        Ok(account)
    }

    fn profile_record(&self, user_id: AccountId, profile: &RoleProfile) -> ProfileRecord {
        match profile {
            RoleProfile::Guru { nip } => ProfileRecord::Guru(GuruRecord {
                user_id,
                nip: nip.clone(),
            }),
            RoleProfile::Siswa {
                nis,
                kelas_id,
                tanggal_lahir,
                alamat,
            } => ProfileRecord::Siswa(SiswaRecord {
                user_id,
                nis: nis
                    .clone()
                    .unwrap_or_else(|| fallback_nis(self.clock.now_millis())),
                kelas_id: kelas_id.clone(),
                tanggal_lahir: tanggal_lahir.clone(),
                alamat: alamat.clone(),
            }),
            RoleProfile::OrangTua { telepon, alamat } => ProfileRecord::OrangTua(OrangTuaRecord {
                user_id,
                telepon: telepon.clone(),
                alamat: alamat.clone(),
            }),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "Unknown error".to_string()
    }
}
