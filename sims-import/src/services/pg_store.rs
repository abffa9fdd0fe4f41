//! Direct Postgres implementation of the relational store
//!
//! Used when the service runs next to the database and is given a
//! connection string instead of going through PostgREST.

use async_trait::async_trait;
use sims_common::AppRole;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;
use tracing::debug;

use crate::error::UpstreamError;
use crate::models::{AccountId, ProfileRecord, RoleAssignment};
use crate::services::store::RelationalStore;

const MAX_CONNECTIONS: u32 = 5;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, UpstreamError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationalStore for PgStore {
    async fn role_of(&self, account: AccountId) -> Result<Option<AppRole>, UpstreamError> {
        let roles: Vec<String> = sqlx::query_scalar::<_, String>(
            "SELECT role::text FROM user_roles WHERE user_id = $1",
        )
        .bind(account)
        .fetch_all(&self.pool)
        .await?;

        match roles.as_slice() {
            [only] => only
                .parse::<AppRole>()
                .map(Some)
                .map_err(|e| UpstreamError::Parse(e.to_string())),
            _ => Ok(None),
        }
    }

    async fn insert_role_assignment(
        &self,
        assignment: &RoleAssignment,
    ) -> Result<(), UpstreamError> {
        debug!(table = "user_roles", user_id = %assignment.user_id, "Inserting row");
        sqlx::query::<Postgres>(
            "INSERT INTO user_roles (user_id, role) VALUES ($1, $2::text::app_role)",
        )
        .bind(assignment.user_id)
        .bind(assignment.role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_profile(&self, profile: &ProfileRecord) -> Result<(), UpstreamError> {
        debug!(table = profile.table(), user_id = %profile.user_id(), "Inserting row");

        let query = match profile {
            ProfileRecord::Guru(r) => {
                sqlx::query::<Postgres>("INSERT INTO guru (user_id, nip) VALUES ($1, $2)")
                    .bind(r.user_id)
                    .bind(r.nip.as_deref())
            }
            ProfileRecord::Siswa(r) => sqlx::query::<Postgres>(
                "INSERT INTO siswa (user_id, nis, kelas_id, tanggal_lahir, alamat) \
                 VALUES ($1, $2, $3::text::uuid, $4::text::date, $5)",
            )
            .bind(r.user_id)
            .bind(r.nis.as_str())
            .bind(r.kelas_id.as_deref())
            .bind(r.tanggal_lahir.as_deref())
            .bind(r.alamat.as_deref()),
            ProfileRecord::OrangTua(r) => sqlx::query::<Postgres>(
                "INSERT INTO orang_tua (user_id, telepon, alamat) VALUES ($1, $2, $3)",
            )
            .bind(r.user_id)
            .bind(r.telepon.as_deref())
            .bind(r.alamat.as_deref()),
        };

        query.execute(&self.pool).await?;
        Ok(())
    }
}
