//! Bulk import endpoints
//!
//! Guards run in a fixed order and each stops the request before any row
//! is processed: authorization header, token, admin role, body, batch size.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::models::{importable_role, GeneratedCredential, ImportResponse};
use crate::services::authorizer::{require_admin, INVALID_TOKEN_MESSAGE, MISSING_AUTH_MESSAGE};
use crate::services::{parse_import_csv, validate_batch_size, RowInput};
use crate::AppState;

/// Token from the `Authorization` header, with any `Bearer ` prefix removed
pub fn bearer_token(headers: &HeaderMap) -> ApiResult<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated(MISSING_AUTH_MESSAGE.to_string()))?;

    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthenticated(INVALID_TOKEN_MESSAGE.to_string()))?;

    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        return Err(ApiError::Unauthenticated(INVALID_TOKEN_MESSAGE.to_string()));
    }
    Ok(token)
}

/// POST /bulk-import-users
///
/// Body `{ "users": [ImportRequestRow, ...] }`. The body is read raw so
/// that authorization is decided before it is parsed; malformed JSON from
/// an admin is a 500.
pub async fn import_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ImportResponse>> {
    let token = bearer_token(&headers)?;
    require_admin(state.authorizer.as_ref(), token).await?;

    let payload: Value =
        serde_json::from_slice(&body).map_err(|e| ApiError::Internal(e.to_string()))?;

    let rows = match payload {
        Value::Object(mut body) => match body.remove("users") {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    validate_batch_size(rows.len())?;

    let inputs = rows.into_iter().map(RowInput::from_value).collect();
    let report = state.importer.import(inputs).await;

    Ok(Json(report.into_response(Vec::new())))
}

#[derive(Debug, Deserialize)]
pub struct CsvImportParams {
    pub role: Option<String>,
}

/// POST /bulk-import-users/csv?role=<guru|siswa|orang_tua>
///
/// Body is a CSV file. Generated passwords of successfully created rows are
/// returned in `credentials`.
pub async fn import_users_csv(
    State(state): State<AppState>,
    Query(params): Query<CsvImportParams>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ImportResponse>> {
    let token = bearer_token(&headers)?;
    require_admin(state.authorizer.as_ref(), token).await?;

    let role = importable_role(params.role.as_deref().unwrap_or_default())
        .map_err(|e| ApiError::InvalidArgument(e.to_string()))?;

    let entries =
        parse_import_csv(&body, role).map_err(|e| ApiError::InvalidArgument(e.to_string()))?;
    validate_batch_size(entries.len())?;
    info!(%role, rows = entries.len(), "CSV upload parsed");

    let (inputs, generated): (Vec<RowInput>, Vec<Option<GeneratedCredential>>) = entries
        .into_iter()
        .map(|entry| {
            let credential = entry.generated_password.then(|| GeneratedCredential {
                email: entry.row.email.clone().unwrap_or_default(),
                password: entry.row.password.clone().unwrap_or_default(),
            });
            (RowInput::Decoded(entry.row), credential)
        })
        .unzip();

    let report = state.importer.import(inputs).await;
    let credentials = report
        .results
        .iter()
        .zip(generated)
        .filter_map(|(result, credential)| credential.filter(|_| result.success))
        .collect();

    Ok(Json(report.into_response(credentials)))
}
