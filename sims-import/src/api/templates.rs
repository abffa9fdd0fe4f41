//! CSV templates for the upload form

use axum::{
    extract::Path,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::IntoResponse,
    routing::get,
    Router,
};
use sims_common::AppRole;

use crate::error::{ApiError, ApiResult};
use crate::models::importable_role;
use crate::AppState;

/// Header line plus one example row
pub fn template_csv(role: AppRole) -> Option<&'static str> {
    match role {
        AppRole::Guru => Some(
            "nama,email,password,nip\n\
             Budi Santoso,budi@example.com,password123,123456789\n",
        ),
        AppRole::Siswa => Some(
            "nama,email,password,nis\n\
             Siti Aminah,siti@example.com,password123,2024001\n",
        ),
        AppRole::OrangTua => Some(
            "nama,email,password,telepon,alamat\n\
             Ahmad Hidayat,ahmad@example.com,password123,081234567890,Jl. Merdeka 1\n",
        ),
        AppRole::Admin => None,
    }
}

/// GET /templates/:role
pub async fn download_template(Path(role): Path<String>) -> ApiResult<impl IntoResponse> {
    let role = importable_role(&role).map_err(|e| ApiError::InvalidArgument(e.to_string()))?;
    let body = template_csv(role)
        .ok_or_else(|| ApiError::InvalidArgument(format!("Invalid role: {}", role)))?;

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"template_{}.csv\"", role),
            ),
        ],
        body,
    ))
}

pub fn template_routes() -> Router<AppState> {
    Router::new().route("/templates/:role", get(download_template))
}
