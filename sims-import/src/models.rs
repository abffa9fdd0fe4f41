//! Request and response types for the bulk import API
//!
//! Field names follow the school database (`nama`, `nip`, `nis`, ...).

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sims_common::AppRole;
use uuid::Uuid;

/// Largest batch accepted by one import call
pub const MAX_BATCH_SIZE: usize = 50;

/// Email echoed for rows that did not supply one
pub const UNKNOWN_EMAIL: &str = "unknown";

pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields (email, nama, password, role)";

/// Identity provider account id
pub type AccountId = Uuid;

/// One prospective account as submitted
///
/// Parsed leniently: every field may be absent or `null`, and numbers or
/// booleans are taken as their text (spreadsheet exports often send `nip`
/// or `telepon` as numbers). Validation into a [`NewUser`] happens per row
/// so a bad row only fails itself.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportRequestRow {
    #[serde(deserialize_with = "scalar_text")]
    pub nama: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub password: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub role: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub nip: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub nis: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub kelas_id: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub tanggal_lahir: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub alamat: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub telepon: Option<String>,
}

/// Accept a string, number or boolean as text; `null` is absent
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) => Err(de::Error::custom("expected text, found a list")),
        Value::Object(_) => Err(de::Error::custom("expected text, found an object")),
    }
}

impl ImportRequestRow {
    /// Email to report for this row, `"unknown"` when absent or empty
    pub fn reported_email(&self) -> String {
        present(&self.email).unwrap_or_else(|| UNKNOWN_EMAIL.to_string())
    }
}

/// Role-specific profile fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleProfile {
    Guru {
        nip: Option<String>,
    },
    Siswa {
        nis: Option<String>,
        kelas_id: Option<String>,
        tanggal_lahir: Option<String>,
        alamat: Option<String>,
    },
    OrangTua {
        telepon: Option<String>,
        alamat: Option<String>,
    },
}

impl RoleProfile {
    pub fn role(&self) -> AppRole {
        match self {
            RoleProfile::Guru { .. } => AppRole::Guru,
            RoleProfile::Siswa { .. } => AppRole::Siswa,
            RoleProfile::OrangTua { .. } => AppRole::OrangTua,
        }
    }
}

/// A validated row, ready to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub nama: String,
    pub email: String,
    pub password: String,
    pub profile: RoleProfile,
}

/// Why a row was refused before any upstream call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowValidationError {
    #[error("{}", MISSING_FIELDS_MESSAGE)]
    MissingFields,

    /// Role is not one that can be bulk-created
    #[error("Invalid role: {0}")]
    InvalidRole(String),
}

impl NewUser {
    /// Validate a raw row
    ///
    /// Empty strings count as missing. Only `guru`, `siswa` and `orang_tua`
    /// can be created; `admin` and unknown literals are refused.
    pub fn from_row(row: &ImportRequestRow) -> Result<Self, RowValidationError> {
        let (Some(email), Some(nama), Some(password), Some(role)) = (
            present(&row.email),
            present(&row.nama),
            present(&row.password),
            present(&row.role),
        ) else {
            return Err(RowValidationError::MissingFields);
        };

        let profile = match role.parse::<AppRole>() {
            Ok(AppRole::Guru) => RoleProfile::Guru {
                nip: present(&row.nip),
            },
            Ok(AppRole::Siswa) => RoleProfile::Siswa {
                nis: present(&row.nis),
                kelas_id: present(&row.kelas_id),
                tanggal_lahir: present(&row.tanggal_lahir),
                alamat: present(&row.alamat),
            },
            Ok(AppRole::OrangTua) => RoleProfile::OrangTua {
                telepon: present(&row.telepon),
                alamat: present(&row.alamat),
            },
            Ok(AppRole::Admin) | Err(_) => return Err(RowValidationError::InvalidRole(role)),
        };

        Ok(Self {
            nama,
            email,
            password,
            profile,
        })
    }

    pub fn role(&self) -> AppRole {
        self.profile.role()
    }
}

/// Parse a role literal that may be bulk-created
pub fn importable_role(literal: &str) -> Result<AppRole, RowValidationError> {
    match literal.parse::<AppRole>() {
        Ok(role) if !role.is_admin() => Ok(role),
        _ => Err(RowValidationError::InvalidRole(literal.to_string())),
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Account creation request for the identity provider
#[derive(Debug, Clone, Copy)]
pub struct NewAccount<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub nama: &'a str,
}

impl<'a> From<&'a NewUser> for NewAccount<'a> {
    fn from(user: &'a NewUser) -> Self {
        Self {
            email: &user.email,
            password: &user.password,
            nama: &user.nama,
        }
    }
}

/// Row inserted into the `user_roles` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleAssignment {
    pub user_id: AccountId,
    pub role: AppRole,
}

/// Row inserted into the `guru` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuruRecord {
    pub user_id: AccountId,
    pub nip: Option<String>,
}

/// Row inserted into the `siswa` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiswaRecord {
    pub user_id: AccountId,
    pub nis: String,
    pub kelas_id: Option<String>,
    pub tanggal_lahir: Option<String>,
    pub alamat: Option<String>,
}

/// Row inserted into the `orang_tua` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrangTuaRecord {
    pub user_id: AccountId,
    pub telepon: Option<String>,
    pub alamat: Option<String>,
}

/// Role-specific profile row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProfileRecord {
    Guru(GuruRecord),
    Siswa(SiswaRecord),
    OrangTua(OrangTuaRecord),
}

impl ProfileRecord {
    /// Destination table
    pub fn table(&self) -> &'static str {
        match self {
            ProfileRecord::Guru(_) => "guru",
            ProfileRecord::Siswa(_) => "siswa",
            ProfileRecord::OrangTua(_) => "orang_tua",
        }
    }

    pub fn user_id(&self) -> AccountId {
        match self {
            ProfileRecord::Guru(r) => r.user_id,
            ProfileRecord::Siswa(r) => r.user_id,
            ProfileRecord::OrangTua(r) => r.user_id,
        }
    }
}

/// Outcome for one input row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResultRow {
    pub success: bool,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportResultRow {
    pub fn succeeded(email: impl Into<String>) -> Self {
        Self {
            success: true,
            email: email.into(),
            error: None,
        }
    }

    pub fn failed(email: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            email: email.into(),
            error: Some(error.into()),
        }
    }
}

/// Password generated for a CSV row that had none
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCredential {
    pub email: String,
    pub password: String,
}

/// Response body of a completed import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResponse {
    pub message: String,
    pub results: Vec<ImportResultRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<GeneratedCredential>,
}

/// Error body for non-200 responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> ImportRequestRow {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_guru_row_validates() {
        let user = NewUser::from_row(&row(json!({
            "nama": "Budi", "email": "budi@x.com", "password": "secret1",
            "role": "guru", "nip": "123"
        })))
        .unwrap();

        assert_eq!(user.role(), AppRole::Guru);
        assert_eq!(
            user.profile,
            RoleProfile::Guru {
                nip: Some("123".into())
            }
        );
    }

    #[test]
    fn test_empty_strings_count_as_missing() {
        let err = NewUser::from_row(&row(json!({
            "nama": "", "email": "a@x.com", "password": "p", "role": "siswa"
        })))
        .unwrap_err();
        assert_eq!(err, RowValidationError::MissingFields);
        assert_eq!(err.to_string(), MISSING_FIELDS_MESSAGE);
    }

    #[test]
    fn test_numeric_fields_are_taken_as_text() {
        let parsed = row(json!({
            "nama": "Budi", "email": "budi@x.com", "password": 123456,
            "role": "guru", "nip": 197001012000_u64, "telepon": 81234567890_u64
        }));
        assert_eq!(parsed.nip.as_deref(), Some("197001012000"));
        assert_eq!(parsed.password.as_deref(), Some("123456"));
        assert_eq!(parsed.telepon.as_deref(), Some("81234567890"));

        let user = NewUser::from_row(&parsed).unwrap();
        assert_eq!(
            user.profile,
            RoleProfile::Guru {
                nip: Some("197001012000".into())
            }
        );
    }

    #[test]
    fn test_nested_values_are_refused() {
        let err = serde_json::from_value::<ImportRequestRow>(json!({"nis": {"value": "1"}}))
            .unwrap_err();
        assert_eq!(err.to_string(), "expected text, found an object");
    }

    #[test]
    fn test_empty_optional_fields_become_none() {
        let user = NewUser::from_row(&row(json!({
            "nama": "Siti", "email": "siti@x.com", "password": "p", "role": "siswa",
            "nis": "", "kelas_id": null, "alamat": "Jl. Mawar 2"
        })))
        .unwrap();
        assert_eq!(
            user.profile,
            RoleProfile::Siswa {
                nis: None,
                kelas_id: None,
                tanggal_lahir: None,
                alamat: Some("Jl. Mawar 2".into()),
            }
        );
    }

    #[test]
    fn test_admin_and_unknown_roles_are_refused() {
        for role in ["admin", "kepala_sekolah"] {
            let err = NewUser::from_row(&row(json!({
                "nama": "X", "email": "x@x.com", "password": "p", "role": role
            })))
            .unwrap_err();
            assert_eq!(err, RowValidationError::InvalidRole(role.to_string()));
        }
    }

    #[test]
    fn test_importable_role() {
        assert_eq!(importable_role("orang_tua"), Ok(AppRole::OrangTua));
        assert!(importable_role("admin").is_err());
        assert!(importable_role("").is_err());
    }

    #[test]
    fn test_reported_email_falls_back_to_unknown() {
        assert_eq!(row(json!({})).reported_email(), UNKNOWN_EMAIL);
        assert_eq!(row(json!({"email": ""})).reported_email(), UNKNOWN_EMAIL);
        assert_eq!(row(json!({"email": "a@x.com"})).reported_email(), "a@x.com");
    }

    #[test]
    fn test_result_row_omits_error_on_success() {
        let ok = serde_json::to_value(ImportResultRow::succeeded("budi@x.com")).unwrap();
        assert_eq!(ok, json!({"success": true, "email": "budi@x.com"}));

        let failed = serde_json::to_value(ImportResultRow::failed("a@x.com", "boom")).unwrap();
        assert_eq!(failed, json!({"success": false, "email": "a@x.com", "error": "boom"}));
    }

    #[test]
    fn test_profile_record_serializes_nulls() {
        let id = Uuid::nil();
        let record = ProfileRecord::OrangTua(OrangTuaRecord {
            user_id: id,
            telepon: None,
            alamat: Some("Jl. Merdeka 1".into()),
        });
        assert_eq!(record.table(), "orang_tua");
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"user_id": id, "telepon": null, "alamat": "Jl. Merdeka 1"})
        );
    }
}
