//! Application roles
//!
//! Mirrors the `app_role` enum of the school database. Every account has
//! exactly one row in `user_roles`; non-admin roles additionally own one
//! profile row in a role-specific table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Role assigned to an account in the `user_roles` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppRole {
    Admin,
    /// Teacher
    Guru,
    /// Student
    Siswa,
    /// Parent / guardian
    OrangTua,
}

impl AppRole {
    /// All roles in declaration order
    pub const ALL: [AppRole; 4] = [
        AppRole::Admin,
        AppRole::Guru,
        AppRole::Siswa,
        AppRole::OrangTua,
    ];

    /// Database enum literal
    pub fn as_str(&self) -> &'static str {
        match self {
            AppRole::Admin => "admin",
            AppRole::Guru => "guru",
            AppRole::Siswa => "siswa",
            AppRole::OrangTua => "orang_tua",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, AppRole::Admin)
    }
}

impl fmt::Display for AppRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Invalid role: {}", s)))
    }
}
