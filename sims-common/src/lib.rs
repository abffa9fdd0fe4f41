//! # SIMS Common Library
//!
//! Shared code for school information services including:
//! - Application roles
//! - Bootstrap configuration loading
//! - Common error types
//! - Time utilities

pub mod config;
pub mod error;
pub mod roles;
pub mod time;

pub use error::{Error, Result};
pub use roles::AppRole;
