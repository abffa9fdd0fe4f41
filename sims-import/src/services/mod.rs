//! Import services: upstream ports and adapters, the batch loop, CSV intake

pub mod authorizer;
pub mod csv_parser;
pub mod identity;
pub mod importer;
pub mod password;
pub mod pg_store;
pub mod store;
pub mod upstream;

pub use authorizer::{require_admin, AuthError, AuthorizationPort, RoleTableAuthorizer};
pub use csv_parser::{parse_import_csv, CsvEntry, CsvParseError};
pub use identity::{GoTrueClient, IdentityProvider};
pub use importer::{validate_batch_size, BatchImporter, Clock, ImportReport, RowInput, SystemClock};
pub use pg_store::PgStore;
pub use store::{PostgrestStore, RelationalStore};
