//! CSV upload parsing for bulk import
//!
//! Header names are matched case-insensitively after trimming. Rows that
//! lack `nama` or `email` are skipped, matching the import dialog's
//! behaviour. Rows without a password get a generated one.

use sims_common::AppRole;
use thiserror::Error;

use crate::models::ImportRequestRow;
use crate::services::password::generate_password;

/// UTF-8 BOM bytes.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Error)]
pub enum CsvParseError {
    #[error("Failed to read CSV headers: {0}")]
    Headers(csv::Error),

    #[error("Failed to parse CSV line {line}: {source}")]
    Record { line: usize, source: csv::Error },
}

/// One usable CSV row
#[derive(Debug, Clone, PartialEq)]
pub struct CsvEntry {
    pub row: ImportRequestRow,
    /// The password was generated rather than read from the file
    pub generated_password: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Nama,
    Email,
    Password,
    Nip,
    Nis,
    KelasId,
    TanggalLahir,
    Alamat,
    Telepon,
}

impl Column {
    fn from_header(header: &str) -> Option<Self> {
        match header.trim().to_lowercase().as_str() {
            "nama" | "name" => Some(Column::Nama),
            "email" => Some(Column::Email),
            "password" => Some(Column::Password),
            "nip" => Some(Column::Nip),
            "nis" => Some(Column::Nis),
            "kelas_id" => Some(Column::KelasId),
            "tanggal_lahir" => Some(Column::TanggalLahir),
            "alamat" => Some(Column::Alamat),
            "telepon" => Some(Column::Telepon),
            _ => None,
        }
    }
}

/// Parse CSV data into import rows for `role`
pub fn parse_import_csv(data: &[u8], role: AppRole) -> Result<Vec<CsvEntry>, CsvParseError> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let columns: Vec<Option<Column>> = reader
        .headers()
        .map_err(CsvParseError::Headers)?
        .iter()
        .map(Column::from_header)
        .collect();

    let mut entries = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2; // header is line 1
        let record = record.map_err(|source| CsvParseError::Record { line, source })?;

        let mut row = ImportRequestRow {
            role: Some(role.as_str().to_string()),
            ..Default::default()
        };
        for (column, value) in columns.iter().zip(record.iter()) {
            let Some(column) = column else { continue };
            if value.is_empty() {
                continue;
            }
            let value = Some(value.to_string());
            match column {
                Column::Nama => row.nama = value,
                Column::Email => row.email = value,
                Column::Password => row.password = value,
                Column::Nip => row.nip = value,
                Column::Nis => row.nis = value,
                Column::KelasId => row.kelas_id = value,
                Column::TanggalLahir => row.tanggal_lahir = value,
                Column::Alamat => row.alamat = value,
                Column::Telepon => row.telepon = value,
            }
        }

        if row.nama.is_none() || row.email.is_none() {
            continue;
        }

        let generated_password = row.password.is_none();
        if generated_password {
            row.password = Some(generate_password());
        }

        entries.push(CsvEntry {
            row,
            generated_password,
        });
    }

    Ok(entries)
}
