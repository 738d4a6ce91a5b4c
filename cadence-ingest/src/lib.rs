//! cadence-ingest: CSV import of recurring obligations and the frequency
//! phrase grammar used by both the importer and the CLI.

pub mod csv_import;
pub mod frequency;

pub use csv_import::{import_obligations_csv, parse_mode, parse_obligations, parse_reminder};
pub use frequency::{parse_frequency, parse_weekdays};
