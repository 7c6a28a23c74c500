pub mod csv;
pub mod json;
pub mod tsv;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::TableSnapshot;

pub use tsv::serialize;

/// Turns a captured table into the clipboard payload.
pub trait Exporter {
    fn render(&self, table: &TableSnapshot) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Tsv,
    Csv,
    Json,
}
