use anyhow::Result;

use super::Exporter;
use crate::models::TableSnapshot;

/// Renders the table as a JSON array of row arrays.
pub struct JsonExporter {
    pretty: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self { pretty: false }
    }
}

impl JsonExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Exporter for JsonExporter {
    fn render(&self, table: &TableSnapshot) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(&table.rows)?
        } else {
            serde_json::to_string(&table.rows)?
        };
        Ok(json)
    }
}
