use anyhow::Result;
use csv::WriterBuilder;

use super::Exporter;
use crate::models::TableSnapshot;

pub struct CsvExporter {
    delimiter: u8,
    with_bom: bool,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self {
            delimiter: b',',
            with_bom: false,
        }
    }
}

impl CsvExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Prefix output with a UTF-8 BOM (Excel compatibility).
    pub fn with_bom(mut self, with_bom: bool) -> Self {
        self.with_bom = with_bom;
        self
    }
}

impl Exporter for CsvExporter {
    fn render(&self, table: &TableSnapshot) -> Result<String> {
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_writer(Vec::new());

        for row in &table.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("CSV writer error: {}", e))?;
        let mut out = String::from_utf8(bytes)?;
        if self.with_bom {
            out.insert(0, '\u{feff}');
        }
        Ok(out)
    }
}
