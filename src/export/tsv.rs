use anyhow::Result;

use super::Exporter;
use crate::models::{DomTree, NodeId, TableSnapshot};

/// Tab-separated rendering: tab between cells, newline between rows, no
/// quoting and no trailing separator.
pub struct TsvExporter;

impl Exporter for TsvExporter {
    fn render(&self, table: &TableSnapshot) -> Result<String> {
        Ok(to_tsv(table))
    }
}

pub fn to_tsv(table: &TableSnapshot) -> String {
    table
        .rows
        .iter()
        .map(|row| row.join("\t"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Converts the cells of `table` into the clipboard payload. Never fails;
/// an empty table yields an empty string.
pub fn serialize<D: DomTree + ?Sized>(dom: &D, table: NodeId) -> String {
    to_tsv(&TableSnapshot::capture(dom, table))
}
