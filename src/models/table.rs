use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::dom::{DomTree, NodeId, TagKind};

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Collapses whitespace runs to one space, trims, and strips the field and
/// record separators so a cell can never split a row or a column.
pub fn normalize_cell_text(raw: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(raw, " ");
    collapsed.trim().replace('\t', " ").replace('\n', " ")
}

/// Normalized cell text of one table, read fresh from the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub rows: Vec<Vec<String>>,
}

impl TableSnapshot {
    /// Reads every row of `table` in document order (header, body and footer
    /// sections alike), and every header or data cell within each row.
    pub fn capture<D: DomTree + ?Sized>(dom: &D, table: NodeId) -> Self {
        let rows = dom
            .descendants_with_tag(table, &TagKind::Tr)
            .into_iter()
            .map(|row| {
                dom.descendants(row)
                    .into_iter()
                    .filter(|cell| dom.tag(*cell).is_some_and(|tag| tag.is_cell()))
                    .map(|cell| normalize_cell_text(&dom.text_content(cell)))
                    .collect::<Vec<String>>()
            })
            .collect();

        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{append_table, DomMut, Document};

    #[test]
    fn test_normalize_collapses_and_trims() {
        assert_eq!(normalize_cell_text(" Foo\n  Bar "), "Foo Bar");
        assert_eq!(normalize_cell_text("a\tb"), "a b");
        assert_eq!(normalize_cell_text("\u{a0}x\u{a0}"), "x");
        assert_eq!(normalize_cell_text("   "), "");
    }

    #[test]
    fn test_capture_reads_header_and_body_rows() {
        let mut doc = Document::new();
        let body = doc.body();
        let table = append_table(&mut doc, body, Some(&["Name", "Qty"]), &[&["Apple", "3"]]).unwrap();

        let snapshot = TableSnapshot::capture(&doc, table);
        assert_eq!(snapshot.rows, vec![vec!["Name", "Qty"], vec!["Apple", "3"]]);
        assert_eq!(snapshot.column_count(), 2);
    }

    #[test]
    fn test_capture_keeps_empty_rows() {
        let mut doc = Document::new();
        let body = doc.body();
        let table = doc.create_element(TagKind::Table);
        let tr = doc.create_element(TagKind::Tr);
        doc.append_child(table, tr).unwrap();
        doc.append_child(body, table).unwrap();

        let snapshot = TableSnapshot::capture(&doc, table);
        assert_eq!(snapshot.rows, vec![Vec::<String>::new()]);
    }
}
