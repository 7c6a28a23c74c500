//! Copy controls for tables that appear in a live document.
//!
//! A [`scanner::ChangeWatcher`] notices inserted tables, the
//! [`scanner::TableScanner`] hands every table with header markup to the
//! [`scanner::ControlBinder`], and activating a control serializes the table
//! as TSV, writes it through the [`clipboard::ClipboardWriter`] and reports
//! back via the [`ui::FeedbackPresenter`].

pub mod clipboard;
pub mod config;
pub mod error;
pub mod export;
pub mod extension;
pub mod models;
pub mod scanner;
pub mod ui;

pub use clipboard::{ClipboardWriter, CopyCommand, MemoryClipboard, NativeClipboard, SystemClipboard};
pub use config::ExtensionConfig;
pub use export::serialize;
pub use extension::{ClipboardEnvironment, TableCopyExtension};
pub use models::{Dom, Document, DomMut, DomTree, NodeId, TagKind};
