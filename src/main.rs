use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use table_copy::models::append_table;
use table_copy::{
    ClipboardEnvironment, Dom, Document, DomMut, DomTree, ExtensionConfig, MemoryClipboard,
    NativeClipboard, TableCopyExtension, TagKind,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ExtensionConfig::load().unwrap_or_else(|e| {
        tracing::warn!("Using default config: {}", e);
        ExtensionConfig::default()
    });

    let memory = Arc::new(MemoryClipboard::new());
    let clipboard = if NativeClipboard::is_available() {
        ClipboardEnvironment {
            system: Some(Arc::new(NativeClipboard)),
            secure_context: true,
            legacy: memory.clone(),
        }
    } else {
        ClipboardEnvironment {
            system: None,
            secure_context: false,
            legacy: memory.clone(),
        }
    };

    let dom = Dom::new(Document::new());
    let mut extension = TableCopyExtension::new(dom.clone(), config, clipboard);
    if extension.start().is_none() {
        anyhow::bail!("table watcher could not be started");
    }

    // A chat reply streams in: first a paragraph, then a rendered table.
    let reply = dom.mutate(|tree| -> Result<_> {
        let body = tree.body();
        let message = tree.create_element(TagKind::Div);
        let intro = tree.create_element(TagKind::Paragraph);
        tree.set_text(intro, "Here is the comparison you asked for:")?;
        tree.append_child(message, intro)?;
        tree.append_child(body, message)?;
        Ok(message)
    })?;

    dom.mutate(|tree| {
        append_table(
            tree,
            reply,
            Some(&["Language", "Typing", "Notes"]),
            &[
                &["Rust", "Static", "Ownership\n  and borrowing"],
                &["Python", "Dynamic", "Batteries included"],
            ],
        )
    })?;

    tokio::time::sleep(extension.config().rescan_delay() + Duration::from_millis(50)).await;

    let Some(binding) = extension.bindings().bindings().into_iter().next() else {
        anyhow::bail!("no control was attached to the streamed table");
    };

    dom.click(binding.control);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let label = dom.read(|tree| tree.text_content(binding.control));
    println!("Control label: {}", label);
    match memory.contents() {
        Some(payload) => println!("Clipboard (fallback) payload:\n{}", payload),
        None => println!("Table copied to the system clipboard"),
    }

    Ok(())
}
