//! Clipboard writing with a legacy fallback.
//!
//! The primary path hands text to an asynchronous system clipboard service,
//! which is only trusted in a secure context. A rejection from that service
//! is a failed copy. Without the service the text goes through an off-screen
//! `textarea` that is focused, selected and copied with the environment's
//! legacy copy command.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::error::{ClipboardError, DomError};
use crate::models::{Dom, DomMut, DomTree, NodeId, TagKind};

#[async_trait]
pub trait SystemClipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// The environment's synchronous "copy current selection" command.
pub trait CopyCommand: Send + Sync {
    fn exec_copy(&self, selection: Option<&str>) -> bool;
}

pub struct ClipboardWriter {
    dom: Dom,
    primary: Option<Arc<dyn SystemClipboard>>,
    secure_context: bool,
    legacy: Arc<dyn CopyCommand>,
}

impl ClipboardWriter {
    pub fn new(
        dom: Dom,
        primary: Option<Arc<dyn SystemClipboard>>,
        secure_context: bool,
        legacy: Arc<dyn CopyCommand>,
    ) -> Self {
        Self {
            dom,
            primary,
            secure_context,
            legacy,
        }
    }

    pub fn primary_available(&self) -> bool {
        self.primary.is_some() && self.secure_context
    }

    /// Writes `text` to the clipboard. Never returns an error; a rejected
    /// write or a failed legacy copy comes back as `false`.
    pub async fn write(&self, text: &str) -> bool {
        match self.primary.as_ref().filter(|_| self.secure_context) {
            Some(primary) => match primary.write_text(text).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Clipboard write rejected: {}", e);
                    false
                }
            },
            None => {
                debug!("System clipboard unavailable, using legacy copy");
                self.fallback_copy(text)
            }
        }
    }

    fn fallback_copy(&self, text: &str) -> bool {
        let legacy = self.legacy.clone();
        self.dom.mutate(|tree| {
            let helper = tree.create_element(TagKind::Textarea);
            let copied = copy_through_helper(tree, helper, text, legacy.as_ref())
                .unwrap_or_else(|e| {
                    warn!("Legacy copy could not prepare its selection: {}", e);
                    false
                });

            if let Err(e) = tree.remove(helper) {
                warn!("Failed to remove clipboard helper: {}", e);
            }
            copied
        })
    }
}

fn copy_through_helper(
    tree: &mut dyn DomMut,
    helper: NodeId,
    text: &str,
    legacy: &dyn CopyCommand,
) -> Result<bool, DomError> {
    tree.set_value(helper, text)?;
    tree.set_style(helper, "position", "fixed")?;
    tree.set_style(helper, "left", "-999999px")?;
    tree.set_style(helper, "top", "-999999px")?;
    let body = tree.body();
    tree.append_child(body, helper)?;
    tree.focus(helper)?;
    tree.select_contents(helper)?;

    let selection = tree.selection();
    Ok(legacy.exec_copy(selection.as_deref()))
}

/// Process-local clipboard. Either path can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
    reject_writes: AtomicBool,
    legacy_fails: AtomicBool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn set_legacy_fails(&self, fails: bool) {
        self.legacy_fails.store(fails, Ordering::SeqCst);
    }

    fn store(&self, text: &str) {
        *self.contents.lock().unwrap_or_else(|e| e.into_inner()) = Some(text.to_string());
    }
}

#[async_trait]
impl SystemClipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(ClipboardError::Rejected("write permission denied".to_string()));
        }
        self.store(text);
        Ok(())
    }
}

impl CopyCommand for MemoryClipboard {
    fn exec_copy(&self, selection: Option<&str>) -> bool {
        if self.legacy_fails.load(Ordering::SeqCst) {
            return false;
        }
        match selection {
            Some(text) => {
                self.store(text);
                true
            }
            None => false,
        }
    }
}

/// Operating system clipboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeClipboard;

impl NativeClipboard {
    pub fn is_available() -> bool {
        arboard::Clipboard::new().is_ok()
    }

    fn set_text(text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Native(e.to_string()))?;

        #[cfg(target_os = "linux")]
        {
            use arboard::SetExtLinux;
            // X11/Wayland need the owner alive until a clipboard manager takes the data
            clipboard
                .set()
                .wait()
                .text(text.to_string())
                .map_err(|e| ClipboardError::Native(e.to_string()))
        }
        #[cfg(not(target_os = "linux"))]
        {
            clipboard
                .set_text(text.to_string())
                .map_err(|e| ClipboardError::Native(e.to_string()))
        }
    }
}

#[async_trait]
impl SystemClipboard for NativeClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let text = text.to_string();
        tokio::task::spawn_blocking(move || Self::set_text(&text))
            .await
            .map_err(|e| ClipboardError::Native(e.to_string()))?
    }
}

impl CopyCommand for NativeClipboard {
    fn exec_copy(&self, selection: Option<&str>) -> bool {
        let Some(text) = selection else {
            return false;
        };
        match Self::set_text(text) {
            Ok(()) => true,
            Err(e) => {
                warn!("Legacy copy failed: {}", e);
                false
            }
        }
    }
}
