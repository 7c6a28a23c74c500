use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ExtensionConfig;
use crate::error::DomError;
use crate::models::{Dom, DomMut, DomTree, NodeId, TagKind};

pub const NOTIFICATION_CLASS: &str = "table-copy-notification";
pub const STYLES_ID: &str = "table-copy-styles";

const ENTER_ANIMATION: &str = "slideIn 0.3s ease-out";
const EXIT_ANIMATION: &str = "slideIn 0.3s ease-out reverse";
const KEYFRAMES: &str = "@keyframes slideIn {\n    from { transform: translateX(100%); opacity: 0; }\n    to { transform: translateX(0); opacity: 1; }\n}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

impl NoticeKind {
    pub fn background(&self) -> &'static str {
        match self {
            Self::Success | Self::Info => "#4CAF50",
            Self::Error => "#f44336",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Copied,
}

/// A banner currently on screen. `dismissal` completes once it has been
/// removed from the document.
pub struct Notification {
    pub node: NodeId,
    pub kind: NoticeKind,
    pub shown_at: DateTime<Local>,
    pub dismissal: JoinHandle<()>,
}

/// Transient corner banners and control label changes. Every timer is its
/// own task touching only the node it was started for.
#[derive(Clone)]
pub struct FeedbackPresenter {
    dom: Dom,
    config: Arc<ExtensionConfig>,
}

impl FeedbackPresenter {
    pub fn new(dom: Dom, config: Arc<ExtensionConfig>) -> Self {
        Self { dom, config }
    }

    /// Adds the shared keyframes to the document head once.
    pub fn install_styles(&self) {
        let result = self.dom.mutate(|tree| -> Result<(), DomError> {
            let root = tree.root();
            let head = tree
                .children(root)
                .into_iter()
                .find(|n| tree.tag(*n) == Some(TagKind::Head))
                .unwrap_or(root);

            let present = tree
                .descendants_with_tag(head, &TagKind::Style)
                .into_iter()
                .any(|n| tree.attribute(n, "id").as_deref() == Some(STYLES_ID));
            if present {
                return Ok(());
            }

            let style = tree.create_element(TagKind::Style);
            tree.set_attribute(style, "id", STYLES_ID)?;
            tree.set_text(style, KEYFRAMES)?;
            tree.append_child(head, style)
        });

        if let Err(e) = result {
            warn!("Failed to install notification styles: {}", e);
        }
    }

    /// Table-copy feedback banner.
    pub fn notify(&self, message: &str, kind: NoticeKind) -> Option<Notification> {
        self.show(message, kind, self.config.copy_feedback())
    }

    /// One-time startup notice.
    pub fn announce(&self, message: &str) -> Option<Notification> {
        self.show(message, NoticeKind::Info, self.config.startup_notice())
    }

    fn show(&self, message: &str, kind: NoticeKind, dwell: Duration) -> Option<Notification> {
        // Without a runtime the banner could never be dismissed.
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("No runtime to dismiss notification '{}': {}", message, e);
                return None;
            }
        };

        let created = self.dom.mutate(|tree| -> Result<NodeId, DomError> {
            let banner = tree.create_element(TagKind::Div);
            tree.add_class(banner, NOTIFICATION_CLASS)?;
            for (property, value) in [
                ("position", "fixed"),
                ("top", "20px"),
                ("right", "20px"),
                ("background", kind.background()),
                ("color", "white"),
                ("z-index", "10000"),
                ("animation", ENTER_ANIMATION),
            ] {
                tree.set_style(banner, property, value)?;
            }
            tree.set_text(banner, message)?;
            let body = tree.body();
            tree.append_child(body, banner)?;
            Ok(banner)
        });

        let node = match created {
            Ok(node) => node,
            Err(e) => {
                warn!("Failed to show notification '{}': {}", message, e);
                return None;
            }
        };

        let dom = self.dom.clone();
        let exit = self.config.exit_animation();
        let dismissal = runtime.spawn(async move {
            tokio::time::sleep(dwell).await;
            dom.mutate(|tree| {
                if !tree.contains(node) {
                    return;
                }
                if let Err(e) = tree.set_style(node, "animation", EXIT_ANIMATION) {
                    debug!("Notification {} could not start its exit: {}", node, e);
                }
            });
            tokio::time::sleep(exit).await;
            dom.mutate(|tree| {
                if let Err(e) = tree.remove(node) {
                    debug!("Notification {} already gone: {}", node, e);
                }
            });
        });

        Some(Notification {
            node,
            kind,
            shown_at: Local::now(),
            dismissal,
        })
    }

    /// Sets the control label. `Copied` starts an independent revert timer;
    /// overlapping activations each revert on their own schedule and the
    /// last one to fire wins.
    pub fn set_control_state(&self, control: NodeId, state: ControlState) -> Option<JoinHandle<()>> {
        let label = match state {
            ControlState::Idle => &self.config.idle_label,
            ControlState::Copied => &self.config.busy_label,
        };
        self.set_label(control, label);

        if state == ControlState::Idle {
            return None;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("No runtime to revert control {} label: {}", control, e);
                return None;
            }
        };

        let presenter = self.clone();
        let delay = self.config.label_revert();
        Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let attached = presenter.dom.read(|tree| tree.contains(control));
            if attached {
                presenter.set_control_state(control, ControlState::Idle);
            }
        }))
    }

    fn set_label(&self, control: NodeId, label: &str) {
        if let Err(e) = self.dom.mutate(|tree| tree.set_text(control, label)) {
            warn!("Failed to update control {} label: {}", control, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;

    fn presenter() -> (Dom, FeedbackPresenter) {
        let dom = Dom::new(Document::new());
        let presenter = FeedbackPresenter::new(dom.clone(), Arc::new(ExtensionConfig::default()));
        (dom, presenter)
    }

    fn banners(dom: &Dom) -> usize {
        dom.read(|d| {
            d.descendants(d.body())
                .into_iter()
                .filter(|n| d.has_class(*n, NOTIFICATION_CLASS))
                .count()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_banner_dwells_then_exits() {
        let (dom, presenter) = presenter();
        let notification = presenter.notify("done", NoticeKind::Success).unwrap();
        let node = notification.node;

        assert_eq!(banners(&dom), 1);
        assert_eq!(dom.read(|d| d.text_content(node)), "done");
        assert_eq!(dom.read(|d| d.style(node, "background")).as_deref(), Some("#4CAF50"));

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(dom.read(|d| d.style(node, "animation")).as_deref(), Some(EXIT_ANIMATION));
        assert_eq!(banners(&dom), 1);

        notification.dismissal.await.unwrap();
        assert_eq!(banners(&dom), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_banner_removed_early_is_dismissed_quietly() {
        let (dom, presenter) = presenter();
        let notification = presenter.notify("done", NoticeKind::Error).unwrap();
        let node = notification.node;
        dom.mutate(|d| d.remove(node).unwrap());

        notification.dismissal.await.unwrap();
        assert_eq!(banners(&dom), 0);
        assert_eq!(dom.read(|d| d.style(node, "animation")).as_deref(), Some(ENTER_ANIMATION));
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_notice_uses_longer_dwell() {
        let (dom, presenter) = presenter();
        presenter.announce("hello").unwrap();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(banners(&dom), 1);
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(banners(&dom), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_copied_label_reverts() {
        let (dom, presenter) = presenter();
        let control = dom.mutate(|d| {
            let b = d.create_element(TagKind::Button);
            let body = d.body();
            d.append_child(body, b).unwrap();
            b
        });

        let revert = presenter.set_control_state(control, ControlState::Copied).unwrap();
        assert_eq!(dom.read(|d| d.text_content(control)), "✅ Copied!");

        revert.await.unwrap();
        assert_eq!(dom.read(|d| d.text_content(control)), "📋 Copy");
    }

    #[test]
    fn test_outside_runtime_nothing_is_left_behind() {
        let (dom, presenter) = presenter();
        let control = dom.mutate(|d| {
            let b = d.create_element(TagKind::Button);
            let body = d.body();
            d.append_child(body, b).unwrap();
            b
        });

        assert!(presenter.notify("done", NoticeKind::Success).is_none());
        assert_eq!(banners(&dom), 0);

        assert!(presenter.set_control_state(control, ControlState::Copied).is_none());
        assert_eq!(dom.read(|d| d.text_content(control)), "✅ Copied!");
    }

    #[test]
    fn test_styles_installed_once() {
        let (dom, presenter) = presenter();
        presenter.install_styles();
        presenter.install_styles();

        let count = dom.read(|d| d.descendants_with_tag(d.root(), &TagKind::Style).len());
        assert_eq!(count, 1);
    }
}
