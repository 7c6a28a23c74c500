use std::sync::Arc;
use tracing::{info, warn};

use crate::clipboard::{ClipboardWriter, CopyCommand, SystemClipboard};
use crate::config::ExtensionConfig;
use crate::models::{Dom, DomTree, NodeId};
use crate::scanner::{BindingRegistry, ChangeWatcher, ControlBinder, ScanReport, TableScanner, WatcherHandle};
use crate::ui::FeedbackPresenter;

/// What the hosting environment offers for clipboard access.
#[derive(Clone)]
pub struct ClipboardEnvironment {
    pub system: Option<Arc<dyn SystemClipboard>>,
    pub secure_context: bool,
    pub legacy: Arc<dyn CopyCommand>,
}

/// Application root. Owns every service and the single watcher
/// subscription, which lives as long as this value.
pub struct TableCopyExtension {
    dom: Dom,
    config: Arc<ExtensionConfig>,
    presenter: FeedbackPresenter,
    scanner: TableScanner,
    watcher: Option<WatcherHandle>,
}

impl TableCopyExtension {
    pub fn new(dom: Dom, config: ExtensionConfig, clipboard: ClipboardEnvironment) -> Self {
        for problem in config.validate() {
            warn!("Config: {}", problem);
        }
        let config = Arc::new(config);

        let writer = ClipboardWriter::new(
            dom.clone(),
            clipboard.system,
            clipboard.secure_context,
            clipboard.legacy,
        );
        let presenter = FeedbackPresenter::new(dom.clone(), config.clone());
        let binder = ControlBinder::new(
            dom.clone(),
            BindingRegistry::default(),
            Arc::new(writer),
            presenter.clone(),
            config.clone(),
        );
        let scanner = TableScanner::new(dom.clone(), binder);

        Self {
            dom,
            config,
            presenter,
            scanner,
            watcher: None,
        }
    }

    /// Installs styles, binds tables already present and starts watching
    /// the body. Calling it again returns the existing watcher. Without a
    /// tokio runtime the initial scan still runs but nothing is watched.
    pub fn start(&mut self) -> Option<&WatcherHandle> {
        if self.watcher.is_none() {
            self.watcher = self.launch();
        }
        self.watcher.as_ref()
    }

    fn launch(&self) -> Option<WatcherHandle> {
        info!("Initializing table copy extension");
        self.presenter.install_styles();
        if self.config.show_startup_notice {
            self.presenter.announce(&self.config.startup_message);
        }

        let body = self.body();
        let report = self.scanner.scan(body);
        info!("Initial scan bound {} of {} tables", report.bound, report.found);

        ChangeWatcher::start(&self.dom, body, self.scanner.clone(), self.config.rescan_delay())
    }

    pub fn scan(&self) -> ScanReport {
        self.scanner.scan(self.body())
    }

    pub fn watcher(&self) -> Option<&WatcherHandle> {
        self.watcher.as_ref()
    }

    pub fn bindings(&self) -> &BindingRegistry {
        self.scanner.binder().registry()
    }

    pub fn binder(&self) -> &ControlBinder {
        self.scanner.binder()
    }

    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    fn body(&self) -> NodeId {
        self.dom.read(|tree| tree.body())
    }
}
