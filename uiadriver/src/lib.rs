//! WebDriver-style element location over the Windows UI Automation tree
//!
//! The [`Driver`] owns the session registry and resolves W3C locators (XPath-like
//! paths, coordinates, OCR text) against a live accessibility tree, or against a
//! serialized snapshot of it (the virtual DOM).

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub mod cache;
pub mod dom;
pub mod errors;
pub mod keys;
pub mod node;
pub mod ocr;
pub mod path;
pub mod patterns;
pub mod platforms;
pub mod property;
pub mod resolver;
pub mod selector;
pub mod session;
#[cfg(test)]
mod tests;
pub mod types;
pub mod utils;

pub use cache::{Element, ElementCache};
pub use dom::{SnapshotBuilder, SnapshotDepth, VirtualDocument, VirtualElement};
pub use errors::AutomationError;
pub use node::{AccessibilityNode, NodeImpl};
pub use ocr::{OcrLine, OcrWord, TextRecognizer};
pub use path::{parse_path, Axis, ParsedPath, PathSegment, RootMarker};
pub use platforms::AccessibilityEngine;
pub use property::{Condition, ControlType, Property, PropertyValue};
pub use selector::{LocationStrategy, Locator, Using};
pub use session::{Capabilities, Session, SessionRegistry, SessionScope, Timeouts, TimeoutsUpdate};
pub use types::{Point, Rect, ScreenshotResult, TreeScope};

use keys::parse_keys;
use resolver::Resolver;
use utils::{poll_until, DEFAULT_POLL_INTERVAL, DEFAULT_READ_TIMEOUT};

/// Driver-wide settings
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// How long to wait for an application window to appear.
    pub session_timeout: Duration,
    pub poll_interval: Duration,
    /// Retry window for transient failures while reading a node.
    pub read_timeout: Duration,
    pub snapshot_depth: SnapshotDepth,
    /// Device-independent to physical pixel ratio.
    pub scale: f64,
    /// Default implicit wait for new sessions.
    pub implicit_wait: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(10),
            poll_interval: DEFAULT_POLL_INTERVAL,
            read_timeout: DEFAULT_READ_TIMEOUT,
            snapshot_depth: SnapshotDepth::Full,
            scale: 1.0,
            implicit_wait: Duration::ZERO,
        }
    }
}

/// The main entry point: sessions plus everything needed to serve them
#[derive(Clone)]
pub struct Driver {
    engine: Arc<dyn AccessibilityEngine>,
    recognizer: Option<Arc<dyn TextRecognizer>>,
    sessions: Arc<SessionRegistry>,
    snapshots: SnapshotBuilder,
    config: DriverConfig,
}

impl Driver {
    /// Driver on the platform engine. A missing OCR backend only disables
    /// text locators.
    #[instrument(skip(config))]
    pub fn new(config: DriverConfig) -> Result<Self, AutomationError> {
        let engine = platforms::create_engine()?;
        let recognizer = match platforms::create_recognizer() {
            Ok(recognizer) => Some(recognizer),
            Err(e) => {
                warn!(error = %e, "OCR unavailable, text locators disabled");
                None
            }
        };
        Ok(Self::with_engine(engine, recognizer, config))
    }

    pub fn with_engine(
        engine: Arc<dyn AccessibilityEngine>,
        recognizer: Option<Arc<dyn TextRecognizer>>,
        config: DriverConfig,
    ) -> Self {
        Self {
            engine,
            recognizer,
            sessions: Arc::new(SessionRegistry::new()),
            snapshots: SnapshotBuilder::new(config.snapshot_depth, config.read_timeout),
            config,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn engine(&self) -> &dyn AccessibilityEngine {
        self.engine.as_ref()
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(
            self.engine.as_ref(),
            self.recognizer.as_deref(),
            &self.snapshots,
            self.config.poll_interval,
        )
    }

    pub fn status(&self) -> Value {
        json!({
            "ready": true,
            "message": format!("{} sessions active", self.sessions.len()),
            "build": { "version": env!("CARGO_PKG_VERSION") },
        })
    }

    /// Launches or attaches to the application named by the capabilities and
    /// waits until it shows a window.
    #[instrument(skip(self, request))]
    pub fn create_session(&self, request: &Value) -> Result<Arc<Session>, AutomationError> {
        let (capabilities, merged) = Capabilities::from_request(request)?;
        let session_timeout = capabilities
            .wait_for_app_launch
            .map(Duration::try_from_secs_f64)
            .transpose()
            .map_err(|e| {
                AutomationError::InvalidArgument(format!("'ms:waitForAppLaunch' is out of range: {e}"))
            })?
            .unwrap_or(self.config.session_timeout);
        let scale = capabilities.scale.unwrap_or(self.config.scale);

        let scope = if capabilities.is_desktop() {
            SessionScope::Desktop
        } else if let Some(pid) = capabilities.process_id {
            SessionScope::Application {
                pid,
                launched: false,
            }
        } else {
            let app = capabilities.app.as_deref().unwrap_or_default();
            let arguments = capabilities
                .app_arguments
                .as_ref()
                .map(|a| a.to_vec())
                .unwrap_or_default();
            let pid = self
                .engine
                .launch_application(app, &arguments, capabilities.app_working_dir.as_deref())
                .map_err(|e| match e {
                    AutomationError::SessionNotCreated(_) => e,
                    other => AutomationError::SessionNotCreated(format!(
                        "failed to launch '{app}': {other}"
                    )),
                })?;
            info!(app, pid, "application launched");
            SessionScope::Application {
                pid,
                launched: true,
            }
        };

        let timeouts = Timeouts {
            implicit: self.config.implicit_wait.as_millis() as u64,
            ..Timeouts::default()
        };
        let session = Session::new(scope, merged, session_timeout, scale, timeouts);
        if let Err(e) = session.scope_root(self.engine.as_ref(), self.config.poll_interval) {
            self.release_application(&session);
            return Err(AutomationError::SessionNotCreated(format!(
                "application window unavailable: {e}"
            )));
        }
        Ok(self.sessions.insert(session))
    }

    /// Removes the session. Applications the session launched are terminated.
    #[instrument(skip(self))]
    pub fn delete_session(&self, session_id: &str) -> Result<(), AutomationError> {
        let session = self.sessions.remove(session_id)?;
        self.release_application(&session);
        info!(session_id, "session deleted");
        Ok(())
    }

    fn release_application(&self, session: &Session) {
        if let SessionScope::Application {
            pid,
            launched: true,
        } = session.scope
        {
            if let Err(e) = self.engine.terminate_application(pid) {
                warn!(pid, error = %e, "failed to terminate application");
            }
        }
    }

    /// Runs `find` until it yields something or the session's implicit wait
    /// expires.
    fn with_implicit_wait<T>(
        &self,
        session: &Session,
        mut find: impl FnMut() -> Result<T, AutomationError>,
        found: impl Fn(&T) -> bool,
    ) -> Result<T, AutomationError> {
        let implicit = Duration::from_millis(session.timeouts()?.implicit);
        let first = find();
        let keep_waiting = !implicit.is_zero()
            && match &first {
                Ok(value) => !found(value),
                Err(e) => e.is_not_found(),
            };
        if !keep_waiting {
            return first;
        }
        poll_until("element", implicit, self.config.poll_interval, || match find() {
            Ok(value) if found(&value) => Ok(Some(value)),
            Ok(_) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        })
    }

    fn context_node(
        &self,
        session: &Session,
        element_id: &str,
    ) -> Result<AccessibilityNode, AutomationError> {
        session.cache.get(element_id)?.node.ok_or_else(|| {
            AutomationError::ElementNotFound(format!(
                "element '{element_id}' has no tree node to search from"
            ))
        })
    }

    fn find(
        &self,
        session_id: &str,
        strategy: &LocationStrategy,
        from: Option<&str>,
        all: bool,
    ) -> Result<Vec<String>, AutomationError> {
        let session = self.sessions.get(session_id)?;
        let locator = strategy.to_locator()?;
        let context = from
            .map(|id| self.context_node(&session, id))
            .transpose()?;
        let resolver = self.resolver();
        let resolve = || -> Result<Vec<Element>, AutomationError> {
            match resolver.resolve(&session, &locator, context.as_ref(), all) {
                Err(e) if all && e.is_not_found() => Ok(Vec::new()),
                other => other,
            }
        };
        let elements = self.with_implicit_wait(&session, resolve, |found| !found.is_empty())?;
        debug!(count = elements.len(), "resolved elements");
        Ok(elements
            .into_iter()
            .map(|element| session.cache.insert(element))
            .collect())
    }

    /// Resolves one element and caches it, returning its id.
    #[instrument(skip(self, strategy), fields(using = %strategy.using, value = %strategy.value))]
    pub fn find_element(
        &self,
        session_id: &str,
        strategy: &LocationStrategy,
    ) -> Result<String, AutomationError> {
        self.find(session_id, strategy, None, false)?
            .into_iter()
            .next()
            .ok_or_else(|| AutomationError::ElementNotFound(strategy.value.clone()))
    }

    #[instrument(skip(self, strategy), fields(using = %strategy.using, value = %strategy.value))]
    pub fn find_elements(
        &self,
        session_id: &str,
        strategy: &LocationStrategy,
    ) -> Result<Vec<String>, AutomationError> {
        self.find(session_id, strategy, None, true)
    }

    #[instrument(skip(self, strategy), fields(using = %strategy.using, value = %strategy.value))]
    pub fn find_element_from_element(
        &self,
        session_id: &str,
        element_id: &str,
        strategy: &LocationStrategy,
    ) -> Result<String, AutomationError> {
        self.find(session_id, strategy, Some(element_id), false)?
            .into_iter()
            .next()
            .ok_or_else(|| AutomationError::ElementNotFound(strategy.value.clone()))
    }

    #[instrument(skip(self, strategy), fields(using = %strategy.using, value = %strategy.value))]
    pub fn find_elements_from_element(
        &self,
        session_id: &str,
        element_id: &str,
        strategy: &LocationStrategy,
    ) -> Result<Vec<String>, AutomationError> {
        self.find(session_id, strategy, Some(element_id), true)
    }

    #[instrument(skip(self))]
    pub fn active_element(&self, session_id: &str) -> Result<String, AutomationError> {
        let session = self.sessions.get(session_id)?;
        let node = self.engine.focused_element()?;
        Ok(session.cache.insert(Element::from_node(node)))
    }

    pub fn element(&self, session_id: &str, element_id: &str) -> Result<Element, AutomationError> {
        self.sessions.get(session_id)?.cache.get(element_id)
    }

    /// The live node behind an element; for flat elements, whatever is
    /// under their point.
    fn backing_node(&self, element: &Element) -> Result<Option<AccessibilityNode>, AutomationError> {
        match (&element.node, element.clickable_point) {
            (Some(node), _) => Ok(Some(node.clone())),
            (None, Some(point)) => self.engine.element_at_point(point),
            (None, None) => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub fn element_text(&self, session_id: &str, element_id: &str) -> Result<String, AutomationError> {
        let element = self.element(session_id, element_id)?;
        Ok(self
            .backing_node(&element)?
            .map(|node| patterns::extract_text(&node))
            .unwrap_or_default())
    }

    /// A property by name, or one of the geometry edges. Absent and empty
    /// values are not-found.
    #[instrument(skip(self))]
    pub fn element_attribute(
        &self,
        session_id: &str,
        element_id: &str,
        name: &str,
    ) -> Result<String, AutomationError> {
        let element = self.element(session_id, element_id)?;
        let missing =
            || AutomationError::ElementNotFound(format!("attribute '{name}' is not available"));

        if let Some(edge) = ["left", "top", "right", "bottom"]
            .iter()
            .position(|e| e.eq_ignore_ascii_case(name))
        {
            let rect = self.element_rect_of(&element)?;
            return Ok([rect.left, rect.top, rect.right, rect.bottom][edge].to_string());
        }

        let property = Property::from_name(name).ok_or_else(missing)?;
        let node = self.backing_node(&element)?.ok_or_else(missing)?;
        node.property_within(property, self.config.read_timeout)?
            .map(|value| value.to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(missing)
    }

    fn element_rect_of(&self, element: &Element) -> Result<Rect, AutomationError> {
        match &element.node {
            Some(node) => node.bounds(),
            None => Ok(element.location),
        }
    }

    pub fn element_rect(&self, session_id: &str, element_id: &str) -> Result<Rect, AutomationError> {
        let element = self.element(session_id, element_id)?;
        self.element_rect_of(&element)
    }

    pub fn element_tag_name(
        &self,
        session_id: &str,
        element_id: &str,
    ) -> Result<String, AutomationError> {
        let element = self.element(session_id, element_id)?;
        Ok(self
            .backing_node(&element)?
            .map(|node| node.tag_name_within(self.config.read_timeout))
            .unwrap_or_default())
    }

    pub fn is_element_enabled(
        &self,
        session_id: &str,
        element_id: &str,
    ) -> Result<bool, AutomationError> {
        let element = self.element(session_id, element_id)?;
        match self.backing_node(&element)? {
            Some(node) => node.is_enabled(),
            None => Ok(true),
        }
    }

    pub fn is_element_selected(
        &self,
        session_id: &str,
        element_id: &str,
    ) -> Result<bool, AutomationError> {
        let element = self.element(session_id, element_id)?;
        match self.backing_node(&element)? {
            Some(node) => node.is_selected(),
            None => Ok(false),
        }
    }

    pub fn is_element_displayed(
        &self,
        session_id: &str,
        element_id: &str,
    ) -> Result<bool, AutomationError> {
        let element = self.element(session_id, element_id)?;
        match &element.node {
            Some(node) => node.is_displayed(),
            None => Ok(true),
        }
    }

    /// Provider click for tree-backed elements, with a pointer click at the
    /// clickable point as fallback; pointer click for flat elements.
    #[instrument(skip(self))]
    pub fn click_element(&self, session_id: &str, element_id: &str) -> Result<(), AutomationError> {
        let element = self.element(session_id, element_id)?;
        if let Some(node) = &element.node {
            match node.click() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!(error = %e, "provider click failed, falling back to pointer click");
                    let point = element.click_point().ok_or(e)?;
                    return self.engine.click_at(point);
                }
            }
        }
        let point = element.click_point().ok_or_else(|| {
            AutomationError::ElementNotFound(format!("element '{element_id}' has no point"))
        })?;
        self.engine.click_at(point)
    }

    #[instrument(skip(self, text))]
    pub fn send_keys_to_element(
        &self,
        session_id: &str,
        element_id: &str,
        text: &str,
    ) -> Result<(), AutomationError> {
        let element = self.element(session_id, element_id)?;
        let keys = parse_keys(text);
        match (&element.node, element.clickable_point) {
            (Some(node), _) => {
                node.focus()?;
                node.send_keys(&keys)
            }
            (None, Some(point)) => {
                self.engine.click_at(point)?;
                self.engine.send_keys(&keys)
            }
            (None, None) => Err(AutomationError::ElementNotFound(format!(
                "element '{element_id}' cannot receive input"
            ))),
        }
    }

    #[instrument(skip(self))]
    pub fn clear_element(&self, session_id: &str, element_id: &str) -> Result<(), AutomationError> {
        let element = self.element(session_id, element_id)?;
        self.backing_node(&element)?
            .ok_or_else(|| {
                AutomationError::ElementNotFound(format!("element '{element_id}' has no node"))
            })?
            .set_value("")
    }

    /// Builds a fresh snapshot of the session scope and stores it as the
    /// session's document.
    #[instrument(skip(self))]
    pub fn create_snapshot(&self, session_id: &str) -> Result<Arc<VirtualDocument>, AutomationError> {
        let session = self.sessions.get(session_id)?;
        let root = session.scope_root(self.engine.as_ref(), self.config.poll_interval)?;
        session.store_document(self.snapshots.build(&root))
    }

    pub fn page_source(&self, session_id: &str) -> Result<String, AutomationError> {
        self.create_snapshot(session_id)?.to_xml()
    }

    /// Base64 PNG of the primary screen.
    #[instrument(skip(self))]
    pub fn screenshot(&self, session_id: &str) -> Result<String, AutomationError> {
        self.sessions.get(session_id)?;
        self.engine.capture_screen()?.to_png_base64()
    }

    pub fn timeouts(&self, session_id: &str) -> Result<Timeouts, AutomationError> {
        self.sessions.get(session_id)?.timeouts()
    }

    pub fn set_timeouts(
        &self,
        session_id: &str,
        update: TimeoutsUpdate,
    ) -> Result<Timeouts, AutomationError> {
        self.sessions.get(session_id)?.update_timeouts(update)
    }
}
