use crate::cache::ElementCache;
use crate::dom::VirtualDocument;
use crate::node::AccessibilityNode;
use crate::platforms::AccessibilityEngine;
use crate::utils::poll_until;
use crate::AutomationError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Value passed as `app` to scope a session to the whole desktop.
pub const DESKTOP_APP: &str = "Root";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AppArguments {
    Line(String),
    List(Vec<String>),
}

impl AppArguments {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            AppArguments::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            AppArguments::List(list) => list.clone(),
        }
    }
}

/// Capabilities understood at session creation
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub app: Option<String>,
    pub app_arguments: Option<AppArguments>,
    pub app_working_dir: Option<String>,
    /// Seconds to wait for the application window.
    #[serde(rename = "ms:waitForAppLaunch")]
    pub wait_for_app_launch: Option<f64>,
    /// Attach to a running process instead of launching one.
    #[serde(rename = "uia:processId")]
    pub process_id: Option<u32>,
    #[serde(rename = "uia:scale")]
    pub scale: Option<f64>,
}

fn merge(target: &mut Map<String, Value>, source: &Value) {
    if let Some(source) = source.as_object() {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
}

impl Capabilities {
    /// Reads the W3C `capabilities` object (`alwaysMatch` over the first
    /// `firstMatch` entry) or legacy `desiredCapabilities` from a new-session
    /// request body. Returns the merged capability object as well.
    pub fn from_request(body: &Value) -> Result<(Capabilities, Value), AutomationError> {
        let mut merged = Map::new();
        if let Some(w3c) = body.get("capabilities") {
            if let Some(first) = w3c
                .get("firstMatch")
                .and_then(Value::as_array)
                .and_then(|entries| entries.first())
            {
                merge(&mut merged, first);
            }
            merge(&mut merged, w3c.get("alwaysMatch").unwrap_or(&Value::Null));
        }
        if merged.is_empty() {
            merge(
                &mut merged,
                body.get("desiredCapabilities").unwrap_or(&Value::Null),
            );
        }
        let merged = Value::Object(merged);
        let capabilities: Capabilities = serde_json::from_value(merged.clone())
            .map_err(|e| AutomationError::InvalidArgument(format!("invalid capabilities: {e}")))?;

        if capabilities.app.is_none() && capabilities.process_id.is_none() {
            return Err(AutomationError::InvalidArgument(
                "capability 'app' or 'uia:processId' is required".to_string(),
            ));
        }
        if let Some(scale) = capabilities.scale {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(AutomationError::InvalidArgument(format!(
                    "'uia:scale' must be a positive number, got {scale}"
                )));
            }
        }
        if capabilities
            .wait_for_app_launch
            .is_some_and(|secs| Duration::try_from_secs_f64(secs).is_err())
        {
            return Err(AutomationError::InvalidArgument(
                "'ms:waitForAppLaunch' must be a non-negative number of seconds".to_string(),
            ));
        }
        Ok((capabilities, merged))
    }

    pub fn is_desktop(&self) -> bool {
        self.process_id.is_none()
            && self
                .app
                .as_deref()
                .is_some_and(|app| app.eq_ignore_ascii_case(DESKTOP_APP))
    }
}

/// W3C session timeouts, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeouts {
    pub implicit: u64,
    pub page_load: u64,
    pub script: Option<u64>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            implicit: 0,
            page_load: 300_000,
            script: Some(30_000),
        }
    }
}

/// A partial timeouts update as sent by `POST /timeouts`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutsUpdate {
    pub implicit: Option<u64>,
    pub page_load: Option<u64>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub script: Option<Option<u64>>,
}

// Distinguishes `"script": null` from an absent key.
fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<u64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<u64>::deserialize(deserializer).map(Some)
}

/// What a session's live walks start from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionScope {
    Desktop,
    Application {
        pid: u32,
        /// Whether deleting the session should terminate the process.
        launched: bool,
    },
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub scope: SessionScope,
    pub capabilities: Value,
    /// Window for resolving the application root.
    pub session_timeout: Duration,
    /// Device-independent to physical pixel ratio.
    pub scale: f64,
    pub cache: ElementCache,
    document: RwLock<Option<Arc<VirtualDocument>>>,
    timeouts: RwLock<Timeouts>,
}

impl Session {
    pub fn new(
        scope: SessionScope,
        capabilities: Value,
        session_timeout: Duration,
        scale: f64,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope,
            capabilities,
            session_timeout,
            scale,
            cache: ElementCache::new(),
            document: RwLock::new(None),
            timeouts: RwLock::new(timeouts),
        }
    }

    /// The node live walks start from. For application sessions this is the
    /// process's topmost top-level window, re-resolved on every call so that
    /// a dialog in front of the main window becomes the root.
    pub fn scope_root(
        &self,
        engine: &dyn AccessibilityEngine,
        poll_interval: Duration,
    ) -> Result<AccessibilityNode, AutomationError> {
        match self.scope {
            SessionScope::Desktop => engine.root(),
            SessionScope::Application { pid, .. } => poll_until(
                &format!("window of process {pid}"),
                self.session_timeout,
                poll_interval,
                || Ok(engine.top_level_windows(pid)?.into_iter().next()),
            ),
        }
    }

    pub fn document(&self) -> Result<Option<Arc<VirtualDocument>>, AutomationError> {
        Ok(self
            .document
            .read()
            .map_err(|_| AutomationError::lock_poisoned("session document"))?
            .clone())
    }

    /// Replaces the session snapshot wholesale.
    pub fn store_document(
        &self,
        document: VirtualDocument,
    ) -> Result<Arc<VirtualDocument>, AutomationError> {
        let document = Arc::new(document);
        *self
            .document
            .write()
            .map_err(|_| AutomationError::lock_poisoned("session document"))? =
            Some(document.clone());
        Ok(document)
    }

    pub fn timeouts(&self) -> Result<Timeouts, AutomationError> {
        Ok(*self
            .timeouts
            .read()
            .map_err(|_| AutomationError::lock_poisoned("session timeouts"))?)
    }

    pub fn update_timeouts(&self, update: TimeoutsUpdate) -> Result<Timeouts, AutomationError> {
        let mut timeouts = self
            .timeouts
            .write()
            .map_err(|_| AutomationError::lock_poisoned("session timeouts"))?;
        if let Some(implicit) = update.implicit {
            timeouts.implicit = implicit;
        }
        if let Some(page_load) = update.page_load {
            timeouts.page_load = page_load;
        }
        if let Some(script) = update.script {
            timeouts.script = script;
        }
        Ok(*timeouts)
    }
}

/// All live sessions, keyed by session id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        info!(session_id = %session.id, scope = ?session.scope, "session created");
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Result<Arc<Session>, AutomationError> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AutomationError::SessionNotFound(format!("no session with id '{id}'")))
    }

    /// Unregisters the session and drops its cached elements and snapshot.
    pub fn remove(&self, id: &str) -> Result<Arc<Session>, AutomationError> {
        let (_, session) = self
            .sessions
            .remove(id)
            .ok_or_else(|| AutomationError::SessionNotFound(format!("no session with id '{id}'")))?;
        session.cache.clear();
        if let Ok(mut document) = session.document.write() {
            document.take();
        }
        debug!(session_id = %id, "session removed");
        Ok(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
