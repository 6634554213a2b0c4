use crate::keys::KeyStroke;
use crate::property::{
    Condition, ControlType, Property, PropertyValue, GEOMETRY_ATTRIBUTES, SNAPSHOT_PROPERTIES,
};
use crate::types::{Point, Rect, TreeScope};
use crate::utils::{retry_with_timeout, DEFAULT_POLL_INTERVAL, DEFAULT_READ_TIMEOUT};
use crate::AutomationError;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, instrument};

/// Platform-specific capability behind one accessibility tree node.
///
/// `find_first`/`find_all` default to a facade-level walk that evaluates
/// [`Condition::matches`] on every visited node; engines with native
/// condition support override them.
pub trait NodeImpl: Send + Sync + Debug {
    fn runtime_id(&self) -> Result<Vec<i32>, AutomationError>;
    fn control_type(&self) -> Result<ControlType, AutomationError>;
    /// `Ok(None)` when the node does not expose the property.
    fn property(&self, property: Property) -> Result<Option<PropertyValue>, AutomationError>;
    fn bounds(&self) -> Result<Rect, AutomationError>;
    /// Immediate children in provider order.
    fn children(&self) -> Result<Vec<AccessibilityNode>, AutomationError>;

    fn find_first(
        &self,
        scope: TreeScope,
        condition: &Condition,
    ) -> Result<Option<AccessibilityNode>, AutomationError> {
        let start = AccessibilityNode::new(self.clone_box());
        Ok(walk(&start, scope, condition, true)?.into_iter().next())
    }

    fn find_all(
        &self,
        scope: TreeScope,
        condition: &Condition,
    ) -> Result<Vec<AccessibilityNode>, AutomationError> {
        let start = AccessibilityNode::new(self.clone_box());
        walk(&start, scope, condition, false)
    }

    fn clickable_point(&self) -> Result<Option<Point>, AutomationError> {
        let bounds = self.bounds()?;
        Ok((!bounds.is_empty()).then(|| bounds.center()))
    }

    /// Content of the UIA text pattern, when the node supports it.
    fn document_text(&self) -> Result<Option<String>, AutomationError>;
    fn focus(&self) -> Result<(), AutomationError>;
    fn click(&self) -> Result<(), AutomationError>;
    fn send_keys(&self, keys: &[KeyStroke]) -> Result<(), AutomationError>;
    fn set_value(&self, value: &str) -> Result<(), AutomationError>;

    fn clone_box(&self) -> Box<dyn NodeImpl>;
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Pre-order search below `start` honoring `scope`.
pub(crate) fn walk(
    start: &AccessibilityNode,
    scope: TreeScope,
    condition: &Condition,
    first_only: bool,
) -> Result<Vec<AccessibilityNode>, AutomationError> {
    let mut found = Vec::new();
    if scope.includes_self() && condition.matches(start)? {
        found.push(start.clone());
        if first_only {
            return Ok(found);
        }
    }
    let mut stack: Vec<AccessibilityNode> = start.children()?.into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        if condition.matches(&node)? {
            found.push(node.clone());
            if first_only {
                break;
            }
        }
        if scope.is_deep() {
            stack.extend(node.children()?.into_iter().rev());
        }
    }
    Ok(found)
}

/// Handle into the live accessibility tree.
#[derive(Debug)]
pub struct AccessibilityNode {
    inner: Box<dyn NodeImpl>,
}

impl Clone for AccessibilityNode {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_box(),
        }
    }
}

impl AccessibilityNode {
    pub fn new(inner: Box<dyn NodeImpl>) -> Self {
        Self { inner }
    }

    pub fn runtime_id(&self) -> Result<Vec<i32>, AutomationError> {
        self.inner.runtime_id()
    }

    /// The runtime id as a JSON array, used as the snapshot `id` attribute.
    pub fn runtime_id_json(&self) -> Result<String, AutomationError> {
        let id = self.runtime_id()?;
        serde_json::to_string(&id).map_err(|e| AutomationError::Internal(e.to_string()))
    }

    pub fn control_type(&self) -> Result<ControlType, AutomationError> {
        self.inner.control_type()
    }

    pub fn property(&self, property: Property) -> Result<Option<PropertyValue>, AutomationError> {
        self.inner.property(property)
    }

    /// Reads one property, retrying transient failures within `timeout`.
    pub fn property_within(
        &self,
        property: Property,
        timeout: Duration,
    ) -> Result<Option<PropertyValue>, AutomationError> {
        retry_with_timeout("property", timeout, DEFAULT_POLL_INTERVAL, || {
            self.inner.property(property)
        })
    }

    pub fn bounds(&self) -> Result<Rect, AutomationError> {
        self.inner.bounds()
    }

    pub fn children(&self) -> Result<Vec<AccessibilityNode>, AutomationError> {
        self.inner.children()
    }

    pub fn find_first(
        &self,
        scope: TreeScope,
        condition: &Condition,
    ) -> Result<Option<AccessibilityNode>, AutomationError> {
        self.inner.find_first(scope, condition)
    }

    pub fn find_all(
        &self,
        scope: TreeScope,
        condition: &Condition,
    ) -> Result<Vec<AccessibilityNode>, AutomationError> {
        self.inner.find_all(scope, condition)
    }

    pub fn clickable_point(&self) -> Result<Option<Point>, AutomationError> {
        self.inner.clickable_point()
    }

    pub fn document_text(&self) -> Result<Option<String>, AutomationError> {
        self.inner.document_text()
    }

    #[instrument(level = "debug", skip(self))]
    pub fn focus(&self) -> Result<(), AutomationError> {
        self.inner.focus()
    }

    #[instrument(level = "debug", skip(self))]
    pub fn click(&self) -> Result<(), AutomationError> {
        self.inner.click()
    }

    #[instrument(level = "debug", skip(self, keys))]
    pub fn send_keys(&self, keys: &[KeyStroke]) -> Result<(), AutomationError> {
        self.inner.send_keys(keys)
    }

    pub fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        self.inner.set_value(value)
    }

    pub fn is_enabled(&self) -> Result<bool, AutomationError> {
        Ok(self
            .property(Property::IsEnabled)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    pub fn is_selected(&self) -> Result<bool, AutomationError> {
        Ok(self
            .property(Property::IsSelected)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    pub fn is_displayed(&self) -> Result<bool, AutomationError> {
        let offscreen = self
            .property(Property::IsOffscreen)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(!offscreen && !self.bounds()?.is_empty())
    }

    /// The fixed snapshot attribute set.
    ///
    /// Transient failures are retried for up to `timeout`; a node that stays
    /// unreadable yields an empty map rather than an error.
    pub fn attributes_within(&self, timeout: Duration) -> BTreeMap<String, String> {
        let read = || -> Result<BTreeMap<String, String>, AutomationError> {
            let mut attributes = BTreeMap::new();
            for property in SNAPSHOT_PROPERTIES {
                if let Some(value) = self.inner.property(*property)? {
                    let text = value.to_string();
                    if !text.is_empty() {
                        attributes.insert(property.name().to_string(), text);
                    }
                }
            }
            let bounds = self.inner.bounds()?;
            let edges = [bounds.left, bounds.top, bounds.right, bounds.bottom];
            for (name, edge) in GEOMETRY_ATTRIBUTES.iter().zip(edges) {
                attributes.insert(name.to_string(), edge.to_string());
            }
            Ok(attributes)
        };
        match retry_with_timeout("attributes", timeout, DEFAULT_POLL_INTERVAL, read) {
            Ok(attributes) => attributes,
            Err(e) => {
                debug!(error = %e, "attributes unavailable, degrading to empty");
                BTreeMap::new()
            }
        }
    }

    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.attributes_within(DEFAULT_READ_TIMEOUT)
    }

    /// Tag name for the node's control type, or an empty string once the
    /// retry window is exhausted.
    pub fn tag_name_within(&self, timeout: Duration) -> String {
        match retry_with_timeout("tag name", timeout, DEFAULT_POLL_INTERVAL, || {
            self.inner.control_type()
        }) {
            Ok(ct) => ct.tag().to_string(),
            Err(e) => {
                debug!(error = %e, "tag name unavailable, degrading to empty");
                String::new()
            }
        }
    }

    pub fn tag_name(&self) -> String {
        self.tag_name_within(DEFAULT_READ_TIMEOUT)
    }

    /// Access the platform implementation.
    pub fn as_any(&self) -> &dyn std::any::Any {
        self.inner.as_any()
    }
}
