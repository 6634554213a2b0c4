use crate::node::AccessibilityNode;
use crate::property::Property;
use crate::types::{Point, Rect};
use crate::AutomationError;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// A resolved element as handed out to clients.
///
/// Tree-backed elements hold a live node; flat elements (from coordinate or
/// OCR locators) only carry a clickable point.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: String,
    pub node: Option<AccessibilityNode>,
    pub location: Rect,
    pub clickable_point: Option<Point>,
}

impl Element {
    /// Element for a live node. The id is the automation id when the node has
    /// one, else a fresh UUID.
    pub fn from_node(node: AccessibilityNode) -> Self {
        let automation_id = node
            .property(Property::AutomationId)
            .ok()
            .flatten()
            .map(|v| v.to_string())
            .filter(|id| !id.is_empty());
        let location = node.bounds().unwrap_or_default();
        Self {
            id: automation_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            node: Some(node),
            location,
            clickable_point: None,
        }
    }

    /// Element with only a screen point and no backing node.
    pub fn flat(point: Point, location: Rect) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            node: None,
            location,
            clickable_point: Some(point),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.node.is_none()
    }

    /// Where a pointer click on this element lands.
    pub fn click_point(&self) -> Option<Point> {
        self.clickable_point.or_else(|| {
            let node = self.node.as_ref()?;
            match node.clickable_point() {
                Ok(point) => point,
                Err(_) => (!self.location.is_empty()).then(|| self.location.center()),
            }
        })
    }
}

/// Per-session element store keyed by element id.
#[derive(Debug, Default)]
pub struct ElementCache {
    elements: DashMap<String, Element>,
}

impl ElementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-or-replace; returns the element id.
    pub fn insert(&self, element: Element) -> String {
        let id = element.id.clone();
        if self.elements.insert(id.clone(), element).is_some() {
            debug!(element_id = %id, "replaced cached element");
        }
        id
    }

    pub fn get(&self, id: &str) -> Result<Element, AutomationError> {
        self.elements
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AutomationError::ElementNotFound(format!("no element with id '{id}'")))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&self) {
        self.elements.clear();
    }
}
