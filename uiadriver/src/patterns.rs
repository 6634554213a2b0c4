//! Text extraction through UI Automation patterns, selected from a static table

use crate::node::AccessibilityNode;
use crate::property::{ControlType, Property};
use crate::AutomationError;
use tracing::debug;

/// Sources a node's visible text can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPattern {
    Value,
    Text,
    LegacyIAccessible,
    Name,
}

type TextHandler = fn(&AccessibilityNode) -> Result<Option<String>, AutomationError>;

fn read_value(node: &AccessibilityNode) -> Result<Option<String>, AutomationError> {
    Ok(node.property(Property::Value)?.map(|v| v.to_string()))
}

fn read_text(node: &AccessibilityNode) -> Result<Option<String>, AutomationError> {
    node.document_text()
}

fn read_legacy(node: &AccessibilityNode) -> Result<Option<String>, AutomationError> {
    Ok(node.property(Property::LegacyValue)?.map(|v| v.to_string()))
}

fn read_name(node: &AccessibilityNode) -> Result<Option<String>, AutomationError> {
    Ok(node.property(Property::Name)?.map(|v| v.to_string()))
}

static HANDLERS: &[(TextPattern, TextHandler)] = &[
    (TextPattern::Value, read_value),
    (TextPattern::Text, read_text),
    (TextPattern::LegacyIAccessible, read_legacy),
    (TextPattern::Name, read_name),
];

const EDITABLE_ORDER: &[TextPattern] = &[
    TextPattern::Value,
    TextPattern::Text,
    TextPattern::LegacyIAccessible,
];

const DEFAULT_ORDER: &[TextPattern] = &[TextPattern::Text, TextPattern::Value, TextPattern::Name];

static CONTROL_ORDERS: &[(ControlType, &[TextPattern])] = &[
    (ControlType::Edit, EDITABLE_ORDER),
    (ControlType::Document, EDITABLE_ORDER),
    (ControlType::ComboBox, EDITABLE_ORDER),
];

impl TextPattern {
    pub fn handler(&self) -> TextHandler {
        HANDLERS
            .iter()
            .find(|(kind, _)| kind == self)
            .map(|(_, handler)| *handler)
            .unwrap_or(read_name)
    }

    /// Patterns to try, in order, for a control type.
    pub fn order_for(control_type: ControlType) -> &'static [TextPattern] {
        CONTROL_ORDERS
            .iter()
            .find(|(ct, _)| *ct == control_type)
            .map(|(_, order)| *order)
            .unwrap_or(DEFAULT_ORDER)
    }
}

/// First non-empty text any applicable pattern yields, or an empty string.
pub fn extract_text(node: &AccessibilityNode) -> String {
    let control_type = match node.control_type() {
        Ok(ct) => ct,
        Err(e) => {
            debug!(error = %e, "control type unavailable, using default pattern order");
            ControlType::Custom
        }
    };
    for pattern in TextPattern::order_for(control_type) {
        match pattern.handler()(node) {
            Ok(Some(text)) if !text.is_empty() => return text,
            Ok(_) => {}
            Err(e) => debug!(?pattern, error = %e, "text pattern failed"),
        }
    }
    String::new()
}
