//! Closed vocabularies of control types and properties, and the query conditions built from them

use crate::node::AccessibilityNode;
use crate::AutomationError;
use std::fmt;

/// The UI Automation control types, with their tag names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlType {
    Button,
    Calendar,
    CheckBox,
    ComboBox,
    Edit,
    Hyperlink,
    Image,
    ListItem,
    List,
    Menu,
    MenuBar,
    MenuItem,
    ProgressBar,
    RadioButton,
    ScrollBar,
    Slider,
    Spinner,
    StatusBar,
    Tab,
    TabItem,
    Text,
    ToolBar,
    ToolTip,
    Tree,
    TreeItem,
    Custom,
    Group,
    Thumb,
    DataGrid,
    DataItem,
    Document,
    SplitButton,
    Window,
    Pane,
    Header,
    HeaderItem,
    Table,
    TitleBar,
    Separator,
    SemanticZoom,
    AppBar,
}

static CONTROL_TYPE_TAGS: &[(ControlType, &str)] = &[
    (ControlType::Button, "button"),
    (ControlType::Calendar, "calendar"),
    (ControlType::CheckBox, "checkBox"),
    (ControlType::ComboBox, "comboBox"),
    (ControlType::Edit, "edit"),
    (ControlType::Hyperlink, "hyperlink"),
    (ControlType::Image, "image"),
    (ControlType::ListItem, "listItem"),
    (ControlType::List, "list"),
    (ControlType::Menu, "menu"),
    (ControlType::MenuBar, "menuBar"),
    (ControlType::MenuItem, "menuItem"),
    (ControlType::ProgressBar, "progressBar"),
    (ControlType::RadioButton, "radioButton"),
    (ControlType::ScrollBar, "scrollBar"),
    (ControlType::Slider, "slider"),
    (ControlType::Spinner, "spinner"),
    (ControlType::StatusBar, "statusBar"),
    (ControlType::Tab, "tab"),
    (ControlType::TabItem, "tabItem"),
    (ControlType::Text, "text"),
    (ControlType::ToolBar, "toolBar"),
    (ControlType::ToolTip, "toolTip"),
    (ControlType::Tree, "tree"),
    (ControlType::TreeItem, "treeItem"),
    (ControlType::Custom, "custom"),
    (ControlType::Group, "group"),
    (ControlType::Thumb, "thumb"),
    (ControlType::DataGrid, "dataGrid"),
    (ControlType::DataItem, "dataItem"),
    (ControlType::Document, "document"),
    (ControlType::SplitButton, "splitButton"),
    (ControlType::Window, "window"),
    (ControlType::Pane, "pane"),
    (ControlType::Header, "header"),
    (ControlType::HeaderItem, "headerItem"),
    (ControlType::Table, "table"),
    (ControlType::TitleBar, "titleBar"),
    (ControlType::Separator, "separator"),
    (ControlType::SemanticZoom, "semanticZoom"),
    (ControlType::AppBar, "appBar"),
];

impl ControlType {
    pub fn tag(&self) -> &'static str {
        CONTROL_TYPE_TAGS
            .iter()
            .find(|(ct, _)| ct == self)
            .map(|(_, tag)| *tag)
            .unwrap_or("custom")
    }

    /// Case-insensitive tag lookup.
    pub fn from_tag(tag: &str) -> Option<ControlType> {
        CONTROL_TYPE_TAGS
            .iter()
            .find(|(_, t)| t.eq_ignore_ascii_case(tag))
            .map(|(ct, _)| *ct)
    }

    /// Every control type whose tag contains `fragment`, ignoring case.
    pub fn matching_fragment(fragment: &str) -> Vec<ControlType> {
        let needle = fragment.to_ascii_lowercase();
        CONTROL_TYPE_TAGS
            .iter()
            .filter(|(_, t)| t.to_ascii_lowercase().contains(&needle))
            .map(|(ct, _)| *ct)
            .collect()
    }

    pub fn all() -> impl Iterator<Item = ControlType> {
        CONTROL_TYPE_TAGS.iter().map(|(ct, _)| *ct)
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    Bool,
    Int,
}

/// Properties a locator may filter on and a snapshot may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Property {
    Name,
    AutomationId,
    ClassName,
    FrameworkId,
    ProcessId,
    HelpText,
    LocalizedControlType,
    AcceleratorKey,
    AccessKey,
    IsEnabled,
    IsKeyboardFocusable,
    HasKeyboardFocus,
    IsPassword,
    IsOffscreen,
    IsContentElement,
    IsControlElement,
    IsRequiredForForm,
    IsSelected,
    Value,
    LegacyValue,
}

static PROPERTY_NAMES: &[(Property, &str, ValueKind)] = &[
    (Property::Name, "name", ValueKind::Str),
    (Property::AutomationId, "automationId", ValueKind::Str),
    (Property::ClassName, "className", ValueKind::Str),
    (Property::FrameworkId, "frameworkId", ValueKind::Str),
    (Property::ProcessId, "processId", ValueKind::Int),
    (Property::HelpText, "helpText", ValueKind::Str),
    (
        Property::LocalizedControlType,
        "localizedControlType",
        ValueKind::Str,
    ),
    (Property::AcceleratorKey, "acceleratorKey", ValueKind::Str),
    (Property::AccessKey, "accessKey", ValueKind::Str),
    (Property::IsEnabled, "isEnabled", ValueKind::Bool),
    (
        Property::IsKeyboardFocusable,
        "isKeyboardFocusable",
        ValueKind::Bool,
    ),
    (Property::HasKeyboardFocus, "hasKeyboardFocus", ValueKind::Bool),
    (Property::IsPassword, "isPassword", ValueKind::Bool),
    (Property::IsOffscreen, "isOffscreen", ValueKind::Bool),
    (Property::IsContentElement, "isContentElement", ValueKind::Bool),
    (Property::IsControlElement, "isControlElement", ValueKind::Bool),
    (Property::IsRequiredForForm, "isRequiredForForm", ValueKind::Bool),
    (Property::IsSelected, "isSelected", ValueKind::Bool),
    (Property::Value, "value", ValueKind::Str),
    (Property::LegacyValue, "legacyValue", ValueKind::Str),
];

/// Bumped whenever [`SNAPSHOT_PROPERTIES`] changes shape.
pub const ATTRIBUTE_SET_VERSION: u32 = 1;

/// Properties serialized into every snapshot element, in attribute order.
/// Time-varying state (value, focus, selection) stays out so that snapshots
/// of an unchanged tree are identical.
pub const SNAPSHOT_PROPERTIES: &[Property] = &[
    Property::Name,
    Property::AutomationId,
    Property::ClassName,
    Property::FrameworkId,
    Property::ProcessId,
    Property::HelpText,
    Property::LocalizedControlType,
    Property::AcceleratorKey,
    Property::AccessKey,
    Property::IsEnabled,
    Property::IsKeyboardFocusable,
    Property::IsPassword,
    Property::IsOffscreen,
    Property::IsContentElement,
    Property::IsControlElement,
    Property::IsRequiredForForm,
];

/// Geometry attribute names carried next to [`SNAPSHOT_PROPERTIES`].
pub const GEOMETRY_ATTRIBUTES: [&str; 4] = ["left", "top", "right", "bottom"];

impl Property {
    pub fn name(&self) -> &'static str {
        self.entry().1
    }

    pub fn kind(&self) -> ValueKind {
        self.entry().2
    }

    fn entry(&self) -> &'static (Property, &'static str, ValueKind) {
        // Every variant has a row.
        PROPERTY_NAMES
            .iter()
            .find(|(p, _, _)| p == self)
            .unwrap_or(&PROPERTY_NAMES[0])
    }

    /// Case-insensitive name lookup.
    pub fn from_name(name: &str) -> Option<Property> {
        PROPERTY_NAMES
            .iter()
            .find(|(_, n, _)| n.eq_ignore_ascii_case(name))
            .map(|(p, _, _)| *p)
    }

    pub fn all() -> impl Iterator<Item = Property> {
        PROPERTY_NAMES.iter().map(|(p, _, _)| *p)
    }

    /// Converts a locator literal into a typed value, rejecting literals that
    /// cannot hold for this property's kind.
    pub fn parse_value(&self, literal: &str) -> Result<PropertyValue, AutomationError> {
        match self.kind() {
            ValueKind::Str => Ok(PropertyValue::Str(literal.to_string())),
            ValueKind::Bool => match literal.to_ascii_lowercase().as_str() {
                "true" => Ok(PropertyValue::Bool(true)),
                "false" => Ok(PropertyValue::Bool(false)),
                _ => Err(AutomationError::InvalidSelector(format!(
                    "'{literal}' is not a boolean value for @{}",
                    self.name()
                ))),
            },
            ValueKind::Int => literal
                .trim()
                .parse::<i64>()
                .map(PropertyValue::Int)
                .map_err(|_| {
                    AutomationError::InvalidSelector(format!(
                        "'{literal}' is not an integer value for @{}",
                        self.name()
                    ))
                }),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Str(String),
    Bool(bool),
    Int(i64),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PropertyValue::Str(s) if s.is_empty())
    }

    /// Equality for exact filters, substring containment for partial ones.
    pub fn matches(&self, expected: &PropertyValue, partial: bool) -> bool {
        match (self, expected) {
            (PropertyValue::Str(actual), PropertyValue::Str(wanted)) if partial => {
                actual.contains(wanted.as_str())
            }
            _ if partial => self.to_string().contains(&expected.to_string()),
            _ => self == expected,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Str(s) => f.write_str(s),
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

/// A structural query against one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Matches every node.
    True,
    Property {
        property: Property,
        value: PropertyValue,
        partial: bool,
    },
    ControlType(ControlType),
    RuntimeId(Vec<i32>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn property(property: Property, value: impl Into<PropertyValue>) -> Self {
        Condition::Property {
            property,
            value: value.into(),
            partial: false,
        }
    }

    /// AND of all given conditions; `None` when there are none.
    pub fn all(mut conditions: Vec<Condition>) -> Option<Condition> {
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Condition::And(conditions)),
        }
    }

    /// OR of all given conditions; `None` when there are none.
    pub fn any(mut conditions: Vec<Condition>) -> Option<Condition> {
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Condition::Or(conditions)),
        }
    }

    /// Evaluates the condition through the node facade. Engines with native
    /// query support translate conditions instead of calling this.
    pub fn matches(&self, node: &AccessibilityNode) -> Result<bool, AutomationError> {
        match self {
            Condition::True => Ok(true),
            Condition::Property {
                property,
                value,
                partial,
            } => Ok(node
                .property(*property)?
                .is_some_and(|actual| actual.matches(value, *partial))),
            Condition::ControlType(ct) => Ok(node.control_type()? == *ct),
            Condition::RuntimeId(id) => Ok(node.runtime_id()? == *id),
            Condition::And(conditions) => {
                for condition in conditions {
                    if !condition.matches(node)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Or(conditions) => {
                for condition in conditions {
                    if condition.matches(node)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, parts: &[Condition], op: &str| {
            write!(f, "(")?;
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                write!(f, "{part}")?;
            }
            write!(f, ")")
        };
        match self {
            Condition::True => write!(f, "true"),
            Condition::Property {
                property,
                value,
                partial: false,
            } => write!(f, "@{property}='{value}'"),
            Condition::Property {
                property, value, ..
            } => write!(f, "contains(@{property}, '{value}')"),
            Condition::ControlType(ct) => write!(f, "controlType={ct}"),
            Condition::RuntimeId(id) => write!(f, "runtimeId={id:?}"),
            Condition::And(parts) => join(f, parts, "and"),
            Condition::Or(parts) => join(f, parts, "or"),
        }
    }
}
