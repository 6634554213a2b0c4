//! Virtual DOM: serialized snapshots of the accessibility tree.
//!
//! Every element carries an `id` attribute holding the JSON runtime-id array
//! of the node it was built from, which is how a match in the snapshot is
//! bridged back to the live tree.

use crate::node::AccessibilityNode;
use crate::path::{Axis, PathSegment};
use crate::property::{Condition, ATTRIBUTE_SET_VERSION};
use crate::utils::{retry_with_timeout, DEFAULT_POLL_INTERVAL, DEFAULT_READ_TIMEOUT};
use crate::AutomationError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Tag of the synthetic element wrapping every snapshot.
pub const DOCUMENT_TAG: &str = "dom";
/// Tag of the placeholder document produced by a failed walk.
pub const ERROR_TAG: &str = "Error";
const UNKNOWN_TAG: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualElement {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<VirtualElement>,
}

impl VirtualElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Runtime id decoded from the `id` attribute.
    pub fn runtime_id(&self) -> Result<Vec<i32>, AutomationError> {
        let raw = self.attribute("id").ok_or_else(|| {
            AutomationError::ElementNotFound(format!("<{}> carries no id", self.tag))
        })?;
        serde_json::from_str(raw).map_err(|e| {
            AutomationError::Internal(format!("malformed runtime id '{raw}': {e}"))
        })
    }

    /// Evaluates a query against the element's serialized attributes.
    pub fn matches(&self, condition: &Condition) -> bool {
        match condition {
            Condition::True => true,
            Condition::Property {
                property,
                value,
                partial,
            } => self.attribute(property.name()).is_some_and(|actual| {
                let wanted = value.to_string();
                if *partial {
                    actual.contains(&wanted)
                } else {
                    actual == wanted
                }
            }),
            Condition::ControlType(ct) => self.tag.eq_ignore_ascii_case(ct.tag()),
            Condition::RuntimeId(id) => self.runtime_id().is_ok_and(|own| own == *id),
            Condition::And(parts) => parts.iter().all(|c| self.matches(c)),
            Condition::Or(parts) => parts.iter().any(|c| self.matches(c)),
        }
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a VirtualElement>) {
        for child in &self.children {
            out.push(child);
            child.collect_descendants(out);
        }
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(VirtualElement::count).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Body {
    Tree(VirtualElement),
    Error(String),
}

/// One immutable snapshot of (a subtree of) the accessibility tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDocument {
    body: Body,
}

impl VirtualDocument {
    pub fn from_root(root: VirtualElement) -> Self {
        let mut wrapper = VirtualElement::new(DOCUMENT_TAG);
        wrapper.children.push(root);
        Self {
            body: Body::Tree(wrapper),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            body: Body::Error(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, Body::Error(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.body {
            Body::Error(message) => Some(message),
            Body::Tree(_) => None,
        }
    }

    /// The synthetic wrapper element; `None` for an error document.
    pub fn document_element(&self) -> Option<&VirtualElement> {
        match &self.body {
            Body::Tree(wrapper) => Some(wrapper),
            Body::Error(_) => None,
        }
    }

    /// Number of snapshot elements, excluding the wrapper.
    pub fn len(&self) -> usize {
        self.document_element()
            .map(|w| w.count() - 1)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walks `segments` from the wrapper element with the live-walk rules:
    /// each segment keeps its first (or indexed) match and the first segment
    /// without one fails the whole path. A leading child-axis segment may
    /// match the snapshot root or one of its children, as on the live tree.
    pub fn evaluate(&self, segments: &[PathSegment]) -> Result<&VirtualElement, AutomationError> {
        self.select(segments, false)?
            .into_iter()
            .next()
            .ok_or_else(|| AutomationError::ElementNotFound("no snapshot element".to_string()))
    }

    /// Like [`evaluate`](Self::evaluate), but the last segment keeps every
    /// match. No match on the last segment is an empty list.
    pub fn evaluate_all(
        &self,
        segments: &[PathSegment],
    ) -> Result<Vec<&VirtualElement>, AutomationError> {
        self.select(segments, true)
    }

    fn select(
        &self,
        segments: &[PathSegment],
        all: bool,
    ) -> Result<Vec<&VirtualElement>, AutomationError> {
        let mut current = self.document_element().ok_or_else(|| {
            AutomationError::ElementNotFound(format!(
                "snapshot unavailable: {}",
                self.error_message().unwrap_or_default()
            ))
        })?;

        for (i, segment) in segments.iter().enumerate() {
            let position = i + 1;
            let condition = segment.condition().ok_or_else(|| {
                AutomationError::ElementNotFound(format!(
                    "segment {position} has no usable condition"
                ))
            })?;
            let candidates: Vec<&VirtualElement> = match segment.axis {
                Axis::Child if i == 0 => current
                    .children
                    .iter()
                    .flat_map(|root| std::iter::once(root).chain(root.children.iter()))
                    .collect(),
                Axis::Child => current.children.iter().collect(),
                Axis::Descendant => {
                    let mut found = Vec::new();
                    current.collect_descendants(&mut found);
                    found
                }
            };
            let mut matches = candidates.into_iter().filter(|el| el.matches(&condition));
            let is_last = position == segments.len();

            if is_last && all && segment.index.is_none() {
                return Ok(matches.collect());
            }
            let nth = segment.index.unwrap_or(1).max(1) - 1;
            match matches.nth(nth) {
                Some(el) => current = el,
                None if is_last && all => return Ok(Vec::new()),
                None => {
                    return Err(AutomationError::ElementNotFound(format!(
                        "no snapshot element matches segment {position} ({condition})"
                    )))
                }
            }
        }
        Ok(vec![current])
    }

    /// Serializes to indented XML.
    pub fn to_xml(&self) -> Result<String, AutomationError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        match &self.body {
            Body::Tree(wrapper) => write_element(&mut writer, wrapper)?,
            Body::Error(message) => {
                writer
                    .write_event(Event::Start(BytesStart::new(ERROR_TAG)))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::Text(BytesText::new(&xml_safe(message))))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::End(BytesEnd::new(ERROR_TAG)))
                    .map_err(xml_error)?;
            }
        }
        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| AutomationError::Internal(format!("snapshot is not UTF-8: {e}")))
    }
}

fn xml_error(e: impl std::fmt::Display) -> AutomationError {
    AutomationError::Internal(format!("failed to write snapshot XML: {e}"))
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

/// Drops characters XML 1.0 cannot carry even when escaped.
fn xml_safe(value: &str) -> Cow<'_, str> {
    if value.chars().all(is_xml_char) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(value.chars().filter(|&c| is_xml_char(c)).collect())
    }
}

fn write_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    element: &VirtualElement,
) -> Result<(), AutomationError> {
    let tag = if element.tag.is_empty() {
        UNKNOWN_TAG
    } else {
        element.tag.as_str()
    };
    let mut start = BytesStart::new(tag);
    for (key, value) in &element.attributes {
        if !key.is_empty() && !value.is_empty() {
            start.push_attribute((key.as_str(), &*xml_safe(value)));
        }
    }
    if element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_error)?;
        return Ok(());
    }
    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(xml_error)?;
    Ok(())
}

/// How far below the root a snapshot reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotDepth {
    /// The root and its immediate children.
    ChildrenOnly,
    #[default]
    Full,
}

/// Builds [`VirtualDocument`]s by a depth-first pre-order walk.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    depth: SnapshotDepth,
    read_timeout: Duration,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self {
            depth: SnapshotDepth::Full,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl SnapshotBuilder {
    pub fn new(depth: SnapshotDepth, read_timeout: Duration) -> Self {
        Self {
            depth,
            read_timeout,
        }
    }

    /// Snapshot of `root` and its subtree. A walk that fails part-way yields
    /// an error document instead of a partial tree.
    #[instrument(level = "debug", skip(self, root))]
    pub fn build(&self, root: &AccessibilityNode) -> VirtualDocument {
        match self.build_element(root, 0) {
            Ok(element) => {
                let document = VirtualDocument::from_root(element);
                debug!(
                    elements = document.len(),
                    version = ATTRIBUTE_SET_VERSION,
                    "snapshot built"
                );
                document
            }
            Err(e) => {
                warn!(error = %e, "snapshot walk failed");
                VirtualDocument::error(e.to_string())
            }
        }
    }

    fn build_element(
        &self,
        node: &AccessibilityNode,
        level: usize,
    ) -> Result<VirtualElement, AutomationError> {
        let mut element = VirtualElement::new(node.tag_name_within(self.read_timeout));
        element.attributes = node.attributes_within(self.read_timeout);
        let id = retry_with_timeout("runtime id", self.read_timeout, DEFAULT_POLL_INTERVAL, || {
            node.runtime_id_json()
        })?;
        element.attributes.insert("id".to_string(), id);

        let descend = match self.depth {
            SnapshotDepth::Full => true,
            SnapshotDepth::ChildrenOnly => level == 0,
        };
        if descend {
            let children =
                retry_with_timeout("children", self.read_timeout, DEFAULT_POLL_INTERVAL, || {
                    node.children()
                })?;
            for child in &children {
                element.children.push(self.build_element(child, level + 1)?);
            }
        }
        Ok(element)
    }
}
