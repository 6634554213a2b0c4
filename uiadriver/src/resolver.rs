use crate::cache::Element;
use crate::dom::{SnapshotBuilder, VirtualElement};
use crate::node::AccessibilityNode;
use crate::ocr::{locate_text, TextRecognizer};
use crate::path::{Axis, ParsedPath, PathSegment, RootMarker};
use crate::platforms::AccessibilityEngine;
use crate::property::Condition;
use crate::selector::Locator;
use crate::session::Session;
use crate::types::{Rect, TreeScope};
use crate::AutomationError;
use std::time::Duration;
use tracing::{debug, instrument};

/// Turns classified locators into elements against one session.
pub struct Resolver<'a> {
    engine: &'a dyn AccessibilityEngine,
    recognizer: Option<&'a dyn TextRecognizer>,
    snapshots: &'a SnapshotBuilder,
    poll_interval: Duration,
}

fn not_found_at(position: usize, condition: &Condition) -> AutomationError {
    AutomationError::ElementNotFound(format!(
        "no element matches segment {position} ({condition})"
    ))
}

/// Search failures are scoped to the request and reported as not-found.
fn search_failed(position: usize, e: AutomationError) -> AutomationError {
    if e.is_not_found() {
        e
    } else {
        AutomationError::ElementNotFound(format!("search failed at segment {position}: {e}"))
    }
}

impl<'a> Resolver<'a> {
    pub fn new(
        engine: &'a dyn AccessibilityEngine,
        recognizer: Option<&'a dyn TextRecognizer>,
        snapshots: &'a SnapshotBuilder,
        poll_interval: Duration,
    ) -> Self {
        Self {
            engine,
            recognizer,
            snapshots,
            poll_interval,
        }
    }

    /// Resolves a locator into elements. `context` restricts a path to the
    /// subtree below an already-found node. With `all` unset the result holds
    /// exactly one element.
    #[instrument(level = "debug", skip(self, session, context))]
    pub fn resolve(
        &self,
        session: &Session,
        locator: &Locator,
        context: Option<&AccessibilityNode>,
        all: bool,
    ) -> Result<Vec<Element>, AutomationError> {
        match locator {
            Locator::Coordinates(point) => {
                let point = point.scaled(session.scale);
                debug!(?point, "coordinate locator, no tree search");
                Ok(vec![Element::flat(
                    point,
                    Rect::new(point.x, point.y, point.x, point.y),
                )])
            }
            Locator::Ocr(text) => self.resolve_text(text).map(|element| vec![element]),
            Locator::Path(path) => Ok(self
                .resolve_path(session, path, context, all)?
                .into_iter()
                .map(Element::from_node)
                .collect()),
        }
    }

    fn resolve_text(&self, text: &str) -> Result<Element, AutomationError> {
        let recognizer = self.recognizer.ok_or_else(|| {
            AutomationError::UnsupportedOperation("no OCR backend is available".to_string())
        })?;
        let screenshot = self.engine.capture_screen()?;
        let lines = recognizer.recognize(&screenshot)?;
        let region = locate_text(&lines, text).ok_or_else(|| {
            AutomationError::ElementNotFound(format!("text '{text}' not found on screen"))
        })?;
        debug!(text, ?region, "OCR match");
        Ok(Element::flat(region.center(), region))
    }

    /// Resolves a parsed path into live nodes.
    pub fn resolve_path(
        &self,
        session: &Session,
        path: &ParsedPath,
        context: Option<&AccessibilityNode>,
        all: bool,
    ) -> Result<Vec<AccessibilityNode>, AutomationError> {
        match (path.root, context) {
            (RootMarker::Document, _) => self.resolve_in_document(session, &path.segments, all),
            (RootMarker::Desktop, _) => {
                let root = self.engine.root()?;
                walk_segments(&root, &path.segments, true, all)
            }
            (RootMarker::Application, Some(context)) => {
                walk_segments(context, &path.segments, false, all)
            }
            (RootMarker::Application, None) => {
                let root = session.scope_root(self.engine, self.poll_interval)?;
                walk_segments(&root, &path.segments, true, all)
            }
        }
    }

    /// Matches the path against the session snapshot, then finds each matched
    /// node again in the live tree by its runtime id.
    fn resolve_in_document(
        &self,
        session: &Session,
        segments: &[PathSegment],
        all: bool,
    ) -> Result<Vec<AccessibilityNode>, AutomationError> {
        let root = session.scope_root(self.engine, self.poll_interval)?;
        if segments.is_empty() {
            return Ok(vec![root]);
        }
        let document = match session.document()? {
            Some(document) if !document.is_error() => document,
            _ => session.store_document(self.snapshots.build(&root))?,
        };
        if !all {
            let matched = document.evaluate(segments)?;
            return Ok(vec![self.bridge(&root, matched, segments.len())?]);
        }

        let mut nodes = Vec::new();
        for matched in document.evaluate_all(segments)? {
            match self.bridge(&root, matched, segments.len()) {
                Ok(node) => nodes.push(node),
                // gone since the snapshot was taken
                Err(e) if e.is_not_found() => debug!(error = %e, "skipping stale snapshot match"),
                Err(e) => return Err(e),
            }
        }
        Ok(nodes)
    }

    fn bridge(
        &self,
        root: &AccessibilityNode,
        matched: &VirtualElement,
        position: usize,
    ) -> Result<AccessibilityNode, AutomationError> {
        let runtime_id = matched.runtime_id()?;
        debug!(?runtime_id, tag = %matched.tag, "snapshot match, bridging to live tree");
        root.find_first(TreeScope::Subtree, &Condition::RuntimeId(runtime_id.clone()))
            .map_err(|e| search_failed(position, e))?
            .ok_or_else(|| {
                AutomationError::ElementNotFound(format!(
                    "element {runtime_id:?} no longer exists in the live tree"
                ))
            })
    }
}

/// Walks `segments` from `root`, keeping one node per segment and failing on
/// the first segment without a match.
///
/// With `root_is_document` the root acts as the document element, so the
/// first segment may match the root itself. With `all` the last segment
/// returns every match (an empty list when there are none).
pub fn walk_segments(
    root: &AccessibilityNode,
    segments: &[PathSegment],
    root_is_document: bool,
    all: bool,
) -> Result<Vec<AccessibilityNode>, AutomationError> {
    let mut current = root.clone();
    for (i, segment) in segments.iter().enumerate() {
        let position = i + 1;
        let condition = segment.condition().ok_or_else(|| {
            AutomationError::ElementNotFound(format!(
                "segment {position} has no usable condition"
            ))
        })?;
        let scope = match (segment.axis, i == 0 && root_is_document) {
            (Axis::Child, true) => TreeScope::SelfOrChildren,
            (Axis::Descendant, true) => TreeScope::Subtree,
            (Axis::Child, false) => TreeScope::Children,
            (Axis::Descendant, false) => TreeScope::Descendants,
        };
        let is_last = position == segments.len();
        debug!(position, ?scope, %condition, "walking segment");

        if let Some(index) = segment.index {
            let matches = current
                .find_all(scope, &condition)
                .map_err(|e| search_failed(position, e))?;
            let nth = index.max(1) - 1;
            match matches.into_iter().nth(nth) {
                Some(node) => current = node,
                None if is_last && all => return Ok(Vec::new()),
                None => return Err(not_found_at(position, &condition)),
            }
        } else if is_last && all {
            return current
                .find_all(scope, &condition)
                .map_err(|e| search_failed(position, e));
        } else {
            current = current
                .find_first(scope, &condition)
                .map_err(|e| search_failed(position, e))?
                .ok_or_else(|| not_found_at(position, &condition))?;
        }
    }
    Ok(vec![current])
}
