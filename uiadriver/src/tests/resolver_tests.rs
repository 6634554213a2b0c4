//! Tests for the element resolver against the in-memory engine

use super::{Notepad, NOTEPAD_PID};
use crate::dom::SnapshotBuilder;
use crate::node::AccessibilityNode;
use crate::ocr::{OcrLine, OcrWord, StaticRecognizer};
use crate::path::parse_path;
use crate::property::{ControlType, Property};
use crate::resolver::{walk_segments, Resolver};
use crate::selector::Locator;
use crate::session::{Session, SessionScope, Timeouts};
use crate::types::{Point, Rect, TreeScope};
use crate::AutomationError;
use serde_json::Value;
use std::time::Duration;

const POLL: Duration = Duration::from_millis(10);

fn names(nodes: &[AccessibilityNode]) -> Vec<String> {
    nodes
        .iter()
        .map(|n| {
            n.property(Property::Name)
                .unwrap()
                .map(|v| v.to_string())
                .unwrap_or_default()
        })
        .collect()
}

fn resolve_path(
    app: &Notepad,
    session: &Session,
    locator: &str,
    all: bool,
) -> Result<Vec<AccessibilityNode>, AutomationError> {
    let snapshots = SnapshotBuilder::default();
    let resolver = Resolver::new(&app.engine, None, &snapshots, POLL);
    resolver.resolve_path(session, &parse_path(locator)?, None, all)
}

#[test]
fn test_first_segment_may_match_the_scope_root() {
    let app = Notepad::new();
    let session = app.session();
    let found = resolve_path(&app, &session, "/window[@name='Untitled - Notepad']/edit", false).unwrap();
    assert_eq!(names(&found), vec!["Text Editor"]);

    // a leading child segment also reaches the root's children
    let found = resolve_path(&app, &session, "/menuBar/menuItem", false).unwrap();
    assert_eq!(names(&found), vec!["File"]);
}

#[test]
fn test_later_segments_are_strict() {
    let app = Notepad::new();
    let session = app.session();
    // text lives below the status bar, not directly below the window
    let err = resolve_path(&app, &session, "/window/text", false).unwrap_err();
    assert!(err.is_not_found());
    let found = resolve_path(&app, &session, "/window//text", false).unwrap();
    assert_eq!(names(&found), vec!["Ln 1, Col 1"]);
}

#[test]
fn test_index_selects_nth_match() {
    let app = Notepad::new();
    let session = app.session();
    let found = resolve_path(&app, &session, "//menuItem[3]", false).unwrap();
    assert_eq!(names(&found), vec!["Format"]);
    let err = resolve_path(&app, &session, "//menuItem[9]", false).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_all_returns_every_match_of_last_segment() {
    let app = Notepad::new();
    let session = app.session();
    let found = resolve_path(&app, &session, "/menuBar/menuItem", true).unwrap();
    assert_eq!(names(&found), vec!["File", "Edit", "Format"]);

    let found = resolve_path(&app, &session, "//button", true).unwrap();
    assert!(found.is_empty());

    // an earlier segment without a match still fails
    let err = resolve_path(&app, &session, "//toolBar/button", true).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_fail_fast_skips_remaining_segments() {
    let app = Notepad::new();
    let session = app.session();
    app.engine.clear_searches();

    let err = resolve_path(&app, &session, "/window/group[@name='Missing']/button", false).unwrap_err();
    assert!(err.is_not_found());

    let searches = app.engine.searches();
    assert_eq!(searches.len(), 2, "{searches:?}");
    assert!(searches[1].condition.contains("Missing"));
    assert!(searches.iter().all(|s| !s.condition.contains("button")));
}

#[test]
fn test_scopes_used_per_segment() {
    let app = Notepad::new();
    let session = app.session();
    app.engine.clear_searches();
    resolve_path(&app, &session, "/window//text", false).unwrap();
    let scopes: Vec<TreeScope> = app.engine.searches().iter().map(|s| s.scope).collect();
    assert_eq!(scopes, vec![TreeScope::SelfOrChildren, TreeScope::Descendants]);

    app.engine.clear_searches();
    resolve_path(&app, &session, "//edit", false).unwrap();
    let scopes: Vec<TreeScope> = app.engine.searches().iter().map(|s| s.scope).collect();
    assert_eq!(scopes, vec![TreeScope::Subtree]);
}

#[test]
fn test_wildcard_segment_is_not_found() {
    let app = Notepad::new();
    let session = app.session();
    let err = resolve_path(&app, &session, "//*", false).unwrap_err();
    assert!(matches!(err, AutomationError::ElementNotFound(_)));
}

#[test]
fn test_desktop_root_marker() {
    let app = Notepad::new();
    app.engine.add_window(7, "Calculator");
    let session = app.session();
    let found = resolve_path(&app, &session, "/root/window[@name='Calculator']", false).unwrap();
    assert_eq!(names(&found), vec!["Calculator"]);

    // not reachable from the application root
    let err = resolve_path(&app, &session, "//window[@name='Calculator']", false).unwrap_err();
    assert!(err.is_not_found());

    let found = resolve_path(&app, &session, "/root", false).unwrap();
    assert_eq!(names(&found), vec!["Desktop 1"]);
}

#[test]
fn test_document_root_marker_bridges_to_live_tree() {
    let app = Notepad::new();
    let session = app.session();
    assert!(session.document().unwrap().is_none());

    let found = resolve_path(&app, &session, "/dom//statusBar/text[2]", false).unwrap();
    assert_eq!(names(&found), vec!["100%"]);
    assert_eq!(found[0].control_type().unwrap(), ControlType::Text);
    // the snapshot is built lazily and kept
    assert!(session.document().unwrap().is_some());
}

#[test]
fn test_document_root_marker_returns_every_match() {
    let app = Notepad::new();
    let session = app.session();

    let live = resolve_path(&app, &session, "//menuItem", true).unwrap();
    let from_snapshot = resolve_path(&app, &session, "/dom//menuItem", true).unwrap();
    assert_eq!(names(&from_snapshot), vec!["File", "Edit", "Format"]);
    assert_eq!(names(&from_snapshot), names(&live));

    let none = resolve_path(&app, &session, "/dom//menuItem[@name='View']", true).unwrap();
    assert!(none.is_empty());

    // a match removed after the snapshot was taken is skipped
    app.file_menu.remove();
    let found = resolve_path(&app, &session, "/dom//menuItem", true).unwrap();
    assert_eq!(names(&found), vec!["Edit", "Format"]);
}

#[test]
fn test_leading_child_segment_means_the_same_on_both_paths() {
    let app = Notepad::new();
    let session = app.session();
    let live = resolve_path(&app, &session, "/menuBar", false).unwrap();
    let from_snapshot = resolve_path(&app, &session, "/dom/menuBar", false).unwrap();
    assert_eq!(names(&from_snapshot), names(&live));
    let window = resolve_path(&app, &session, "/dom/window", false).unwrap();
    assert_eq!(names(&window), vec!["Untitled - Notepad"]);
}

#[test]
fn test_document_match_removed_from_live_tree() {
    let app = Notepad::new();
    let session = app.session();
    resolve_path(&app, &session, "/dom//edit", false).unwrap();
    app.editor.remove();
    let err = resolve_path(&app, &session, "/dom//edit", false).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_error_document_is_rebuilt() {
    let app = Notepad::new();
    let session = app.session();
    session
        .store_document(crate::dom::VirtualDocument::error("walk failed"))
        .unwrap();
    let found = resolve_path(&app, &session, "/dom//edit", false).unwrap();
    assert_eq!(names(&found), vec!["Text Editor"]);
    assert!(!session.document().unwrap().unwrap().is_error());
}

#[test]
fn test_context_search_excludes_context_node() {
    let app = Notepad::new();
    let session = app.session();
    let snapshots = SnapshotBuilder::default();
    let resolver = Resolver::new(&app.engine, None, &snapshots, POLL);
    let context = app.menu_bar.to_node();

    let path = parse_path("/menuItem[@name='Edit']").unwrap();
    let found = resolver.resolve_path(&session, &path, Some(&context), false).unwrap();
    assert_eq!(names(&found), vec!["Edit"]);

    let path = parse_path("/menuBar").unwrap();
    let err = resolver
        .resolve_path(&session, &path, Some(&context), false)
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_scope_root_follows_topmost_window() {
    let app = Notepad::new();
    let session = app.session();
    let dialog = app.engine.add_window(NOTEPAD_PID, "Save As");
    dialog.add_child(ControlType::Button, "Save");

    // the dialog is behind the main window until it is activated
    assert!(resolve_path(&app, &session, "/button[@name='Save']", false).is_err());
    dialog.bring_to_front();
    let found = resolve_path(&app, &session, "/window[@name='Save As']/button[@name='Save']", false).unwrap();
    assert_eq!(names(&found), vec!["Save"]);
}

#[test]
fn test_missing_application_window_times_out() {
    let app = Notepad::new();
    let session = Session::new(
        SessionScope::Application {
            pid: 1,
            launched: false,
        },
        Value::Null,
        Duration::from_millis(50),
        1.0,
        Timeouts::default(),
    );
    let err = resolve_path(&app, &session, "//edit", false).unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
}

#[test]
fn test_coordinates_are_scaled_and_never_searched() {
    let app = Notepad::new();
    let session = Session::new(
        SessionScope::Desktop,
        Value::Null,
        Duration::from_millis(50),
        1.5,
        Timeouts::default(),
    );
    let snapshots = SnapshotBuilder::default();
    let resolver = Resolver::new(&app.engine, None, &snapshots, POLL);
    app.engine.clear_searches();

    let elements = resolver
        .resolve(&session, &Locator::parse("//cords[100,200]").unwrap(), None, false)
        .unwrap();
    assert_eq!(elements.len(), 1);
    assert!(elements[0].is_flat());
    assert_eq!(elements[0].clickable_point, Some(Point::new(150, 300)));
    assert!(app.engine.searches().is_empty());
}

#[test]
fn test_ocr_locator() {
    let app = Notepad::new();
    let session = app.session();
    let snapshots = SnapshotBuilder::default();
    let locator = Locator::parse("OCR:Submit").unwrap();

    let resolver = Resolver::new(&app.engine, None, &snapshots, POLL);
    assert!(matches!(
        resolver.resolve(&session, &locator, None, false),
        Err(AutomationError::UnsupportedOperation(_))
    ));

    let recognizer = StaticRecognizer::new(vec![OcrLine::new(vec![
        OcrWord {
            text: "Cancel".to_string(),
            bounds: Rect::new(10, 10, 60, 30),
        },
        OcrWord {
            text: "Submit".to_string(),
            bounds: Rect::new(70, 10, 130, 30),
        },
    ])]);
    let resolver = Resolver::new(&app.engine, Some(&recognizer), &snapshots, POLL);
    let elements = resolver.resolve(&session, &locator, None, false).unwrap();
    assert_eq!(elements[0].clickable_point, Some(Point::new(100, 20)));
    assert_eq!(elements[0].location, Rect::new(70, 10, 130, 30));

    let missing = Locator::parse("OCR:Apply").unwrap();
    let err = resolver.resolve(&session, &missing, None, false).unwrap_err();
    assert!(matches!(err, AutomationError::ElementNotFound(_)));
}

#[test]
fn test_provider_errors_become_not_found() {
    let app = Notepad::new();
    let session = app.session();
    app.menu_bar.break_node();
    let err = resolve_path(&app, &session, "/menuBar/menuItem", false).unwrap_err();
    assert!(matches!(err, AutomationError::ElementNotFound(_)), "{err:?}");
}

#[test]
fn test_walk_segments_from_arbitrary_root() {
    let app = Notepad::new();
    let root = app.status_bar.to_node();
    let segments = parse_path("/text[@name='100%']").unwrap().segments;
    let found = walk_segments(&root, &segments, false, false).unwrap();
    assert_eq!(names(&found), vec!["100%"]);
}
