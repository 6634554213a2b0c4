//! Tests for snapshot building, evaluation and serialization

use super::Notepad;
use crate::dom::{SnapshotBuilder, SnapshotDepth, VirtualDocument, VirtualElement, DOCUMENT_TAG};
use crate::path::parse_path;
use crate::property::{ControlType, Property};
use crate::AutomationError;
use std::time::Duration;

fn builder() -> SnapshotBuilder {
    SnapshotBuilder::new(SnapshotDepth::Full, Duration::from_millis(50))
}

#[test]
fn test_runtime_id_round_trip() {
    let app = Notepad::new();
    let document = builder().build(&app.window.to_node());
    assert!(!document.is_error());

    let segments = parse_path("//edit[@automationId='15']").unwrap().segments;
    let editor = document.evaluate(&segments).unwrap();
    assert_eq!(editor.runtime_id().unwrap(), app.editor.runtime_id_vec());

    let segments = parse_path("/window").unwrap().segments;
    let window = document.evaluate(&segments).unwrap();
    assert_eq!(window.runtime_id().unwrap(), app.window.runtime_id_vec());
}

#[test]
fn test_snapshot_is_idempotent() {
    let app = Notepad::new();
    let first = builder().build(&app.window.to_node());
    let second = builder().build(&app.window.to_node());
    assert_eq!(first, second);
    assert_eq!(first.to_xml().unwrap(), second.to_xml().unwrap());
}

#[test]
fn test_snapshot_shape() {
    let app = Notepad::new();
    let document = builder().build(&app.window.to_node());
    // window, menu bar + 3 items, editor, status bar + 2 texts
    assert_eq!(document.len(), 9);

    let wrapper = document.document_element().unwrap();
    assert_eq!(wrapper.tag, DOCUMENT_TAG);
    let window = &wrapper.children[0];
    assert_eq!(window.tag, "window");
    assert_eq!(window.attribute("name"), Some("Untitled - Notepad"));
    assert_eq!(window.attribute("className"), Some("Notepad"));
    assert_eq!(window.attribute("isEnabled"), Some("true"));
    assert_eq!(window.attribute("left"), Some("100"));
    assert_eq!(window.attribute("bottom"), Some("700"));
    let tags: Vec<&str> = window.children.iter().map(|c| c.tag.as_str()).collect();
    assert_eq!(tags, vec!["menuBar", "edit", "statusBar"]);
}

#[test]
fn test_time_varying_properties_stay_out_of_the_snapshot() {
    let app = Notepad::new();
    app.editor.clone().with(Property::Value, "draft");
    let document = builder().build(&app.window.to_node());
    let segments = parse_path("//edit").unwrap().segments;
    let editor = document.evaluate(&segments).unwrap();
    assert_eq!(editor.attribute("value"), None);
    assert_eq!(editor.attribute("hasKeyboardFocus"), None);
}

#[test]
fn test_children_only_depth() {
    let app = Notepad::new();
    let document = SnapshotBuilder::new(SnapshotDepth::ChildrenOnly, Duration::from_millis(50))
        .build(&app.window.to_node());
    assert_eq!(document.len(), 4);
}

#[test]
fn test_transient_failures_are_retried() {
    let app = Notepad::new();
    app.editor.fail_transiently(2);
    let document = SnapshotBuilder::new(SnapshotDepth::Full, Duration::from_secs(2))
        .build(&app.window.to_node());
    assert!(!document.is_error());
    let segments = parse_path("//edit").unwrap().segments;
    let editor = document.evaluate(&segments).unwrap();
    assert_eq!(editor.attribute("name"), Some("Text Editor"));
}

#[test]
fn test_failed_walk_yields_error_document() {
    let app = Notepad::new();
    app.status_bar.break_node();
    let document = builder().build(&app.window.to_node());
    assert!(document.is_error());
    assert!(document.is_empty());
    let xml = document.to_xml().unwrap();
    assert!(xml.starts_with("<Error>"), "{xml}");
    assert!(xml.ends_with("</Error>"), "{xml}");

    let segments = parse_path("//edit").unwrap().segments;
    assert!(matches!(
        document.evaluate(&segments),
        Err(AutomationError::ElementNotFound(_))
    ));
}

#[test]
fn test_evaluate_index_and_fail_fast() {
    let app = Notepad::new();
    let document = builder().build(&app.window.to_node());

    let segments = parse_path("/window/menuBar/menuItem[2]").unwrap().segments;
    assert_eq!(
        document.evaluate(&segments).unwrap().attribute("name"),
        Some("Edit")
    );

    let segments = parse_path("/window/toolBar/button").unwrap().segments;
    let err = document.evaluate(&segments).unwrap_err();
    assert!(err.to_string().contains("segment 2"), "{err}");

    let segments = parse_path("//*").unwrap().segments;
    assert!(document.evaluate(&segments).is_err());
}

#[test]
fn test_partial_filters_in_snapshot() {
    let app = Notepad::new();
    let document = builder().build(&app.window.to_node());
    let segments = parse_path("//partialtext[contains(@name, 'Col')]")
        .unwrap()
        .segments;
    assert_eq!(
        document.evaluate(&segments).unwrap().attribute("name"),
        Some("Ln 1, Col 1")
    );
}

#[test]
fn test_xml_serialization() {
    let app = Notepad::new();
    app.file_menu.clone().with(Property::HelpText, "Fish & \"Chips\"");
    let xml = builder().build(&app.window.to_node()).to_xml().unwrap();
    assert!(xml.starts_with("<dom>"), "{xml}");
    assert!(xml.contains("<menuItem "), "{xml}");
    assert!(xml.contains("helpText=\"Fish &amp; &quot;Chips&quot;\""), "{xml}");
    assert!(xml.trim_end().ends_with("</dom>"), "{xml}");

    let mut root = VirtualElement::new("");
    root.attributes.insert("name".to_string(), "x".to_string());
    let xml = VirtualDocument::from_root(root).to_xml().unwrap();
    assert!(xml.contains("<unknown name=\"x\"/>"), "{xml}");
}

#[test]
fn test_virtual_element_matches_control_type_case_insensitively() {
    let element = VirtualElement::new("menuItem");
    assert!(element.matches(&crate::Condition::ControlType(ControlType::MenuItem)));
    assert!(!element.matches(&crate::Condition::ControlType(ControlType::Menu)));
}

#[test]
fn test_evaluate_all_keeps_every_last_segment_match() {
    let app = Notepad::new();
    let document = builder().build(&app.window.to_node());

    let segments = parse_path("/menuBar/menuItem").unwrap().segments;
    let names: Vec<_> = document
        .evaluate_all(&segments)
        .unwrap()
        .iter()
        .map(|el| el.attribute("name").unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["File", "Edit", "Format"]);

    let segments = parse_path("//menuItem[3]").unwrap().segments;
    assert_eq!(document.evaluate_all(&segments).unwrap().len(), 1);

    let segments = parse_path("//menuItem[@name='View']").unwrap().segments;
    assert!(document.evaluate_all(&segments).unwrap().is_empty());

    // earlier segments still fail fast
    let segments = parse_path("//toolBar/button").unwrap().segments;
    assert!(document.evaluate_all(&segments).is_err());
}

#[test]
fn test_control_characters_are_dropped_from_xml() {
    let app = Notepad::new();
    app.file_menu
        .clone()
        .with(Property::HelpText, "Open\u{1}\u{8} file\u{FFFF}\tnow");
    let xml = builder().build(&app.window.to_node()).to_xml().unwrap();
    assert!(xml.contains("helpText=\"Open file\tnow\""), "{xml:?}");
    assert!(!xml.chars().any(|c| c < ' ' && !matches!(c, '\t' | '\n' | '\r')));

    let xml = VirtualDocument::error("bad \u{0}name").to_xml().unwrap();
    assert!(xml.contains("bad name"), "{xml:?}");
    assert!(!xml.contains('\u{0}'));
}
