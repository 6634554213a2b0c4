//! End-to-end driver scenarios on the in-memory engine

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use uiadriver::ocr::StaticRecognizer;
use uiadriver::platforms::memory::{InputEvent, MemoryEngine, MemoryNode};
use uiadriver::{
    AutomationError, ControlType, Driver, DriverConfig, LocationStrategy, OcrLine, OcrWord,
    Property, Rect, TextRecognizer,
};

const FORM_PID: u32 = 310;

/// Test helper to setup logging for debugging
fn setup_logging() {
    let _ = tracing_subscriber::fmt::Subscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

struct FormApp {
    engine: MemoryEngine,
    window: MemoryNode,
    first_name: MemoryNode,
    submit: MemoryNode,
}

impl FormApp {
    fn new() -> Self {
        setup_logging();
        let engine = MemoryEngine::new();
        engine.register_app("C:\\apps\\form.exe", FORM_PID);
        let window = engine
            .add_window(FORM_PID, "Registration")
            .with_bounds(Rect::new(0, 0, 800, 600));
        let group = window
            .add_child(ControlType::Group, "Personal")
            .with_bounds(Rect::new(10, 40, 790, 300));
        group
            .add_child(ControlType::Text, "First Name:")
            .with_bounds(Rect::new(20, 50, 120, 70));
        let first_name = group
            .add_child(ControlType::Edit, "First Name:")
            .with(Property::AutomationId, "firstName")
            .with(Property::IsKeyboardFocusable, true)
            .with(Property::Value, "")
            .with_bounds(Rect::new(130, 50, 400, 70));
        let submit = window
            .add_child(ControlType::Button, "Submit")
            .with(Property::AutomationId, "submit")
            .with_bounds(Rect::new(600, 540, 700, 570));
        Self {
            engine,
            window,
            first_name,
            submit,
        }
    }

    fn driver(&self, recognizer: Option<Arc<dyn TextRecognizer>>) -> Driver {
        let config = DriverConfig {
            session_timeout: Duration::from_millis(300),
            poll_interval: Duration::from_millis(10),
            read_timeout: Duration::from_millis(200),
            ..DriverConfig::default()
        };
        Driver::with_engine(Arc::new(self.engine.clone()), recognizer, config)
    }
}

fn launch(driver: &Driver) -> String {
    driver
        .create_session(&json!({
            "capabilities": { "alwaysMatch": { "app": "C:\\apps\\form.exe" } }
        }))
        .expect("session should be created")
        .id
        .clone()
}

#[test]
fn test_unfilled_field_text_is_empty() {
    let app = FormApp::new();
    let driver = app.driver(None);
    let sid = launch(&driver);

    let id = driver
        .find_element(&sid, &LocationStrategy::xpath("//edit[@name='First Name:']"))
        .unwrap();
    assert_eq!(id, "firstName");
    assert_eq!(driver.element_text(&sid, &id).unwrap(), "");

    driver.send_keys_to_element(&sid, &id, "Ada").unwrap();
    assert_eq!(driver.element_text(&sid, &id).unwrap(), "Ada");
    assert_eq!(app.first_name.value().as_deref(), Some("Ada"));

    driver.clear_element(&sid, &id).unwrap();
    assert_eq!(driver.element_text(&sid, &id).unwrap(), "");
}

#[test]
fn test_save_as_dialog_becomes_scope_root() {
    let app = FormApp::new();
    let driver = app.driver(None);
    let sid = launch(&driver);

    // the application opens a modal dialog on top of its main window
    let dialog = app.engine.add_window(FORM_PID, "Save As");
    let file_name = dialog
        .add_child(ControlType::ComboBox, "File name:")
        .with(Property::Value, "");
    let save = dialog.add_child(ControlType::Button, "Save");
    dialog.bring_to_front();

    let combo = driver
        .find_element(
            &sid,
            &LocationStrategy::xpath("/window[@name='Save As']/comboBox[@name='File name:']"),
        )
        .unwrap();
    driver.send_keys_to_element(&sid, &combo, "report.txt").unwrap();
    assert_eq!(file_name.value().as_deref(), Some("report.txt"));

    let button = driver
        .find_element(&sid, &LocationStrategy::xpath("/button[@name='Save']"))
        .unwrap();
    driver.click_element(&sid, &button).unwrap();
    assert!(app.engine.inputs().contains(&InputEvent::Click {
        runtime_id: save.runtime_id_vec()
    }));
}

#[test]
fn test_missing_ocr_text_is_not_found() {
    let app = FormApp::new();
    let recognizer = StaticRecognizer::new(vec![OcrLine::new(vec![OcrWord {
        text: "Cancel".to_string(),
        bounds: Rect::new(500, 540, 580, 570),
    }])]);
    let driver = app.driver(Some(Arc::new(recognizer)));
    let sid = launch(&driver);

    let err = driver
        .find_element(&sid, &LocationStrategy::xpath("OCR:Submit"))
        .unwrap_err();
    assert!(matches!(err, AutomationError::ElementNotFound(_)));

    let id = driver
        .find_element(&sid, &LocationStrategy::new("css selector", "Cancel"))
        .unwrap();
    driver.click_element(&sid, &id).unwrap();
    assert_eq!(
        app.engine.inputs().last(),
        Some(&InputEvent::ClickAt(uiadriver::Point::new(540, 555)))
    );
}

#[test]
fn test_deleted_session_is_gone() {
    let app = FormApp::new();
    let driver = app.driver(None);
    let sid = launch(&driver);
    let id = driver
        .find_element(&sid, &LocationStrategy::new("accessibility id", "submit"))
        .unwrap();

    driver.delete_session(&sid).unwrap();
    let err = driver
        .find_element(&sid, &LocationStrategy::new("accessibility id", "submit"))
        .unwrap_err();
    assert!(matches!(err, AutomationError::SessionNotFound(_)));
    assert!(driver.element_text(&sid, &id).unwrap_err().is_not_found());
    assert_eq!(app.engine.terminated(), vec![FORM_PID]);
}

#[test]
fn test_coordinate_element_performs_no_search() {
    let app = FormApp::new();
    let driver = app.driver(None);
    let sid = launch(&driver);
    app.engine.clear_searches();

    let id = driver
        .find_element(&sid, &LocationStrategy::xpath("//CORDS[650,555]"))
        .unwrap();
    assert!(app.engine.searches().is_empty());

    let element = driver.element(&sid, &id).unwrap();
    assert!(element.is_flat());
    // reads go to whatever is under the point
    assert_eq!(driver.element_text(&sid, &id).unwrap(), "Submit");
    assert_eq!(driver.element_tag_name(&sid, &id).unwrap(), "button");
    assert_eq!(
        driver.element_attribute(&sid, &id, "automationId").unwrap(),
        "submit"
    );
    assert!(driver.is_element_displayed(&sid, &id).unwrap());

    driver.click_element(&sid, &id).unwrap();
    assert_eq!(
        app.engine.inputs(),
        vec![InputEvent::ClickAt(uiadriver::Point::new(650, 555))]
    );

    // flat elements cannot scope a search
    let err = driver
        .find_element_from_element(&sid, &id, &LocationStrategy::xpath("/text"))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_element_reads() {
    let app = FormApp::new();
    let driver = app.driver(None);
    let sid = launch(&driver);
    let id = driver
        .find_element(&sid, &LocationStrategy::new("id", "submit"))
        .unwrap();

    assert_eq!(driver.element_tag_name(&sid, &id).unwrap(), "button");
    assert_eq!(driver.element_rect(&sid, &id).unwrap(), Rect::new(600, 540, 700, 570));
    assert_eq!(driver.element_attribute(&sid, &id, "name").unwrap(), "Submit");
    assert_eq!(driver.element_attribute(&sid, &id, "Right").unwrap(), "700");
    assert_eq!(driver.element_attribute(&sid, &id, "isEnabled").unwrap(), "true");
    assert!(driver
        .element_attribute(&sid, &id, "helpText")
        .unwrap_err()
        .is_not_found());
    assert!(driver
        .element_attribute(&sid, &id, "noSuchThing")
        .unwrap_err()
        .is_not_found());
    assert!(driver.is_element_enabled(&sid, &id).unwrap());
    assert!(!driver.is_element_selected(&sid, &id).unwrap());
    assert!(driver.is_element_displayed(&sid, &id).unwrap());

    app.submit.clone().with(Property::IsEnabled, false);
    assert!(!driver.is_element_enabled(&sid, &id).unwrap());
}

#[test]
fn test_find_from_element() {
    let app = FormApp::new();
    let driver = app.driver(None);
    let sid = launch(&driver);
    let group = driver
        .find_element(&sid, &LocationStrategy::xpath("//group[@name='Personal']"))
        .unwrap();

    let ids = driver
        .find_elements_from_element(&sid, &group, &LocationStrategy::xpath("/*[@name='First Name:']"))
        .unwrap();
    assert_eq!(ids.len(), 2);

    let err = driver
        .find_element_from_element(&sid, &group, &LocationStrategy::new("name", "Submit"))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_page_source_and_document_locator() {
    let app = FormApp::new();
    let driver = app.driver(None);
    let sid = launch(&driver);

    let xml = driver.page_source(&sid).unwrap();
    assert!(xml.starts_with("<dom>"), "{xml}");
    assert!(xml.contains("name=\"Registration\""), "{xml}");
    assert!(xml.contains(&format!(
        "id=\"{}\"",
        serde_json::to_string(&app.submit.runtime_id_vec()).unwrap()
    )));

    let id = driver
        .find_element(&sid, &LocationStrategy::xpath("/dom/window/button[@name='Submit']"))
        .unwrap();
    assert_eq!(id, "submit");

    // the stored snapshot stays in use until the next page source request
    app.window.add_child(ControlType::Button, "Later");
    assert!(driver
        .find_element(&sid, &LocationStrategy::xpath("/dom//button[@name='Later']"))
        .unwrap_err()
        .is_not_found());
    let snapshot = driver.create_snapshot(&sid).unwrap();
    assert!(snapshot.to_xml().unwrap().contains("Later"));
    driver
        .find_element(&sid, &LocationStrategy::xpath("/dom//button[@name='Later']"))
        .unwrap();
}

#[test]
fn test_active_element_and_screenshot() {
    let app = FormApp::new();
    let driver = app.driver(None);
    let sid = launch(&driver);

    app.engine.set_focus(&app.first_name);
    let id = driver.active_element(&sid).unwrap();
    assert_eq!(id, "firstName");

    let png = driver.screenshot(&sid).unwrap();
    assert!(!png.is_empty());
}

#[test]
fn test_invalid_locators_and_strategies() {
    let app = FormApp::new();
    let driver = app.driver(None);
    let sid = launch(&driver);

    assert!(matches!(
        driver.find_element(&sid, &LocationStrategy::xpath("//button[@name='x'")),
        Err(AutomationError::InvalidSelector(_))
    ));
    assert!(matches!(
        driver.find_element(&sid, &LocationStrategy::xpath("//sprocket")),
        Err(AutomationError::InvalidSelector(_))
    ));
    assert!(matches!(
        driver.find_element(&sid, &LocationStrategy::new("link text", "Submit")),
        Err(AutomationError::UnsupportedOperation(_))
    ));
    assert!(matches!(
        driver.find_element(&sid, &LocationStrategy::xpath("OCR:Submit")),
        Err(AutomationError::UnsupportedOperation(_))
    ));
}
