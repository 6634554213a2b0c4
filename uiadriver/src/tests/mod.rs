mod dom_tests;
mod resolver_tests;

use crate::platforms::memory::{MemoryEngine, MemoryNode};
use crate::property::{ControlType, Property};
use crate::session::{Session, SessionScope, Timeouts};
use crate::types::Rect;
use serde_json::Value;
use std::time::Duration;

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_test_writer()
        .try_init();
}

pub const NOTEPAD_PID: u32 = 4242;

/// A text editor window with a menu bar, an edit area and a status bar.
pub struct Notepad {
    pub engine: MemoryEngine,
    pub window: MemoryNode,
    pub menu_bar: MemoryNode,
    pub file_menu: MemoryNode,
    pub editor: MemoryNode,
    pub status_bar: MemoryNode,
}

impl Notepad {
    pub fn new() -> Self {
        init_tracing();
        let engine = MemoryEngine::new();
        let window = engine
            .add_window(NOTEPAD_PID, "Untitled - Notepad")
            .with(Property::ClassName, "Notepad")
            .with_bounds(Rect::new(100, 100, 900, 700));
        let menu_bar = window
            .add_child(ControlType::MenuBar, "Application")
            .with_bounds(Rect::new(100, 130, 900, 150));
        let file_menu = menu_bar
            .add_child(ControlType::MenuItem, "File")
            .with_bounds(Rect::new(100, 130, 140, 150));
        menu_bar
            .add_child(ControlType::MenuItem, "Edit")
            .with_bounds(Rect::new(140, 130, 180, 150));
        menu_bar
            .add_child(ControlType::MenuItem, "Format")
            .with_bounds(Rect::new(180, 130, 240, 150));
        let editor = window
            .add_child(ControlType::Edit, "Text Editor")
            .with(Property::AutomationId, "15")
            .with(Property::ClassName, "Edit")
            .with(Property::Value, "")
            .with_bounds(Rect::new(100, 150, 900, 680));
        let status_bar = window
            .add_child(ControlType::StatusBar, "Status Bar")
            .with_bounds(Rect::new(100, 680, 900, 700));
        status_bar
            .add_child(ControlType::Text, "Ln 1, Col 1")
            .with_bounds(Rect::new(600, 680, 700, 700));
        status_bar
            .add_child(ControlType::Text, "100%")
            .with_bounds(Rect::new(700, 680, 760, 700));
        Self {
            engine,
            window,
            menu_bar,
            file_menu,
            editor,
            status_bar,
        }
    }

    pub fn session(&self) -> Session {
        Session::new(
            SessionScope::Application {
                pid: NOTEPAD_PID,
                launched: false,
            },
            Value::Null,
            Duration::from_millis(200),
            1.0,
            Timeouts::default(),
        )
    }
}
