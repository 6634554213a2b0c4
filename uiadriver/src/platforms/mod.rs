use crate::keys::KeyStroke;
use crate::node::AccessibilityNode;
use crate::ocr::TextRecognizer;
use crate::types::{Point, ScreenshotResult};
use crate::AutomationError;
use std::sync::Arc;

/// The desktop-wide capability every platform engine implements
pub trait AccessibilityEngine: Send + Sync {
    /// Root of the whole desktop tree
    fn root(&self) -> Result<AccessibilityNode, AutomationError>;

    /// Top-level windows owned by a process, topmost first
    fn top_level_windows(&self, pid: u32) -> Result<Vec<AccessibilityNode>, AutomationError>;

    /// Start an application and return its process id
    fn launch_application(
        &self,
        app: &str,
        arguments: &[String],
        working_dir: Option<&str>,
    ) -> Result<u32, AutomationError>;

    fn terminate_application(&self, pid: u32) -> Result<(), AutomationError>;

    /// Deepest node under a screen point, if any
    fn element_at_point(&self, point: Point) -> Result<Option<AccessibilityNode>, AutomationError>;

    /// Node with keyboard focus; the desktop root when nothing has focus
    fn focused_element(&self) -> Result<AccessibilityNode, AutomationError>;

    /// Capture the primary screen
    fn capture_screen(&self) -> Result<ScreenshotResult, AutomationError>;

    /// OS-level left click at a screen point
    fn click_at(&self, point: Point) -> Result<(), AutomationError>;

    /// OS-level key injection into whatever has focus
    fn send_keys(&self, keys: &[KeyStroke]) -> Result<(), AutomationError>;

    /// Enable downcasting to concrete engine types
    fn as_any(&self) -> &dyn std::any::Any;
}

pub mod memory;
#[cfg(target_os = "windows")]
pub mod windows;

/// Create the engine for the current platform
pub fn create_engine() -> Result<Arc<dyn AccessibilityEngine>, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsEngine::new()?))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(
            "UI Automation is only available on Windows".to_string(),
        ))
    }
}

/// Create the OCR backend for the current platform
pub fn create_recognizer() -> Result<Arc<dyn TextRecognizer>, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsOcr::new()?))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(
            "OCR is only available on Windows".to_string(),
        ))
    }
}
