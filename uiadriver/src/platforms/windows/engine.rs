//! Desktop-wide UI Automation engine

use super::element::WindowsNode;
use super::types::ThreadSafeWinUIAutomation;
use super::utils::{create_ui_automation_with_com_init, dispatch_keys};
use crate::keys::KeyStroke;
use crate::node::AccessibilityNode;
use crate::platforms::AccessibilityEngine;
use crate::types::{Point, ScreenshotResult};
use crate::AutomationError;
use std::process::Command;
use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, info, warn};
use uiautomation::inputs::{Keyboard, Mouse};
use uiautomation::types::{Point as UiaPoint, TreeScope, UIProperty};
use uiautomation::variants::Variant;

pub struct WindowsEngine {
    pub(crate) automation: Arc<ThreadSafeWinUIAutomation>,
}

impl WindowsEngine {
    pub fn new() -> Result<Self, AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        info!("UI Automation engine initialized");
        Ok(Self {
            automation: Arc::new(ThreadSafeWinUIAutomation(automation)),
        })
    }
}

impl AccessibilityEngine for WindowsEngine {
    fn root(&self) -> Result<AccessibilityNode, AutomationError> {
        let root = self.automation.0.get_root_element()?;
        Ok(WindowsNode::into_node(root))
    }

    fn top_level_windows(&self, pid: u32) -> Result<Vec<AccessibilityNode>, AutomationError> {
        let root = self.automation.0.get_root_element()?;
        let condition = self.automation.0.create_property_condition(
            UIProperty::ProcessId,
            Variant::from(pid as i32),
            None,
        )?;
        // Root children are reported in z-order
        let windows = root.find_all(TreeScope::Children, &condition)?;
        debug!(pid, count = windows.len(), "top-level windows");
        Ok(windows.into_iter().map(WindowsNode::into_node).collect())
    }

    fn launch_application(
        &self,
        app: &str,
        arguments: &[String],
        working_dir: Option<&str>,
    ) -> Result<u32, AutomationError> {
        let mut command = Command::new(app);
        command.args(arguments);
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }
        let child = command.spawn().map_err(|e| {
            AutomationError::SessionNotCreated(format!("failed to launch '{app}': {e}"))
        })?;
        info!(app, pid = child.id(), "application launched");
        Ok(child.id())
    }

    fn terminate_application(&self, pid: u32) -> Result<(), AutomationError> {
        let pid = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        match system.process(pid) {
            Some(process) => {
                if !process.kill() {
                    warn!(%pid, "failed to terminate process");
                    return Err(AutomationError::PlatformError(format!(
                        "failed to terminate process {pid}"
                    )));
                }
                info!(%pid, "application terminated");
            }
            None => debug!(%pid, "process already gone"),
        }
        Ok(())
    }

    fn element_at_point(&self, point: Point) -> Result<Option<AccessibilityNode>, AutomationError> {
        match self
            .automation
            .0
            .element_from_point(UiaPoint::new(point.x, point.y))
        {
            Ok(element) => Ok(Some(WindowsNode::into_node(element))),
            Err(e) => {
                debug!(?point, error = %e, "no element at point");
                Ok(None)
            }
        }
    }

    fn focused_element(&self) -> Result<AccessibilityNode, AutomationError> {
        match self.automation.0.get_focused_element() {
            Ok(element) => Ok(WindowsNode::into_node(element)),
            Err(_) => self.root(),
        }
    }

    fn capture_screen(&self) -> Result<ScreenshotResult, AutomationError> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| AutomationError::PlatformError(format!("Failed to get monitors: {e}")))?;
        let mut primary_monitor: Option<xcap::Monitor> = None;
        for monitor in monitors {
            match monitor.is_primary() {
                Ok(true) => {
                    primary_monitor = Some(monitor);
                    break;
                }
                Ok(false) => continue,
                Err(e) => {
                    return Err(AutomationError::PlatformError(format!(
                        "Error checking monitor primary status: {e}"
                    )));
                }
            }
        }
        let primary_monitor = primary_monitor.ok_or_else(|| {
            AutomationError::PlatformError("Could not find primary monitor".to_string())
        })?;

        let image = primary_monitor.capture_image().map_err(|e| {
            AutomationError::PlatformError(format!("Failed to capture screen: {e}"))
        })?;

        Ok(ScreenshotResult {
            width: image.width(),
            height: image.height(),
            image_data: image.into_raw(),
        })
    }

    fn click_at(&self, point: Point) -> Result<(), AutomationError> {
        debug!(?point, "clicking screen point");
        Mouse::default().click(UiaPoint::new(point.x, point.y))?;
        Ok(())
    }

    fn send_keys(&self, keys: &[KeyStroke]) -> Result<(), AutomationError> {
        let keyboard = Keyboard::new().interval(10);
        dispatch_keys(
            keys,
            |text| Ok(keyboard.send_text(text)?),
            |key| Ok(keyboard.send_keys(key)?),
        )
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
