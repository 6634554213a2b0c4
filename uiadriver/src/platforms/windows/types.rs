//! Thread-safety wrappers and error conversions for the Windows platform

use crate::AutomationError;
use std::sync::Arc;

/// Thread-safe wrapper for the UIAutomation COM object
pub(crate) struct ThreadSafeWinUIAutomation(pub(crate) uiautomation::UIAutomation);

// Safety: UIAutomation is thread-safe after proper COM initialization
unsafe impl Send for ThreadSafeWinUIAutomation {}
unsafe impl Sync for ThreadSafeWinUIAutomation {}

/// Thread-safe wrapper for UIElement
#[derive(Clone)]
pub(crate) struct ThreadSafeWinUIElement(pub(crate) Arc<uiautomation::UIElement>);

// Safety: UIElement is thread-safe when wrapped properly
unsafe impl Send for ThreadSafeWinUIElement {}
unsafe impl Sync for ThreadSafeWinUIElement {}

/// HRESULTs worth retrying: the element is mid-mutation or the provider is busy.
const RETRYABLE_HRESULTS: &[u32] = &[
    0x8004_0201, // UIA_E_ELEMENTNOTAVAILABLE
    0x8013_1505, // UIA_E_TIMEOUT
    0x8001_0001, // RPC_E_CALL_REJECTED
    0x8001_010A, // RPC_E_SERVERCALL_RETRYLATER
];

impl From<uiautomation::Error> for AutomationError {
    fn from(error: uiautomation::Error) -> Self {
        let code = error.code();
        AutomationError::UIAutomationAPIError {
            message: error.to_string(),
            com_error: Some(code),
            operation: String::new(),
            is_retryable: RETRYABLE_HRESULTS.contains(&(code as u32)),
        }
    }
}

impl From<windows::core::Error> for AutomationError {
    fn from(error: windows::core::Error) -> Self {
        AutomationError::PlatformError(format!("Windows API error: {error}"))
    }
}
