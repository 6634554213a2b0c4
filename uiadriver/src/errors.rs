use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Session not created: {0}")]
    SessionNotCreated(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("UI Automation API error: {message}")]
    UIAutomationAPIError {
        message: String,
        com_error: Option<i32>,
        operation: String,
        is_retryable: bool,
    },
}

impl AutomationError {
    /// Transient provider failures worth another attempt (the node may be mid-mutation).
    pub fn is_retryable(&self) -> bool {
        match self {
            AutomationError::UIAutomationAPIError { is_retryable, .. } => *is_retryable,
            AutomationError::Timeout(_) => true,
            _ => false,
        }
    }

    /// True for every failure the caller should see as "nothing there".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AutomationError::ElementNotFound(_) | AutomationError::SessionNotFound(_)
        )
    }

    pub(crate) fn lock_poisoned(what: &str) -> Self {
        AutomationError::Internal(format!("{what} lock poisoned"))
    }
}
