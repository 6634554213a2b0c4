use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Response Envelope
// ============================================================================

/// Every W3C response body is `{"value": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct W3cResponse<T> {
    pub value: T,
}

impl<T> W3cResponse<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct W3cErrorBody {
    pub error: String,
    pub message: String,
    pub stacktrace: String,
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionResponse {
    pub session_id: String,
    pub capabilities: Value,
}

// ============================================================================
// Elements
// ============================================================================

/// W3C web element reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElementRef {
    #[serde(rename = "element-6066-11e4-a52e-4f735466cecf")]
    pub element: String,
}

impl From<String> for ElementRef {
    fn from(element: String) -> Self {
        Self { element }
    }
}

/// Body of `POST .../value`. W3C clients send `text`; older ones send
/// `value` as a list of strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendKeysRequest {
    pub text: Option<String>,
    pub value: Option<Vec<String>>,
}

impl SendKeysRequest {
    pub fn into_text(self) -> Option<String> {
        self.text.or_else(|| self.value.map(|parts| parts.concat()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElementRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl From<uiadriver::Rect> for ElementRect {
    fn from(rect: uiadriver::Rect) -> Self {
        Self {
            x: rect.left,
            y: rect.top,
            width: rect.width(),
            height: rect.height(),
        }
    }
}
