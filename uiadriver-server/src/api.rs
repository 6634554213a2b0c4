use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};
use uiadriver::{AutomationError, Driver, LocationStrategy, TimeoutsUpdate};

use crate::types::{
    ElementRect, ElementRef, NewSessionResponse, SendKeysRequest, W3cErrorBody, W3cResponse,
};

type ApiResult<T> = Result<Json<W3cResponse<T>>, W3cError>;

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub struct W3cError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl W3cError {
    fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "invalid argument",
            message: message.into(),
        }
    }

    fn unknown(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "unknown error",
            message: message.into(),
        }
    }
}

impl From<AutomationError> for W3cError {
    fn from(err: AutomationError) -> Self {
        let (status, error) = match &err {
            AutomationError::ElementNotFound(_) => (StatusCode::NOT_FOUND, "no such element"),
            AutomationError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "invalid session id"),
            AutomationError::InvalidSelector(_) => (StatusCode::BAD_REQUEST, "invalid selector"),
            AutomationError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid argument"),
            AutomationError::UnsupportedOperation(_) => {
                (StatusCode::NOT_IMPLEMENTED, "unsupported operation")
            }
            AutomationError::SessionNotCreated(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "session not created")
            }
            AutomationError::Timeout(_) => (StatusCode::INTERNAL_SERVER_ERROR, "timeout"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "unknown error"),
        };
        Self {
            status,
            error,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for W3cError {
    fn into_response(self) -> Response {
        debug!(status = %self.status, error = self.error, message = %self.message, "request failed");
        let body = W3cResponse::new(W3cErrorBody {
            error: self.error.to_string(),
            message: self.message,
            stacktrace: String::new(),
        });
        (self.status, Json(body)).into_response()
    }
}

/// Runs a driver call on the blocking pool; provider calls can take seconds.
async fn blocking<T, F>(f: F) -> Result<T, W3cError>
where
    F: FnOnce() -> Result<T, AutomationError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| W3cError::unknown(format!("driver task failed: {e}")))?
        .map_err(W3cError::from)
}

fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, W3cError> {
    serde_json::from_value(body).map_err(|e| W3cError::invalid_argument(e.to_string()))
}

fn ok<T>(value: T) -> ApiResult<T> {
    Ok(Json(W3cResponse::new(value)))
}

// ============================================================================
// Sessions
// ============================================================================

pub async fn status(State(driver): State<Driver>) -> Json<W3cResponse<Value>> {
    Json(W3cResponse::new(driver.status()))
}

pub async fn new_session(
    State(driver): State<Driver>,
    Json(body): Json<Value>,
) -> ApiResult<NewSessionResponse> {
    let session = blocking(move || driver.create_session(&body)).await?;
    info!(session_id = %session.id, "POST /session");
    ok(NewSessionResponse {
        session_id: session.id.clone(),
        capabilities: session.capabilities.clone(),
    })
}

pub async fn delete_session(
    State(driver): State<Driver>,
    Path(sid): Path<String>,
) -> ApiResult<Value> {
    blocking(move || driver.delete_session(&sid)).await?;
    ok(Value::Null)
}

pub async fn get_timeouts(
    State(driver): State<Driver>,
    Path(sid): Path<String>,
) -> ApiResult<Value> {
    let timeouts = blocking(move || driver.timeouts(&sid)).await?;
    ok(serde_json::to_value(timeouts).map_err(|e| W3cError::unknown(e.to_string()))?)
}

pub async fn set_timeouts(
    State(driver): State<Driver>,
    Path(sid): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let update: TimeoutsUpdate = parse_body(body)?;
    blocking(move || driver.set_timeouts(&sid, update)).await?;
    ok(Value::Null)
}

pub async fn page_source(
    State(driver): State<Driver>,
    Path(sid): Path<String>,
) -> ApiResult<String> {
    ok(blocking(move || driver.page_source(&sid)).await?)
}

pub async fn create_snapshot(
    State(driver): State<Driver>,
    Path(sid): Path<String>,
) -> ApiResult<String> {
    ok(blocking(move || driver.create_snapshot(&sid)?.to_xml()).await?)
}

pub async fn screenshot(
    State(driver): State<Driver>,
    Path(sid): Path<String>,
) -> ApiResult<String> {
    ok(blocking(move || driver.screenshot(&sid)).await?)
}

// ============================================================================
// Finding Elements
// ============================================================================

pub async fn find_element(
    State(driver): State<Driver>,
    Path(sid): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<ElementRef> {
    let strategy: LocationStrategy = parse_body(body)?;
    let id = blocking(move || driver.find_element(&sid, &strategy)).await?;
    ok(ElementRef::from(id))
}

pub async fn find_elements(
    State(driver): State<Driver>,
    Path(sid): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Vec<ElementRef>> {
    let strategy: LocationStrategy = parse_body(body)?;
    let ids = blocking(move || driver.find_elements(&sid, &strategy)).await?;
    ok(ids.into_iter().map(ElementRef::from).collect())
}

pub async fn find_element_from_element(
    State(driver): State<Driver>,
    Path((sid, eid)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<ElementRef> {
    let strategy: LocationStrategy = parse_body(body)?;
    let id = blocking(move || driver.find_element_from_element(&sid, &eid, &strategy)).await?;
    ok(ElementRef::from(id))
}

pub async fn find_elements_from_element(
    State(driver): State<Driver>,
    Path((sid, eid)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<Vec<ElementRef>> {
    let strategy: LocationStrategy = parse_body(body)?;
    let ids = blocking(move || driver.find_elements_from_element(&sid, &eid, &strategy)).await?;
    ok(ids.into_iter().map(ElementRef::from).collect())
}

pub async fn active_element(
    State(driver): State<Driver>,
    Path(sid): Path<String>,
) -> ApiResult<ElementRef> {
    let id = blocking(move || driver.active_element(&sid)).await?;
    ok(ElementRef::from(id))
}

// ============================================================================
// Element Interaction
// ============================================================================

pub async fn element_click(
    State(driver): State<Driver>,
    Path((sid, eid)): Path<(String, String)>,
) -> ApiResult<Value> {
    blocking(move || driver.click_element(&sid, &eid)).await?;
    ok(Value::Null)
}

pub async fn element_clear(
    State(driver): State<Driver>,
    Path((sid, eid)): Path<(String, String)>,
) -> ApiResult<Value> {
    blocking(move || driver.clear_element(&sid, &eid)).await?;
    ok(Value::Null)
}

pub async fn element_send_keys(
    State(driver): State<Driver>,
    Path((sid, eid)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let request: SendKeysRequest = parse_body(body)?;
    let text = request
        .into_text()
        .ok_or_else(|| W3cError::invalid_argument("missing 'text' in request body"))?;
    blocking(move || driver.send_keys_to_element(&sid, &eid, &text)).await?;
    ok(Value::Null)
}

// ============================================================================
// Element State
// ============================================================================

pub async fn element_text(
    State(driver): State<Driver>,
    Path((sid, eid)): Path<(String, String)>,
) -> ApiResult<String> {
    ok(blocking(move || driver.element_text(&sid, &eid)).await?)
}

pub async fn element_tag_name(
    State(driver): State<Driver>,
    Path((sid, eid)): Path<(String, String)>,
) -> ApiResult<String> {
    ok(blocking(move || driver.element_tag_name(&sid, &eid)).await?)
}

pub async fn element_attribute(
    State(driver): State<Driver>,
    Path((sid, eid, name)): Path<(String, String, String)>,
) -> ApiResult<String> {
    ok(blocking(move || driver.element_attribute(&sid, &eid, &name)).await?)
}

pub async fn element_rect(
    State(driver): State<Driver>,
    Path((sid, eid)): Path<(String, String)>,
) -> ApiResult<ElementRect> {
    let rect = blocking(move || driver.element_rect(&sid, &eid)).await?;
    ok(ElementRect::from(rect))
}

pub async fn element_enabled(
    State(driver): State<Driver>,
    Path((sid, eid)): Path<(String, String)>,
) -> ApiResult<bool> {
    ok(blocking(move || driver.is_element_enabled(&sid, &eid)).await?)
}

pub async fn element_selected(
    State(driver): State<Driver>,
    Path((sid, eid)): Path<(String, String)>,
) -> ApiResult<bool> {
    ok(blocking(move || driver.is_element_selected(&sid, &eid)).await?)
}

pub async fn element_displayed(
    State(driver): State<Driver>,
    Path((sid, eid)): Path<(String, String)>,
) -> ApiResult<bool> {
    ok(blocking(move || driver.is_element_displayed(&sid, &eid)).await?)
}

#[cfg(test)]
impl W3cError {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn code(&self) -> &'static str {
        self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use uiadriver::platforms::memory::{InputEvent, MemoryEngine, MemoryNode};
    use uiadriver::{ControlType, DriverConfig, Property, Rect};

    const PID: u32 = 77;

    struct Fixture {
        engine: MemoryEngine,
        driver: Driver,
        ok_button: MemoryNode,
    }

    fn fixture() -> Fixture {
        let engine = MemoryEngine::new();
        engine.register_app("calc.exe", PID);
        let window = engine
            .add_window(PID, "Calculator")
            .with_bounds(Rect::new(0, 0, 400, 600));
        window
            .add_child(ControlType::Edit, "Display")
            .with(Property::AutomationId, "display")
            .with(Property::Value, "0");
        let ok_button = window
            .add_child(ControlType::Button, "OK")
            .with(Property::AutomationId, "ok")
            .with_bounds(Rect::new(10, 500, 110, 540));
        let config = DriverConfig {
            session_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
            read_timeout: Duration::from_millis(100),
            ..DriverConfig::default()
        };
        let driver = Driver::with_engine(Arc::new(engine.clone()), None, config);
        Fixture {
            engine,
            driver,
            ok_button,
        }
    }

    async fn start(driver: &Driver) -> String {
        let body = json!({ "capabilities": { "alwaysMatch": { "app": "calc.exe" } } });
        let Json(response) = new_session(State(driver.clone()), Json(body))
            .await
            .unwrap();
        response.value.session_id
    }

    async fn find(driver: &Driver, sid: &str, using: &str, value: &str) -> Result<String, W3cError> {
        let body = json!({ "using": using, "value": value });
        let Json(response) = find_element(State(driver.clone()), Path(sid.to_string()), Json(body)).await?;
        Ok(response.value.element)
    }

    #[tokio::test]
    async fn test_new_session_echoes_capabilities() {
        let f = fixture();
        let body = json!({ "capabilities": { "alwaysMatch": { "app": "calc.exe" } } });
        let Json(response) = new_session(State(f.driver.clone()), Json(body))
            .await
            .unwrap();
        assert_eq!(response.value.capabilities["app"], "calc.exe");
        assert_eq!(f.engine.launched(), vec![PID]);

        let wire = serde_json::to_value(&response).unwrap();
        assert!(wire["value"]["sessionId"].is_string());
    }

    #[tokio::test]
    async fn test_session_not_created_is_500() {
        let f = fixture();
        let body = json!({ "capabilities": { "alwaysMatch": { "app": "nowhere.exe" } } });
        let err = new_session(State(f.driver.clone()), Json(body))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "session not created");
    }

    #[tokio::test]
    async fn test_find_and_click() {
        let f = fixture();
        let sid = start(&f.driver).await;
        let id = find(&f.driver, &sid, "xpath", "//button[@name='OK']").await.unwrap();
        assert_eq!(id, "ok");

        element_click(State(f.driver.clone()), Path((sid.clone(), id)))
            .await
            .unwrap();
        assert!(f.engine.inputs().contains(&InputEvent::Click {
            runtime_id: f.ok_button.runtime_id_vec()
        }));
    }

    #[tokio::test]
    async fn test_element_reference_wire_format() {
        let f = fixture();
        let sid = start(&f.driver).await;
        let body = json!({ "using": "tag name", "value": "button" });
        let Json(response) = find_elements(State(f.driver.clone()), Path(sid), Json(body))
            .await
            .unwrap();
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire, json!({ "value": [{ "element-6066-11e4-a52e-4f735466cecf": "ok" }] }));
    }

    #[tokio::test]
    async fn test_error_status_codes() {
        let f = fixture();
        let sid = start(&f.driver).await;

        let err = find(&f.driver, &sid, "xpath", "//button[@name='Cancel']").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "no such element");

        let err = find(&f.driver, &sid, "xpath", "//button[").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "invalid selector");

        let err = find(&f.driver, &sid, "link text", "OK").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_IMPLEMENTED);

        let err = find(&f.driver, "missing", "id", "ok").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "invalid session id");

        let body = json!({ "value": "no strategy" });
        let err = find_element(State(f.driver.clone()), Path(sid), Json(body))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid argument");
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = W3cError::from(AutomationError::ElementNotFound("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            json!({ "value": {
                "error": "no such element",
                "message": "Element not found: x",
                "stacktrace": ""
            } })
        );
    }

    #[tokio::test]
    async fn test_send_keys_and_text() {
        let f = fixture();
        let sid = start(&f.driver).await;
        let id = find(&f.driver, &sid, "accessibility id", "display").await.unwrap();

        element_clear(State(f.driver.clone()), Path((sid.clone(), id.clone())))
            .await
            .unwrap();
        let body = json!({ "text": "12", "value": ["ignored"] });
        element_send_keys(State(f.driver.clone()), Path((sid.clone(), id.clone())), Json(body))
            .await
            .unwrap();
        let body = json!({ "value": ["+", "3"] });
        element_send_keys(State(f.driver.clone()), Path((sid.clone(), id.clone())), Json(body))
            .await
            .unwrap();

        let Json(text) = element_text(State(f.driver.clone()), Path((sid.clone(), id.clone())))
            .await
            .unwrap();
        assert_eq!(text.value, "12+3");

        let err = element_send_keys(State(f.driver.clone()), Path((sid, id)), Json(json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rect_and_state() {
        let f = fixture();
        let sid = start(&f.driver).await;
        let id = find(&f.driver, &sid, "id", "ok").await.unwrap();

        let Json(rect) = element_rect(State(f.driver.clone()), Path((sid.clone(), id.clone())))
            .await
            .unwrap();
        assert_eq!(
            rect.value,
            ElementRect {
                x: 10,
                y: 500,
                width: 100,
                height: 40
            }
        );
        let Json(tag) = element_tag_name(State(f.driver.clone()), Path((sid.clone(), id.clone())))
            .await
            .unwrap();
        assert_eq!(tag.value, "button");
        let Json(enabled) = element_enabled(State(f.driver.clone()), Path((sid.clone(), id.clone())))
            .await
            .unwrap();
        assert!(enabled.value);
        let Json(name) = element_attribute(
            State(f.driver.clone()),
            Path((sid, id, "automationId".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(name.value, "ok");
    }

    #[tokio::test]
    async fn test_timeouts_round_trip() {
        let f = fixture();
        let sid = start(&f.driver).await;
        set_timeouts(
            State(f.driver.clone()),
            Path(sid.clone()),
            Json(json!({ "implicit": 250 })),
        )
        .await
        .unwrap();
        let Json(timeouts) = get_timeouts(State(f.driver.clone()), Path(sid.clone()))
            .await
            .unwrap();
        assert_eq!(timeouts.value["implicit"], 250);

        let err = set_timeouts(State(f.driver.clone()), Path(sid), Json(json!({ "implicit": "soon" })))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid argument");
    }

    #[tokio::test]
    async fn test_source_snapshot_and_delete() {
        let f = fixture();
        let sid = start(&f.driver).await;
        let Json(source) = page_source(State(f.driver.clone()), Path(sid.clone()))
            .await
            .unwrap();
        assert!(source.value.contains("name=\"Calculator\""));

        let Json(snapshot) = create_snapshot(State(f.driver.clone()), Path(sid.clone()))
            .await
            .unwrap();
        assert_eq!(snapshot.value, source.value);

        delete_session(State(f.driver.clone()), Path(sid.clone()))
            .await
            .unwrap();
        assert_eq!(f.engine.terminated(), vec![PID]);
        let err = page_source(State(f.driver.clone()), Path(sid)).await.unwrap_err();
        assert_eq!(err.code(), "invalid session id");
    }
}
