//! In-memory accessibility tree.
//!
//! Backs the tests and lets embedders drive the locator stack without a real
//! desktop. Trees are built with a small builder API; nodes can be removed,
//! reordered, or made to fail so that retry and stale-node paths can be
//! exercised deterministically. Every tree search and every input action is
//! logged for inspection.

use crate::keys::{KeyStroke, SpecialKey};
use crate::node::{walk, AccessibilityNode, NodeImpl};
use crate::platforms::AccessibilityEngine;
use crate::property::{Condition, ControlType, Property, PropertyValue};
use crate::types::{Point, Rect, ScreenshotResult, TreeScope};
use crate::AutomationError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tracing::debug;

type NodeRef = Arc<RwLock<NodeData>>;

#[derive(Debug)]
struct NodeData {
    runtime_id: Vec<i32>,
    control_type: ControlType,
    properties: BTreeMap<Property, PropertyValue>,
    bounds: Rect,
    text: Option<String>,
    children: Vec<NodeRef>,
    parent: Option<Weak<RwLock<NodeData>>>,
    removed: bool,
    transient_failures: u32,
    broken: bool,
}

/// Input the in-memory engine received.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Click { runtime_id: Vec<i32> },
    ClickAt(Point),
    Focus { runtime_id: Vec<i32> },
    Keys {
        runtime_id: Option<Vec<i32>>,
        keys: Vec<KeyStroke>,
    },
    SetValue { runtime_id: Vec<i32>, value: String },
}

/// One `find_first`/`find_all` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRecord {
    pub start: Vec<i32>,
    pub scope: TreeScope,
    pub condition: String,
}

#[derive(Debug, Default)]
struct Shared {
    next_id: AtomicI32,
    searches: Mutex<Vec<SearchRecord>>,
    inputs: Mutex<Vec<InputEvent>>,
    focused: Mutex<Option<Weak<RwLock<NodeData>>>>,
    apps: Mutex<HashMap<String, u32>>,
    launched: Mutex<Vec<u32>>,
    terminated: Mutex<Vec<u32>>,
}

// Test fixtures keep working after a panicking test thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn read(node: &NodeRef) -> RwLockReadGuard<'_, NodeData> {
    node.read().unwrap_or_else(|e| e.into_inner())
}

fn write(node: &NodeRef) -> RwLockWriteGuard<'_, NodeData> {
    node.write().unwrap_or_else(|e| e.into_inner())
}

/// Desktop-level in-memory engine.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    root: NodeRef,
    shared: Arc<Shared>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        let shared = Arc::new(Shared::default());
        let root = new_node(&shared, ControlType::Pane, None);
        {
            let mut data = write(&root);
            data.properties
                .insert(Property::Name, PropertyValue::from("Desktop 1"));
            data.properties
                .insert(Property::ClassName, PropertyValue::from("#32769"));
            data.bounds = Rect::new(0, 0, 1920, 1080);
        }
        Self { root, shared }
    }

    pub fn desktop(&self) -> MemoryNode {
        self.node(self.root.clone())
    }

    /// Adds a top-level window owned by `pid` below the desktop.
    pub fn add_window(&self, pid: u32, name: &str) -> MemoryNode {
        self.desktop()
            .add_child(ControlType::Window, name)
            .with(Property::ProcessId, PropertyValue::Int(pid as i64))
    }

    /// Makes `app` launchable, yielding `pid`.
    pub fn register_app(&self, app: &str, pid: u32) {
        lock(&self.shared.apps).insert(app.to_lowercase(), pid);
    }

    pub fn searches(&self) -> Vec<SearchRecord> {
        lock(&self.shared.searches).clone()
    }

    pub fn clear_searches(&self) {
        lock(&self.shared.searches).clear();
    }

    pub fn inputs(&self) -> Vec<InputEvent> {
        lock(&self.shared.inputs).clone()
    }

    pub fn launched(&self) -> Vec<u32> {
        lock(&self.shared.launched).clone()
    }

    pub fn terminated(&self) -> Vec<u32> {
        lock(&self.shared.terminated).clone()
    }

    pub fn set_focus(&self, node: &MemoryNode) {
        *lock(&self.shared.focused) = Some(Arc::downgrade(&node.data));
    }

    fn node(&self, data: NodeRef) -> MemoryNode {
        MemoryNode {
            data,
            shared: self.shared.clone(),
        }
    }

    fn focused_ref(&self) -> Option<NodeRef> {
        lock(&self.shared.focused)
            .as_ref()
            .and_then(Weak::upgrade)
            .filter(|n| !read(n).removed)
    }
}

fn new_node(shared: &Arc<Shared>, control_type: ControlType, parent: Option<&NodeRef>) -> NodeRef {
    let serial = shared.next_id.fetch_add(1, Ordering::SeqCst);
    let mut properties = BTreeMap::new();
    properties.insert(Property::IsEnabled, PropertyValue::Bool(true));
    properties.insert(Property::IsOffscreen, PropertyValue::Bool(false));
    properties.insert(Property::IsControlElement, PropertyValue::Bool(true));
    properties.insert(Property::IsContentElement, PropertyValue::Bool(true));
    properties.insert(Property::FrameworkId, PropertyValue::from("Win32"));
    Arc::new(RwLock::new(NodeData {
        runtime_id: vec![42, serial],
        control_type,
        properties,
        bounds: Rect::default(),
        text: None,
        children: Vec::new(),
        parent: parent.map(Arc::downgrade),
        removed: false,
        transient_failures: 0,
        broken: false,
    }))
}

/// One node of the in-memory tree; cloning shares the node.
#[derive(Clone)]
pub struct MemoryNode {
    data: NodeRef,
    shared: Arc<Shared>,
}

impl fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = read(&self.data);
        f.debug_struct("MemoryNode")
            .field("runtime_id", &data.runtime_id)
            .field("control_type", &data.control_type)
            .field("name", &data.properties.get(&Property::Name))
            .finish()
    }
}

impl MemoryNode {
    /// Appends a child. The name is skipped when empty.
    pub fn add_child(&self, control_type: ControlType, name: &str) -> MemoryNode {
        let child = new_node(&self.shared, control_type, Some(&self.data));
        if !name.is_empty() {
            write(&child)
                .properties
                .insert(Property::Name, PropertyValue::from(name));
        }
        {
            let parent = read(&self.data);
            if let Some(pid) = parent.properties.get(&Property::ProcessId) {
                write(&child)
                    .properties
                    .insert(Property::ProcessId, pid.clone());
            }
        }
        write(&self.data).children.push(child.clone());
        MemoryNode {
            data: child,
            shared: self.shared.clone(),
        }
    }

    pub fn with(self, property: Property, value: impl Into<PropertyValue>) -> MemoryNode {
        write(&self.data).properties.insert(property, value.into());
        self
    }

    pub fn with_bounds(self, bounds: Rect) -> MemoryNode {
        write(&self.data).bounds = bounds;
        self
    }

    /// Content exposed through the text pattern.
    pub fn with_text(self, text: &str) -> MemoryNode {
        write(&self.data).text = Some(text.to_string());
        self
    }

    pub fn runtime_id_vec(&self) -> Vec<i32> {
        read(&self.data).runtime_id.clone()
    }

    pub fn value(&self) -> Option<String> {
        read(&self.data)
            .properties
            .get(&Property::Value)
            .map(|v| v.to_string())
    }

    pub fn to_node(&self) -> AccessibilityNode {
        AccessibilityNode::new(Box::new(self.clone()))
    }

    /// Detaches the node; handles to it become stale.
    pub fn remove(&self) {
        let parent = {
            let mut data = write(&self.data);
            data.removed = true;
            data.parent.as_ref().and_then(Weak::upgrade)
        };
        if let Some(parent) = parent {
            write(&parent)
                .children
                .retain(|c| !Arc::ptr_eq(c, &self.data));
        }
        mark_removed(&self.data);
    }

    /// Moves the node to the front of its siblings, as a newly activated
    /// window moves to the top of the z-order.
    pub fn bring_to_front(&self) {
        let parent = read(&self.data).parent.as_ref().and_then(Weak::upgrade);
        if let Some(parent) = parent {
            let mut parent = write(&parent);
            if let Some(pos) = parent
                .children
                .iter()
                .position(|c| Arc::ptr_eq(c, &self.data))
            {
                let node = parent.children.remove(pos);
                parent.children.insert(0, node);
            }
        }
    }

    /// The next `count` reads fail with a retryable provider error.
    pub fn fail_transiently(&self, count: u32) {
        write(&self.data).transient_failures = count;
    }

    /// Every read fails with a permanent provider error.
    pub fn break_node(&self) {
        write(&self.data).broken = true;
    }

    fn check(&self, operation: &str) -> Result<(), AutomationError> {
        let mut data = write(&self.data);
        if data.removed {
            return Err(AutomationError::ElementNotFound(format!(
                "element {:?} is no longer available",
                data.runtime_id
            )));
        }
        if data.broken {
            return Err(AutomationError::UIAutomationAPIError {
                message: "element is inaccessible".to_string(),
                com_error: None,
                operation: operation.to_string(),
                is_retryable: false,
            });
        }
        if data.transient_failures > 0 {
            data.transient_failures -= 1;
            return Err(AutomationError::UIAutomationAPIError {
                message: "element not available".to_string(),
                com_error: None,
                operation: operation.to_string(),
                is_retryable: true,
            });
        }
        Ok(())
    }

    fn record(&self, event: InputEvent) {
        lock(&self.shared.inputs).push(event);
    }

    fn record_search(&self, scope: TreeScope, condition: &Condition) {
        let start = self.runtime_id_vec();
        debug!(?start, ?scope, %condition, "memory tree search");
        lock(&self.shared.searches).push(SearchRecord {
            start,
            scope,
            condition: condition.to_string(),
        });
    }

    fn apply_keys(&self, keys: &[KeyStroke]) {
        let mut data = write(&self.data);
        let mut value = data
            .properties
            .get(&Property::Value)
            .map(|v| v.to_string())
            .unwrap_or_default();
        for key in keys {
            match key {
                KeyStroke::Char(c) => value.push(*c),
                KeyStroke::Special(SpecialKey::Backspace) => {
                    value.pop();
                }
                KeyStroke::Special(_) => {}
            }
        }
        data.properties
            .insert(Property::Value, PropertyValue::Str(value));
    }
}

fn mark_removed(node: &NodeRef) {
    let children = {
        let mut data = write(node);
        data.removed = true;
        data.children.clone()
    };
    for child in &children {
        mark_removed(child);
    }
}

impl NodeImpl for MemoryNode {
    fn runtime_id(&self) -> Result<Vec<i32>, AutomationError> {
        self.check("runtime_id")?;
        Ok(self.runtime_id_vec())
    }

    fn control_type(&self) -> Result<ControlType, AutomationError> {
        self.check("control_type")?;
        Ok(read(&self.data).control_type)
    }

    fn property(&self, property: Property) -> Result<Option<PropertyValue>, AutomationError> {
        self.check("property")?;
        Ok(read(&self.data).properties.get(&property).cloned())
    }

    fn bounds(&self) -> Result<Rect, AutomationError> {
        self.check("bounds")?;
        Ok(read(&self.data).bounds)
    }

    fn children(&self) -> Result<Vec<AccessibilityNode>, AutomationError> {
        self.check("children")?;
        let children = read(&self.data).children.clone();
        Ok(children
            .into_iter()
            .map(|data| {
                AccessibilityNode::new(Box::new(MemoryNode {
                    data,
                    shared: self.shared.clone(),
                }))
            })
            .collect())
    }

    fn find_first(
        &self,
        scope: TreeScope,
        condition: &Condition,
    ) -> Result<Option<AccessibilityNode>, AutomationError> {
        self.record_search(scope, condition);
        Ok(walk(&self.to_node(), scope, condition, true)?
            .into_iter()
            .next())
    }

    fn find_all(
        &self,
        scope: TreeScope,
        condition: &Condition,
    ) -> Result<Vec<AccessibilityNode>, AutomationError> {
        self.record_search(scope, condition);
        walk(&self.to_node(), scope, condition, false)
    }

    fn document_text(&self) -> Result<Option<String>, AutomationError> {
        self.check("document_text")?;
        Ok(read(&self.data).text.clone())
    }

    fn focus(&self) -> Result<(), AutomationError> {
        self.check("focus")?;
        *lock(&self.shared.focused) = Some(Arc::downgrade(&self.data));
        self.record(InputEvent::Focus {
            runtime_id: self.runtime_id_vec(),
        });
        Ok(())
    }

    fn click(&self) -> Result<(), AutomationError> {
        self.check("click")?;
        self.record(InputEvent::Click {
            runtime_id: self.runtime_id_vec(),
        });
        Ok(())
    }

    fn send_keys(&self, keys: &[KeyStroke]) -> Result<(), AutomationError> {
        self.check("send_keys")?;
        self.apply_keys(keys);
        self.record(InputEvent::Keys {
            runtime_id: Some(self.runtime_id_vec()),
            keys: keys.to_vec(),
        });
        Ok(())
    }

    fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        self.check("set_value")?;
        write(&self.data)
            .properties
            .insert(Property::Value, PropertyValue::from(value));
        self.record(InputEvent::SetValue {
            runtime_id: self.runtime_id_vec(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn NodeImpl> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn deepest_at(node: &NodeRef, point: Point) -> Option<NodeRef> {
    let data = read(node);
    if data.removed || !data.bounds.contains(point) {
        return None;
    }
    // Later siblings paint over earlier ones.
    data.children
        .iter()
        .rev()
        .find_map(|child| deepest_at(child, point))
        .or_else(|| Some(node.clone()))
}

impl AccessibilityEngine for MemoryEngine {
    fn root(&self) -> Result<AccessibilityNode, AutomationError> {
        Ok(self.desktop().to_node())
    }

    fn top_level_windows(&self, pid: u32) -> Result<Vec<AccessibilityNode>, AutomationError> {
        let wanted = PropertyValue::Int(pid as i64);
        let children = read(&self.root).children.clone();
        Ok(children
            .into_iter()
            .filter(|c| {
                let data = read(c);
                !data.removed && data.properties.get(&Property::ProcessId) == Some(&wanted)
            })
            .map(|data| self.node(data).to_node())
            .collect())
    }

    fn launch_application(
        &self,
        app: &str,
        _arguments: &[String],
        _working_dir: Option<&str>,
    ) -> Result<u32, AutomationError> {
        let key = app.to_lowercase();
        let apps = lock(&self.shared.apps);
        let pid = apps
            .get(&key)
            .or_else(|| {
                apps.iter()
                    .find(|(path, _)| {
                        path.rsplit(['\\', '/'])
                            .next()
                            .is_some_and(|file| file == key)
                    })
                    .map(|(_, pid)| pid)
            })
            .copied()
            .ok_or_else(|| {
                AutomationError::SessionNotCreated(format!("cannot launch '{app}'"))
            })?;
        lock(&self.shared.launched).push(pid);
        Ok(pid)
    }

    fn terminate_application(&self, pid: u32) -> Result<(), AutomationError> {
        for window in self.top_level_windows(pid)? {
            if let Some(node) = window.as_any().downcast_ref::<MemoryNode>() {
                node.remove();
            }
        }
        lock(&self.shared.terminated).push(pid);
        Ok(())
    }

    fn element_at_point(&self, point: Point) -> Result<Option<AccessibilityNode>, AutomationError> {
        Ok(deepest_at(&self.root, point).map(|data| self.node(data).to_node()))
    }

    fn focused_element(&self) -> Result<AccessibilityNode, AutomationError> {
        Ok(self
            .node(self.focused_ref().unwrap_or_else(|| self.root.clone()))
            .to_node())
    }

    fn capture_screen(&self) -> Result<ScreenshotResult, AutomationError> {
        let (width, height) = (16, 9);
        Ok(ScreenshotResult {
            image_data: vec![0; (width * height * 4) as usize],
            width,
            height,
        })
    }

    fn click_at(&self, point: Point) -> Result<(), AutomationError> {
        lock(&self.shared.inputs).push(InputEvent::ClickAt(point));
        Ok(())
    }

    fn send_keys(&self, keys: &[KeyStroke]) -> Result<(), AutomationError> {
        let focused = self.focused_ref().map(|data| self.node(data));
        if let Some(node) = &focused {
            node.apply_keys(keys);
        }
        lock(&self.shared.inputs).push(InputEvent::Keys {
            runtime_id: focused.map(|n| n.runtime_id_vec()),
            keys: keys.to_vec(),
        });
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
