//! Windows UI Automation node

use super::types::ThreadSafeWinUIElement;
use super::utils::{
    create_ui_automation_with_com_init, dispatch_keys, from_uia_control_type, to_uia_condition,
};
use crate::keys::KeyStroke;
use crate::node::{walk, AccessibilityNode, NodeImpl};
use crate::property::{Condition, ControlType, Property, PropertyValue};
use crate::types::{Point, Rect, TreeScope};
use crate::AutomationError;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;
use uiautomation::patterns;
use uiautomation::types::TreeScope as UiaTreeScope;

/// A null COM result from `FindFirst` means nothing matched.
const NULL_RESULT_HRESULTS: &[i32] = &[0, 0x8000_4003u32 as i32];

pub struct WindowsNode {
    pub(crate) element: ThreadSafeWinUIElement,
}

impl Debug for WindowsNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsNode")
            .field("name", &self.element.0.get_name().unwrap_or_default())
            .finish()
    }
}

impl WindowsNode {
    pub(crate) fn new(element: uiautomation::UIElement) -> Self {
        Self {
            element: ThreadSafeWinUIElement(Arc::new(element)),
        }
    }

    pub(crate) fn into_node(element: uiautomation::UIElement) -> AccessibilityNode {
        AccessibilityNode::new(Box::new(Self::new(element)))
    }

    fn node(&self) -> AccessibilityNode {
        AccessibilityNode::new(self.clone_box())
    }

    /// Searches with a native UIA condition when one can be built. Returns
    /// `None` when the condition has to be evaluated through the facade.
    fn native_find(
        &self,
        scope: TreeScope,
        condition: &Condition,
        first_only: bool,
    ) -> Result<Option<Vec<AccessibilityNode>>, AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        let Some(native) = to_uia_condition(&automation, condition)? else {
            return Ok(None);
        };

        let mut found = Vec::new();
        let scope = match scope {
            TreeScope::Children => UiaTreeScope::Children,
            TreeScope::Descendants => UiaTreeScope::Descendants,
            TreeScope::Subtree => UiaTreeScope::Subtree,
            // UIA has no self-or-children scope; check self here and search children natively
            TreeScope::SelfOrChildren => {
                let start = self.node();
                if condition.matches(&start)? {
                    found.push(start);
                    if first_only {
                        return Ok(Some(found));
                    }
                }
                UiaTreeScope::Children
            }
        };

        if first_only {
            match self.element.0.find_first(scope, &native) {
                Ok(element) => found.push(Self::into_node(element)),
                Err(e) if NULL_RESULT_HRESULTS.contains(&e.code()) => {}
                Err(e) => return Err(e.into()),
            }
        } else {
            found.extend(
                self.element
                    .0
                    .find_all(scope, &native)?
                    .into_iter()
                    .map(Self::into_node),
            );
        }
        Ok(Some(found))
    }

    fn string(read: uiautomation::Result<String>) -> Result<Option<PropertyValue>, AutomationError> {
        Ok(Some(PropertyValue::Str(read?)))
    }

    fn flag(read: uiautomation::Result<bool>) -> Result<Option<PropertyValue>, AutomationError> {
        Ok(Some(PropertyValue::Bool(read?)))
    }
}

impl NodeImpl for WindowsNode {
    fn runtime_id(&self) -> Result<Vec<i32>, AutomationError> {
        Ok(self.element.0.get_runtime_id()?)
    }

    fn control_type(&self) -> Result<ControlType, AutomationError> {
        Ok(from_uia_control_type(self.element.0.get_control_type()?))
    }

    fn property(&self, property: Property) -> Result<Option<PropertyValue>, AutomationError> {
        let element = &self.element.0;
        match property {
            Property::Name => Self::string(element.get_name()),
            Property::AutomationId => Self::string(element.get_automation_id()),
            Property::ClassName => Self::string(element.get_classname()),
            Property::FrameworkId => Self::string(element.get_framework_id()),
            Property::ProcessId => Ok(Some(PropertyValue::Int(element.get_process_id()? as i64))),
            Property::HelpText => Self::string(element.get_help_text()),
            Property::LocalizedControlType => Self::string(element.get_localized_control_type()),
            Property::AcceleratorKey => Self::string(element.get_accelerator_key()),
            Property::AccessKey => Self::string(element.get_access_key()),
            Property::IsEnabled => Self::flag(element.is_enabled()),
            Property::IsKeyboardFocusable => Self::flag(element.is_keyboard_focusable()),
            Property::HasKeyboardFocus => Self::flag(element.has_keyboard_focus()),
            Property::IsPassword => Self::flag(element.is_password()),
            Property::IsOffscreen => Self::flag(element.is_offscreen()),
            Property::IsContentElement => Self::flag(element.is_content_element()),
            Property::IsControlElement => Self::flag(element.is_control_element()),
            Property::IsRequiredForForm => Self::flag(element.is_required_for_form()),
            Property::IsSelected => match element.get_pattern::<patterns::UISelectionItemPattern>() {
                Ok(pattern) => Self::flag(pattern.is_selected()),
                Err(_) => Ok(None),
            },
            Property::Value => match element.get_pattern::<patterns::UIValuePattern>() {
                Ok(pattern) => Self::string(pattern.get_value()),
                Err(_) => Ok(None),
            },
            Property::LegacyValue => {
                match element.get_pattern::<patterns::UILegacyIAccessiblePattern>() {
                    Ok(pattern) => Self::string(pattern.get_value()),
                    Err(_) => Ok(None),
                }
            }
        }
    }

    fn bounds(&self) -> Result<Rect, AutomationError> {
        let rect = self.element.0.get_bounding_rectangle()?;
        Ok(Rect::new(
            rect.get_left(),
            rect.get_top(),
            rect.get_right(),
            rect.get_bottom(),
        ))
    }

    fn children(&self) -> Result<Vec<AccessibilityNode>, AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        let true_condition = automation.create_true_condition()?;
        Ok(self
            .element
            .0
            .find_all(UiaTreeScope::Children, &true_condition)?
            .into_iter()
            .map(Self::into_node)
            .collect())
    }

    fn find_first(
        &self,
        scope: TreeScope,
        condition: &Condition,
    ) -> Result<Option<AccessibilityNode>, AutomationError> {
        match self.native_find(scope, condition, true)? {
            Some(found) => Ok(found.into_iter().next()),
            None => {
                debug!(%condition, "no native condition, walking the tree");
                Ok(walk(&self.node(), scope, condition, true)?.into_iter().next())
            }
        }
    }

    fn find_all(
        &self,
        scope: TreeScope,
        condition: &Condition,
    ) -> Result<Vec<AccessibilityNode>, AutomationError> {
        match self.native_find(scope, condition, false)? {
            Some(found) => Ok(found),
            None => {
                debug!(%condition, "no native condition, walking the tree");
                walk(&self.node(), scope, condition, false)
            }
        }
    }

    fn clickable_point(&self) -> Result<Option<Point>, AutomationError> {
        if let Ok(Some(point)) = self.element.0.get_clickable_point() {
            return Ok(Some(Point::new(point.get_x(), point.get_y())));
        }
        let bounds = self.bounds()?;
        Ok((!bounds.is_empty()).then(|| bounds.center()))
    }

    fn document_text(&self) -> Result<Option<String>, AutomationError> {
        match self.element.0.get_pattern::<patterns::UITextPattern>() {
            Ok(pattern) => Ok(Some(pattern.get_document_range()?.get_text(-1)?)),
            Err(_) => Ok(None),
        }
    }

    fn focus(&self) -> Result<(), AutomationError> {
        Ok(self.element.0.set_focus()?)
    }

    fn click(&self) -> Result<(), AutomationError> {
        self.element.0.try_focus();
        debug!("attempting to click element: {:?}", self.element.0);
        Ok(self.element.0.click()?)
    }

    fn send_keys(&self, keys: &[KeyStroke]) -> Result<(), AutomationError> {
        let element = &self.element.0;
        dispatch_keys(
            keys,
            |text| Ok(element.send_text(text, 10)?),
            |key| Ok(element.send_keys(key, 10)?),
        )
    }

    fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        debug!(
            "setting value: {:#?} to ui element {:#?}",
            &value, &self.element.0
        );
        let pattern = self
            .element
            .0
            .get_pattern::<patterns::UIValuePattern>()
            .map_err(|e| {
                AutomationError::UnsupportedOperation(format!(
                    "element does not support the value pattern: {e}"
                ))
            })?;
        Ok(pattern.set_value(value)?)
    }

    fn clone_box(&self) -> Box<dyn NodeImpl> {
        Box::new(WindowsNode {
            element: self.element.clone(),
        })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
