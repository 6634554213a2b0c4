//! Conversions between the crate vocabularies and UI Automation types

use crate::keys::{chunk_keys, KeyChunk, KeyStroke};
use crate::property::{Condition, ControlType, Property, PropertyValue};
use crate::AutomationError;
use uiautomation::controls::ControlType as UiaControlType;
use uiautomation::core::UICondition;
use uiautomation::types::{PropertyConditionFlags, UIProperty};
use uiautomation::variants::Variant;
use uiautomation::UIAutomation;
use windows::core::HRESULT;
use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};

/// Helper function to create UIAutomation instance with proper COM initialization
pub(crate) fn create_ui_automation_with_com_init() -> Result<UIAutomation, AutomationError> {
    unsafe {
        let hr = CoInitializeEx(None, COINIT_MULTITHREADED);
        if hr.is_err() && hr != HRESULT(0x80010106u32 as i32) {
            // Only return error if it's not the "already initialized" case
            return Err(AutomationError::PlatformError(format!(
                "Failed to initialize COM: {hr}"
            )));
        }
    }

    UIAutomation::new_direct().map_err(|e| AutomationError::PlatformError(e.to_string()))
}

static CONTROL_TYPES: &[(ControlType, UiaControlType)] = &[
    (ControlType::Button, UiaControlType::Button),
    (ControlType::Calendar, UiaControlType::Calendar),
    (ControlType::CheckBox, UiaControlType::CheckBox),
    (ControlType::ComboBox, UiaControlType::ComboBox),
    (ControlType::Edit, UiaControlType::Edit),
    (ControlType::Hyperlink, UiaControlType::Hyperlink),
    (ControlType::Image, UiaControlType::Image),
    (ControlType::ListItem, UiaControlType::ListItem),
    (ControlType::List, UiaControlType::List),
    (ControlType::Menu, UiaControlType::Menu),
    (ControlType::MenuBar, UiaControlType::MenuBar),
    (ControlType::MenuItem, UiaControlType::MenuItem),
    (ControlType::ProgressBar, UiaControlType::ProgressBar),
    (ControlType::RadioButton, UiaControlType::RadioButton),
    (ControlType::ScrollBar, UiaControlType::ScrollBar),
    (ControlType::Slider, UiaControlType::Slider),
    (ControlType::Spinner, UiaControlType::Spinner),
    (ControlType::StatusBar, UiaControlType::StatusBar),
    (ControlType::Tab, UiaControlType::Tab),
    (ControlType::TabItem, UiaControlType::TabItem),
    (ControlType::Text, UiaControlType::Text),
    (ControlType::ToolBar, UiaControlType::ToolBar),
    (ControlType::ToolTip, UiaControlType::ToolTip),
    (ControlType::Tree, UiaControlType::Tree),
    (ControlType::TreeItem, UiaControlType::TreeItem),
    (ControlType::Custom, UiaControlType::Custom),
    (ControlType::Group, UiaControlType::Group),
    (ControlType::Thumb, UiaControlType::Thumb),
    (ControlType::DataGrid, UiaControlType::DataGrid),
    (ControlType::DataItem, UiaControlType::DataItem),
    (ControlType::Document, UiaControlType::Document),
    (ControlType::SplitButton, UiaControlType::SplitButton),
    (ControlType::Window, UiaControlType::Window),
    (ControlType::Pane, UiaControlType::Pane),
    (ControlType::Header, UiaControlType::Header),
    (ControlType::HeaderItem, UiaControlType::HeaderItem),
    (ControlType::Table, UiaControlType::Table),
    (ControlType::TitleBar, UiaControlType::TitleBar),
    (ControlType::Separator, UiaControlType::Separator),
    (ControlType::SemanticZoom, UiaControlType::SemanticZoom),
    (ControlType::AppBar, UiaControlType::AppBar),
];

pub(crate) fn from_uia_control_type(control_type: UiaControlType) -> ControlType {
    CONTROL_TYPES
        .iter()
        .find(|(_, uia)| *uia == control_type)
        .map(|(ct, _)| *ct)
        .unwrap_or(ControlType::Custom)
}

pub(crate) fn to_uia_control_type(control_type: ControlType) -> UiaControlType {
    CONTROL_TYPES
        .iter()
        .find(|(ct, _)| *ct == control_type)
        .map(|(_, uia)| *uia)
        .unwrap_or(UiaControlType::Custom)
}

pub(crate) fn to_ui_property(property: Property) -> UIProperty {
    match property {
        Property::Name => UIProperty::Name,
        Property::AutomationId => UIProperty::AutomationId,
        Property::ClassName => UIProperty::ClassName,
        Property::FrameworkId => UIProperty::FrameworkId,
        Property::ProcessId => UIProperty::ProcessId,
        Property::HelpText => UIProperty::HelpText,
        Property::LocalizedControlType => UIProperty::LocalizedControlType,
        Property::AcceleratorKey => UIProperty::AcceleratorKey,
        Property::AccessKey => UIProperty::AccessKey,
        Property::IsEnabled => UIProperty::IsEnabled,
        Property::IsKeyboardFocusable => UIProperty::IsKeyboardFocusable,
        Property::HasKeyboardFocus => UIProperty::HasKeyboardFocus,
        Property::IsPassword => UIProperty::IsPassword,
        Property::IsOffscreen => UIProperty::IsOffscreen,
        Property::IsContentElement => UIProperty::IsContentElement,
        Property::IsControlElement => UIProperty::IsControlElement,
        Property::IsRequiredForForm => UIProperty::IsRequiredForForm,
        Property::IsSelected => UIProperty::SelectionItemIsSelected,
        Property::Value => UIProperty::ValueValue,
        Property::LegacyValue => UIProperty::LegacyIAccessibleValue,
    }
}

fn to_variant(value: &PropertyValue) -> Variant {
    match value {
        PropertyValue::Str(s) => Variant::from(s.as_str()),
        PropertyValue::Bool(b) => Variant::from(*b),
        PropertyValue::Int(i) => Variant::from(*i as i32),
    }
}

/// Native UIA condition for `condition`, or `None` when it has no native
/// equivalent and must be evaluated through the facade instead.
pub(crate) fn to_uia_condition(
    automation: &UIAutomation,
    condition: &Condition,
) -> Result<Option<UICondition>, AutomationError> {
    let native = match condition {
        Condition::True => automation.create_true_condition()?,
        Condition::Property {
            property,
            value,
            partial,
        } => {
            let flags = (*partial && matches!(value, PropertyValue::Str(_)))
                .then_some(PropertyConditionFlags::MatchSubstring);
            automation.create_property_condition(to_ui_property(*property), to_variant(value), flags)?
        }
        Condition::ControlType(ct) => automation.create_property_condition(
            UIProperty::ControlType,
            Variant::from(to_uia_control_type(*ct) as i32),
            None,
        )?,
        Condition::RuntimeId(_) => return Ok(None),
        Condition::And(parts) | Condition::Or(parts) => {
            let is_and = matches!(condition, Condition::And(_));
            let mut combined: Option<UICondition> = None;
            for part in parts {
                let Some(native) = to_uia_condition(automation, part)? else {
                    return Ok(None);
                };
                combined = Some(match combined {
                    None => native,
                    Some(acc) if is_and => automation.create_and_condition(acc, native)?,
                    Some(acc) => automation.create_or_condition(acc, native)?,
                });
            }
            match combined {
                Some(native) => native,
                None => automation.create_true_condition()?,
            }
        }
    };
    Ok(Some(native))
}

/// Sends keystrokes through `text` (literal typing) and `keys` (the UIA
/// `{key}` syntax).
pub(crate) fn dispatch_keys(
    strokes: &[KeyStroke],
    mut text: impl FnMut(&str) -> Result<(), AutomationError>,
    mut keys: impl FnMut(&str) -> Result<(), AutomationError>,
) -> Result<(), AutomationError> {
    for chunk in chunk_keys(strokes) {
        match chunk {
            KeyChunk::Text(literal) => text(&literal)?,
            KeyChunk::Special(key) => keys(&format!("{{{}}}", key.uia_name()))?,
            KeyChunk::Chord { modifiers, keys: held } => {
                let prefix: String = modifiers
                    .iter()
                    .map(|m| format!("{{{}}}", m.uia_name()))
                    .collect();
                let body: String = held
                    .iter()
                    .map(|k| match k {
                        KeyStroke::Char(c) => c.to_string(),
                        KeyStroke::Special(s) => format!("{{{}}}", s.uia_name()),
                    })
                    .collect();
                keys(&format!("{prefix}({body})"))?;
            }
        }
    }
    Ok(())
}
