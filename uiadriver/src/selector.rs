use crate::path::{parse_path, Axis, ParsedPath, PathSegment, RootMarker};
use crate::property::Property;
use crate::types::Point;
use crate::AutomationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static COORDINATES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^/*cords\[\s*(-?\d+)\s*,\s*(-?\d+)\s*\]$").unwrap());

const OCR_PREFIX: &str = "ocr:";

/// W3C location strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Using {
    XPath,
    /// Treated as on-screen text located through OCR.
    CssSelector,
    TagName,
    AccessibilityId,
    Id,
    Name,
    ClassName,
}

impl FromStr for Using {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xpath" => Ok(Using::XPath),
            "css selector" => Ok(Using::CssSelector),
            "tag name" => Ok(Using::TagName),
            "accessibility id" => Ok(Using::AccessibilityId),
            "id" => Ok(Using::Id),
            "name" => Ok(Using::Name),
            "class name" => Ok(Using::ClassName),
            other => Err(AutomationError::UnsupportedOperation(format!(
                "location strategy '{other}' is not supported"
            ))),
        }
    }
}

impl fmt::Display for Using {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Using::XPath => "xpath",
            Using::CssSelector => "css selector",
            Using::TagName => "tag name",
            Using::AccessibilityId => "accessibility id",
            Using::Id => "id",
            Using::Name => "name",
            Using::ClassName => "class name",
        })
    }
}

/// A find request as it arrives over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationStrategy {
    pub using: String,
    pub value: String,
}

impl LocationStrategy {
    pub fn new(using: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            using: using.into(),
            value: value.into(),
        }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new("xpath", value)
    }

    /// Classifies the request into one of the resolvable locator forms.
    pub fn to_locator(&self) -> Result<Locator, AutomationError> {
        let using: Using = self.using.parse()?;
        let value = self.value.trim();
        match using {
            Using::XPath => Locator::parse(value),
            Using::CssSelector => Ok(Locator::Ocr(strip_ocr_prefix(value).unwrap_or(value).to_string())),
            Using::TagName => {
                if value.is_empty() || value.contains(['/', '[', ']']) {
                    return Err(AutomationError::InvalidSelector(format!(
                        "'{value}' is not a tag name"
                    )));
                }
                Locator::parse(&format!("//{value}"))
            }
            Using::AccessibilityId | Using::Id => Ok(by_property(Property::AutomationId, value)),
            Using::Name => Ok(by_property(Property::Name, value)),
            Using::ClassName => Ok(by_property(Property::ClassName, value)),
        }
    }
}

fn strip_ocr_prefix(value: &str) -> Option<&str> {
    value
        .get(..OCR_PREFIX.len())
        .filter(|head| head.eq_ignore_ascii_case(OCR_PREFIX))
        .map(|_| value[OCR_PREFIX.len()..].trim())
}

/// `//*[@property=value]`, built without going through the string syntax so
/// values may hold any character.
fn by_property(property: Property, value: &str) -> Locator {
    Locator::Path(ParsedPath::new(
        RootMarker::Application,
        vec![PathSegment::new(Axis::Descendant).with_filter(property, value)],
    ))
}

/// A classified locator
#[derive(Debug, Clone, PartialEq)]
pub enum Locator {
    /// `cords[x,y]`: a screen point, no tree lookup.
    Coordinates(Point),
    /// `OCR:text`: text found in a screenshot.
    Ocr(String),
    Path(ParsedPath),
}

impl Locator {
    pub fn parse(value: &str) -> Result<Locator, AutomationError> {
        if let Some(caps) = COORDINATES.captures(value) {
            let coordinate = |i: usize| {
                caps[i].parse::<i32>().map_err(|_| {
                    AutomationError::InvalidSelector(format!("coordinate out of range in '{value}'"))
                })
            };
            return Ok(Locator::Coordinates(Point::new(coordinate(1)?, coordinate(2)?)));
        }
        if let Some(text) = strip_ocr_prefix(value) {
            return Ok(Locator::Ocr(text.to_string()));
        }
        parse_path(value).map(Locator::Path)
    }
}
