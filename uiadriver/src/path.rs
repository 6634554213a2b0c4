//! Parser for the XPath-like locator syntax.
//!
//! ```text
//! /root//window[@name='Save As']/comboBox[partial:name='File'][2]
//! ```
//!
//! Quoted literals are swapped for placeholder tokens before anything is
//! split, so `/`, `[` or ` and ` inside a literal never break a segment.

use crate::property::{Condition, ControlType, Property, PropertyValue};
use crate::AutomationError;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static AND_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+and\s+").unwrap());

static ATTRIBUTE_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@([A-Za-z][\w:]*)\s*=\s*(\S+)$").unwrap());

static CONTAINS_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^contains\(\s*@([A-Za-z][\w:]*)\s*,\s*(\S+?)\s*\)$").unwrap()
});

static VALUE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"value_token_(\d+)").unwrap());

static LONE_VALUE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^value_token_\d+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
}

/// Where the walk of a path starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootMarker {
    /// No marker: the session's application root.
    Application,
    /// `/root`: the OS desktop root.
    Desktop,
    /// `/dom`: the session's snapshot document.
    Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlTypeMatch {
    /// Tag as written, without any `partial` prefix.
    pub name: String,
    pub partial: bool,
    /// Control types the tag resolves to; several for partial tags.
    pub types: Vec<ControlType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    pub property: Property,
    pub value: PropertyValue,
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub axis: Axis,
    pub control_type: Option<ControlTypeMatch>,
    pub filters: Vec<PropertyFilter>,
    /// 1-based position among the matches.
    pub index: Option<usize>,
}

impl PathSegment {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            control_type: None,
            filters: Vec::new(),
            index: None,
        }
    }

    pub fn with_filter(mut self, property: Property, value: impl Into<PropertyValue>) -> Self {
        self.filters.push(PropertyFilter {
            property,
            value: value.into(),
            partial: false,
        });
        self
    }

    pub fn with_control_type(mut self, control_type: ControlType) -> Self {
        self.control_type = Some(ControlTypeMatch {
            name: control_type.tag().to_string(),
            partial: false,
            types: vec![control_type],
        });
        self
    }

    /// Query for this segment: the control-type filter AND every property
    /// filter. `None` when the segment constrains nothing.
    pub fn condition(&self) -> Option<Condition> {
        let mut parts = Vec::new();
        if let Some(ct) = &self.control_type {
            if let Some(c) = Condition::any(
                ct.types.iter().copied().map(Condition::ControlType).collect(),
            ) {
                parts.push(c);
            }
        }
        parts.extend(self.filters.iter().map(|f| Condition::Property {
            property: f.property,
            value: f.value.clone(),
            partial: f.partial,
        }));
        Condition::all(parts)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPath {
    pub root: RootMarker,
    pub segments: Vec<PathSegment>,
}

impl ParsedPath {
    pub fn new(root: RootMarker, segments: Vec<PathSegment>) -> Self {
        Self { root, segments }
    }
}

fn invalid(locator: &str, reason: impl std::fmt::Display) -> AutomationError {
    AutomationError::InvalidSelector(format!("{reason} in locator \"{locator}\""))
}

/// Replaces quoted literals with `value_token_N` placeholders.
fn tokenize_literals(locator: &str) -> Result<(String, Vec<String>), AutomationError> {
    let mut out = String::with_capacity(locator.len());
    let mut literals = Vec::new();
    let mut chars = locator.chars();
    while let Some(c) = chars.next() {
        if c == '\'' || c == '"' {
            let mut literal = String::new();
            let mut closed = false;
            for next in chars.by_ref() {
                if next == c {
                    closed = true;
                    break;
                }
                literal.push(next);
            }
            if !closed {
                return Err(invalid(locator, "unterminated quoted literal"));
            }
            out.push_str(&format!("value_token_{}", literals.len()));
            literals.push(literal);
        } else {
            out.push(c);
        }
    }
    Ok((out, literals))
}

fn restore_literals(text: &str, literals: &[String]) -> String {
    VALUE_TOKEN
        .replace_all(text, |caps: &regex::Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| literals.get(i))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn strip_root_marker(path: &str) -> (RootMarker, &str) {
    for (marker, kind) in [("/root", RootMarker::Desktop), ("/dom", RootMarker::Document)] {
        if path
            .get(..marker.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(marker))
        {
            let rest = &path[marker.len()..];
            if rest.is_empty() || rest.starts_with('/') {
                return (kind, rest);
            }
        }
    }
    (RootMarker::Application, path)
}

/// Splits on `/` and `//` at bracket depth zero.
fn split_segments<'a>(
    locator: &str,
    path: &'a str,
) -> Result<Vec<(Axis, &'a str)>, AutomationError> {
    let bytes = path.as_bytes();
    let mut segments = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let slashes = bytes[i..].iter().take_while(|b| **b == b'/').count();
        let axis = match slashes {
            0 | 1 => Axis::Child,
            2 => Axis::Descendant,
            _ => return Err(invalid(locator, "three or more consecutive slashes")),
        };
        i += slashes;
        let start = i;
        let mut depth = 0i32;
        while i < bytes.len() && !(depth == 0 && bytes[i] == b'/') {
            match bytes[i] {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(invalid(locator, "unbalanced ']'"));
                    }
                }
                _ => {}
            }
            i += 1;
        }
        if depth != 0 {
            return Err(invalid(locator, "unbalanced '['"));
        }
        let segment = path[start..i].trim();
        if segment.is_empty() {
            return Err(invalid(locator, "empty path segment"));
        }
        segments.push((axis, segment));
    }
    Ok(segments)
}

/// Removes a `partial` / `partial:` prefix, reporting whether one was present.
fn strip_partial(name: &str) -> (bool, &str) {
    const PREFIX: &str = "partial";
    if name.len() > PREFIX.len()
        && name
            .get(..PREFIX.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(PREFIX))
    {
        let rest = &name[PREFIX.len()..];
        (true, rest.strip_prefix(':').unwrap_or(rest))
    } else {
        (false, name)
    }
}

fn parse_tag(locator: &str, tag: &str) -> Result<Option<ControlTypeMatch>, AutomationError> {
    if tag.is_empty() || tag == "*" {
        return Ok(None);
    }
    let (partial, name) = strip_partial(tag);
    if name.is_empty() {
        return Err(invalid(locator, format!("missing tag after '{tag}'")));
    }
    let types = if partial {
        ControlType::matching_fragment(name)
    } else {
        ControlType::from_tag(name).into_iter().collect()
    };
    if types.is_empty() {
        return Err(invalid(locator, format!("unknown control type '{name}'")));
    }
    Ok(Some(ControlTypeMatch {
        name: name.to_string(),
        partial,
        types,
    }))
}

fn parse_clause(
    locator: &str,
    clause: &str,
    literals: &[String],
) -> Result<PropertyFilter, AutomationError> {
    let (name, raw, contains) = if let Some(caps) = CONTAINS_CLAUSE.captures(clause) {
        (caps[1].to_string(), caps[2].to_string(), true)
    } else if let Some(caps) = ATTRIBUTE_CLAUSE.captures(clause) {
        (caps[1].to_string(), caps[2].to_string(), false)
    } else {
        return Err(invalid(
            locator,
            format!("malformed clause '{}'", restore_literals(clause, literals)),
        ));
    };

    // a quoted literal must be the whole value: `'a'b` is neither quoted nor bare
    if VALUE_TOKEN.is_match(&raw) && !LONE_VALUE_TOKEN.is_match(&raw) {
        return Err(invalid(
            locator,
            format!(
                "text adjoins a quoted literal in '{}'",
                restore_literals(clause, literals)
            ),
        ));
    }

    let (prefixed, name) = strip_partial(&name);
    let property = Property::from_name(name)
        .ok_or_else(|| invalid(locator, format!("unknown property '@{name}'")))?;
    let literal = restore_literals(&raw, literals);
    Ok(PropertyFilter {
        property,
        value: property.parse_value(&literal)?,
        partial: contains || prefixed,
    })
}

fn parse_index(group: &str) -> usize {
    match group.trim().parse::<i64>() {
        Ok(n) if n >= 1 => n as usize,
        _ => 1,
    }
}

fn parse_segment(
    locator: &str,
    axis: Axis,
    text: &str,
    literals: &[String],
) -> Result<PathSegment, AutomationError> {
    let (tag, mut rest) = match text.find('[') {
        Some(pos) => (text[..pos].trim(), &text[pos..]),
        None => (text.trim(), ""),
    };
    if tag.contains(']') {
        return Err(invalid(locator, format!("unexpected ']' in '{tag}'")));
    }

    let mut segment = PathSegment::new(axis);
    segment.control_type = parse_tag(locator, tag)?;

    while !rest.is_empty() {
        let inner_end = match (rest.strip_prefix('['), rest.find(']')) {
            (Some(_), Some(end)) => end,
            _ => {
                return Err(invalid(
                    locator,
                    format!("unexpected text '{}'", restore_literals(rest, literals)),
                ))
            }
        };
        let group = rest[1..inner_end].trim();
        if group.contains('[') {
            return Err(invalid(locator, "nested brackets"));
        }
        if group.contains('@') {
            for clause in AND_SPLIT.split(group) {
                segment
                    .filters
                    .push(parse_clause(locator, clause.trim(), literals)?);
            }
        } else {
            segment.index = Some(parse_index(group));
        }
        rest = rest[inner_end + 1..].trim_start();
    }
    Ok(segment)
}

/// Parses a path locator into its root marker and segments.
///
/// Syntax errors and unknown names fail with `InvalidSelector`. A segment
/// that parses but constrains nothing (`*`) is accepted here; resolving it
/// reports not-found.
pub fn parse_path(locator: &str) -> Result<ParsedPath, AutomationError> {
    let (tokenized, literals) = tokenize_literals(locator.trim())?;
    let (root, path) = strip_root_marker(&tokenized);
    if root == RootMarker::Application && path.is_empty() {
        return Err(invalid(locator, "empty path"));
    }

    let segments = split_segments(locator, path)?
        .into_iter()
        .map(|(axis, text)| parse_segment(locator, axis, text, &literals))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(locator, ?root, segments = segments.len(), "parsed path locator");
    Ok(ParsedPath { root, segments })
}
