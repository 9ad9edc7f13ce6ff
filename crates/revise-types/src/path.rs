//! Slash-separated paths into JSON snapshots.
//!
//! A [`JsonPath`] is a small, total alternative to dynamic property access:
//! every lookup returns `Option`, so "path not found" is an ordinary value
//! rather than a crash.
//!
//! Segments follow RFC 6901 escaping (`~0` is `~`, `~1` is `/`). Against an
//! object a segment is a key. Against an array a segment first selects the
//! element whose identity (under the supplied [`IdRule`]) renders to the
//! segment text, and otherwise falls back to a numeric index.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::TypeError;
use crate::identity::IdRule;

/// A parsed path. The empty path addresses the root value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct JsonPath {
    segments: Vec<String>,
}

impl JsonPath {
    /// The root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path such as `""`, `"/"`, `"/data"` or `"nodes/3/children"`.
    ///
    /// A missing leading slash is tolerated and a single trailing slash is
    /// ignored.
    pub fn parse(path: &str) -> Result<Self, TypeError> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let segments = trimmed
            .split('/')
            .map(|raw| unescape(raw).ok_or_else(|| invalid(path, "bad escape sequence")))
            .collect::<Result<Vec<_>, _>>()?;
        if segments.iter().any(String::is_empty) {
            return Err(invalid(path, "empty segment"));
        }
        Ok(Self { segments })
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Split off the last segment. `None` for the root path.
    pub fn split_last(&self) -> Option<(JsonPath, &str)> {
        let (last, rest) = self.segments.split_last()?;
        Some((
            Self {
                segments: rest.to_vec(),
            },
            last.as_str(),
        ))
    }

    /// Follow the path through `value`.
    pub fn resolve<'a>(&self, value: &'a Value, rule: &IdRule) -> Option<&'a Value> {
        let mut current = value;
        for segment in &self.segments {
            current = step(current, segment, rule)?;
        }
        Some(current)
    }

    /// Follow the path through `value`, yielding a mutable reference.
    pub fn resolve_mut<'a>(&self, value: &'a mut Value, rule: &IdRule) -> Option<&'a mut Value> {
        let mut current = value;
        for segment in &self.segments {
            current = step_mut(current, segment, rule)?;
        }
        Some(current)
    }

    /// Walk the path through nested objects, creating empty objects for
    /// missing keys, and return the object at the end.
    ///
    /// Returns `None` when an existing non-object value sits on the path.
    /// Array elements are never created, only traversed.
    pub fn object_entry_mut<'a>(
        &self,
        value: &'a mut Value,
        rule: &IdRule,
    ) -> Option<&'a mut Map<String, Value>> {
        let mut current = value;
        for segment in &self.segments {
            current = match current {
                Value::Object(map) => map
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new())),
                array @ Value::Array(_) => step_mut(array, segment, rule)?,
                _ => return None,
            };
        }
        current.as_object_mut()
    }
}

/// Position of the element addressed by `segment` inside `items`.
pub fn element_index(items: &[Value], segment: &str, rule: &IdRule) -> Option<usize> {
    items
        .iter()
        .position(|item| rule.identify(item).is_some_and(|id| id.as_str() == segment))
        .or_else(|| segment.parse::<usize>().ok().filter(|&i| i < items.len()))
}

fn step<'a>(value: &'a Value, segment: &str, rule: &IdRule) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(element_index(items, segment, rule)?),
        _ => None,
    }
}

fn step_mut<'a>(value: &'a mut Value, segment: &str, rule: &IdRule) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => {
            let index = element_index(items, segment, rule)?;
            items.get_mut(index)
        }
        _ => None,
    }
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn invalid(path: &str, reason: &str) -> TypeError {
    TypeError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl std::str::FromStr for JsonPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
