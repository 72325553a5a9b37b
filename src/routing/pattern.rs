//! Route path patterns.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use percent_encoding::percent_decode_str;

use crate::error::RegistrationError;

/// One segment of a [`PathPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the request segment exactly (after percent-decoding).
    Literal(String),
    /// `{name}`: any single non-empty segment.
    Param(Arc<str>),
    /// `{*name}`: one or more trailing segments.
    Wildcard(Arc<str>),
}

/// Segment kind, ordered by match precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SegmentKind {
    Literal,
    Param,
    Wildcard,
}

impl Segment {
    pub fn kind(&self) -> SegmentKind {
        match self {
            Segment::Literal(_) => SegmentKind::Literal,
            Segment::Param(_) => SegmentKind::Param,
            Segment::Wildcard(_) => SegmentKind::Wildcard,
        }
    }

    fn param_name(&self) -> Option<&Arc<str>> {
        match self {
            Segment::Literal(_) => None,
            Segment::Param(name) | Segment::Wildcard(name) => Some(name),
        }
    }
}

/// A parsed route pattern such as `/users/{id}` or `/files/{*path}`.
///
/// Empty segments are ignored, so `/users//{id}/` and `/users/{id}` are the
/// same pattern.
///
/// # Examples
///
/// ```
/// use ferrous_web::routing::PathPattern;
///
/// let p = PathPattern::parse("/files/{*path}").unwrap();
/// let params = p.matches(&["files", "a", "b.txt"]).unwrap();
/// assert_eq!(params.get("path"), Some("a/b.txt"));
///
/// assert!(PathPattern::parse("/{*rest}/tail").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: Arc<str>,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, RegistrationError> {
        let invalid = |reason: &str| RegistrationError::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        if !raw.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let parts: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if let Some(name) = inner.strip_prefix('*') {
                    if i + 1 != parts.len() {
                        return Err(invalid("a wildcard must be the last segment"));
                    }
                    Segment::Wildcard(param_name(name).map_err(invalid)?)
                } else {
                    Segment::Param(param_name(inner).map_err(invalid)?)
                }
            } else if part.contains('{') || part.contains('}') {
                return Err(invalid("braces are only allowed around a whole segment"));
            } else {
                let literal = decode_segment(part)
                    .ok_or_else(|| invalid("a literal segment is not valid UTF-8 once decoded"))?;
                Segment::Literal(literal.into_owned())
            };

            if let Some(name) = segment.param_name() {
                if segments
                    .iter()
                    .any(|s: &Segment| s.param_name() == Some(name))
                {
                    return Err(invalid(&format!("parameter `{}` appears twice", name)));
                }
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: Arc::from(raw),
            segments,
        })
    }

    /// Pattern text as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub(crate) fn raw(&self) -> Arc<str> {
        self.raw.clone()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn kinds(&self) -> impl Iterator<Item = SegmentKind> + '_ {
        self.segments.iter().map(Segment::kind)
    }

    /// Whether the pattern declares a parameter (or wildcard) named `name`.
    pub fn has_param(&self, name: &str) -> bool {
        self.segments
            .iter()
            .any(|s| s.param_name().is_some_and(|n| &**n == name))
    }

    /// Same shape as `other`, ignoring parameter names.
    pub fn same_shape(&self, other: &PathPattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| match (a, b) {
                    (Segment::Literal(x), Segment::Literal(y)) => x == y,
                    _ => a.kind() == b.kind(),
                })
    }

    /// Precedence order: literal before parameter before wildcard, compared
    /// left to right. `Less` means `self` wins.
    pub fn precedence(&self, other: &PathPattern) -> Ordering {
        self.kinds().cmp(other.kinds())
    }

    /// Matches already split and decoded request segments.
    pub fn matches(&self, path: &[&str]) -> Option<PathParams> {
        let mut params = PathParams::default();
        let mut rest = path;
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => {
                    let (head, tail) = rest.split_first()?;
                    if *head != lit.as_str() {
                        return None;
                    }
                    rest = tail;
                }
                Segment::Param(name) => {
                    let (head, tail) = rest.split_first()?;
                    params.push(name.clone(), (*head).to_string());
                    rest = tail;
                }
                Segment::Wildcard(name) => {
                    if rest.is_empty() {
                        return None;
                    }
                    params.push(name.clone(), rest.join("/"));
                    rest = &[];
                }
            }
        }
        rest.is_empty().then_some(params)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn param_name(name: &str) -> Result<Arc<str>, &'static str> {
    if name.is_empty() {
        return Err("parameter name is empty");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("parameter names may only contain ASCII letters, digits and '_'");
    }
    Ok(Arc::from(name))
}

/// Percent-decodes one segment. `None` if the bytes are not UTF-8.
pub(crate) fn decode_segment(segment: &str) -> Option<Cow<'_, str>> {
    percent_decode_str(segment).decode_utf8().ok()
}

/// Splits a request path into decoded, non-empty segments.
///
/// `None` if any segment does not decode to UTF-8; such a path matches no
/// route.
pub(crate) fn split_path(path: &str) -> Option<Vec<Cow<'_, str>>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect()
}

/// Path parameter values extracted by a match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    entries: Vec<(Arc<str>, String)>,
}

impl PathParams {
    fn push(&mut self, name: Arc<str>, value: String) {
        self.entries.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (&**n, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
