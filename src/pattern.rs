//! Route path patterns.
//!
//! A pattern is a `/`-separated list of segments. A segment is either a
//! literal or a whole-segment parameter:
//!
//! ```text
//! /users/<id:int>/posts/<slug>      literal, int parameter, literal, str parameter
//! /static/<file:path>               path parameter, swallows the rest of the URL
//! ```
//!
//! | Converter | Accepts                                   | Value          |
//! |-----------|-------------------------------------------|----------------|
//! | `str`     | any non-empty segment (the default)       | [`Value::Str`]   |
//! | `int`     | signed decimal, no leading `+`            | [`Value::Int`]   |
//! | `float`   | a finite decimal number                   | [`Value::Float`] |
//! | `path`    | one or more remaining segments, last only | [`Value::Path`]  |
//!
//! Matching happens on whole segments, so `/users` never matches `/usersX`.

use std::borrow::Cow;
use std::fmt;

use percent_encoding::percent_decode_str;

use crate::error::{ConfigurationError, UrlBuildError};

/// Splits a path into segments. `/` and the empty string have none; a
/// trailing slash yields a trailing empty segment.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('/').collect()
    }
}

// ── Converters and values ─────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Converter {
    Str,
    Int,
    Float,
    Path,
}

impl Converter {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "str" | "string" => Some(Self::Str),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "path" => Some(Self::Path),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Path => "path",
        }
    }

    /// Converts one raw segment (or, for `path`, the joined remainder).
    fn convert(self, raw: &str) -> Option<Value> {
        if raw.is_empty() {
            return None;
        }
        match self {
            Self::Str => Some(Value::Str(raw.to_owned())),
            Self::Path => Some(Value::Path(raw.to_owned())),
            Self::Int => {
                if raw.starts_with('+') {
                    return None;
                }
                raw.parse().ok().map(Value::Int)
            }
            Self::Float => {
                if raw.starts_with('+') {
                    return None;
                }
                raw.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(Value::Float)
            }
        }
    }
}

/// A path parameter after conversion.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Path(String),
}

impl Value {
    /// The textual value of `str` and `path` parameters.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Path(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) | Self::Path(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Converted path parameters, in pattern order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(Vec<(String, Value)>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    fn push(&mut self, name: &str, value: Value) {
        self.0.push((name.to_owned(), value));
    }
}

// ── Pattern ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Literal(String),
    Param { name: String, converter: Converter },
}

/// A parsed route pattern.
#[derive(Clone, Debug)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(source: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidPattern {
            pattern: source.to_owned(),
            reason: reason.to_owned(),
        };

        if !source.starts_with('/') {
            return Err(invalid("patterns must start with `/`"));
        }

        let raw = split_path(source);
        let mut segments = Vec::with_capacity(raw.len());

        for (i, part) in raw.iter().enumerate() {
            let last = i + 1 == raw.len();

            if let Some(inner) = part.strip_prefix('<').and_then(|p| p.strip_suffix('>')) {
                let (name, converter) = match inner.split_once(':') {
                    Some((name, conv)) => {
                        let converter = Converter::from_name(conv)
                            .ok_or_else(|| invalid(&format!("unknown converter `{conv}`")))?;
                        (name, converter)
                    }
                    None => (inner, Converter::Str),
                };

                if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(invalid(&format!("bad parameter name `{name}`")));
                }
                if converter == Converter::Path && !last {
                    return Err(invalid("a `path` parameter must be the last segment"));
                }
                let duplicate = segments.iter().any(
                    |s| matches!(s, Segment::Param { name: n, .. } if n == name),
                );
                if duplicate {
                    return Err(invalid(&format!("parameter `{name}` appears twice")));
                }

                segments.push(Segment::Param { name: name.to_owned(), converter });
            } else if part.contains('<') || part.contains('>') {
                return Err(invalid("parameters must span a whole segment"));
            } else if part.is_empty() && !last {
                return Err(invalid("empty segment"));
            } else {
                segments.push(Segment::Literal((*part).to_owned()));
            }
        }

        Ok(Self { source: source.to_owned(), segments })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Parameter names with their converters, in order.
    pub fn params(&self) -> impl Iterator<Item = (&str, Converter)> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param { name, converter } => Some((name.as_str(), *converter)),
            Segment::Literal(_) => None,
        })
    }

    /// Matches `remainder`, the request path with the blueprint prefix
    /// already stripped.
    ///
    /// Without `exact`, the pattern only has to match the leading segments.
    /// Without `convert`, typed parameters accept any segment and yield
    /// [`Value::Str`].
    ///
    /// Segments are percent-decoded before comparison and conversion; a
    /// segment that does not decode to UTF-8 matches nothing.
    pub(crate) fn matches(&self, remainder: &str, exact: bool, convert: bool) -> Option<Params> {
        let decoded = split_path(remainder)
            .into_iter()
            .map(|raw| percent_decode_str(raw).decode_utf8().ok())
            .collect::<Option<Vec<Cow<'_, str>>>>()?;
        let parts: Vec<&str> = decoded.iter().map(|s| &**s).collect();
        let mut params = Params::default();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param { name, converter: Converter::Path } => {
                    let rest = parts.get(i..).unwrap_or_default().join("/");
                    params.push(name, Converter::Path.convert(&rest)?);
                    return Some(params);
                }
                Segment::Param { name, converter } => {
                    let raw = parts.get(i)?;
                    let value = if convert {
                        converter.convert(raw)?
                    } else if raw.is_empty() {
                        return None;
                    } else {
                        Value::Str((*raw).to_owned())
                    };
                    params.push(name, value);
                }
            }
        }

        if exact && parts.len() != self.segments.len() {
            return None;
        }
        Some(params)
    }

    /// The pattern as a `matchit` route. Parameters get positional names so
    /// that `<id>` and `<name>` in the same place collide.
    pub(crate) fn template(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        for (i, segment) in self.segments.iter().enumerate() {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(&lit.replace('{', "{{").replace('}', "}}")),
                Segment::Param { converter: Converter::Path, .. } => {
                    out.push_str(&format!("{{*p{i}}}"));
                }
                Segment::Param { .. } => out.push_str(&format!("{{p{i}}}")),
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    /// Fills the pattern in with `values`, validating each one.
    pub(crate) fn build(&self, values: &[(&str, &str)]) -> Result<String, UrlBuildError> {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Param { name, converter } => {
                    let value = values
                        .iter()
                        .find(|(k, _)| *k == name.as_str())
                        .map(|(_, v)| *v)
                        .ok_or_else(|| UrlBuildError::MissingParameter(name.clone()))?;
                    let valid = converter.convert(value).is_some()
                        && (*converter == Converter::Path || !value.contains('/'));
                    if !valid {
                        return Err(UrlBuildError::InvalidParameter {
                            name: name.clone(),
                            value: value.to_owned(),
                        });
                    }
                    out.push_str(value);
                }
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(s: &str) -> Pattern {
        Pattern::parse(s).unwrap()
    }

    #[test]
    fn typed_segments_convert() {
        let p = pattern("/users/<id:int>");
        let params = p.matches("/users/42", true, true).unwrap();
        assert_eq!(params.get("id"), Some(&Value::Int(42)));

        assert!(p.matches("/users/abc", true, true).is_none());
        assert!(p.matches("/users/+4", true, true).is_none());
        assert_eq!(
            p.matches("/users/-4", true, true).unwrap().get("id"),
            Some(&Value::Int(-4)),
        );
    }

    #[test]
    fn segments_are_percent_decoded() {
        let p = pattern("/u/<name>");
        assert_eq!(
            p.matches("/u/caf%C3%A9", true, true).unwrap().get("name"),
            Some(&Value::Str("café".into())),
        );
        assert_eq!(
            pattern("/n/<n:int>").matches("/n/%31%32", true, true).unwrap().get("n"),
            Some(&Value::Int(12)),
        );
        assert!(pattern("/a b").matches("/a%20b", true, true).is_some());
        // not UTF-8 once decoded
        assert!(p.matches("/u/%FF", true, true).is_none());
    }

    #[test]
    fn conversion_can_be_disabled() {
        let p = pattern("/users/<id:int>");
        let params = p.matches("/users/abc", true, false).unwrap();
        assert_eq!(params.get("id"), Some(&Value::Str("abc".into())));
    }

    #[test]
    fn float_rejects_non_finite() {
        let p = pattern("/t/<x:float>");
        assert_eq!(p.matches("/t/1.5", true, true).unwrap().get("x"), Some(&Value::Float(1.5)));
        assert!(p.matches("/t/inf", true, true).is_none());
        assert!(p.matches("/t/NaN", true, true).is_none());
    }

    #[test]
    fn prefix_matching_is_the_default() {
        let p = pattern("/users");
        assert!(p.matches("/users/42/extra", false, true).is_some());
        assert!(p.matches("/users/", false, true).is_some());
        assert!(p.matches("/usersx", false, true).is_none());

        assert!(p.matches("/users/42", true, true).is_none());
        assert!(p.matches("/users", true, true).is_some());
    }

    #[test]
    fn root_pattern_matches_empty_remainder() {
        let p = pattern("/");
        assert!(p.matches("", true, true).is_some());
        assert!(p.matches("/", true, true).is_some());
        assert!(p.matches("/x", true, true).is_none());
        assert!(p.matches("/x", false, true).is_some());
    }

    #[test]
    fn path_converter_swallows_the_rest() {
        let p = pattern("/static/<file:path>");
        let params = p.matches("/static/css/site.css", true, true).unwrap();
        assert_eq!(params.get("file"), Some(&Value::Path("css/site.css".into())));
        assert!(p.matches("/static", true, true).is_none());
        assert!(p.matches("/static/", true, true).is_none());
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        for bad in [
            "users",
            "/file<id>.txt",
            "/<>",
            "/<id:uuid>",
            "/<rest:path>/tail",
            "/<a>/<a>",
            "/a//b",
        ] {
            assert!(
                matches!(Pattern::parse(bad), Err(ConfigurationError::InvalidPattern { .. })),
                "{bad} should be rejected",
            );
        }
    }

    #[test]
    fn templates_use_positional_names() {
        assert_eq!(pattern("/").template(), "/");
        assert_eq!(pattern("/users/<id:int>").template(), "/users/{p1}");
        assert_eq!(pattern("/users/<name>").template(), "/users/{p1}");
        assert_eq!(pattern("/s/<f:path>").template(), "/s/{*p1}");
        assert_eq!(pattern("/a{b}/").template(), "/a{{b}}/");
    }

    #[test]
    fn build_validates_values() {
        let p = pattern("/users/<id:int>/files/<f:path>");
        assert_eq!(
            p.build(&[("id", "7"), ("f", "a/b.txt")]).unwrap(),
            "/users/7/files/a/b.txt",
        );
        assert_eq!(
            p.build(&[("id", "7")]),
            Err(UrlBuildError::MissingParameter("f".into())),
        );
        assert!(matches!(
            p.build(&[("id", "seven"), ("f", "x")]),
            Err(UrlBuildError::InvalidParameter { .. }),
        ));
    }
}
