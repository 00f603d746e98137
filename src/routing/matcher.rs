//! Path template matching.
//!
//! # Responsibilities
//! - Compile configured route templates once at startup
//! - Match request paths segment by segment
//!
//! # Design Decisions
//! - Templates are kept verbatim; `{name}` matches one segment and
//!   `{*name}` the non-empty remainder of the path
//! - Matching is case-sensitive and exact: no prefix or trailing-slash
//!   leniency
//! - No regex to guarantee O(n) matching

use std::fmt;

/// Error raised for a malformed route template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("route '{0}' must start with '/'")]
    MissingLeadingSlash(String),
    #[error("route '{pattern}': segment '{segment}' uses ':name'/'*name' syntax, write '{{name}}' or '{{*name}}'")]
    LegacySyntax { pattern: String, segment: String },
    #[error("route '{pattern}': malformed segment '{segment}'")]
    InvalidSegment { pattern: String, segment: String },
    #[error("route '{0}': catch-all segment must be last")]
    CatchAllNotLast(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
    CatchAll,
}

/// A compiled route template such as `/widgets/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a template.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(PatternError::MissingLeadingSlash(raw.to_string()));
        };

        let parts: Vec<&str> = rest.split('/').collect();
        let mut segments = Vec::with_capacity(parts.len());

        for (i, part) in parts.iter().enumerate() {
            let segment = if part.starts_with(':') || part.starts_with('*') {
                return Err(PatternError::LegacySyntax {
                    pattern: raw.to_string(),
                    segment: part.to_string(),
                });
            } else if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                match name.strip_prefix('*') {
                    Some(catch_all) if is_ident(catch_all) => {
                        if i + 1 != parts.len() {
                            return Err(PatternError::CatchAllNotLast(raw.to_string()));
                        }
                        Segment::CatchAll
                    }
                    None if is_ident(name) => Segment::Param,
                    _ => {
                        return Err(PatternError::InvalidSegment {
                            pattern: raw.to_string(),
                            segment: part.to_string(),
                        })
                    }
                }
            } else if part.contains('{') || part.contains('}') {
                return Err(PatternError::InvalidSegment {
                    pattern: raw.to_string(),
                    segment: part.to_string(),
                });
            } else {
                Segment::Literal(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The template as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the template has no parameters.
    pub fn is_static(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Returns true if the request path matches this template.
    pub fn matches(&self, path: &str) -> bool {
        let Some(rest) = path.strip_prefix('/') else {
            return false;
        };
        let mut parts = rest.split('/');

        for segment in &self.segments {
            match segment {
                Segment::CatchAll => {
                    // Everything from this segment on, including inner slashes.
                    let remainder: Vec<&str> = parts.collect();
                    return !remainder.join("/").is_empty();
                }
                Segment::Literal(literal) => match parts.next() {
                    Some(part) if part == literal => {}
                    _ => return false,
                },
                Segment::Param => match parts.next() {
                    Some(part) if !part.is_empty() => {}
                    _ => return false,
                },
            }
        }

        parts.next().is_none()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_ident(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
