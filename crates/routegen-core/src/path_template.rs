//! URL template parsing, rendering and client-side substitution.
//!
//! A template splits on `/` into literal and placeholder segments. Two
//! placeholder notations are supported: colon-prefixed (`/pets/:id`) and
//! brace-delimited (`/pets/{id}`). A trailing `?...` suffix is not part of
//! the path; it carries a query-name remap table from parameter name to
//! desired web name, where an empty value means "no rename" and `-` means
//! "suppress from query entirely".
//!
//! `render(parse(t)) == t` holds for both notations, given a template using
//! only the matching notation.

// Internal imports (std, crate)
use std::collections::BTreeMap;

use crate::error::{Error, Result};

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

/// One path segment of a parsed template
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "segment", rename_all = "snake_case")]
pub enum Segment {
    /// Literal text between slashes
    Literal { text: String },
    /// Named placeholder filled from a required path parameter
    Placeholder { name: String },
}

/// Placeholder notation of a template
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notation {
    /// Colon-prefixed placeholders: `/pets/:id`
    #[default]
    Colon,
    /// Brace-delimited placeholders: `/pets/{id}`
    Brace,
}

/// Query-name remap entry from the template's `?...` suffix
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRename {
    /// Keep the derived web name
    Keep,
    /// Use this web name instead
    Rename(String),
    /// Suppress the parameter from query emission entirely
    Suppress,
}

/// A parsed URL template: ordered segments plus the query remap table
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTemplate {
    /// Ordered literal/placeholder segments
    pub segments: Vec<Segment>,
    /// Remap table from parameter name to desired query web name
    pub query: BTreeMap<String, QueryRename>,
}

impl ParsedTemplate {
    /// Names of all placeholder segments, in path order
    pub fn placeholder_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder { name } => Some(name.as_str()),
                Segment::Literal { .. } => None,
            })
            .collect()
    }

    /// Rename to apply for a query parameter, if the remap table has one
    pub fn query_rename(&self, param: &str) -> Option<&QueryRename> {
        self.query.get(param)
    }
}

/// Parse a raw template in the given notation.
///
/// An unterminated brace placeholder fails with `InvalidTemplate`.
pub fn parse(template: &str, notation: Notation) -> Result<ParsedTemplate> {
    let (path, query_suffix) = match template.split_once('?') {
        Some((path, suffix)) => (path, Some(suffix)),
        None => (template, None),
    };

    let mut segments = Vec::new();
    for (i, piece) in path.split('/').enumerate() {
        // A leading slash yields one empty first piece; it is not a segment.
        if i == 0 && piece.is_empty() && path.starts_with('/') {
            continue;
        }
        segments.push(parse_segment(template, piece, notation)?);
    }

    let query = match query_suffix {
        Some(suffix) => parse_query_suffix(template, suffix)?,
        None => BTreeMap::new(),
    };

    Ok(ParsedTemplate { segments, query })
}

fn parse_segment(template: &str, piece: &str, notation: Notation) -> Result<Segment> {
    match notation {
        Notation::Colon => {
            if let Some(name) = piece.strip_prefix(':') {
                if name.is_empty() {
                    return Err(Error::invalid_template(template, "empty `:` placeholder"));
                }
                return Ok(Segment::Placeholder { name: name.into() });
            }
        }
        Notation::Brace => {
            if let Some(rest) = piece.strip_prefix('{') {
                let name = rest.strip_suffix('}').ok_or_else(|| {
                    Error::invalid_template(template, "unterminated `{` placeholder")
                })?;
                if name.is_empty() {
                    return Err(Error::invalid_template(template, "empty `{}` placeholder"));
                }
                return Ok(Segment::Placeholder { name: name.into() });
            }
            if piece.ends_with('}') {
                return Err(Error::invalid_template(template, "unmatched `}` in segment"));
            }
        }
    }
    Ok(Segment::Literal { text: piece.into() })
}

fn parse_query_suffix(template: &str, suffix: &str) -> Result<BTreeMap<String, QueryRename>> {
    let mut table = BTreeMap::new();
    for entry in suffix.split('&').filter(|e| !e.is_empty()) {
        let (name, value) = match entry.split_once('=') {
            Some((name, value)) => (name, value),
            None => (entry, ""),
        };
        if name.is_empty() {
            return Err(Error::invalid_template(
                template,
                format!("query remap entry `{}` has no parameter name", entry),
            ));
        }
        let rename = match value {
            "" => QueryRename::Keep,
            "-" => QueryRename::Suppress,
            web => QueryRename::Rename(web.into()),
        };
        if table.insert(name.to_string(), rename).is_some() {
            return Err(Error::invalid_template(
                template,
                format!("duplicate query remap for `{}`", name),
            ));
        }
    }
    Ok(table)
}

/// Re-serialize segments in the destination notation.
///
/// An empty segment list renders to `""` if `allow_empty_root`, else `/`.
pub fn render(segments: &[Segment], notation: Notation, allow_empty_root: bool) -> String {
    if segments.is_empty() {
        return if allow_empty_root {
            String::new()
        } else {
            "/".to_string()
        };
    }

    let mut out = String::new();
    for segment in segments {
        out.push('/');
        match segment {
            Segment::Literal { text } => out.push_str(text),
            Segment::Placeholder { name } => match notation {
                Notation::Colon => {
                    out.push(':');
                    out.push_str(name);
                }
                Notation::Brace => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            },
        }
    }
    out
}

/// Build the client-side path expression for outbound requests.
///
/// Each placeholder is replaced by the stringified-argument expression
/// returned by `resolve(name)`; adjacent literal text is folded into quoted
/// chunks so the result is a single compile-time-concatenated expression.
/// A trailing empty literal chunk is trimmed.
pub fn client_substitute<F>(segments: &[Segment], mut resolve: F) -> Result<String>
where
    F: FnMut(&str) -> Result<String>,
{
    if segments.is_empty() {
        return Ok("\"/\"".to_string());
    }

    let mut parts: Vec<String> = Vec::new();
    let mut literal = String::new();
    for segment in segments {
        literal.push('/');
        match segment {
            Segment::Literal { text } => literal.push_str(text),
            Segment::Placeholder { name } => {
                parts.push(format!("{:?}", literal));
                literal.clear();
                parts.push(resolve(name)?);
            }
        }
    }
    if !literal.is_empty() {
        parts.push(format!("{:?}", literal));
    }
    Ok(parts.join(" + "))
}
