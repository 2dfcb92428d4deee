//! Interface metadata model consumed by the plan synthesizer.
//!
//! This module defines the shape that method and parameter metadata must
//! arrive in. Collecting that metadata from source comments or annotations
//! is the job of an external collaborator; routegen consumes it as
//! already-materialized structured data, loaded from a JSON or YAML
//! interface-description file.
//!
//! # Examples
//!
//! ```no_run
//! use routegen_core::metadata::InterfaceDescriptor;
//! use routegen_core::error::Result;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! // Load an interface description from a file
//! let iface = InterfaceDescriptor::from_file("calc.json").await?;
//! println!("interface: {} ({} methods)", iface.name, iface.methods.len());
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Position, Result};

// External imports (alphabetized)
use serde::{Deserialize, Deserializer, Serialize};
use tokio::fs;

/// A scalar target type, possibly a named type over a supported underlying.
///
/// A named type whose `underlying` is a supported scalar resolves exactly one
/// indirection level during conversion selection (forcing a cast); deeper
/// indirection fails fast with `UnsupportedType`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScalarType {
    /// Target type name, e.g. `int64`, `string`, `time.Duration`, `UserID`
    pub name: String,
    /// Underlying type name for named types, e.g. `int64` for `UserID`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underlying: Option<String>,
}

impl ScalarType {
    /// A plain (non-named) scalar type
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            underlying: None,
        }
    }

    /// A named type over an underlying scalar
    pub fn named(name: impl Into<String>, underlying: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            underlying: Some(underlying.into()),
        }
    }

    /// Whether values of this type serialize to the wire verbatim
    pub fn is_string_like(&self) -> bool {
        self.name == "string" || self.underlying.as_deref() == Some("string")
    }
}

// Accept either a bare string ("int64") or the full form
// ({"name": "UserID", "underlying": "int64"}).
impl<'de> Deserialize<'de> for ScalarType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Full {
                name: String,
                #[serde(default)]
                underlying: Option<String>,
            },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Name(name) => ScalarType {
                name,
                underlying: None,
            },
            Repr::Full { name, underlying } => ScalarType { name, underlying },
        })
    }
}

/// Declared type classification of a parameter or record field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeShape {
    /// Plain scalar value
    Scalar { scalar: ScalarType },
    /// Pointer to a scalar; absence leaves the pointer nil
    Pointer { scalar: ScalarType },
    /// Array (or variadic) of scalars
    Array { elem: ScalarType },
    /// Value-plus-validity-flag wrapper distinguishing "absent" from "zero"
    Nullable { scalar: ScalarType },
    /// Record (struct) value, decomposed recursively into leaves
    Record { record: String },
    /// Pointer to a record; allocated lazily before the first write beneath it
    PointerRecord { record: String },
    /// String-keyed multi-value map, bound by scanning all keys under a prefix
    Map { elem: ScalarType },
    /// Framework-intrinsic type bound directly to a request-scoped value
    Reserved { name: String },
}

impl TypeShape {
    /// The scalar carried by this shape, if it decomposes to one
    pub fn scalar(&self) -> Option<&ScalarType> {
        match self {
            TypeShape::Scalar { scalar }
            | TypeShape::Pointer { scalar }
            | TypeShape::Nullable { scalar } => Some(scalar),
            TypeShape::Array { elem } => Some(elem),
            _ => None,
        }
    }

    /// Record name for record-typed shapes
    pub fn record_name(&self) -> Option<&str> {
        match self {
            TypeShape::Record { record } | TypeShape::PointerRecord { record } => {
                Some(record.as_str())
            }
            _ => None,
        }
    }

    /// Display name of the declared type, for diagnostics
    pub fn type_name(&self) -> String {
        match self {
            TypeShape::Scalar { scalar } => scalar.name.clone(),
            TypeShape::Pointer { scalar } => format!("*{}", scalar.name),
            TypeShape::Array { elem } => format!("[]{}", elem.name),
            TypeShape::Nullable { scalar } => format!("nullable {}", scalar.name),
            TypeShape::Record { record } => record.clone(),
            TypeShape::PointerRecord { record } => format!("*{}", record),
            TypeShape::Map { elem } => format!("map[string][]{}", elem.name),
            TypeShape::Reserved { name } => name.clone(),
        }
    }
}

/// Source hints attached to a parameter by the annotation collaborator
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHints {
    /// This parameter is the designated body receiver
    #[serde(default)]
    pub body: bool,
    /// Explicit web name overriding the derived one
    #[serde(default)]
    pub web_name: Option<String>,
    /// Suppress this parameter from query emission entirely
    #[serde(default)]
    pub suppress: bool,
    /// Default raw value for frameworks whose accessors support one
    #[serde(default)]
    pub default: Option<String>,
    /// Omit this value from outbound queries when it equals its zero value
    #[serde(default)]
    pub omit_empty: bool,
}

/// One ordered parameter of a method
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Parameter name as declared in the interface
    pub name: String,
    /// Declared type classification
    pub shape: TypeShape,
    /// Source hints from annotations
    #[serde(default)]
    pub hints: SourceHints,
}

/// One field of a record type
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name as declared in the record
    pub name: String,
    /// Declared type classification
    pub shape: TypeShape,
    /// Tag-provided web name; the skip marker `-` removes the field entirely
    #[serde(default)]
    pub tag: Option<String>,
    /// Anonymous/embedded field: inherits the current web-name prefix
    #[serde(default)]
    pub embedded: bool,
    /// Omit from outbound queries when the value equals its zero value
    #[serde(default)]
    pub omit_empty: bool,
}

impl FieldDescriptor {
    /// Whether the skip-marker tag removes this field
    pub fn skipped(&self) -> bool {
        self.tag.as_deref() == Some("-")
    }
}

/// A record (struct) type reachable from parameter metadata
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordDescriptor {
    /// Record type name
    pub name: String,
    /// Ordered fields
    pub fields: Vec<FieldDescriptor>,
}

/// HTTP verb of a route annotation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpVerb {
    /// Verbs whose unmapped parameters default to whole-body aggregation
    pub fn is_edit(&self) -> bool {
        matches!(
            self,
            HttpVerb::Post | HttpVerb::Put | HttpVerb::Patch | HttpVerb::Delete
        )
    }

    /// Uppercase wire form
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Head => "HEAD",
            HttpVerb::Options => "OPTIONS",
        }
    }
}

impl FromStr for HttpVerb {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpVerb::Get),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "PATCH" => Ok(HttpVerb::Patch),
            "DELETE" => Ok(HttpVerb::Delete),
            "HEAD" => Ok(HttpVerb::Head),
            "OPTIONS" => Ok(HttpVerb::Options),
            _ => Err(format!("unknown HTTP verb: {}", s)),
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One route annotation on a method
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Route {
    /// HTTP verb
    pub verb: HttpVerb,
    /// Raw URL template, e.g. `/concat2/:a/:b` or `/pets/{id}`
    pub path: String,
}

/// One declared result of a method
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultDescriptor {
    /// Result name as declared (used for carrier field naming)
    pub name: String,
    /// Target type name of the result
    pub type_name: String,
    /// Declared as a pointer; the decoder dereferences on single decode
    #[serde(default)]
    pub pointer: bool,
    /// Error-like trailing result; excluded from decoding
    #[serde(default)]
    pub is_error: bool,
}

/// One annotated method of a service interface
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Method name
    pub name: String,
    /// Route annotations; exactly one is legal per method
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Ordered parameters
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    /// Ordered results
    #[serde(default)]
    pub results: Vec<ResultDescriptor>,
    /// Content-type hint for the request body
    #[serde(default)]
    pub content_type: Option<String>,
}

impl MethodDescriptor {
    /// The single route annotation of this method.
    ///
    /// Zero annotations is `MissingMetadata`; more than one is
    /// `AmbiguousAnnotation` (a duplicate route marker on one method).
    pub fn route(&self, at: &Position) -> Result<&Route> {
        match self.routes.as_slice() {
            [] => Err(Error::missing_metadata("route annotation", at)),
            [route] => Ok(route),
            routes => Err(Error::ambiguous_annotation(
                format!("{} route annotations on one method", routes.len()),
                at,
            )),
        }
    }
}

/// A complete annotated service interface plus its record registry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    /// Interface name
    pub name: String,
    /// Record types reachable from parameters, keyed by name
    #[serde(default)]
    pub records: Vec<RecordDescriptor>,
    /// Annotated methods
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
}

impl InterfaceDescriptor {
    /// Load an interface description from a file (supports both YAML and JSON)
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        Self::parse_content(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse interface description at {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Parse content as either JSON or YAML
    pub fn parse_content(content: &str) -> std::result::Result<Self, String> {
        // Try to parse as JSON first
        if let Ok(iface) = serde_json::from_str(content) {
            return Ok(iface);
        }

        // If JSON parsing fails, try YAML
        match serde_yaml::from_str(content) {
            Ok(iface) => Ok(iface),
            Err(e) => Err(format!("content is neither valid JSON nor YAML: {}", e)),
        }
    }

    /// Look up a record by name.
    ///
    /// A reachable record absent from the registry is fatal: flattening never
    /// silently drops a field.
    pub fn record(&self, name: &str, at: &Position) -> Result<&RecordDescriptor> {
        self.records
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::missing_metadata(format!("record `{}`", name), at))
    }

    /// Position of this interface, for diagnostics
    pub fn position(&self) -> Position {
        Position::interface(&self.name)
    }
}
