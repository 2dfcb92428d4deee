//! Framework invocation catalogs.
//!
//! An `Invocation` is a framework-supplied value-accessor primitive: how to
//! read a required path value, an optional query value, or an array of query
//! values, tagged with its result type and failure mode. Catalogs are
//! immutable values constructed once per framework and passed explicitly
//! into the synthesizer; there is no shared mutation across generation runs.
//!
//! # Examples
//!
//! ```
//! use routegen_core::invocation::FrameworkKind;
//! use std::str::FromStr;
//!
//! let kind = FrameworkKind::from_str("echo").unwrap();
//! assert_eq!(kind, FrameworkKind::Echo);
//! assert_eq!(kind.as_str(), "echo");
//! assert_eq!(kind.to_string(), "echo");
//! assert_eq!(FrameworkKind::default(), FrameworkKind::Echo);
//! ```

// Internal imports (std, crate)
use std::fmt;
use std::str::FromStr;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

/// Placeholder for the web parameter name in accessor formats
pub const NAME: &str = "{name}";
/// Placeholder for the default raw value in default-supporting accessors
pub const DEFAULT: &str = "{default}";

/// One framework value-accessor primitive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Reads a required (path) value, as opposed to an optional (query) one
    pub required: bool,
    /// Accessor expression template; `{name}` is replaced by the web name
    pub format: String,
    /// The accessor yields a sequence of raw values
    pub is_array: bool,
    /// Result type of the accessor, e.g. `string` or `[]string`
    pub result_type: String,
    /// The accessor returns an error alongside the value
    pub result_is_error: bool,
    /// The accessor returns an ok-bool alongside the value
    pub result_is_bool: bool,
    /// The accessor takes a default raw value as a second argument
    pub supports_default: bool,
}

impl Invocation {
    /// Expand the accessor expression for a web parameter name
    pub fn expand(&self, web_name: &str) -> String {
        self.format.replace(NAME, &format!("{:?}", web_name))
    }

    /// Expand a default-supporting accessor with a default raw value
    pub fn expand_with_default(&self, web_name: &str, default: &str) -> String {
        self.format
            .replace(NAME, &format!("{:?}", web_name))
            .replace(DEFAULT, &format!("{:?}", default))
    }
}

/// An immutable, framework-supplied table of accessor primitives
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvocationCatalog {
    /// Framework this catalog describes
    pub framework: FrameworkKind,
    /// Name of the request-context variable in generated handlers
    pub context_var: String,
    /// Reserved parameter types bound directly to framework values:
    /// `(type name, alias expression)`
    pub reserved: Vec<(String, String)>,
    /// Accessor primitives
    pub invocations: Vec<Invocation>,
}

impl InvocationCatalog {
    /// Find the accessor with an exact `(required, is_array, result_type)`
    /// match.
    pub fn lookup(&self, required: bool, is_array: bool, result_type: &str) -> Option<&Invocation> {
        self.invocations.iter().find(|inv| {
            inv.required == required
                && inv.is_array == is_array
                && inv.result_type == result_type
                && !inv.supports_default
        })
    }

    /// Fall back to the string-returning accessor for the same shape.
    ///
    /// Used when no exact scalar match exists; the raw string result is then
    /// run through a conversion rule.
    pub fn string_fallback(&self, required: bool, is_array: bool) -> Option<&Invocation> {
        let result_type = if is_array { "[]string" } else { "string" };
        self.lookup(required, is_array, result_type)
    }

    /// The default-supporting accessor for the given shape, if any
    pub fn default_accessor(&self, required: bool, is_array: bool) -> Option<&Invocation> {
        self.invocations.iter().find(|inv| {
            inv.required == required && inv.is_array == is_array && inv.supports_default
        })
    }

    /// Alias expression for a reserved parameter type
    pub fn reserved_alias(&self, type_name: &str) -> Option<&str> {
        self.reserved
            .iter()
            .find(|(name, _)| name == type_name)
            .map(|(_, alias)| alias.as_str())
    }

    /// Catalog for the echo-style framework: plain string accessors, no
    /// ok-bool results.
    pub fn echo() -> Self {
        Self {
            framework: FrameworkKind::Echo,
            context_var: "c".to_string(),
            reserved: vec![("echo.Context".to_string(), "c".to_string())],
            invocations: vec![
                Invocation {
                    required: true,
                    format: "c.Param({name})".to_string(),
                    is_array: false,
                    result_type: "string".to_string(),
                    result_is_error: false,
                    result_is_bool: false,
                    supports_default: false,
                },
                Invocation {
                    required: false,
                    format: "c.QueryParam({name})".to_string(),
                    is_array: false,
                    result_type: "string".to_string(),
                    result_is_error: false,
                    result_is_bool: false,
                    supports_default: false,
                },
                Invocation {
                    required: false,
                    format: "c.QueryParams()[{name}]".to_string(),
                    is_array: true,
                    result_type: "[]string".to_string(),
                    result_is_error: false,
                    result_is_bool: false,
                    supports_default: false,
                },
            ],
        }
    }

    /// Catalog for the gin-style framework: optional query reads return an
    /// ok-bool, and a default-taking accessor exists.
    pub fn gin() -> Self {
        Self {
            framework: FrameworkKind::Gin,
            context_var: "c".to_string(),
            reserved: vec![("*gin.Context".to_string(), "c".to_string())],
            invocations: vec![
                Invocation {
                    required: true,
                    format: "c.Param({name})".to_string(),
                    is_array: false,
                    result_type: "string".to_string(),
                    result_is_error: false,
                    result_is_bool: false,
                    supports_default: false,
                },
                Invocation {
                    required: false,
                    format: "c.GetQuery({name})".to_string(),
                    is_array: false,
                    result_type: "string".to_string(),
                    result_is_error: false,
                    result_is_bool: true,
                    supports_default: false,
                },
                Invocation {
                    required: false,
                    format: "c.QueryArray({name})".to_string(),
                    is_array: true,
                    result_type: "[]string".to_string(),
                    result_is_error: false,
                    result_is_bool: false,
                    supports_default: false,
                },
                Invocation {
                    required: false,
                    format: "c.DefaultQuery({name}, {default})".to_string(),
                    is_array: false,
                    result_type: "string".to_string(),
                    result_is_error: false,
                    result_is_bool: false,
                    supports_default: true,
                },
            ],
        }
    }
}

/// Supported target frameworks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkKind {
    /// Echo-style framework: plain accessors
    #[default]
    Echo,
    /// Gin-style framework: ok-bool query accessors
    Gin,
}

impl FrameworkKind {
    /// Returns the framework identifier as a string slice
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Echo => "echo",
            Self::Gin => "gin",
        }
    }

    /// Returns an iterator over all supported frameworks
    pub fn all() -> impl Iterator<Item = Self> {
        [Self::Echo, Self::Gin].iter().copied()
    }

    /// The invocation catalog for this framework
    pub fn catalog(&self) -> InvocationCatalog {
        match self {
            Self::Echo => InvocationCatalog::echo(),
            Self::Gin => InvocationCatalog::gin(),
        }
    }
}

impl FromStr for FrameworkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "echo" => Ok(FrameworkKind::Echo),
            "gin" => Ok(FrameworkKind::Gin),
            _ => Err(format!("Unknown framework kind: {}", s)),
        }
    }
}

impl fmt::Display for FrameworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
