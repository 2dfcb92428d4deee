//! Conversion-rule selection for scalar and array-of-scalar target types.
//!
//! Maps a target type name to a conversion recipe: the accessor's raw string
//! result is run through `format`, optionally cast to a narrower or named
//! type, and the whole conversion either can fail (error-checked in the
//! generated code) or cannot. Array targets require a distinct `[]T` rule;
//! there is no implicit per-element fallback.
//!
//! A named type whose underlying type is a supported scalar resolves one
//! indirection level (forcing a cast); deeper indirection fails fast with
//! `UnsupportedType`.

// Internal imports (std, crate)
use std::collections::BTreeMap;

use crate::error::{Error, Position, Result};
use crate::metadata::ScalarType;

// External imports (alphabetized)
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Placeholder in conversion and accessor format strings
pub const RAW: &str = "{raw}";

/// One conversion recipe, keyed by target type name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRule {
    /// Expression template; `{raw}` is replaced by the raw value expression
    pub format: String,
    /// The 64-bit (or untyped) result needs a cast to the target type
    pub needs_cast: bool,
    /// The conversion returns an error alongside the value
    pub has_error: bool,
}

impl ConversionRule {
    fn new(format: &str, needs_cast: bool, has_error: bool) -> Self {
        Self {
            format: format.to_string(),
            needs_cast,
            has_error,
        }
    }
}

/// A resolved conversion for one concrete target type
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Conversion {
    /// Expression template with `{raw}` placeholder
    pub format: String,
    /// The conversion returns an error alongside the value
    pub has_error: bool,
    /// Cast the converted value to this type name before storing
    pub cast: Option<String>,
}

impl Conversion {
    /// Expand the conversion expression for a raw value expression.
    ///
    /// The cast, if any, is not applied here: error-checked conversions cast
    /// after the check, so the caller applies [`Conversion::cast_expr`] at
    /// the store site.
    pub fn expand(&self, raw: &str) -> String {
        self.format.replace(RAW, raw)
    }

    /// Wrap a value expression in this conversion's cast, if one is needed
    pub fn cast_expr(&self, value: &str) -> String {
        match &self.cast {
            Some(target) => format!("{}({})", target, value),
            None => value.to_string(),
        }
    }

    /// An identity conversion (raw string stored verbatim)
    pub fn identity() -> Self {
        Self {
            format: RAW.to_string(),
            has_error: false,
            cast: None,
        }
    }

    /// Whether this conversion changes the raw value at all
    pub fn is_identity(&self) -> bool {
        self.format == RAW && self.cast.is_none()
    }
}

/// Nullable-wrapper decomposition info for one scalar
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NullableInfo {
    /// Wrapper type name, e.g. `sql.NullInt64`
    pub wrapper: String,
    /// Name of the wrapper's value slot, e.g. `Int64`
    pub value_field: String,
    /// Name of the wrapper's validity flag
    pub valid_field: String,
}

static BUILTIN_RULES: Lazy<BTreeMap<String, ConversionRule>> = Lazy::new(|| {
    let mut rules = BTreeMap::new();
    let mut put = |name: &str, rule: ConversionRule| {
        rules.insert(name.to_string(), rule);
    };

    put("string", ConversionRule::new(RAW, false, false));
    put("bool", ConversionRule::new("strconv.ParseBool({raw})", false, true));

    // Integer and unsigned widths below 64 bits cast from the 64-bit parse
    // result.
    let int = "strconv.ParseInt({raw}, 10, 64)";
    put("int64", ConversionRule::new(int, false, true));
    for name in ["int", "int8", "int16", "int32"] {
        put(name, ConversionRule::new(int, true, true));
    }
    let uint = "strconv.ParseUint({raw}, 10, 64)";
    put("uint64", ConversionRule::new(uint, false, true));
    for name in ["uint", "uint8", "uint16", "uint32"] {
        put(name, ConversionRule::new(uint, true, true));
    }

    let float = "strconv.ParseFloat({raw}, 64)";
    put("float64", ConversionRule::new(float, false, true));
    put("float32", ConversionRule::new(float, true, true));

    put(
        "time.Duration",
        ConversionRule::new("time.ParseDuration({raw})", false, true),
    );
    put(
        "time.Time",
        ConversionRule::new("time.Parse(time.RFC3339, {raw})", false, true),
    );
    // net.ParseIP reports failure through a nil result, not an error.
    put("net.IP", ConversionRule::new("net.ParseIP({raw})", false, false));

    // Array rules are distinct entries; the format applies per element
    // inside the synthesized loop.
    put("[]string", ConversionRule::new(RAW, false, false));
    put("[]int64", ConversionRule::new(int, false, true));
    put("[]int", ConversionRule::new(int, true, true));
    put("[]int32", ConversionRule::new(int, true, true));
    put("[]uint64", ConversionRule::new(uint, false, true));
    put("[]float64", ConversionRule::new(float, false, true));
    put("[]bool", ConversionRule::new("strconv.ParseBool({raw})", false, true));

    rules
});

/// Selects conversion recipes for target types.
///
/// Constructed once per generation run; the built-in table can be extended
/// with framework- or project-specific rules before synthesis starts.
#[derive(Clone, Debug)]
pub struct ConversionSelector {
    rules: BTreeMap<String, ConversionRule>,
}

impl Default for ConversionSelector {
    fn default() -> Self {
        Self {
            rules: BUILTIN_RULES.clone(),
        }
    }
}

impl ConversionSelector {
    /// Add or replace a rule for a target type name
    pub fn with_rule(mut self, type_name: impl Into<String>, rule: ConversionRule) -> Self {
        self.rules.insert(type_name.into(), rule);
        self
    }

    /// Resolve the conversion for a scalar target type
    pub fn select(&self, scalar: &ScalarType, at: &Position) -> Result<Conversion> {
        self.resolve(&scalar.name, scalar.underlying.as_deref(), at)
    }

    /// Resolve the per-element conversion for an array-of-scalar target.
    ///
    /// Requires a dedicated `[]T` rule; a missing one is `UnsupportedType`
    /// even when `T` itself has a rule.
    pub fn select_array(&self, elem: &ScalarType, at: &Position) -> Result<Conversion> {
        let key = format!("[]{}", elem.name);
        match self.rules.get(&key) {
            Some(rule) => Ok(Conversion {
                format: rule.format.clone(),
                has_error: rule.has_error,
                cast: rule.needs_cast.then(|| elem.name.clone()),
            }),
            None => match elem.underlying.as_deref() {
                // One level of named-type resolution, forcing a cast.
                Some(underlying) if self.rules.contains_key(&format!("[]{}", underlying)) => {
                    let rule = &self.rules[&format!("[]{}", underlying)];
                    Ok(Conversion {
                        format: rule.format.clone(),
                        has_error: rule.has_error,
                        cast: Some(elem.name.clone()),
                    })
                }
                _ => Err(Error::unsupported_type(key, at)),
            },
        }
    }

    fn resolve(&self, name: &str, underlying: Option<&str>, at: &Position) -> Result<Conversion> {
        if let Some(rule) = self.rules.get(name) {
            return Ok(Conversion {
                format: rule.format.clone(),
                has_error: rule.has_error,
                cast: rule.needs_cast.then(|| name.to_string()),
            });
        }
        match underlying {
            Some(u) => match self.rules.get(u) {
                Some(rule) => Ok(Conversion {
                    format: rule.format.clone(),
                    has_error: rule.has_error,
                    // Named types always cast from the underlying result.
                    cast: Some(name.to_string()),
                }),
                None => Err(Error::unsupported_type(
                    format!("{} (underlying {})", name, u),
                    at,
                )),
            },
            None => Err(Error::unsupported_type(name, at)),
        }
    }

    /// Nullable-wrapper decomposition for a scalar target.
    ///
    /// Presence sets the value slot and the validity flag; absence leaves
    /// the wrapper at its zero value.
    pub fn nullable_info(&self, scalar: &ScalarType, at: &Position) -> Result<NullableInfo> {
        let base = scalar.underlying.as_deref().unwrap_or(&scalar.name);
        let (wrapper, value_field) = match base {
            "string" => ("sql.NullString", "String"),
            "bool" => ("sql.NullBool", "Bool"),
            "int16" => ("sql.NullInt16", "Int16"),
            "int32" => ("sql.NullInt32", "Int32"),
            "int64" => ("sql.NullInt64", "Int64"),
            "float64" => ("sql.NullFloat64", "Float64"),
            "time.Time" => ("sql.NullTime", "Time"),
            other => {
                return Err(Error::unsupported_type(format!("nullable {}", other), at));
            }
        };
        Ok(NullableInfo {
            wrapper: wrapper.to_string(),
            value_field: value_field.to_string(),
            valid_field: "Valid".to_string(),
        })
    }

    /// Client-direction stringification of a scalar value expression
    pub fn stringify(&self, scalar: &ScalarType, expr: &str, at: &Position) -> Result<String> {
        let base = scalar.underlying.as_deref().unwrap_or(&scalar.name);
        let expr = expr.to_string();
        let out = match base {
            "string" => {
                if scalar.underlying.is_some() {
                    format!("string({})", expr)
                } else {
                    expr
                }
            }
            "bool" => format!("strconv.FormatBool({})", expr),
            "int64" => {
                if scalar.underlying.is_some() {
                    format!("strconv.FormatInt(int64({}), 10)", expr)
                } else {
                    format!("strconv.FormatInt({}, 10)", expr)
                }
            }
            "int" | "int8" | "int16" | "int32" => {
                format!("strconv.FormatInt(int64({}), 10)", expr)
            }
            "uint64" => {
                if scalar.underlying.is_some() {
                    format!("strconv.FormatUint(uint64({}), 10)", expr)
                } else {
                    format!("strconv.FormatUint({}, 10)", expr)
                }
            }
            "uint" | "uint8" | "uint16" | "uint32" => {
                format!("strconv.FormatUint(uint64({}), 10)", expr)
            }
            "float64" => format!("strconv.FormatFloat({}, 'f', -1, 64)", expr),
            "float32" => format!("strconv.FormatFloat(float64({}), 'f', -1, 32)", expr),
            "time.Duration" => format!("{}.String()", expr),
            "time.Time" => format!("{}.Format(time.RFC3339)", expr),
            "net.IP" => format!("{}.String()", expr),
            other => return Err(Error::unsupported_type(other, at)),
        };
        Ok(out)
    }

    /// Zero-value expression for omit-empty guards
    pub fn zero_literal(&self, scalar: &ScalarType) -> String {
        let base = scalar.underlying.as_deref().unwrap_or(&scalar.name);
        match base {
            "string" => "\"\"".to_string(),
            "bool" => "false".to_string(),
            "time.Time" => "time.Time{}".to_string(),
            "time.Duration" => "0".to_string(),
            "net.IP" => "nil".to_string(),
            _ => "0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> Position {
        Position::interface("Calc").method("m").parameter("p")
    }

    #[test]
    fn test_string_is_identity() {
        let sel = ConversionSelector::default();
        let conv = sel.select(&ScalarType::plain("string"), &at()).unwrap();
        assert!(conv.is_identity());
        assert!(!conv.has_error);
        assert_eq!(conv.expand("raw"), "raw");
    }

    #[test]
    fn test_int64_no_cast_int32_casts() {
        let sel = ConversionSelector::default();

        let conv = sel.select(&ScalarType::plain("int64"), &at()).unwrap();
        assert!(conv.has_error);
        assert_eq!(conv.cast, None);
        assert_eq!(conv.expand("v"), "strconv.ParseInt(v, 10, 64)");

        let conv = sel.select(&ScalarType::plain("int32"), &at()).unwrap();
        assert!(conv.has_error);
        assert_eq!(conv.cast.as_deref(), Some("int32"));
        assert_eq!(conv.cast_expr("v"), "int32(v)");
    }

    #[test]
    fn test_dedicated_scalar_rules() {
        let sel = ConversionSelector::default();
        let conv = sel
            .select(&ScalarType::plain("time.Duration"), &at())
            .unwrap();
        assert_eq!(conv.expand("v"), "time.ParseDuration(v)");
        assert!(conv.has_error);

        let conv = sel.select(&ScalarType::plain("net.IP"), &at()).unwrap();
        assert!(!conv.has_error);
    }

    #[test]
    fn test_unknown_type_fails() {
        let sel = ConversionSelector::default();
        let err = sel
            .select(&ScalarType::plain("complex128"), &at())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { .. }));
    }

    #[test]
    fn test_named_type_resolves_one_level() {
        let sel = ConversionSelector::default();
        let conv = sel
            .select(&ScalarType::named("UserID", "int64"), &at())
            .unwrap();
        // Resolution through the underlying type forces a cast to the named
        // type even though int64 itself needs none.
        assert_eq!(conv.cast.as_deref(), Some("UserID"));
        assert!(conv.has_error);
    }

    #[test]
    fn test_named_type_deeper_indirection_fails() {
        let sel = ConversionSelector::default();
        let err = sel
            .select(&ScalarType::named("Outer", "Inner"), &at())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { .. }));
    }

    #[test]
    fn test_array_requires_distinct_rule() {
        let sel = ConversionSelector::default();
        assert!(sel.select_array(&ScalarType::plain("int64"), &at()).is_ok());
        // time.Duration has a scalar rule but no []time.Duration rule.
        let err = sel
            .select_array(&ScalarType::plain("time.Duration"), &at())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { .. }));
    }

    #[test]
    fn test_custom_rule_extends_table() {
        let sel = ConversionSelector::default().with_rule(
            "uuid.UUID",
            ConversionRule::new("uuid.Parse({raw})", false, true),
        );
        let conv = sel.select(&ScalarType::plain("uuid.UUID"), &at()).unwrap();
        assert_eq!(conv.expand("v"), "uuid.Parse(v)");
    }

    #[test]
    fn test_nullable_info() {
        let sel = ConversionSelector::default();
        let info = sel.nullable_info(&ScalarType::plain("bool"), &at()).unwrap();
        assert_eq!(info.wrapper, "sql.NullBool");
        assert_eq!(info.value_field, "Bool");
        assert_eq!(info.valid_field, "Valid");

        assert!(sel
            .nullable_info(&ScalarType::plain("net.IP"), &at())
            .is_err());
    }

    #[test]
    fn test_stringify() {
        let sel = ConversionSelector::default();
        let s = |name: &str| ScalarType::plain(name);
        assert_eq!(sel.stringify(&s("string"), "v", &at()).unwrap(), "v");
        assert_eq!(
            sel.stringify(&s("int64"), "v", &at()).unwrap(),
            "strconv.FormatInt(v, 10)"
        );
        assert_eq!(
            sel.stringify(&s("int32"), "v", &at()).unwrap(),
            "strconv.FormatInt(int64(v), 10)"
        );
        assert_eq!(
            sel.stringify(&s("bool"), "v", &at()).unwrap(),
            "strconv.FormatBool(v)"
        );
        assert_eq!(
            sel.stringify(&ScalarType::named("UserID", "int64"), "v", &at())
                .unwrap(),
            "strconv.FormatInt(int64(v), 10)"
        );
    }

    #[test]
    fn test_zero_literals() {
        let sel = ConversionSelector::default();
        assert_eq!(sel.zero_literal(&ScalarType::plain("string")), "\"\"");
        assert_eq!(sel.zero_literal(&ScalarType::plain("int64")), "0");
        assert_eq!(sel.zero_literal(&ScalarType::plain("bool")), "false");
    }
}
