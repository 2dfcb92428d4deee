//! Binding-plan model: steps, shapes and the shape-selection table.
//!
//! A `BindingPlan` is the synthesized, framework-agnostic description of how
//! one leaf parameter's value is obtained and validated. Shape selection is
//! a pure function of the leaf attributes `{required, pointer, array,
//! nullable}` plus the failure mode contributed by the matched invocation
//! and conversion; it is implemented as an explicit ordered table rather
//! than nested branching, so every combination is independently testable
//! and identical inputs always yield identical output.

// Internal imports (std, crate)
use crate::classify::ParamSource;

// External imports (alphabetized)
use once_cell::sync::Lazy;
use serde::Serialize;

/// How a value-read or conversion can fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallibility {
    /// Cannot fail
    Infallible,
    /// Returns an error alongside the value
    Error,
    /// Returns an ok-bool alongside the value
    OkBool,
}

/// Attribute vector driving shape selection for one leaf
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ShapeInputs {
    /// Path (required) vs. query (optional)
    pub required: bool,
    /// Leaf target is a pointer to scalar
    pub pointer: bool,
    /// Leaf target is an array of scalars
    pub array: bool,
    /// Leaf target is a nullable wrapper
    pub nullable: bool,
    /// A non-identity conversion sits between raw value and target
    pub converts: bool,
    /// Failure mode of the conversion (or of the accessor when no
    /// conversion is needed)
    pub fallible: Fallibility,
}

/// The fourteen binding shapes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingShape {
    /// Declare-and-assign from the accessor verbatim
    Direct,
    /// Direct read whose accessor returns an error
    DirectChecked,
    /// Direct read whose accessor returns an ok-bool
    DirectOk,
    /// Assign only if the scalar raw value is present
    Guarded,
    /// Assign only if the sequence result is non-empty
    GuardedList,
    /// Required value through an error-checked conversion
    Convert,
    /// Required value through an infallible cast
    ConvertCast,
    /// Optional value: presence guard, then error-checked conversion
    GuardedConvert,
    /// Optional value: presence guard, then infallible cast
    GuardedCast,
    /// Array target through a per-element conversion loop
    ListConvert,
    /// Box the converted value into a fresh pointer unconditionally
    PointerRequired,
    /// Box into a fresh pointer only when present
    PointerGuarded,
    /// Fill the nullable wrapper's value and validity slots unconditionally
    NullableRequired,
    /// Fill the nullable wrapper only when present
    NullableGuarded,
}

/// One row of the shape-selection table; `None` fields match anything
struct ShapeRule {
    required: Option<bool>,
    pointer: Option<bool>,
    array: Option<bool>,
    nullable: Option<bool>,
    converts: Option<bool>,
    fallible: Option<Fallibility>,
    shape: BindingShape,
}

impl ShapeRule {
    fn matches(&self, inputs: &ShapeInputs) -> bool {
        self.required.map_or(true, |v| v == inputs.required)
            && self.pointer.map_or(true, |v| v == inputs.pointer)
            && self.array.map_or(true, |v| v == inputs.array)
            && self.nullable.map_or(true, |v| v == inputs.nullable)
            && self.converts.map_or(true, |v| v == inputs.converts)
            && self.fallible.map_or(true, |v| v == inputs.fallible)
    }
}

macro_rules! rule {
    ($shape:ident, $($field:ident : $value:expr),* $(,)?) => {{
        let mut rule = ShapeRule {
            required: None,
            pointer: None,
            array: None,
            nullable: None,
            converts: None,
            fallible: None,
            shape: BindingShape::$shape,
        };
        $(rule.$field = Some($value);)*
        rule
    }};
}

/// Ordered selection table; the first matching row wins.
static SHAPE_TABLE: Lazy<Vec<ShapeRule>> = Lazy::new(|| {
    use Fallibility::*;
    vec![
        rule!(NullableRequired, nullable: true, required: true),
        rule!(NullableGuarded, nullable: true),
        rule!(PointerRequired, pointer: true, required: true),
        rule!(PointerGuarded, pointer: true),
        rule!(ListConvert, array: true, converts: true),
        rule!(Direct, array: true, required: true),
        rule!(GuardedList, array: true),
        rule!(Convert, required: true, converts: true, fallible: Error),
        rule!(ConvertCast, required: true, converts: true, fallible: Infallible),
        rule!(GuardedConvert, required: false, converts: true, fallible: Error),
        rule!(GuardedCast, required: false, converts: true, fallible: Infallible),
        rule!(DirectChecked, required: true, fallible: Error),
        rule!(DirectOk, required: true, fallible: OkBool),
        rule!(Direct, required: true),
        rule!(Guarded, required: false),
    ]
});

/// Select the binding shape for one leaf. Total and deterministic.
pub fn select_shape(inputs: &ShapeInputs) -> BindingShape {
    SHAPE_TABLE
        .iter()
        .find(|rule| rule.matches(inputs))
        .map(|rule| rule.shape)
        .expect("shape table covers all attribute combinations")
}

/// Guard style of a presence-guarded read
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardStyle {
    /// Guard on the scalar raw value being non-empty
    NonEmpty,
    /// Guard on the sequence result being non-empty
    NonEmptySeq,
    /// Guard on the accessor's ok-bool result
    OkBool,
}

/// One synthesized step of a binding plan
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum BindingStep {
    /// Lazily allocate a pointer-typed ancestor before the first write
    /// beneath it; `guarded` adds a nil check for non-first writes
    AllocateParent {
        access: String,
        type_name: String,
        guarded: bool,
    },
    /// Declare the target at its zero value ahead of a presence guard, so
    /// an absent value leaves the declared zero outside the guard block
    DeclareZero { target: String, type_name: String },
    /// Declare-and-assign the accessor (or cast) result verbatim
    DirectRead { target: String, expr: String },
    /// Read into `raw_var` and open a presence guard over the remaining
    /// steps; when `target` is set the guarded body is the assignment itself
    PresenceGuardedRead {
        raw_var: String,
        accessor: String,
        guard: GuardStyle,
        target: Option<String>,
    },
    /// Convert `raw`, capture the error, branch to bad-argument on failure
    ErrorCheckedConvert {
        target: String,
        raw: String,
        convert: String,
        cast: Option<String>,
        /// First fallible step of the method declares the error variable
        declares_err: bool,
        web_name: String,
    },
    /// As ErrorCheckedConvert but keyed on an ok-bool accessor result
    BoolCheckedConvert {
        target: String,
        accessor: String,
        ok_var: String,
        cast: Option<String>,
        web_name: String,
    },
    /// Box a value into a freshly allocated pointer
    PointerBox { target: String, value: String },
    /// Assign the wrapper's value slot and set its validity flag
    NullableBox {
        target: String,
        wrapper: String,
        value_field: String,
        valid_field: String,
        value: String,
    },
    /// Convert a sequence element-by-element into the array target
    ArrayLoop {
        target: String,
        source: String,
        elem_convert: String,
        elem_cast: Option<String>,
        has_error: bool,
        declares_err: bool,
        web_name: String,
    },
    /// Decode the request body into the target
    BodyBind {
        target: String,
        /// Aggregated decode of several unmapped fields, not a designated
        /// single receiver
        aggregate: bool,
        content_type: Option<String>,
    },
    /// Bind a reserved-type target directly to a framework value
    ReservedAlias { target: String, alias: String },
    /// Scan all query keys under a prefix into a multi-value map target
    StructFieldScan { target: String, prefix: String },
}

/// The `(web name, raw value, failure)` triple handed to the out-of-scope
/// bad-argument reporting collaborator
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BadArgument {
    pub web_name: String,
    /// Expression for the offending raw value
    pub raw: String,
    /// Failure expression: the error, or the negated ok-bool
    pub failure: String,
}

/// Ordered steps for one leaf parameter
#[derive(Clone, Debug, Serialize)]
pub struct BindingPlan {
    /// Owning top-level parameter
    pub parameter: String,
    /// Target access path
    pub access: String,
    /// Final web name
    pub web_name: String,
    /// Resolved request source
    pub source: ParamSource,
    /// Selected shape; body, reserved and scan leaves have none
    pub shape: Option<BindingShape>,
    pub steps: Vec<BindingStep>,
    /// Bad-argument report for fallible plans
    pub fail: Option<BadArgument>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn inputs(
        required: bool,
        pointer: bool,
        array: bool,
        nullable: bool,
        converts: bool,
        fallible: Fallibility,
    ) -> ShapeInputs {
        ShapeInputs {
            required,
            pointer,
            array,
            nullable,
            converts,
            fallible,
        }
    }

    #[test]
    fn test_selection_is_total_and_deterministic() {
        // Every combination selects exactly one shape, twice the same.
        let mut seen = HashMap::new();
        for required in [false, true] {
            for pointer in [false, true] {
                for array in [false, true] {
                    for nullable in [false, true] {
                        for converts in [false, true] {
                            for fallible in
                                [Fallibility::Infallible, Fallibility::Error, Fallibility::OkBool]
                            {
                                let i =
                                    inputs(required, pointer, array, nullable, converts, fallible);
                                let shape = select_shape(&i);
                                assert_eq!(select_shape(&i), shape);
                                seen.insert(i, shape);
                            }
                        }
                    }
                }
            }
        }
        assert_eq!(seen.len(), 96);
    }

    #[test]
    fn test_all_fourteen_shapes_reachable() {
        use BindingShape::*;
        use Fallibility::*;
        let cases = [
            (inputs(true, false, false, false, false, Infallible), Direct),
            (inputs(true, false, false, false, false, Error), DirectChecked),
            (inputs(true, false, false, false, false, OkBool), DirectOk),
            (inputs(false, false, false, false, false, Infallible), Guarded),
            (inputs(false, false, true, false, false, Infallible), GuardedList),
            (inputs(true, false, false, false, true, Error), Convert),
            (inputs(true, false, false, false, true, Infallible), ConvertCast),
            (inputs(false, false, false, false, true, Error), GuardedConvert),
            (inputs(false, false, false, false, true, Infallible), GuardedCast),
            (inputs(false, false, true, false, true, Error), ListConvert),
            (inputs(true, true, false, false, true, Error), PointerRequired),
            (inputs(false, true, false, false, true, Error), PointerGuarded),
            (inputs(true, false, false, true, true, Error), NullableRequired),
            (inputs(false, false, false, true, true, Error), NullableGuarded),
        ];
        for (i, expected) in cases {
            assert_eq!(select_shape(&i), expected, "inputs: {:?}", i);
        }
    }

    #[test]
    fn test_nullable_wins_over_pointer_and_array() {
        let i = inputs(false, true, true, true, true, Fallibility::Error);
        assert_eq!(select_shape(&i), BindingShape::NullableGuarded);
    }

    #[test]
    fn test_required_array_without_conversion_is_direct() {
        let i = inputs(true, false, true, false, false, Fallibility::Infallible);
        assert_eq!(select_shape(&i), BindingShape::Direct);
    }
}
