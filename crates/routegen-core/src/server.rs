//! Server-direction binding-plan synthesis.
//!
//! Combines the path-template codec, the classifier, the struct flattener,
//! the conversion selector and the framework invocation catalog into one
//! ordered `BindingPlan` per leaf parameter. The choice of binding shape is
//! delegated to the explicit table in [`crate::plan`]; this module matches
//! invocations, resolves conversions, and lays out the concrete steps for
//! the selected shape.
//!
//! All state is constructed fresh per generation run from immutable input
//! metadata: the only carried values are the per-record-tree parent-init
//! state (inside the flattener) and the per-method "error variable already
//! declared" flag.

// Internal imports (std, crate)
use crate::classify::{classify_method, ClassifiedLeaf, ParamSource};
use crate::convert::{Conversion, ConversionSelector};
use crate::decode::{decode_results, DecodedResult, Envelope};
use crate::error::{Error, Position, Result};
use crate::flatten::ParentInit;
use crate::invocation::{Invocation, InvocationCatalog};
use crate::metadata::{HttpVerb, InterfaceDescriptor, MethodDescriptor, TypeShape};
use crate::path_template::{parse, render, Notation};
use crate::plan::{
    select_shape, BadArgument, BindingPlan, BindingShape, BindingStep, Fallibility, GuardStyle,
    ShapeInputs,
};
use crate::utils::to_lower_camel_case;

// External imports (alphabetized)
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Everything the emission collaborator needs for one method
#[derive(Clone, Debug, Serialize)]
pub struct MethodBinding {
    /// Method name
    pub method: String,
    /// HTTP verb of the single route annotation
    pub verb: HttpVerb,
    /// Route rendered in the destination notation
    pub route: String,
    /// One plan per leaf, in parameter order
    pub plans: Vec<BindingPlan>,
    /// Response-decoding shape for the method's results
    pub result: DecodedResult,
}

impl MethodBinding {
    /// Serialize for the external emitter
    pub fn to_context(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Synthesizes server-direction binding plans for a whole interface
pub struct BindingPlanSynthesizer<'a> {
    iface: &'a InterfaceDescriptor,
    catalog: &'a InvocationCatalog,
    conversions: &'a ConversionSelector,
    source_notation: Notation,
    dest_notation: Notation,
    envelope: Option<Envelope>,
}

impl<'a> BindingPlanSynthesizer<'a> {
    pub fn new(
        iface: &'a InterfaceDescriptor,
        catalog: &'a InvocationCatalog,
        conversions: &'a ConversionSelector,
    ) -> Self {
        Self {
            iface,
            catalog,
            conversions,
            source_notation: Notation::default(),
            dest_notation: Notation::default(),
            envelope: None,
        }
    }

    /// Set the placeholder notations of the input templates and of the
    /// rendered output routes
    pub fn with_notations(mut self, source: Notation, dest: Notation) -> Self {
        self.source_notation = source;
        self.dest_notation = dest;
        self
    }

    /// Nest decoded results inside a response envelope
    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = Some(envelope);
        self
    }

    /// Synthesize plans for every method, sorted by method name for
    /// consistent output
    pub fn synthesize(&self) -> Result<Vec<MethodBinding>> {
        let mut bindings = Vec::new();
        for method in &self.iface.methods {
            bindings.push(self.synthesize_method(method)?);
        }
        bindings.sort_by(|a, b| a.method.cmp(&b.method));
        Ok(bindings)
    }

    /// Synthesize the binding for one method
    pub fn synthesize_method(&self, method: &MethodDescriptor) -> Result<MethodBinding> {
        let at = self.iface.position().method(&method.name);
        let route = method.route(&at)?;
        let template = parse(&route.path, self.source_notation)?;
        let leaves = classify_method(self.iface, method, &template, &at)?;

        let body_count = leaves
            .iter()
            .filter(|l| l.source == ParamSource::Body)
            .count();

        let mut err_declared = false;
        let mut plans = Vec::new();
        for leaf in &leaves {
            plans.push(self.plan_for_leaf(
                method,
                leaf,
                body_count,
                &mut err_declared,
                &at.parameter(&leaf.leaf.access),
            )?);
        }

        log::debug!(
            "synthesized {} plans for {}.{}",
            plans.len(),
            self.iface.name,
            method.name
        );

        Ok(MethodBinding {
            method: method.name.clone(),
            verb: route.verb,
            route: render(&template.segments, self.dest_notation, false),
            plans,
            result: decode_results(method, self.envelope.clone()),
        })
    }

    fn plan_for_leaf(
        &self,
        method: &MethodDescriptor,
        classified: &ClassifiedLeaf,
        body_count: usize,
        err_declared: &mut bool,
        at: &Position,
    ) -> Result<BindingPlan> {
        let leaf = &classified.leaf;
        let target = leaf.access.clone();
        let web = classified.web_name.clone();

        match classified.source {
            ParamSource::Reserved => {
                let type_name = leaf.shape.type_name();
                let alias = self
                    .catalog
                    .reserved_alias(&type_name)
                    .ok_or_else(|| Error::unsupported_type(&type_name, at))?
                    .to_string();
                Ok(plan(
                    classified,
                    None,
                    vec![BindingStep::ReservedAlias { target, alias }],
                    None,
                ))
            }
            ParamSource::Body => {
                let mut steps = alloc_steps(&leaf.parent_inits);
                steps.push(BindingStep::BodyBind {
                    target,
                    aggregate: body_count > 1,
                    content_type: method.content_type.clone(),
                });
                Ok(plan(classified, None, steps, None))
            }
            ParamSource::Query if matches!(leaf.shape, TypeShape::Map { .. }) => {
                let mut steps = alloc_steps(&leaf.parent_inits);
                steps.push(BindingStep::StructFieldScan {
                    target,
                    prefix: web,
                });
                Ok(plan(classified, None, steps, None))
            }
            ParamSource::Path | ParamSource::Query => {
                self.scalar_plan(classified, err_declared, at)
            }
        }
    }

    /// The shape-table path: plain scalar, pointer, array and nullable
    /// leaves read from path or query.
    fn scalar_plan(
        &self,
        classified: &ClassifiedLeaf,
        err_declared: &mut bool,
        at: &Position,
    ) -> Result<BindingPlan> {
        let leaf = &classified.leaf;
        let web = classified.web_name.as_str();
        let required = classified.required;

        let (scalar, pointer, array, nullable) = match &leaf.shape {
            TypeShape::Scalar { scalar } => (scalar.clone(), false, false, false),
            TypeShape::Pointer { scalar } => (scalar.clone(), true, false, false),
            TypeShape::Array { elem } => (elem.clone(), false, true, false),
            TypeShape::Nullable { scalar } => (scalar.clone(), false, false, true),
            other => {
                return Err(Error::unsupported_type(other.type_name(), at));
            }
        };

        // Default-taking accessors make an optional value always present.
        let default_inv = leaf
            .default
            .as_deref()
            .and_then(|_| self.catalog.default_accessor(required, array));
        let effective_required = required || default_inv.is_some();

        let inv = match default_inv {
            Some(inv) => inv,
            None => self.match_invocation(effective_required, array, &scalar.name, at)?,
        };
        let accessor = match (&leaf.default, default_inv) {
            (Some(default), Some(inv)) => inv.expand_with_default(web, default),
            _ => inv.expand(web),
        };

        // A non-identity conversion is needed whenever the accessor's
        // result type is not the leaf's exact target type.
        let exact = if array {
            inv.result_type == format!("[]{}", scalar.name) && scalar.underlying.is_none()
        } else {
            inv.result_type == scalar.name && scalar.underlying.is_none()
        };
        let conv = if exact {
            None
        } else if array {
            Some(self.conversions.select_array(&scalar, at)?)
        } else {
            Some(self.conversions.select(&scalar, at)?)
        };
        let converts = conv.as_ref().map(|c| !c.is_identity()).unwrap_or(false);

        let fallible = if converts {
            if conv.as_ref().map(|c| c.has_error).unwrap_or(false) {
                Fallibility::Error
            } else {
                Fallibility::Infallible
            }
        } else if inv.result_is_error {
            Fallibility::Error
        } else if inv.result_is_bool {
            Fallibility::OkBool
        } else {
            Fallibility::Infallible
        };

        let inputs = ShapeInputs {
            required: effective_required,
            pointer,
            array,
            nullable,
            converts,
            fallible,
        };
        let shape = select_shape(&inputs);

        let mut builder = StepBuilder {
            conversions: self.conversions,
            leaf_at: at,
            target: &leaf.access,
            web,
            scalar: &scalar,
            accessor: &accessor,
            inv,
            conv: conv.as_ref(),
            allocs: alloc_steps(&leaf.parent_inits),
            err_declared,
        };
        let (steps, fail) = builder.build(shape)?;
        Ok(plan(classified, Some(shape), steps, fail))
    }

    /// Pick the invocation by requiredness, array-ness and exact
    /// result-type match, falling back to the string-returning accessor.
    fn match_invocation(
        &self,
        required: bool,
        is_array: bool,
        type_name: &str,
        at: &Position,
    ) -> Result<&Invocation> {
        let wanted = if is_array {
            format!("[]{}", type_name)
        } else {
            type_name.to_string()
        };
        self.catalog
            .lookup(required, is_array, &wanted)
            .or_else(|| self.catalog.string_fallback(required, is_array))
            .ok_or_else(|| Error::unsupported_type(wanted, at))
    }
}

fn plan(
    classified: &ClassifiedLeaf,
    shape: Option<BindingShape>,
    steps: Vec<BindingStep>,
    fail: Option<BadArgument>,
) -> BindingPlan {
    BindingPlan {
        parameter: classified.leaf.parameter.clone(),
        access: classified.leaf.access.clone(),
        web_name: classified.web_name.clone(),
        source: classified.source,
        shape,
        steps,
        fail,
    }
}

fn alloc_steps(parents: &[ParentInit]) -> Vec<BindingStep> {
    parents
        .iter()
        .map(|p| BindingStep::AllocateParent {
            access: p.access.clone(),
            type_name: p.type_name.clone(),
            guarded: !p.first_write,
        })
        .collect()
}

/// Lays out the concrete steps for one selected shape
struct StepBuilder<'x> {
    conversions: &'x ConversionSelector,
    leaf_at: &'x Position,
    target: &'x str,
    web: &'x str,
    scalar: &'x crate::metadata::ScalarType,
    accessor: &'x str,
    inv: &'x Invocation,
    conv: Option<&'x Conversion>,
    allocs: Vec<BindingStep>,
    err_declared: &'x mut bool,
}

impl StepBuilder<'_> {
    fn build(&mut self, shape: BindingShape) -> Result<(Vec<BindingStep>, Option<BadArgument>)> {
        use BindingShape::*;

        let raw_var = format!("{}Raw", to_lower_camel_case(self.web));
        let val_var = format!("{}Val", to_lower_camel_case(self.web));
        let ok_var = format!("{}Ok", to_lower_camel_case(self.web));

        let out = match shape {
            Direct => {
                let mut steps = self.allocs.clone();
                steps.push(BindingStep::DirectRead {
                    target: self.target.to_string(),
                    expr: self.accessor.to_string(),
                });
                (steps, None)
            }
            ConvertCast => {
                let conv = self.conv.expect("cast shape has a conversion");
                let expr = conv.cast_expr(&conv.expand(self.accessor));
                let mut steps = self.allocs.clone();
                steps.push(BindingStep::DirectRead {
                    target: self.target.to_string(),
                    expr,
                });
                (steps, None)
            }
            DirectChecked => {
                let mut steps = self.allocs.clone();
                let (step, fail) = self.error_checked(
                    self.target,
                    self.accessor,
                    self.accessor.to_string(),
                    None,
                );
                steps.push(step);
                (steps, Some(fail))
            }
            DirectOk => {
                let mut steps = self.allocs.clone();
                steps.push(BindingStep::BoolCheckedConvert {
                    target: self.target.to_string(),
                    accessor: self.accessor.to_string(),
                    ok_var: ok_var.clone(),
                    cast: None,
                    web_name: self.web.to_string(),
                });
                let fail = BadArgument {
                    web_name: self.web.to_string(),
                    raw: self.accessor.to_string(),
                    failure: format!("!{}", ok_var),
                };
                (steps, Some(fail))
            }
            Guarded | GuardedList => {
                let type_name = if shape == GuardedList {
                    format!("[]{}", self.scalar.name)
                } else {
                    self.scalar.name.clone()
                };
                let mut steps = self.declare(type_name);
                if self.allocs.is_empty() {
                    steps.push(BindingStep::PresenceGuardedRead {
                        raw_var: raw_var.clone(),
                        accessor: self.accessor.to_string(),
                        guard: self.guard_style(shape == GuardedList),
                        target: Some(self.target.to_string()),
                    });
                    (steps, None)
                } else {
                    steps.push(BindingStep::PresenceGuardedRead {
                        raw_var: raw_var.clone(),
                        accessor: self.accessor.to_string(),
                        guard: self.guard_style(shape == GuardedList),
                        target: None,
                    });
                    steps.extend(self.allocs.clone());
                    steps.push(BindingStep::DirectRead {
                        target: self.target.to_string(),
                        expr: raw_var.clone(),
                    });
                    (steps, None)
                }
            }
            Convert => {
                let conv = self.conv.expect("convert shape has a conversion");
                let mut steps = vec![BindingStep::DirectRead {
                    target: raw_var.clone(),
                    expr: self.accessor.to_string(),
                }];
                steps.extend(self.allocs.clone());
                let (step, fail) = self.error_checked(
                    self.target,
                    &raw_var,
                    conv.expand(&raw_var),
                    conv.cast.clone(),
                );
                steps.push(step);
                (steps, Some(fail))
            }
            GuardedConvert => {
                let conv = self.conv.expect("convert shape has a conversion");
                let mut steps = self.declare(self.scalar.name.clone());
                steps.push(BindingStep::PresenceGuardedRead {
                    raw_var: raw_var.clone(),
                    accessor: self.accessor.to_string(),
                    guard: self.guard_style(false),
                    target: None,
                });
                steps.extend(self.allocs.clone());
                let (step, fail) = self.guard_scoped_convert(
                    &val_var,
                    &raw_var,
                    conv.expand(&raw_var),
                    conv.cast.clone(),
                );
                steps.push(step);
                steps.push(BindingStep::DirectRead {
                    target: self.target.to_string(),
                    expr: val_var.clone(),
                });
                (steps, Some(fail))
            }
            GuardedCast => {
                let conv = self.conv.expect("cast shape has a conversion");
                let mut steps = self.declare(self.scalar.name.clone());
                steps.push(BindingStep::PresenceGuardedRead {
                    raw_var: raw_var.clone(),
                    accessor: self.accessor.to_string(),
                    guard: self.guard_style(false),
                    target: None,
                });
                steps.extend(self.allocs.clone());
                steps.push(BindingStep::DirectRead {
                    target: self.target.to_string(),
                    expr: conv.cast_expr(&conv.expand(&raw_var)),
                });
                (steps, None)
            }
            ListConvert => {
                let conv = self.conv.expect("list shape has a conversion");
                let mut steps = self.allocs.clone();
                // Loop-body declarations are block-scoped: they shadow any
                // method-level error variable instead of consuming it.
                steps.push(BindingStep::ArrayLoop {
                    target: self.target.to_string(),
                    source: self.accessor.to_string(),
                    elem_convert: conv.expand("item"),
                    elem_cast: conv.cast.clone(),
                    has_error: conv.has_error,
                    declares_err: conv.has_error,
                    web_name: self.web.to_string(),
                });
                let fail = conv.has_error.then(|| BadArgument {
                    web_name: self.web.to_string(),
                    raw: "item".to_string(),
                    failure: "err".to_string(),
                });
                (steps, fail)
            }
            PointerRequired => {
                let (mut steps, fail) = self.value_into(&val_var, &raw_var);
                steps.extend(self.allocs.clone());
                steps.push(BindingStep::PointerBox {
                    target: self.target.to_string(),
                    value: val_var.clone(),
                });
                (steps, fail)
            }
            PointerGuarded => {
                let mut steps = self.declare(format!("*{}", self.scalar.name));
                steps.push(BindingStep::PresenceGuardedRead {
                    raw_var: raw_var.clone(),
                    accessor: self.accessor.to_string(),
                    guard: self.guard_style(false),
                    target: None,
                });
                let (value_steps, fail) = self.guarded_value_into(&val_var, &raw_var);
                steps.extend(value_steps);
                steps.extend(self.allocs.clone());
                steps.push(BindingStep::PointerBox {
                    target: self.target.to_string(),
                    value: val_var.clone(),
                });
                (steps, fail)
            }
            NullableRequired => {
                let info = self.conversions.nullable_info(self.scalar, self.leaf_at)?;
                let (mut steps, fail) = self.value_into(&val_var, &raw_var);
                steps.extend(self.allocs.clone());
                steps.push(BindingStep::NullableBox {
                    target: self.target.to_string(),
                    wrapper: info.wrapper,
                    value_field: info.value_field,
                    valid_field: info.valid_field,
                    value: val_var.clone(),
                });
                (steps, fail)
            }
            NullableGuarded => {
                let info = self.conversions.nullable_info(self.scalar, self.leaf_at)?;
                let mut steps = self.declare(info.wrapper.clone());
                steps.push(BindingStep::PresenceGuardedRead {
                    raw_var: raw_var.clone(),
                    accessor: self.accessor.to_string(),
                    guard: self.guard_style(false),
                    target: None,
                });
                let (value_steps, fail) = self.guarded_value_into(&val_var, &raw_var);
                steps.extend(value_steps);
                steps.extend(self.allocs.clone());
                steps.push(BindingStep::NullableBox {
                    target: self.target.to_string(),
                    wrapper: info.wrapper,
                    value_field: info.value_field,
                    valid_field: info.valid_field,
                    value: val_var.clone(),
                });
                (steps, fail)
            }
        };
        Ok(out)
    }

    /// Zero-value declaration for a bare local target, so the guard block
    /// can assign it and absence leaves the zero. Field targets live on an
    /// allocated parent and need none.
    fn declare(&self, type_name: String) -> Vec<BindingStep> {
        if self.target.contains('.') {
            return Vec::new();
        }
        vec![BindingStep::DeclareZero {
            target: self.target.to_string(),
            type_name,
        }]
    }

    /// Produce the base value into `val_var`, reading the accessor fresh
    fn value_into(
        &mut self,
        val_var: &str,
        raw_var: &str,
    ) -> (Vec<BindingStep>, Option<BadArgument>) {
        match self.conv {
            Some(conv) if conv.has_error => {
                let read = BindingStep::DirectRead {
                    target: raw_var.to_string(),
                    expr: self.accessor.to_string(),
                };
                let (step, fail) =
                    self.error_checked(val_var, raw_var, conv.expand(raw_var), conv.cast.clone());
                (vec![read, step], Some(fail))
            }
            Some(conv) if !conv.is_identity() => (
                vec![BindingStep::DirectRead {
                    target: val_var.to_string(),
                    expr: conv.cast_expr(&conv.expand(self.accessor)),
                }],
                None,
            ),
            _ => (
                vec![BindingStep::DirectRead {
                    target: val_var.to_string(),
                    expr: self.accessor.to_string(),
                }],
                None,
            ),
        }
    }

    /// Produce the base value into `val_var` from an already-guarded
    /// `raw_var`
    fn guarded_value_into(
        &self,
        val_var: &str,
        raw_var: &str,
    ) -> (Vec<BindingStep>, Option<BadArgument>) {
        match self.conv {
            Some(conv) if conv.has_error => {
                let (step, fail) = self.guard_scoped_convert(
                    val_var,
                    raw_var,
                    conv.expand(raw_var),
                    conv.cast.clone(),
                );
                (vec![step], Some(fail))
            }
            Some(conv) if !conv.is_identity() => (
                vec![BindingStep::DirectRead {
                    target: val_var.to_string(),
                    expr: conv.cast_expr(&conv.expand(raw_var)),
                }],
                None,
            ),
            _ => (
                vec![BindingStep::DirectRead {
                    target: val_var.to_string(),
                    expr: raw_var.to_string(),
                }],
                None,
            ),
        }
    }

    /// Error-checked conversion inside a guard or loop block. `:=` there
    /// shadows any method-level error variable, so the method flag is left
    /// untouched.
    fn guard_scoped_convert(
        &self,
        target: &str,
        raw: &str,
        convert: String,
        cast: Option<String>,
    ) -> (BindingStep, BadArgument) {
        let step = BindingStep::ErrorCheckedConvert {
            target: target.to_string(),
            raw: raw.to_string(),
            convert,
            cast,
            declares_err: true,
            web_name: self.web.to_string(),
        };
        let fail = BadArgument {
            web_name: self.web.to_string(),
            raw: raw.to_string(),
            failure: "err".to_string(),
        };
        (step, fail)
    }

    fn error_checked(
        &mut self,
        target: &str,
        raw: &str,
        convert: String,
        cast: Option<String>,
    ) -> (BindingStep, BadArgument) {
        let declares_err = !*self.err_declared;
        *self.err_declared = true;
        let step = BindingStep::ErrorCheckedConvert {
            target: target.to_string(),
            raw: raw.to_string(),
            convert,
            cast,
            declares_err,
            web_name: self.web.to_string(),
        };
        let fail = BadArgument {
            web_name: self.web.to_string(),
            raw: raw.to_string(),
            failure: "err".to_string(),
        };
        (step, fail)
    }

    fn guard_style(&self, seq: bool) -> GuardStyle {
        if self.inv.result_is_bool {
            GuardStyle::OkBool
        } else if seq || self.inv.is_array {
            GuardStyle::NonEmptySeq
        } else {
            GuardStyle::NonEmpty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        FieldDescriptor, MethodDescriptor, ParameterDescriptor, RecordDescriptor, Route,
        ScalarType, SourceHints,
    };

    fn scalar(name: &str) -> TypeShape {
        TypeShape::Scalar {
            scalar: ScalarType::plain(name),
        }
    }

    fn param(name: &str, shape: TypeShape) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.into(),
            shape,
            hints: SourceHints::default(),
        }
    }

    fn method(verb: HttpVerb, path: &str, parameters: Vec<ParameterDescriptor>) -> MethodDescriptor {
        MethodDescriptor {
            name: "m".into(),
            routes: vec![Route {
                verb,
                path: path.into(),
            }],
            parameters,
            results: vec![],
            content_type: None,
        }
    }

    fn iface_with(methods: Vec<MethodDescriptor>) -> InterfaceDescriptor {
        InterfaceDescriptor {
            name: "Svc".into(),
            records: vec![],
            methods,
        }
    }

    fn synthesize(m: MethodDescriptor) -> MethodBinding {
        let iface = iface_with(vec![m.clone()]);
        let catalog = InvocationCatalog::echo();
        let conversions = ConversionSelector::default();
        BindingPlanSynthesizer::new(&iface, &catalog, &conversions)
            .synthesize_method(&m)
            .unwrap()
    }

    #[test]
    fn test_concat2_string_path_parameters_are_direct() {
        // Template /concat2/:a/:b with string parameters a, b: both are
        // required path leaves with a plain declare-and-assign plan.
        let binding = synthesize(method(
            HttpVerb::Get,
            "/concat2/:a/:b",
            vec![param("a", scalar("string")), param("b", scalar("string"))],
        ));
        assert_eq!(binding.plans.len(), 2);
        for plan in &binding.plans {
            assert_eq!(plan.source, ParamSource::Path);
            assert_eq!(plan.shape, Some(BindingShape::Direct));
            assert_eq!(plan.steps.len(), 1);
            assert!(plan.fail.is_none());
        }
        assert_eq!(
            binding.plans[0].steps[0],
            BindingStep::DirectRead {
                target: "a".into(),
                expr: "c.Param(\"a\")".into(),
            }
        );
    }

    #[test]
    fn test_optional_pointer_int64_is_pointer_guarded_convert() {
        // Parameter `id *int64`, query, optional: pointer promotion with an
        // error-checked convert and no cast; absence leaves the pointer nil.
        let binding = synthesize(method(
            HttpVerb::Get,
            "/things",
            vec![param(
                "id",
                TypeShape::Pointer {
                    scalar: ScalarType::plain("int64"),
                },
            )],
        ));
        let plan = &binding.plans[0];
        assert_eq!(plan.shape, Some(BindingShape::PointerGuarded));
        assert_eq!(plan.steps.len(), 4);
        // The nil pointer is declared ahead of the guard, so absence leaves
        // it nil in the enclosing scope.
        assert_eq!(
            plan.steps[0],
            BindingStep::DeclareZero {
                target: "id".into(),
                type_name: "*int64".into(),
            }
        );
        assert!(matches!(
            &plan.steps[1],
            BindingStep::PresenceGuardedRead {
                guard: GuardStyle::NonEmpty,
                target: None,
                ..
            }
        ));
        match &plan.steps[2] {
            BindingStep::ErrorCheckedConvert { convert, cast, .. } => {
                assert_eq!(convert, "strconv.ParseInt(idRaw, 10, 64)");
                assert_eq!(cast, &None);
            }
            other => panic!("expected error-checked convert, got {:?}", other),
        }
        assert!(matches!(
            &plan.steps[3],
            BindingStep::PointerBox { value, .. } if value == "idVal"
        ));
        assert_eq!(plan.fail.as_ref().unwrap().failure, "err");
    }

    #[test]
    fn test_optional_nullable_bool_is_nullable_guarded() {
        // A nullable-boolean query parameter, optional: presence-guarded
        // parse sets the value slot and validity flag; absence leaves the
        // zero wrapper.
        let binding = synthesize(method(
            HttpVerb::Get,
            "/things",
            vec![param(
                "active",
                TypeShape::Nullable {
                    scalar: ScalarType::plain("bool"),
                },
            )],
        ));
        let plan = &binding.plans[0];
        assert_eq!(plan.shape, Some(BindingShape::NullableGuarded));
        assert_eq!(
            plan.steps[0],
            BindingStep::DeclareZero {
                target: "active".into(),
                type_name: "sql.NullBool".into(),
            }
        );
        match plan.steps.last().unwrap() {
            BindingStep::NullableBox {
                wrapper,
                value_field,
                valid_field,
                ..
            } => {
                assert_eq!(wrapper, "sql.NullBool");
                assert_eq!(value_field, "Bool");
                assert_eq!(valid_field, "Valid");
            }
            other => panic!("expected nullable box, got {:?}", other),
        }
    }

    #[test]
    fn test_required_int32_casts_after_check() {
        let binding = synthesize(method(
            HttpVerb::Get,
            "/things/:n",
            vec![param("n", scalar("int32"))],
        ));
        let plan = &binding.plans[0];
        assert_eq!(plan.shape, Some(BindingShape::Convert));
        match &plan.steps[1] {
            BindingStep::ErrorCheckedConvert { cast, declares_err, .. } => {
                assert_eq!(cast.as_deref(), Some("int32"));
                assert!(declares_err);
            }
            other => panic!("expected error-checked convert, got {:?}", other),
        }
    }

    #[test]
    fn test_error_variable_declared_once_per_method() {
        let binding = synthesize(method(
            HttpVerb::Get,
            "/sum/:a/:b",
            vec![param("a", scalar("int64")), param("b", scalar("int64"))],
        ));
        let declares: Vec<bool> = binding
            .plans
            .iter()
            .flat_map(|p| &p.steps)
            .filter_map(|s| match s {
                BindingStep::ErrorCheckedConvert { declares_err, .. } => Some(*declares_err),
                _ => None,
            })
            .collect();
        assert_eq!(declares, vec![true, false]);
    }

    #[test]
    fn test_gin_optional_query_guards_on_ok_bool() {
        let m = method(HttpVerb::Get, "/find", vec![param("q", scalar("string"))]);
        let iface = iface_with(vec![m.clone()]);
        let catalog = InvocationCatalog::gin();
        let conversions = ConversionSelector::default();
        let binding = BindingPlanSynthesizer::new(&iface, &catalog, &conversions)
            .synthesize_method(&m)
            .unwrap();
        let plan = &binding.plans[0];
        assert_eq!(plan.shape, Some(BindingShape::Guarded));
        assert!(matches!(
            &plan.steps[0],
            BindingStep::DeclareZero { type_name, .. } if type_name == "string"
        ));
        assert!(matches!(
            &plan.steps[1],
            BindingStep::PresenceGuardedRead {
                guard: GuardStyle::OkBool,
                ..
            }
        ));
    }

    #[test]
    fn test_int64_array_is_list_convert() {
        let binding = synthesize(method(
            HttpVerb::Get,
            "/sum",
            vec![param(
                "ns",
                TypeShape::Array {
                    elem: ScalarType::plain("int64"),
                },
            )],
        ));
        let plan = &binding.plans[0];
        assert_eq!(plan.shape, Some(BindingShape::ListConvert));
        match &plan.steps[0] {
            BindingStep::ArrayLoop {
                elem_convert,
                has_error,
                ..
            } => {
                assert_eq!(elem_convert, "strconv.ParseInt(item, 10, 64)");
                assert!(has_error);
            }
            other => panic!("expected array loop, got {:?}", other),
        }
    }

    #[test]
    fn test_string_array_is_guarded_list() {
        let binding = synthesize(method(
            HttpVerb::Get,
            "/find",
            vec![param(
                "tags",
                TypeShape::Array {
                    elem: ScalarType::plain("string"),
                },
            )],
        ));
        let plan = &binding.plans[0];
        assert_eq!(plan.shape, Some(BindingShape::GuardedList));
        assert!(matches!(
            &plan.steps[0],
            BindingStep::DeclareZero { type_name, .. } if type_name == "[]string"
        ));
        assert!(matches!(
            &plan.steps[1],
            BindingStep::PresenceGuardedRead {
                guard: GuardStyle::NonEmptySeq,
                target: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_post_unmapped_scalars_aggregate_into_body() {
        let binding = synthesize(method(
            HttpVerb::Post,
            "/create",
            vec![param("name", scalar("string")), param("age", scalar("int32"))],
        ));
        assert_eq!(binding.plans.len(), 2);
        for plan in &binding.plans {
            assert_eq!(plan.source, ParamSource::Body);
            assert!(matches!(
                &plan.steps[0],
                BindingStep::BodyBind { aggregate: true, .. }
            ));
        }
    }

    fn field(name: &str, shape: TypeShape) -> FieldDescriptor {
        FieldDescriptor {
            name: name.into(),
            shape,
            tag: None,
            embedded: false,
            omit_empty: false,
        }
    }

    fn outer_inner_records(inner_field: FieldDescriptor) -> Vec<RecordDescriptor> {
        vec![
            RecordDescriptor {
                name: "Outer".into(),
                fields: vec![field(
                    "Inner",
                    TypeShape::PointerRecord {
                        record: "Inner".into(),
                    },
                )],
            },
            RecordDescriptor {
                name: "Inner".into(),
                fields: vec![inner_field],
            },
        ]
    }

    #[test]
    fn test_body_leaf_under_pointer_ancestor_allocates_first() {
        // A nested field beneath a pointer-record ancestor defaults to body
        // on POST; the ancestor must be allocated before the body decode
        // writes beneath it.
        let m = method(
            HttpVerb::Post,
            "/create",
            vec![param("p", TypeShape::Record { record: "Outer".into() })],
        );
        let iface = InterfaceDescriptor {
            name: "Svc".into(),
            records: outer_inner_records(field("Limit", scalar("int32"))),
            methods: vec![m.clone()],
        };
        let catalog = InvocationCatalog::echo();
        let conversions = ConversionSelector::default();
        let binding = BindingPlanSynthesizer::new(&iface, &catalog, &conversions)
            .synthesize_method(&m)
            .unwrap();
        let plan = &binding.plans[0];
        assert_eq!(plan.source, ParamSource::Body);
        assert_eq!(
            plan.steps[0],
            BindingStep::AllocateParent {
                access: "p.Inner".into(),
                type_name: "Inner".into(),
                guarded: false,
            }
        );
        assert!(matches!(&plan.steps[1], BindingStep::BodyBind { .. }));
    }

    #[test]
    fn test_map_leaf_under_pointer_ancestor_allocates_first() {
        let m = method(
            HttpVerb::Get,
            "/find",
            vec![param("p", TypeShape::Record { record: "Outer".into() })],
        );
        let iface = InterfaceDescriptor {
            name: "Svc".into(),
            records: outer_inner_records(field(
                "Extra",
                TypeShape::Map {
                    elem: ScalarType::plain("string"),
                },
            )),
            methods: vec![m.clone()],
        };
        let catalog = InvocationCatalog::echo();
        let conversions = ConversionSelector::default();
        let binding = BindingPlanSynthesizer::new(&iface, &catalog, &conversions)
            .synthesize_method(&m)
            .unwrap();
        let plan = &binding.plans[0];
        assert!(matches!(&plan.steps[0], BindingStep::AllocateParent { .. }));
        assert!(matches!(
            &plan.steps[1],
            BindingStep::StructFieldScan { target, .. } if target == "p.Inner.Extra"
        ));
    }

    #[test]
    fn test_reserved_parameter_aliases_context() {
        let binding = synthesize(method(
            HttpVerb::Get,
            "/find",
            vec![param(
                "ctx",
                TypeShape::Reserved {
                    name: "echo.Context".into(),
                },
            )],
        ));
        assert_eq!(
            binding.plans[0].steps[0],
            BindingStep::ReservedAlias {
                target: "ctx".into(),
                alias: "c".into(),
            }
        );
    }

    #[test]
    fn test_route_rendered_in_destination_notation() {
        let m = method(HttpVerb::Get, "/things/:id", vec![param("id", scalar("string"))]);
        let iface = iface_with(vec![m.clone()]);
        let catalog = InvocationCatalog::echo();
        let conversions = ConversionSelector::default();
        let binding = BindingPlanSynthesizer::new(&iface, &catalog, &conversions)
            .with_notations(Notation::Colon, Notation::Brace)
            .synthesize_method(&m)
            .unwrap();
        assert_eq!(binding.route, "/things/{id}");
    }

    #[test]
    fn test_identical_inputs_yield_identical_output() {
        let m = method(
            HttpVerb::Get,
            "/things/:id",
            vec![
                param("id", scalar("int64")),
                param(
                    "limit",
                    TypeShape::Pointer {
                        scalar: ScalarType::plain("int32"),
                    },
                ),
            ],
        );
        let a = serde_json::to_string(&synthesize(m.clone())).unwrap();
        let b = serde_json::to_string(&synthesize(m)).unwrap();
        assert_eq!(a, b);
    }
}
