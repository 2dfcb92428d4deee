//! Rendering of synthesized plans into target-language statements.
//!
//! `StepRenderer` is the seam between synthesis and emission: one method per
//! binding step, with the dispatch and guard bookkeeping provided. Template
//! engines or framework-specific emitters implement the trait; the
//! `PlainRenderer` here produces plain Go-style statements and doubles as
//! the rendering used by the command-line `render` output.

// Internal imports (std, crate)
use crate::plan::{BadArgument, BindingPlan, BindingStep, GuardStyle};

/// Renders one binding step at a time into target-language statements.
///
/// `render_plan` drives the dispatch: a presence guard opens a block over
/// all following steps of the same plan, and the block is closed after the
/// last one.
pub trait StepRenderer {
    fn allocate_parent(&self, access: &str, type_name: &str, guarded: bool) -> Vec<String>;
    fn declare_zero(&self, target: &str, type_name: &str) -> Vec<String>;
    /// `declared` is set when an earlier step of the plan declared the
    /// target at its zero value, so the write assigns instead of declaring
    fn direct_read(&self, target: &str, expr: &str, declared: bool) -> Vec<String>;
    fn presence_guarded_read(
        &self,
        raw_var: &str,
        accessor: &str,
        guard: GuardStyle,
        target: Option<&str>,
    ) -> Vec<String>;
    fn error_checked_convert(
        &self,
        target: &str,
        raw: &str,
        convert: &str,
        cast: Option<&str>,
        declares_err: bool,
        fail: Option<&BadArgument>,
    ) -> Vec<String>;
    fn bool_checked_convert(
        &self,
        target: &str,
        accessor: &str,
        ok_var: &str,
        cast: Option<&str>,
        fail: Option<&BadArgument>,
    ) -> Vec<String>;
    fn pointer_box(&self, target: &str, value: &str, declared: bool) -> Vec<String>;
    fn nullable_box(
        &self,
        target: &str,
        wrapper: &str,
        value_field: &str,
        valid_field: &str,
        value: &str,
        declared: bool,
    ) -> Vec<String>;
    fn array_loop(
        &self,
        target: &str,
        source: &str,
        elem_convert: &str,
        elem_cast: Option<&str>,
        has_error: bool,
        fail: Option<&BadArgument>,
    ) -> Vec<String>;
    fn body_bind(
        &self,
        target: &str,
        web_name: &str,
        aggregate: bool,
        content_type: Option<&str>,
    ) -> Vec<String>;
    fn reserved_alias(&self, target: &str, alias: &str) -> Vec<String>;
    fn struct_field_scan(&self, target: &str, prefix: &str) -> Vec<String>;

    /// Statement indentation unit
    fn indent(&self) -> &str {
        "\t"
    }

    /// Dispatch one step to its variant method
    fn render_step(&self, step: &BindingStep, plan: &BindingPlan) -> Vec<String> {
        match step {
            BindingStep::AllocateParent {
                access,
                type_name,
                guarded,
            } => self.allocate_parent(access, type_name, *guarded),
            BindingStep::DeclareZero { target, type_name } => {
                self.declare_zero(target, type_name)
            }
            BindingStep::DirectRead { target, expr } => {
                self.direct_read(target, expr, target_declared(plan, target))
            }
            BindingStep::PresenceGuardedRead {
                raw_var,
                accessor,
                guard,
                target,
            } => self.presence_guarded_read(raw_var, accessor, *guard, target.as_deref()),
            BindingStep::ErrorCheckedConvert {
                target,
                raw,
                convert,
                cast,
                declares_err,
                ..
            } => self.error_checked_convert(
                target,
                raw,
                convert,
                cast.as_deref(),
                *declares_err,
                plan.fail.as_ref(),
            ),
            BindingStep::BoolCheckedConvert {
                target,
                accessor,
                ok_var,
                cast,
                ..
            } => self.bool_checked_convert(
                target,
                accessor,
                ok_var,
                cast.as_deref(),
                plan.fail.as_ref(),
            ),
            BindingStep::PointerBox { target, value } => {
                self.pointer_box(target, value, target_declared(plan, target))
            }
            BindingStep::NullableBox {
                target,
                wrapper,
                value_field,
                valid_field,
                value,
            } => self.nullable_box(
                target,
                wrapper,
                value_field,
                valid_field,
                value,
                target_declared(plan, target),
            ),
            BindingStep::ArrayLoop {
                target,
                source,
                elem_convert,
                elem_cast,
                has_error,
                ..
            } => self.array_loop(
                target,
                source,
                elem_convert,
                elem_cast.as_deref(),
                *has_error,
                plan.fail.as_ref(),
            ),
            BindingStep::BodyBind {
                target,
                aggregate,
                content_type,
            } => self.body_bind(target, &plan.web_name, *aggregate, content_type.as_deref()),
            BindingStep::ReservedAlias { target, alias } => self.reserved_alias(target, alias),
            BindingStep::StructFieldScan { target, prefix } => {
                self.struct_field_scan(target, prefix)
            }
        }
    }

    /// Render one whole plan, closing any guard block a guarded read opened
    fn render_plan(&self, plan: &BindingPlan) -> Vec<String> {
        let mut lines = Vec::new();
        let mut depth = 0usize;
        for step in &plan.steps {
            let opens_guard = matches!(
                step,
                BindingStep::PresenceGuardedRead { target: None, .. }
            );
            for line in self.render_step(step, plan) {
                lines.push(format!("{}{}", self.indent().repeat(depth), line));
            }
            if opens_guard {
                depth += 1;
            }
        }
        for d in (0..depth).rev() {
            lines.push(format!("{}}}", self.indent().repeat(d)));
        }
        lines
    }
}

/// Whether an earlier step of the plan declared this target at its zero value
fn target_declared(plan: &BindingPlan, target: &str) -> bool {
    plan.steps.iter().any(|step| {
        matches!(step, BindingStep::DeclareZero { target: declared, .. } if declared == target)
    })
}

/// Reference renderer producing plain Go-style statements
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainRenderer;

impl PlainRenderer {
    // Field targets and pre-declared locals assign; fresh bare locals declare.
    fn assign_op(target: &str, declared: bool) -> &'static str {
        if declared || target.contains('.') {
            "="
        } else {
            ":="
        }
    }

    fn fail_return(fail: Option<&BadArgument>) -> String {
        match fail {
            Some(fail) => format!(
                "return badArgument({:?}, {}, {})",
                fail.web_name, fail.raw, fail.failure
            ),
            None => "return errBadArgument".to_string(),
        }
    }
}

impl StepRenderer for PlainRenderer {
    fn allocate_parent(&self, access: &str, type_name: &str, guarded: bool) -> Vec<String> {
        let alloc = format!("{} = &{}{{}}", access, type_name);
        if guarded {
            vec![format!("if {} == nil {{ {} }}", access, alloc)]
        } else {
            vec![alloc]
        }
    }

    fn declare_zero(&self, target: &str, type_name: &str) -> Vec<String> {
        vec![format!("var {} {}", target, type_name)]
    }

    fn direct_read(&self, target: &str, expr: &str, declared: bool) -> Vec<String> {
        vec![format!(
            "{} {} {}",
            target,
            Self::assign_op(target, declared),
            expr
        )]
    }

    fn presence_guarded_read(
        &self,
        raw_var: &str,
        accessor: &str,
        guard: GuardStyle,
        target: Option<&str>,
    ) -> Vec<String> {
        let (read, condition) = match guard {
            GuardStyle::NonEmpty => (
                format!("{} := {}", raw_var, accessor),
                format!("{} != \"\"", raw_var),
            ),
            GuardStyle::NonEmptySeq => (
                format!("{} := {}", raw_var, accessor),
                format!("len({}) > 0", raw_var),
            ),
            GuardStyle::OkBool => (
                format!("{}, ok := {}", raw_var, accessor),
                "ok".to_string(),
            ),
        };
        match target {
            Some(target) => vec![
                read,
                format!("if {} {{", condition),
                format!("\t{} = {}", target, raw_var),
                "}".to_string(),
            ],
            None => vec![read, format!("if {} {{", condition)],
        }
    }

    fn error_checked_convert(
        &self,
        target: &str,
        raw: &str,
        convert: &str,
        cast: Option<&str>,
        _declares_err: bool,
        fail: Option<&BadArgument>,
    ) -> Vec<String> {
        match cast {
            Some(cast) => {
                // The 64-bit parse result lands in a temporary; the cast
                // happens after the error check. `:=` is always legal here
                // since the temporary is a fresh variable.
                let tmp = format!("{}64", raw.trim_end_matches("Raw"));
                vec![
                    format!("{}, err := {}", tmp, convert),
                    format!("if err != nil {{ {} }}", Self::fail_return(fail)),
                    format!(
                        "{} {} {}({})",
                        target,
                        Self::assign_op(target, false),
                        cast,
                        tmp
                    ),
                ]
            }
            None => vec![
                format!(
                    "{}, err {} {}",
                    target,
                    Self::assign_op(target, false),
                    convert
                ),
                format!("if err != nil {{ {} }}", Self::fail_return(fail)),
            ],
        }
    }

    fn bool_checked_convert(
        &self,
        target: &str,
        accessor: &str,
        ok_var: &str,
        cast: Option<&str>,
        fail: Option<&BadArgument>,
    ) -> Vec<String> {
        let mut lines = vec![
            format!("{}, {} := {}", target, ok_var, accessor),
            format!("if !{} {{ {} }}", ok_var, Self::fail_return(fail)),
        ];
        if let Some(cast) = cast {
            lines.push(format!("{} = {}({})", target, cast, target));
        }
        lines
    }

    fn pointer_box(&self, target: &str, value: &str, declared: bool) -> Vec<String> {
        vec![format!(
            "{} {} &{}",
            target,
            Self::assign_op(target, declared),
            value
        )]
    }

    fn nullable_box(
        &self,
        target: &str,
        wrapper: &str,
        value_field: &str,
        valid_field: &str,
        value: &str,
        declared: bool,
    ) -> Vec<String> {
        vec![format!(
            "{} {} {}{{{}: {}, {}: true}}",
            target,
            Self::assign_op(target, declared),
            wrapper,
            value_field,
            value,
            valid_field
        )]
    }

    fn array_loop(
        &self,
        target: &str,
        source: &str,
        elem_convert: &str,
        elem_cast: Option<&str>,
        has_error: bool,
        fail: Option<&BadArgument>,
    ) -> Vec<String> {
        let mut lines = vec![format!("for _, item := range {} {{", source)];
        let append_value = match elem_cast {
            Some(cast) => format!("{}(v)", cast),
            None => "v".to_string(),
        };
        if has_error {
            lines.push(format!("\tv, err := {}", elem_convert));
            lines.push(format!(
                "\tif err != nil {{ {} }}",
                Self::fail_return(fail)
            ));
        } else {
            lines.push(format!("\tv := {}", elem_convert));
        }
        lines.push(format!(
            "\t{} = append({}, {})",
            target, target, append_value
        ));
        lines.push("}".to_string());
        lines
    }

    fn body_bind(
        &self,
        target: &str,
        web_name: &str,
        aggregate: bool,
        _content_type: Option<&str>,
    ) -> Vec<String> {
        if aggregate {
            // The shared `body` map is decoded once per handler, before the
            // per-parameter plans run.
            vec![format!("{} = body[{:?}]", target, web_name)]
        } else {
            vec![format!(
                "if err := bindBody(r, &{}); err != nil {{ return err }}",
                target
            )]
        }
    }

    fn reserved_alias(&self, target: &str, alias: &str) -> Vec<String> {
        vec![format!("{} := {}", target, alias)]
    }

    fn struct_field_scan(&self, target: &str, prefix: &str) -> Vec<String> {
        vec![format!(
            "{} {} queryByPrefix(query, {:?})",
            target,
            Self::assign_op(target, false),
            prefix
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConversionSelector;
    use crate::invocation::InvocationCatalog;
    use crate::metadata::{
        HttpVerb, InterfaceDescriptor, MethodDescriptor, ParameterDescriptor, Route, ScalarType,
        SourceHints, TypeShape,
    };
    use crate::server::BindingPlanSynthesizer;

    fn plans_for(path: &str, verb: HttpVerb, parameters: Vec<ParameterDescriptor>) -> Vec<BindingPlan> {
        let method = MethodDescriptor {
            name: "m".into(),
            routes: vec![Route {
                verb,
                path: path.into(),
            }],
            parameters,
            results: vec![],
            content_type: None,
        };
        let iface = InterfaceDescriptor {
            name: "Svc".into(),
            records: vec![],
            methods: vec![method.clone()],
        };
        let catalog = InvocationCatalog::echo();
        let conversions = ConversionSelector::default();
        BindingPlanSynthesizer::new(&iface, &catalog, &conversions)
            .synthesize_method(&method)
            .unwrap()
            .plans
    }

    fn param(name: &str, shape: TypeShape) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.into(),
            shape,
            hints: SourceHints::default(),
        }
    }

    fn scalar(name: &str) -> TypeShape {
        TypeShape::Scalar {
            scalar: ScalarType::plain(name),
        }
    }

    #[test]
    fn test_render_direct_path_read() {
        let plans = plans_for("/concat2/:a", HttpVerb::Get, vec![param("a", scalar("string"))]);
        let lines = PlainRenderer.render_plan(&plans[0]);
        assert_eq!(lines, vec!["a := c.Param(\"a\")"]);
    }

    #[test]
    fn test_render_required_convert_with_cast() {
        let plans = plans_for("/things/:n", HttpVerb::Get, vec![param("n", scalar("int32"))]);
        let lines = PlainRenderer.render_plan(&plans[0]);
        assert_eq!(
            lines,
            vec![
                "nRaw := c.Param(\"n\")",
                "n64, err := strconv.ParseInt(nRaw, 10, 64)",
                "if err != nil { return badArgument(\"n\", nRaw, err) }",
                "n := int32(n64)",
            ]
        );
    }

    #[test]
    fn test_render_guarded_query_closes_block() {
        let plans = plans_for(
            "/find",
            HttpVerb::Get,
            vec![param(
                "limit",
                TypeShape::Pointer {
                    scalar: ScalarType::plain("int64"),
                },
            )],
        );
        let lines = PlainRenderer.render_plan(&plans[0]);
        assert_eq!(
            lines,
            vec![
                "var limit *int64",
                "limitRaw := c.QueryParam(\"limit\")",
                "if limitRaw != \"\" {",
                "\tlimitVal, err := strconv.ParseInt(limitRaw, 10, 64)",
                "\tif err != nil { return badArgument(\"limit\", limitRaw, err) }",
                "\tlimit = &limitVal",
                "}",
            ]
        );
    }

    #[test]
    fn test_render_optional_scalar_outlives_its_guard() {
        let plans = plans_for("/find", HttpVerb::Get, vec![param("q", scalar("string"))]);
        let lines = PlainRenderer.render_plan(&plans[0]);
        assert_eq!(
            lines,
            vec![
                "var q string",
                "qRaw := c.QueryParam(\"q\")",
                "if qRaw != \"\" {",
                "\tq = qRaw",
                "}",
            ]
        );
    }

    #[test]
    fn test_render_nullable_box() {
        let plans = plans_for(
            "/find",
            HttpVerb::Get,
            vec![param(
                "active",
                TypeShape::Nullable {
                    scalar: ScalarType::plain("bool"),
                },
            )],
        );
        let lines = PlainRenderer.render_plan(&plans[0]);
        assert_eq!(lines[0], "var active sql.NullBool");
        assert!(lines
            .iter()
            .any(|l| l.contains("sql.NullBool{Bool: activeVal, Valid: true}")));
        assert_eq!(lines.last().unwrap(), "}");
    }

    #[test]
    fn test_render_array_loop() {
        let plans = plans_for(
            "/sum",
            HttpVerb::Get,
            vec![param(
                "ns",
                TypeShape::Array {
                    elem: ScalarType::plain("int64"),
                },
            )],
        );
        let lines = PlainRenderer.render_plan(&plans[0]);
        assert_eq!(lines[0], "for _, item := range c.QueryParams()[\"ns\"] {");
        assert!(lines[1].contains("strconv.ParseInt(item, 10, 64)"));
        assert!(lines[3].contains("append(ns, v)"));
    }
}
