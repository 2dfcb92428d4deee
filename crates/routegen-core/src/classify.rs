//! Source classification: exactly one of path/query/body/reserved per leaf.
//!
//! A path-template placeholder always maps to a required leaf. An explicit
//! body designation names the single body receiver; a second one is an
//! ambiguous annotation, and a body receiver that also matches a placeholder
//! is a schema conflict. Everything else is a query leaf, except that
//! parameters left unmapped on an edit verb (POST/PUT/PATCH/DELETE) default
//! to whole-body aggregation. That default is a deliberate, uniform policy
//! choice; read verbs keep their unmapped parameters in the query string.

// Internal imports (std, crate)
use std::collections::HashSet;

use crate::error::{Error, Position, Result};
use crate::flatten::{LeafBinding, StructFlattener};
use crate::metadata::{InterfaceDescriptor, MethodDescriptor, TypeShape};
use crate::path_template::{ParsedTemplate, QueryRename};
use crate::utils::to_snake_case;

// External imports (alphabetized)
use serde::Serialize;

/// The single request source of one leaf
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSource {
    Path,
    Query,
    Body,
    Reserved,
}

/// A leaf with its resolved source and final web name
#[derive(Clone, Debug, Serialize)]
pub struct ClassifiedLeaf {
    pub leaf: LeafBinding,
    pub source: ParamSource,
    /// Final web name after any query-remap rename
    pub web_name: String,
    /// Path leaves are always required; query leaves never are
    pub required: bool,
}

/// Classify every leaf of a method.
///
/// Record-typed parameters are flattened first (body-designated and
/// reserved parameters bind whole and are not decomposed here).
pub fn classify_method(
    iface: &InterfaceDescriptor,
    method: &MethodDescriptor,
    template: &ParsedTemplate,
    at: &Position,
) -> Result<Vec<ClassifiedLeaf>> {
    let placeholders: HashSet<&str> = template.placeholder_names().into_iter().collect();
    let verb = method.route(at)?.verb;
    let flattener = StructFlattener::new(iface);

    let mut classified = Vec::new();
    let mut matched_placeholders: HashSet<String> = HashSet::new();
    let mut body_designee: Option<String> = None;

    for param in &method.parameters {
        let param_at = at.parameter(&param.name);
        let web_name = param
            .hints
            .web_name
            .clone()
            .unwrap_or_else(|| to_snake_case(&param.name));

        // Reserved parameter types bind directly to framework values.
        if let TypeShape::Reserved { .. } = &param.shape {
            classified.push(ClassifiedLeaf {
                leaf: whole_leaf(param.name.clone(), web_name.clone(), param.shape.clone()),
                source: ParamSource::Reserved,
                web_name,
                required: false,
            });
            continue;
        }

        // Explicit body designation binds the parameter whole.
        if param.hints.body {
            if let Some(previous) = &body_designee {
                return Err(Error::ambiguous_annotation(
                    format!(
                        "both `{}` and `{}` are designated body receivers",
                        previous, param.name
                    ),
                    &param_at,
                ));
            }
            if placeholders.contains(web_name.as_str()) {
                return Err(Error::schema_conflict(
                    format!("`{}` resolves to both path and body", param.name),
                    &param_at,
                ));
            }
            body_designee = Some(param.name.clone());
            classified.push(ClassifiedLeaf {
                leaf: whole_leaf(param.name.clone(), web_name.clone(), param.shape.clone()),
                source: ParamSource::Body,
                web_name,
                required: false,
            });
            continue;
        }

        for leaf in flattener.flatten(param, at)? {
            let leaf_at = at.parameter(&leaf.access);

            if let TypeShape::Reserved { .. } = &leaf.shape {
                let web_name = leaf.web_name.clone();
                classified.push(ClassifiedLeaf {
                    leaf,
                    source: ParamSource::Reserved,
                    web_name,
                    required: false,
                });
                continue;
            }

            // Placeholder match wins: a matched leaf is path, required.
            if placeholders.contains(leaf.web_name.as_str()) {
                if !matched_placeholders.insert(leaf.web_name.clone()) {
                    return Err(Error::schema_conflict(
                        format!("placeholder `{}` matched by more than one leaf", leaf.web_name),
                        &leaf_at,
                    ));
                }
                let web_name = leaf.web_name.clone();
                classified.push(ClassifiedLeaf {
                    leaf,
                    source: ParamSource::Path,
                    web_name,
                    required: true,
                });
                continue;
            }

            // Template remap table and suppression hints.
            let mut web_name = leaf.web_name.clone();
            match template.query_rename(&leaf.web_name) {
                Some(QueryRename::Suppress) => {
                    log::debug!("suppressing `{}` from query", leaf.web_name);
                    continue;
                }
                Some(QueryRename::Rename(renamed)) => web_name = renamed.clone(),
                Some(QueryRename::Keep) | None => {}
            }
            if param.hints.suppress {
                continue;
            }

            // Multi-value map fields scan query keys under their prefix.
            let source = if matches!(leaf.shape, TypeShape::Map { .. }) {
                ParamSource::Query
            } else if verb.is_edit() {
                ParamSource::Body
            } else {
                ParamSource::Query
            };
            classified.push(ClassifiedLeaf {
                leaf,
                source,
                web_name,
                required: false,
            });
        }
    }

    // A placeholder always maps to a required leaf; an unmatched one means
    // the metadata source dropped a parameter.
    for placeholder in &placeholders {
        if !matched_placeholders.contains(*placeholder) {
            return Err(Error::missing_metadata(
                format!("parameter for path placeholder `{}`", placeholder),
                at,
            ));
        }
    }

    Ok(classified)
}

fn whole_leaf(parameter: String, web_name: String, shape: TypeShape) -> LeafBinding {
    LeafBinding {
        access: parameter.clone(),
        parameter,
        web_name,
        shape,
        omit_empty: false,
        default: None,
        parent_inits: Vec::new(),
    }
}
