//! Recursive expansion of record-typed parameters into leaf bindings.
//!
//! A record parameter decomposes into one leaf per reachable non-record,
//! non-ignored field. Anonymous/embedded fields inherit the current web-name
//! prefix unchanged; named fields extend the prefix with a tag-derived or
//! case-converted field name and extend the access path with
//! `parent.Field`. Pointer-typed ancestors are tracked so the synthesizer
//! can allocate them at most once, lazily, immediately before the first
//! write beneath them.
//!
//! Flattening never silently drops a field: a reachable record missing from
//! the registry is fatal `MissingMetadata`, and a field reachable through
//! two embedding paths (or a recursive record) is rejected with
//! `SchemaConflict` rather than merged in an unspecified order.

// Internal imports (std, crate)
use std::collections::HashSet;

use crate::error::{Error, Position, Result};
use crate::metadata::{InterfaceDescriptor, ParameterDescriptor, TypeShape};
use crate::utils::to_snake_case;

// External imports (alphabetized)
use serde::Serialize;

/// Lazy-allocation record for one pointer-typed ancestor of a leaf
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParentInit {
    /// Access path of the pointer ancestor, e.g. `p.Inner`
    pub access: String,
    /// Record type to allocate
    pub type_name: String,
    /// This leaf performs the first write beneath the ancestor
    pub first_write: bool,
}

/// One leaf binding produced by flattening
#[derive(Clone, Debug, Serialize)]
pub struct LeafBinding {
    /// Name of the owning top-level parameter
    pub parameter: String,
    /// Web-visible name (prefix-joined for nested fields)
    pub web_name: String,
    /// Target access path, e.g. `filter.Inner.Limit`
    pub access: String,
    /// Leaf type shape (never a record)
    pub shape: TypeShape,
    /// Omit from outbound queries when equal to the zero value
    pub omit_empty: bool,
    /// Raw default value from the parameter hints, for default-taking
    /// accessors
    pub default: Option<String>,
    /// Pointer ancestors to allocate before writing this leaf, outermost
    /// first
    pub parent_inits: Vec<ParentInit>,
}

/// Tracks which pointer-typed ancestors have been lazily allocated.
///
/// Scoped to one parameter's record tree; write-once-read-many within that
/// scope and never shared across methods or files.
#[derive(Debug, Default)]
struct ParentInitState {
    allocated: HashSet<String>,
}

impl ParentInitState {
    /// Record a write beneath `access`; returns true on the first write
    fn note_write(&mut self, access: &str) -> bool {
        self.allocated.insert(access.to_string())
    }
}

/// Expands record-typed parameters into leaf bindings
pub struct StructFlattener<'a> {
    iface: &'a InterfaceDescriptor,
}

impl<'a> StructFlattener<'a> {
    pub fn new(iface: &'a InterfaceDescriptor) -> Self {
        Self { iface }
    }

    /// Flatten one parameter into its leaves.
    ///
    /// Non-record parameters yield exactly one leaf. Record parameters
    /// recurse through the registry.
    pub fn flatten(&self, param: &ParameterDescriptor, at: &Position) -> Result<Vec<LeafBinding>> {
        let at = at.parameter(&param.name);
        let web_name = param
            .hints
            .web_name
            .clone()
            .unwrap_or_else(|| to_snake_case(&param.name));

        let record = match param.shape.record_name() {
            Some(record) => record.to_string(),
            None => {
                return Ok(vec![LeafBinding {
                    parameter: param.name.clone(),
                    web_name,
                    access: param.name.clone(),
                    shape: param.shape.clone(),
                    omit_empty: param.hints.omit_empty,
                    default: param.hints.default.clone(),
                    parent_inits: Vec::new(),
                }]);
            }
        };

        let mut walker = Walker {
            iface: self.iface,
            parameter: param.name.clone(),
            state: ParentInitState::default(),
            seen_web: HashSet::new(),
            open: Vec::new(),
            out: Vec::new(),
        };

        let mut ancestors = Vec::new();
        if matches!(param.shape, TypeShape::PointerRecord { .. }) {
            ancestors.push((param.name.clone(), record.clone()));
        }
        walker.walk(&record, "", &param.name, &mut ancestors, &at)?;
        Ok(walker.out)
    }
}

struct Walker<'a> {
    iface: &'a InterfaceDescriptor,
    parameter: String,
    state: ParentInitState,
    seen_web: HashSet<String>,
    /// Record names on the open recursion path, for cycle rejection
    open: Vec<String>,
    out: Vec<LeafBinding>,
}

impl Walker<'_> {
    fn walk(
        &mut self,
        record_name: &str,
        prefix: &str,
        access: &str,
        ancestors: &mut Vec<(String, String)>,
        at: &Position,
    ) -> Result<()> {
        if self.open.iter().any(|open| open == record_name) {
            return Err(Error::schema_conflict(
                format!("record `{}` is reachable twice along one path", record_name),
                at,
            ));
        }
        let record = self.iface.record(record_name, at)?.clone();
        self.open.push(record_name.to_string());

        for field in &record.fields {
            if field.skipped() {
                log::debug!("skipping field {}.{} (skip tag)", record_name, field.name);
                continue;
            }
            let field_at = at.parameter(format!("{}.{}", self.parameter, field.name));
            let field_access = format!("{}.{}", access, field.name);

            // Embedded record fields inherit the prefix unchanged.
            let web = if field.embedded && field.shape.record_name().is_some() {
                prefix.to_string()
            } else {
                let name = field
                    .tag
                    .clone()
                    .unwrap_or_else(|| to_snake_case(&field.name));
                if prefix.is_empty() {
                    name
                } else {
                    format!("{}.{}", prefix, name)
                }
            };

            match &field.shape {
                TypeShape::Record { record } => {
                    let record = record.clone();
                    self.walk(&record, &web, &field_access, ancestors, &field_at)?;
                }
                TypeShape::PointerRecord { record } => {
                    let record = record.clone();
                    ancestors.push((field_access.clone(), record.clone()));
                    self.walk(&record, &web, &field_access, ancestors, &field_at)?;
                    ancestors.pop();
                }
                shape => {
                    self.emit_leaf(web, field_access, shape.clone(), field.omit_empty, ancestors, &field_at)?;
                }
            }
        }

        self.open.pop();
        Ok(())
    }

    fn emit_leaf(
        &mut self,
        web_name: String,
        access: String,
        shape: TypeShape,
        omit_empty: bool,
        ancestors: &[(String, String)],
        at: &Position,
    ) -> Result<()> {
        if !web_name.is_empty() && !self.seen_web.insert(web_name.clone()) {
            return Err(Error::schema_conflict(
                format!("web name `{}` is emitted by more than one field", web_name),
                at,
            ));
        }
        let parent_inits = ancestors
            .iter()
            .map(|(access, type_name)| ParentInit {
                access: access.clone(),
                type_name: type_name.clone(),
                first_write: self.state.note_write(access),
            })
            .collect();
        self.out.push(LeafBinding {
            parameter: self.parameter.clone(),
            web_name,
            access,
            shape,
            omit_empty,
            default: None,
            parent_inits,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        FieldDescriptor, ParameterDescriptor, RecordDescriptor, ScalarType, SourceHints,
    };

    fn scalar(name: &str) -> TypeShape {
        TypeShape::Scalar {
            scalar: ScalarType::plain(name),
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

    fn param(name: &str, shape: TypeShape) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.into(),
            shape,
            hints: SourceHints::default(),
        }
    }

    fn iface(records: Vec<RecordDescriptor>) -> InterfaceDescriptor {
        InterfaceDescriptor {
            name: "Svc".into(),
            records,
            methods: vec![],
        }
    }

    fn at() -> Position {
        Position::interface("Svc").method("m")
    }

    #[test]
    fn test_non_record_parameter_is_single_leaf() {
        let iface = iface(vec![]);
        let flattener = StructFlattener::new(&iface);
        let leaves = flattener.flatten(&param("id", scalar("int64")), &at()).unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].web_name, "id");
        assert_eq!(leaves[0].access, "id");
        assert!(leaves[0].parent_inits.is_empty());
    }

    #[test]
    fn test_record_flattens_to_one_leaf_per_field() {
        let iface = iface(vec![RecordDescriptor {
            name: "Filter".into(),
            fields: vec![
                field("Limit", scalar("int32")),
                field("Query", scalar("string")),
            ],
        }]);
        let flattener = StructFlattener::new(&iface);
        let leaves = flattener
            .flatten(&param("filter", TypeShape::Record { record: "Filter".into() }), &at())
            .unwrap();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].web_name, "limit");
        assert_eq!(leaves[0].access, "filter.Limit");
        assert_eq!(leaves[1].web_name, "query");
        assert_eq!(leaves[1].access, "filter.Query");
    }

    #[test]
    fn test_nested_record_extends_prefix_and_access() {
        let iface = iface(vec![
            RecordDescriptor {
                name: "Outer".into(),
                fields: vec![field("Inner", TypeShape::Record { record: "Inner".into() })],
            },
            RecordDescriptor {
                name: "Inner".into(),
                fields: vec![field("Limit", scalar("int32"))],
            },
        ]);
        let flattener = StructFlattener::new(&iface);
        let leaves = flattener
            .flatten(&param("p", TypeShape::Record { record: "Outer".into() }), &at())
            .unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].web_name, "inner.limit");
        assert_eq!(leaves[0].access, "p.Inner.Limit");
    }

    #[test]
    fn test_embedded_record_keeps_prefix() {
        let iface = iface(vec![
            RecordDescriptor {
                name: "Page".into(),
                fields: vec![
                    FieldDescriptor {
                        name: "Common".into(),
                        shape: TypeShape::Record { record: "Common".into() },
                        tag: None,
                        embedded: true,
                        omit_empty: false,
                    },
                    field("Query", scalar("string")),
                ],
            },
            RecordDescriptor {
                name: "Common".into(),
                fields: vec![field("Limit", scalar("int32"))],
            },
        ]);
        let flattener = StructFlattener::new(&iface);
        let leaves = flattener
            .flatten(&param("p", TypeShape::Record { record: "Page".into() }), &at())
            .unwrap();
        // The embedded field's leaf keeps the top-level prefix.
        assert_eq!(leaves[0].web_name, "limit");
        assert_eq!(leaves[0].access, "p.Common.Limit");
        assert_eq!(leaves[1].web_name, "query");
    }

    #[test]
    fn test_tag_overrides_derived_name_and_skip_removes() {
        let iface = iface(vec![RecordDescriptor {
            name: "Filter".into(),
            fields: vec![
                FieldDescriptor {
                    name: "MaxResults".into(),
                    shape: scalar("int32"),
                    tag: Some("max".into()),
                    embedded: false,
                    omit_empty: false,
                },
                FieldDescriptor {
                    name: "Secret".into(),
                    shape: scalar("string"),
                    tag: Some("-".into()),
                    embedded: false,
                    omit_empty: false,
                },
            ],
        }]);
        let flattener = StructFlattener::new(&iface);
        let leaves = flattener
            .flatten(&param("f", TypeShape::Record { record: "Filter".into() }), &at())
            .unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].web_name, "max");
    }

    #[test]
    fn test_pointer_ancestor_allocated_once() {
        let iface = iface(vec![
            RecordDescriptor {
                name: "Outer".into(),
                fields: vec![field(
                    "Inner",
                    TypeShape::PointerRecord { record: "Inner".into() },
                )],
            },
            RecordDescriptor {
                name: "Inner".into(),
                fields: vec![
                    field("Limit", scalar("int32")),
                    field("Offset", scalar("int32")),
                ],
            },
        ]);
        let flattener = StructFlattener::new(&iface);
        let leaves = flattener
            .flatten(&param("p", TypeShape::Record { record: "Outer".into() }), &at())
            .unwrap();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].parent_inits.len(), 1);
        assert!(leaves[0].parent_inits[0].first_write);
        assert_eq!(leaves[0].parent_inits[0].access, "p.Inner");
        // Second leaf beneath the same pointer ancestor is not a first
        // write: it nil-checks before allocating.
        assert!(!leaves[1].parent_inits[0].first_write);
    }

    #[test]
    fn test_pointer_record_parameter_is_own_ancestor() {
        let iface = iface(vec![RecordDescriptor {
            name: "Filter".into(),
            fields: vec![field("Limit", scalar("int32"))],
        }]);
        let flattener = StructFlattener::new(&iface);
        let leaves = flattener
            .flatten(
                &param("f", TypeShape::PointerRecord { record: "Filter".into() }),
                &at(),
            )
            .unwrap();
        assert_eq!(leaves[0].parent_inits.len(), 1);
        assert_eq!(leaves[0].parent_inits[0].access, "f");
        assert!(leaves[0].parent_inits[0].first_write);
    }

    #[test]
    fn test_missing_record_is_fatal() {
        let iface = iface(vec![]);
        let flattener = StructFlattener::new(&iface);
        let err = flattener
            .flatten(&param("f", TypeShape::Record { record: "Nope".into() }), &at())
            .unwrap_err();
        assert!(matches!(err, Error::MissingMetadata { .. }));
    }

    #[test]
    fn test_recursive_record_rejected() {
        let iface = iface(vec![RecordDescriptor {
            name: "Node".into(),
            fields: vec![field(
                "Next",
                TypeShape::PointerRecord { record: "Node".into() },
            )],
        }]);
        let flattener = StructFlattener::new(&iface);
        let err = flattener
            .flatten(&param("n", TypeShape::Record { record: "Node".into() }), &at())
            .unwrap_err();
        assert!(matches!(err, Error::SchemaConflict { .. }));
    }

    #[test]
    fn test_duplicate_web_name_rejected() {
        let iface = iface(vec![RecordDescriptor {
            name: "Filter".into(),
            fields: vec![
                FieldDescriptor {
                    name: "A".into(),
                    shape: scalar("string"),
                    tag: Some("same".into()),
                    embedded: false,
                    omit_empty: false,
                },
                FieldDescriptor {
                    name: "B".into(),
                    shape: scalar("string"),
                    tag: Some("same".into()),
                    embedded: false,
                    omit_empty: false,
                },
            ],
        }]);
        let flattener = StructFlattener::new(&iface);
        let err = flattener
            .flatten(&param("f", TypeShape::Record { record: "Filter".into() }), &at())
            .unwrap_err();
        assert!(matches!(err, Error::SchemaConflict { .. }));
    }

    #[test]
    fn test_map_and_reserved_fields_pass_through() {
        let iface = iface(vec![RecordDescriptor {
            name: "Filter".into(),
            fields: vec![
                field("Extra", TypeShape::Map { elem: ScalarType::plain("string") }),
                field("Ctx", TypeShape::Reserved { name: "echo.Context".into() }),
            ],
        }]);
        let flattener = StructFlattener::new(&iface);
        let leaves = flattener
            .flatten(&param("f", TypeShape::Record { record: "Filter".into() }), &at())
            .unwrap();
        assert!(matches!(leaves[0].shape, TypeShape::Map { .. }));
        assert!(matches!(leaves[1].shape, TypeShape::Reserved { .. }));
    }
}
