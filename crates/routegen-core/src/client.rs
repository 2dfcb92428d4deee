//! Client-direction serialization plans.
//!
//! Mirrors the server classification exactly: whatever the server binds from
//! path, query or body, the client writes to the same place. Path
//! placeholders substitute stringified parameter expressions into the URL,
//! query leaves append guarded key/value pairs (string sequences in a single
//! multi-value set, everything else element by element), and body leaves
//! either pass a single value through or spread into a keyed map, with
//! designated records contributing one map entry per flattened field.

// Internal imports (std, crate)
use crate::classify::{classify_method, ClassifiedLeaf, ParamSource};
use crate::convert::ConversionSelector;
use crate::decode::{decode_results, DecodedResult, Envelope};
use crate::error::{Error, Position, Result};
use crate::flatten::StructFlattener;
use crate::metadata::{HttpVerb, InterfaceDescriptor, MethodDescriptor, TypeShape};
use crate::path_template::{client_substitute, parse, Notation};

// External imports (alphabetized)
use serde::Serialize;
use serde_json::Value as JsonValue;

/// One outbound serialization step of a client call
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum OutboundStep {
    /// Set a query key unconditionally; `fresh` declares the query
    /// collection on this first write
    QuerySet {
        key: String,
        value: String,
        fresh: bool,
    },
    /// Set a query key only when the pointer is non-nil; `value` is the
    /// stringified dereference
    QuerySetPtrGuarded {
        key: String,
        pointer: String,
        value: String,
        fresh: bool,
    },
    /// Set a query key only when the value differs from its zero literal
    QuerySetZeroGuarded {
        key: String,
        source: String,
        zero: String,
        value: String,
        fresh: bool,
    },
    /// Set a query key only when the nullable wrapper is valid
    QuerySetNullableGuarded {
        key: String,
        valid: String,
        value: String,
        fresh: bool,
    },
    /// Set all elements of a string-like sequence under one key in a single
    /// multi-value call
    QuerySetMulti {
        key: String,
        source: String,
        fresh: bool,
    },
    /// Append one query value per element of a sequence whose elements need
    /// stringification
    QueryLoop {
        key: String,
        source: String,
        /// Stringified element expression over the loop variable `item`
        value: String,
        fresh: bool,
    },
    /// Copy every entry of a multi-value map into the query under its own key
    QueryAddMap { source: String, fresh: bool },
    /// Serialize a single value as the whole request body
    BodyPass {
        source: String,
        content_type: Option<String>,
    },
    /// Put one value into the aggregated body map under its wire key
    BodyMapPut {
        key: String,
        source: String,
        /// First put declares the map
        fresh: bool,
    },
}

/// One client call: URL expression, outbound steps and response decoding
#[derive(Clone, Debug, Serialize)]
pub struct ClientCall {
    pub method: String,
    pub verb: HttpVerb,
    /// Concatenation expression producing the request path
    pub path_expr: String,
    pub steps: Vec<OutboundStep>,
    pub result: DecodedResult,
}

impl ClientCall {
    /// Serialize for the external emitter
    pub fn to_context(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Synthesizes client-direction serialization plans for a whole interface
pub struct ClientSerializer<'a> {
    iface: &'a InterfaceDescriptor,
    conversions: &'a ConversionSelector,
    source_notation: Notation,
    envelope: Option<Envelope>,
}

impl<'a> ClientSerializer<'a> {
    pub fn new(iface: &'a InterfaceDescriptor, conversions: &'a ConversionSelector) -> Self {
        Self {
            iface,
            conversions,
            source_notation: Notation::default(),
            envelope: None,
        }
    }

    /// Set the placeholder notation of the input templates
    pub fn with_notation(mut self, source: Notation) -> Self {
        self.source_notation = source;
        self
    }

    /// Expect decoded results nested inside a response envelope
    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = Some(envelope);
        self
    }

    /// Synthesize calls for every method, sorted by method name for
    /// consistent output
    pub fn serialize(&self) -> Result<Vec<ClientCall>> {
        let mut calls = Vec::new();
        for method in &self.iface.methods {
            calls.push(self.serialize_method(method)?);
        }
        calls.sort_by(|a, b| a.method.cmp(&b.method));
        Ok(calls)
    }

    /// Synthesize the outbound plan for one method
    pub fn serialize_method(&self, method: &MethodDescriptor) -> Result<ClientCall> {
        let at = self.iface.position().method(&method.name);
        let route = method.route(&at)?;
        let template = parse(&route.path, self.source_notation)?;
        let leaves = classify_method(self.iface, method, &template, &at)?;

        // Path placeholders substitute the stringified access expression of
        // their matched leaf.
        let path_expr = client_substitute(&template.segments, |name| {
            let leaf = leaves
                .iter()
                .find(|l| l.source == ParamSource::Path && l.web_name == name)
                .ok_or_else(|| {
                    Error::missing_metadata(
                        format!("parameter for path placeholder `{}`", name),
                        &at,
                    )
                })?;
            self.stringified(&leaf.leaf.access, &leaf.leaf.shape, &at)
        })?;

        // A designated record spreads into one wire entry per flattened
        // field; only a single-entry body passes the value through whole.
        let mut body_entries: Vec<Vec<(String, String)>> = Vec::new();
        for leaf in &leaves {
            if leaf.source == ParamSource::Body {
                body_entries.push(self.body_entries(method, leaf, &at)?);
            }
        }
        let body_total: usize = body_entries.iter().map(Vec::len).sum();

        let mut steps = Vec::new();
        let mut query_fresh = true;
        let mut body_fresh = true;
        let mut body_idx = 0usize;
        for leaf in &leaves {
            let leaf_at = at.parameter(&leaf.leaf.access);
            match leaf.source {
                // Consumed by the path expression above.
                ParamSource::Path => {}
                // Request-scoped framework values have no outbound mirror.
                ParamSource::Reserved => {}
                ParamSource::Body => {
                    let entries = &body_entries[body_idx];
                    body_idx += 1;
                    if body_total > 1 {
                        for (key, source) in entries {
                            steps.push(OutboundStep::BodyMapPut {
                                key: key.clone(),
                                source: source.clone(),
                                fresh: body_fresh,
                            });
                            body_fresh = false;
                        }
                    } else {
                        steps.push(OutboundStep::BodyPass {
                            source: leaf.leaf.access.clone(),
                            content_type: method.content_type.clone(),
                        });
                    }
                }
                ParamSource::Query => {
                    let step = self.query_step(leaf, query_fresh, &leaf_at)?;
                    // Guards and loops break the fluent chain: whatever
                    // follows re-binds the request-builder value in a new
                    // statement.
                    query_fresh = matches!(
                        step,
                        OutboundStep::QuerySetPtrGuarded { .. }
                            | OutboundStep::QuerySetZeroGuarded { .. }
                            | OutboundStep::QuerySetNullableGuarded { .. }
                            | OutboundStep::QueryLoop { .. }
                            | OutboundStep::QueryAddMap { .. }
                    );
                    steps.push(step);
                }
            }
        }

        log::debug!(
            "serialized {} outbound steps for {}.{}",
            steps.len(),
            self.iface.name,
            method.name
        );

        Ok(ClientCall {
            method: method.name.clone(),
            verb: route.verb,
            path_expr,
            steps,
            result: decode_results(method, self.envelope.clone()),
        })
    }

    /// Wire entries contributed by one body leaf: a record spreads into its
    /// flattened fields under their own keys, anything else is one entry.
    fn body_entries(
        &self,
        method: &MethodDescriptor,
        leaf: &ClassifiedLeaf,
        at: &Position,
    ) -> Result<Vec<(String, String)>> {
        if !matches!(
            leaf.leaf.shape,
            TypeShape::Record { .. } | TypeShape::PointerRecord { .. }
        ) {
            return Ok(vec![(leaf.web_name.clone(), leaf.leaf.access.clone())]);
        }
        let param = method
            .parameters
            .iter()
            .find(|p| p.name == leaf.leaf.parameter)
            .ok_or_else(|| {
                Error::missing_metadata(format!("parameter `{}`", leaf.leaf.parameter), at)
            })?;
        let fields = StructFlattener::new(self.iface).flatten(param, at)?;
        Ok(fields
            .into_iter()
            .map(|field| (field.web_name, field.access))
            .collect())
    }

    fn query_step(
        &self,
        leaf: &ClassifiedLeaf,
        fresh: bool,
        at: &Position,
    ) -> Result<OutboundStep> {
        let key = leaf.web_name.clone();
        let access = leaf.leaf.access.clone();

        let step = match &leaf.leaf.shape {
            TypeShape::Pointer { scalar } => OutboundStep::QuerySetPtrGuarded {
                key,
                pointer: access.clone(),
                value: self
                    .conversions
                    .stringify(scalar, &format!("*{}", access), at)?,
                fresh,
            },
            TypeShape::Nullable { scalar } => {
                // The wrapper's value slot holds the base scalar.
                let info = self.conversions.nullable_info(scalar, at)?;
                OutboundStep::QuerySetNullableGuarded {
                    key,
                    valid: format!("{}.{}", access, info.valid_field),
                    value: self.conversions.stringify(
                        scalar,
                        &format!("{}.{}", access, info.value_field),
                        at,
                    )?,
                    fresh,
                }
            }
            TypeShape::Array { elem } => {
                // String-like elements go out verbatim in one multi-value
                // call; everything else stringifies element by element.
                if elem.is_string_like() {
                    OutboundStep::QuerySetMulti {
                        key,
                        source: access,
                        fresh,
                    }
                } else {
                    OutboundStep::QueryLoop {
                        key,
                        source: access,
                        value: self.conversions.stringify(elem, "item", at)?,
                        fresh,
                    }
                }
            }
            TypeShape::Map { .. } => OutboundStep::QueryAddMap {
                source: access,
                fresh,
            },
            TypeShape::Scalar { scalar } => {
                let value = self.conversions.stringify(scalar, &access, at)?;
                if leaf.leaf.omit_empty {
                    OutboundStep::QuerySetZeroGuarded {
                        key,
                        source: access,
                        zero: self.conversions.zero_literal(scalar),
                        value,
                        fresh,
                    }
                } else {
                    OutboundStep::QuerySet { key, value, fresh }
                }
            }
            other => {
                return Err(Error::unsupported_type(other.type_name(), at));
            }
        };
        Ok(step)
    }

    fn stringified(&self, access: &str, shape: &TypeShape, at: &Position) -> Result<String> {
        let scalar = shape
            .scalar()
            .ok_or_else(|| Error::unsupported_type(shape.type_name(), at))?;
        self.conversions.stringify(scalar, access, at)
    }
}
