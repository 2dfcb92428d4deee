//! Response-decoding shapes for method results.
//!
//! Mirrors the server's encoding choice on the client side: zero data
//! results decode nothing, a single data result decodes directly into its
//! target type, and multiple data results decode through a named carrier
//! record with one field per result. Trailing error-like results are the
//! call's failure channel, not response data, and are excluded.

// Internal imports (std, crate)
use crate::metadata::MethodDescriptor;
use crate::utils::to_upper_camel_case;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

/// Optional response envelope nesting decoded data under fixed field names
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Boolean field reporting call success
    pub success_field: String,
    /// Field holding the decoded data payload
    pub data_field: String,
    /// Field holding the serialized failure message
    pub error_field: String,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            success_field: "success".to_string(),
            data_field: "data".to_string(),
            error_field: "error".to_string(),
        }
    }
}

/// One field of a multi-result carrier record
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CarrierField {
    /// Carrier field name, derived from the declared result name
    pub name: String,
    /// Wire key, the declared result name verbatim
    pub key: String,
    /// Target type name
    pub type_name: String,
    /// Declared as a pointer
    pub pointer: bool,
}

/// How a method's results decode from the response body
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultShape {
    /// No data results: nothing to decode
    Empty,
    /// One data result: decode directly into the target type
    Single {
        type_name: String,
        /// Pointer results decode into the pointee and take its address
        deref: bool,
    },
    /// Several data results: decode through a named carrier record
    Carrier {
        /// Carrier record name, `<Method>Result`
        name: String,
        fields: Vec<CarrierField>,
    },
}

/// Decoding description for one method's response
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecodedResult {
    pub shape: ResultShape,
    /// When set, the payload is nested under the envelope's data field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope: Option<Envelope>,
}

/// Derive the decoding shape for one method's declared results
pub fn decode_results(method: &MethodDescriptor, envelope: Option<Envelope>) -> DecodedResult {
    let data: Vec<_> = method.results.iter().filter(|r| !r.is_error).collect();

    let shape = match data.as_slice() {
        [] => ResultShape::Empty,
        [single] => ResultShape::Single {
            type_name: single.type_name.clone(),
            deref: single.pointer,
        },
        results => ResultShape::Carrier {
            name: format!("{}Result", to_upper_camel_case(&method.name)),
            fields: results
                .iter()
                .map(|r| CarrierField {
                    name: to_upper_camel_case(&r.name),
                    key: r.name.clone(),
                    type_name: r.type_name.clone(),
                    pointer: r.pointer,
                })
                .collect(),
        },
    };

    DecodedResult { shape, envelope }
}
