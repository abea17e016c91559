use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Parameter value attached to an operation. The optimizer never interprets
/// parameter semantics; they only participate in structural fingerprints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Flag(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
            ParamValue::Flag(v) => write!(f, "{}", v),
        }
    }
}

/// Ordered parameter map. BTreeMap keeps key order deterministic so the
/// same content always produces the same fingerprint.
pub type OpParams = BTreeMap<String, ParamValue>;

/// Opaque content of a graph node: an operation name plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContent {
    pub name: String,
    pub params: OpParams,
}

impl NodeContent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: OpParams::new(),
        }
    }

    pub fn with_params(name: impl Into<String>, params: OpParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Canonical text form used inside structural fingerprints.
    pub fn descriptive_id(&self) -> String {
        if self.params.is_empty() {
            return self.name.clone();
        }
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}[{}]", self.name, params.join(","))
    }
}
