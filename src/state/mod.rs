//! Serialized node state
//!
//! Every node of a container tree (metric, wrapper, config, container)
//! serializes to a [`NodeState`]: a self-describing `kind` tag plus the
//! node's fields. Reconstruction goes through the explicit
//! [`StateRegistry`], which maps each known tag to a factory; unknown tags
//! are rejected with [`MetricError::SerializationTypeMismatch`].
//!
//! Non-finite floats are stored as the strings `"inf"`, `"-inf"` and `"nan"`
//! (see [`float`]) so that fresh Maximum/Minimum metrics survive a JSON
//! round trip exactly.

mod registry;


pub use registry::{NodeFactory, StateRegistry};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MetricError, Result};

/// State of one node in a serialized tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    /// Variant tag, resolved through [`StateRegistry`] on load
    pub kind: String,
    /// Variant fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl NodeState {
    /// Create an empty state for the given variant tag.
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), fields: Map::new() }
    }

    /// Merge the fields of a serializable struct into this state.
    pub fn with_fields<T: Serialize>(mut self, typed: &T) -> Result<Self> {
        match serde_json::to_value(typed)? {
            Value::Object(map) => {
                self.fields.extend(map);
                Ok(self)
            }
            other => Err(MetricError::MalformedState {
                kind: self.kind,
                message: format!("expected an object of fields, got {other}"),
            }),
        }
    }

    /// Insert a single raw field.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Read the fields back as a typed struct.
    ///
    /// Unknown fields are ignored, so several typed views can be read from
    /// the same state.
    pub fn fields_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| {
            MetricError::MalformedState { kind: self.kind.clone(), message: e.to_string() }
        })
    }

    /// Fail with `SerializationTypeMismatch` unless the tag matches.
    pub fn expect_kind(&self, kind: &str) -> Result<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(MetricError::SerializationTypeMismatch { kind: self.kind.clone() })
        }
    }
}

/// Serde codec for `f64` that keeps non-finite values.
pub mod float {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Wire form of a float: a JSON number or one of `"inf"`, `"-inf"`, `"nan"`.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct JsonFloat(pub f64);

    impl Serialize for JsonFloat {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let v = self.0;
            if v.is_finite() {
                serializer.serialize_f64(v)
            } else if v.is_nan() {
                serializer.serialize_str("nan")
            } else if v > 0.0 {
                serializer.serialize_str("inf")
            } else {
                serializer.serialize_str("-inf")
            }
        }
    }

    impl<'de> Deserialize<'de> for JsonFloat {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            #[derive(Deserialize)]
            #[serde(untagged)]
            enum NumOrString {
                Num(f64),
                Str(String),
            }

            match NumOrString::deserialize(deserializer)? {
                NumOrString::Num(v) => Ok(JsonFloat(v)),
                NumOrString::Str(s) => match s.to_lowercase().as_str() {
                    "inf" | "+inf" | "infinity" => Ok(JsonFloat(f64::INFINITY)),
                    "-inf" | "-infinity" => Ok(JsonFloat(f64::NEG_INFINITY)),
                    "nan" => Ok(JsonFloat(f64::NAN)),
                    other => Err(serde::de::Error::custom(format!(
                        "expected a number, 'inf', '-inf' or 'nan', got '{other}'"
                    ))),
                },
            }
        }
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        JsonFloat(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        JsonFloat::deserialize(deserializer).map(|f| f.0)
    }

    /// Codec for `Option<f64>`.
    pub mod option {
        use super::JsonFloat;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<f64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            value.map(JsonFloat).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<f64>, D::Error> {
            Option::<JsonFloat>::deserialize(deserializer).map(|o| o.map(|f| f.0))
        }
    }

    /// Codec for `Vec<f64>`.
    pub mod vec {
        use super::JsonFloat;
        use serde::ser::SerializeSeq;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(values.len()))?;
            for v in values {
                seq.serialize_element(&JsonFloat(*v))?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
            Vec::<JsonFloat>::deserialize(deserializer)
                .map(|values| values.into_iter().map(|f| f.0).collect())
        }
    }
}
