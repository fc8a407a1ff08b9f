//! Type conversion registry.
//!
//! The registry lets the protocol carry application-defined value
//! types (dates, decimals, ...) without the codec knowing about them.
//! Outgoing values are looked up by their Rust type and replaced by a
//! wire value before structural encoding; incoming column values are
//! looked up by the wire type name from the reply schema and replaced
//! on the way out. Registration is additive and last-write-wins per
//! key; an absent entry means the value passes through unchanged.
//!
//! Register converters during initialization, before query traffic
//! begins; the registry is shared by every connection it is handed to.

use crate::error::ClientError;
use parking_lot::RwLock;
use rmpv::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;

type EncodeFn = Box<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;
type DecodeFn = Box<dyn Fn(Value) -> Value + Send + Sync>;

/// A bind value for a statement: either a natively representable wire
/// value or an application type routed through the registry.
pub enum Param {
    Value(Value),
    Custom {
        value: Box<dyn Any + Send + Sync>,
        type_name: &'static str,
    },
}

impl Param {
    /// Wraps an application value that needs a registered encoder.
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Param::Custom {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn null() -> Self {
        Param::Value(Value::Nil)
    }
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Param::Value(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Value(Value::from(value))
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Value(Value::from(value))
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Value(Value::from(value))
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Value(Value::from(value))
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Value(Value::from(value))
    }
}

impl From<Vec<u8>> for Param {
    fn from(value: Vec<u8>) -> Self {
        Param::Value(Value::from(value))
    }
}

/// Mapping pair between application value types and wire-tagged
/// representations, shared across connections and cursors.
#[derive(Default)]
pub struct TypeRegistry {
    encoders: RwLock<HashMap<TypeId, EncodeFn>>,
    decoders: RwLock<HashMap<String, DecodeFn>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or replaces the encoder for `T`.
    pub fn register_encoder<T, F>(&self, encode: F)
    where
        T: Any,
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        let adapted: EncodeFn = Box::new(move |any| any.downcast_ref::<T>().map(&encode));
        self.encoders.write().insert(TypeId::of::<T>(), adapted);
    }

    /// Installs or replaces the decoder for a wire type name.
    pub fn register_decoder<F>(&self, type_name: impl Into<String>, decode: F)
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.decoders.write().insert(type_name.into(), Box::new(decode));
    }

    /// Converts a bind value into its wire representation.
    ///
    /// Custom values without a registered encoder cannot be
    /// represented natively and fail with an encoding error.
    pub fn encode_param(&self, param: &Param) -> Result<Value, ClientError> {
        match param {
            Param::Value(value) => Ok(value.clone()),
            Param::Custom { value, type_name } => {
                let encoders = self.encoders.read();
                let any: &dyn Any = value.as_ref();
                encoders
                    .get(&any.type_id())
                    .and_then(|encode| encode(any))
                    .ok_or(ClientError::UnencodableParam(*type_name))
            }
        }
    }

    /// Converts a raw column value by its wire type name; unregistered
    /// names pass the value through unchanged.
    pub fn decode_value(&self, raw: Value, type_name: &str) -> Value {
        match self.decoders.read().get(type_name) {
            Some(decode) => decode(raw),
            None => raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Celsius(f64);

    #[test]
    fn test_plain_params_pass_through() {
        let registry = TypeRegistry::new();
        assert_eq!(
            registry.encode_param(&Param::from(42i64)).unwrap(),
            Value::from(42)
        );
        assert_eq!(
            registry.encode_param(&Param::from("abc")).unwrap(),
            Value::from("abc")
        );
        assert_eq!(registry.encode_param(&Param::null()).unwrap(), Value::Nil);
    }

    #[test]
    fn test_custom_encoder() {
        let registry = TypeRegistry::new();
        registry.register_encoder::<Celsius, _>(|c| Value::from(c.0));

        let encoded = registry.encode_param(&Param::custom(Celsius(21.5))).unwrap();
        assert_eq!(encoded, Value::from(21.5));
    }

    #[test]
    fn test_unregistered_custom_type_fails() {
        let registry = TypeRegistry::new();
        let err = registry
            .encode_param(&Param::custom(Celsius(0.0)))
            .unwrap_err();
        assert!(matches!(err, ClientError::UnencodableParam(_)));
    }

    #[test]
    fn test_decoder_lookup_by_type_name() {
        let registry = TypeRegistry::new();
        registry.register_decoder("bool", |raw| {
            Value::from(raw.as_i64().is_some_and(|v| v != 0))
        });

        assert_eq!(
            registry.decode_value(Value::from(1), "bool"),
            Value::from(true)
        );
        // unregistered names pass through
        assert_eq!(
            registry.decode_value(Value::from(1), "int"),
            Value::from(1)
        );
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = TypeRegistry::new();
        registry.register_decoder("flag", |_| Value::from("first"));
        registry.register_decoder("flag", |_| Value::from("second"));

        assert_eq!(
            registry.decode_value(Value::Nil, "flag"),
            Value::from("second")
        );
    }

    #[test]
    fn test_roundtrip_through_codec() {
        let registry = TypeRegistry::new();
        registry.register_encoder::<Celsius, _>(|c| Value::from(c.0));
        registry.register_decoder("celsius", |raw| raw);

        let wire = registry.encode_param(&Param::custom(Celsius(36.6))).unwrap();
        let bytes = qlizator_protocol::encode_value(&wire).unwrap();

        let mut decoder = qlizator_protocol::Decoder::new();
        decoder.extend(&bytes);
        let raw = decoder.next_value().unwrap().unwrap();

        assert_eq!(registry.decode_value(raw, "celsius"), Value::from(36.6));
    }
}
