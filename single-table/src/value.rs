use std::fmt;

use crate::{Attributes, error::Error};

/// A scalar attribute value.
///
/// Absence is modeled by the attribute missing from the item, so there is no
/// null variant.
#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum Value {
    #[prost(string, tag = "1")]
    Str(::prost::alloc::string::String),
    #[prost(sint64, tag = "2")]
    Int(i64),
    #[prost(double, tag = "3")]
    Float(f64),
    #[prost(bool, tag = "4")]
    Bool(bool),
}

/// Wire wrapper so values can sit in a protobuf map.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AttributeValue {
    #[prost(oneof = "Value", tags = "1, 2, 3, 4")]
    pub value: ::core::option::Option<Value>,
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        AttributeValue { value: Some(value) }
    }
}

/// The variant of a [`Value`], as declared by a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Str,
    Int,
    Float,
    Bool,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Str => "string",
            ValueKind::Int => "integer",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.value_kind().name()
    }

    /// An empty string never forms a key.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Str(s) if s.is_empty())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Encodes the value as a key fragment.
    ///
    /// Numbers are offset and zero padded so that lexicographic order of the
    /// fragments matches numeric order.
    pub fn key_fragment(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(v) => {
                let offset_value = (*v as i128 + 9223372036854775808) as u128;
                format!("{:020}", offset_value)
            }
            Value::Float(v) => {
                // -0.0 与 0.0 相等，使用同一个键
                let v = if *v == 0.0 { 0.0f64 } else { *v };
                let bits = v.to_bits();
                // 负数翻转所有位，正数只翻转符号位
                let sortable_bits = if v.is_sign_negative() {
                    !bits
                } else {
                    bits ^ (1u64 << 63)
                };
                format!("{:020}", sortable_bits)
            }
            Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Str(value.clone())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("value is missing")]
    Missing,
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("{value} is out of range for {target}")]
    OutOfRange { value: i64, target: &'static str },
}

/// Converts a model field into an attribute value. `None` leaves the
/// attribute absent.
pub trait ToValue {
    /// Kind of every value this type produces.
    const KIND: ValueKind;

    fn to_value(&self) -> Option<Value>;
}

/// Rebuilds a model field from an attribute value.
pub trait FromValue: Sized {
    fn from_value(value: Option<&Value>) -> Result<Self, ValueError>;
}

impl ToValue for String {
    const KIND: ValueKind = ValueKind::Str;

    fn to_value(&self) -> Option<Value> {
        Some(Value::Str(self.clone()))
    }
}

impl FromValue for String {
    fn from_value(value: Option<&Value>) -> Result<Self, ValueError> {
        match value {
            Some(Value::Str(s)) => Ok(s.clone()),
            Some(other) => Err(ValueError::Mismatch {
                expected: "string",
                found: other.kind(),
            }),
            None => Err(ValueError::Missing),
        }
    }
}

impl ToValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn to_value(&self) -> Option<Value> {
        Some(Value::Bool(*self))
    }
}

impl FromValue for bool {
    fn from_value(value: Option<&Value>) -> Result<Self, ValueError> {
        match value {
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(ValueError::Mismatch {
                expected: "bool",
                found: other.kind(),
            }),
            None => Err(ValueError::Missing),
        }
    }
}

impl ToValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn to_value(&self) -> Option<Value> {
        Some(Value::Float(*self))
    }
}

impl FromValue for f64 {
    fn from_value(value: Option<&Value>) -> Result<Self, ValueError> {
        match value {
            Some(Value::Float(v)) => Ok(*v),
            Some(other) => Err(ValueError::Mismatch {
                expected: "float",
                found: other.kind(),
            }),
            None => Err(ValueError::Missing),
        }
    }
}

macro_rules! impl_value_for_int {
    ($($T:ty),+) => {
        $(
            impl From<$T> for Value {
                fn from(value: $T) -> Self {
                    Value::Int(value as i64)
                }
            }

            impl ToValue for $T {
                const KIND: ValueKind = ValueKind::Int;

                fn to_value(&self) -> Option<Value> {
                    Some(Value::Int(*self as i64))
                }
            }

            impl FromValue for $T {
                fn from_value(value: Option<&Value>) -> Result<Self, ValueError> {
                    match value {
                        Some(Value::Int(v)) => <$T>::try_from(*v).map_err(|_| ValueError::OutOfRange {
                            value: *v,
                            target: stringify!($T),
                        }),
                        Some(other) => Err(ValueError::Mismatch {
                            expected: "integer",
                            found: other.kind(),
                        }),
                        None => Err(ValueError::Missing),
                    }
                }
            }
        )+
    };
}

impl_value_for_int!(i64, i32, u32);

impl<T: ToValue> ToValue for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn to_value(&self) -> Option<Value> {
        self.as_ref().and_then(ToValue::to_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Option<&Value>) -> Result<Self, ValueError> {
        match value {
            Some(value) => T::from_value(Some(value)).map(Some),
            None => Ok(None),
        }
    }
}

/// Reads one field out of an attribute map. Used by `#[derive(Model)]`.
pub fn decode_field<V: FromValue>(
    model_name: &str,
    attributes: &Attributes,
    field_name: &str,
) -> Result<V, Error> {
    let value = attributes.get(field_name).and_then(|a| a.value.as_ref());
    V::from_value(value).map_err(|source| Error::Decode {
        model: model_name.to_string(),
        field: field_name.to_string(),
        source,
    })
}
