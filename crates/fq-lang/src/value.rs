use std::fmt::{self, Debug, Display, Formatter};

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;

/// A runtime value of the formula language.
///
/// Values are immutable once produced and never change kind. Host values are
/// converted through the `From` impls below; a host type without an impl has
/// no `Value` representation.
#[derive(Clone, PartialEq)]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Bool(bool),
    String(String),
    DateTime(NaiveDateTime),
    Null,
    List(Vec<Value>),
}

/// The kind tag of a [`Value`], used by every coercion table.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum ValueKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    Bool,
    String,
    DateTime,
    Null,
    List,
}

impl ValueKind {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ValueKind::I8
                | ValueKind::I16
                | ValueKind::I32
                | ValueKind::I64
                | ValueKind::U8
                | ValueKind::U16
                | ValueKind::U32
                | ValueKind::U64
        )
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            ValueKind::I8 | ValueKind::I16 | ValueKind::I32 | ValueKind::I64
        )
    }

    pub fn is_unsigned(&self) -> bool {
        self.is_integer() && !self.is_signed()
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, ValueKind::F32 | ValueKind::F64 | ValueKind::Decimal)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    /// Bit width used by the Min/Max coercion rule.
    pub fn bit_width(&self) -> u32 {
        match self {
            ValueKind::I8 | ValueKind::U8 => 8,
            ValueKind::I16 | ValueKind::U16 => 16,
            ValueKind::I32 | ValueKind::U32 | ValueKind::F32 => 32,
            ValueKind::I64 | ValueKind::U64 | ValueKind::F64 => 64,
            ValueKind::Decimal => 128,
            _ => 0,
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let name = match self {
            ValueKind::I8 => "Int8",
            ValueKind::I16 => "Int16",
            ValueKind::I32 => "Int32",
            ValueKind::I64 => "Int64",
            ValueKind::U8 => "UInt8",
            ValueKind::U16 => "UInt16",
            ValueKind::U32 => "UInt32",
            ValueKind::U64 => "UInt64",
            ValueKind::F32 => "Float",
            ValueKind::F64 => "Double",
            ValueKind::Decimal => "Decimal",
            ValueKind::Bool => "Boolean",
            ValueKind::String => "String",
            ValueKind::DateTime => "DateTime",
            ValueKind::Null => "Null",
            ValueKind::List => "List",
        };
        write!(f, "{}", name)
    }
}

impl Value {
    pub const TRUE: Value = Self::Bool(true);
    pub const FALSE: Value = Self::Bool(false);

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::I8(_) => ValueKind::I8,
            Value::I16(_) => ValueKind::I16,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::U8(_) => ValueKind::U8,
            Value::U16(_) => ValueKind::U16,
            Value::U32(_) => ValueKind::U32,
            Value::U64(_) => ValueKind::U64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Bool(_) => ValueKind::Bool,
            Value::String(_) => ValueKind::String,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Null => ValueKind::Null,
            Value::List(_) => ValueKind::List,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The zero/default value of a kind, substituted for null operands by the
    /// compiled backend.
    pub fn default_of(kind: ValueKind) -> Value {
        match kind {
            ValueKind::I8 => Value::I8(0),
            ValueKind::I16 => Value::I16(0),
            ValueKind::I32 => Value::I32(0),
            ValueKind::I64 => Value::I64(0),
            ValueKind::U8 => Value::U8(0),
            ValueKind::U16 => Value::U16(0),
            ValueKind::U32 => Value::U32(0),
            ValueKind::U64 => Value::U64(0),
            ValueKind::F32 => Value::F32(0.0),
            ValueKind::F64 => Value::F64(0.0),
            ValueKind::Decimal => Value::Decimal(Decimal::ZERO),
            ValueKind::Bool => Value::FALSE,
            ValueKind::String => Value::String(String::new()),
            ValueKind::DateTime => Value::DateTime(DateTime::<Utc>::UNIX_EPOCH.naive_utc()),
            ValueKind::Null => Value::Null,
            ValueKind::List => Value::List(Vec::new()),
        }
    }
}

impl From<i8> for Value {
    fn from(value: i8) -> Self {
        Value::I8(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::I16(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::U8(value)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::U16(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::U32(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::U64(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::F32(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::List(values)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Value::I8(n) => write!(f, "{}", n),
            Value::I16(n) => write!(f, "{}", n),
            Value::I32(n) => write!(f, "{}", n),
            Value::I64(n) => write!(f, "{}", n),
            Value::U8(n) => write!(f, "{}", n),
            Value::U16(n) => write!(f, "{}", n),
            Value::U32(n) => write!(f, "{}", n),
            Value::U64(n) => write!(f, "{}", n),
            Value::F32(n) => write!(f, "{}", n),
            Value::F64(n) => write!(f, "{}", n),
            Value::Decimal(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::Null => write!(f, ""),
            Value::List(values) => {
                let items = values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{}]", items)
            }
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Null => write!(f, "null"),
            _ => write!(f, "{}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case(Value::from(42i64), ValueKind::I64)]
    #[case(Value::from(42u8), ValueKind::U8)]
    #[case(Value::from(1.5f64), ValueKind::F64)]
    #[case(Value::from(true), ValueKind::Bool)]
    #[case(Value::from("hi"), ValueKind::String)]
    #[case(Value::Null, ValueKind::Null)]
    #[case(Value::from(vec![Value::from(1i64)]), ValueKind::List)]
    fn test_kind(#[case] value: Value, #[case] expected: ValueKind) {
        assert_eq!(value.kind(), expected);
    }

    #[rstest]
    #[case(ValueKind::I8, 8)]
    #[case(ValueKind::U32, 32)]
    #[case(ValueKind::F64, 64)]
    #[case(ValueKind::Decimal, 128)]
    fn test_bit_width(#[case] kind: ValueKind, #[case] expected: u32) {
        assert_eq!(kind.bit_width(), expected);
    }

    #[rstest]
    #[case(ValueKind::U64, true, false)]
    #[case(ValueKind::I16, false, true)]
    #[case(ValueKind::F32, false, false)]
    fn test_signedness(#[case] kind: ValueKind, #[case] unsigned: bool, #[case] signed: bool) {
        assert_eq!(kind.is_unsigned(), unsigned);
        assert_eq!(kind.is_signed(), signed);
    }

    #[test]
    fn test_default_of() {
        assert_eq!(Value::default_of(ValueKind::I32), Value::I32(0));
        assert_eq!(Value::default_of(ValueKind::Bool), Value::FALSE);
        assert_eq!(Value::default_of(ValueKind::String), Value::String(String::new()));
    }

    #[rstest]
    #[case(Value::from(42i64), "42")]
    #[case(Value::from("abc"), "abc")]
    #[case(Value::from(true), "true")]
    #[case(Value::List(vec![Value::from(1i64), Value::from(2i64)]), "[1, 2]")]
    fn test_display(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }
}
