use serde::{Deserialize, Serialize};

/// A scalar literal embedded in an expression.
///
/// Deserializes from a bare JSON scalar, which is how literals appear in the
/// tagged expression tree (`{"literal": 42}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`
    UInt(u64),
    Float(f64),
    String(String),
}

impl Value {
    /// Negate a numeric literal. Other values are returned unchanged.
    pub fn negated(&self) -> Value {
        match self {
            Value::Int(n) => Value::Int(-n),
            Value::UInt(n) => match 0i64.checked_sub_unsigned(*n) {
                Some(v) => Value::Int(v),
                None => Value::Float(-(*n as f64)),
            },
            Value::Float(n) => Value::Float(-n),
            other => other.clone(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::UInt(_) | Value::Float(_))
    }
}

/// Renders the value as SQL text.
///
/// Strings are single-quoted verbatim. Embedded quotes are not escaped, so
/// literals must come from trusted callers.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(true) => write!(f, "TRUE"),
            Value::Bool(false) => write!(f, "FALSE"),
            Value::Int(n) => write!(f, "{}", n),
            Value::UInt(n) => write!(f, "{}", n),
            // Debug keeps the fractional part (5.0 rather than 5)
            Value::Float(n) => write!(f, "{:?}", n),
            Value::String(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        i64::try_from(v).map(Value::Int).unwrap_or(Value::UInt(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from("abc").to_string(), "'abc'");
        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from(5.0).to_string(), "5.0");
        assert_eq!(Value::from(true).to_string(), "TRUE");
        assert_eq!(Value::Null.to_string(), "NULL");
    }

    #[test]
    fn test_quotes_are_not_escaped() {
        assert_eq!(Value::from("it's").to_string(), "'it's'");
    }

    #[test]
    fn test_value_from_json_scalar() {
        let v: Value = serde_json::from_str("42").unwrap();
        assert_eq!(v, Value::Int(42));
        let v: Value = serde_json::from_str("4.25").unwrap();
        assert_eq!(v, Value::Float(4.25));
        let v: Value = serde_json::from_str("\"setosa\"").unwrap();
        assert_eq!(v, Value::String("setosa".to_string()));
        let v: Value = serde_json::from_str("null").unwrap();
        assert_eq!(v, Value::Null);
    }

    #[test]
    fn test_large_integers_stay_exact() {
        let v: Value = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(v, Value::UInt(u64::MAX));
        assert_eq!(v.to_string(), "18446744073709551615");
        assert_eq!(serde_json::to_string(&v).unwrap(), "18446744073709551615");

        let v: Value = serde_json::from_str("9223372036854775807").unwrap();
        assert_eq!(v, Value::Int(i64::MAX));
        assert_eq!(Value::from(7u64), Value::Int(7));
    }

    #[test]
    fn test_negated() {
        assert_eq!(Value::Int(3).negated(), Value::Int(-3));
        assert_eq!(Value::Float(1.5).negated(), Value::Float(-1.5));
        assert_eq!(Value::UInt(1 << 63).negated(), Value::Int(i64::MIN));
        assert_eq!(Value::UInt(u64::MAX).negated(), Value::Float(-(u64::MAX as f64)));
        assert_eq!(Value::from("x").negated(), Value::from("x"));
    }
}
