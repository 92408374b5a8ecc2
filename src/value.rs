use crate::ast::FunctionDef;
use std::fmt;
use std::rc::Rc;

/// The closed set of runtime type tags. Every `Value` carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Nil,
    Boolean,
    Integer,
    Float,
    String,
    Function,
}

impl Tag {
    /// Operand kinds accepted by `not`, `!`, `and`, `or`, `&&` and `||`.
    pub fn is_boolean(self) -> bool {
        matches!(self, Tag::Boolean | Tag::Nil)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Function(Rc<FunctionDef>),
}

impl Value {
    pub fn tag(&self) -> Tag {
        match self {
            Value::Nil => Tag::Nil,
            Value::Boolean(_) => Tag::Boolean,
            Value::Integer(_) => Tag::Integer,
            Value::Float(_) => Tag::Float,
            Value::String(_) => Tag::String,
            Value::Function(_) => Tag::Function,
        }
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    /// Equality used by `is`, `==` and `!=`: integers and floats compare
    /// numerically, everything else compares by kind and contents.
    pub fn structurally_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(l), Value::Float(r)) => (*l as f64) == *r,
            (Value::Float(l), Value::Integer(r)) => *l == (*r as f64),
            (l, r) => l == r,
        }
    }

    /// Numeric payload widened to f64, for mixed arithmetic and ordering.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Re-tags a raw floating result: a finite value with no fractional part
    /// that fits an i64 becomes an `Integer`.
    ///
    /// NOTE: this silently turns `1.0 + 2.0` into the integer `3`. The
    /// language has always behaved this way and scripts depend on it, so it
    /// is kept even though it looks unintended.
    pub fn from_float_result(raw: f64) -> Value {
        if raw.is_finite() && raw.fract() == 0.0 && raw >= i64::MIN as f64 && raw < i64::MAX as f64
        {
            Value::Integer(raw as i64)
        } else {
            Value::Float(raw)
        }
    }
}

/// Floats at least this large print in exponent form.
const FLOAT_EXPONENT_THRESHOLD: f64 = 1e16;

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) if n.is_nan() => write!(f, "NaN"),
            Value::Float(n) if n.is_infinite() => {
                write!(f, "{}Infinity", if *n < 0.0 { "-" } else { "" })
            }
            Value::Float(n) if n.abs() >= FLOAT_EXPONENT_THRESHOLD => write!(f, "{:e}", n),
            Value::Float(n) => {
                // Always show at least one decimal place for floats
                if n.fract() == 0.0 {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Function(function) => write!(f, "<function {}>", function.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_results_with_zero_fraction_become_integers() {
        assert_eq!(Value::from_float_result(3.0), Value::Integer(3));
        assert_eq!(Value::from_float_result(-4.0), Value::Integer(-4));
        assert_eq!(Value::from_float_result(3.5), Value::Float(3.5));
        assert_eq!(Value::from_float_result(f64::INFINITY).tag(), Tag::Float);
        assert_eq!(Value::from_float_result(1e300).tag(), Tag::Float);
    }

    #[test]
    fn large_and_non_finite_floats_render_compactly() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Float(1e300).to_string(), "1e300");
        assert_eq!(Value::Float(-2.5e20).to_string(), "-2.5e20");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::Float(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(Value::Float(f64::NAN).to_string(), "NaN");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
    }

    #[test]
    fn numbers_compare_across_kinds() {
        assert!(Value::Integer(2).structurally_equal(&Value::Float(2.0)));
        assert!(!Value::Integer(2).structurally_equal(&Value::String("2".to_string())));
        assert!(Value::Nil.structurally_equal(&Value::Nil));
    }

    #[test]
    fn display_matches_print_rendering() {
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Boolean(true).to_string(), "true");
    }
}
