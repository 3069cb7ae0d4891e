//! The five builtin-primitive leaves from spec.md §3: boolean, integer,
//! real, complex, string. Each terminates recursion and consumes exactly
//! one command-line token.

use std::fmt;
use std::str::FromStr;

use crate::error::ConverterError;
use crate::value::{Complex, Value};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Primitive {
    Bool,
    Int,
    Float,
    Complex,
    Str,
}

impl Primitive {
    /// Name used in metavar rendering (`<INT>`, `<FLOAT>`, ...).
    pub(crate) fn metavar(self) -> &'static str {
        match self {
            Primitive::Bool => "BOOL",
            Primitive::Int => "INT",
            Primitive::Float => "FLOAT",
            Primitive::Complex => "COMPLEX",
            Primitive::Str => "STRING",
        }
    }

    pub(crate) fn parse(self, token: &str) -> Result<Value, ConverterError> {
        match self {
            Primitive::Bool => parse_bool(token).map(Value::Bool),
            Primitive::Int => i64::from_str(token)
                .map(Value::Int)
                .map_err(|_| ConverterError::new(format!("{token:?} is not an integer"))),
            Primitive::Float => f64::from_str(token)
                .map(Value::Float)
                .map_err(|_| ConverterError::new(format!("{token:?} is not a real number"))),
            Primitive::Complex => Complex::from_str(token)
                .map(Value::Complex)
                .map_err(ConverterError::new),
            Primitive::Str => Ok(Value::Str(token.to_string())),
        }
    }
}

fn parse_bool(token: &str) -> Result<bool, ConverterError> {
    match token {
        "true" | "True" | "1" | "yes" => Ok(true),
        "false" | "False" | "0" | "no" => Ok(false),
        other => Err(ConverterError::new(format!(
            "{other:?} is not a boolean"
        ))),
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metavar())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_primitive() {
        assert_eq!(Primitive::Bool.parse("true").unwrap(), Value::Bool(true));
        assert_eq!(Primitive::Int.parse("42").unwrap(), Value::Int(42));
        assert_eq!(Primitive::Float.parse("1.5").unwrap(), Value::Float(1.5));
        assert_eq!(Primitive::Str.parse("x").unwrap(), Value::Str("x".into()));
        assert!(Primitive::Int.parse("abc").is_err());
    }
}
