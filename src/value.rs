//! Dynamically-typed values produced by converters.
//!
//! Rust callables don't carry runtime type tags the way the values flowing
//! through the interpreter do, so every converter - primitive or user
//! defined - produces one of these instead of a native Rust type. The
//! command function registered at the root of a tree receives a slice of
//! `Value` for its positional arguments and a map of `Value` for its
//! keyword arguments.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::convert::NodeId;

/// A value bound to a parameter after its converter ran.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex),
    Str(String),
    /// Result of a `MultiOption::render` or of a built-in accumulator/mapping.
    Seq(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Result of calling a non-primitive converter: the converter's own
    /// node id plus whatever `Value` its callable returned.
    Node(NodeId, Box<Value>),
    /// The `EMPTY` sentinel from spec.md §4.B: a reserved marker that is
    /// legal to pattern-match against but illegal to register as a
    /// parameter's default value.
    Empty,
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Complex(c) => write!(f, "{c}"),
            Value::Str(s) => f.write_str(s),
            Value::Seq(xs) => {
                write!(f, "[")?;
                for (ix, x) in xs.iter().enumerate() {
                    if ix != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (ix, (k, v)) in m.iter().enumerate() {
                    if ix != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Node(_, inner) => inner.fmt(f),
            Value::Empty => f.write_str("<empty>"),
        }
    }
}

/// A minimal `a+bj` complex number, the fifth builtin primitive from
/// spec.md §3. Kept hand-rolled rather than pulling in `num-complex`: every
/// other primitive here parses directly off `FromStr` with no numeric
/// dependency, so a small `FromStr` impl matches that idiom instead of
/// adding a dependency the rest of the crate doesn't otherwise need.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.im < 0.0 {
            write!(f, "{}-{}j", self.re, -self.im)
        } else {
            write!(f, "{}+{}j", self.re, self.im)
        }
    }
}

impl FromStr for Complex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || format!("not a complex number: {s:?}");

        if let Some(body) = s.strip_suffix(['j', 'J']) {
            // find the +/- that splits real and imaginary parts, skipping
            // a leading sign and any exponent sign (`1e-3j`)
            let bytes = body.as_bytes();
            let mut split = None;
            for (ix, &b) in bytes.iter().enumerate().skip(1) {
                if (b == b'+' || b == b'-') && !matches!(bytes[ix - 1], b'e' | b'E') {
                    split = Some(ix);
                }
            }
            return match split {
                Some(ix) => {
                    let re: f64 = body[..ix].parse().map_err(|_| bad())?;
                    let im_str = &body[ix..];
                    let im: f64 = if im_str == "+" {
                        1.0
                    } else if im_str == "-" {
                        -1.0
                    } else {
                        im_str.parse().map_err(|_| bad())?
                    };
                    Ok(Complex { re, im })
                }
                None => {
                    let im: f64 = if body.is_empty() {
                        1.0
                    } else if body == "+" {
                        1.0
                    } else if body == "-" {
                        -1.0
                    } else {
                        body.parse().map_err(|_| bad())?
                    };
                    Ok(Complex { re: 0.0, im })
                }
            };
        }

        s.parse::<f64>().map(|re| Complex { re, im: 0.0 }).map_err(|_| bad())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_real() {
        assert_eq!("3.5".parse::<Complex>().unwrap(), Complex { re: 3.5, im: 0.0 });
    }

    #[test]
    fn parses_pure_imaginary() {
        assert_eq!("2j".parse::<Complex>().unwrap(), Complex { re: 0.0, im: 2.0 });
        assert_eq!("j".parse::<Complex>().unwrap(), Complex { re: 0.0, im: 1.0 });
        assert_eq!("-j".parse::<Complex>().unwrap(), Complex { re: 0.0, im: -1.0 });
    }

    #[test]
    fn parses_full_form() {
        assert_eq!(
            "1+2j".parse::<Complex>().unwrap(),
            Complex { re: 1.0, im: 2.0 }
        );
        assert_eq!(
            "1-2j".parse::<Complex>().unwrap(),
            Complex { re: 1.0, im: -2.0 }
        );
        assert_eq!(
            "1e3-2j".parse::<Complex>().unwrap(),
            Complex { re: 1000.0, im: -2.0 }
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!("hello".parse::<Complex>().is_err());
    }
}
