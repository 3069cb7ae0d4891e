//! Component F from spec.md §4.F: a MultiOption is a converter that
//! persists state across repeated invocations of the same option. Exactly
//! one instance is created - lazily, on the first invocation - per option
//! per frame; the interpreter calls `option()` again on every repeat and
//! `render()` once when the owning frame finalizes. If the option was
//! never invoked the parameter simply receives its declared default
//! (spec.md §4.F, §9 "MultiOption lifetime").

use std::collections::BTreeMap;
use std::fmt;

use crate::convert::ConverterRef;
use crate::error::ConverterError;
use crate::value::Value;

/// Per-frame runtime state for one repeatedly-invoked option.
pub trait MultiOption: fmt::Debug {
    /// Called once per occurrence of the option on the command line, with
    /// the already-converted opargs (one per entry in
    /// [`MultiOptionFactory::oparg_converters`]).
    fn option(&mut self, opargs: Vec<Value>) -> Result<(), ConverterError>;

    /// Called once, at frame finalization, if the option was invoked at
    /// least once.
    fn render(&self) -> Value;
}

/// Registered in place of an ordinary converter on a keyword-only
/// parameter; synthesizes a fresh [`MultiOption`] instance per frame.
pub trait MultiOptionFactory {
    /// Converters for the option's own opargs, in order. Empty for a
    /// bare repeatable flag like `counter()`.
    fn oparg_converters(&self) -> Vec<ConverterRef>;

    fn new_instance(&self) -> Box<dyn MultiOption>;

    fn metavar(&self) -> String {
        String::new()
    }
}

/// `counter()`: repeatable flag with no opargs, renders the occurrence
/// count. Used by spec.md scenario S5 (`-v`/`--verbose` repeated).
pub struct Counter;

#[derive(Debug, Default)]
struct CounterState(i64);

impl MultiOption for CounterState {
    fn option(&mut self, _opargs: Vec<Value>) -> Result<(), ConverterError> {
        self.0 += 1;
        Ok(())
    }

    fn render(&self) -> Value {
        Value::Int(self.0)
    }
}

impl MultiOptionFactory for Counter {
    fn oparg_converters(&self) -> Vec<ConverterRef> {
        Vec::new()
    }

    fn new_instance(&self) -> Box<dyn MultiOption> {
        Box::<CounterState>::default()
    }
}

/// `accumulator[T]`: repeatable option taking one oparg, renders the
/// sequence of all converted opargs in invocation order.
pub struct Accumulator {
    pub element: ConverterRef,
}

#[derive(Debug, Default)]
struct AccumulatorState(Vec<Value>);

impl MultiOption for AccumulatorState {
    fn option(&mut self, mut opargs: Vec<Value>) -> Result<(), ConverterError> {
        self.0.push(opargs.pop().ok_or_else(|| {
            ConverterError::new("accumulator option expects exactly one value")
        })?);
        Ok(())
    }

    fn render(&self) -> Value {
        Value::Seq(self.0.clone())
    }
}

impl MultiOptionFactory for Accumulator {
    fn oparg_converters(&self) -> Vec<ConverterRef> {
        vec![self.element.clone()]
    }

    fn new_instance(&self) -> Box<dyn MultiOption> {
        Box::<AccumulatorState>::default()
    }

    fn metavar(&self) -> String {
        self.element.metavar()
    }
}

/// `mapping[K,V]`: repeatable option taking two opargs, renders the map
/// built from all `(key, value)` pairs seen, keyed by the rendered string
/// form of the key.
pub struct Mapping {
    pub key: ConverterRef,
    pub value: ConverterRef,
}

#[derive(Debug, Default)]
struct MappingState(BTreeMap<String, Value>);

impl MultiOption for MappingState {
    fn option(&mut self, mut opargs: Vec<Value>) -> Result<(), ConverterError> {
        if opargs.len() != 2 {
            return Err(ConverterError::new("mapping option expects a key and a value"));
        }
        let value = opargs.pop().unwrap();
        let key = opargs.pop().unwrap();
        self.0.insert(key.to_string(), value);
        Ok(())
    }

    fn render(&self) -> Value {
        Value::Map(self.0.clone())
    }
}

impl MultiOptionFactory for Mapping {
    fn oparg_converters(&self) -> Vec<ConverterRef> {
        vec![self.key.clone(), self.value.clone()]
    }

    fn new_instance(&self) -> Box<dyn MultiOption> {
        Box::<MappingState>::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Primitive;

    #[test]
    fn counter_counts_invocations() {
        let mut s = CounterState::default();
        s.option(vec![]).unwrap();
        s.option(vec![]).unwrap();
        s.option(vec![]).unwrap();
        assert_eq!(s.render(), Value::Int(3));
    }

    #[test]
    fn accumulator_collects_in_order() {
        let _ = Primitive::Str;
        let mut s = AccumulatorState::default();
        s.option(vec![Value::Str("a".into())]).unwrap();
        s.option(vec![Value::Str("b".into())]).unwrap();
        assert_eq!(
            s.render(),
            Value::Seq(vec![Value::Str("a".into()), Value::Str("b".into())])
        );
    }

    #[test]
    fn mapping_collects_pairs() {
        let mut s = MappingState::default();
        s.option(vec![Value::Str("k".into()), Value::Int(1)]).unwrap();
        let Value::Map(m) = s.render() else { panic!("expected map") };
        assert_eq!(m.get("k"), Some(&Value::Int(1)));
    }
}
