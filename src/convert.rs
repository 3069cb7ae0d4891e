//! Component A (signature model) and component B (converter tree builder)
//! from spec.md §4.
//!
//! A native Rust function carries none of the runtime introspection a
//! dynamically-typed callable does, so there is no `signature_of` to call
//! on an arbitrary `fn`. Per spec.md §9's own design note this is replaced
//! by an explicit registration API: [`NodeBuilder`] is handed one
//! positional/var-positional/keyword-only parameter at a time, each paired
//! with a [`ConverterRef`] built once up front, and produces an immutable
//! [`ConverterNode`] - the "tagged variant" the design notes call for.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{CommandError, ConfigurationError, ConverterError};
use crate::multi_option::MultiOptionFactory;
use crate::primitive::Primitive;
use crate::value::Value;

pub type NodeId = usize;

fn next_node_id() -> NodeId {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Parameter kind, per spec.md §3. Invariant: `KeywordOnly` always carries
/// a default; `VarPositional` never does.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ParamKind {
    Positional,
    VarPositional,
    KeywordOnly,
}

/// A single parameter descriptor (spec.md §3's "Parameter descriptor").
#[derive(Clone)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
    pub converter: ConverterRef,
    /// Option strings registered for a keyword-only parameter. Empty until
    /// the default-option-generator or an explicit override fills it in
    /// (see [`NodeBuilder::option`]).
    pub option_strings: Vec<String>,
    /// One line (or a few, `\n`-separated) of prose, rendered by component E
    /// next to this parameter's entry in `--help`. Never consulted by the
    /// compiler or interpreter.
    pub help: Option<String>,
}

impl Parameter {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("has_default", &self.has_default())
            .field("option_strings", &self.option_strings)
            .finish()
    }
}

/// The effective converter for a parameter, chosen per spec.md §4.B's
/// priority rules and built once at registration time (spec.md §9).
#[derive(Clone)]
pub enum ConverterRef {
    Primitive(Primitive),
    /// Consumes no token; negates its boolean default. Synthesized for a
    /// keyword-only parameter whose default is a bool (spec.md §4.B rule 2).
    BooleanToggle(bool),
    Node(Rc<ConverterNode>),
    MultiOption(Rc<dyn MultiOptionFactory>),
}

impl ConverterRef {
    /// Whether one invocation of this converter is guaranteed to consume
    /// at least one positional token - the legality check spec.md §4.C
    /// requires of a var-positional parameter's converter, to rule out an
    /// infinite loop in the compiled program.
    pub(crate) fn requires_a_token(&self) -> bool {
        match self {
            ConverterRef::Primitive(_) => true,
            ConverterRef::BooleanToggle(_) => false,
            ConverterRef::MultiOption(_) => false,
            ConverterRef::Node(node) => node.positional.iter().any(|p| !p.has_default()),
        }
    }

    pub(crate) fn metavar(&self) -> String {
        match self {
            ConverterRef::Primitive(p) => p.metavar().to_string(),
            ConverterRef::BooleanToggle(_) => String::new(),
            ConverterRef::MultiOption(f) => f.metavar(),
            ConverterRef::Node(node) => node.name.to_uppercase(),
        }
    }
}

/// What a node's callable is: the root of a tree is a command (returns an
/// exit code); every other node is an ordinary converter (returns a
/// [`Value`] that gets bound into its parent's argument slot).
#[derive(Clone)]
pub enum NodeFn {
    Command(Rc<dyn Fn(&[Value], &BTreeMap<String, Value>) -> Result<i32, CommandError>>),
    Converter(Rc<dyn Fn(&[Value], &BTreeMap<String, Value>) -> Result<Value, ConverterError>>),
}

/// A converter node: spec.md §3's "Converter node". The tree formed by
/// following `Parameter::converter` from a root is a DAG only in
/// appearance - the same `Rc<ConverterNode>` reused for two parameters
/// really does mean two independent subtrees share structure by value,
/// exactly as spec.md §9 calls for ("share by value, not by reference").
pub struct ConverterNode {
    pub id: NodeId,
    pub name: String,
    pub positional: Vec<Parameter>,
    pub var_positional: Option<Parameter>,
    pub keyword: Vec<Parameter>,
    pub func: NodeFn,
    /// One-line command/converter description, rendered above the option
    /// listing in `--help` (component E). Never consulted by the compiler
    /// or interpreter.
    pub descr: Option<String>,
}

impl ConverterNode {
    pub fn is_command(&self) -> bool {
        matches!(self.func, NodeFn::Command(_))
    }

    /// All parameters in declaration order, positional first, then the
    /// var-positional slot if any, then keyword-only parameters.
    pub fn all_parameters(&self) -> Vec<&Parameter> {
        let mut out: Vec<&Parameter> = self.positional.iter().collect();
        if let Some(vp) = &self.var_positional {
            out.push(vp);
        }
        out.extend(self.keyword.iter());
        out
    }
}

/// Builds one [`ConverterNode`], enforcing the legality rules of
/// spec.md §4.B.
#[derive(Debug)]
pub struct NodeBuilder {
    name: String,
    positional: Vec<Parameter>,
    var_positional: Option<Parameter>,
    keyword: Vec<Parameter>,
    seen_names: std::collections::HashSet<String>,
    descr: Option<String>,
}

impl NodeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        NodeBuilder {
            name: name.into(),
            positional: Vec::new(),
            var_positional: None,
            keyword: Vec::new(),
            seen_names: std::collections::HashSet::new(),
            descr: None,
        }
    }

    fn check_name(&mut self, name: &str) -> Result<(), ConfigurationError> {
        if !self.seen_names.insert(name.to_string()) {
            return Err(ConfigurationError::duplicate_parameter(name));
        }
        Ok(())
    }

    /// A one-line description shown above this node's option listing.
    pub fn descr(mut self, text: impl Into<String>) -> Self {
        self.descr = Some(text.into());
        self
    }

    /// Attaches help text to an already-registered parameter by name. A
    /// no-op if `name` doesn't match anything registered so far.
    pub fn help(mut self, name: &str, text: impl Into<String>) -> Self {
        let text = text.into();
        if let Some(p) = self.positional.iter_mut().find(|p| p.name == name) {
            p.help = Some(text);
        } else if self.var_positional.as_ref().is_some_and(|p| p.name == name) {
            self.var_positional.as_mut().unwrap().help = Some(text);
        } else if let Some(p) = self.keyword.iter_mut().find(|p| p.name == name) {
            p.help = Some(text);
        }
        self
    }

    /// A required positional parameter.
    pub fn positional(mut self, name: impl Into<String>, converter: ConverterRef) -> Result<Self, ConfigurationError> {
        let name = name.into();
        self.check_name(&name)?;
        self.positional.push(Parameter {
            name,
            kind: ParamKind::Positional,
            default: None,
            converter,
            option_strings: Vec::new(),
            help: None,
        });
        Ok(self)
    }

    /// A positional parameter with a default: opens an optional group
    /// (spec.md §4.C) at the point the grammar compiler emits it.
    pub fn positional_with_default(
        mut self,
        name: impl Into<String>,
        converter: ConverterRef,
        default: Value,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        self.check_name(&name)?;
        if matches!(default, Value::Empty) {
            return Err(ConfigurationError::empty_default(name));
        }
        self.positional.push(Parameter {
            name,
            kind: ParamKind::Positional,
            default: Some(default),
            converter,
            option_strings: Vec::new(),
            help: None,
        });
        Ok(self)
    }

    /// The single var-positional parameter, if any. Rejected if its
    /// converter can't guarantee consuming at least one token per
    /// iteration (spec.md §4.B).
    pub fn var_positional(
        mut self,
        name: impl Into<String>,
        converter: ConverterRef,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        self.check_name(&name)?;
        if !converter.requires_a_token() {
            return Err(ConfigurationError::var_positional_needs_positional(name));
        }
        self.var_positional = Some(Parameter {
            name,
            kind: ParamKind::VarPositional,
            default: None,
            converter,
            option_strings: Vec::new(),
            help: None,
        });
        Ok(self)
    }

    /// A keyword-only parameter, always carrying a default (spec.md §3's
    /// invariant). `option_strings` may be empty, in which case
    /// [`NodeBuilder::finish`] runs the default option-generator
    /// (`--name-with-dashes`, plus `-f` if the first letter is free) once
    /// every parameter for this node has been declared.
    pub fn option(
        mut self,
        name: impl Into<String>,
        option_strings: &[&str],
        converter: ConverterRef,
        default: Option<Value>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        self.check_name(&name)?;
        let default = match default {
            None => return Err(ConfigurationError::missing_default(name)),
            Some(v) if matches!(v, Value::Empty) => {
                return Err(ConfigurationError::empty_default(name))
            }
            Some(v) => v,
        };
        for existing in self.keyword.iter().chain(self.positional.iter()) {
            for s in &existing.option_strings {
                if option_strings.contains(&s.as_str()) {
                    return Err(ConfigurationError::duplicate_option(
                        s.clone(),
                        existing.name.clone(),
                        name,
                    ));
                }
            }
        }
        self.keyword.push(Parameter {
            name,
            kind: ParamKind::KeywordOnly,
            default: Some(default),
            converter,
            option_strings: option_strings.iter().map(|s| s.to_string()).collect(),
            help: None,
        });
        Ok(self)
    }

    /// Finalize this node as an ordinary converter, returning a [`Value`]
    /// on success.
    pub fn build_converter(
        self,
        func: impl Fn(&[Value], &BTreeMap<String, Value>) -> Result<Value, ConverterError> + 'static,
    ) -> Rc<ConverterNode> {
        self.finish(NodeFn::Converter(Rc::new(func)))
    }

    /// Finalize this node as a command, returning an exit code on success.
    pub fn build_command(
        self,
        func: impl Fn(&[Value], &BTreeMap<String, Value>) -> Result<i32, CommandError> + 'static,
    ) -> Rc<ConverterNode> {
        self.finish(NodeFn::Command(Rc::new(func)))
    }

    fn finish(mut self, func: NodeFn) -> Rc<ConverterNode> {
        generate_missing_option_strings(&mut self.keyword);
        Rc::new(ConverterNode {
            id: next_node_id(),
            name: self.name,
            positional: self.positional,
            var_positional: self.var_positional,
            keyword: self.keyword,
            func,
            descr: self.descr,
        })
    }
}

/// spec.md §4.B's default option-generator: any keyword-only parameter
/// with no explicitly-registered option strings gets `--name-with-dashes`
/// and, if the letter is still free at this node, `-first-letter`.
/// Collisions are resolved first-come, first-served in declaration order -
/// a parameter earlier in `keyword` always wins a contested short flag.
fn generate_missing_option_strings(keyword: &mut [Parameter]) {
    let mut used: std::collections::HashSet<String> = keyword
        .iter()
        .flat_map(|p| p.option_strings.iter().cloned())
        .collect();
    for p in keyword.iter_mut() {
        if !p.option_strings.is_empty() {
            continue;
        }
        let long = format!("--{}", p.name.replace('_', "-"));
        let mut generated = vec![long.clone()];
        used.insert(long);
        if let Some(letter) = p.name.chars().next() {
            let short = format!("-{letter}");
            if used.insert(short.clone()) {
                generated.push(short);
            }
        }
        p.option_strings = generated;
    }
}
