//! Component D from spec.md §4.D: the bytecode interpreter. Walks a
//! compiled [`Program`] against a tokenized [`Args`] stream, resolving
//! every ambiguity the compiler deliberately left for runtime - short
//! cluster decomposition, optional-group commitment, option scope - and
//! produces the root command's exit code.

use std::collections::{HashMap, HashSet};

use crate::arg::{Arg, Args};
use crate::charm::{GroupId, Instruction, OptionEntry, ParamIndex, Program};
use crate::convert::{ConverterNode, ConverterRef, NodeFn, NodeId, Parameter};
use crate::error::{CommandError, ConverterError, UsageError};
use crate::multi_option::MultiOption;
use crate::primitive::Primitive;
use crate::value::Value;

fn parameter_at(node: &ConverterNode, slot: ParamIndex) -> &Parameter {
    match slot {
        ParamIndex::Positional(ix) => &node.positional[ix],
        ParamIndex::VarPositional => node.var_positional.as_ref().expect("var_positional slot"),
        ParamIndex::Keyword(ix) => &node.keyword[ix],
    }
}

#[derive(Clone, Copy)]
struct ScopeEntry {
    node: NodeId,
    slot: ParamIndex,
    /// `Some` when this mapping came from an `EarlyMap` rather than a plain
    /// `MapOption` - invoking the option then commits this group (spec.md
    /// §4.C), since the user has proven they want this optional subtree's
    /// frame to exist even before its own converter is reached.
    early_group: Option<GroupId>,
}

struct Frame {
    node: NodeId,
    positional: Vec<Value>,
    keyword: HashMap<String, Value>,
    for_slot: Option<(NodeId, ParamIndex)>,
}

/// What happened while running the command the user actually typed.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Exit(i32),
    CommandFailed(CommandError),
}

pub struct Interpreter<'p> {
    program: &'p Program,
    tokens: std::collections::VecDeque<Arg>,
    scopes: HashMap<String, ScopeEntry>,
    committed_groups: HashSet<GroupId>,
    multi_instances: HashMap<(NodeId, ParamIndex), Box<dyn MultiOption>>,
    multi_invoked: HashSet<(NodeId, ParamIndex)>,
    seen_scalar_options: HashSet<(NodeId, ParamIndex)>,
    frames: Vec<Frame>,
    last_value: Option<Value>,
}

pub fn interpret(program: &Program, args: Args) -> Result<Outcome, UsageError> {
    let (outcome, mut tokens) = interpret_tokens(program, args.items.into())?;
    if let Some(extra) = tokens.pop_front() {
        return Err(UsageError::too_many_arguments(&extra.to_string()));
    }
    Ok(outcome)
}

/// Like [`interpret`], but takes/returns a raw token queue instead of
/// asserting it's fully drained - used by the command dispatcher
/// (spec.md §4.E) to run a global command's program and then hand
/// whatever tokens it left over (presumably a subcommand name and its own
/// arguments) on to the resolved command's own program.
pub(crate) fn interpret_tokens(
    program: &Program,
    tokens: std::collections::VecDeque<Arg>,
) -> Result<(Outcome, std::collections::VecDeque<Arg>), UsageError> {
    let mut interp = Interpreter {
        program,
        tokens,
        scopes: HashMap::new(),
        committed_groups: HashSet::new(),
        multi_instances: HashMap::new(),
        multi_invoked: HashSet::new(),
        seen_scalar_options: HashSet::new(),
        frames: Vec::new(),
        last_value: None,
    };
    let outcome = match interp.run_block(&program.main) {
        Ok(RunTermination::Code(code)) => Outcome::Exit(code),
        Ok(RunTermination::Command(err)) => Outcome::CommandFailed(err),
        Ok(RunTermination::Value(_)) => unreachable!("root program always ends in a command call"),
        Err(e) => return Err(e),
    };
    Ok((outcome, interp.tokens))
}

enum RunTermination {
    Value(Value),
    Code(i32),
    Command(CommandError),
}

impl<'p> Interpreter<'p> {
    fn node(&self, id: NodeId) -> &ConverterNode {
        self.program.node_table.get(&id).expect("node in table")
    }

    fn run_block(&mut self, block: &[Instruction]) -> Result<RunTermination, UsageError> {
        let depth_before = self.frames.len();
        let mut pc = 0usize;
        let mut termination = None;
        while pc < block.len() {
            match &block[pc] {
                Instruction::EnterConverter { node, for_slot } => {
                    let n = self.node(*node);
                    let mut keyword = HashMap::new();
                    for kw in &n.keyword {
                        keyword.insert(kw.name.clone(), kw.default.clone().unwrap_or(Value::Empty));
                    }
                    self.frames.push(Frame {
                        node: *node,
                        positional: Vec::new(),
                        keyword,
                        for_slot: *for_slot,
                    });
                    pc += 1;
                }
                Instruction::ConsumeArgument { node, slot } => {
                    let n = self.node(*node);
                    let param = parameter_at(n, *slot).clone();
                    let value = self.consume_for(&param)?;
                    self.store_positional(*node, *slot, value);
                    pc += 1;
                }
                Instruction::ConsumeVarPositional { node, body } => {
                    let mut collected = Vec::new();
                    loop {
                        if !self.has_more_positional_input()? {
                            break;
                        }
                        match self.run_block(body)? {
                            RunTermination::Value(v) => collected.push(v),
                            _ => unreachable!("var-positional body never terminates in a command"),
                        }
                    }
                    self.store_var_positional(*node, Value::Seq(collected));
                    pc += 1;
                }
                Instruction::MapOption { option, node, slot } => {
                    self.scopes.insert(
                        option.clone(),
                        ScopeEntry { node: *node, slot: *slot, early_group: None },
                    );
                    pc += 1;
                }
                Instruction::EarlyMap { option, node, slot, group } => {
                    self.scopes.insert(
                        option.clone(),
                        ScopeEntry { node: *node, slot: *slot, early_group: Some(*group) },
                    );
                    pc += 1;
                }
                Instruction::UnmapOption { option } => {
                    self.scopes.remove(option);
                    pc += 1;
                }
                Instruction::OptionalGroupBegin { group } => {
                    // Peek whether there's anything left to consume; if not
                    // and the group never gets committed by one of its own
                    // early-mapped options, skip straight to its matching
                    // end and let the owning parameter fall back to its
                    // default (spec.md §4.C).
                    if !self.has_more_positional_input()? && !self.committed_groups.contains(group)
                    {
                        pc = self.skip_group(block, pc, *group);
                        continue;
                    }
                    pc += 1;
                }
                Instruction::OptionalGroupEnd { .. } => {
                    pc += 1;
                }
                Instruction::DrainOptions => {
                    self.has_more_positional_input()?;
                    pc += 1;
                }
                Instruction::CallConverter { node } => {
                    let frame = self.frames.pop().expect("matching EnterConverter");
                    debug_assert_eq!(frame.node, *node);
                    let n = self.node(*node);
                    let mut keyword = std::collections::BTreeMap::new();
                    for kw in &n.keyword {
                        let key = (*node, self.slot_of(n, &kw.name));
                        let v = if self.multi_invoked.contains(&key) {
                            self.multi_instances.get(&key).map(|m| m.render()).unwrap_or_else(|| {
                                frame.keyword.get(&kw.name).cloned().unwrap_or(Value::Empty)
                            })
                        } else {
                            frame.keyword.get(&kw.name).cloned().unwrap_or(Value::Empty)
                        };
                        keyword.insert(kw.name.clone(), v);
                    }
                    let outcome = match &n.func {
                        NodeFn::Converter(f) => {
                            let v = f(&frame.positional, &keyword)
                                .map_err(|e| UsageError::converter_failed(&n.name, &e))?;
                            RunTermination::Value(Value::Node(*node, Box::new(v)))
                        }
                        NodeFn::Command(f) => match f(&frame.positional, &keyword) {
                            Ok(code) => RunTermination::Code(code),
                            Err(err) => RunTermination::Command(err),
                        },
                    };
                    match (&outcome, frame.for_slot) {
                        (RunTermination::Value(v), Some((parent_node, slot))) => {
                            self.store_positional(parent_node, slot, v.clone());
                        }
                        (RunTermination::Value(_), None) => {}
                        _ => {}
                    }
                    if self.frames.len() <= depth_before {
                        termination = Some(outcome);
                        pc += 1;
                        break;
                    }
                    pc += 1;
                }
                Instruction::EndProgram => {
                    pc += 1;
                    break;
                }
            }
        }
        if let Some(t) = termination {
            return Ok(t);
        }
        // A block invoked on demand (a keyword option's subprogram) never
        // hits EndProgram; its result was recorded by the CallConverter
        // branch above once its frame count dropped back to where it
        // started.
        Ok(RunTermination::Value(self.last_value.take().unwrap_or(Value::Empty)))
    }

    fn slot_of(&self, node: &ConverterNode, keyword_name: &str) -> ParamIndex {
        let ix = node.keyword.iter().position(|k| k.name == keyword_name).unwrap();
        ParamIndex::Keyword(ix)
    }

    fn store_positional(&mut self, node: NodeId, slot: ParamIndex, value: Value) {
        if let Some(frame) = self.frames.iter_mut().rev().find(|f| f.node == node) {
            match slot {
                ParamIndex::Positional(ix) => {
                    if frame.positional.len() <= ix {
                        frame.positional.resize(ix + 1, Value::Empty);
                    }
                    frame.positional[ix] = value;
                }
                ParamIndex::Keyword(_) => {
                    let n = self.program.node_table.get(&node).unwrap();
                    let name = parameter_at(n, slot).name.clone();
                    frame.keyword.insert(name, value);
                }
                ParamIndex::VarPositional => {
                    frame.positional.push(value);
                }
            }
        } else {
            self.last_value = Some(value);
        }
    }

    fn store_var_positional(&mut self, node: NodeId, value: Value) {
        if let Some(frame) = self.frames.iter_mut().rev().find(|f| f.node == node) {
            frame.positional.push(value);
        }
    }

    /// Find the matching `OptionalGroupEnd` for the group opened at
    /// `start` (a `OptionalGroupBegin`), accounting for groups nested
    /// inside it, and return the index just past it.
    fn skip_group(&self, block: &[Instruction], start: usize, group: GroupId) -> usize {
        let mut depth = 0i32;
        let mut pc = start;
        loop {
            match &block[pc] {
                Instruction::OptionalGroupBegin { .. } => depth += 1,
                Instruction::OptionalGroupEnd { group: g } if *g == group && depth == 1 => {
                    return pc + 1;
                }
                Instruction::OptionalGroupEnd { .. } => depth -= 1,
                _ => {}
            }
            pc += 1;
            if pc >= block.len() {
                return pc;
            }
        }
    }

    /// Process any option tokens sitting at the front of the stream, then
    /// report whether a positional-shaped token remains.
    fn has_more_positional_input(&mut self) -> Result<bool, UsageError> {
        loop {
            match self.tokens.front() {
                None => return Ok(false),
                Some(Arg::Word(_)) | Some(Arg::PosWord(_)) => return Ok(true),
                Some(_) => self.process_option_token()?,
            }
        }
    }

    fn consume_for(&mut self, param: &Parameter) -> Result<Value, UsageError> {
        if !self.has_more_positional_input()? {
            return Err(UsageError::missing_argument(&param.name));
        }
        let token = match self.tokens.pop_front() {
            Some(Arg::Word(s)) | Some(Arg::PosWord(s)) => s,
            _ => unreachable!("has_more_positional_input guarantees a word token"),
        };
        self.convert_token(&param.converter, &token)
    }

    fn convert_token(&mut self, converter: &ConverterRef, token: &str) -> Result<Value, UsageError> {
        match converter {
            ConverterRef::Primitive(p) => p
                .parse(token)
                .map_err(|e| UsageError::converter_failed(token, &e)),
            ConverterRef::BooleanToggle(default) => Ok(Value::Bool(!default)),
            ConverterRef::MultiOption(factory) => {
                let converters = factory.oparg_converters();
                match converters.first() {
                    Some(c) => self.convert_token(c, token),
                    None => Ok(Value::Str(token.to_string())),
                }
            }
            ConverterRef::Node(_) => unreachable!("a Node converter never sits behind a bare token consume"),
        }
    }

    fn process_option_token(&mut self) -> Result<(), UsageError> {
        let raw = self.tokens.pop_front().expect("caller checked front");
        match raw {
            Arg::Long(name) => self.dispatch_option(&format!("--{name}"), None),
            Arg::LongEq(name, value) => self.dispatch_option(&format!("--{name}"), Some(value)),
            Arg::ShortEq(c, value) => self.dispatch_option(&format!("-{c}"), Some(value)),
            Arg::ShortCluster(letters) => self.dispatch_short_cluster(&letters),
            Arg::Word(_) | Arg::PosWord(_) => unreachable!("caller only calls on option-shaped tokens"),
        }
    }

    fn dispatch_short_cluster(&mut self, letters: &str) -> Result<(), UsageError> {
        let mut chars = letters.chars();
        let first = chars.next().expect("non-empty cluster");
        let first_opt = format!("-{first}");
        let Some(entry) = self.scopes.get(&first_opt).copied() else {
            return Err(self.unknown_option_error(&first_opt));
        };
        let remainder: String = chars.collect();
        if remainder.is_empty() {
            return self.invoke_option(&first_opt, entry, None);
        }
        if self.option_takes_inline_value(&entry) {
            let value = remainder;
            return self.invoke_option(&first_opt, entry, Some(value));
        }
        self.invoke_option(&first_opt, entry, None)?;
        self.tokens.push_front(Arg::ShortCluster(remainder));
        Ok(())
    }

    fn option_takes_inline_value(&self, entry: &ScopeEntry) -> bool {
        let n = self.node(entry.node);
        let param = parameter_at(n, entry.slot);
        !matches!(param.converter, ConverterRef::BooleanToggle(_))
            && !matches!(&param.converter, ConverterRef::MultiOption(f) if f.oparg_converters().is_empty())
    }

    fn dispatch_option(&mut self, option: &str, inline_value: Option<String>) -> Result<(), UsageError> {
        match self.scopes.get(option).copied() {
            Some(entry) => self.invoke_option(option, entry, inline_value),
            None => Err(self.unknown_option_error(option)),
        }
    }

    fn unknown_option_error(&self, option: &str) -> UsageError {
        if let Some(OptionEntry { gated_by: Some(parent), .. }) = self.program.option_table.get(option) {
            return UsageError::scope_violation(option, parent);
        }
        match crate::meta_youmean::suggest(option, self.program.option_table.keys()) {
            Some(suggestion) => UsageError::unknown_option(option)
                .with_suggestion(format!("did you mean {suggestion}?")),
            None => UsageError::unknown_option(option),
        }
    }

    fn invoke_option(
        &mut self,
        option: &str,
        entry: ScopeEntry,
        inline_value: Option<String>,
    ) -> Result<(), UsageError> {
        if let Some(group) = entry.early_group {
            self.committed_groups.insert(group);
        }

        let n = self.node(entry.node);
        let param = parameter_at(n, entry.slot).clone();
        let key = (entry.node, entry.slot);

        match &param.converter {
            ConverterRef::BooleanToggle(default) => {
                if inline_value.is_some() {
                    return Err(UsageError::zero_arity_oparg(option));
                }
                if !self.seen_scalar_options.insert(key) {
                    return Err(UsageError::only_once(option));
                }
                self.store_positional(entry.node, entry.slot, Value::Bool(!default));
            }
            ConverterRef::Primitive(p) => {
                if !self.seen_scalar_options.insert(key) {
                    return Err(UsageError::only_once(option));
                }
                let token = match inline_value {
                    Some(v) => v,
                    None => self.take_oparg_token(option)?,
                };
                let value = p.parse(&token).map_err(|e| UsageError::converter_failed(option, &e))?;
                self.store_positional(entry.node, entry.slot, value);
            }
            ConverterRef::MultiOption(factory) => {
                let converters = factory.oparg_converters();
                let mut opargs = Vec::with_capacity(converters.len());
                if let Some(first) = converters.first() {
                    let token = match &inline_value {
                        Some(v) => v.clone(),
                        None => self.take_oparg_token(option)?,
                    };
                    opargs.push(self.convert_token(first, &token)?);
                    for c in &converters[1..] {
                        let token = self.take_oparg_token(option)?;
                        opargs.push(self.convert_token(c, &token)?);
                    }
                } else if inline_value.is_some() {
                    return Err(UsageError::zero_arity_oparg(option));
                }
                let instance = self
                    .multi_instances
                    .entry(key)
                    .or_insert_with(|| factory.new_instance());
                instance
                    .option(opargs)
                    .map_err(|e| UsageError::converter_failed(option, &e))?;
                self.multi_invoked.insert(key);
            }
            ConverterRef::Node(child) => {
                if !self.seen_scalar_options.insert(key) {
                    return Err(UsageError::only_once(option));
                }
                if let Some(value) = inline_value {
                    self.tokens.push_front(Arg::Word(value));
                }
                let body = self
                    .program
                    .option_programs
                    .get(&child.id)
                    .expect("option program compiled for every keyword Node converter")
                    .clone();
                match self.run_block(&body)? {
                    RunTermination::Value(v) => self.store_positional(entry.node, entry.slot, v),
                    _ => unreachable!("an option's own converter never terminates as a command"),
                }
            }
        }
        Ok(())
    }

    fn take_oparg_token(&mut self, option: &str) -> Result<String, UsageError> {
        match self.tokens.pop_front() {
            Some(Arg::Word(s)) | Some(Arg::PosWord(s)) => Ok(s),
            Some(other) => {
                self.tokens.push_front(other);
                Err(UsageError::missing_argument(option))
            }
            None => Err(UsageError::missing_argument(option)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charm::compile;
    use crate::convert::NodeBuilder;

    fn run(root: std::rc::Rc<ConverterNode>, argv: &[&str]) -> Outcome {
        let program = compile(root).unwrap();
        interpret(&program, Args::from_strs(argv)).unwrap()
    }

    #[test]
    fn simple_positional_roundtrip() {
        let seen = std::rc::Rc::new(std::cell::RefCell::new(String::new()));
        let seen2 = seen.clone();
        let root = NodeBuilder::new("hello")
            .positional("name", ConverterRef::Primitive(Primitive::Str))
            .unwrap()
            .build_command(move |pos, _| {
                *seen2.borrow_mut() = pos[0].to_string();
                Ok(0)
            });
        let outcome = run(root, &["world"]);
        assert!(matches!(outcome, Outcome::Exit(0)));
        assert_eq!(*seen.borrow(), "world");
    }

    #[test]
    fn missing_required_positional_is_a_usage_error() {
        let root = NodeBuilder::new("hello")
            .positional("name", ConverterRef::Primitive(Primitive::Str))
            .unwrap()
            .build_command(|_, _| Ok(0));
        let program = compile(root).unwrap();
        let err = interpret(&program, Args::from_strs(&[])).unwrap_err();
        assert!(err.to_string().contains("missing argument"));
    }

    #[test]
    fn optional_positional_falls_back_to_default() {
        let root = NodeBuilder::new("fgrep")
            .positional("pattern", ConverterRef::Primitive(Primitive::Str))
            .unwrap()
            .positional_with_default(
                "filename",
                ConverterRef::Primitive(Primitive::Str),
                Value::Str("-".into()),
            )
            .unwrap()
            .build_command(|pos, _| {
                assert_eq!(pos[1], Value::Str("-".into()));
                Ok(0)
            });
        let outcome = run(root, &["needle"]);
        assert!(matches!(outcome, Outcome::Exit(0)));
    }

    #[test]
    fn boolean_flag_toggles() {
        let root = NodeBuilder::new("cmd")
            .option(
                "verbose",
                &["-v", "--verbose"],
                ConverterRef::BooleanToggle(false),
                Some(Value::Bool(false)),
            )
            .unwrap()
            .build_command(|_, kw| {
                assert_eq!(kw.get("verbose"), Some(&Value::Bool(true)));
                Ok(0)
            });
        let outcome = run(root, &["-v"]);
        assert!(matches!(outcome, Outcome::Exit(0)));
    }

    #[test]
    fn short_cluster_of_flags_decomposes() {
        let root = NodeBuilder::new("cmd")
            .option("a", &["-a"], ConverterRef::BooleanToggle(false), Some(Value::Bool(false)))
            .unwrap()
            .option("b", &["-b"], ConverterRef::BooleanToggle(false), Some(Value::Bool(false)))
            .unwrap()
            .build_command(|_, kw| {
                assert_eq!(kw.get("a"), Some(&Value::Bool(true)));
                assert_eq!(kw.get("b"), Some(&Value::Bool(true)));
                Ok(0)
            });
        let outcome = run(root, &["-ab"]);
        assert!(matches!(outcome, Outcome::Exit(0)));
    }

    #[test]
    fn unknown_option_is_a_usage_error() {
        let root = NodeBuilder::new("cmd").build_command(|_, _| Ok(0));
        let program = compile(root).unwrap();
        let err = interpret(&program, Args::from_strs(&["--bogus"])).unwrap_err();
        assert!(err.to_string().contains("not expected"));
    }

    #[test]
    fn counter_multi_option_counts_repeats() {
        use crate::multi_option::Counter;
        let root = NodeBuilder::new("cmd")
            .option(
                "verbose",
                &["-v"],
                ConverterRef::MultiOption(std::rc::Rc::new(Counter)),
                Some(Value::Int(0)),
            )
            .unwrap()
            .build_command(|_, kw| {
                assert_eq!(kw.get("verbose"), Some(&Value::Int(3)));
                Ok(0)
            });
        let outcome = run(root, &["-v", "-v", "-v"]);
        assert!(matches!(outcome, Outcome::Exit(0)));
    }
}
