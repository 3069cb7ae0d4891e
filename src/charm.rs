//! Component C from spec.md §4.C: the grammar compiler, "Charm". Walks a
//! [`ConverterNode`] tree depth-first and flattens it into the linear
//! instruction program described in spec.md §3.
//!
//! Two kinds of converter occurrence get compiled differently:
//!
//! - A positional or var-positional parameter's converter runs exactly
//!   once (or, for var-positional, a variable number of times in a fixed
//!   stream position) every time its enclosing frame runs, so its body is
//!   inlined directly into the parent's instruction stream - this is what
//!   lets [`Instruction::EnterConverter`]/[`Instruction::CallConverter`]
//!   nest arbitrarily deep within one flat `Vec`.
//! - A keyword-only parameter's converter runs zero, one, or (through a
//!   [`crate::multi_option::MultiOption`]) many times, at a stream
//!   position nothing but the user's own input determines. Its body is
//!   compiled once into [`Program::option_programs`] and invoked by the
//!   interpreter on demand, each time the governing option is seen.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::convert::{ConverterNode, ConverterRef, NodeId};
use crate::error::ConfigurationError;

pub type GroupId = usize;

/// Which parameter slot an instruction concerns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamIndex {
    Positional(usize),
    VarPositional,
    Keyword(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// `for_slot` says where this frame's eventual result belongs once
    /// `CallConverter` runs: `None` for the root command and for any
    /// keyword-option subprogram (those are entered on demand; the
    /// interpreter already knows, from the `MapOption`/`EarlyMap` it
    /// followed to get here, which frame's slot owns the result), `Some`
    /// for a converter inlined directly into a positional or
    /// var-positional slot, which has no other instruction to carry that
    /// routing information.
    EnterConverter { node: NodeId, for_slot: Option<(NodeId, ParamIndex)> },
    /// Consume one positional token for the given slot of `node`.
    ConsumeArgument { node: NodeId, slot: ParamIndex },
    /// Run `node`'s var-positional slot zero or more times, consuming one
    /// token (or one child-converter occurrence) from the stream each
    /// time, until the stream offers nothing this slot can take.
    ConsumeVarPositional { node: NodeId, body: Vec<Instruction> },
    MapOption { option: String, node: NodeId, slot: ParamIndex },
    /// Like `MapOption`, but emitted at an enclosing `OptionalGroupBegin`
    /// instead of at the owning node's own entry (spec.md §4.C's "early
    /// mapping" design decision). `group` is that enclosing group: using
    /// one of these options before the group's own frame is reached is
    /// what commits the group, so the interpreter needs to know which one.
    EarlyMap { option: String, node: NodeId, slot: ParamIndex, group: GroupId },
    UnmapOption { option: String },
    OptionalGroupBegin { group: GroupId },
    OptionalGroupEnd { group: GroupId },
    /// Process any option tokens sitting at the front of the stream without
    /// requiring a positional token to follow. Every other instruction that
    /// touches the stream does this as a side effect of looking for a
    /// positional token to consume; a node with no positional parameters at
    /// all has no such instruction, so its own keyword options would never
    /// get a chance to run without this one emitted just before its
    /// `CallConverter`.
    DrainOptions,
    CallConverter { node: NodeId },
    EndProgram,
}

/// The compiled artifact for one root callable: immutable, built once,
/// safe to share across concurrent interpreter instances (spec.md §5).
pub struct Program {
    pub root: NodeId,
    pub main: Vec<Instruction>,
    pub option_programs: HashMap<NodeId, Vec<Instruction>>,
    pub node_table: HashMap<NodeId, Rc<ConverterNode>>,
    pub option_table: HashMap<String, OptionEntry>,
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("root", &self.root)
            .field("main", &self.main)
            .field("option_programs", &self.option_programs)
            .field("node_table", &self.node_table.keys().collect::<Vec<_>>())
            .field("option_table", &self.option_table)
            .finish()
    }
}

/// Global information about one option string, gathered across the whole
/// tree - used for "did you mean" suggestions and for distinguishing an
/// outright unknown option from one that merely isn't in scope yet
/// (spec.md §4.D's child/parent scope rule, property 6 in §8).
#[derive(Clone, Debug)]
pub struct OptionEntry {
    pub node: NodeId,
    pub slot: ParamIndex,
    /// If this option only becomes reachable after another option's
    /// converter frame is entered, that option's primary (first) name.
    pub gated_by: Option<String>,
}

struct Compiler {
    group_seq: GroupId,
    node_table: HashMap<NodeId, Rc<ConverterNode>>,
    option_programs: HashMap<NodeId, Vec<Instruction>>,
    option_table: HashMap<String, OptionEntry>,
    /// Compile-time mirror of the interpreter's scope stack, used only to
    /// detect "no two simultaneously-in-scope mappings share a string"
    /// (spec.md §3 invariant) before any input is ever parsed.
    scope_stack: Vec<HashSet<String>>,
}

impl Compiler {
    fn new() -> Self {
        Compiler {
            group_seq: 0,
            node_table: HashMap::new(),
            option_programs: HashMap::new(),
            option_table: HashMap::new(),
            scope_stack: vec![HashSet::new()],
        }
    }

    fn next_group(&mut self) -> GroupId {
        let id = self.group_seq;
        self.group_seq += 1;
        id
    }

    fn check_and_register(
        &mut self,
        option: &str,
        node: NodeId,
        slot: ParamIndex,
        gated_by: Option<&str>,
    ) -> Result<(), ConfigurationError> {
        for frame in &self.scope_stack {
            if frame.contains(option) {
                let first = self
                    .option_table
                    .get(option)
                    .map(|e| format!("node {}", e.node))
                    .unwrap_or_default();
                return Err(ConfigurationError::duplicate_option(
                    option,
                    first,
                    format!("node {node}"),
                ));
            }
        }
        self.scope_stack.last_mut().unwrap().insert(option.to_string());
        self.option_table.entry(option.to_string()).or_insert(OptionEntry {
            node,
            slot,
            gated_by: gated_by.map(str::to_string),
        });
        Ok(())
    }

    fn push_scope(&mut self) {
        self.scope_stack.push(HashSet::new());
    }

    fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    /// Every keyword option belonging to a node reachable from `node`
    /// purely through positional/var-positional structural edges - the
    /// set that must be mapped early when `node` sits inside an optional
    /// group (spec.md §4.C).
    fn collect_early_options(node: &ConverterNode) -> Vec<(String, ParamIndex)> {
        let mut out = Vec::new();
        for (ix, kw) in node.keyword.iter().enumerate() {
            for opt in &kw.option_strings {
                out.push((opt.clone(), ParamIndex::Keyword(ix)));
            }
        }
        for p in &node.positional {
            if let ConverterRef::Node(child) = &p.converter {
                out.extend(Self::collect_early_options(child));
            }
        }
        if let Some(vp) = &node.var_positional {
            if let ConverterRef::Node(child) = &vp.converter {
                out.extend(Self::collect_early_options(child));
            }
        }
        out
    }

    /// Compile `node`'s own body, inlined in place. `suppress_keyword_scope`
    /// is true when an ancestor optional group already early-mapped (and
    /// will unmap) this node's own keyword options, in which case this
    /// call must not map/unmap them a second time.
    fn compile_node_inline(
        &mut self,
        node: &Rc<ConverterNode>,
        suppress_keyword_scope: bool,
        for_slot: Option<(NodeId, ParamIndex)>,
        out: &mut Vec<Instruction>,
    ) -> Result<(), ConfigurationError> {
        self.node_table.insert(node.id, node.clone());
        out.push(Instruction::EnterConverter { node: node.id, for_slot });

        if !suppress_keyword_scope {
            self.push_scope();
            for (ix, kw) in node.keyword.iter().enumerate() {
                for opt in &kw.option_strings {
                    self.check_and_register(opt, node.id, ParamIndex::Keyword(ix), None)?;
                    out.push(Instruction::MapOption {
                        option: opt.clone(),
                        node: node.id,
                        slot: ParamIndex::Keyword(ix),
                    });
                }
                if let ConverterRef::Node(child) = &kw.converter {
                    self.compile_option_program(child)?;
                }
            }
        }

        for (ix, param) in node.positional.iter().enumerate() {
            let slot = ParamIndex::Positional(ix);
            if param.has_default() {
                let group = self.next_group();
                out.push(Instruction::OptionalGroupBegin { group });
                let early = if let ConverterRef::Node(child) = &param.converter {
                    Self::collect_early_options(child)
                } else {
                    Vec::new()
                };
                self.push_scope();
                for (opt, early_slot) in &early {
                    self.check_and_register(opt, node.id, *early_slot, None)?;
                    out.push(Instruction::EarlyMap {
                        option: opt.clone(),
                        node: node.id,
                        slot: *early_slot,
                        group,
                    });
                }
                self.compile_slot(node, slot, &param.converter, true, out)?;
                for (opt, _) in early.iter().rev() {
                    out.push(Instruction::UnmapOption { option: opt.clone() });
                }
                self.pop_scope();
                out.push(Instruction::OptionalGroupEnd { group });
            } else {
                self.compile_slot(node, slot, &param.converter, suppress_keyword_scope, out)?;
            }
        }

        if let Some(vp) = &node.var_positional {
            let group = self.next_group();
            out.push(Instruction::OptionalGroupBegin { group });
            let early = if let ConverterRef::Node(child) = &vp.converter {
                Self::collect_early_options(child)
            } else {
                Vec::new()
            };
            self.push_scope();
            for (opt, early_slot) in &early {
                self.check_and_register(opt, node.id, *early_slot, None)?;
                out.push(Instruction::EarlyMap {
                    option: opt.clone(),
                    node: node.id,
                    slot: *early_slot,
                    group,
                });
            }
            let mut body = Vec::new();
            self.compile_slot(node, ParamIndex::VarPositional, &vp.converter, true, &mut body)?;
            out.push(Instruction::ConsumeVarPositional { node: node.id, body });
            for (opt, _) in early.iter().rev() {
                out.push(Instruction::UnmapOption { option: opt.clone() });
            }
            self.pop_scope();
            out.push(Instruction::OptionalGroupEnd { group });
        }

        if !suppress_keyword_scope {
            out.push(Instruction::DrainOptions);
            for kw in node.keyword.iter().rev() {
                for opt in &kw.option_strings {
                    out.push(Instruction::UnmapOption { option: opt.clone() });
                }
            }
            self.pop_scope();
        }

        out.push(Instruction::CallConverter { node: node.id });
        Ok(())
    }

    fn compile_slot(
        &mut self,
        node: &Rc<ConverterNode>,
        slot: ParamIndex,
        converter: &ConverterRef,
        suppress_keyword_scope: bool,
        out: &mut Vec<Instruction>,
    ) -> Result<(), ConfigurationError> {
        match converter {
            ConverterRef::Primitive(_) | ConverterRef::BooleanToggle(_) => {
                out.push(Instruction::ConsumeArgument { node: node.id, slot });
            }
            ConverterRef::MultiOption(_) => {
                // MultiOption only makes sense on a keyword-only parameter;
                // as a positional it degrades to a single token consume.
                out.push(Instruction::ConsumeArgument { node: node.id, slot });
            }
            ConverterRef::Node(child) => {
                self.compile_node_inline(child, suppress_keyword_scope, Some((node.id, slot)), out)?;
            }
        }
        Ok(())
    }

    /// Compile a keyword parameter's own converter as a standalone,
    /// on-demand subprogram, memoized by node id, and register every
    /// option reachable under it (including its own keyword children's
    /// subprograms) as gated behind this node's governing option.
    fn compile_option_program(&mut self, node: &Rc<ConverterNode>) -> Result<(), ConfigurationError> {
        if self.option_programs.contains_key(&node.id) {
            return Ok(());
        }
        // reserve the slot before recursing, in case of reuse
        self.option_programs.insert(node.id, Vec::new());
        let mut body = Vec::new();
        let saved = std::mem::replace(&mut self.scope_stack, vec![HashSet::new()]);
        self.compile_node_inline(node, false, None, &mut body)?;
        self.scope_stack = saved;
        self.option_programs.insert(node.id, body);
        Ok(())
    }

    /// Fill in `gated_by` for options declared on on-demand subprograms,
    /// using the declaring node's own primary option string as the gate
    /// for every option string that first became visible while compiling
    /// it.
    fn fill_gating(&mut self, node: &ConverterNode, gate: Option<&str>) {
        for kw in &node.keyword {
            let own_gate = kw.option_strings.first().cloned();
            for opt in &kw.option_strings {
                if let Some(entry) = self.option_table.get_mut(opt) {
                    entry.gated_by = gate.map(str::to_string);
                }
            }
            if let ConverterRef::Node(child) = &kw.converter {
                self.fill_gating(child, own_gate.as_deref());
            }
        }
        for p in &node.positional {
            if let ConverterRef::Node(child) = &p.converter {
                self.fill_gating(child, gate);
            }
        }
        if let Some(vp) = &node.var_positional {
            if let ConverterRef::Node(child) = &vp.converter {
                self.fill_gating(child, gate);
            }
        }
    }

    /// Single peephole pass: drop any optional group that compiled down
    /// to an empty span (its begin immediately followed by its end).
    fn peephole(instrs: Vec<Instruction>) -> Vec<Instruction> {
        let mut out: Vec<Instruction> = Vec::with_capacity(instrs.len());
        for instr in instrs {
            if let Instruction::OptionalGroupEnd { group } = &instr {
                if matches!(out.last(), Some(Instruction::OptionalGroupBegin { group: g }) if g == group)
                {
                    out.pop();
                    continue;
                }
            }
            out.push(instr);
        }
        out
    }
}

/// Compile `root` into a [`Program`]. Pure function of its input: calling
/// it twice on the same tree produces identical (by value) programs
/// (spec.md §8 property 5).
pub fn compile(root: Rc<ConverterNode>) -> Result<Program, ConfigurationError> {
    let mut c = Compiler::new();
    let mut main = Vec::new();
    c.compile_node_inline(&root, false, None, &mut main)?;
    main.push(Instruction::EndProgram);
    main = Compiler::peephole(main);
    for body in c.option_programs.values_mut() {
        let taken = std::mem::take(body);
        *body = Compiler::peephole(taken);
    }
    c.fill_gating(&root, None);
    Ok(Program {
        root: root.id,
        main,
        option_programs: c.option_programs,
        node_table: c.node_table,
        option_table: c.option_table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::NodeBuilder;
    use crate::primitive::Primitive;
    use crate::value::Value;

    fn hello_node() -> Rc<ConverterNode> {
        NodeBuilder::new("hello")
            .positional("name", ConverterRef::Primitive(Primitive::Str))
            .unwrap()
            .build_command(|pos, _| {
                let _ = pos;
                Ok(0)
            })
    }

    #[test]
    fn compiles_simple_positional() {
        let prog = compile(hello_node()).unwrap();
        assert!(matches!(prog.main.first(), Some(Instruction::EnterConverter { .. })));
        assert!(matches!(prog.main.last(), Some(Instruction::EndProgram)));
        assert!(prog
            .main
            .iter()
            .any(|i| matches!(i, Instruction::ConsumeArgument { .. })));
    }

    #[test]
    fn compiling_twice_is_idempotent() {
        let a = compile(hello_node()).unwrap();
        let b = compile(hello_node()).unwrap();
        // structurally identical modulo node ids, which are assigned in the
        // same order for two structurally identical builds
        assert_eq!(a.main.len(), b.main.len());
    }

    #[test]
    fn optional_positional_opens_a_group() {
        let node = NodeBuilder::new("fgrep")
            .positional("pattern", ConverterRef::Primitive(Primitive::Str))
            .unwrap()
            .positional_with_default(
                "filename",
                ConverterRef::Primitive(Primitive::Str),
                Value::Str(String::new()),
            )
            .unwrap()
            .build_command(|_, _| Ok(0));
        let prog = compile(node).unwrap();
        assert!(prog
            .main
            .iter()
            .any(|i| matches!(i, Instruction::OptionalGroupBegin { .. })));
    }

    #[test]
    fn duplicate_option_across_scope_is_rejected_at_compile_time() {
        let child = NodeBuilder::new("child")
            .option(
                "verbose",
                &["-v"],
                ConverterRef::Primitive(Primitive::Bool),
                Some(Value::Bool(false)),
            )
            .unwrap()
            .build_converter(|_, kw| Ok(kw.get("verbose").cloned().unwrap_or(Value::Bool(false))));
        let root = NodeBuilder::new("root")
            .option(
                "verbose",
                &["-v"],
                ConverterRef::Primitive(Primitive::Bool),
                Some(Value::Bool(false)),
            )
            .unwrap()
            .positional_with_default(
                "extra",
                ConverterRef::Node(child),
                Value::Bool(false),
            )
            .unwrap()
            .build_command(|_, _| Ok(0));
        let err = compile(root).unwrap_err();
        assert!(matches!(err.0, crate::error::ConfigMessage::DuplicateOption { .. }));
    }
}
