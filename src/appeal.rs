//! Component E from spec.md §4.E: command dispatcher and usage generator.
//! Rather than driving a single combinator tree to completion, dispatch
//! here is a small tree-walk over named [`Command`]s, each leaf compiled
//! once (spec.md §5: "compiled grammar is read-only after construction")
//! into its own [`crate::charm::Program`], and interpreted fresh per
//! [`Appeal::run`] call.

use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use crate::arg::{Arg, Args};
use crate::charm::{self, Program};
use crate::convert::{ConverterNode, NodeId};
use crate::error::{AppealError, ConfigurationError, ErrorContext};
use crate::help::{self, Builtin};
use crate::interp::{self, Outcome};
use crate::item::Item;
use crate::meta::items_for;
use crate::meta_usage::render_usage;

/// One command or subcommand in the dispatch tree (spec.md §4.E: "a
/// mapping of command name -> command node; each command node may itself
/// hold a mapping of subcommand name -> node").
pub struct Command {
    node: Rc<ConverterNode>,
    help: Option<String>,
    subcommands: BTreeMap<String, Command>,
    default: Option<String>,
}

impl Command {
    pub fn new(node: Rc<ConverterNode>) -> Self {
        Command { node, help: None, subcommands: BTreeMap::new(), default: None }
    }

    /// One-line description shown next to this command's name in its
    /// parent's subcommand listing.
    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    pub fn subcommand(mut self, name: impl Into<String>, cmd: Command) -> Self {
        self.subcommands.insert(name.into(), cmd);
        self
    }

    /// Invoked (zero arguments) when this node has subcommands but the
    /// user supplied none (spec.md §4.E). Must itself name a registered
    /// subcommand.
    pub fn default_subcommand(mut self, name: impl Into<String>) -> Self {
        self.default = Some(name.into());
        self
    }

    fn subcommand_items(&self) -> Vec<Item> {
        self.subcommands
            .iter()
            .map(|(name, cmd)| Item::Command { name: name.clone(), help: cmd.help.clone() })
            .collect()
    }
}

/// An application's complete dispatch tree: a compile-once, run-many-times
/// entry point (spec.md §5's "processor" distinction - `Appeal` itself is
/// the read-only compiled side).
pub struct Appeal {
    name: String,
    version: Option<String>,
    global: Option<Program>,
    root: Command,
    programs: BTreeMap<NodeId, Program>,
    builtins: bool,
}

impl Appeal {
    /// Compiles every node in `root`'s dispatch tree up front, so a later
    /// [`Appeal::run`] never re-runs the grammar compiler.
    pub fn build(name: impl Into<String>, root: Command) -> Result<Self, ConfigurationError> {
        let mut programs = BTreeMap::new();
        compile_tree(&root, &mut programs)?;
        Ok(Appeal {
            name: name.into(),
            version: None,
            global: None,
            root,
            programs,
            builtins: true,
        })
    }

    pub fn version(mut self, v: impl Into<String>) -> Self {
        self.version = Some(v.into());
        self
    }

    /// A command consuming global options only, resolved and run before
    /// any subcommand is dispatched (spec.md §4.E). Must have no
    /// positional or var-positional parameters of its own.
    pub fn global(mut self, node: Rc<ConverterNode>) -> Result<Self, ConfigurationError> {
        self.global = Some(charm::compile(node)?);
        Ok(self)
    }

    pub fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    /// Runs one argument stream to completion (spec.md §5: single-shot
    /// over a fresh interpreter state).
    pub fn run(&self, argv: &[&str]) -> Result<i32, AppealError> {
        let args = Args::from_strs(argv);
        let mut tokens: VecDeque<Arg> = args.items.into();

        if let Some(global) = &self.global {
            let (outcome, rest) = interp::interpret_tokens(global, std::mem::take(&mut tokens))
                .map_err(|e| self.contextualize(&[], global, e.into()))?;
            if rest.is_empty() {
                return Ok(match outcome {
                    Outcome::Exit(code) => code,
                    Outcome::CommandFailed(err) => {
                        return Err(self.contextualize(&[], global, err.into()));
                    }
                });
            }
            tokens = rest;
        }

        let mut current = &self.root;
        let mut path: Vec<String> = Vec::new();
        let mut builtin_request = None;
        loop {
            let next = match tokens.front() {
                Some(Arg::Word(w)) => Some(w.clone()),
                _ => None,
            };
            match next.as_deref() {
                Some(w) if current.subcommands.contains_key(w) => {
                    tokens.pop_front();
                    path.push(w.to_string());
                    current = &current.subcommands[w];
                }
                Some(help::HELP_SUBCOMMAND)
                    if self.builtins && !current.subcommands.contains_key(help::HELP_SUBCOMMAND) =>
                {
                    tokens.pop_front();
                    builtin_request = Some(Builtin::Help);
                }
                Some(help::VERSION_SUBCOMMAND)
                    if self.builtins
                        && !current.subcommands.contains_key(help::VERSION_SUBCOMMAND) =>
                {
                    tokens.pop_front();
                    builtin_request = Some(Builtin::Version);
                }
                _ => break,
            }
        }

        if let Some(builtin) = builtin_request {
            return Ok(self.render_builtin(builtin, current));
        }

        if tokens.is_empty() && !current.subcommands.is_empty() {
            let target = match &current.default {
                Some(name) => &current.subcommands[name],
                None => {
                    return Ok(print_usage_default(current, &self.name));
                }
            };
            return self.dispatch(&path, target, tokens);
        }

        self.dispatch(&path, current, tokens)
    }

    fn render_builtin(&self, builtin: Builtin, command: &Command) -> i32 {
        match builtin {
            Builtin::Help => {
                if command.subcommands.is_empty() {
                    print!("{}", help::render(&command.node));
                } else {
                    print!(
                        "{}",
                        crate::meta_help::render_help(
                            &self.name,
                            command.node.descr.as_deref(),
                            &command.subcommand_items(),
                        )
                    );
                }
            }
            Builtin::Version => {
                if let Some(v) = &self.version {
                    print!("{}", help::render_version(v));
                }
            }
        }
        0
    }

    fn dispatch(
        &self,
        path: &[String],
        command: &Command,
        tokens: VecDeque<Arg>,
    ) -> Result<i32, AppealError> {
        if self.builtins {
            let pending = Args { items: tokens.iter().cloned().collect() };
            match help::scan(&pending) {
                Some(Builtin::Help) if !help::collides(&command.node, help::HELP_NAMES) => {
                    print!("{}", help::render(&command.node));
                    return Ok(0);
                }
                Some(Builtin::Version) if !help::collides(&command.node, help::VERSION_NAMES) => {
                    if let Some(v) = &self.version {
                        print!("{}", help::render_version(v));
                        return Ok(0);
                    }
                }
                _ => {}
            }
        }

        let program = self
            .programs
            .get(&command.node.id)
            .expect("every dispatch-tree node is compiled in Appeal::build");
        let args = Args { items: tokens.into_iter().collect() };
        match interp::interpret(program, args) {
            Ok(Outcome::Exit(code)) => Ok(code),
            Ok(Outcome::CommandFailed(err)) => Err(self.contextualize(path, program, err.into())),
            Err(err) => Err(self.contextualize(path, program, err.into())),
        }
    }

    /// Attaches `<program> <command path>:` plus the node's own usage line
    /// to an error raised while resolving or running `program` (spec.md
    /// §6's error output format).
    fn contextualize(&self, path: &[String], program: &Program, err: AppealError) -> AppealError {
        let node = program
            .node_table
            .get(&program.root)
            .expect("a program's own root node is always in its node table");
        let path = path.join(" ");
        let full_name = if path.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, path)
        };
        let usage = format!("Usage: {}", render_usage(&full_name, &items_for(node)));
        err.with_context(ErrorContext { program: self.name.clone(), path, usage })
    }
}

fn compile_tree(
    command: &Command,
    out: &mut BTreeMap<NodeId, Program>,
) -> Result<(), ConfigurationError> {
    if !out.contains_key(&command.node.id) {
        out.insert(command.node.id, charm::compile(command.node.clone())?);
    }
    for child in command.subcommands.values() {
        compile_tree(child, out)?;
    }
    Ok(())
}

fn print_usage_default(command: &Command, program_name: &str) -> i32 {
    let items = command.subcommand_items();
    print!("{}", crate::meta_help::render_help(program_name, command.node.descr.as_deref(), &items));
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConverterRef, NodeBuilder};
    use crate::primitive::Primitive;
    use crate::value::Value;

    fn leaf(name: &str) -> Rc<ConverterNode> {
        NodeBuilder::new(name)
            .positional("x", ConverterRef::Primitive(Primitive::Str))
            .unwrap()
            .build_command(|_, _| Ok(0))
    }

    #[test]
    fn resolves_nested_subcommand() {
        let app = Appeal::build(
            "tool",
            Command::new(leaf("root"))
                .subcommand("frob", Command::new(leaf("frob"))),
        )
        .unwrap();
        let code = app.run(&["frob", "hello"]).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn missing_subcommand_falls_back_to_default() {
        let inner = NodeBuilder::new("status")
            .build_command(|_, _| Ok(7));
        let app = Appeal::build(
            "tool",
            Command::new(NodeBuilder::new("root").build_command(|_, _| Ok(0)))
                .subcommand("status", Command::new(inner))
                .default_subcommand("status"),
        )
        .unwrap();
        let code = app.run(&[]).unwrap();
        assert_eq!(code, 7);
    }

    #[test]
    fn help_subcommand_prints_help_and_exits_zero() {
        let app = Appeal::build("tool", Command::new(leaf("root"))).unwrap();
        let code = app.run(&["help"]).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn version_subcommand_is_suppressed_by_a_same_named_subcommand() {
        let app = Appeal::build(
            "tool",
            Command::new(leaf("root")).subcommand("version", Command::new(leaf("version"))),
        )
        .unwrap();
        // "version" resolves to the user's own subcommand, not the builtin,
        // so it still expects its positional argument.
        let err = app.run(&["version"]).unwrap_err();
        assert!(err.to_string().contains("missing argument"));
    }

    #[test]
    fn help_flag_is_not_hijacked_when_the_node_declares_its_own() {
        let node = NodeBuilder::new("head")
            .option(
                "bytes",
                &["-h", "--header-bytes"],
                ConverterRef::Primitive(Primitive::Int),
                Some(Value::Int(0)),
            )
            .unwrap()
            .build_command(|_, kw| {
                assert_eq!(kw.get("bytes"), Some(&Value::Int(5)));
                Ok(0)
            });
        let app = Appeal::build("tool", Command::new(node)).unwrap();
        let code = app.run(&["-h", "5"]).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn usage_error_is_reported_with_program_and_command_path() {
        let app = Appeal::build(
            "tool",
            Command::new(leaf("root")).subcommand("frob", Command::new(leaf("frob"))),
        )
        .unwrap();
        let err = app.run(&["frob"]).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.starts_with("tool frob: "));
        assert!(rendered.contains("Usage: tool frob"));
    }

    #[test]
    fn global_flags_consumed_before_subcommand() {
        let global = NodeBuilder::new("global")
            .option(
                "verbose",
                &["-v", "--verbose"],
                ConverterRef::BooleanToggle(false),
                Some(Value::Bool(false)),
            )
            .unwrap()
            .build_command(|_, _| Ok(0));
        let app = Appeal::build("tool", Command::new(leaf("root")))
            .unwrap()
            .global(global)
            .unwrap();
        let code = app.run(&["-v", "hello"]).unwrap();
        assert_eq!(code, 0);
    }
}
