//! Built-in `-h/--help` and `-V/--version` handling. These two flags are
//! intercepted ahead of the real grammar rather than registered into it; a
//! compiled [`Program`](crate::charm::Program) has no hook for that kind of
//! early interception, so it happens one level up, in [`crate::appeal`], by
//! scanning a node's own raw tokens before the bytecode interpreter ever
//! sees them.

use crate::arg::{Arg, Args};
use crate::convert::ConverterNode;
use crate::item::Item;
use crate::meta::items_for;
use crate::meta_help::render_help;

pub(crate) const HELP_NAMES: &[&str] = &["-h", "--help"];
pub(crate) const VERSION_NAMES: &[&str] = &["-V", "--version"];

/// The two builtin subcommands from spec.md §4.E, auto-injected alongside
/// the flag forms above unless a command already declares a subcommand by
/// that name.
pub(crate) const HELP_SUBCOMMAND: &str = "help";
pub(crate) const VERSION_SUBCOMMAND: &str = "version";

pub(crate) enum Builtin {
    Help,
    Version,
}

/// True if `node` itself already registers one of `names` as an option
/// string - the collision guard spec.md §4.E requires before a builtin
/// flag is allowed to intercept input meant for a user-declared option.
pub(crate) fn collides(node: &ConverterNode, names: &[&str]) -> bool {
    node.all_parameters()
        .iter()
        .any(|p| p.option_strings.iter().any(|s| names.contains(&s.as_str())))
}

/// Scans `args` for a bare `-h`/`--help` or `-V`/`--version` token, tried
/// before the registered grammar gets a chance to run. A token already
/// downgraded to [`Arg::PosWord`] (everything after a literal `--`) never
/// matches - the user asked for that string literally, not for help.
pub(crate) fn scan(args: &Args) -> Option<Builtin> {
    for item in &args.items {
        match item {
            Arg::Long(l) if l == "help" => return Some(Builtin::Help),
            Arg::Long(l) if l == "version" => return Some(Builtin::Version),
            Arg::ShortCluster(s) if s == "h" => return Some(Builtin::Help),
            Arg::ShortCluster(s) if s == "V" => return Some(Builtin::Version),
            _ => {}
        }
    }
    None
}

/// `--help` output for one node: its own usage line, description, and
/// option/positional listing, plus the injected `-h, --help` entry itself.
pub(crate) fn render(node: &ConverterNode) -> String {
    let mut items = items_for(node);
    items.push(Item::Flag {
        names: HELP_NAMES.iter().map(|s| s.to_string()).collect(),
        help: Some("Prints help information".into()),
    });
    render_help(&node.name, node.descr.as_deref(), &items)
}

pub(crate) fn render_version(version: &str) -> String {
    format!("Version: {version}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_dash_h_is_recognized() {
        let args = Args::from_strs(&["-h"]);
        assert!(matches!(scan(&args), Some(Builtin::Help)));
    }

    #[test]
    fn help_after_double_dash_is_not_recognized() {
        let args = Args::from_strs(&["--", "-h"]);
        assert!(scan(&args).is_none());
    }

    #[test]
    fn cluster_with_other_letters_does_not_trigger_help() {
        let args = Args::from_strs(&["-hx"]);
        assert!(scan(&args).is_none());
    }

    #[test]
    fn collides_detects_a_reused_short_flag() {
        use crate::convert::{ConverterRef, NodeBuilder};
        use crate::primitive::Primitive;
        use crate::value::Value;

        let node = NodeBuilder::new("head")
            .option(
                "bytes",
                &["-h", "--header-bytes"],
                ConverterRef::Primitive(Primitive::Int),
                Some(Value::Int(0)),
            )
            .unwrap()
            .build_command(|_, _| Ok(0));
        assert!(collides(&node, HELP_NAMES));
        assert!(!collides(&node, VERSION_NAMES));
    }
}
