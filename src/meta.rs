//! Structural description of one converter node's parameters. A
//! combinator-style parser tree (arbitrary `And`/`Or`/`Many`/`Optional`
//! nesting) would need a `normalize()` pass to collapse redundant nesting
//! before display, but a [`ConverterNode`] has no such freedom - its shape
//! is always "positionals in order, then an optional var-positional, then
//! keyword options" - so there is nothing to normalize: [`items_for`]
//! walks it once into a flat, already-ordered list of [`Item`]s.

use crate::convert::{ConverterNode, ConverterRef};
use crate::item::Item;

/// This node's own parameters, in the order they appear in a usage line:
/// positionals, the var-positional slot if any, then keyword options.
/// Options belonging to nested converters are not included - those are
/// gated behind their own frame and get their own usage/help block, per
/// component E's per-node rendering.
pub(crate) fn items_for(node: &ConverterNode) -> Vec<Item> {
    let mut items = Vec::with_capacity(node.positional.len() + node.keyword.len() + 1);
    for p in &node.positional {
        items.push(Item::Positional {
            metavar: p.name.to_uppercase(),
            optional: p.has_default(),
            help: p.help.clone(),
        });
    }
    if let Some(vp) = &node.var_positional {
        items.push(Item::VarPositional {
            metavar: vp.name.to_uppercase(),
            help: vp.help.clone(),
        });
    }
    for p in &node.keyword {
        let mut names = p.option_strings.clone();
        names.sort_by_key(|s| s.starts_with("--")); // short form first, as usage conventionally shows it
        let item = match &p.converter {
            ConverterRef::BooleanToggle(_) => Item::Flag {
                names,
                help: p.help.clone(),
            },
            other => Item::Argument {
                names,
                metavar: other.metavar(),
                help: p.help.clone(),
            },
        };
        items.push(item);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::NodeBuilder;
    use crate::primitive::Primitive;
    use crate::value::Value;

    #[test]
    fn positionals_come_before_options() {
        let node = NodeBuilder::new("cmd")
            .positional("name", ConverterRef::Primitive(Primitive::Str))
            .unwrap()
            .option(
                "verbose",
                &["-v", "--verbose"],
                ConverterRef::BooleanToggle(false),
                Some(Value::Bool(false)),
            )
            .unwrap()
            .build_converter(|pos, _| Ok(pos[0].clone()));
        let items = items_for(&node);
        assert!(matches!(items[0], Item::Positional { .. }));
        assert!(matches!(items[1], Item::Flag { .. }));
    }

    #[test]
    fn optional_positional_is_marked() {
        let node = NodeBuilder::new("cmd")
            .positional_with_default("count", ConverterRef::Primitive(Primitive::Int), Value::Int(1))
            .unwrap()
            .build_converter(|pos, _| Ok(pos[0].clone()));
        match &items_for(&node)[0] {
            Item::Positional { optional, .. } => assert!(*optional),
            other => panic!("expected Positional, got {other:?}"),
        }
    }
}
