//! Renders the compact usage line for one node. A combinator-style usage
//! renderer needs to fold an arbitrary `And`/`Or` tree into the fewest
//! brackets that still describe it; [`items_for`](crate::meta::items_for)
//! already hands back a flat ordered list here, so there is no folding
//! left to do - rendering is just "join each item's compact form with a
//! space", every keyword option wrapped in `[]` since a parameter with a
//! default is always optional on the command line.

use crate::item::Item;

/// `name [-v] <pattern> [<count>]`
pub(crate) fn render_usage(name: &str, items: &[Item]) -> String {
    let mut out = String::from(name);
    for item in items {
        out.push(' ');
        match item {
            Item::Flag { .. } | Item::Argument { .. } => {
                out.push('[');
                out.push_str(&item.to_string());
                out.push(']');
            }
            Item::Positional { .. } | Item::VarPositional { .. } | Item::Command { .. } => {
                out.push_str(&item.to_string());
            }
        }
    }
    out
}
