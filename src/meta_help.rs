//! Renders the full `--help` body for one node: usage line, description,
//! then a column-aligned listing of every item. The column width is the
//! widest [`Item::full_width`] in the listing, handed to each item's
//! `{:width$}` alternate `Display`.

use crate::item::Item;
use crate::meta_usage::render_usage;

pub(crate) fn render_help(name: &str, descr: Option<&str>, items: &[Item]) -> String {
    let mut out = String::new();
    out.push_str("Usage: ");
    out.push_str(&render_usage(name, items));
    out.push('\n');

    if let Some(descr) = descr {
        out.push('\n');
        out.push_str(descr);
        out.push('\n');
    }

    if !items.is_empty() {
        out.push('\n');
        let width = items.iter().map(Item::full_width).max().unwrap_or(0);
        for item in items {
            out.push_str(&format!("{:#width$}\n", item, width = width));
        }
    }
    out
}
