//! One line of usage/help text. The two-mode `Display` impl (`{}` for the
//! compact usage line, `{:#}` for the padded help body, width carried
//! through `f.width()`) lets the same `Item` describe either form of one
//! [`crate::convert::Parameter`].

#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
enum ItemKind {
    Flag,
    Command,
    Positional,
}

#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub(crate) enum Item {
    Positional {
        metavar: String,
        optional: bool,
        help: Option<String>,
    },
    VarPositional {
        metavar: String,
        help: Option<String>,
    },
    Command {
        name: String,
        help: Option<String>,
    },
    Flag {
        /// Every registered option string, shortest first (spec.md §4.E
        /// usage rendering shows only the first in the compact form).
        names: Vec<String>,
        help: Option<String>,
    },
    Argument {
        names: Vec<String>,
        metavar: String,
        help: Option<String>,
    },
}

impl Item {
    fn kind(&self) -> ItemKind {
        match self {
            Item::Positional { .. } | Item::VarPositional { .. } => ItemKind::Positional,
            Item::Command { .. } => ItemKind::Command,
            Item::Flag { .. } | Item::Argument { .. } => ItemKind::Flag,
        }
    }

    pub(crate) fn is_command(&self) -> bool {
        self.kind() == ItemKind::Command
    }

    fn help(&self) -> Option<&str> {
        match self {
            Item::Positional { help, .. }
            | Item::VarPositional { help, .. }
            | Item::Command { help, .. }
            | Item::Flag { help, .. }
            | Item::Argument { help, .. } => help.as_deref(),
        }
    }
}

impl std::fmt::Display for Item {
    /// `{}` renders the short form used in a usage line; `{:#}` renders
    /// the padded form used in the help body.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            self.fmt_help(f)
        } else {
            self.fmt_usage(f)
        }
    }
}

impl Item {
    fn fmt_usage(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Item::Positional { metavar, optional, .. } => {
                if *optional {
                    write!(f, "[<{metavar}>]")
                } else {
                    write!(f, "<{metavar}>")
                }
            }
            Item::VarPositional { metavar, .. } => write!(f, "[<{metavar}>...]"),
            Item::Command { .. } => write!(f, "COMMAND"),
            Item::Flag { names, .. } => write!(f, "{}", names.first().map(String::as_str).unwrap_or("")),
            Item::Argument { names, metavar, .. } => {
                write!(f, "{} <{metavar}>", names.first().map(String::as_str).unwrap_or(""))
            }
        }
    }

    fn fmt_help(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let head = match self {
            Item::Positional { metavar, .. } => format!("    <{metavar}>"),
            Item::VarPositional { metavar, .. } => format!("    <{metavar}>..."),
            Item::Command { name, .. } => format!("    {name}"),
            Item::Flag { names, .. } => format!("    {}", names.join(", ")),
            Item::Argument { names, metavar, .. } => format!("    {} <{metavar}>", names.join(", ")),
        };
        f.write_str(&head)?;
        if let Some((width, help)) = f.width().zip(self.help()) {
            let pad = width.saturating_sub(head.len());
            for (ix, line) in help.split('\n').enumerate() {
                if ix == 0 {
                    write!(f, "{:pad$}  {}", "", line, pad = pad)?;
                } else {
                    write!(f, "\n{:width$}    {}", "", line, width = width)?;
                }
            }
        } else if let Some(help) = self.help().and_then(|h| h.lines().next()) {
            write!(f, "  -- {help}")?;
        }
        Ok(())
    }

    pub(crate) fn full_width(&self) -> usize {
        match self {
            Item::Positional { metavar, .. } => metavar.len() + 6,
            Item::VarPositional { metavar, .. } => metavar.len() + 9,
            Item::Command { name, .. } => name.len() + 4,
            Item::Flag { names, .. } => names.join(", ").len() + 4,
            Item::Argument { names, metavar, .. } => names.join(", ").len() + metavar.len() + 7,
        }
    }
}
