//! Command-line token preprocessing: split argv into short/long/word
//! tokens up front, but defer resolving a multi-letter `-XYZ` cluster (is
//! it three flags, or one flag plus an inline value?) to the interpreter,
//! which is the only place that knows the current option scope (spec.md
//! §4.D).

use std::fmt;

/// One preprocessed command-line token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Arg {
    /// `-XYZ` (or plain `-X`): raw letters after a single dash, with no
    /// `=`. Ambiguous between a concatenation of short flags and `-X`
    /// followed by an inline value - resolved during interpretation.
    ShortCluster(String),
    /// `-X=value`
    ShortEq(char, String),
    /// `--name=value`
    LongEq(String, String),
    /// `--name`
    Long(String),
    /// Anything else: a command name, a positional, or (before `--`) a
    /// bare `-` by itself.
    Word(String),
    /// Anything after a literal `--`: always positional, never an option.
    PosWord(String),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::ShortCluster(s) => write!(f, "-{s}"),
            Arg::ShortEq(c, v) => write!(f, "-{c}={v}"),
            Arg::LongEq(l, v) => write!(f, "--{l}={v}"),
            Arg::Long(l) => write!(f, "--{l}"),
            Arg::Word(w) | Arg::PosWord(w) => f.write_str(w),
        }
    }
}

/// Preprocessed, not-yet-interpreted argument stream.
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub(crate) items: Vec<Arg>,
}

impl Args {
    pub fn from_strs(argv: &[&str]) -> Self {
        Args::from_strings(argv.iter().map(|s| s.to_string()).collect())
    }

    pub fn from_strings(argv: Vec<String>) -> Self {
        let mut items = Vec::with_capacity(argv.len());
        let mut positional_only = false;
        for raw in argv {
            if positional_only {
                items.push(Arg::PosWord(raw));
                continue;
            }
            if raw == "--" {
                positional_only = true;
                continue;
            }
            if let Some(rest) = raw.strip_prefix("--") {
                if rest.is_empty() {
                    // already handled above, unreachable
                    items.push(Arg::Word(raw));
                } else if let Some((name, value)) = rest.split_once('=') {
                    items.push(Arg::LongEq(name.to_string(), value.to_string()));
                } else {
                    items.push(Arg::Long(rest.to_string()));
                }
            } else if raw.starts_with('-') && raw.len() > 1 {
                let rest = &raw[1..];
                if let Some((name, value)) = rest.split_once('=') {
                    let mut chars = name.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => items.push(Arg::ShortEq(c, value.to_string())),
                        _ => items.push(Arg::Word(raw)),
                    }
                } else {
                    items.push(Arg::ShortCluster(rest.to_string()));
                }
            } else {
                items.push(Arg::Word(raw));
            }
        }
        Args { items }
    }
}

impl<const N: usize> From<&[&str; N]> for Args {
    fn from(xs: &[&str; N]) -> Self {
        Args::from_strs(xs)
    }
}

impl From<&[&str]> for Args {
    fn from(xs: &[&str]) -> Self {
        Args::from_strs(xs)
    }
}
