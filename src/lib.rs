//! Derives a command-line interface from the signatures of registered
//! callables instead of a combinator expression built up parser-by-parser.
//!
//! A tree of [`convert::ConverterNode`]s (component A/B) is compiled once
//! by [`charm::compile`] into a flat bytecode [`charm::Program`] (component
//! C), then run against one argument list at a time by [`interp::interpret`]
//! (component D). [`appeal::Appeal`] ties a tree of named commands and
//! subcommands together into a single compile-once, run-many-times entry
//! point (component E). A keyword-only parameter whose converter persists
//! state across repeated invocations - `-v -v -v` counting to three rather
//! than overwriting itself - implements [`multi_option::MultiOption`]
//! (component F).
//!
//! ```no_run
//! use appeal::convert::{ConverterRef, NodeBuilder};
//! use appeal::primitive::Primitive;
//! use appeal::value::Value;
//! use appeal::appeal::{Appeal, Command};
//!
//! let root = NodeBuilder::new("greet")
//!     .positional("name", ConverterRef::Primitive(Primitive::Str))
//!     .unwrap()
//!     .option(
//!         "loud",
//!         &["-l", "--loud"],
//!         ConverterRef::BooleanToggle(false),
//!         Some(Value::Bool(false)),
//!     )
//!     .unwrap()
//!     .build_command(|pos, kw| {
//!         let name = pos[0].as_str().unwrap_or_default();
//!         if kw.get("loud").and_then(Value::as_bool).unwrap_or(false) {
//!             println!("HELLO, {}!", name.to_uppercase());
//!         } else {
//!             println!("Hello, {name}.");
//!         }
//!         Ok(0)
//!     });
//!
//! let app = Appeal::build("greet", Command::new(root)).unwrap();
//! let argv: Vec<String> = std::env::args().skip(1).collect();
//! let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
//! std::process::exit(app.run(&argv).unwrap_or(1));
//! ```

pub mod appeal;
pub(crate) mod arg;
pub mod charm;
pub mod convert;
pub mod error;
mod help;
mod item;
mod meta;
mod meta_help;
mod meta_usage;
mod meta_youmean;
pub mod interp;
pub mod multi_option;
pub mod primitive;
pub mod value;

pub use crate::appeal::{Appeal, Command};
pub use crate::arg::Args;
pub use crate::convert::{ConverterNode, ConverterRef, NodeBuilder, NodeId, ParamKind, Parameter};
pub use crate::error::{AppealError, CommandError, ConfigurationError, ConverterError, UsageError};
pub use crate::interp::{interpret, Outcome};
pub use crate::value::{Complex, Value};
