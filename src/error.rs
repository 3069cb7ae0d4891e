//! Three error kinds, kept apart per spec.md §7: [`ConfigurationError`]
//! (registration-time misuse, fatal, never caught), [`UsageError`] (a bad
//! command line, caught by the top-level entry point) and
//! [`CommandError`] (a command callable signalling failure). Each wraps a
//! private `Message` enum in a public newtype with a manual `Display` impl
//! instead of pulling in `thiserror`.

use std::fmt;

/// Misuse of the registration API - missing default on a keyword-only
/// parameter, a duplicate incompatible option, `EMPTY` used as a default,
/// a var-positional parameter whose converter can't consume anything.
/// Raised while building a [`crate::convert::ConverterNode`] or compiling
/// a [`crate::charm::Program`]; never caught by the dispatcher.
#[derive(Debug)]
pub struct ConfigurationError(pub(crate) ConfigMessage);

#[derive(Debug)]
pub(crate) enum ConfigMessage {
    MissingDefault { parameter: String },
    VarPositionalNeedsPositional { parameter: String },
    DuplicateOption { option: String, first: String, second: String },
    EmptyDefault { parameter: String },
    DuplicateParameter { name: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ConfigMessage::MissingDefault { parameter } => write!(
                f,
                "keyword-only parameter {parameter:?} has no default value"
            ),
            ConfigMessage::VarPositionalNeedsPositional { parameter } => write!(
                f,
                "var-positional parameter {parameter:?}'s converter doesn't require \
                 at least one positional token, which could loop forever"
            ),
            ConfigMessage::DuplicateOption { option, first, second } => write!(
                f,
                "option {option:?} is registered twice with incompatible signatures: \
                 once for {first:?}, once for {second:?}"
            ),
            ConfigMessage::EmptyDefault { parameter } => {
                write!(f, "parameter {parameter:?} uses the EMPTY sentinel as a default")
            }
            ConfigMessage::DuplicateParameter { name } => {
                write!(f, "parameter {name:?} is declared more than once")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

impl ConfigurationError {
    pub(crate) fn missing_default(parameter: impl Into<String>) -> Self {
        ConfigurationError(ConfigMessage::MissingDefault { parameter: parameter.into() })
    }

    pub(crate) fn var_positional_needs_positional(parameter: impl Into<String>) -> Self {
        ConfigurationError(ConfigMessage::VarPositionalNeedsPositional {
            parameter: parameter.into(),
        })
    }

    pub(crate) fn duplicate_option(
        option: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        ConfigurationError(ConfigMessage::DuplicateOption {
            option: option.into(),
            first: first.into(),
            second: second.into(),
        })
    }

    pub(crate) fn empty_default(parameter: impl Into<String>) -> Self {
        ConfigurationError(ConfigMessage::EmptyDefault { parameter: parameter.into() })
    }

    pub(crate) fn duplicate_parameter(name: impl Into<String>) -> Self {
        ConfigurationError(ConfigMessage::DuplicateParameter { name: name.into() })
    }
}

/// A user-supplied converter rejected a token. Wrapped into a
/// [`UsageError`] at the point the interpreter invokes the converter
/// (spec.md §7).
#[derive(Debug, Clone)]
pub struct ConverterError(String);

impl ConverterError {
    pub fn new(message: impl Into<String>) -> Self {
        ConverterError(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConverterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConverterError {}

/// The user's command line was syntactically or semantically invalid:
/// unknown option, missing required argument, wrong arity, an option used
/// outside its scope. Carries the offending token and, where available, a
/// "did you mean" suggestion (see [`crate::meta_youmean`]).
#[derive(Debug, Clone)]
pub struct UsageError {
    pub(crate) message: String,
    pub(crate) token: Option<String>,
    pub(crate) suggestion: Option<String>,
}

impl UsageError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        UsageError { message: message.into(), token: None, suggestion: None }
    }

    pub(crate) fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub(crate) fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub(crate) fn unknown_option(token: &str) -> Self {
        UsageError::new(format!("{token} is not expected in this context")).with_token(token)
    }

    pub(crate) fn missing_argument(name: &str) -> Self {
        UsageError::new(format!("missing argument {name}"))
    }

    pub(crate) fn too_many_arguments(token: &str) -> Self {
        UsageError::new(format!("unexpected argument {token:?}")).with_token(token)
    }

    pub(crate) fn wrong_arity(option: &str, expected: usize, found: usize) -> Self {
        UsageError::new(format!(
            "{option} expects {expected} value(s), got {found}"
        ))
        .with_token(option)
    }

    pub(crate) fn scope_violation(child: &str, parent: &str) -> Self {
        UsageError::new(format!(
            "{child} can't be used here; it must be used immediately after {parent}"
        ))
        .with_token(child)
    }

    pub(crate) fn zero_arity_oparg(option: &str) -> Self {
        UsageError::new(format!("{option} doesn't take a value")).with_token(option)
    }

    pub(crate) fn converter_failed(token: &str, err: &ConverterError) -> Self {
        UsageError::new(err.message().to_string()).with_token(token)
    }

    pub(crate) fn only_once(option: &str) -> Self {
        UsageError::new(format!("{option} can only be used once")).with_token(option)
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, ". {suggestion}")?;
        }
        Ok(())
    }
}

impl std::error::Error for UsageError {}

/// A command callable signalled failure, either with an exit code or a
/// message to print (exit code 1). Surfaces as the process exit code.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    Message(String),
    ExitCode(i32),
}

impl CommandError {
    pub fn message(message: impl Into<String>) -> Self {
        CommandError::Message(message.into())
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Message(_) => 1,
            CommandError::ExitCode(code) => *code,
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Message(m) => f.write_str(m),
            CommandError::ExitCode(code) => write!(f, "exited with status {code}"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Where in the dispatch tree an error surfaced, attached at the point
/// [`crate::appeal::Appeal::run`] knows which command it was resolving
/// (spec.md §6's error output format: `<program> <command path>:
/// <message>` followed by the usage line).
#[derive(Debug, Clone)]
pub(crate) struct ErrorContext {
    pub(crate) program: String,
    pub(crate) path: String,
    pub(crate) usage: String,
}

impl ErrorContext {
    fn header(&self) -> String {
        if self.path.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.path)
        }
    }
}

/// Anything the top-level entry point (out of scope per spec.md §1, but
/// its signature lives here) needs to turn into a process exit code.
#[derive(Debug)]
pub enum AppealError {
    Configuration(ConfigurationError),
    Usage(UsageError, Option<ErrorContext>),
    Command(CommandError, Option<ErrorContext>),
}

impl AppealError {
    pub(crate) fn with_context(self, ctx: ErrorContext) -> Self {
        match self {
            AppealError::Configuration(e) => AppealError::Configuration(e),
            AppealError::Usage(e, _) => AppealError::Usage(e, Some(ctx)),
            AppealError::Command(e, _) => AppealError::Command(e, Some(ctx)),
        }
    }

    /// The exit code a top-level entry point should use, mirroring
    /// [`CommandError::exit_code`] for the variants that carry one.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppealError::Configuration(_) => 1,
            AppealError::Usage(..) => 2,
            AppealError::Command(e, _) => e.exit_code(),
        }
    }
}

fn fmt_with_context(
    f: &mut fmt::Formatter<'_>,
    message: &dyn fmt::Display,
    ctx: &Option<ErrorContext>,
) -> fmt::Result {
    match ctx {
        Some(ctx) => {
            writeln!(f, "{}: {message}", ctx.header())?;
            f.write_str(&ctx.usage)
        }
        None => message.fmt(f),
    }
}

impl fmt::Display for AppealError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppealError::Configuration(e) => e.fmt(f),
            AppealError::Usage(e, ctx) => fmt_with_context(f, e, ctx),
            AppealError::Command(e, ctx) => fmt_with_context(f, e, ctx),
        }
    }
}

impl std::error::Error for AppealError {}

impl From<ConfigurationError> for AppealError {
    fn from(e: ConfigurationError) -> Self {
        AppealError::Configuration(e)
    }
}

impl From<UsageError> for AppealError {
    fn from(e: UsageError) -> Self {
        AppealError::Usage(e, None)
    }
}

impl From<CommandError> for AppealError {
    fn from(e: CommandError) -> Self {
        AppealError::Command(e, None)
    }
}
