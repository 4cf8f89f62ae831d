//! Command interpreter for rosh.
//!
//! Commands live in a tree of words and are found by unique prefix. Each
//! command brings a completer for its arguments. Anything after a standalone
//! `|` is a chain of regex filters applied to the command's output.

mod commands;
pub mod completer;
pub mod filter;
pub mod interpreter;
pub mod link_commands;
pub mod output;
pub mod registry;
mod shell;
pub mod shell_commands;
pub mod show_commands;
pub mod system_commands;
mod tools;
pub mod validator;
pub mod value_completers;

#[cfg(test)]
pub(crate) mod test_utils;

/// Register all built-in commands into a registry.
pub use commands::register_builtins;
/// Services and tables command constructors need at registration time.
pub use commands::Setup;
/// One completion candidate and how much of the typed word it replaces.
pub use completer::Candidate;
/// Argument completion and parsing for a command.
pub use completer::Completer;
/// The filters of one command line, applied to its output.
pub use filter::FilterChain;
/// Filter names (`include`, `exclude`) resolved by abbreviation.
pub use filter::FilterRegistry;
/// A single executable command trait.
pub use interpreter::Command;
/// Output produced by a command (text, table, signals).
pub use interpreter::CommandOutput;
/// Shared environment passed to every command.
pub use interpreter::Environment;
/// Callback printing one line of background output.
pub use interpreter::LinePrinter;
/// Render command output as terminal text.
pub use output::render;
/// Tree of command words with abbreviation lookup.
pub use registry::CommandRegistry;
/// Line dispatch, completion and validation over the registries.
pub use shell::Shell;
/// Everything a shell is built from.
pub use shell::ShellParts;
/// External tools found on the host.
pub use tools::Toolbox;
/// Verdict of editor-time validation.
pub use validator::Validation;
