//! Error types for rosh.

use std::io;

/// Errors produced by the rosh shell.
///
/// The first group is the user-facing taxonomy of a single input line. None of
/// them are fatal: the interactive loop prints them and re-prompts. `Registry`
/// is only raised while the command tree is being built and aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum RoshError {
    /// No command matched, including ambiguous abbreviations.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The line stops at an interior node of the command tree.
    #[error("command incomplete")]
    IncompleteCommand,

    /// A positional or named argument was rejected.
    #[error("{message}")]
    Argument { column: usize, message: String },

    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    /// A filter segment's arguments were rejected.
    #[error("{message}")]
    FilterArgument { column: usize, message: String },

    /// Unbalanced quoting.
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("command error: {0}")]
    Command(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("process error: {0}")]
    Process(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RoshError {
    /// Column of the offending argument, for errors that carry one.
    pub fn column(&self) -> Option<usize> {
        match self {
            Self::Argument { column, .. } | Self::FilterArgument { column, .. } => Some(*column),
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, RoshError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_command_display() {
        let e = RoshError::UnknownCommand("shw".into());
        assert_eq!(format!("{e}"), "unknown command: shw");
    }

    #[test]
    fn incomplete_command_display() {
        assert_eq!(format!("{}", RoshError::IncompleteCommand), "command incomplete");
    }

    #[test]
    fn argument_error_displays_message_only() {
        let e = RoshError::Argument {
            column: 2,
            message: "missing filter value".into(),
        };
        assert_eq!(format!("{e}"), "missing filter value");
        assert_eq!(e.column(), Some(2));
    }

    #[test]
    fn filter_argument_carries_column() {
        let e = RoshError::FilterArgument {
            column: 0,
            message: "bad regex".into(),
        };
        assert_eq!(e.column(), Some(0));
    }

    #[test]
    fn column_absent_for_other_errors() {
        assert_eq!(RoshError::Query("netlink".into()).column(), None);
        assert_eq!(RoshError::IncompleteCommand.column(), None);
    }

    #[test]
    fn unknown_filter_display() {
        let e = RoshError::UnknownFilter("grep".into());
        assert_eq!(format!("{e}"), "unknown filter: grep");
    }

    #[test]
    fn registry_error_display() {
        let e = RoshError::Registry("duplicate command: show ip route".into());
        assert_eq!(
            format!("{e}"),
            "registry error: duplicate command: show ip route"
        );
    }

    #[test]
    fn io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let e: RoshError = io_err.into();
        let msg = format!("{e}");
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn toml_error_from_conversion() {
        let toml_err = toml::from_str::<toml::Value>("this is [[[not valid toml").unwrap_err();
        let e: RoshError = toml_err.into();
        assert!(format!("{e}").contains("TOML parse error"));
    }

    #[test]
    fn json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let e: RoshError = json_err.into();
        assert!(format!("{e}").contains("JSON error"));
    }

    #[test]
    fn result_alias_err() {
        let r: Result<i32> = Err(RoshError::Process("spawn failed".into()));
        assert!(r.is_err());
    }
}
