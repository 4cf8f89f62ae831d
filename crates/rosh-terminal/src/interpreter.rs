//! Command trait, tokenizer, and the values passed to command handlers.
//!
//! Input lines are shell-quoted. A standalone, unquoted `|` separates the
//! command from a chain of output filters.

use std::collections::BTreeMap;
use std::sync::Arc;

use rosh_platform::{ProcessLauncher, QueryContext};
use rosh_types::config::RoshConfig;
use rosh_types::error::{Result, RoshError};
use rosh_types::lookup::Lookups;
use rosh_types::value::Value;

use crate::completer::{Completer, DummyCompleter};
use crate::filter::{FilterChain, FilterRegistry};
use crate::registry::CommandRegistry;
use crate::tools::Toolbox;

/// Output produced by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// Plain text lines.
    Text(String),
    /// Tabular data (header row + data rows).
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// Command produced no visible output.
    None,
    /// Signal to leave the interactive loop.
    Quit,
}

/// Sink for output produced outside the request/response cycle (monitor).
pub type LinePrinter = Arc<dyn Fn(&str) + Send + Sync>;

/// Services handed to every command invocation.
pub struct Environment<'a> {
    /// Active network query context.
    pub query: &'a QueryContext,
    pub launcher: &'a dyn ProcessLauncher,
    pub config: &'a RoshConfig,
    pub lookups: &'a Lookups,
    pub tools: &'a Toolbox,
    /// Filters parsed from the pipe segments of the line.
    pub filters: &'a FilterChain,
    pub printer: &'a LinePrinter,
    /// The registries the line was resolved against (for `help`).
    pub registry: &'a CommandRegistry,
    pub filter_registry: &'a FilterRegistry,
}

/// Arguments accepted by a command's validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    /// Value of the first positional argument, when the completer parses one.
    pub positional: Option<Value>,
    /// `name value` pairs of tuple-parameterised commands.
    pub named: BTreeMap<String, Value>,
}

/// A resolved, validated command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Full key path of the command (`["show", "ip", "route"]`).
    pub path: Vec<String>,
    /// Raw arguments after the command path.
    pub args: Vec<String>,
    pub parsed: ParsedArgs,
}

/// A single executable command.
pub trait Command: Send + Sync {
    /// One-line description for `help`.
    fn description(&self) -> &str;

    /// Completer for the arguments following the command path.
    fn completer(&self) -> Arc<dyn Completer> {
        Arc::new(DummyCompleter)
    }

    fn min_args(&self) -> usize {
        0
    }

    /// `None` means unbounded.
    fn max_args(&self) -> Option<usize> {
        None
    }

    /// Check the arguments without executing anything.
    fn validate(&self, args: &[String]) -> Result<ParsedArgs> {
        validate_simple(args, self.min_args(), self.max_args(), self.completer().as_ref())
    }

    /// Execute the command.
    fn execute(&self, inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput>;

    /// Release background resources; called once when the shell exits.
    fn shutdown(&self) {}
}

/// Count checks plus a parse of the first argument by `completer`.
pub fn validate_simple(
    args: &[String],
    min_args: usize,
    max_args: Option<usize>,
    completer: &dyn Completer,
) -> Result<ParsedArgs> {
    if args.len() < min_args {
        return Err(RoshError::Argument {
            column: args.len(),
            message: "missing argument".to_string(),
        });
    }
    if let Some(max) = max_args
        && args.len() > max
    {
        return Err(RoshError::Argument {
            column: max,
            message: "too many arguments".to_string(),
        });
    }
    let mut parsed = ParsedArgs::default();
    if let Some(first) = args.first() {
        let value = completer
            .parse(first)
            .map_err(|message| RoshError::Argument { column: 0, message })?;
        parsed.positional = Some(value);
    }
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// One word of an input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Unquoted text.
    pub text: String,
    /// Whether any part of the word was quoted or escaped.
    pub quoted: bool,
    /// Byte offset of the word's first character in the line.
    pub start: usize,
}

impl Token {
    /// A standalone, unquoted `|`.
    pub fn is_pipe(&self) -> bool {
        !self.quoted && self.text == "|"
    }
}

/// Result of scanning a possibly unfinished line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    pub tokens: Vec<Token>,
    /// The quote character left open at end of line.
    pub open_quote: Option<char>,
    /// The line ends in a backslash outside quotes.
    pub dangling_escape: bool,
}

impl Scan {
    /// Why the line cannot be split as typed, if it cannot.
    pub fn syntax_error(&self) -> Option<&'static str> {
        if self.open_quote.is_some() {
            Some("missing closing quote")
        } else if self.dangling_escape {
            Some("no escaped character")
        } else {
            None
        }
    }
}

/// Split a line into words, tolerating an unterminated quote.
///
/// Single quotes are literal; inside double quotes a backslash escapes `"`
/// and `\`; outside quotes a backslash escapes any character.
pub fn scan(input: &str) -> Scan {
    let mut tokens = Vec::new();
    let mut current: Option<Token> = None;
    let mut chars = input.char_indices().peekable();
    let mut quote: Option<char> = None;
    let mut dangling_escape = false;

    while let Some((pos, ch)) = chars.next() {
        match quote {
            Some('\'') => {
                if ch == '\'' {
                    quote = None;
                } else if let Some(tok) = current.as_mut() {
                    tok.text.push(ch);
                }
            },
            Some(_) => {
                if ch == '"' {
                    quote = None;
                } else if ch == '\\'
                    && let Some(&(_, next)) = chars.peek()
                    && matches!(next, '"' | '\\')
                {
                    chars.next();
                    if let Some(tok) = current.as_mut() {
                        tok.text.push(next);
                    }
                } else if let Some(tok) = current.as_mut() {
                    tok.text.push(ch);
                }
            },
            None if ch.is_whitespace() => {
                if let Some(tok) = current.take() {
                    tokens.push(tok);
                }
            },
            None => {
                let tok = current.get_or_insert_with(|| Token {
                    text: String::new(),
                    quoted: false,
                    start: pos,
                });
                match ch {
                    '\'' | '"' => {
                        quote = Some(ch);
                        tok.quoted = true;
                    },
                    '\\' => {
                        tok.quoted = true;
                        match chars.next() {
                            Some((_, next)) => tok.text.push(next),
                            None => dangling_escape = true,
                        }
                    },
                    _ => tok.text.push(ch),
                }
            },
        }
    }

    if let Some(tok) = current {
        tokens.push(tok);
    }
    Scan {
        tokens,
        open_quote: quote,
        dangling_escape,
    }
}

/// Split a complete line into words.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let scan = scan(input);
    match scan.syntax_error() {
        Some(message) => Err(RoshError::Syntax(message.to_string())),
        None => Ok(scan.tokens),
    }
}

/// Split tokens at standalone pipes: the command words, then each filter
/// segment together with the index of its first token in `tokens`.
pub fn split_pipes(tokens: &[Token]) -> (Vec<String>, Vec<(usize, Vec<String>)>) {
    let mut command = Vec::new();
    let mut segments: Vec<(usize, Vec<String>)> = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_pipe() {
            segments.push((i + 1, Vec::new()));
        } else if let Some((_, words)) = segments.last_mut() {
            words.push(tok.text.clone());
        } else {
            command.push(tok.text.clone());
        }
    }
    (command, segments)
}

/// Characters that never need quoting.
fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c)
}

/// Quote a word so that [`tokenize`] reads it back unchanged.
pub fn quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    if word.chars().all(is_safe) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\"'\"'"))
}

/// Re-join tokens the way they would be typed: words quoted, pipes bare.
pub fn join(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| if t.is_pipe() { "|".to_string() } else { quote(&t.text) })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn tokenize_simple() {
        let t = tokenize("show ip  route").unwrap();
        assert_eq!(texts(&t), vec!["show", "ip", "route"]);
        assert_eq!(t[2].start, 9);
    }

    #[test]
    fn tokenize_single_quotes() {
        let t = tokenize("ping 'a b'").unwrap();
        assert_eq!(texts(&t), vec!["ping", "a b"]);
        assert!(t[1].quoted);
    }

    #[test]
    fn tokenize_double_quotes_and_escapes() {
        let t = tokenize(r#"x "say \"hi\"" a\ b"#).unwrap();
        assert_eq!(texts(&t), vec!["x", r#"say "hi""#, "a b"]);
    }

    #[test]
    fn tokenize_keeps_empty_quoted_word() {
        let t = tokenize("x '' y").unwrap();
        assert_eq!(texts(&t), vec!["x", "", "y"]);
    }

    #[test]
    fn tokenize_unterminated_quote() {
        let err = tokenize("show 'eth").unwrap_err();
        assert_eq!(format!("{err}"), "syntax error: missing closing quote");
        assert_eq!(scan("show 'eth").open_quote, Some('\''));
    }

    #[test]
    fn tokenize_rejects_trailing_backslash() {
        let err = tokenize("ping foo\\").unwrap_err();
        assert_eq!(format!("{err}"), "syntax error: no escaped character");
        assert!(scan("ping foo\\").dangling_escape);
        // Escaped backslash and backslash inside quotes are fine.
        assert_eq!(texts(&tokenize("ping foo\\\\").unwrap()), vec!["ping", "foo\\"]);
        assert!(tokenize("ping 'foo\\'").is_ok());
    }

    #[test]
    fn quoted_pipe_is_not_a_pipe() {
        let t = tokenize("a '|' | b").unwrap();
        assert!(!t[1].is_pipe());
        assert!(t[2].is_pipe());
    }

    #[test]
    fn split_pipes_segments() {
        let t = tokenize("show route | inc eth0 | exc down").unwrap();
        let (cmd, segs) = split_pipes(&t);
        assert_eq!(cmd, vec!["show", "route"]);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0], (3, vec!["inc".to_string(), "eth0".to_string()]));
        assert_eq!(segs[1], (6, vec!["exc".to_string(), "down".to_string()]));
    }

    #[test]
    fn split_pipes_trailing_pipe_gives_empty_segment() {
        let t = tokenize("show route |").unwrap();
        let (_, segs) = split_pipes(&t);
        assert_eq!(segs, vec![(3, Vec::new())]);
    }

    #[test]
    fn quote_forms() {
        assert_eq!(quote("eth0"), "eth0");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("a b"), "'a b'");
        assert_eq!(quote("it's"), r#"'it'"'"'s'"#);
    }

    #[test]
    fn join_leaves_pipes_bare() {
        let t = tokenize("show route | inc 'a b'").unwrap();
        assert_eq!(join(&t), "show route | inc 'a b'");
    }

    struct Fixed;
    impl Completer for Fixed {
        fn candidates(&self, _line: &str, _cursor: usize) -> Vec<crate::completer::Candidate> {
            Vec::new()
        }
        fn parse(&self, token: &str) -> std::result::Result<Value, String> {
            if token == "ok" {
                Ok(Value::Text(token.into()))
            } else {
                Err(format!("{token} is invalid"))
            }
        }
    }

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn validate_simple_missing_argument_column() {
        let err = validate_simple(&[], 1, None, &Fixed).unwrap_err();
        assert_eq!(err.column(), Some(0));
        assert_eq!(format!("{err}"), "missing argument");
    }

    #[test]
    fn validate_simple_too_many_column() {
        let err = validate_simple(&args(&["ok", "x", "y"]), 0, Some(1), &Fixed).unwrap_err();
        assert_eq!(err.column(), Some(1));
        assert_eq!(format!("{err}"), "too many arguments");
    }

    #[test]
    fn validate_simple_parses_first() {
        let parsed = validate_simple(&args(&["ok"]), 1, Some(1), &Fixed).unwrap();
        assert_eq!(parsed.positional, Some(Value::Text("ok".into())));
        let err = validate_simple(&args(&["bad"]), 1, Some(1), &Fixed).unwrap_err();
        assert_eq!(err.column(), Some(0));
        assert_eq!(format!("{err}"), "bad is invalid");
    }

    proptest! {
        #[test]
        fn quote_round_trips(word in "\\PC{0,12}") {
            let t = tokenize(&quote(&word)).unwrap();
            prop_assert_eq!(t.len(), 1);
            prop_assert_eq!(&t[0].text, &word);
        }
    }
}
