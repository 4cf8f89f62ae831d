//! Editor-time validation of the line being typed.
//!
//! Nothing is executed. Positions are byte offsets into the line.
//!
//! - An unfinished command path or filter segment at the end of the line is
//!   reported at end of line.
//! - An unknown command word is reported at the start of that word.
//! - An argument or filter error with column `c` is reported at the start of
//!   token `depth + c` of the whole line (pipes included). When that token has
//!   not been typed yet the line is incomplete and the error sits at end of
//!   line.
//!
//! For lines typed with single spaces and canonical quoting the word start
//! equals the length of the re-joined preceding tokens plus one separator.

use rosh_types::error::RoshError;

use crate::filter::FilterRegistry;
use crate::interpreter::{Token, scan, split_pipes};
use crate::registry::CommandRegistry;

/// Verdict on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// More input is needed; `position` is always the end of line.
    Incomplete { position: usize, message: String },
    Invalid { position: usize, message: String },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Valid => None,
            Self::Incomplete { position, .. } | Self::Invalid { position, .. } => Some(*position),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Incomplete { message, .. } | Self::Invalid { message, .. } => Some(message),
        }
    }
}

/// Start of token `index`, or end of line when it does not exist.
fn token_offset(text: &str, tokens: &[Token], index: usize) -> usize {
    tokens.get(index).map_or(text.len(), |t| t.start)
}

/// An error reported against token `index`. When that token has not been
/// typed yet the line is merely unfinished.
fn anchored(text: &str, tokens: &[Token], index: usize, message: String) -> Validation {
    match tokens.get(index) {
        Some(token) => Validation::Invalid {
            position: token.start,
            message,
        },
        None => Validation::Incomplete {
            position: text.len(),
            message,
        },
    }
}

/// Validate `text` against the command and filter registries.
pub fn validate_line(registry: &CommandRegistry, filters: &FilterRegistry, text: &str) -> Validation {
    let scanned = scan(text);
    if let Some(message) = scanned.syntax_error() {
        return Validation::Invalid {
            position: text.len(),
            message: message.into(),
        };
    }
    let tokens = scanned.tokens;
    if tokens.is_empty() {
        return Validation::Valid;
    }

    let (words, segments) = split_pipes(&tokens);
    let res = registry.resolve(&words);
    let Some(cmd) = res.command() else {
        if words.is_empty() {
            return Validation::Invalid {
                position: token_offset(text, &tokens, 0),
                message: "missing command".into(),
            };
        }
        if res.is_incomplete(words.len()) {
            return Validation::Incomplete {
                position: text.len(),
                message: "incomplete command".into(),
            };
        }
        return Validation::Invalid {
            position: token_offset(text, &tokens, res.depth - 1),
            message: "unknown command".into(),
        };
    };

    if let Err(e) = cmd.validate(&res.remaining) {
        let column = e.column().unwrap_or(0);
        return anchored(text, &tokens, res.depth + column, e.to_string());
    }

    let last = segments.len().saturating_sub(1);
    for (i, (offset, words)) in segments.iter().enumerate() {
        if words.is_empty() && i == last {
            return Validation::Incomplete {
                position: text.len(),
                message: "missing filter".into(),
            };
        }
        match filters.instantiate(words) {
            Ok(_) => {},
            Err(RoshError::UnknownFilter(_)) => {
                return Validation::Invalid {
                    position: token_offset(text, &tokens, *offset),
                    message: "unknown filter".into(),
                };
            },
            Err(e) => {
                let column = e.column().unwrap_or(0);
                return anchored(text, &tokens, offset + column, e.to_string());
            },
        }
    }
    Validation::Valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use proptest::prelude::*;
    use rosh_types::error::Result;

    use crate::completer::{Completer, DummyCompleter, TupleCompleter, WordCompleter};
    use crate::interpreter::{
        Command, CommandOutput, Environment, Invocation, ParsedArgs, join, tokenize,
    };

    struct Leaf {
        min: usize,
        max: Option<usize>,
        completer: Arc<dyn Completer>,
    }
    impl Command for Leaf {
        fn description(&self) -> &str {
            "test"
        }
        fn completer(&self) -> Arc<dyn Completer> {
            Arc::clone(&self.completer)
        }
        fn min_args(&self) -> usize {
            self.min
        }
        fn max_args(&self) -> Option<usize> {
            self.max
        }
        fn execute(&self, _inv: &Invocation, _env: &mut Environment<'_>) -> Result<CommandOutput> {
            Ok(CommandOutput::None)
        }
    }

    struct Routes(TupleCompleter);
    impl Command for Routes {
        fn description(&self) -> &str {
            "routes"
        }
        fn validate(&self, args: &[String]) -> Result<ParsedArgs> {
            self.0.validate_pairs(args)
        }
        fn execute(&self, _inv: &Invocation, _env: &mut Environment<'_>) -> Result<CommandOutput> {
            Ok(CommandOutput::None)
        }
    }

    fn registry() -> CommandRegistry {
        let ifaces: Arc<dyn Completer> = Arc::new(WordCompleter::strict("interface", &["eth0", "lo"]));
        let mut reg = CommandRegistry::new();
        reg.register(
            &["show", "ip", "address"],
            Box::new(Leaf {
                min: 0,
                max: Some(1),
                completer: Arc::clone(&ifaces),
            }),
        )
        .unwrap();
        reg.register(
            &["show", "ip", "route"],
            Box::new(Routes(TupleCompleter::new([
                ("dev", Arc::clone(&ifaces)),
                ("via", Arc::new(DummyCompleter) as Arc<dyn Completer>),
            ]))),
        )
        .unwrap();
        reg.register(
            &["enable", "interface"],
            Box::new(Leaf {
                min: 1,
                max: Some(1),
                completer: ifaces,
            }),
        )
        .unwrap();
        reg
    }

    fn check(text: &str) -> Validation {
        validate_line(&registry(), &FilterRegistry::builtin(), text)
    }

    fn invalid(position: usize, message: &str) -> Validation {
        Validation::Invalid {
            position,
            message: message.into(),
        }
    }

    #[test]
    fn empty_line_is_valid() {
        assert_eq!(check(""), Validation::Valid);
        assert_eq!(check("   "), Validation::Valid);
    }

    #[test]
    fn resolved_command_is_valid() {
        assert_eq!(check("sh ip addr"), Validation::Valid);
        assert_eq!(check("sh ip addr eth0 | inc up"), Validation::Valid);
    }

    #[test]
    fn interior_stop_is_incomplete_at_end() {
        assert_eq!(
            check("show ip"),
            Validation::Incomplete {
                position: 7,
                message: "incomplete command".into()
            }
        );
        assert_eq!(check("show ip ").position(), Some(8));
    }

    #[test]
    fn unknown_word_anchors_at_its_start() {
        assert_eq!(check("bogus"), invalid(0, "unknown command"));
        assert_eq!(check("show xx address"), invalid(5, "unknown command"));
        assert_eq!(check("show ip rxx"), invalid(8, "unknown command"));
    }

    #[test]
    fn scenario_missing_tuple_value_at_end() {
        let text = "sh ip rou dev";
        assert_eq!(
            check(text),
            Validation::Incomplete {
                position: text.len(),
                message: "missing value for dev".into()
            }
        );
    }

    #[test]
    fn tuple_value_error_anchors_at_value() {
        // tokens: sh ip rou dev eth9 -> value is token 4, starts at 14
        assert_eq!(
            check("sh ip rou dev eth9"),
            invalid(14, "eth9 is invalid for interface")
        );
    }

    #[test]
    fn tuple_repeat_anchors_at_second_name() {
        let text = "show ip route dev eth0 dev lo";
        assert_eq!(check(text), invalid(23, "parameter dev already given"));
    }

    #[test]
    fn positional_errors() {
        assert_eq!(check("enable interface").position(), Some(16));
        assert_eq!(check("enable interface").message(), Some("missing argument"));
        assert_eq!(
            check("enable int eth7"),
            invalid(11, "eth7 is invalid for interface")
        );
        assert_eq!(
            check("show ip addr eth0 lo"),
            invalid(18, "too many arguments")
        );
    }

    #[test]
    fn quoted_tokens_shift_anchor() {
        // 'show' quoted still resolves; the bad word starts after it.
        assert_eq!(check("'show' 'i p'"), invalid(7, "unknown command"));
    }

    #[test]
    fn filter_errors() {
        assert_eq!(check("show ip addr | grep x"), invalid(15, "unknown filter"));
        assert_eq!(
            check("show ip addr | inc"),
            Validation::Incomplete {
                position: 18,
                message: "missing argument".into()
            }
        );
        assert_eq!(
            check("show ip addr | inc a b"),
            invalid(21, "too many arguments")
        );
        assert_eq!(check("show ip addr | inc (").position(), Some(19));
        assert_eq!(
            check("show ip addr |"),
            Validation::Incomplete {
                position: 14,
                message: "missing filter".into()
            }
        );
        assert_eq!(check("show ip addr | | inc x"), invalid(15, "missing filter name"));
        assert_eq!(check("| inc x"), invalid(0, "missing command"));
    }

    #[test]
    fn unterminated_quote_at_end() {
        assert_eq!(check("show 'ip"), invalid(8, "missing closing quote"));
    }

    #[test]
    fn trailing_backslash_at_end() {
        assert_eq!(
            check("show ip route dev eth0\\"),
            invalid(23, "no escaped character")
        );
    }

    /// Length of `tokens[..index]` re-joined, plus one separator when non-empty.
    fn rejoin_offset(tokens: &[Token], index: usize) -> usize {
        let joined = join(&tokens[..index.min(tokens.len())]);
        if joined.is_empty() {
            0
        } else {
            joined.len() + 1
        }
    }

    #[test]
    fn rejoin_matches_examples() {
        let t = tokenize("show ip route | inc 'a b'").unwrap();
        assert_eq!(rejoin_offset(&t, 0), 0);
        assert_eq!(rejoin_offset(&t, 1), 5);
        assert_eq!(rejoin_offset(&t, 4), 16);
        assert_eq!(rejoin_offset(&t, 5), 20);
    }

    fn word() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z0-9]{1,6}",
            "[a-z ]{0,5}",
            Just("|".to_string()),
            Just(String::new()),
        ]
    }

    proptest! {
        #[test]
        fn validation_is_idempotent(text in "[a-z |']{0,30}") {
            let reg = registry();
            let filters = FilterRegistry::builtin();
            prop_assert_eq!(
                validate_line(&reg, &filters, &text),
                validate_line(&reg, &filters, &text)
            );
        }

        #[test]
        fn canonical_spacing_anchors_like_rejoin(words in prop::collection::vec(word(), 1..6)) {
            // Render with canonical quoting so token starts are predictable.
            let line = words
                .iter()
                .map(|w| if w == "|" { w.clone() } else { crate::interpreter::quote(w) })
                .collect::<Vec<_>>()
                .join(" ");
            let tokens = tokenize(&line).unwrap();
            for i in 0..tokens.len() {
                prop_assert_eq!(token_offset(&line, &tokens, i), rejoin_offset(&tokens, i));
            }
        }
    }
}
