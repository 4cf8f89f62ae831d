//! Completers: candidate suggestion and value parsing for argument tokens.
//!
//! Leaf completers own a single token. [`PeerCompleter`] and
//! [`TupleCompleter`] chain them across whitespace boundaries. No completer
//! mutates itself while answering a query, so completion can run on every
//! keystroke.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rosh_types::error::{Result, RoshError};
use rosh_types::value::Value;

use crate::interpreter::{ParsedArgs, quote, scan};

/// A completion suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Replacement text, already quoted.
    pub text: String,
    /// Number of bytes before the cursor that the replacement covers.
    pub replace: usize,
}

/// Suggests and parses argument tokens.
pub trait Completer: Send + Sync {
    /// Candidates for the text of `line` before `cursor`.
    fn candidates(&self, line: &str, cursor: usize) -> Vec<Candidate>;

    /// Convert an accepted token into a typed value, or explain why not.
    fn parse(&self, token: &str) -> std::result::Result<Value, String> {
        Ok(Value::Text(token.to_string()))
    }
}

/// Text of `line` up to `cursor`, clamped to a char boundary.
pub(crate) fn before_cursor(line: &str, cursor: usize) -> &str {
    let mut end = cursor.min(line.len());
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

/// The partially typed word at the end of `prefix`: its unquoted text and
/// its length in bytes.
pub(crate) fn partial_word(prefix: &str) -> (String, usize) {
    let scan = scan(prefix);
    let at_boundary = scan.open_quote.is_none() && prefix.ends_with(char::is_whitespace);
    match scan.tokens.last() {
        Some(tok) if !at_boundary => (tok.text.clone(), prefix.len() - tok.start),
        _ => (String::new(), 0),
    }
}

/// Candidates from `words` that extend the word being typed.
pub(crate) fn complete_words<'a>(
    prefix: &str,
    words: impl IntoIterator<Item = &'a str>,
) -> Vec<Candidate> {
    let (partial, replace) = partial_word(prefix);
    words
        .into_iter()
        .filter(|w| !w.is_empty() && w.starts_with(partial.as_str()))
        .map(|w| Candidate {
            text: quote(w),
            replace,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Dummy
// ---------------------------------------------------------------------------

/// No candidates, identity parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyCompleter;

impl Completer for DummyCompleter {
    fn candidates(&self, _line: &str, _cursor: usize) -> Vec<Candidate> {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Word
// ---------------------------------------------------------------------------

type WordSource = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

#[derive(Clone)]
enum Words {
    Fixed(Vec<String>),
    Lazy(WordSource),
}

/// A fixed or lazily computed word list.
///
/// Suggest-only word completers accept any token. Strict ones only accept
/// members of the list.
#[derive(Clone)]
pub struct WordCompleter {
    words: Words,
    strict: bool,
    description: String,
}

impl WordCompleter {
    /// Suggest-only completer over a fixed list.
    pub fn new(words: &[&str]) -> Self {
        Self {
            words: Words::Fixed(words.iter().map(|w| w.to_string()).collect()),
            strict: false,
            description: String::new(),
        }
    }

    /// Strict completer over a fixed list; `description` names the value in
    /// error messages.
    pub fn strict(description: &str, words: &[&str]) -> Self {
        Self {
            strict: true,
            description: description.to_string(),
            ..Self::new(words)
        }
    }

    /// Strict completer whose words are computed on every query.
    pub fn lazy(description: &str, source: impl Fn() -> Vec<String> + Send + Sync + 'static) -> Self {
        Self {
            words: Words::Lazy(Arc::new(source)),
            strict: true,
            description: description.to_string(),
        }
    }

    pub fn words(&self) -> Vec<String> {
        match &self.words {
            Words::Fixed(words) => words.clone(),
            Words::Lazy(source) => source(),
        }
    }
}

impl Completer for WordCompleter {
    fn candidates(&self, line: &str, cursor: usize) -> Vec<Candidate> {
        let words = self.words();
        complete_words(before_cursor(line, cursor), words.iter().map(String::as_str))
    }

    fn parse(&self, token: &str) -> std::result::Result<Value, String> {
        if !self.strict || self.words().iter().any(|w| w == token) {
            return Ok(Value::Text(token.to_string()));
        }
        if self.description.is_empty() {
            Err(format!("{token} is an invalid value"))
        } else {
            Err(format!("{token} is invalid for {}", self.description))
        }
    }
}

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

/// `base` completes the first word, `sub` everything after it.
#[derive(Clone)]
pub struct PeerCompleter {
    base: Arc<dyn Completer>,
    sub: Arc<dyn Completer>,
}

impl PeerCompleter {
    pub fn new(base: Arc<dyn Completer>, sub: Arc<dyn Completer>) -> Self {
        Self { base, sub }
    }
}

impl Completer for PeerCompleter {
    fn candidates(&self, line: &str, cursor: usize) -> Vec<Candidate> {
        let prefix = before_cursor(line, cursor).trim_start();
        match prefix.find(char::is_whitespace) {
            None => self.base.candidates(prefix, prefix.len()),
            Some(pos) => {
                let rest = prefix[pos..].trim_start();
                self.sub.candidates(rest, rest.len())
            },
        }
    }

    fn parse(&self, token: &str) -> std::result::Result<Value, String> {
        self.base.parse(token)
    }
}

// ---------------------------------------------------------------------------
// Tuple
// ---------------------------------------------------------------------------

/// An unordered set of `name value` pairs, each name used at most once.
///
/// The names still available are a value of the completer itself: completing
/// past a name builds a new tuple without it instead of recording anything.
#[derive(Clone)]
pub struct TupleCompleter {
    params: Arc<BTreeMap<String, Arc<dyn Completer>>>,
    remaining: BTreeSet<String>,
}

impl TupleCompleter {
    pub fn new<'a>(params: impl IntoIterator<Item = (&'a str, Arc<dyn Completer>)>) -> Self {
        let params: BTreeMap<String, Arc<dyn Completer>> = params
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let remaining = params.keys().cloned().collect();
        Self {
            params: Arc::new(params),
            remaining,
        }
    }

    fn without(&self, name: &str) -> Self {
        let mut remaining = self.remaining.clone();
        remaining.remove(name);
        Self {
            params: Arc::clone(&self.params),
            remaining,
        }
    }

    /// Names not yet supplied.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.remaining.iter().map(String::as_str)
    }

    /// Validate `args` as `name value` pairs.
    ///
    /// Error columns point at the offending name, or at its value when the
    /// value is missing or rejected.
    pub fn validate_pairs(&self, args: &[String]) -> Result<ParsedArgs> {
        let mut parsed = ParsedArgs::default();
        for (i, pair) in args.chunks(2).enumerate() {
            let column = i * 2;
            let name = &pair[0];
            let Some(completer) = self.params.get(name) else {
                return Err(RoshError::Argument {
                    column,
                    message: format!("unknown parameter {}", quote(name)),
                });
            };
            if parsed.named.contains_key(name) {
                return Err(RoshError::Argument {
                    column,
                    message: format!("parameter {name} already given"),
                });
            }
            let Some(raw) = pair.get(1) else {
                return Err(RoshError::Argument {
                    column: column + 1,
                    message: format!("missing value for {name}"),
                });
            };
            let value = completer.parse(raw).map_err(|message| RoshError::Argument {
                column: column + 1,
                message,
            })?;
            parsed.named.insert(name.clone(), value);
        }
        Ok(parsed)
    }
}

impl Completer for TupleCompleter {
    fn candidates(&self, line: &str, cursor: usize) -> Vec<Candidate> {
        let prefix = before_cursor(line, cursor).trim_start();
        match prefix.find(char::is_whitespace) {
            None => complete_words(prefix, self.keys()),
            Some(pos) => {
                let name = &prefix[..pos];
                let Some(value) = self.params.get(name).filter(|_| self.remaining.contains(name))
                else {
                    return Vec::new();
                };
                let rest = &prefix[pos..];
                PeerCompleter::new(Arc::clone(value), Arc::new(self.without(name)))
                    .candidates(rest, rest.len())
            },
        }
    }
}
