//! Output filters applied after `|`.

use std::collections::BTreeMap;

use regex::Regex;

use rosh_types::error::{Result, RoshError};

use crate::completer::{Candidate, before_cursor, complete_words};
use crate::interpreter::CommandOutput;
use crate::registry::abbreviate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Include,
    Exclude,
}

impl FilterKind {
    /// How the per-column test combines over a row.
    pub fn combine(self) -> Combine {
        match self {
            Self::Include => Combine::Any,
            Self::Exclude => Combine::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    /// Passes if any column matches.
    Any,
    /// Passes if every column is free of matches.
    All,
}

/// One instantiated filter.
#[derive(Debug, Clone)]
pub struct Filter {
    kind: FilterKind,
    pattern: Regex,
}

impl Filter {
    pub fn new(kind: FilterKind, pattern: Regex) -> Self {
        Self { kind, pattern }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    fn matches_any<S: AsRef<str>>(&self, columns: &[S]) -> bool {
        columns.iter().any(|c| self.pattern.is_match(c.as_ref()))
    }

    /// Row-oriented test.
    pub fn test_row<S: AsRef<str>>(&self, row: &[S]) -> bool {
        match self.kind.combine() {
            Combine::Any => self.matches_any(row),
            Combine::All => !self.matches_any(row),
        }
    }

    /// Line-oriented test.
    pub fn test_line(&self, line: &str) -> bool {
        self.test_row(&[line])
    }
}

/// The filters of one command line, all of which must pass.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn apply_row<S: AsRef<str>>(&self, row: &[S]) -> bool {
        self.filters.iter().all(|f| f.test_row(row))
    }

    pub fn apply_line(&self, line: &str) -> bool {
        self.filters.iter().all(|f| f.test_line(line))
    }

    /// Filter table rows or text lines; headers and signals pass unchanged.
    pub fn apply(&self, output: CommandOutput) -> CommandOutput {
        if self.is_empty() {
            return output;
        }
        match output {
            CommandOutput::Table { headers, rows } => CommandOutput::Table {
                headers,
                rows: rows.into_iter().filter(|r| self.apply_row(r)).collect(),
            },
            CommandOutput::Text(text) => CommandOutput::Text(
                text.lines()
                    .filter(|l| self.apply_line(l))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct FilterDef {
    kind: FilterKind,
    description: &'static str,
}

/// Flat namespace of filter names, resolved by abbreviation.
pub struct FilterRegistry {
    filters: BTreeMap<String, FilterDef>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self {
            filters: BTreeMap::new(),
        }
    }

    /// `include` and `exclude`.
    pub fn builtin() -> Self {
        let mut reg = Self::new();
        reg.register("include", FilterKind::Include, "keep lines matching a regex");
        reg.register("exclude", FilterKind::Exclude, "drop lines matching a regex");
        reg
    }

    pub fn register(&mut self, name: &str, kind: FilterKind, description: &'static str) {
        self.filters
            .insert(name.to_string(), FilterDef { kind, description });
    }

    /// Filter names with descriptions.
    pub fn list(&self) -> Vec<(&str, &str)> {
        self.filters
            .iter()
            .map(|(name, def)| (name.as_str(), def.description))
            .collect()
    }

    /// Instantiate the filter described by one pipe segment.
    ///
    /// Error columns are relative to the segment: 0 is the filter name.
    pub fn instantiate(&self, segment: &[String]) -> Result<Filter> {
        let Some((name, args)) = segment.split_first() else {
            return Err(RoshError::FilterArgument {
                column: 0,
                message: "missing filter name".into(),
            });
        };
        let Some((_, def)) = abbreviate(&self.filters, name) else {
            return Err(RoshError::UnknownFilter(name.clone()));
        };
        match args {
            [] => Err(RoshError::FilterArgument {
                column: 1,
                message: "missing argument".into(),
            }),
            [pattern] => {
                let regex = Regex::new(pattern).map_err(|e| RoshError::FilterArgument {
                    column: 1,
                    message: regex_message(&e),
                })?;
                Ok(Filter::new(def.kind, regex))
            },
            _ => Err(RoshError::FilterArgument {
                column: 2,
                message: "too many arguments".into(),
            }),
        }
    }

    /// Build the chain for all segments of a line.
    pub fn build_chain(&self, segments: &[(usize, Vec<String>)]) -> Result<FilterChain> {
        let filters = segments
            .iter()
            .map(|(_, words)| self.instantiate(words))
            .collect::<Result<Vec<_>>>()?;
        Ok(FilterChain::new(filters))
    }

    /// Completion within one pipe segment: filter names, then the pattern.
    pub fn candidates(&self, line: &str, cursor: usize) -> Vec<Candidate> {
        let prefix = before_cursor(line, cursor).trim_start();
        match prefix.find(char::is_whitespace) {
            None => complete_words(prefix, self.filters.keys().map(String::as_str)),
            // Patterns are free-form.
            Some(_) => Vec::new(),
        }
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Last line of a regex error, which carries the actual complaint.
fn regex_message(e: &regex::Error) -> String {
    let text = e.to_string();
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim().trim_start_matches("error: ").to_string())
        .unwrap_or(text)
}
