//! Rendering of command output for the terminal.

use crate::interpreter::CommandOutput;

/// Column gap in rendered tables.
const GAP: &str = "  ";

/// Render output as terminal text; `None` when nothing is printed.
pub fn render(output: &CommandOutput) -> Option<String> {
    match output {
        CommandOutput::Text(text) if text.is_empty() => None,
        CommandOutput::Text(text) => Some(text.clone()),
        CommandOutput::Table { headers, rows } => Some(render_table(headers, rows)),
        CommandOutput::None | CommandOutput::Quit => None,
    }
}

/// Borderless table: upper-case headers, columns padded to the widest cell.
///
/// The last column is not padded, so lines carry no trailing blanks.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let columns = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or(0);
    let header_row: Vec<String> = headers.iter().map(|h| h.to_uppercase()).collect();

    let mut widths = vec![0; columns];
    for row in std::iter::once(&header_row).chain(rows) {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let format_row = |row: &[String]| -> String {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                line.push_str(GAP);
            }
            line.push_str(cell);
            if i + 1 < row.len() {
                let pad = widths[i] - cell.chars().count();
                line.extend(std::iter::repeat_n(' ', pad));
            }
        }
        line.trim_end().to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format_row(&header_row));
    lines.extend(rows.iter().map(|r| format_row(r)));
    lines.join("\n")
}

/// Builder for `key: value` detail views split into titled sections.
#[derive(Debug, Default)]
pub struct Details {
    lines: Vec<String>,
}

impl Details {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a section; sections after the first are separated by a blank line.
    pub fn section(mut self, title: &str) -> Self {
        if !self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.lines.push(format!("{title}:"));
        self
    }

    pub fn field(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.lines.push(format!("  {key}: {value}"));
        self
    }

    /// Like [`Self::field`], skipping absent values.
    pub fn field_opt<T: std::fmt::Display>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    /// Plain indented line inside the current section.
    pub fn item(mut self, text: impl std::fmt::Display) -> Self {
        self.lines.push(format!("  {text}"));
        self
    }

    pub fn build(self) -> CommandOutput {
        CommandOutput::Text(self.lines.join("\n"))
    }
}
