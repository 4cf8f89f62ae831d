//! Line editor: rustyline wired to the shell's completion and validation.

use std::borrow::Cow;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context as _, Result};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{CompletionType, Config, Context, Editor, ExternalPrinter as _, Helper};

use rosh_platform::CancelToken;
use rosh_terminal::{CommandOutput, LinePrinter, Shell, render};
use rosh_types::config::RoshConfig;

use crate::{build_shell, hostname};

/// The message shown under a rejected line: a caret below `column`.
fn caret_message(column: usize, message: &str) -> String {
    format!("\n{}^ {message}", " ".repeat(column))
}

struct RoshHelper {
    shell: Arc<Shell>,
    hinter: HistoryHinter,
    /// Width of the current prompt, for placing the caret.
    prompt_width: usize,
}

impl RoshHelper {
    fn new(shell: Arc<Shell>) -> Self {
        Self {
            shell,
            hinter: HistoryHinter::new(),
            prompt_width: 0,
        }
    }

    fn check(&self, input: &str) -> ValidationResult {
        let validation = self.shell.validate(input);
        let (Some(pos), Some(message)) = (validation.position(), validation.message()) else {
            return ValidationResult::Valid(None);
        };
        let column = input.get(..pos).map_or(input.chars().count(), |s| s.chars().count());
        ValidationResult::Invalid(Some(caret_message(self.prompt_width + column, message)))
    }
}

impl Helper for RoshHelper {}

impl Completer for RoshHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let candidates = self.shell.complete(line, pos);
        let start = candidates
            .first()
            .map_or(pos, |c| pos.saturating_sub(c.replace));
        let pairs = candidates
            .into_iter()
            .map(|c| Pair {
                display: c.text.clone(),
                replacement: c.text,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for RoshHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for RoshHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[2m{hint}\x1b[0m"))
    }
}

impl Validator for RoshHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        Ok(self.check(ctx.input()))
    }
}

/// Printer for background output that does not garble the line being edited.
fn background_printer(rl: &mut Editor<RoshHelper, DefaultHistory>) -> LinePrinter {
    match rl.create_external_printer() {
        Ok(printer) => {
            let printer = Mutex::new(printer);
            Arc::new(move |line: &str| {
                let mut printer = printer.lock().unwrap_or_else(PoisonError::into_inner);
                if let Err(e) = printer.print(line.to_string()) {
                    log::debug!("external print failed: {e}");
                }
            })
        },
        Err(e) => {
            log::debug!("no external printer ({e}), printing directly");
            Arc::new(|line: &str| println!("{line}"))
        },
    }
}

/// Run the interactive loop until `exit` or end of input.
pub fn run(config: RoshConfig) -> Result<()> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("failed to install the Ctrl-C handler")?;

    let editor_config = Config::builder()
        .max_history_size(config.shell.history_size)?
        .auto_add_history(false)
        .completion_type(CompletionType::List)
        .build();
    let mut rl: Editor<RoshHelper, DefaultHistory> = Editor::with_config(editor_config)?;
    let history = config.shell.history_file.clone();
    if let Some(path) = &history
        && let Err(e) = rl.load_history(path)
    {
        log::debug!("no history loaded from {}: {e}", path.display());
    }

    let printer = background_printer(&mut rl);
    let shell = Arc::new(build_shell(config, printer, cancel)?);
    rl.set_helper(Some(RoshHelper::new(Arc::clone(&shell))));
    let host = hostname();

    let result = loop {
        let prompt = shell.prompt(&host);
        if let Some(helper) = rl.helper_mut() {
            helper.prompt_width = prompt.chars().count();
        }
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break Ok(()),
            Err(e) => break Err(e.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = rl.add_history_entry(line.as_str()) {
            log::debug!("history entry dropped: {e}");
        }

        match shell.dispatch(&line) {
            Ok(CommandOutput::Quit) => break Ok(()),
            Ok(output) => {
                if let Some(text) = render(&output) {
                    println!("{text}");
                }
            },
            Err(e) => eprintln!("ERR: {e}"),
        }
    };

    shell.shutdown();
    if let Some(path) = &history
        && let Err(e) = rl.save_history(path)
    {
        log::warn!("failed to save history to {}: {e}", path.display());
    }
    result
}
