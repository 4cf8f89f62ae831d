//! Resolution and dispatch of complete input lines.

use std::sync::Arc;

use rosh_platform::{NetworkQuery, ProcessLauncher, QueryContext};
use rosh_types::config::RoshConfig;
use rosh_types::error::{Result, RoshError};
use rosh_types::lookup::Lookups;

use crate::commands::{Setup, register_builtins};
use crate::completer::{Candidate, before_cursor};
use crate::filter::FilterRegistry;
use crate::interpreter::{
    CommandOutput, Environment, Invocation, LinePrinter, scan, split_pipes, tokenize,
};
use crate::registry::CommandRegistry;
use crate::shell_commands::command_listing;
use crate::tools::Toolbox;
use crate::validator::{Validation, validate_line};

/// Everything a [`Shell`] is built from.
pub struct ShellParts {
    pub config: RoshConfig,
    pub query: Arc<dyn NetworkQuery>,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub tools: Toolbox,
    pub lookups: Lookups,
    /// Receives output produced in the background.
    pub printer: LinePrinter,
}

/// The command and filter registries plus the services commands run against.
///
/// Both registries are immutable once built. The only mutable state is the
/// query context, which is replaced as a whole on namespace switches.
pub struct Shell {
    registry: CommandRegistry,
    filters: FilterRegistry,
    query: Arc<QueryContext>,
    launcher: Arc<dyn ProcessLauncher>,
    config: RoshConfig,
    lookups: Lookups,
    tools: Toolbox,
    printer: LinePrinter,
}

impl Shell {
    /// Build the registries with all built-in commands.
    ///
    /// Fails when the command tree cannot be constructed.
    pub fn build(parts: ShellParts) -> Result<Self> {
        let query = Arc::new(QueryContext::new(Arc::clone(&parts.query)));
        let mut registry = CommandRegistry::new();
        register_builtins(
            &mut registry,
            &Setup {
                query: &query,
                tools: &parts.tools,
                lookups: &parts.lookups,
            },
        )?;
        Ok(Self::with_registry(registry, query, parts))
    }

    /// A shell around an already populated registry.
    pub fn with_registry(
        registry: CommandRegistry,
        query: Arc<QueryContext>,
        parts: ShellParts,
    ) -> Self {
        Self {
            registry,
            filters: FilterRegistry::builtin(),
            query,
            launcher: parts.launcher,
            config: parts.config,
            lookups: parts.lookups,
            tools: parts.tools,
            printer: parts.printer,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn query(&self) -> &Arc<QueryContext> {
        &self.query
    }

    /// Every command and filter with its description.
    pub fn listing(&self) -> CommandOutput {
        command_listing(&self.registry, &self.filters)
    }

    /// Resolve, validate and execute one line.
    ///
    /// Filters are applied to the command's output before it is returned.
    pub fn dispatch(&self, line: &str) -> Result<CommandOutput> {
        let tokens = tokenize(line)?;
        if tokens.is_empty() {
            return Ok(CommandOutput::None);
        }
        let (words, segments) = split_pipes(&tokens);
        if words.is_empty() {
            return Err(RoshError::Syntax("missing command before '|'".into()));
        }

        let res = self.registry.resolve(&words);
        let Some(cmd) = res.command() else {
            if res.is_incomplete(words.len()) {
                return Err(RoshError::IncompleteCommand);
            }
            let token = words.get(res.depth.saturating_sub(1)).cloned();
            return Err(RoshError::UnknownCommand(token.unwrap_or_default()));
        };
        log::debug!("dispatch '{}' args {:?}", res.path.join(" "), res.remaining);

        let parsed = cmd.validate(&res.remaining)?;
        let chain = self.filters.build_chain(&segments)?;
        let inv = Invocation {
            path: res.path.clone(),
            args: res.remaining.clone(),
            parsed,
        };
        let mut env = Environment {
            query: &self.query,
            launcher: self.launcher.as_ref(),
            config: &self.config,
            lookups: &self.lookups,
            tools: &self.tools,
            filters: &chain,
            printer: &self.printer,
            registry: &self.registry,
            filter_registry: &self.filters,
        };
        let output = cmd.execute(&inv, &mut env)?;
        Ok(chain.apply(output))
    }

    /// Completion candidates for the text before `cursor`.
    ///
    /// After the last standalone `|` the filter registry completes instead of
    /// the command tree.
    pub fn complete(&self, line: &str, cursor: usize) -> Vec<Candidate> {
        let prefix = before_cursor(line, cursor);
        let scanned = scan(prefix);
        match scanned.tokens.iter().rev().find(|t| t.is_pipe()) {
            Some(pipe) => {
                let segment = &prefix[pipe.start + 1..];
                self.filters.candidates(segment, segment.len())
            },
            None => self.registry.candidates(prefix, prefix.len()),
        }
    }

    /// Editor-time check of the line being typed.
    pub fn validate(&self, text: &str) -> Validation {
        validate_line(&self.registry, &self.filters, text)
    }

    /// Prompt text: host name, active namespace, configured suffix.
    pub fn prompt(&self, hostname: &str) -> String {
        let suffix = &self.config.shell.prompt_suffix;
        match self.query.namespace() {
            Some(ns) => format!("{hostname}#{ns}{suffix}"),
            None => format!("{hostname}{suffix}"),
        }
    }

    /// Stop background work of all commands.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}
