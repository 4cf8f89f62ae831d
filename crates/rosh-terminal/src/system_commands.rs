//! Pass-through commands running external diagnostic tools.

use std::sync::Arc;

use rosh_types::config::RoshConfig;
use rosh_types::error::Result;

use crate::commands::Setup;
use crate::completer::{Completer, DummyCompleter, WordCompleter};
use crate::interpreter::{Command, CommandOutput, Environment, Invocation};
use crate::registry::CommandRegistry;

/// Run `tool` in the foreground inside the active namespace.
///
/// A non-zero exit is not an error: the tool has already reported it on the
/// terminal.
pub(crate) fn run_tool(env: &Environment<'_>, tool: &str, args: &[String]) -> Result<CommandOutput> {
    let namespace = env.query.namespace();
    let (exe, full) = env.tools.invocation(namespace.as_deref(), tool, args)?;
    let code = env.launcher.spawn(&exe, &full, &[])?;
    if code != 0 {
        log::debug!("{tool} exited with status {code}");
    }
    Ok(CommandOutput::None)
}

fn no_leading_args(_config: &RoshConfig) -> Vec<String> {
    Vec::new()
}

fn ifstatecli_args(config: &RoshConfig) -> Vec<String> {
    config.command.ifstatecli.args()
}

/// Runs one tool with the typed arguments appended.
pub struct PassthroughCmd {
    tool: &'static str,
    description: &'static str,
    completer: Arc<dyn Completer>,
    leading: fn(&RoshConfig) -> Vec<String>,
}

impl PassthroughCmd {
    pub fn new(tool: &'static str, description: &'static str) -> Self {
        Self {
            tool,
            description,
            completer: Arc::new(DummyCompleter),
            leading: no_leading_args,
        }
    }

    /// Suggest these words for the first argument.
    pub fn with_words(mut self, words: &[&str]) -> Self {
        self.completer = Arc::new(WordCompleter::new(words));
        self
    }

    /// Arguments inserted before the typed ones, derived from the config.
    pub fn with_leading(mut self, leading: fn(&RoshConfig) -> Vec<String>) -> Self {
        self.leading = leading;
        self
    }
}

impl Command for PassthroughCmd {
    fn description(&self) -> &str {
        self.description
    }
    fn completer(&self) -> Arc<dyn Completer> {
        Arc::clone(&self.completer)
    }
    fn execute(&self, inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput> {
        let mut args = (self.leading)(env.config);
        args.extend(inv.args.iter().cloned());
        run_tool(env, self.tool, &args)
    }
}

const LBU_WORDS: &[&str] = &[
    "commit",
    "ci",
    "diff",
    "exclude",
    "include",
    "list",
    "ls",
    "list-backup",
    "lb",
    "package",
    "pkg",
    "revert",
    "status",
    "st",
];

const IFSTATECLI_WORDS: &[&str] = &["apply", "check", "shell", "show", "showall"];

/// Register the pass-through commands whose tool was found.
pub fn register_system_commands(reg: &mut CommandRegistry, setup: &Setup<'_>) -> Result<()> {
    let commands = [
        PassthroughCmd::new("ping", "send ICMP echo requests"),
        PassthroughCmd::new("traceroute", "trace the route to a host"),
        PassthroughCmd::new("mtr", "trace and ping a host continuously"),
        PassthroughCmd::new("ssh", "open an ssh session"),
        PassthroughCmd::new("telnet", "open a telnet session"),
        PassthroughCmd::new("tcpdump", "capture packets"),
        PassthroughCmd::new("shell", "start a system shell"),
        PassthroughCmd::new("lbu", "run lbu command").with_words(LBU_WORDS),
        PassthroughCmd::new("ifstatecli", "run ifstatecli command")
            .with_words(IFSTATECLI_WORDS)
            .with_leading(ifstatecli_args),
    ];
    for cmd in commands {
        if !setup.tools.has(cmd.tool) {
            log::info!("{} not found, command disabled", cmd.tool);
            continue;
        }
        reg.register(&[cmd.tool], Box::new(cmd))?;
    }
    Ok(())
}
