//! Commands acting on the shell itself: namespace, monitor, help, exit.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rosh_platform::{QueryContext, StreamHandle};
use rosh_types::error::{Result, RoshError};

use crate::completer::{Completer, PeerCompleter, WordCompleter};
use crate::filter::FilterRegistry;
use crate::interpreter::{
    Command, CommandOutput, Environment, Invocation, ParsedArgs, validate_simple,
};
use crate::registry::CommandRegistry;
use crate::value_completers::{LinkCompleter, NetnsCompleter};

/// Every command and filter with its description.
pub fn command_listing(registry: &CommandRegistry, filters: &FilterRegistry) -> CommandOutput {
    let mut rows: Vec<Vec<String>> = registry
        .tree()
        .into_iter()
        .map(|(path, cmd)| vec![path, cmd.description().to_string()])
        .collect();
    rows.extend(
        filters
            .list()
            .into_iter()
            .map(|(name, desc)| vec![format!("| {name}"), desc.to_string()]),
    );
    CommandOutput::Table {
        headers: vec!["command".into(), "description".into()],
        rows,
    }
}

// ---------------------------------------------------------------------------
// netns
// ---------------------------------------------------------------------------

/// Switch the active namespace; no argument returns to the default one.
pub struct NetnsCmd {
    completer: Arc<dyn Completer>,
}

impl NetnsCmd {
    pub fn new(query: &Arc<QueryContext>) -> Self {
        Self {
            completer: Arc::new(NetnsCompleter::new(Arc::clone(query))),
        }
    }
}

impl Command for NetnsCmd {
    fn description(&self) -> &str {
        "switch network namespace"
    }
    fn completer(&self) -> Arc<dyn Completer> {
        Arc::clone(&self.completer)
    }
    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
    fn execute(&self, inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput> {
        let target = inv.args.first().map(String::as_str);
        let next = env.query.current().for_namespace(target)?;
        env.query.replace(next);
        Ok(CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// monitor
// ---------------------------------------------------------------------------

pub const MONITOR_OBJECTS: &[&str] = &[
    "all",
    "none",
    "address",
    "interface",
    "neigh",
    "netconf",
    "prefix",
    "route",
    "rule",
];

/// Background `ip monitor`, printed through the line's filters.
///
/// At most one monitor runs; starting another or `monitor none` stops it.
pub struct MonitorCmd {
    completer: Arc<dyn Completer>,
    links: LinkCompleter,
    running: Mutex<Option<StreamHandle>>,
}

impl MonitorCmd {
    pub fn new(query: &Arc<QueryContext>) -> Self {
        Self {
            completer: Arc::new(PeerCompleter::new(
                Arc::new(WordCompleter::strict("monitor object", MONITOR_OBJECTS)),
                Arc::new(LinkCompleter::all(Arc::clone(query))),
            )),
            links: LinkCompleter::all(Arc::clone(query)),
            running: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<StreamHandle>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop the running monitor, if any.
    pub fn stop(&self) {
        if let Some(mut handle) = self.slot().take() {
            log::debug!("stopping monitor");
            handle.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot().as_ref().is_some_and(StreamHandle::is_running)
    }
}

impl Command for MonitorCmd {
    fn description(&self) -> &str {
        "monitor for network changes"
    }
    fn completer(&self) -> Arc<dyn Completer> {
        Arc::clone(&self.completer)
    }
    fn min_args(&self) -> usize {
        1
    }
    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
    fn validate(&self, args: &[String]) -> Result<ParsedArgs> {
        let parsed = validate_simple(args, self.min_args(), self.max_args(), self.completer.as_ref())?;
        if let Some(dev) = args.get(1) {
            self.links
                .parse(dev)
                .map_err(|message| RoshError::Argument { column: 1, message })?;
        }
        Ok(parsed)
    }
    fn execute(&self, inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput> {
        self.stop();
        let Some(object) = inv.args.first() else {
            return Err(RoshError::Argument {
                column: 0,
                message: "missing argument".into(),
            });
        };
        if object == "none" {
            return Ok(CommandOutput::None);
        }

        // iproute2 calls interfaces links.
        let object = if object == "interface" { "link" } else { object };
        let mut args: Vec<String> = vec!["-ts".into(), "monitor".into(), object.into(), "label".into()];
        if let Some(dev) = inv.args.get(1) {
            args.push("dev".into());
            args.push(dev.clone());
        }
        let namespace = env.query.namespace();
        let (exe, full) = env.tools.invocation(namespace.as_deref(), "ip", &args)?;

        let chain = env.filters.clone();
        let printer = Arc::clone(env.printer);
        let handle = env.launcher.stream(
            &exe,
            &full,
            Box::new(move |line: &str| {
                if chain.apply_line(line) {
                    printer(line);
                }
            }),
        )?;
        *self.slot() = Some(handle);
        Ok(CommandOutput::None)
    }
    fn shutdown(&self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// help / exit
// ---------------------------------------------------------------------------

pub struct HelpCmd;
impl Command for HelpCmd {
    fn description(&self) -> &str {
        "show command help"
    }
    fn max_args(&self) -> Option<usize> {
        Some(0)
    }
    fn execute(&self, _inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput> {
        Ok(command_listing(env.registry, env.filter_registry))
    }
}

pub struct ExitCmd;
impl Command for ExitCmd {
    fn description(&self) -> &str {
        "leave the shell"
    }
    fn validate(&self, args: &[String]) -> Result<ParsedArgs> {
        if !args.is_empty() {
            return Err(RoshError::Argument {
                column: 0,
                message: "no parameters allowed".into(),
            });
        }
        Ok(ParsedArgs::default())
    }
    fn execute(&self, _inv: &Invocation, _env: &mut Environment<'_>) -> Result<CommandOutput> {
        Ok(CommandOutput::Quit)
    }
}
