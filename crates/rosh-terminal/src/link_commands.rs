//! Commands changing interface state.

use std::sync::Arc;

use rosh_platform::QueryContext;
use rosh_types::error::Result;

use crate::completer::{Completer, DummyCompleter, PeerCompleter, WordCompleter};
use crate::interpreter::{Command, CommandOutput, Environment, Invocation};
use crate::system_commands::run_tool;
use crate::value_completers::LinkCompleter;

// ---------------------------------------------------------------------------
// enable / disable interface
// ---------------------------------------------------------------------------

/// `ip link set dev IFNAME up|down`.
pub struct SetLinkStateCmd {
    up: bool,
    completer: Arc<dyn Completer>,
}

impl SetLinkStateCmd {
    pub fn new(query: &Arc<QueryContext>, up: bool) -> Self {
        Self {
            up,
            completer: Arc::new(LinkCompleter::all(Arc::clone(query))),
        }
    }
}

impl Command for SetLinkStateCmd {
    fn description(&self) -> &str {
        if self.up {
            "enable (no shutdown) an interface"
        } else {
            "disable (shutdown) an interface"
        }
    }
    fn completer(&self) -> Arc<dyn Completer> {
        Arc::clone(&self.completer)
    }
    fn min_args(&self) -> usize {
        1
    }
    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
    fn execute(&self, inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput> {
        let state = if self.up { "up" } else { "down" };
        let mut args: Vec<String> = ["link", "set", "dev"].map(String::from).to_vec();
        args.extend(inv.args.iter().cloned());
        args.push(state.to_string());
        run_tool(env, "ip", &args)
    }
}

// ---------------------------------------------------------------------------
// reset / renegotiate / identify interface
// ---------------------------------------------------------------------------

/// Components accepted by `ethtool --reset`.
pub const RESET_COMPONENTS: &[&str] = &[
    "flags",
    "mgmt",
    "irq",
    "dma",
    "filter",
    "offload",
    "mac",
    "phy",
    "ram",
    "dedicated",
    "all",
];

/// `ethtool <flag> PHY [ARGS...]` on a physical interface.
pub struct EthtoolCmd {
    description: &'static str,
    flag: &'static str,
    completer: Arc<dyn Completer>,
    min_args: usize,
    max_args: Option<usize>,
}

impl EthtoolCmd {
    pub fn reset(query: &Arc<QueryContext>) -> Self {
        let components = PeerCompleter::new(
            Arc::new(WordCompleter::new(RESET_COMPONENTS)),
            Arc::new(DummyCompleter),
        );
        Self {
            description: "reset an interface",
            flag: "--reset",
            completer: Arc::new(PeerCompleter::new(
                Arc::new(LinkCompleter::physical(Arc::clone(query))),
                Arc::new(components),
            )),
            min_args: 2,
            max_args: None,
        }
    }

    pub fn renegotiate(query: &Arc<QueryContext>) -> Self {
        Self {
            description: "restart auto-negotiation on an interface",
            flag: "--negotiate",
            completer: Arc::new(LinkCompleter::physical(Arc::clone(query))),
            min_args: 1,
            max_args: Some(1),
        }
    }

    /// Optional second argument: blink duration in seconds.
    pub fn identify(query: &Arc<QueryContext>) -> Self {
        Self {
            description: "initiate the adapter identify by sight procedure",
            flag: "--identify",
            completer: Arc::new(PeerCompleter::new(
                Arc::new(LinkCompleter::physical(Arc::clone(query))),
                Arc::new(DummyCompleter),
            )),
            min_args: 1,
            max_args: Some(2),
        }
    }
}

impl Command for EthtoolCmd {
    fn description(&self) -> &str {
        self.description
    }
    fn completer(&self) -> Arc<dyn Completer> {
        Arc::clone(&self.completer)
    }
    fn min_args(&self) -> usize {
        self.min_args
    }
    fn max_args(&self) -> Option<usize> {
        self.max_args
    }
    fn execute(&self, inv: &Invocation, env: &mut Environment<'_>) -> Result<CommandOutput> {
        let mut args = vec![self.flag.to_string()];
        args.extend(inv.args.iter().cloned());
        run_tool(env, "ethtool", &args)
    }
}
