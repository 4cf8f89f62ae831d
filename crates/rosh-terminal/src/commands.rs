//! Built-in command tree.

use std::sync::Arc;

use rosh_platform::QueryContext;
use rosh_types::error::Result;
use rosh_types::lookup::Lookups;
use rosh_types::value::Family;

use crate::link_commands::{EthtoolCmd, SetLinkStateCmd};
use crate::registry::CommandRegistry;
use crate::shell_commands::{ExitCmd, HelpCmd, MonitorCmd, NetnsCmd};
use crate::show_commands::{
    ShowAddressCmd, ShowIfstateConfigCmd, ShowInterfaceCmd, ShowNeighbourCmd, ShowNetnsCmd,
    ShowRouteCmd, ShowRuleCmd,
};
use crate::system_commands::register_system_commands;
use crate::tools::Toolbox;

/// What command constructors need at registration time.
pub struct Setup<'a> {
    pub query: &'a Arc<QueryContext>,
    pub tools: &'a Toolbox,
    pub lookups: &'a Lookups,
}

fn register_show_commands(reg: &mut CommandRegistry, setup: &Setup<'_>) -> Result<()> {
    let q = setup.query;
    reg.register(
        &["show", "interface"],
        Box::new(ShowInterfaceCmd::new(q, setup.tools.has("ethtool"))),
    )?;
    for (word, family) in [("ip", Family::V4), ("ipv6", Family::V6)] {
        reg.register(&["show", word, "address"], Box::new(ShowAddressCmd::new(q, family)))?;
        reg.register(&["show", word, "neighbour"], Box::new(ShowNeighbourCmd::new(q, family)))?;
        reg.register(&["show", word, "rule"], Box::new(ShowRuleCmd::new(q, family)))?;
        reg.register(
            &["show", word, "route"],
            Box::new(ShowRouteCmd::new(q, setup.lookups, family)),
        )?;
    }
    reg.register(
        &["show", "bridge", "fdb"],
        Box::new(ShowNeighbourCmd::new(q, Family::Bridge)),
    )?;
    reg.register(&["show", "netns"], Box::new(ShowNetnsCmd))?;
    if setup.tools.has("ifstatecli") {
        reg.register(&["show", "ifstate", "config"], Box::new(ShowIfstateConfigCmd))?;
    }
    Ok(())
}

fn register_link_commands(reg: &mut CommandRegistry, setup: &Setup<'_>) -> Result<()> {
    let q = setup.query;
    if setup.tools.has("ip") {
        reg.register(&["enable", "interface"], Box::new(SetLinkStateCmd::new(q, true)))?;
        reg.register(&["disable", "interface"], Box::new(SetLinkStateCmd::new(q, false)))?;
    } else {
        log::info!("ip not found, interface state commands disabled");
    }
    if setup.tools.has("ethtool") {
        reg.register(&["reset", "interface"], Box::new(EthtoolCmd::reset(q)))?;
        reg.register(&["renegotiate", "interface"], Box::new(EthtoolCmd::renegotiate(q)))?;
        reg.register(&["identify", "interface"], Box::new(EthtoolCmd::identify(q)))?;
    } else {
        log::info!("ethtool not found, interface reset commands disabled");
    }
    Ok(())
}

/// Register every built-in command whose tools are present.
pub fn register_builtins(reg: &mut CommandRegistry, setup: &Setup<'_>) -> Result<()> {
    register_show_commands(reg, setup)?;
    register_link_commands(reg, setup)?;

    reg.register(&["netns"], Box::new(NetnsCmd::new(setup.query)))?;
    if setup.tools.has("ip") {
        reg.register(&["monitor"], Box::new(MonitorCmd::new(setup.query)))?;
    }
    reg.register(&["help"], Box::new(HelpCmd))?;
    reg.register(&["exit"], Box::new(ExitCmd))?;

    register_system_commands(reg, setup)?;
    log::debug!("{} commands registered", reg.tree().len());
    Ok(())
}
