//! External executables available to the shell.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rosh_platform::which;
use rosh_types::config::RoshConfig;
use rosh_types::error::{Result, RoshError};

/// Tools looked up at startup. Commands that wrap a tool are only
/// registered when it was found.
pub const KNOWN_TOOLS: &[&str] = &[
    "ip",
    "bridge",
    "ethtool",
    "ping",
    "traceroute",
    "mtr",
    "ssh",
    "telnet",
    "tcpdump",
    "lbu",
    "ifstatecli",
];

/// Resolved executable paths by tool name.
#[derive(Debug, Clone, Default)]
pub struct Toolbox {
    paths: BTreeMap<String, PathBuf>,
}

impl Toolbox {
    /// Apply config overrides, then search `PATH` for the rest.
    pub fn discover(config: &RoshConfig) -> Self {
        let overrides = [
            ("ip", config.tools.ip.as_ref()),
            ("bridge", config.tools.bridge.as_ref()),
            ("ethtool", config.tools.ethtool.as_ref()),
        ];
        let mut paths = BTreeMap::new();
        for name in KNOWN_TOOLS {
            let configured = overrides
                .iter()
                .find(|(n, _)| n == name)
                .and_then(|(_, p)| p.cloned());
            match configured.or_else(|| which(name)) {
                Some(path) => {
                    log::debug!("tool {name} at {}", path.display());
                    paths.insert((*name).to_string(), path);
                },
                None => log::debug!("tool {name} not found"),
            }
        }
        if let Ok(shell) = std::env::var("SHELL")
            && !shell.is_empty()
        {
            paths.insert("shell".to_string(), PathBuf::from(shell));
        }
        Self { paths }
    }

    pub fn from_paths<'a>(paths: impl IntoIterator<Item = (&'a str, PathBuf)>) -> Self {
        Self {
            paths: paths
                .into_iter()
                .map(|(name, path)| (name.to_string(), path))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.paths.get(name).map(PathBuf::as_path)
    }

    pub fn has(&self, name: &str) -> bool {
        self.paths.contains_key(name)
    }

    /// Like [`Self::get`] but an error when missing.
    pub fn require(&self, name: &str) -> Result<&Path> {
        self.get(name)
            .ok_or_else(|| RoshError::Command(format!("{name} is not available")))
    }

    /// Executable and arguments running `tool` inside `namespace`.
    ///
    /// `ip` takes `-n`; anything else goes through `ip netns exec`.
    pub fn invocation(
        &self,
        namespace: Option<&str>,
        tool: &str,
        args: &[String],
    ) -> Result<(PathBuf, Vec<String>)> {
        let exe = self.require(tool)?.to_path_buf();
        let Some(ns) = namespace else {
            return Ok((exe, args.to_vec()));
        };
        let mut full = Vec::with_capacity(args.len() + 4);
        if tool == "ip" {
            full.extend(["-n".to_string(), ns.to_string()]);
            full.extend_from_slice(args);
            return Ok((exe, full));
        }
        let ip = self.require("ip")?.to_path_buf();
        full.extend(["netns".to_string(), "exec".to_string(), ns.to_string()]);
        full.push(exe.to_string_lossy().into_owned());
        full.extend_from_slice(args);
        Ok((ip, full))
    }
}
