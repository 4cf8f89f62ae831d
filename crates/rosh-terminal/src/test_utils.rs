//! Shared test fixtures: a recording launcher and a small sample network.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rosh_platform::{
    Address, LineSink, Link, MemoryQuery, NamespaceState, Neighbour, ProcessLauncher, Route, Rule,
    StreamHandle,
};
use rosh_types::config::RoshConfig;
use rosh_types::error::Result;
use rosh_types::lookup::Lookups;
use rosh_types::value::{Family, Prefix};

use crate::interpreter::LinePrinter;
use crate::shell::{Shell, ShellParts};
use crate::tools::Toolbox;

/// One recorded launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub streamed: bool,
}

/// Records launches instead of running anything.
///
/// Streamed launches replay `stream_lines` into the sink synchronously.
#[derive(Default)]
pub struct RecordingLauncher {
    pub launches: Mutex<Vec<Launch>>,
    pub exit_code: i32,
    pub stream_lines: Vec<String>,
}

impl RecordingLauncher {
    pub fn launches(&self) -> Vec<Launch> {
        self.launches.lock().unwrap().clone()
    }

    fn record(&self, executable: &Path, args: &[String], streamed: bool) {
        self.launches.lock().unwrap().push(Launch {
            executable: executable.to_path_buf(),
            args: args.to_vec(),
            streamed,
        });
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn spawn(&self, executable: &Path, args: &[String], _env: &[(String, String)]) -> Result<i32> {
        self.record(executable, args, false);
        Ok(self.exit_code)
    }

    fn stream(
        &self,
        executable: &Path,
        args: &[String],
        mut on_line: LineSink,
    ) -> Result<StreamHandle> {
        self.record(executable, args, true);
        for line in &self.stream_lines {
            on_line(line);
        }
        Ok(StreamHandle::new(None, None))
    }
}

pub fn link(index: u32, name: &str, kind: Option<&str>, bus: Option<&str>) -> Link {
    Link {
        index,
        name: name.into(),
        kind: kind.or(bus).map(str::to_string),
        admin_up: true,
        oper_state: "up".into(),
        carrier: true,
        mtu: Some(1500),
        address: Some(format!("02:00:00:00:00:{index:02x}")),
        master: None,
        parent_bus: bus.map(str::to_string),
    }
}

fn addr(index: u32, ifname: &str, local: &str, prefix_len: u8) -> Address {
    Address {
        index,
        ifname: ifname.into(),
        local: local.parse::<IpAddr>().unwrap(),
        prefix_len,
        scope: "global".into(),
        flags: vec!["permanent".into()],
    }
}

fn route(dst: &str, dev: &str, proto: &str, scope: &str, flags: &[&str]) -> Route {
    Route {
        dst: dst.parse::<Prefix>().unwrap(),
        gateway: None,
        dev: Some(dev.into()),
        metric: None,
        pref: None,
        protocol: proto.into(),
        scope: scope.into(),
        table: None,
        flags: flags.iter().map(|f| f.to_string()).collect(),
    }
}

/// Host with `lo`, `eth0` (pci), `br0`; namespace `blue` with `veth-b`.
pub fn sample_state() -> MemoryQuery {
    let mut lo = link(1, "lo", None, None);
    lo.oper_state = "unknown".into();
    let host = NamespaceState {
        links: vec![
            lo,
            link(2, "eth0", None, Some("pci")),
            link(3, "br0", Some("bridge"), None),
        ],
        addresses: vec![
            addr(2, "eth0", "192.0.2.1", 24),
            addr(2, "eth0", "2001:db8::1", 64),
            addr(3, "br0", "198.51.100.1", 24),
        ],
        routes: vec![
            route("10.0.0.0/8", "eth0", "kernel", "link", &[]),
            route("10.2.0.0/16", "eth0", "kernel", "link", &["linkdown"]),
            route("172.16.0.0/12", "br0", "static", "universe", &[]),
            Route {
                gateway: "192.0.2.254".parse().ok(),
                ..route("0.0.0.0/0", "eth0", "static", "universe", &[])
            },
            route("2001:db8::/64", "eth0", "kernel", "universe", &[]),
        ],
        neighbours: vec![Neighbour {
            dst: Some("192.0.2.254".into()),
            dev: "eth0".into(),
            lladdr: Some("02:00:00:00:00:fe".into()),
            state: vec!["reachable".into()],
            flags: Vec::new(),
        }],
        fdb: vec![Neighbour {
            dst: None,
            dev: "br0".into(),
            lladdr: Some("02:00:00:00:00:aa".into()),
            state: vec!["permanent".into()],
            flags: vec!["self".into()],
        }],
        rules: vec![
            (
                Family::V4,
                Rule {
                    priority: 0,
                    src: "all".into(),
                    dst: "all".into(),
                    action: "lookup".into(),
                    target: Some("local".into()),
                    ..Rule::default()
                },
            ),
            (
                Family::V4,
                Rule {
                    priority: 100,
                    src: "10.0.0.0/8".into(),
                    dst: "all".into(),
                    iif: Some("eth0".into()),
                    action: "lookup".into(),
                    target: Some("100".into()),
                    ..Rule::default()
                },
            ),
        ],
    };
    let mut named = BTreeMap::new();
    named.insert(
        "blue".to_string(),
        NamespaceState {
            links: vec![link(7, "veth-b", Some("veth"), None)],
            ..NamespaceState::default()
        },
    );
    MemoryQuery::with_namespaces(host, named)
}

pub fn sample_tools() -> Toolbox {
    Toolbox::from_paths(
        [
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
        ]
        .into_iter()
        .map(|n| (n, PathBuf::from(format!("/usr/bin/{n}"))))
        .chain(std::iter::once(("shell", PathBuf::from("/bin/sh")))),
    )
}

/// A shell over [`sample_state`] with every tool available.
pub struct TestShell {
    pub shell: Shell,
    pub launcher: Arc<RecordingLauncher>,
    pub printed: Arc<Mutex<Vec<String>>>,
}

pub fn test_shell() -> TestShell {
    test_shell_with(RecordingLauncher::default(), RoshConfig::default())
}

pub fn test_shell_with(launcher: RecordingLauncher, config: RoshConfig) -> TestShell {
    let launcher = Arc::new(launcher);
    let printed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&printed);
    let printer: LinePrinter = Arc::new(move |line: &str| {
        sink.lock().unwrap().push(line.to_string());
    });
    let shell = Shell::build(ShellParts {
        config,
        query: Arc::new(sample_state()),
        launcher: Arc::clone(&launcher) as Arc<dyn ProcessLauncher>,
        tools: sample_tools(),
        lookups: Lookups::builtin(),
        printer,
    })
    .unwrap();
    TestShell {
        shell,
        launcher,
        printed,
    }
}
