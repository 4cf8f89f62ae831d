//! Name/id tables: iproute2 `rt_*` files and fixed kernel flag names.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Directories searched for iproute2 tables, in priority order.
const IPROUTE2_DIRS: &[&str] = &["/etc/iproute2", "/usr/share/iproute2", "/usr/lib/iproute2"];

/// A bidirectional name/id table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lookup {
    str2id: BTreeMap<String, u32>,
    id2str: BTreeMap<u32, String>,
}

impl Lookup {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        let mut lookup = Self::default();
        for (name, id) in entries {
            lookup.insert(name, id);
        }
        lookup
    }

    pub fn insert(&mut self, name: &str, id: u32) {
        self.str2id.insert(name.to_string(), id);
        self.id2str.insert(id, name.to_string());
    }

    /// Load an iproute2 table such as `rt_tables`, seeded with `defaults`.
    ///
    /// The first directory holding `<name>` wins; `<name>.d/*.conf` snippets
    /// next to it are merged on top. Unreadable files are skipped.
    pub fn load_iproute2(name: &str, defaults: &[(&str, u32)]) -> Self {
        let dirs: Vec<PathBuf> = IPROUTE2_DIRS.iter().map(PathBuf::from).collect();
        Self::load_from_dirs(name, defaults, &dirs)
    }

    pub fn load_from_dirs(name: &str, defaults: &[(&str, u32)], dirs: &[PathBuf]) -> Self {
        let mut lookup = Self::from_entries(defaults.iter().copied());
        let Some(dir) = dirs.iter().find(|d| d.join(name).is_file()) else {
            log::debug!("no iproute2 table '{name}' found, using defaults");
            return lookup;
        };

        lookup.parse_file(&dir.join(name));

        let snippets = dir.join(format!("{name}.d"));
        if let Ok(entries) = std::fs::read_dir(&snippets) {
            let mut paths: Vec<PathBuf> = entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "conf"))
                .collect();
            paths.sort();
            for path in paths {
                lookup.parse_file(&path);
            }
        }
        lookup
    }

    fn parse_file(&mut self, path: &Path) {
        match std::fs::File::open(path) {
            Ok(file) => {
                for line in std::io::BufReader::new(file).lines().map_while(|l| l.ok()) {
                    self.parse_line(&line);
                }
            },
            Err(e) => log::warn!("cannot read {}: {e}", path.display()),
        }
    }

    /// Accept lines of the form `<decimal> <name>`; everything else is ignored.
    fn parse_line(&mut self, line: &str) {
        let mut parts = line.split_whitespace();
        let (Some(id), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
            return;
        };
        if !id.bytes().all(|b| b.is_ascii_digit()) {
            return;
        }
        if let Ok(id) = id.parse::<u32>() {
            self.insert(name, id);
        }
    }

    /// Resolve a decimal id or a known name.
    pub fn lookup_id(&self, key: &str) -> Option<u32> {
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            return key.parse().ok();
        }
        self.str2id.get(key).copied()
    }

    /// Name for an id, or the id itself.
    pub fn lookup_str(&self, id: u32) -> String {
        self.id2str
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Known names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.str2id.keys().cloned().collect()
    }
}

/// Route tables known to every kernel.
pub const DEFAULT_TABLES: &[(&str, u32)] = &[
    ("unspec", 0),
    ("default", 253),
    ("main", 254),
    ("local", 255),
];

pub const DEFAULT_PROTOS: &[(&str, u32)] = &[
    ("unspec", 0),
    ("redirect", 1),
    ("kernel", 2),
    ("boot", 3),
    ("static", 4),
    ("ra", 9),
    ("dhcp", 16),
    ("bird", 12),
    ("zebra", 11),
];

pub const DEFAULT_SCOPES: &[(&str, u32)] = &[
    ("global", 0),
    ("site", 200),
    ("link", 253),
    ("host", 254),
    ("nowhere", 255),
];

pub const DEFAULT_REALMS: &[(&str, u32)] = &[("unknown", 0)];

/// `NUD_*` neighbour states.
pub const NEIGH_STATES: &[(&str, u32)] = &[
    ("none", 0x00),
    ("incomplete", 0x01),
    ("reachable", 0x02),
    ("stale", 0x04),
    ("delay", 0x08),
    ("probe", 0x10),
    ("failed", 0x20),
    ("noarp", 0x40),
    ("permanent", 0x80),
];

/// `NTF_*` neighbour flags.
pub const NEIGH_FLAGS: &[(&str, u32)] = &[
    ("use", 0x01),
    ("self", 0x02),
    ("master", 0x04),
    ("proxy", 0x08),
    ("extern_learn", 0x10),
    ("offloaded", 0x20),
    ("sticky", 0x40),
    ("router", 0x80),
];

/// `IFA_F_*` address flags.
pub const IFA_FLAGS: &[(&str, u32)] = &[
    ("secondary", 0x01),
    ("nodad", 0x02),
    ("optimistic", 0x04),
    ("dadfailed", 0x08),
    ("homeaddress", 0x10),
    ("deprecated", 0x20),
    ("tentative", 0x40),
    ("permanent", 0x80),
    ("managetempaddr", 0x100),
    ("noprefixroute", 0x200),
    ("mcautojoin", 0x400),
    ("stable-privacy", 0x800),
];

/// All lookup tables the shell uses, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    pub tables: Lookup,
    pub protos: Lookup,
    pub scopes: Lookup,
    pub realms: Lookup,
    pub neigh_states: Lookup,
    pub neigh_flags: Lookup,
    pub ifa_flags: Lookup,
}

impl Lookups {
    /// Load iproute2 tables from the system.
    pub fn load() -> Self {
        Self {
            tables: Lookup::load_iproute2("rt_tables", DEFAULT_TABLES),
            protos: Lookup::load_iproute2("rt_protos", DEFAULT_PROTOS),
            scopes: Lookup::load_iproute2("rt_scopes", DEFAULT_SCOPES),
            realms: Lookup::load_iproute2("rt_realms", DEFAULT_REALMS),
            ..Self::builtin()
        }
    }

    /// Built-in tables only; no filesystem access.
    pub fn builtin() -> Self {
        Self {
            tables: Lookup::from_entries(DEFAULT_TABLES.iter().copied()),
            protos: Lookup::from_entries(DEFAULT_PROTOS.iter().copied()),
            scopes: Lookup::from_entries(DEFAULT_SCOPES.iter().copied()),
            realms: Lookup::from_entries(DEFAULT_REALMS.iter().copied()),
            neigh_states: Lookup::from_entries(NEIGH_STATES.iter().copied()),
            neigh_flags: Lookup::from_entries(NEIGH_FLAGS.iter().copied()),
            ifa_flags: Lookup::from_entries(IFA_FLAGS.iter().copied()),
        }
    }
}
