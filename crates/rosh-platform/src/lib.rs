//! Platform services for rosh.
//!
//! The shell core only sees the traits in [`services`]. Production code wires
//! in [`IprouteQuery`] and [`SystemLauncher`]; tests use [`MemoryQuery`].

pub mod context;
pub mod iproute;
pub mod memory;
pub mod process;
pub mod services;

/// The active network query, swapped whole on namespace switches.
pub use context::QueryContext;
/// Network state read through iproute2's JSON output.
pub use iproute::IprouteQuery;
/// In-memory network state for tests.
pub use memory::{MemoryQuery, NamespaceState};
/// Foreground and background process launching.
pub use process::{CancelToken, StreamHandle, SystemLauncher, which};
/// Service traits and the records they return.
pub use services::{
    Address, AddressFilter, LineSink, Link, NetworkQuery, Neighbour, NeighbourFilter,
    ProcessLauncher, Route, RouteFilter, Rule, RuleFilter,
};
