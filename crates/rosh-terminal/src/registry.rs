//! The command tree and abbreviation-aware resolution.

use std::collections::BTreeMap;

use rosh_types::error::{Result, RoshError};

use crate::completer::{Candidate, before_cursor, complete_words};
use crate::interpreter::Command;

/// Key under which an interior node stores its own command.
pub const SELF_KEY: &str = "";

/// Element of the command tree.
pub enum CommandNode {
    Interior(BTreeMap<String, CommandNode>),
    Leaf(Box<dyn Command>),
}

impl CommandNode {
    pub fn command(&self) -> Option<&dyn Command> {
        match self {
            Self::Leaf(cmd) => Some(cmd.as_ref()),
            Self::Interior(_) => None,
        }
    }
}

/// Match `token` against `children`: exact key first, then a unique prefix.
///
/// The self key never matches, and ambiguity is no match.
pub fn abbreviate<'a, T>(children: &'a BTreeMap<String, T>, token: &str) -> Option<(&'a str, &'a T)> {
    if token.is_empty() {
        return None;
    }
    if let Some((key, child)) = children.get_key_value(token) {
        return Some((key.as_str(), child));
    }
    let mut matches = children
        .iter()
        .filter(|(key, _)| !key.is_empty() && key.starts_with(token));
    match (matches.next(), matches.next()) {
        (Some((key, child)), None) => Some((key.as_str(), child)),
        _ => None,
    }
}

/// Outcome of walking the tree with a token list.
///
/// On success `depth` is the number of tokens consumed. On failure it is the
/// 1-based index of the token that did not match, or `tokens.len() + 1` when
/// the line stopped at an interior node.
pub struct Resolution<'a> {
    pub depth: usize,
    pub node: Option<&'a CommandNode>,
    /// Full keys matched so far.
    pub path: Vec<String>,
    pub remaining: Vec<String>,
}

impl<'a> Resolution<'a> {
    fn failed(depth: usize, path: Vec<String>) -> Self {
        Self {
            depth,
            node: None,
            path,
            remaining: Vec::new(),
        }
    }

    /// The resolved command, if a leaf was reached.
    pub fn command(&self) -> Option<&'a dyn Command> {
        self.node.and_then(CommandNode::command)
    }

    /// Last key matched.
    pub fn matched_token(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    /// More tokens were needed than typed.
    pub fn is_incomplete(&self, token_count: usize) -> bool {
        self.node.is_none() && self.depth > token_count
    }
}

/// Tree of all commands, built once at startup.
pub struct CommandRegistry {
    root: BTreeMap<String, CommandNode>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            root: BTreeMap::new(),
        }
    }

    /// Register `cmd` under a multi-word `path`.
    ///
    /// A path that is already an interior node gets the command as its self
    /// entry; a leaf in the way of a longer path moves to the self entry of a
    /// new interior node.
    pub fn register(&mut self, path: &[&str], cmd: Box<dyn Command>) -> Result<()> {
        let Some((last, parents)) = path.split_last() else {
            return Err(RoshError::Registry("empty command path".into()));
        };
        if path.iter().any(|p| p.is_empty() || p.contains(char::is_whitespace)) {
            return Err(RoshError::Registry(format!("invalid command path: {path:?}")));
        }

        let mut level = &mut self.root;
        for part in parents {
            let node = level
                .entry((*part).to_string())
                .or_insert_with(|| CommandNode::Interior(BTreeMap::new()));
            if matches!(node, CommandNode::Leaf(_)) {
                let leaf = std::mem::replace(node, CommandNode::Interior(BTreeMap::new()));
                if let CommandNode::Interior(children) = node {
                    children.insert(SELF_KEY.to_string(), leaf);
                }
            }
            let CommandNode::Interior(children) = node else {
                return Err(RoshError::Registry(format!("cannot nest under '{part}'")));
            };
            level = children;
        }

        match level.get_mut(*last) {
            None => {
                level.insert((*last).to_string(), CommandNode::Leaf(cmd));
            },
            Some(CommandNode::Interior(children)) if !children.contains_key(SELF_KEY) => {
                children.insert(SELF_KEY.to_string(), CommandNode::Leaf(cmd));
            },
            Some(_) => {
                return Err(RoshError::Registry(format!(
                    "duplicate command: {}",
                    path.join(" ")
                )));
            },
        }
        log::debug!("registered command '{}'", path.join(" "));
        Ok(())
    }

    /// Walk the tree with `tokens`.
    pub fn resolve(&self, tokens: &[String]) -> Resolution<'_> {
        if tokens.is_empty() {
            return Resolution::failed(0, Vec::new());
        }
        let mut children = &self.root;
        let mut path = Vec::new();
        let mut consumed = 0;
        loop {
            let Some(token) = tokens.get(consumed) else {
                // Out of tokens at an interior node.
                return match children.get(SELF_KEY) {
                    Some(node) => Resolution {
                        depth: consumed,
                        node: Some(node),
                        path,
                        remaining: Vec::new(),
                    },
                    None => Resolution::failed(consumed + 1, path),
                };
            };
            let Some((key, node)) = abbreviate(children, token) else {
                return Resolution::failed(consumed + 1, path);
            };
            path.push(key.to_string());
            consumed += 1;
            match node {
                CommandNode::Leaf(_) => {
                    return Resolution {
                        depth: consumed,
                        node: Some(node),
                        path,
                        remaining: tokens[consumed..].to_vec(),
                    };
                },
                CommandNode::Interior(next) => children = next,
            }
        }
    }

    /// Every command with its full path, depth first in key order.
    pub fn tree(&self) -> Vec<(String, &dyn Command)> {
        fn walk<'a>(
            prefix: &str,
            children: &'a BTreeMap<String, CommandNode>,
            out: &mut Vec<(String, &'a dyn Command)>,
        ) {
            for (key, node) in children {
                let path = match (prefix.is_empty(), key.is_empty()) {
                    (_, true) => prefix.to_string(),
                    (true, false) => key.clone(),
                    (false, false) => format!("{prefix} {key}"),
                };
                match node {
                    CommandNode::Leaf(cmd) => out.push((path, cmd.as_ref())),
                    CommandNode::Interior(next) => walk(&path, next, out),
                }
            }
        }
        let mut out = Vec::new();
        walk("", &self.root, &mut out);
        out
    }

    /// Completion over the command words, handing the argument part of the
    /// line to the resolved command's completer.
    pub fn candidates(&self, line: &str, cursor: usize) -> Vec<Candidate> {
        let mut children = &self.root;
        let mut rest = before_cursor(line, cursor).trim_start();
        loop {
            let Some(pos) = rest.find(char::is_whitespace) else {
                return complete_words(rest, children.keys().map(String::as_str));
            };
            match abbreviate(children, &rest[..pos]) {
                Some((_, CommandNode::Interior(next))) => children = next,
                Some((_, CommandNode::Leaf(cmd))) => {
                    let args = rest[pos..].trim_start();
                    return cmd.completer().candidates(args, args.len());
                },
                None => return Vec::new(),
            }
            rest = rest[pos..].trim_start();
        }
    }

    /// Release resources held by commands.
    pub fn shutdown(&self) {
        for (path, cmd) in self.tree() {
            log::trace!("shutdown '{path}'");
            cmd.shutdown();
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use crate::interpreter::{CommandOutput, Environment, Invocation};

    pub(crate) struct NoopCmd(pub &'static str);
    impl Command for NoopCmd {
        fn description(&self) -> &str {
            self.0
        }
        fn execute(&self, _inv: &Invocation, _env: &mut Environment<'_>) -> Result<CommandOutput> {
            Ok(CommandOutput::None)
        }
    }

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    fn registry() -> CommandRegistry {
        let mut reg = CommandRegistry::new();
        for path in [
            "show ip address",
            "show ip route",
            "show ipv6 route",
            "show interface",
            "enable interface",
            "exit",
        ] {
            let parts: Vec<&str> = path.split(' ').collect();
            reg.register(&parts, Box::new(NoopCmd("noop"))).unwrap();
        }
        reg
    }

    #[test]
    fn scenario_abbreviated_path_resolves() {
        let reg = registry();
        let res = reg.resolve(&words("sh ip addr"));
        assert!(res.command().is_some());
        assert_eq!(res.depth, 3);
        assert_eq!(res.path, vec!["show", "ip", "address"]);
        assert_eq!(res.matched_token(), Some("address"));
        assert!(res.remaining.is_empty());
    }

    #[test]
    fn exact_match_beats_abbreviation() {
        // "ip" is a full key and also a prefix of "ipv6".
        let reg = registry();
        let res = reg.resolve(&words("show ip route"));
        assert_eq!(res.path, vec!["show", "ip", "route"]);
    }

    #[test]
    fn ambiguous_abbreviation_fails() {
        let reg = registry();
        let res = reg.resolve(&words("e"));
        assert!(res.node.is_none());
        assert_eq!(res.depth, 1);
        let res = reg.resolve(&words("show i route"));
        assert!(res.node.is_none());
        assert_eq!(res.depth, 2);
    }

    #[test]
    fn leaf_keeps_remaining_args() {
        let reg = registry();
        let res = reg.resolve(&words("show int eth0 stats"));
        assert_eq!(res.depth, 2);
        assert_eq!(res.remaining, vec!["eth0", "stats"]);
    }

    #[test]
    fn interior_stop_is_incomplete() {
        let reg = registry();
        let tokens = words("sh ip");
        let res = reg.resolve(&tokens);
        assert!(res.is_incomplete(tokens.len()));
        assert_eq!(res.depth, 3);
    }

    #[test]
    fn empty_input_depth_zero() {
        let reg = registry();
        let res = reg.resolve(&[]);
        assert_eq!(res.depth, 0);
        assert!(res.node.is_none());
        assert!(!res.is_incomplete(0));
    }

    #[test]
    fn self_key_makes_interior_invokable() {
        let mut reg = CommandRegistry::new();
        reg.register(&["monitor"], Box::new(NoopCmd("self"))).unwrap();
        reg.register(&["monitor", "stop"], Box::new(NoopCmd("stop")))
            .unwrap();

        let res = reg.resolve(&words("mon"));
        assert_eq!(res.command().map(|c| c.description()), Some("self"));
        assert_eq!(res.depth, 1);

        let res = reg.resolve(&words("mon st"));
        assert_eq!(res.command().map(|c| c.description()), Some("stop"));

        // Extra tokens after a self entry are not arguments.
        let res = reg.resolve(&words("mon junk"));
        assert!(res.node.is_none());
        assert_eq!(res.depth, 2);
    }

    #[test]
    fn self_key_registered_after_children() {
        let mut reg = CommandRegistry::new();
        reg.register(&["a", "b"], Box::new(NoopCmd("b"))).unwrap();
        reg.register(&["a"], Box::new(NoopCmd("a"))).unwrap();
        assert_eq!(
            reg.resolve(&words("a")).command().map(|c| c.description()),
            Some("a")
        );
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut reg = registry();
        let err = reg
            .register(&["show", "ip", "route"], Box::new(NoopCmd("dup")))
            .unwrap_err();
        assert_eq!(
            format!("{err}"),
            "registry error: duplicate command: show ip route"
        );
        assert!(reg.register(&[], Box::new(NoopCmd("x"))).is_err());
        assert!(reg.register(&["a b"], Box::new(NoopCmd("x"))).is_err());
    }

    #[test]
    fn tree_lists_full_paths() {
        let reg = registry();
        let paths: Vec<String> = reg.tree().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![
                "enable interface",
                "exit",
                "show interface",
                "show ip address",
                "show ip route",
                "show ipv6 route",
            ]
        );
    }

    fn texts(c: Vec<Candidate>) -> Vec<String> {
        c.into_iter().map(|c| c.text).collect()
    }

    #[test]
    fn nested_candidates() {
        let reg = registry();
        assert_eq!(texts(reg.candidates("e", 1)), vec!["enable", "exit"]);
        assert_eq!(texts(reg.candidates("sh", 2)), vec!["show"]);
        assert_eq!(texts(reg.candidates("sho ", 4)), vec!["interface", "ip", "ipv6"]);
        assert_eq!(texts(reg.candidates("sho ip r", 8)), vec!["route"]);
        assert!(reg.candidates("nope ", 5).is_empty());
    }

    proptest! {
        #[test]
        fn unique_prefix_resolves_like_full_key(idx in 0usize..3, cut in 1usize..10) {
            let keys = ["address", "neighbour", "rule"];
            let mut reg = CommandRegistry::new();
            for k in keys {
                reg.register(&[k], Box::new(NoopCmd("noop"))).unwrap();
            }
            let key = keys[idx];
            let abbrev = &key[..cut.min(key.len())];
            let full = reg.resolve(&[key.to_string()]);
            let short = reg.resolve(&[abbrev.to_string()]);
            prop_assert_eq!(short.path, full.path);
            prop_assert_eq!(short.depth, full.depth);
        }

        #[test]
        fn shared_prefix_fails(cut in 1usize..3) {
            let mut reg = CommandRegistry::new();
            for k in ["neighbour", "netns"] {
                reg.register(&[k], Box::new(NoopCmd("noop"))).unwrap();
            }
            let res = reg.resolve(&["neighbour"[..cut].to_string()]);
            prop_assert!(res.node.is_none());
            prop_assert_eq!(res.depth, 1);
        }
    }
}
