//! rosh: an interactive router shell.
//!
//! Shows network state of the host (or a named namespace) with
//! abbreviated, tab-completed commands and regex output filters.

mod editor;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use rosh_platform::{CancelToken, IprouteQuery, SystemLauncher};
use rosh_terminal::{LinePrinter, Shell, ShellParts, Toolbox, render};
use rosh_types::config::RoshConfig;
use rosh_types::lookup::Lookups;

/// Interactive router shell.
#[derive(Parser, Debug)]
#[command(name = "rosh", version, about)]
struct Cli {
    /// Configuration file (default: ROSH_CONFIG, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log debug messages
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Log errors only
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Start the interactive shell (default)
    Shell,
    /// List the available commands and filters
    Commands,
    /// Print the effective configuration
    Config,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .init();

    let config = RoshConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => editor::run(config),
        Commands::Commands => {
            let printer: LinePrinter = Arc::new(|line: &str| println!("{line}"));
            let shell = build_shell(config, printer, CancelToken::new())?;
            if let Some(text) = render(&shell.listing()) {
                println!("{text}");
            }
            Ok(())
        },
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        },
    }
}

/// Wire the iproute2 backend and the system launcher into a shell.
pub(crate) fn build_shell(
    config: RoshConfig,
    printer: LinePrinter,
    cancel: CancelToken,
) -> Result<Shell> {
    let tools = Toolbox::discover(&config);
    let tool_path = |name: &str| tools.get(name).map_or_else(|| PathBuf::from(name), Path::to_path_buf);
    let query = IprouteQuery::new(tool_path("ip"), tool_path("bridge"));

    let shell = Shell::build(ShellParts {
        config,
        query: Arc::new(query),
        launcher: Arc::new(SystemLauncher::new(cancel)),
        tools,
        lookups: Lookups::load(),
        printer,
    })
    .context("failed to build the command tree")?;
    log::info!("{} commands available", shell.registry().tree().len());
    Ok(shell)
}

/// Host name for the prompt.
pub(crate) fn hostname() -> String {
    match ::hostname::get() {
        Ok(name) if !name.is_empty() => name.to_string_lossy().into_owned(),
        Ok(_) => "localhost".to_string(),
        Err(e) => {
            log::debug!("host name unavailable: {e}");
            "localhost".to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn shell_is_the_default_command() {
        let cli = Cli::try_parse_from(["rosh"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn flags_and_subcommands() {
        let cli = Cli::try_parse_from(["rosh", "-v", "-c", "/tmp/r.toml", "config"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Config));
        assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/r.toml")));
        assert_eq!(cli.log_level(), "debug");
        assert_eq!(Cli::try_parse_from(["rosh", "-q"]).unwrap().log_level(), "error");
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["rosh", "-v", "-q"]).is_err());
    }

    #[test]
    fn hostname_is_never_empty() {
        assert!(!hostname().is_empty());
    }
}
