use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::{self, HistoryConfig};

#[derive(Parser)]
#[command(name = "cliprecall", about = "Clipboard history daemon and client")]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the history daemon
    Daemon {
        /// Number of entries to keep
        #[arg(
            long,
            default_value_t = config::DEFAULT_CAPACITY as u16,
            value_parser = clap::value_parser!(u16).range(config::MIN_CAPACITY as i64..=config::MAX_CAPACITY as i64)
        )]
        history_size: u16,

        /// Characters shown in copy notifications
        #[arg(long, default_value_t = config::DEFAULT_PREVIEW_LENGTH)]
        preview_length: usize,

        /// Include a preview of each new copy in change notifications
        #[arg(long)]
        notify_on_copy: bool,

        /// Clipboard polling interval in milliseconds
        #[arg(
            long,
            default_value_t = config::DEFAULT_POLL_INTERVAL.as_millis() as u64,
            value_parser = clap::value_parser!(u64).range(10..)
        )]
        poll_interval_ms: u64,
    },

    /// Query or change the history of a running daemon
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },
}

impl Command {
    /// Daemon settings from the `daemon` arguments.
    pub fn history_config(&self) -> Option<HistoryConfig> {
        match self {
            Command::Daemon {
                history_size,
                preview_length,
                notify_on_copy,
                poll_interval_ms,
            } => Some(HistoryConfig {
                history_capacity: usize::from(*history_size),
                preview_length: *preview_length,
                notify_on_copy: *notify_on_copy,
                poll_interval: Duration::from_millis(*poll_interval_ms),
                clipboard_timeout: config::DEFAULT_CLIPBOARD_TIMEOUT,
            }),
            Command::Client { .. } => None,
        }
    }
}

#[derive(Subcommand)]
pub enum ClientAction {
    /// Show the history, favorites first
    List {
        /// Only entries whose text contains this (case-insensitive)
        #[arg(long, short)]
        query: Option<String>,
    },

    /// Add text to the history
    Add { text: String },

    /// Toggle an entry's favorite flag
    Favorite { id: u64 },

    /// Remove an entry
    Remove { id: u64 },

    /// Remove every entry, favorites included
    Clear {
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },

    /// Copy an entry back to the clipboard
    Restore { id: u64 },

    /// Export the history to a timestamped file in the home directory
    Export,

    /// Replace the history with the contents of an exported file
    Import {
        /// Defaults to ~/clipboard_history_export.json
        path: Option<PathBuf>,

        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },

    /// Print change notifications as they happen
    Watch,

    /// Search interactively: each stdin line is a new query
    Browse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_defaults() {
        let cli = Cli::try_parse_from(["cliprecall", "daemon"]).unwrap();
        assert!(!cli.debug);
        assert_eq!(cli.command.history_config(), Some(HistoryConfig::default()));
    }

    #[test]
    fn history_size_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["cliprecall", "daemon", "--history-size", "4"]).is_err());
        assert!(Cli::try_parse_from(["cliprecall", "daemon", "--history-size", "51"]).is_err());
        let cli =
            Cli::try_parse_from(["cliprecall", "daemon", "--history-size", "50"]).unwrap();
        assert_eq!(cli.command.history_config().unwrap().history_capacity, 50);
    }

    #[test]
    fn debug_flag_is_global() {
        let cli = Cli::try_parse_from(["cliprecall", "client", "list", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(cli.command.history_config().is_none());
    }

    #[test]
    fn import_path_is_optional() {
        let cli = Cli::try_parse_from(["cliprecall", "client", "import", "--yes"]).unwrap();
        match cli.command {
            Command::Client {
                action: ClientAction::Import { path, yes },
            } => {
                assert!(path.is_none());
                assert!(yes);
            }
            _ => panic!("expected client import"),
        }
    }
}
