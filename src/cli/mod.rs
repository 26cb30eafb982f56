//! CLI module for Kanhu.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Kanhu - caregiver health Q&A with voice input and spoken answers
///
/// Answers questions from a folder of reference documents. The name comes from
/// the Taiwanese Hokkien word for "caring for" someone.
#[derive(Parser, Debug)]
#[command(name = "kanhu")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "KANHU_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the index and start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Rebuild the index even if the corpus is unchanged
        #[arg(long)]
        rebuild: bool,
    },

    /// Fingerprint the corpus and rebuild the index if it changed
    Index {
        /// Rebuild even if the fingerprint matches
        #[arg(short, long)]
        force: bool,
    },

    /// Ask a single question through the full answer pipeline
    Ask {
        /// The question to ask
        question: String,

        /// Also synthesize the spoken answer
        #[arg(long)]
        voice: bool,

        /// Number of context chunks to retrieve
        #[arg(short = 'k', long)]
        k: Option<usize>,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration (including environment overrides)
    Show,

    /// Show configuration file path
    Path,

    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from(["kanhu", "-vv", "serve", "--port", "8080", "--rebuild"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Serve { host, port, rebuild } => {
                assert!(host.is_none());
                assert_eq!(port, Some(8080));
                assert!(rebuild);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["kanhu", "ask", "血壓多少算高？", "-k", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ask { ref question, voice: false, k: Some(3) } if question == "血壓多少算高？"
        ));
    }
}
