//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "larynx", version, about = "Real-time speech transcription")]
pub struct Cli {
    /// Path to config file (default: ~/.config/larynx/config.toml)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Audio input device name (see `larynx devices`)
    #[arg(long, short = 'd')]
    pub device: Option<String>,

    /// Path to the recognition model directory
    #[arg(long, short = 'm')]
    pub model: Option<PathBuf>,

    /// Stop automatically after this many seconds instead of waiting for
    /// Enter
    #[arg(long)]
    pub duration: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,
}

/// Default config file location under the XDG config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("larynx").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_record_flags() {
        let cli = Cli::parse_from(["larynx", "--device", "pipewire", "--duration", "10"]);
        assert_eq!(cli.device.as_deref(), Some("pipewire"));
        assert_eq!(cli.duration, Some(10));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parses_devices_subcommand() {
        let cli = Cli::parse_from(["larynx", "devices"]);
        assert!(matches!(cli.command, Some(Commands::Devices)));
    }

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
