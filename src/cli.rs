//! Command-line interface definitions for the wild-berry buyer radar.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Credentials and paths can also be provided via environment variables, which
//! is how a cron job or CI workflow usually passes them.

use crate::keywords::PolicyVariant;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for one radar run.
///
/// # Examples
///
/// ```sh
/// # Embedded configuration, state in the current directory
/// TG_TOKEN=123:abc TG_CHAT=-10042 wildberry_alert
///
/// # Custom configuration and state directory, dried-form policy
/// wildberry_alert --config ./radar.yaml --state-dir /var/lib/radar --policy dried
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding the seen set and last-alert marker
    #[arg(short, long, env = "RADAR_STATE_DIR", default_value = ".")]
    pub state_dir: PathBuf,

    /// File name of the seen set inside the state directory
    #[arg(long, default_value = "seen.json")]
    pub seen_file: String,

    /// File name of the last-alert marker inside the state directory
    #[arg(long, default_value = "last_alert.txt")]
    pub last_alert_file: String,

    /// Optional path to a radar YAML file (defaults to the embedded one)
    #[arg(short, long, env = "RADAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Telegram bot token
    #[arg(long, env = "TG_TOKEN", hide_env_values = true)]
    pub tg_token: Option<String>,

    /// Telegram chat id (group ids are negative)
    #[arg(long, env = "TG_CHAT", allow_hyphen_values = true)]
    pub tg_chat: Option<String>,

    /// Keyword policy used to gate listings
    #[arg(short, long, value_enum, default_value_t = PolicyVariant::Buyer)]
    pub policy: PolicyVariant,

    /// Maximum number of sources polled at once
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Wall-clock limit for the whole run, in seconds
    #[arg(long, default_value_t = 300)]
    pub deadline_secs: u64,
}

impl Cli {
    pub fn seen_path(&self) -> PathBuf {
        self.state_dir.join(&self.seen_file)
    }

    pub fn last_alert_path(&self) -> PathBuf {
        self.state_dir.join(&self.last_alert_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["wildberry_alert"]);

        assert_eq!(cli.policy, PolicyVariant::Buyer);
        assert_eq!(cli.concurrency, 4);
        assert_eq!(cli.seen_path(), cli.state_dir.join("seen.json"));
        assert_eq!(cli.last_alert_path(), cli.state_dir.join("last_alert.txt"));
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "wildberry_alert",
            "-s",
            "/tmp/radar",
            "-c",
            "/etc/radar.yaml",
            "--policy",
            "dried",
            "--tg-token",
            "123:abc",
            "--tg-chat",
            "-10042",
            "--deadline-secs",
            "60",
        ]);

        assert_eq!(cli.seen_path(), PathBuf::from("/tmp/radar/seen.json"));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/radar.yaml")));
        assert_eq!(cli.policy, PolicyVariant::Dried);
        assert_eq!(cli.tg_token.as_deref(), Some("123:abc"));
        assert_eq!(cli.tg_chat.as_deref(), Some("-10042"));
        assert_eq!(cli.deadline_secs, 60);
    }
}
