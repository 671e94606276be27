use clap::Parser;
use std::path::PathBuf;

/// Simple Telegram bot that logs chat messages into SQLite.
#[derive(Parser, Debug)]
#[command(name = "chatlog")]
#[command(version)]
pub struct Cli {
    /// Telegram Bot API token
    #[arg(short, long, env = "LOGGER_BOT_TELEGRAM_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Increase verbosity
    #[arg(short, long)]
    pub verbose: bool,

    /// Append logs to this file instead of stderr
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// TOML file with polling settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Update id to start polling from (overrides the config file)
    #[arg(long)]
    pub offset: Option<i64>,

    /// SQLite database file, created if missing
    pub database: PathBuf,
}

impl Cli {
    /// Parse CLI arguments from the environment
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_arguments() {
        let cli = Cli::try_parse_from(["chatlog", "-t", "123:abc", "messages.db"]).unwrap();
        assert_eq!(cli.token, "123:abc");
        assert_eq!(cli.database, PathBuf::from("messages.db"));
        assert!(!cli.verbose);
        assert!(cli.log_file.is_none());
        assert!(cli.config.is_none());
        assert!(cli.offset.is_none());
    }

    #[test]
    fn test_all_options() {
        let cli = Cli::try_parse_from([
            "chatlog",
            "--token",
            "123:abc",
            "-v",
            "--log-file",
            "/var/log/chatlog.log",
            "--config",
            "chatlog.toml",
            "--offset",
            "900",
            "/data/messages.db",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log_file, Some(PathBuf::from("/var/log/chatlog.log")));
        assert_eq!(cli.config, Some(PathBuf::from("chatlog.toml")));
        assert_eq!(cli.offset, Some(900));
        assert_eq!(cli.database, PathBuf::from("/data/messages.db"));
    }

    #[test]
    fn test_database_is_required() {
        let err = Cli::try_parse_from(["chatlog", "-t", "123:abc"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_help_flag() {
        let err = Cli::try_parse_from(["chatlog", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
