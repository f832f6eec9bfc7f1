//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::Parser;

/// Monitor disk usage on remote servers over SSH
#[derive(Parser, Debug)]
#[command(name = "diskwatch")]
#[command(author, version, about = "Monitor disk usage on remote servers over SSH")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        let cli = Cli::try_parse_from(["diskwatch"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_config_and_verbosity_flags() {
        let cli = Cli::try_parse_from(["diskwatch", "-c", "my.yaml", "-vv"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("my.yaml"));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_long_flags() {
        let cli =
            Cli::try_parse_from(["diskwatch", "--config", "/etc/diskwatch.yaml", "--verbose"])
                .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/diskwatch.yaml"));
        assert_eq!(cli.verbose, 1);
    }
}
