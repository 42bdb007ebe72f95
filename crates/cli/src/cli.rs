//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use artvault_core::{ArtworkIdentifier, MuseumTag, RunOptions};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Resumable public-domain artwork harvester
#[derive(Parser, Debug)]
#[command(name = "artvault")]
#[command(about = "Download public-domain artworks from museum APIs", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: $ARTVAULT_CONFIG or ./artvault.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    /// Print Prometheus metrics to stdout when the command finishes
    #[arg(long, global = true, default_value_t = false)]
    pub metrics: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover and download artworks
    Run(RunArgs),

    /// Reset failed items and run again
    RetryFailed(RunArgs),

    /// Show item counts per museum
    Status(StatusArgs),

    /// List failed items with their last error
    Failures(StatusArgs),

    /// Queue artworks for download again
    Refetch(IdentifierArgs),

    /// Delete artworks from the store, catalog and image directory
    Purge(IdentifierArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Museums to process (default: every enabled museum)
    #[arg(long = "museum", short = 'm', value_parser = parse_museum)]
    pub museums: Vec<MuseumTag>,

    /// Restart the candidate listing from the first page
    #[arg(long, default_value_t = false)]
    pub rediscover: bool,

    /// Only process items already known to the store
    #[arg(long, default_value_t = false)]
    pub skip_discovery: bool,

    /// Stop after this many downloads per museum
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Stop once this many gigabytes of images were written per museum
    #[arg(long, value_parser = parse_storage_gb)]
    pub max_storage_gb: Option<f64>,

    /// Specific artworks to enqueue, e.g. aic:27992
    #[arg(long = "id", value_parser = parse_identifier)]
    pub identifiers: Vec<ArtworkIdentifier>,
}

impl RunArgs {
    pub fn options(&self) -> RunOptions {
        RunOptions {
            rediscover: self.rediscover,
            skip_discovery: self.skip_discovery,
            identifiers: self.identifiers.clone(),
            max_items: self.max_items,
            max_bytes: self.max_storage_gb.map(|gb| (gb * BYTES_PER_GB) as u64),
        }
    }
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Museums to report (default: every enabled museum)
    #[arg(long = "museum", short = 'm', value_parser = parse_museum)]
    pub museums: Vec<MuseumTag>,

    /// Print JSON instead of text
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct IdentifierArgs {
    /// Artwork identifiers, e.g. met:436535
    #[arg(required = true, value_parser = parse_identifier)]
    pub identifiers: Vec<ArtworkIdentifier>,
}

fn parse_museum(value: &str) -> Result<MuseumTag, String> {
    value.parse().map_err(|e| format!("{e}"))
}

fn parse_storage_gb(value: &str) -> Result<f64, String> {
    let gb: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if gb.is_finite() && gb > 0.0 {
        Ok(gb)
    } else {
        Err(format!("expected a positive size in GB, got {value}"))
    }
}

fn parse_identifier(value: &str) -> Result<ArtworkIdentifier, String> {
    value.parse().map_err(|e| format!("{e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "artvault",
            "--config",
            "custom.toml",
            "run",
            "-m",
            "aic",
            "--museum",
            "CMA",
            "--max-items",
            "10",
            "--id",
            "aic:27992",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.museums, vec![MuseumTag::Aic, MuseumTag::Cma]);
        let options = args.options();
        assert_eq!(options.max_items, Some(10));
        assert_eq!(options.max_bytes, None);
        assert_eq!(
            options.identifiers,
            vec![ArtworkIdentifier::new(MuseumTag::Aic, "27992")]
        );
    }

    #[test]
    fn test_max_storage_gb_becomes_byte_budget() {
        let cli = Cli::try_parse_from(["artvault", "run", "--max-storage-gb", "1.5"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.options().max_bytes, Some(1_610_612_736));

        for bad in ["0", "-2", "NaN", "inf", "lots"] {
            let result = Cli::try_parse_from(["artvault", "run", "--max-storage-gb", bad]);
            assert!(result.is_err(), "{bad}");
        }
    }

    #[test]
    fn test_reject_unknown_museum() {
        let result = Cli::try_parse_from(["artvault", "status", "--museum", "louvre"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_purge_requires_identifier() {
        assert!(Cli::try_parse_from(["artvault", "purge"]).is_err());
        let cli = Cli::try_parse_from(["artvault", "--log-json", "purge", "met:1", "cma:2"]).unwrap();
        assert!(cli.log_json);
        let Commands::Purge(args) = cli.command else {
            panic!("expected purge command");
        };
        assert_eq!(args.identifiers.len(), 2);
    }
}
