use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sysdash::commands::{self, MonitorOptions};
use sysdash::core::config::Settings;

fn cli() -> Command {
    Command::new("sysdash")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Rainbow terminal dashboard for system, network, ports, memory, CPU, GPU, disks and browsers")
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .value_name("SECS")
                .help("Seconds between refreshes (default: 45)")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("cache-ttl")
                .long("cache-ttl")
                .value_name("SECS")
                .help("Lifetime of cached public IP and connectivity lookups (default: 45)")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Print a single snapshot and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print snapshots and warnings as JSON lines")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Settings file (default: <config dir>/sysdash/config.json)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

fn main() -> Result<()> {
    sysdash::init_logging();

    let matches = cli().get_matches();

    let config_path = matches.get_one::<PathBuf>("config");
    let settings = Settings::load(config_path.map(PathBuf::as_path))
        .context("Failed to load settings")?
        .with_overrides(
            matches.get_one::<u64>("interval").copied(),
            matches.get_one::<u64>("cache-ttl").copied(),
        )
        .context("Invalid command line settings")?;

    let options = MonitorOptions {
        once: matches.get_flag("once"),
        json: matches.get_flag("json"),
        no_color: matches.get_flag("no-color"),
    };
    if options.no_color {
        colored::control::set_override(false);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(commands::monitor(Arc::new(settings), options));
    // A query stuck in the kernel must not hold up the exit
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn test_flags_parse() {
        let matches = cli()
            .try_get_matches_from(["sysdash", "--interval", "10", "--once", "--json"])
            .unwrap();
        assert_eq!(matches.get_one::<u64>("interval").copied(), Some(10));
        assert!(matches.get_flag("once"));
        assert!(matches.get_flag("json"));
        assert!(!matches.get_flag("no-color"));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        assert!(cli().try_get_matches_from(["sysdash", "--interval", "0"]).is_err());
    }
}
