use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Errata error-surfacing service
#[derive(Debug, Parser)]
#[command(name = "errata", about = "Canonical, domain-coded HTTP errors")]
pub struct Args {
    /// Path to configuration file; built-in defaults apply when it is absent
    #[arg(short, long, default_value = "errata.toml", env = "ERRATA_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "ERRATA_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Override the log filter, e.g. `errata_server=debug`
    #[arg(long, env = "ERRATA_LOG")]
    pub log: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["errata"]).unwrap();

        assert_eq!(args.config, PathBuf::from("errata.toml"));
        assert!(args.listen.is_none());
    }

    #[test]
    fn overrides() {
        let args = Args::try_parse_from(["errata", "-c", "/etc/errata.toml", "--listen", "127.0.0.1:8080"]).unwrap();

        assert_eq!(args.config, PathBuf::from("/etc/errata.toml"));
        assert_eq!(args.listen, Some(SocketAddr::from(([127, 0, 0, 1], 8080))));
    }
}
