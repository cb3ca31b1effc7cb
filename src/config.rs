use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::warn;

const DEFAULT_UPLOAD_DIR: &str = "BIN";
const DEFAULT_MAX_UPLOAD_MB: usize = 64;
const BYTES_PER_MB: usize = 1024 * 1024;
const PROBE_ADDR: (Ipv4Addr, u16) = (Ipv4Addr::new(8, 8, 8, 8), 80);

/// Command line of the server binary.
#[derive(Debug, Parser)]
#[command(name = "bios-update-server", version, about = "Publish a BIOS image to polling clients")]
pub struct Cli {
    /// TCP port to listen on
    pub port: u16,
}

/// Runtime settings shared by every handler.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Host advertised in download URLs handed to polling clients.
    pub public_host: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Builds the configuration from the parsed command line plus `BIOS_*` environment variables.
    pub fn from_env(cli: &Cli) -> Result<Self> {
        let bind_addr = match env::var("BIOS_BIND_ADDR") {
            Ok(value) => value
                .trim()
                .parse::<IpAddr>()
                .with_context(|| format!("BIOS_BIND_ADDR `{value}` is not an IP address"))?,
            Err(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let public_host = env::var("BIOS_PUBLIC_HOST")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| detect_local_ip().to_string());

        let upload_dir = env::var("BIOS_UPLOAD_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string());

        let max_upload_bytes = match env::var("BIOS_MAX_UPLOAD_MB") {
            Ok(value) => parse_upload_limit(&value)?,
            Err(_) => DEFAULT_MAX_UPLOAD_MB * BYTES_PER_MB,
        };

        Ok(Self {
            bind_addr,
            port: cli.port,
            public_host,
            upload_dir: absolute_dir(Path::new(&upload_dir))?,
            max_upload_bytes,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Base URL under which polling clients reach this server.
    pub fn public_base_url(&self) -> String {
        format!("http://{}:{}", self.public_host, self.port)
    }
}

/// Parses `BIOS_MAX_UPLOAD_MB` into a byte count.
fn parse_upload_limit(value: &str) -> Result<usize> {
    let megabytes: usize = value
        .trim()
        .parse()
        .with_context(|| format!("BIOS_MAX_UPLOAD_MB `{value}` is not a number"))?;
    if megabytes == 0 {
        return Err(anyhow!("BIOS_MAX_UPLOAD_MB must be greater than 0"));
    }
    megabytes
        .checked_mul(BYTES_PER_MB)
        .ok_or_else(|| anyhow!("BIOS_MAX_UPLOAD_MB `{value}` is too large"))
}

fn absolute_dir(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().context("failed to resolve working directory")?;
    Ok(cwd.join(path))
}

/// Returns the IPv4 address of the interface that routes to the internet.
///
/// No packet is sent: connecting a UDP socket only selects a route. Falls back to
/// loopback on hosts without a usable route.
pub fn detect_local_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(PROBE_ADDR)?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(ip) if !ip.is_unspecified() => ip,
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(err) => {
            warn!(?err, "failed to detect local IP, falling back to loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_accepts_numeric_port() {
        let cli = Cli::try_parse_from(["bios-update-server", "8080"]).expect("parse port");
        assert_eq!(cli.port, 8080);
    }

    #[test]
    fn cli_rejects_missing_or_non_numeric_port() {
        assert!(Cli::try_parse_from(["bios-update-server"]).is_err());
        assert!(Cli::try_parse_from(["bios-update-server", "eighty"]).is_err());
        assert!(Cli::try_parse_from(["bios-update-server", "70000"]).is_err());
    }

    #[test]
    fn upload_limit_must_be_positive_number() {
        assert_eq!(parse_upload_limit(" 16 ").unwrap(), 16 * 1024 * 1024);
        assert!(parse_upload_limit("0").is_err());
        assert!(parse_upload_limit("lots").is_err());
        assert!(parse_upload_limit(&usize::MAX.to_string()).is_err());
        assert!(parse_upload_limit("18446744073709551615").is_err());
    }

    #[test]
    fn relative_upload_dir_is_anchored_to_cwd() {
        let resolved = absolute_dir(Path::new("BIN")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("BIN"));
    }

    #[test]
    fn public_base_url_uses_host_and_port() {
        let config = ServerConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            public_host: "192.168.1.20".to_string(),
            upload_dir: PathBuf::from("/tmp/BIN"),
            max_upload_bytes: 1024,
        };
        assert_eq!(config.public_base_url(), "http://192.168.1.20:8080");
        assert_eq!(config.socket_addr().port(), 8080);
    }
}
