//! Server settings, read from the environment (or a `.env` file) at startup.

use std::{
    error::Error as StdError,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::Context;
use shared::constants::DEFAULT_PORT;
use tracing::warn;

use crate::connection::Limits;

const DEFAULT_PORT_INFO: &str = "port.info";
const DEFAULT_DB_URL: &str = "sqlite://server.db?mode=rwc";
const DEFAULT_UPLOAD_DIR: &str = "clientsFiles";
const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 25;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub bind_ip: IpAddr,
    pub port: u16,
    pub db_url: String,
    pub upload_dir: PathBuf,
    pub max_payload_size: u32,
    pub idle_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_source(|key| dotenv::var(key).ok())
    }

    /// Builds the configuration from `var`, which looks up a single variable by name.
    pub fn from_source(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = match var("PORT") {
            Some(_) => parse_var(&var, "PORT", DEFAULT_PORT)?,
            None => {
                let port_info = var("PORT_INFO").unwrap_or_else(|| DEFAULT_PORT_INFO.to_owned());
                read_port_file(Path::new(&port_info))
            }
        };

        Ok(Self {
            bind_ip: parse_var(&var, "BIND_IP", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port,
            db_url: var("DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.to_owned()),
            upload_dir: var("UPLOAD_DIR").map_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR), PathBuf::from),
            max_payload_size: parse_var(&var, "MAX_PAYLOAD_SIZE", DEFAULT_MAX_PAYLOAD_SIZE)?,
            idle_timeout: Duration::from_secs(parse_var(&var, "IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT_SECS)?),
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_payload_size: self.max_payload_size,
            idle_timeout: self.idle_timeout,
        }
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {value:?}")),
        None => Ok(default),
    }
}

/// Reads the port from the first line of `path`, falling back to the default port.
fn read_port_file(path: &Path) -> u16 {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_port_file(&contents).unwrap_or_else(|| {
            warn!("{} does not contain a valid port, using {DEFAULT_PORT}", path.display());
            DEFAULT_PORT
        }),
        Err(e) => {
            warn!("unable to read {}: {e}, using port {DEFAULT_PORT}", path.display());
            DEFAULT_PORT
        }
    }
}

fn parse_port_file(contents: &str) -> Option<u16> {
    contents.lines().next()?.trim().parse().ok()
}
