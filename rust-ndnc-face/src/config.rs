//! Client configuration: where to find the forwarder.
//!
//! The transport is discovered in this order: the `NDN_CLIENT_TRANSPORT`
//! environment variable, the `transport` key of the client configuration
//! file (`$HOME/.ndn/client.conf`, then `/etc/ndn/client.conf`), and
//! finally the platform-default Unix socket.

use crate::transport::{tcp_transport, unix_transport, AddressFamily, Transport};
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Default forwarder socket when nothing else is configured.
pub const DEFAULT_UNIX_SOCKET: &str = "/var/run/nfd.sock";

/// Default TCP port of the forwarder.
pub const DEFAULT_TCP_PORT: u16 = 6363;

/// Environment variable overriding the transport URI.
pub const TRANSPORT_ENV_VAR: &str = "NDN_CLIENT_TRANSPORT";

#[derive(Error, Debug)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

/// Settings read from the client configuration file.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ClientConfig {
    /// Transport URI, e.g. `unix:///var/run/nfd.sock` or `tcp://host:6363`.
    pub transport: Option<String>,
}

impl ClientConfig {
    /// Loads the first client configuration file found, if any.
    pub fn load() -> Result<Self, ConfigError> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(home) = std::env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join(".ndn/client.conf"));
        }
        candidates.push(PathBuf::from("/etc/ndn/client.conf"));

        for path in candidates {
            if !path.is_file() {
                continue;
            }
            debug!("reading client configuration from {}", path.display());
            let settings = config::Config::builder()
                .add_source(config::File::from(path.as_path()).format(config::FileFormat::Ini))
                .build()
                .map_err(|e| ConfigError(format!("cannot parse {}: {e}", path.display())))?;
            return settings
                .try_deserialize()
                .map_err(|e| ConfigError(format!("cannot parse {}: {e}", path.display())));
        }
        Ok(Self::default())
    }
}

/// Determines the transport URI from environment, config file, or default.
pub fn discover_transport_uri() -> Result<String, ConfigError> {
    if let Ok(uri) = std::env::var(TRANSPORT_ENV_VAR) {
        if !uri.is_empty() {
            return Ok(uri);
        }
    }
    if let Some(uri) = ClientConfig::load()?.transport {
        return Ok(uri);
    }
    Ok(format!("unix://{DEFAULT_UNIX_SOCKET}"))
}

/// Builds a transport for the given URI.
///
/// Recognised schemes: `unix://<path>`, `tcp://<host>[:<port>]`,
/// `tcp4://…`, `tcp6://…`.
pub fn create_transport(uri: &str) -> Result<Box<dyn Transport>, ConfigError> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| ConfigError(format!("invalid transport URI '{uri}'")))?;

    match scheme {
        "unix" => {
            if rest.is_empty() {
                return Err(ConfigError(format!("invalid transport URI '{uri}'")));
            }
            Ok(Box::new(unix_transport(PathBuf::from(rest))))
        }
        "tcp" | "tcp4" | "tcp6" => {
            let family = match scheme {
                "tcp4" => AddressFamily::V4,
                "tcp6" => AddressFamily::V6,
                _ => AddressFamily::Any,
            };
            let (host, port) = split_host_port(rest, uri)?;
            Ok(Box::new(tcp_transport(host, port, family)))
        }
        other => Err(ConfigError(format!(
            "unsupported transport scheme '{other}' in '{uri}'"
        ))),
    }
}

fn split_host_port(rest: &str, uri: &str) -> Result<(String, u16), ConfigError> {
    if rest.is_empty() {
        return Err(ConfigError(format!("invalid transport URI '{uri}'")));
    }

    // bracketed IPv6 literal
    if let Some(stripped) = rest.strip_prefix('[') {
        let (host, tail) = stripped
            .split_once(']')
            .ok_or_else(|| ConfigError(format!("invalid transport URI '{uri}'")))?;
        let port = match tail.strip_prefix(':') {
            None if tail.is_empty() => DEFAULT_TCP_PORT,
            Some(port) => parse_port(port, uri)?,
            None => return Err(ConfigError(format!("invalid transport URI '{uri}'"))),
        };
        return Ok((host.to_owned(), port));
    }

    match rest.rsplit_once(':') {
        // a second ':' means an unbracketed IPv6 literal without port
        Some((host, _)) if host.contains(':') => Ok((rest.to_owned(), DEFAULT_TCP_PORT)),
        Some((host, port)) => Ok((host.to_owned(), parse_port(port, uri)?)),
        None => Ok((rest.to_owned(), DEFAULT_TCP_PORT)),
    }
}

fn parse_port(port: &str, uri: &str) -> Result<u16, ConfigError> {
    port.parse()
        .map_err(|_| ConfigError(format!("invalid port in transport URI '{uri}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_uri_accepted() {
        assert!(create_transport("unix:///run/nfd.sock").is_ok());
    }

    #[test]
    fn tcp_uris_accepted() {
        assert!(create_transport("tcp://localhost:6363").is_ok());
        assert!(create_transport("tcp://localhost").is_ok());
        assert!(create_transport("tcp4://127.0.0.1:6363").is_ok());
        assert!(create_transport("tcp6://[::1]:6363").is_ok());
    }

    #[test]
    fn bad_uris_rejected() {
        assert!(create_transport("udp://localhost").is_err());
        assert!(create_transport("nonsense").is_err());
        assert!(create_transport("unix://").is_err());
        assert!(create_transport("tcp://host:notaport").is_err());
    }

    #[test]
    fn host_port_splitting() {
        assert_eq!(
            split_host_port("example.net:7777", "x").unwrap(),
            ("example.net".to_owned(), 7777)
        );
        assert_eq!(
            split_host_port("example.net", "x").unwrap(),
            ("example.net".to_owned(), DEFAULT_TCP_PORT)
        );
        assert_eq!(
            split_host_port("[::1]:7777", "x").unwrap(),
            ("::1".to_owned(), 7777)
        );
    }
}
