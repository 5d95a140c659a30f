//! Endpoint addresses
//!
//! Receivers and sinks are configured with a single `bind` string of the form
//! `<scheme>://<address>`. Sinks additionally accept bare file paths and the
//! `STDOUT` / `STDERR` keywords.

use crate::{Result, TransportError};
use std::fmt;
use std::path::PathBuf;

/// Default path served by the HTTP receiver
pub const DEFAULT_HTTP_PATH: &str = "/v1alpha1";

/// Where a file head writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileTarget {
    Stdout,
    Stderr,
    Path(PathBuf),
}

impl FileTarget {
    /// Parse `STDOUT`, `STDERR` or a file path
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "" => Err(TransportError::configuration(
                "empty file target",
                Some("out"),
            )),
            "STDOUT" => Ok(FileTarget::Stdout),
            "STDERR" => Ok(FileTarget::Stderr),
            path => Ok(FileTarget::Path(PathBuf::from(path))),
        }
    }
}

impl fmt::Display for FileTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileTarget::Stdout => f.write_str("STDOUT"),
            FileTarget::Stderr => f.write_str("STDERR"),
            FileTarget::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A parsed `bind` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Udp(String),
    Unix(PathBuf),
    Http { addr: String, path: String },
    File(FileTarget),
}

impl Endpoint {
    /// Parse a `bind` string.
    ///
    /// Values without a scheme are file targets.
    pub fn parse(bind: &str) -> Result<Self> {
        let bind = bind.trim();
        let Some((scheme, rest)) = bind.split_once("://") else {
            return FileTarget::parse(bind).map(Endpoint::File);
        };

        if rest.is_empty() {
            return Err(TransportError::configuration(
                format!("missing address in '{bind}'"),
                Some("bind"),
            ));
        }

        match scheme {
            "tcp" => Ok(Endpoint::Tcp(rest.to_string())),
            "udp" => Ok(Endpoint::Udp(rest.to_string())),
            "unix" => Ok(Endpoint::Unix(PathBuf::from(rest))),
            "file" => FileTarget::parse(rest).map(Endpoint::File),
            "http" => {
                let (addr, path) = match rest.find('/') {
                    Some(idx) => rest.split_at(idx),
                    None => (rest, ""),
                };
                let path = if path.is_empty() || path == "/" {
                    DEFAULT_HTTP_PATH.to_string()
                } else {
                    path.to_string()
                };
                Ok(Endpoint::Http {
                    addr: addr.to_string(),
                    path,
                })
            }
            other => Err(TransportError::configuration(
                format!("unsupported scheme '{other}' in '{bind}'"),
                Some("bind"),
            )),
        }
    }

    /// Scheme label, `file` for file targets
    pub fn scheme(&self) -> &'static str {
        match self {
            Endpoint::Tcp(_) => "tcp",
            Endpoint::Udp(_) => "udp",
            Endpoint::Unix(_) => "unix",
            Endpoint::Http { .. } => "http",
            Endpoint::File(_) => "file",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            Endpoint::Udp(addr) => write!(f, "udp://{addr}"),
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Http { addr, path } => write!(f, "http://{addr}{path}"),
            Endpoint::File(target) => write!(f, "{target}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_socket_schemes() {
        assert_eq!(
            Endpoint::parse("tcp://127.0.0.1:9000").unwrap(),
            Endpoint::Tcp("127.0.0.1:9000".into())
        );
        assert_eq!(
            Endpoint::parse("udp://0.0.0.0:53").unwrap(),
            Endpoint::Udp("0.0.0.0:53".into())
        );
        assert_eq!(
            Endpoint::parse("unix:///tmp/flow.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/tmp/flow.sock"))
        );
    }

    #[test]
    fn test_parse_http_path() {
        assert_eq!(
            Endpoint::parse("http://127.0.0.1:18080/v1alpha1").unwrap(),
            Endpoint::Http {
                addr: "127.0.0.1:18080".into(),
                path: "/v1alpha1".into()
            }
        );
        assert_eq!(
            Endpoint::parse("http://127.0.0.1:18080").unwrap(),
            Endpoint::Http {
                addr: "127.0.0.1:18080".into(),
                path: DEFAULT_HTTP_PATH.into()
            }
        );
        assert_eq!(
            Endpoint::parse("http://[::1]:80/ingest").unwrap(),
            Endpoint::Http {
                addr: "[::1]:80".into(),
                path: "/ingest".into()
            }
        );
    }

    #[test]
    fn test_parse_file_targets() {
        assert_eq!(
            Endpoint::parse("STDOUT").unwrap(),
            Endpoint::File(FileTarget::Stdout)
        );
        assert_eq!(
            Endpoint::parse("file:///var/log/flow.out").unwrap(),
            Endpoint::File(FileTarget::Path("/var/log/flow.out".into()))
        );
        assert_eq!(
            Endpoint::parse("/tmp/out.log").unwrap(),
            Endpoint::File(FileTarget::Path("/tmp/out.log".into()))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        assert!(Endpoint::parse("ftp://host").is_err());
        assert!(Endpoint::parse("tcp://").is_err());
        assert!(Endpoint::parse("").is_err());
    }
}
