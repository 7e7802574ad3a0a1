//! Shard endpoint URI parsing.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// In-process database: memory://db_a
    Memory { name: String },
    /// On-disk database: redb:///var/lib/waypoint/db_a.redb or file://...
    File { path: PathBuf },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),
    #[error("invalid endpoint URI: {0}")]
    InvalidUri(String),
}

impl Endpoint {
    pub fn parse(uri: &str) -> Result<Self, EndpointError> {
        let uri = uri.trim();
        if let Some(name) = uri.strip_prefix("memory://") {
            if name.is_empty() {
                return Err(EndpointError::InvalidUri(uri.to_string()));
            }
            Ok(Endpoint::Memory {
                name: name.to_string(),
            })
        } else if let Some(path) = uri
            .strip_prefix("redb://")
            .or_else(|| uri.strip_prefix("file://"))
        {
            if path.is_empty() {
                return Err(EndpointError::InvalidUri(uri.to_string()));
            }
            Ok(Endpoint::File {
                path: PathBuf::from(path),
            })
        } else if let Some((scheme, _)) = uri.split_once("://") {
            Err(EndpointError::UnsupportedScheme(scheme.to_string()))
        } else {
            Err(EndpointError::InvalidUri(uri.to_string()))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Memory { name } => write!(f, "memory://{name}"),
            Endpoint::File { path } => write!(f, "redb://{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_memory() {
        assert_eq!(
            Endpoint::parse("memory://db_a").unwrap(),
            Endpoint::Memory {
                name: "db_a".to_string()
            }
        );
    }

    #[test]
    fn parse_file_schemes() {
        let redb = Endpoint::parse("redb:///var/lib/waypoint/db_a.redb").unwrap();
        let file = Endpoint::parse("file:///var/lib/waypoint/db_a.redb").unwrap();
        assert_eq!(redb, file);
        assert_eq!(redb.to_string(), "redb:///var/lib/waypoint/db_a.redb");
    }

    #[test]
    fn parse_rejects_unknown_scheme() {
        assert_eq!(
            Endpoint::parse("jdbc:postgresql://postgres_02:5432/db_a"),
            Err(EndpointError::UnsupportedScheme("jdbc:postgresql".to_string()))
        );
        assert!(Endpoint::parse("db_a").is_err());
        assert!(Endpoint::parse("memory://").is_err());
    }
}
