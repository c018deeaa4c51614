//! Configuration file loading and error types.

use std::{fs, path::Path, path::PathBuf};

use relayctl_core::{ERROR_CONFIG, ERROR_IO};
use tracing::{debug, warn};

use crate::document::ConfigDocument;
use crate::types::XrayConfig;
use crate::validator::Rejection;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid port {0} (expected 1-65535)")]
    InvalidPort(i64),
    #[error("no listener tagged '{0}'")]
    ListenerNotFound(String),
    #[error("port {port} is already used by listener '{tag}'")]
    PortInUse { port: u16, tag: String },
    #[error("operation requires a {expected} node, this node is {actual}")]
    RoleMismatch {
        expected: crate::Role,
        actual: crate::Role,
    },
    #[error("configuration {0} is locked by another relayctl process")]
    Busy(PathBuf),
    #[error("{0}")]
    Rejected(#[from] Rejection),
}

/// Read and check the document at `path`.
///
/// A missing file is reported as [`ConfigError::NotConfigured`].
pub fn load_document(path: impl AsRef<Path>) -> Result<ConfigDocument, ConfigError> {
    let path = path.as_ref();
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotConfigured(format!(
                "{} does not exist; run `relayctl setup` first",
                path.display()
            )));
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                kind = ERROR_IO,
                "cannot read configuration"
            );
            return Err(e.into());
        }
    };
    debug!(path = %path.display(), bytes = data.len(), "loading configuration");
    parse_document(&data).inspect_err(|e| {
        warn!(
            path = %path.display(),
            error = %e,
            kind = ERROR_CONFIG,
            "configuration does not load"
        );
    })
}

/// Parse a document from JSON bytes. `//` and `/* */` comments are accepted.
pub fn parse_document(data: &[u8]) -> Result<ConfigDocument, ConfigError> {
    let stripped = json_comments::StripComments::new(data);
    let wire: XrayConfig = serde_json::from_reader(stripped)?;
    ConfigDocument::from_wire(wire)
}

/// Serialize to the pretty-printed JSON written on disk.
pub fn serialize_document(doc: &ConfigDocument) -> Result<Vec<u8>, ConfigError> {
    let mut out = serde_json::to_vec_pretty(&doc.to_wire())?;
    out.push(b'\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{ListenerPorts, build_gateway};

    #[test]
    fn missing_file_is_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_document(dir.path().join("config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotConfigured(_)));
    }

    #[test]
    fn comments_are_stripped() {
        let doc = build_gateway(ListenerPorts::default()).unwrap();
        let json = String::from_utf8(serialize_document(&doc).unwrap()).unwrap();
        let commented = format!("// managed by relayctl\n{json}");
        let parsed = parse_document(commented.as_bytes()).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(
            parse_document(b"{ not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
