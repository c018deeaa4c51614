//! Engine self-test adapter for [`ConfigValidator`].

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use relayctl_config::{ConfigDocument, ConfigValidator, Rejection, serialize_document};
use relayctl_core::ERROR_REJECTED;
use tracing::{debug, warn};

/// Number of output lines kept in a rejection message.
const REJECTION_TAIL_LINES: usize = 8;

/// Runs `<engine> run -test -config <candidate>` on a staged copy.
#[derive(Debug, Clone)]
pub struct EngineValidator {
    bin: PathBuf,
}

impl EngineValidator {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    fn run_self_test(&self, staged: &Path) -> Result<(), Rejection> {
        let output = Command::new(&self.bin)
            .args(["run", "-test", "-config"])
            .arg(staged)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Rejection::new(format!("cannot run {}: {e}", self.bin.display()))
            })?;

        if output.status.success() {
            debug!(bin = %self.bin.display(), "engine self-test passed");
            return Ok(());
        }

        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stdout));
        let reason = tail(&text, REJECTION_TAIL_LINES);
        warn!(status = ?output.status.code(), kind = ERROR_REJECTED, "engine self-test failed");
        Err(Rejection::new(if reason.is_empty() {
            format!("engine self-test exited with {}", output.status)
        } else {
            reason
        }))
    }
}

impl ConfigValidator for EngineValidator {
    fn validate(&self, candidate: &ConfigDocument) -> Result<(), Rejection> {
        let data = serialize_document(candidate)
            .map_err(|e| Rejection::new(format!("cannot serialize candidate: {e}")))?;

        let mut staged = tempfile::Builder::new()
            .prefix("relayctl-candidate-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| Rejection::new(format!("cannot stage candidate: {e}")))?;
        staged
            .write_all(&data)
            .and_then(|()| staged.flush())
            .map_err(|e| Rejection::new(format!("cannot stage candidate: {e}")))?;

        self.run_self_test(staged.path())
    }
}

fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
