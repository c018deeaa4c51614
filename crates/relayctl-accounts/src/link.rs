//! Client share links.
//!
//! Format: `ss://<base64url(method:secret)>@<host>:<port>#<label>`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use relayctl_config::{Account, ConfigDocument, ListenerProtocol};
use relayctl_core::{LOOPBACK_BIND, is_valid_address};

use crate::error::AccountError;
use crate::registry;

/// Render the link for `account` reachable at `host:port`.
pub fn share_link(account: &Account, host: &str, port: u16) -> String {
    let userinfo = URL_SAFE_NO_PAD.encode(format!("{}:{}", account.method, account.secret));
    format!(
        "ss://{userinfo}@{host}:{port}#{}",
        encode_fragment(&account.identifier)
    )
}

/// Link for `identifier` on this node's relay-cipher listener.
///
/// `hosts` are candidate public addresses in preference order; the first
/// non-loopback one is used.
pub fn share_link_for(
    doc: &ConfigDocument,
    identifier: &str,
    hosts: &[String],
) -> Result<String, AccountError> {
    let account = registry::get(doc, identifier)?;
    let port = doc
        .account_listener(ListenerProtocol::RelayCipher)
        .map(|l| l.port)
        .ok_or_else(|| AccountError::NotConfigured("no relay-cipher listener".into()))?;
    let host = pick_host(hosts)?;
    Ok(share_link(account, host, port))
}

fn pick_host(hosts: &[String]) -> Result<&str, AccountError> {
    let usable = |h: &&String| is_valid_address(h) && !is_loopback(h);
    hosts
        .iter()
        .find(usable)
        .map(String::as_str)
        .ok_or_else(|| {
            AccountError::InvalidInput(
                "no public host given; pass --host with this node's address".into(),
            )
        })
}

fn is_loopback(host: &str) -> bool {
    host == "localhost" || host == LOOPBACK_BIND || host.starts_with("127.")
}

/// Percent-encode everything outside the URI unreserved set.
fn encode_fragment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
