//! Account operations over a [`ConfigDocument`].
//!
//! The document stores each account once; serialization projects it into
//! the relay-cipher, http and socks listener lists, so every operation here
//! updates all three or none.

use relayctl_config::{Account, ConfigDocument, ListenerProtocol};
use relayctl_core::{DEFAULT_CIPHER_METHOD, DEFAULT_SECRET_LEN, ERROR_INPUT, generate_secret};
use tracing::{debug, warn};

use crate::error::AccountError;

/// Longest accepted identifier.
pub const MAX_IDENTIFIER_LEN: usize = 64;

fn ensure_configured(doc: &ConfigDocument) -> Result<(), AccountError> {
    match doc.account_listener(ListenerProtocol::RelayCipher) {
        Some(_) => Ok(()),
        None => Err(AccountError::NotConfigured(
            "no relay-cipher listener with an account list".into(),
        )),
    }
}

/// Check an identifier before it is used as a key.
pub fn check_identifier(identifier: &str) -> Result<(), AccountError> {
    let reason = if identifier.is_empty() {
        Some("identifier must not be empty")
    } else if identifier.chars().count() > MAX_IDENTIFIER_LEN {
        Some("identifier is too long")
    } else if identifier.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Some("identifier must not contain whitespace")
    } else if identifier.contains('"') {
        Some("identifier must not contain '\"'")
    } else {
        None
    };
    match reason {
        Some(reason) => {
            warn!(identifier, reason, kind = ERROR_INPUT, "rejected identifier");
            Err(AccountError::InvalidInput(reason.to_string()))
        }
        None => Ok(()),
    }
}

/// Accounts in insertion order.
pub fn list(doc: &ConfigDocument) -> Result<&[Account], AccountError> {
    ensure_configured(doc)?;
    Ok(&doc.accounts)
}

pub fn get<'a>(doc: &'a ConfigDocument, identifier: &str) -> Result<&'a Account, AccountError> {
    ensure_configured(doc)?;
    doc.account(identifier)
        .ok_or_else(|| AccountError::AccountNotFound(identifier.to_string()))
}

/// Append a new account. A secret is generated when none is given.
pub fn add(
    doc: &mut ConfigDocument,
    identifier: &str,
    secret: Option<&str>,
) -> Result<Account, AccountError> {
    ensure_configured(doc)?;
    check_identifier(identifier)?;
    if doc.account(identifier).is_some() {
        return Err(AccountError::DuplicateAccount(identifier.to_string()));
    }
    let secret = match secret {
        Some("") => {
            return Err(AccountError::InvalidInput(
                "secret must not be empty".into(),
            ));
        }
        Some(s) => s.to_string(),
        None => generate_secret(DEFAULT_SECRET_LEN),
    };

    let account = Account {
        identifier: identifier.to_string(),
        secret,
        method: DEFAULT_CIPHER_METHOD.to_string(),
    };
    doc.accounts.push(account.clone());
    debug!(identifier, total = doc.accounts.len(), "account added");
    Ok(account)
}

/// Remove an account. Removing the last one is allowed.
pub fn remove(doc: &mut ConfigDocument, identifier: &str) -> Result<Account, AccountError> {
    ensure_configured(doc)?;
    let idx = doc
        .accounts
        .iter()
        .position(|a| a.identifier == identifier)
        .ok_or_else(|| AccountError::AccountNotFound(identifier.to_string()))?;
    let removed = doc.accounts.remove(idx);
    debug!(identifier, remaining = doc.accounts.len(), "account removed");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use relayctl_config::{ListenerPorts, build_gateway};

    use super::*;

    fn doc() -> ConfigDocument {
        build_gateway(ListenerPorts::default()).unwrap()
    }

    #[test]
    fn add_generates_secret() {
        let mut d = doc();
        let a = add(&mut d, "alice", None).unwrap();
        assert!(a.secret.len() >= 16);
        assert_eq!(list(&d).unwrap().len(), 2);
        assert_eq!(get(&d, "alice").unwrap().secret, a.secret);
    }

    #[test]
    fn add_keeps_supplied_secret() {
        let mut d = doc();
        add(&mut d, "bob", Some("hunter2-hunter2")).unwrap();
        assert_eq!(get(&d, "bob").unwrap().secret, "hunter2-hunter2");
    }

    #[test]
    fn duplicate_is_rejected_without_change() {
        let mut d = doc();
        add(&mut d, "alice", None).unwrap();
        let before = d.clone();
        assert!(matches!(
            add(&mut d, "alice", None),
            Err(AccountError::DuplicateAccount(_))
        ));
        assert_eq!(d, before);
    }

    #[test]
    fn identifiers_are_case_sensitive() {
        let mut d = doc();
        add(&mut d, "alice", None).unwrap();
        add(&mut d, "Alice", None).unwrap();
        assert_eq!(d.accounts.len(), 3);
    }

    #[test]
    fn bad_identifiers() {
        let mut d = doc();
        for bad in ["", "has space", "tab\there", "quo\"te"] {
            assert!(
                matches!(add(&mut d, bad, None), Err(AccountError::InvalidInput(_))),
                "{bad:?}"
            );
        }
        let long = "x".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(add(&mut d, &long, None).is_err());
        assert!(matches!(
            add(&mut d, "ok", Some("")),
            Err(AccountError::InvalidInput(_))
        ));
        assert_eq!(d.accounts.len(), 1);
    }

    #[test]
    fn remove_missing() {
        let mut d = doc();
        assert!(matches!(
            remove(&mut d, "ghost"),
            Err(AccountError::AccountNotFound(_))
        ));
    }

    #[test]
    fn last_account_can_be_removed() {
        let mut d = doc();
        let seed = d.accounts[0].identifier.clone();
        remove(&mut d, &seed).unwrap();
        assert!(list(&d).unwrap().is_empty());
    }

    #[test]
    fn missing_relay_listener_is_not_configured() {
        let mut d = doc();
        d.listeners
            .retain(|l| l.protocol != ListenerProtocol::RelayCipher);
        assert!(matches!(list(&d), Err(AccountError::NotConfigured(_))));
        assert!(matches!(
            add(&mut d, "alice", None),
            Err(AccountError::NotConfigured(_))
        ));
    }
}
