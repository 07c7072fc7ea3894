//! Read-only, validating accessors over a reconciled [`HeaderStore`].
//!
//! Every accessor here either returns a value sourced from trusted headers,
//! or fails — there is no path that hands back an attacker-influenced value
//! (spec.md §4.3, §7).

use std::collections::BTreeSet;

use crate::address::{parse_address, Address};
use crate::error::{InvalidMessage, Result};
use crate::header_store::HeaderStore;

/// The fixed set of header names that must carry at least one trusted
/// record once reconciliation finishes (spec.md §3 `RequiredTrustedNames`).
pub const REQUIRED_TRUSTED_NAMES: &[&str] = &["From", "To", "Subject"];

pub struct TrustedMessageView {
    store: HeaderStore,
}

impl TrustedMessageView {
    pub fn new(store: HeaderStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &HeaderStore {
        &self.store
    }

    /// Collect trimmed values of every trusted record named `name`; fail if
    /// there isn't exactly one.
    fn fetch_trusted(&self, name: &str) -> Result<String> {
        let mut values = self.store.find_trusted(name);
        match values.len() {
            0 => Err(InvalidMessage::HeaderMissing {
                name: name.to_string(),
            }),
            1 => Ok(values.remove(0)),
            count => Err(InvalidMessage::HeaderDuplicated {
                name: name.to_string(),
                count,
            }),
        }
    }

    pub fn from(&self) -> Result<Address> {
        let value = self.fetch_trusted("From")?;
        parse_address(&value).map_err(|_| InvalidMessage::InvalidAddress {
            field: "From".to_string(),
        })
    }

    pub fn to(&self) -> Result<Address> {
        let value = self.fetch_trusted("To")?;
        parse_address(&value).map_err(|_| InvalidMessage::InvalidAddress {
            field: "To".to_string(),
        })
    }

    pub fn subject(&self) -> Result<String> {
        self.fetch_trusted("Subject")
    }

    /// Message-ID is informational only: returned regardless of trust.
    pub fn message_id(&self) -> Option<String> {
        self.store.find_any("Message-ID").into_iter().next()
    }

    /// All `Reply-To` values, trust-agnostic; empty if none present.
    pub fn reply_to(&self) -> Result<Vec<Address>> {
        self.store
            .find_any("Reply-To")
            .into_iter()
            .map(|value| {
                parse_address(&value).map_err(|_| InvalidMessage::InvalidAddress {
                    field: "Reply-To".to_string(),
                })
            })
            .collect()
    }

    /// True iff any `Auto-Submitted` record's trimmed, lowercased value is
    /// `auto-generated` or begins with `auto-generated;`.
    pub fn is_auto_submitted(&self) -> bool {
        self.store.find_any("Auto-Submitted").iter().any(|value| {
            let lower = value.trim().to_ascii_lowercase();
            lower == "auto-generated" || lower.starts_with("auto-generated;")
        })
    }

    /// `RequiredTrustedNames` minus the set of uppercased names with at
    /// least one trusted record. Empty means the structural-trust gate
    /// passes; non-empty means the caller must refuse the message.
    pub fn missing_required(&self) -> BTreeSet<String> {
        REQUIRED_TRUSTED_NAMES
            .iter()
            .filter(|name| self.store.find_trusted(name).is_empty())
            .map(|name| name.to_ascii_uppercase())
            .collect()
    }
}
