//! The signed-header reconciliation algorithm: feeds a [`HeaderStore`] from
//! three sources in a fixed order (envelope, inner message, signature
//! directives) and enforces the invariants of spec.md §3 at every step.

use crate::error::{DirectiveKind, InvalidMessage, Result};
use crate::header_store::{is_ignored, name_equals, value_equals, Equality, HeaderStore};

/// `status` of a parsed [`SignatureDirective`] before validation. Kept as a
/// raw integer (rather than an enum) because the caller's ASN.1 layer hands
/// us the `INTEGER` value as-is; validating it is this module's job.
pub type RawStatus = i64;

/// One `(headerName, headerValue, status)` triple from an RFC 7508
/// SecureHeaderFields attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureDirective {
    pub field_name: String,
    pub field_value: String,
    pub status: RawStatus,
}

impl SignatureDirective {
    pub fn new(
        field_name: impl Into<String>,
        field_value: impl Into<String>,
        status: RawStatus,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            field_value: field_value.into(),
            status,
        }
    }
}

/// The full RFC 7508 SecureHeaderFields attribute: an optional
/// canonicalization algorithm plus a set of directives, already decoded by
/// the caller's ASN.1 layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecureHeaderFields {
    /// The ENUMERATED canonicalization algorithm value, if present in the
    /// attribute (`0` = simple, `1` = relaxed). Absent defaults to simple.
    pub canonicalization_algorithm: Option<i64>,
    pub directives: Vec<SignatureDirective>,
}

/// Tracks which imports have run, purely to annotate `tracing` events. The
/// state machine in spec.md §4.2 is advisory: calling imports out of the
/// prescribed order is legal-but-unusual (spec.md §9 Open Question), so this
/// is never used to reject a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Empty,
    EnvelopeLoaded,
    InnerLoaded,
    DirectivesApplied,
}

/// Drives a [`HeaderStore`] through envelope / inner / directive imports.
///
/// Single-shot, single-message, not `Sync` in spirit even though nothing
/// here technically prevents sharing it — see spec.md §5.
pub struct HeaderReconciler {
    store: HeaderStore,
    phase: Phase,
}

impl Default for HeaderReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderReconciler {
    pub fn new() -> Self {
        Self {
            store: HeaderStore::new(),
            phase: Phase::Empty,
        }
    }

    /// Give up ownership of the reconciled store, e.g. to build a
    /// [`crate::view::TrustedMessageView`].
    pub fn into_store(self) -> HeaderStore {
        self.store
    }

    pub fn store(&self) -> &HeaderStore {
        &self.store
    }

    /// Load the untrusted outer envelope headers. Clears the store first, so
    /// this may be skipped (the store already starts empty) but calling it
    /// mid-reconciliation resets everything gathered so far.
    pub fn import_untrusted<N, V, I>(&mut self, headers: I)
    where
        N: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (N, V)>,
    {
        self.store.clear();
        let mut kept = 0usize;
        for (name, value) in headers {
            let name = name.into();
            let value = value.into();
            if is_ignored(&name) {
                continue;
            }
            self.store.append(name, value, false);
            kept += 1;
        }
        tracing::debug!(kept, from_phase = ?self.phase, "imported untrusted envelope headers");
        self.phase = Phase::EnvelopeLoaded;
    }

    /// Inner-message import in strict (byte-identical) compatibility mode.
    ///
    /// Every incoming header must exactly reproduce some existing record's
    /// name and value; any mismatch means the envelope was tampered with.
    pub fn import_trusted_strict<N, V, I>(&mut self, headers: I) -> Result<()>
    where
        N: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (N, V)>,
    {
        for (name, value) in headers {
            let name = name.into();
            let value = value.into();
            if is_ignored(&name) {
                continue;
            }
            let count = self.store.mark_trusted_where(|r| {
                name_equals(&r.name, &name, Equality::Strict)
                    && value_equals(&r.value, &value, Equality::Strict)
            });
            if count == 0 {
                tracing::warn!(header = %name, "strict inner import found no matching envelope record");
                return Err(InvalidMessage::SecuredHeaderMismatch { name });
            }
            tracing::debug!(header = %name, matched = count, "strict inner header trusted");
        }
        tracing::debug!(from_phase = ?self.phase, to_phase = ?Phase::InnerLoaded, "inner message imported (strict)");
        self.phase = Phase::InnerLoaded;
        Ok(())
    }

    /// Inner-message import in relaxed compatibility mode.
    ///
    /// Untrusted envelope copies of a header are dropped and replaced with
    /// the trusted inner value; any already-trusted record of the same name
    /// is left alone. Infallible, but returns `Result` for symmetry with
    /// [`Self::import_trusted_strict`].
    pub fn import_trusted_relaxed<N, V, I>(&mut self, headers: I) -> Result<()>
    where
        N: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (N, V)>,
    {
        for (name, value) in headers {
            let name = name.into();
            let value = value.into();
            if is_ignored(&name) {
                continue;
            }
            let removed = self
                .store
                .remove_where(|r| !r.trusted && name_equals(&r.name, &name, Equality::Relaxed));
            self.store.append(name.clone(), value, true);
            tracing::debug!(header = %name, replaced = removed, "relaxed inner header trusted");
        }
        tracing::debug!(from_phase = ?self.phase, to_phase = ?Phase::InnerLoaded, "inner message imported (relaxed)");
        self.phase = Phase::InnerLoaded;
        Ok(())
    }

    /// Apply an RFC 7508 SecureHeaderFields attribute: resolve the
    /// canonicalization algorithm, then apply each directive in order per
    /// the literal table of spec.md §4.2. A directive naming a header in
    /// [`crate::header_store::IGNORED_NAMES`] is not special-cased: such a
    /// header is never stored, so DUPLICATED/DELETED directives against it
    /// fail `directive_unmatched` like any other unmatched directive, and
    /// MODIFIED directives fail the same way (nothing to remove).
    pub fn import_signature_directives(&mut self, attr: &SecureHeaderFields) -> Result<()> {
        let relaxed = match attr.canonicalization_algorithm {
            None => false,
            Some(0) => false,
            Some(1) => true,
            Some(value) => return Err(InvalidMessage::UnknownAlgorithm { value }),
        };
        let equality = if relaxed {
            Equality::Relaxed
        } else {
            Equality::Strict
        };

        for directive in &attr.directives {
            match directive.status {
                0 => {
                    let count = self.store.mark_trusted_where(|r| {
                        name_equals(&r.name, &directive.field_name, equality)
                            && value_equals(&r.value, &directive.field_value, equality)
                    });
                    if count == 0 {
                        return Err(InvalidMessage::DirectiveUnmatched {
                            status: DirectiveKind::Duplicated,
                            name: directive.field_name.clone(),
                        });
                    }
                }
                1 => {
                    let count = self.store.remove_where(|r| {
                        name_equals(&r.name, &directive.field_name, equality)
                            && value_equals(&r.value, &directive.field_value, equality)
                    });
                    if count == 0 {
                        return Err(InvalidMessage::DirectiveUnmatched {
                            status: DirectiveKind::Deleted,
                            name: directive.field_name.clone(),
                        });
                    }
                }
                2 => {
                    let count = self
                        .store
                        .remove_where(|r| name_equals(&r.name, &directive.field_name, equality));
                    if count == 0 {
                        return Err(InvalidMessage::DirectiveUnmatched {
                            status: DirectiveKind::Modified,
                            name: directive.field_name.clone(),
                        });
                    }
                    self.store.append(
                        directive.field_name.clone(),
                        directive.field_value.clone(),
                        true,
                    );
                }
                other => return Err(InvalidMessage::UnknownFieldStatus { value: other }),
            }
        }

        tracing::debug!(from_phase = ?self.phase, to_phase = ?Phase::DirectivesApplied, directives = attr.directives.len(), "signature directives applied");
        self.phase = Phase::DirectivesApplied;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn import_untrusted_drops_ignored_names() {
        let mut r = HeaderReconciler::new();
        r.import_untrusted(headers(&[
            ("Content-Type", "text/plain"),
            ("From", "a@x"),
            ("received", "by foo"),
        ]));
        assert_eq!(r.store().len(), 1);
        assert_eq!(r.store().find_any("From"), vec!["a@x".to_string()]);
    }

    #[test]
    fn strict_round_trip_marks_all_and_fails_on_none() {
        let mut r = HeaderReconciler::new();
        r.import_untrusted(headers(&[("From", "a@x"), ("To", "b@x"), ("Subject", "hi")]));
        r.import_trusted_strict(headers(&[("From", "a@x"), ("To", "b@x"), ("Subject", "hi")]))
            .unwrap();
        assert_eq!(r.store().find_trusted("Subject"), vec!["hi".to_string()]);
    }

    #[test]
    fn strict_tamper_detection_fails() {
        let mut r = HeaderReconciler::new();
        r.import_untrusted(headers(&[("Subject", "HI")]));
        let err = r.import_trusted_strict(headers(&[("Subject", "hi")])).unwrap_err();
        assert_eq!(
            err,
            InvalidMessage::SecuredHeaderMismatch {
                name: "Subject".to_string()
            }
        );
    }

    #[test]
    fn relaxed_replaces_untrusted_copy() {
        let mut r = HeaderReconciler::new();
        r.import_untrusted(headers(&[("Subject", "  HI   THERE ")]));
        r.import_trusted_relaxed(headers(&[("Subject", "HI THERE")]))
            .unwrap();
        assert_eq!(
            r.store().find_trusted("Subject"),
            vec!["HI THERE".to_string()]
        );
        assert_eq!(r.store().find_any("Subject").len(), 1);
    }

    #[test]
    fn relaxed_preserves_already_trusted_records() {
        let mut r = HeaderReconciler::new();
        r.import_untrusted(headers(&[("Subject", "old")]));
        r.import_trusted_strict(headers(&[("Subject", "old")])).unwrap();
        r.import_trusted_relaxed(headers(&[("Subject", "new")]))
            .unwrap();
        let mut all: Vec<_> = r.store().find_any("Subject");
        all.sort();
        assert_eq!(all, vec!["new".to_string(), "old".to_string()]);
    }

    #[test]
    fn directive_modified_replaces_header() {
        let mut r = HeaderReconciler::new();
        r.import_untrusted(headers(&[
            ("From", "\"A\" <a@x>"),
            ("To", "b@x"),
            ("Subject", "s"),
        ]));
        let attr = SecureHeaderFields {
            canonicalization_algorithm: Some(0),
            directives: vec![SignatureDirective::new("From", "a@x", 2)],
        };
        r.import_signature_directives(&attr).unwrap();
        assert_eq!(r.store().find_trusted("From"), vec!["a@x".to_string()]);
        assert_eq!(r.store().find_any("From").len(), 1);
    }

    #[test]
    fn directive_deleted_removes_header() {
        let mut r = HeaderReconciler::new();
        r.import_untrusted(headers(&[
            ("From", "a@x"),
            ("To", "b@x"),
            ("Subject", "s"),
            ("Bcc", "c@x"),
        ]));
        let attr = SecureHeaderFields {
            canonicalization_algorithm: Some(0),
            directives: vec![SignatureDirective::new("Bcc", "c@x", 1)],
        };
        r.import_signature_directives(&attr).unwrap();
        assert!(r.store().find_any("Bcc").is_empty());
    }

    #[test]
    fn directive_duplicated_marks_trusted() {
        let mut r = HeaderReconciler::new();
        r.import_untrusted(headers(&[("From", "a@x")]));
        let attr = SecureHeaderFields {
            canonicalization_algorithm: Some(0),
            directives: vec![SignatureDirective::new("From", "a@x", 0)],
        };
        r.import_signature_directives(&attr).unwrap();
        assert_eq!(r.store().find_trusted("From"), vec!["a@x".to_string()]);
    }

    #[test]
    fn unknown_algorithm_fails() {
        let mut r = HeaderReconciler::new();
        r.import_untrusted(headers(&[("From", "a@x")]));
        let attr = SecureHeaderFields {
            canonicalization_algorithm: Some(7),
            directives: vec![],
        };
        assert_eq!(
            r.import_signature_directives(&attr).unwrap_err(),
            InvalidMessage::UnknownAlgorithm { value: 7 }
        );
    }

    #[test]
    fn unknown_status_fails() {
        let mut r = HeaderReconciler::new();
        r.import_untrusted(headers(&[("From", "a@x")]));
        let attr = SecureHeaderFields {
            canonicalization_algorithm: None,
            directives: vec![SignatureDirective::new("From", "a@x", 7)],
        };
        assert_eq!(
            r.import_signature_directives(&attr).unwrap_err(),
            InvalidMessage::UnknownFieldStatus { value: 7 }
        );
    }

    #[test]
    fn directive_unmatched_fails_for_each_status() {
        for (status, kind) in [
            (0, DirectiveKind::Duplicated),
            (1, DirectiveKind::Deleted),
            (2, DirectiveKind::Modified),
        ] {
            let mut r = HeaderReconciler::new();
            r.import_untrusted(headers(&[("From", "a@x")]));
            let attr = SecureHeaderFields {
                canonicalization_algorithm: None,
                directives: vec![SignatureDirective::new("Missing", "v", status)],
            };
            assert_eq!(
                r.import_signature_directives(&attr).unwrap_err(),
                InvalidMessage::DirectiveUnmatched {
                    status: kind,
                    name: "Missing".to_string()
                }
            );
        }
    }

    #[test]
    fn directive_on_ignored_name_fails_unmatched_like_any_other() {
        let mut r = HeaderReconciler::new();
        r.import_untrusted(headers(&[("From", "a@x")]));
        let attr = SecureHeaderFields {
            canonicalization_algorithm: None,
            directives: vec![SignatureDirective::new("Content-Type", "text/plain", 1)],
        };
        assert_eq!(
            r.import_signature_directives(&attr).unwrap_err(),
            InvalidMessage::DirectiveUnmatched {
                status: DirectiveKind::Deleted,
                name: "Content-Type".to_string()
            }
        );
    }

    #[test]
    fn directive_with_unknown_status_on_ignored_name_still_fails_unknown_status() {
        let mut r = HeaderReconciler::new();
        r.import_untrusted(headers(&[("From", "a@x")]));
        let attr = SecureHeaderFields {
            canonicalization_algorithm: None,
            directives: vec![SignatureDirective::new("Content-Type", "text/plain", 99)],
        };
        assert_eq!(
            r.import_signature_directives(&attr).unwrap_err(),
            InvalidMessage::UnknownFieldStatus { value: 99 }
        );
    }
}
