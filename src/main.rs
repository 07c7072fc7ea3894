//! A small demo binary exercising the reconciliation core end-to-end
//! against a toy fixture file, the way `pantosmimed` exercised
//! `smime`/`mime_parser` directly from `main`. Not part of the library's
//! public API surface.

use anyhow::{bail, Context, Result};
use clap::Parser;
use smime_reply_headers::{HeaderReconciler, SecureHeaderFields, SignatureDirective};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "smime-reply-headers-demo")]
#[command(author = "Adrian 'vifino' Pistol <vifino@posteo.net>")]
#[command(about = "Reconcile a toy fixture of envelope/inner/directive headers", long_about = None)]
#[clap(version)]
struct Cli {
    fixture: PathBuf,
}

/// One parsed fixture file: envelope headers, an inner-message import mode
/// plus headers, and an optional set of signature directives.
struct Fixture {
    envelope: Vec<(String, String)>,
    inner: Option<(InnerMode, Vec<(String, String)>)>,
    directives: Option<SecureHeaderFields>,
}

#[derive(Clone, Copy)]
enum InnerMode {
    Strict,
    Relaxed,
}

/// Parse the tiny fixture format:
///
/// ```text
/// [envelope]
/// From: "A" <a@x.com>
///
/// [inner:strict]            # or [inner:relaxed]
/// From: "A" <a@x.com>
///
/// [directives:relaxed]      # or [directives:simple]
/// From|a@x.com|2
/// ```
fn parse_fixture(text: &str) -> Result<Fixture> {
    let mut envelope = Vec::new();
    let mut inner: Option<(InnerMode, Vec<(String, String)>)> = None;
    let mut directives: Option<SecureHeaderFields> = None;
    let mut section: Option<&str> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim_end();
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            section = Some(name);
            if let Some(mode) = name.strip_prefix("inner:") {
                let mode = match mode {
                    "strict" => InnerMode::Strict,
                    "relaxed" => InnerMode::Relaxed,
                    other => bail!("unknown inner mode {other:?}"),
                };
                inner = Some((mode, Vec::new()));
            } else if let Some(alg) = name.strip_prefix("directives:") {
                let canonicalization_algorithm = match alg {
                    "simple" => Some(0),
                    "relaxed" => Some(1),
                    other => bail!("unknown canonicalization {other:?}"),
                };
                directives = Some(SecureHeaderFields {
                    canonicalization_algorithm,
                    directives: Vec::new(),
                });
            }
            continue;
        }

        match section {
            Some("envelope") => {
                let (name, value) = line
                    .split_once(':')
                    .with_context(|| format!("malformed header line: {line:?}"))?;
                envelope.push((name.trim().to_string(), value.trim().to_string()));
            }
            Some(s) if s.starts_with("inner:") => {
                let (name, value) = line
                    .split_once(':')
                    .with_context(|| format!("malformed header line: {line:?}"))?;
                inner
                    .as_mut()
                    .expect("inner section initialized on [inner:*] header")
                    .1
                    .push((name.trim().to_string(), value.trim().to_string()));
            }
            Some(s) if s.starts_with("directives:") => {
                let mut parts = line.splitn(3, '|');
                let name = parts
                    .next()
                    .with_context(|| format!("malformed directive line: {line:?}"))?;
                let value = parts
                    .next()
                    .with_context(|| format!("malformed directive line: {line:?}"))?;
                let status: i64 = parts
                    .next()
                    .with_context(|| format!("malformed directive line: {line:?}"))?
                    .trim()
                    .parse()
                    .with_context(|| format!("malformed directive status: {line:?}"))?;
                directives
                    .as_mut()
                    .expect("directives section initialized on [directives:*] header")
                    .directives
                    .push(SignatureDirective::new(name.trim(), value.trim(), status));
            }
            _ => bail!("header line outside of any section: {line:?}"),
        }
    }

    Ok(Fixture {
        envelope,
        inner,
        directives,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let text = std::fs::read_to_string(&cli.fixture)
        .with_context(|| format!("cannot read fixture {}", cli.fixture.display()))?;
    let fixture = parse_fixture(&text)?;

    let mut reconciler = HeaderReconciler::new();
    reconciler.import_untrusted(fixture.envelope);
    if let Some((mode, headers)) = fixture.inner {
        match mode {
            InnerMode::Strict => reconciler.import_trusted_strict(headers)?,
            InnerMode::Relaxed => reconciler.import_trusted_relaxed(headers)?,
        }
    }
    if let Some(attr) = &fixture.directives {
        reconciler.import_signature_directives(attr)?;
    }

    let view = smime_reply_headers::TrustedMessageView::new(reconciler.into_store());
    let missing = view.missing_required();
    if !missing.is_empty() {
        bail!("message refused, missing required trusted headers: {missing:?}");
    }

    println!("from: {}", view.from()?);
    println!("to: {}", view.to()?);
    println!("subject: {}", view.subject()?);
    if let Some(id) = view.message_id() {
        println!("message-id: {id}");
    }
    for addr in view.reply_to()? {
        println!("reply-to: {addr}");
    }
    println!("auto-submitted: {}", view.is_auto_submitted());

    Ok(())
}
