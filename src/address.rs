//! A narrow RFC 5322 address parser covering just `addr-spec` and the
//! single-mailbox `"display name" <addr-spec>` form used by `From`/`To`.
//!
//! This is not a general mail-address parser: no groups, no comments, no
//! obsolete routing. It exists only so [`crate::view::TrustedMessageView`]
//! can satisfy its own `invalid_address` contract (spec.md §4.3, §7); see
//! SPEC_FULL.md §4.4. Written in the teacher's `mime_parser.rs` combinator
//! style (hand-rolled `nom`, `take_while1`/`tag`/`alt`).

use nom::{
    bytes::complete::{tag, take_while1},
    IResult,
};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub display_name: Option<String>,
    pub local_part: String,
    pub domain: String,
}

impl Address {
    pub fn addr_spec(&self) -> String {
        format!("{}@{}", self.local_part, self.domain)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "\"{}\" <{}>", name, self.addr_spec()),
            None => write!(f, "{}", self.addr_spec()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressParseError;

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("not a valid Internet mail address")
    }
}

impl std::error::Error for AddressParseError {}

fn is_local_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~.".contains(c)
}

fn is_domain_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.'
}

fn addr_spec(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, local) = take_while1(is_local_char)(input)?;
    let (input, _) = tag("@")(input)?;
    let (input, domain) = take_while1(is_domain_char)(input)?;
    Ok((input, (local, domain)))
}

fn valid_local(local: &str) -> bool {
    !local.is_empty()
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..")
}

fn valid_domain(domain: &str) -> bool {
    domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.starts_with('-')
        && !domain.ends_with('-')
        && !domain.contains("..")
}

fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        raw[1..raw.len() - 1].to_string()
    } else {
        raw.to_string()
    }
}

fn parse_bare_addr_spec(input: &str) -> Result<(String, String), AddressParseError> {
    let (rest, (local, domain)) = addr_spec(input).map_err(|_| AddressParseError)?;
    if !rest.is_empty() || !valid_local(local) || !valid_domain(domain) {
        return Err(AddressParseError);
    }
    Ok((local.to_string(), domain.to_string()))
}

/// Parse a single mailbox: either a bare `addr-spec` or
/// `[display-name] "<" addr-spec ">"`. A bare display name with no angle
/// brackets is rejected, since it carries no address to trust.
pub fn parse_address(input: &str) -> Result<Address, AddressParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AddressParseError);
    }

    if let Some(open) = trimmed.find('<') {
        if !trimmed.ends_with('>') {
            return Err(AddressParseError);
        }
        let display_raw = trimmed[..open].trim();
        let inner = &trimmed[open + 1..trimmed.len() - 1];
        let (local, domain) = parse_bare_addr_spec(inner)?;
        let display_name = if display_raw.is_empty() {
            None
        } else {
            Some(unquote(display_raw))
        };
        Ok(Address {
            display_name,
            local_part: local,
            domain,
        })
    } else {
        let (local, domain) = parse_bare_addr_spec(trimmed)?;
        Ok(Address {
            display_name: None,
            local_part: local,
            domain,
        })
    }
}
