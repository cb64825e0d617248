//! Parsing of the textual `"host service"` addresses used by dial and listen.

use crate::error::{Result, TransportError};

/// Longest address string accepted by [`parse_target`] and [`parse_service`].
pub const MAX_ADDRESS_LEN: usize = 1024;

/// A dial target split into host and service (port number or service name).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    pub host: &'a str,
    pub service: &'a str,
}

impl std::fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.host, self.service)
    }
}

/// Split `"host service"` into its two tokens.
///
/// Tokens are separated by one or more spaces; leading and trailing spaces are
/// ignored and an embedded NUL ends the string (text coming from fixed-size
/// foreign buffers is often NUL-terminated).
pub fn parse_target(input: &str) -> Result<Target<'_>> {
    check_len(input)?;
    let mut tokens = tokens(input);
    let host = tokens
        .next()
        .ok_or_else(|| TransportError::address_format(input, "missing host"))?;
    let service = tokens
        .next()
        .ok_or_else(|| TransportError::address_format(input, "missing service"))?;
    if tokens.next().is_some() {
        return Err(TransportError::address_format(
            input,
            "expected exactly two tokens \"host service\"",
        ));
    }
    Ok(Target { host, service })
}

/// Extract the single service token used by listen.
pub fn parse_service(input: &str) -> Result<&str> {
    check_len(input)?;
    let mut tokens = tokens(input);
    let service = tokens
        .next()
        .ok_or_else(|| TransportError::address_format(input, "missing service"))?;
    if tokens.next().is_some() {
        return Err(TransportError::address_format(
            input,
            "expected a single service token",
        ));
    }
    Ok(service)
}

fn check_len(input: &str) -> Result<()> {
    if input.len() > MAX_ADDRESS_LEN {
        return Err(TransportError::address_format(input, "address too long"));
    }
    Ok(())
}

fn tokens(input: &str) -> impl Iterator<Item = &str> {
    let end = input.find('\0').unwrap_or(input.len());
    input[..end].split(' ').filter(|token| !token.is_empty())
}
