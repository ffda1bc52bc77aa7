//! Centralized validation functions for allowsync.
//!
//! This module provides unified validation for:
//! - IP addresses and CIDR ranges received from the allow-list API
//! - ipset set names
//! - API endpoint URLs

use anyhow::{bail, Result};
use ipnet::IpNet;
use std::net::IpAddr;

use crate::document::{Family, STAGING_SUFFIX};

/// Kernel limit for ipset names (IPSET_MAXNAMELEN minus the NUL byte).
const IPSET_MAX_NAME_LEN: usize = 31;

/// Longest table name whose staging name still fits the kernel limit.
pub const MAX_TABLE_NAME_LEN: usize = IPSET_MAX_NAME_LEN - STAGING_SUFFIX.len();

/// Validate an IP address or CIDR string and return the parsed IpNet.
///
/// If the input is a plain IP address (without /prefix), it will be converted
/// to a /32 (IPv4) or /128 (IPv6) network.
///
/// # Examples
/// ```
/// use allowsync::validation::validate_ip_or_cidr;
/// assert!(validate_ip_or_cidr("192.168.1.1").is_ok());
/// assert!(validate_ip_or_cidr("192.168.0.0/24").is_ok());
/// assert!(validate_ip_or_cidr("invalid").is_err());
/// ```
pub fn validate_ip_or_cidr(ip_str: &str) -> Result<IpNet> {
    if ip_str.contains('/') {
        ip_str
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid CIDR: {}", ip_str))
    } else {
        let ip: IpAddr = ip_str
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid IP address: {}", ip_str))?;
        Ok(IpNet::from(ip))
    }
}

/// Validate one member entry and bring it into canonical set-member form.
///
/// Bare addresses gain the host prefix of `family` (`/32` or `/128`).
/// Entries that already carry a prefix are returned exactly as given
/// (after trimming surrounding whitespace), host bits included.
///
/// # Examples
/// ```
/// use allowsync::document::Family;
/// use allowsync::validation::normalize_member;
/// assert_eq!(normalize_member("10.0.0.1", Family::Inet).unwrap(), "10.0.0.1/32");
/// assert_eq!(normalize_member("10.0.0.0/24", Family::Inet).unwrap(), "10.0.0.0/24");
/// assert!(normalize_member("2001:db8::1", Family::Inet).is_err());
/// ```
pub fn normalize_member(entry: &str, family: Family) -> Result<String> {
    let trimmed = entry.trim();
    if trimmed.is_empty() {
        bail!("Empty member entry");
    }

    let net = validate_ip_or_cidr(trimmed)?;
    if !family.matches(&net) {
        bail!("{} does not belong to family {}", trimmed, family);
    }

    if trimmed.contains('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}/{}", trimmed, family.host_prefix()))
    }
}

/// Validate an ipset table name.
///
/// Names end up as arguments of `ipset` and inside restore documents, so
/// only `[A-Za-z0-9_.-]` is accepted, and the name must leave room for the
/// staging suffix.
///
/// # Examples
/// ```
/// use allowsync::validation::validate_set_name;
/// assert!(validate_set_name("allow_smtp").is_ok());
/// assert!(validate_set_name("allow smtp").is_err());
/// ```
pub fn validate_set_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Table name cannot be empty");
    }

    if name.len() > MAX_TABLE_NAME_LEN {
        bail!(
            "Table name '{}' is too long ({} chars, max {})",
            name,
            name.len(),
            MAX_TABLE_NAME_LEN
        );
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        bail!(
            "Invalid table name '{}': character {:?} not allowed (use A-Z, a-z, 0-9, '_', '.', '-')",
            name.escape_debug(),
            c
        );
    }

    Ok(())
}

/// Validate an API endpoint URL.
///
/// Only `http://` and `https://` are accepted. Returns `true` when the URL
/// is plain HTTP so callers can warn about it.
pub fn validate_url(url: &str) -> Result<bool> {
    if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        bail!("URL contains whitespace or control characters: {:?}", url);
    }

    if let Some(rest) = url.strip_prefix("https://") {
        if rest.is_empty() {
            bail!("URL has no host: {}", url);
        }
        Ok(false)
    } else if let Some(rest) = url.strip_prefix("http://") {
        if rest.is_empty() {
            bail!("URL has no host: {}", url);
        }
        Ok(true)
    } else {
        bail!("URL must use http:// or https://: {}", url)
    }
}
