// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Store endpoint parsing.
//!
//! An endpoint is `ipv4:port` or `hostname:port`:
//!
//! - IPv4 octets are decimal 0-255 without leading zeros.
//! - Hostname labels are ASCII alphanumerics with internal hyphens. The last
//!   label must start with a letter, so an all-numeric dotted string is always
//!   judged as an IPv4 address (`256.1.1.1` is rejected, not taken as a host).
//! - The port is 1-5 digits in 0-65535.
//!
//! The literal `none` is accepted by [`Endpoint::parse_optional`] to mean
//! "no target configured".

use crate::error::{KeySyncError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel for an unset target endpoint.
pub const NO_ENDPOINT: &str = "none";

/// A validated `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Parse and validate a raw `host:port` string.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| KeySyncError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = raw
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;

        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        let port = parse_port(port).ok_or_else(|| invalid("port must be 0-65535"))?;

        if !(is_ipv4(host) || is_hostname(host)) {
            return Err(invalid("host is neither an IPv4 address nor a hostname"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Parse an endpoint that may be the `none` sentinel.
    pub fn parse_optional(raw: &str) -> Result<Option<Self>> {
        if raw.trim().eq_ignore_ascii_case(NO_ENDPOINT) {
            return Ok(None);
        }
        Self::parse(raw).map(Some)
    }

    /// The default local endpoint, `localhost:6379`.
    pub fn localhost() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connection URL for the redis client (database 0).
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/0", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = KeySyncError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = KeySyncError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    if raw.is_empty() || raw.len() > 5 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // No zero padding: "080" and "00080" are rejected, "0" is fine
    if raw.len() > 1 && raw.starts_with('0') {
        return None;
    }
    raw.parse::<u16>().ok()
}

fn is_ipv4(host: &str) -> bool {
    let octets: Vec<&str> = host.split('.').collect();
    octets.len() == 4 && octets.iter().all(|o| is_octet(o))
}

fn is_octet(raw: &str) -> bool {
    if raw.is_empty() || raw.len() > 3 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if raw.len() > 1 && raw.starts_with('0') {
        return false;
    }
    raw.parse::<u16>().map(|v| v <= 255).unwrap_or(false)
}

fn is_hostname(host: &str) -> bool {
    let labels: Vec<&str> = host.split('.').collect();
    let Some((last, rest)) = labels.split_last() else {
        return false;
    };
    rest.iter().all(|l| is_label(l))
        && is_label(last)
        && last.starts_with(|c: char| c.is_ascii_alphabetic())
}

fn is_label(label: &str) -> bool {
    !label.is_empty()
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}
