//! Client IP allow/deny filtering.
//!
//! Runs before authentication: a forbidden address gets 403 no matter what
//! credentials it presents. Entries are exact addresses or v4 CIDR blocks.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IpFilterConfig {
    /// When non-empty, only matching addresses are admitted.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Matching addresses are rejected, evaluated before the allow list.
    #[serde(default)]
    pub deny: Vec<String>,
}

impl IpFilterConfig {
    pub fn validate(&self) -> Result<(), String> {
        for entry in self.allow.iter().chain(self.deny.iter()) {
            parse_entry(entry).ok_or_else(|| format!("invalid IP filter entry: '{}'", entry))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Exact(IpAddr),
    Cidr { net: u32, bits: u8 },
}

/// Compiled filter, built once per route at load.
#[derive(Debug, Clone)]
pub struct IpFilter {
    allow: Vec<Entry>,
    deny: Vec<Entry>,
}

impl IpFilter {
    pub fn new(config: &IpFilterConfig) -> Result<Self, String> {
        config.validate()?;
        let compile = |raw: &Vec<String>| -> Vec<Entry> {
            raw.iter().filter_map(|e| parse_entry(e)).collect()
        };
        Ok(Self {
            allow: compile(&config.allow),
            deny: compile(&config.deny),
        })
    }

    /// True when the address may proceed.
    pub fn permits(&self, addr: &str) -> bool {
        let Ok(ip) = addr.parse::<IpAddr>() else {
            // Unparseable peer addresses only pass a wide-open filter.
            return self.allow.is_empty() && self.deny.is_empty();
        };
        if self.deny.iter().any(|e| matches(e, &ip)) {
            return false;
        }
        if self.allow.is_empty() {
            return true;
        }
        self.allow.iter().any(|e| matches(e, &ip))
    }
}

fn parse_entry(raw: &str) -> Option<Entry> {
    if let Some((addr, bits)) = raw.split_once('/') {
        let v4: Ipv4Addr = addr.parse().ok()?;
        let bits: u8 = bits.parse().ok()?;
        if bits > 32 {
            return None;
        }
        let mask = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };
        return Some(Entry::Cidr {
            net: u32::from(v4) & mask,
            bits,
        });
    }
    raw.parse::<IpAddr>().ok().map(Entry::Exact)
}

fn matches(entry: &Entry, ip: &IpAddr) -> bool {
    match (entry, ip) {
        (Entry::Exact(e), ip) => e == ip,
        (Entry::Cidr { net, bits }, IpAddr::V4(v4)) => {
            let mask = if *bits == 0 {
                0
            } else {
                u32::MAX << (32 - *bits)
            };
            (u32::from(*v4) & mask) == *net
        }
        (Entry::Cidr { .. }, IpAddr::V6(_)) => false,
    }
}
