//! Canonical ipset restore documents.
//!
//! A [`CommandDocument`] is the exact text fed to `ipset restore`: one
//! `create` line for the staging set followed by one `add` line per member.
//! It doubles as the change-detection fingerprint persisted between runs,
//! so building it must be a pure function of its inputs.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::validation::{normalize_member, validate_set_name};

/// Suffix appended to a table name to form its staging set name.
pub const STAGING_SUFFIX: &str = "_tmp";

pub const DEFAULT_HASHSIZE: u32 = 1024;
pub const DEFAULT_MAXELEM: u32 = 65536;

/// Address family of an ipset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// IPv4 (`family inet`)
    #[default]
    Inet,
    /// IPv6 (`family inet6`)
    Inet6,
}

impl Family {
    /// Keyword used on the `create` line.
    pub fn keyword(self) -> &'static str {
        match self {
            Family::Inet => "inet",
            Family::Inet6 => "inet6",
        }
    }

    /// Prefix length of a single host in this family.
    pub fn host_prefix(self) -> u8 {
        match self {
            Family::Inet => 32,
            Family::Inet6 => 128,
        }
    }

    /// Whether `net` can be stored in a set of this family.
    pub fn matches(self, net: &IpNet) -> bool {
        matches!(
            (self, net),
            (Family::Inet, IpNet::V4(_)) | (Family::Inet6, IpNet::V6(_))
        )
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A target ipset and the parameters used when creating its staging copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Live set name, referenced by firewall rules. Stable across runs.
    pub name: String,
    /// Initial hash bucket count
    pub hashsize: u32,
    /// Maximum number of elements
    pub maxelem: u32,
    pub family: Family,
    /// Accept an empty member list instead of refusing to wipe the set
    pub allow_empty: bool,
}

impl TableSpec {
    /// Create a spec with default sizing (hashsize 1024, maxelem 65536, inet).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hashsize: DEFAULT_HASHSIZE,
            maxelem: DEFAULT_MAXELEM,
            family: Family::Inet,
            allow_empty: false,
        }
    }

    pub fn with_sizing(mut self, hashsize: u32, maxelem: u32) -> Self {
        self.hashsize = hashsize;
        self.maxelem = maxelem;
        self
    }

    pub fn with_family(mut self, family: Family) -> Self {
        self.family = family;
        self
    }

    pub fn with_allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }

    /// Name of the set that is built fresh and then swapped in.
    pub fn staging_name(&self) -> String {
        format!("{}{}", self.name, STAGING_SUFFIX)
    }

    /// Check the name and sizing parameters.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_set_name(&self.name)?;
        if self.hashsize == 0 {
            anyhow::bail!("Table '{}': hashsize must be greater than 0", self.name);
        }
        if self.maxelem == 0 {
            anyhow::bail!("Table '{}': maxelem must be greater than 0", self.name);
        }
        Ok(())
    }
}

/// An entry dropped during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub entry: String,
    pub reason: String,
}

/// Validated, normalized set members in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberList {
    members: Vec<String>,
    rejected: Vec<RejectedEntry>,
}

impl MemberList {
    /// Normalize raw entries for a set of `family`.
    ///
    /// Order is preserved and duplicates are kept; the kernel folds them on
    /// load. Invalid entries are collected in [`MemberList::rejected`].
    pub fn normalize<S: AsRef<str>>(raw: &[S], family: Family) -> Self {
        let mut members = Vec::with_capacity(raw.len());
        let mut rejected = Vec::new();

        for entry in raw {
            let entry = entry.as_ref();
            match normalize_member(entry, family) {
                Ok(member) => members.push(member),
                Err(e) => rejected.push(RejectedEntry {
                    entry: entry.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        Self { members, rejected }
    }

    /// Normalize and log every rejected entry against `table`.
    pub fn normalize_for(spec: &TableSpec, raw: &[String]) -> Self {
        let list = Self::normalize(raw, spec.family);
        for rejected in &list.rejected {
            warn!(
                table = %spec.name,
                entry = %rejected.entry.escape_debug(),
                "Skipping invalid member: {}",
                rejected.reason
            );
        }
        list
    }

    pub fn as_slice(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn rejected(&self) -> &[RejectedEntry] {
        &self.rejected
    }
}

/// Restore document for one table: `create` + `add` lines, `\n`-joined,
/// no trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDocument(String);

impl CommandDocument {
    pub fn build(spec: &TableSpec, members: &MemberList) -> Self {
        let staging = spec.staging_name();

        let mut lines = Vec::with_capacity(members.len() + 1);
        lines.push(format!(
            "create {} hash:ip family {} hashsize {} maxelem {}",
            staging, spec.family, spec.hashsize, spec.maxelem
        ));
        for member in members.as_slice() {
            lines.push(format!("add {} {}", staging, member));
        }

        Self(lines.join("\n"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Byte-for-byte comparison against previously persisted content.
    pub fn matches(&self, persisted: &[u8]) -> bool {
        self.as_bytes() == persisted
    }
}

impl fmt::Display for CommandDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
