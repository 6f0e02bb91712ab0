use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a registered domain, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainId(pub Uuid);

impl DomainId {
    /// Create a new DomainId using UUID v7 (time-sortable, guaranteed ordering).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a DomainId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for DomainId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DomainId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Deterministic identifier derived from a normalized domain name.
///
/// All agent and knowledge-base records are indexed by this key, never by
/// client-supplied URLs, so `https://www.example.com/` and `example.com`
/// converge on the same records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainKey(String);

impl DomainKey {
    /// Derive the key for a normalized domain name: the first 16 hex
    /// characters of its SHA-256 digest.
    ///
    /// The input must already be normalized (see [`normalize_domain`]);
    /// deriving from raw user input would reintroduce URL-variant duplicates.
    pub fn derive(normalized_domain: &str) -> Self {
        let digest = Sha256::digest(normalized_domain.as_bytes());
        let mut key = String::with_capacity(16);
        for byte in &digest[..8] {
            key.push_str(&format!("{byte:02x}"));
        }
        Self(key)
    }

    /// Wrap an already-derived key (e.g. read back from storage).
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered tenant domain.
///
/// Created once via explicit registration, immutable thereafter, and never
/// deleted in normal operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    /// Normalized domain name (lowercase, no scheme, no `www.` prefix).
    pub domain_name: String,
    pub created_at: DateTime<Utc>,
}

impl Domain {
    /// Create a Domain from an already-normalized name.
    pub fn new(domain_name: impl Into<String>) -> Self {
        Self {
            id: DomainId::new(),
            domain_name: domain_name.into(),
            created_at: Utc::now(),
        }
    }

    /// The key under which this domain's agent records are indexed.
    pub fn key(&self) -> DomainKey {
        DomainKey::derive(&self.domain_name)
    }
}

/// Normalize a human-supplied domain name or URL to its canonical form.
///
/// Rules:
/// - Lowercase
/// - Strip one leading `http://` or `https://` scheme
/// - Strip everything after the first `/`, `?`, or `#`
/// - Strip a trailing `:port`
/// - Strip one leading `www.` label
/// - Trim a trailing dot
///
/// Returns `None` when the result is not a plausible registrable name:
/// empty, missing a dot, containing empty labels, or containing characters
/// outside `[a-z0-9.-]`.
///
/// # Examples
///
/// ```
/// use agentry_types::domain::normalize_domain;
///
/// assert_eq!(normalize_domain("https://www.Example.com/docs"), Some("example.com".to_string()));
/// assert_eq!(normalize_domain("example.com"), Some("example.com".to_string()));
/// assert_eq!(normalize_domain("sub.example.co.uk:8443"), Some("sub.example.co.uk".to_string()));
/// assert_eq!(normalize_domain("not a domain"), None);
/// ```
pub fn normalize_domain(input: &str) -> Option<String> {
    let mut name = input.trim().to_lowercase();

    for scheme in ["https://", "http://"] {
        if let Some(rest) = name.strip_prefix(scheme) {
            name = rest.to_string();
            break;
        }
    }

    if let Some(idx) = name.find(['/', '?', '#']) {
        name.truncate(idx);
    }

    if let Some(idx) = name.rfind(':') {
        if name[idx + 1..].chars().all(|c| c.is_ascii_digit()) {
            name.truncate(idx);
        }
    }

    if let Some(rest) = name.strip_prefix("www.") {
        name = rest.to_string();
    }

    if let Some(rest) = name.strip_suffix('.') {
        name = rest.to_string();
    }

    if name.is_empty() || !name.contains('.') {
        return None;
    }
    if name.split('.').any(|label| label.is_empty()) {
        return None;
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return None;
    }

    Some(name)
}
