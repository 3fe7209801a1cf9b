//! Tokenizer for the compact dependency identifier grammar.
//!
//! Every query kind is constructed from a compact textual identifier made of
//! optional, order-fixed segments:
//!
//! - health-style: `[tag.]name[@datacenter][~near][|filter1,filter2,...]`
//! - key-value style: `[key][@datacenter]` (a single leading `/` is trimmed,
//!   a trailing `/` is preserved — it denotes a directory-like prefix)
//!
//! Parsing is anchored: the whole identifier must be consumed, and every
//! segment is validated against its character set, so partial matches fail
//! with [`BeaconError::MalformedIdentifier`]. The empty string is a legal
//! identifier for every kind (the kind decides whether it means "everything"
//! or "no key").
//!
//! The tokenizer is purely grammatical: it splits and validates segments but
//! does not interpret them. Health filter tokens, for example, are returned
//! verbatim and validated against the status vocabulary by the health query
//! constructor.

use crate::core::{BeaconError, Result};

/// Parsed `[key][@datacenter]` identifier for key-value query kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvIdent {
    /// The key or prefix, with at most one leading `/` trimmed.
    pub key: String,
    /// Optional datacenter override.
    pub datacenter: Option<String>,
}

/// Parsed `[tag.]name[@dc][~near][|filters]` identifier for health kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthIdent {
    /// Service name; empty means "all services the endpoint exposes".
    pub name: String,
    /// Optional tag segment (the part before the last `.` in `tag.name`).
    pub tag: Option<String>,
    /// Optional datacenter override.
    pub datacenter: Option<String>,
    /// Optional near-node proximity hint.
    pub near: Option<String>,
    /// Filter tokens, whitespace-trimmed, empties dropped. `None` when the
    /// `|` segment was absent (the caller applies the kind's default).
    pub filters: Option<Vec<String>>,
}

/// Parses a key-value identifier (`[key][@datacenter]`).
///
/// `kind` is the canonical kind tag (e.g. `kv.get`) used in error messages.
///
/// # Errors
///
/// Returns [`BeaconError::MalformedIdentifier`] when a non-empty identifier
/// has an empty key, an empty or malformed datacenter, or stray `@` segments.
pub fn parse_kv(kind: &'static str, s: &str) -> Result<KvIdent> {
    if s.is_empty() {
        return Ok(KvIdent::default());
    }

    let malformed = || BeaconError::MalformedIdentifier { kind, input: s.to_string() };

    let (raw_key, dc) = match s.split_once('@') {
        Some((key, dc)) => (key, Some(dc)),
        None => (s, None),
    };

    // Trim a single leading separator; trailing separators are meaningful.
    let key = raw_key.strip_prefix('/').unwrap_or(raw_key);
    if key.is_empty() {
        return Err(malformed());
    }

    let datacenter = match dc {
        Some(dc) if is_segment(dc, &['.', '-']) => Some(dc.to_string()),
        Some(_) => return Err(malformed()),
        None => None,
    };

    Ok(KvIdent { key: key.to_string(), datacenter })
}

/// Parses a health identifier (`[tag.]name[@dc][~near][|filters]`).
///
/// Segments are stripped right-to-left (filter, near, datacenter, then the
/// tag/name split on the *last* `.`), which together with per-segment
/// character validation enforces the fixed segment order.
///
/// # Errors
///
/// Returns [`BeaconError::MalformedIdentifier`] when any segment violates its
/// character set or an introduced segment is empty.
pub fn parse_health(kind: &'static str, s: &str) -> Result<HealthIdent> {
    if s.is_empty() {
        return Ok(HealthIdent::default());
    }

    let malformed = || BeaconError::MalformedIdentifier { kind, input: s.to_string() };

    let (rest, filter) = match s.split_once('|') {
        Some((rest, filter)) => (rest, Some(filter)),
        None => (s, None),
    };
    let (rest, near) = match rest.split_once('~') {
        Some((rest, near)) => (rest, Some(near)),
        None => (rest, None),
    };
    let (rest, dc) = match rest.split_once('@') {
        Some((rest, dc)) => (rest, Some(dc)),
        None => (rest, None),
    };
    let (tag, name) = match rest.rsplit_once('.') {
        Some((tag, name)) => (Some(tag), name),
        None => (None, rest),
    };

    if !name.is_empty() && !is_segment(name, &['-']) {
        return Err(malformed());
    }
    let tag = match tag {
        Some(tag) if is_segment(tag, &['=', ':', '.', '-']) => Some(tag.to_string()),
        Some(_) => return Err(malformed()),
        None => None,
    };
    let datacenter = match dc {
        Some(dc) if is_segment(dc, &['.', '-']) => Some(dc.to_string()),
        Some(_) => return Err(malformed()),
        None => None,
    };
    let near = match near {
        Some(near) if is_segment(near, &['.', '-']) => Some(near.to_string()),
        Some(_) => return Err(malformed()),
        None => None,
    };
    let filters = match filter {
        Some(filter) if is_segment(filter, &[',', '-', ' ', '\t']) => {
            let tokens: Vec<String> = filter
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect();
            if tokens.is_empty() {
                return Err(malformed());
            }
            Some(tokens)
        }
        Some(_) => return Err(malformed()),
        None => None,
    };

    Ok(HealthIdent {
        name: name.to_string(),
        tag,
        datacenter,
        near,
        filters,
    })
}

/// A segment is non-empty ASCII word characters plus the listed extras.
fn is_segment(s: &str, extra: &[char]) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || extra.contains(&c))
}
