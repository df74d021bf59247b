//! Identifier anonymization
//!
//! Replayed data must not be traceable to the host it was captured on.
//! Transient identifiers are rewritten in two ways:
//!
//! - numeric addresses are mapped to random replacements, lazily and stably
//!   for the lifetime of the [`Anonymizer`];
//! - identifier fragments embedded in strings (process names, cgroup paths,
//!   pod and container IDs) are overwritten with a short per-run session
//!   prefix, so related fields stay textually linked after substitution.
//!
//! Fixed-width IPv6 byte addresses are passed through untouched.
//!
//! The random source is seeded once (from the clock unless a seed is given)
//! and is not cryptographic.

mod cgroup;

pub use cgroup::CgroupIds;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::trace;

/// Length of the session prefix
pub const SESSION_PREFIX_LEN: usize = 6;

/// How many leading characters of a needle are searched for
pub const NEEDLE_PREFIX_LEN: usize = 6;

/// Width of the kernel `comm` field
pub const COMM_LEN: usize = 16;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Per-run anonymization state
#[derive(Debug)]
pub struct Anonymizer {
    rng: StdRng,
    numeric: HashMap<u32, u32>,
    session_prefix: String,
}

impl Anonymizer {
    /// Seed from the wall clock
    pub fn new() -> Self {
        let seed = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Self::with_seed(seed as u64)
    }

    /// Seed explicitly, for reproducible runs
    pub fn with_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let session_prefix = (0..SESSION_PREFIX_LEN)
            .map(|_| HEX_DIGITS[rng.random_range(0..HEX_DIGITS.len())] as char)
            .collect();
        Self {
            rng,
            numeric: HashMap::new(),
            session_prefix,
        }
    }

    /// Seed from `seed` when given, else from the clock
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map(Self::with_seed).unwrap_or_default()
    }

    /// The per-run substitution string
    pub fn session_prefix(&self) -> &str {
        &self.session_prefix
    }

    /// Number of numeric identifiers seen so far
    pub fn mapped_count(&self) -> usize {
        self.numeric.len()
    }

    /// Replace a numeric identifier (typically an IPv4 address).
    ///
    /// The first sighting draws a random replacement; later calls with the
    /// same value return it unchanged.
    pub fn anonymize_numeric(&mut self, original: u32) -> u32 {
        let rng = &mut self.rng;
        *self.numeric.entry(original).or_insert_with(|| {
            let replacement = rng.random::<u32>();
            trace!("anonymized {} -> {}", original, replacement);
            replacement
        })
    }

    /// Overwrite the first occurrence of `needle`'s leading fragment in
    /// `composite` with the session prefix.
    pub fn anonymize_substring(&self, composite: &str, needle: &str) -> String {
        substitute_fragment(composite, needle, &self.session_prefix)
    }

    /// Substitute the pod UID and container ID fragments of a cgroup path
    pub fn anonymize_cgroup_name(&self, name: &str) -> String {
        let ids = CgroupIds::parse(name);
        let mut out = name.to_string();
        if let Some(pod_id) = &ids.pod_id {
            out = self.anonymize_substring(&out, pod_id);
        }
        if let Some(container_id) = &ids.container_id {
            out = self.anonymize_substring(&out, container_id);
        }
        out
    }

    /// Process name with the session prefix prepended, cut to `comm` width
    pub fn prefixed_comm(&self, comm: &str) -> [u8; COMM_LEN] {
        let mut joined = Vec::with_capacity(self.session_prefix.len() + comm.len());
        joined.extend_from_slice(self.session_prefix.as_bytes());
        joined.extend_from_slice(comm.as_bytes());
        crate::recording::fixed_bytes(&joined)
    }
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure substitution used by [`Anonymizer::anonymize_substring`].
///
/// Searches `original` for the first [`NEEDLE_PREFIX_LEN`] characters of
/// `needle` (all of it if shorter). At the match, `replacement.len()` bytes
/// are overwritten by `replacement`, clamped at the end of the string. When
/// nothing matches, or `needle` is empty, `original` is returned as is.
pub fn substitute_fragment(original: &str, needle: &str, replacement: &str) -> String {
    let fragment = leading_chars(needle, NEEDLE_PREFIX_LEN);
    if fragment.is_empty() {
        return original.to_string();
    }

    let Some(start) = original.find(fragment) else {
        return original.to_string();
    };

    let mut end = (start + replacement.len()).min(original.len());
    while !original.is_char_boundary(end) {
        end += 1;
    }

    let mut out = String::with_capacity(original.len() + replacement.len());
    out.push_str(&original[..start]);
    out.push_str(replacement);
    out.push_str(&original[end..]);
    out
}

fn leading_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_prefix_shape() {
        let anon = Anonymizer::with_seed(1);
        assert_eq!(anon.session_prefix().len(), SESSION_PREFIX_LEN);
        assert!(anon
            .session_prefix()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_same_seed_same_prefix() {
        assert_eq!(
            Anonymizer::with_seed(99).session_prefix(),
            Anonymizer::with_seed(99).session_prefix()
        );
    }

    #[test]
    fn test_clock_seeded_anonymizer() {
        let mut anon = Anonymizer::from_seed(None);
        assert_eq!(anon.session_prefix().len(), SESSION_PREFIX_LEN);
        let mapped = anon.anonymize_numeric(0x0a00_0001);
        assert_eq!(anon.anonymize_numeric(0x0a00_0001), mapped);
    }

    #[test]
    fn test_numeric_is_stable_within_run() {
        let mut anon = Anonymizer::with_seed(3);
        let a = anon.anonymize_numeric(0x0a00_0001);
        let b = anon.anonymize_numeric(0x0a00_0002);
        assert_eq!(anon.anonymize_numeric(0x0a00_0001), a);
        assert_eq!(anon.anonymize_numeric(0x0a00_0002), b);
        assert_eq!(anon.mapped_count(), 2);
    }

    #[test]
    fn test_numeric_distinct_values_rarely_collide() {
        let mut anon = Anonymizer::with_seed(11);
        let replacements: std::collections::HashSet<u32> =
            (0..1000u32).map(|ip| anon.anonymize_numeric(ip)).collect();
        // birthday bound for 1000 draws over 2^32 is ~1e-4
        assert!(replacements.len() >= 999);
    }

    #[test]
    fn test_substitute_fragment() {
        assert_eq!(
            substitute_fragment("pod-abcdef123-x", "abcdef999", "XXXXXX"),
            "pod-XXXXXX123-x"
        );
        assert_eq!(substitute_fragment("nothing here", "abcdef", "XXXXXX"), "nothing here");
        assert_eq!(substitute_fragment("abc", "", "XXXXXX"), "abc");
    }

    #[test]
    fn test_substitute_fragment_short_needle_and_tail() {
        // needle shorter than the search prefix is used whole
        assert_eq!(substitute_fragment("run-ab", "ab", "XXXXXX"), "run-XXXXXX");
        // replacement clamps at the end of the string
        assert_eq!(substitute_fragment("id=abcdef", "abcdef", "123"), "id=123def");
    }

    #[test]
    fn test_anonymize_cgroup_name() {
        let anon = Anonymizer::with_seed(5);
        let prefix = anon.session_prefix().to_string();
        let cid = "4bb6a0d2f6e2b7a2f1e56c4bd0c9a1b2c3d4e5f60718293a4b5c6d7e8f901234";
        let path = format!("/kubepods/burstable/pod5c1b7a3e-9d2f-4e1a-8b3c-0f6d2e4a1b7c/{}", cid);

        let out = anon.anonymize_cgroup_name(&path);
        assert_eq!(
            out,
            format!(
                "/kubepods/burstable/pod{}3e-9d2f-4e1a-8b3c-0f6d2e4a1b7c/{}{}",
                prefix,
                prefix,
                &cid[6..]
            )
        );
        assert_eq!(
            anon.anonymize_cgroup_name("/system.slice/cron.service"),
            "/system.slice/cron.service"
        );
    }

    #[test]
    fn test_prefixed_comm() {
        let anon = Anonymizer::with_seed(8);
        let comm = anon.prefixed_comm("nginx");
        let expected = format!("{}nginx", anon.session_prefix());
        assert_eq!(&comm[..expected.len()], expected.as_bytes());
        assert!(comm[expected.len()..].iter().all(|b| *b == 0));

        let long = anon.prefixed_comm("a-very-long-process-name");
        assert_eq!(long.len(), COMM_LEN);
        assert_eq!(&long[..SESSION_PREFIX_LEN], anon.session_prefix().as_bytes());
    }
}
