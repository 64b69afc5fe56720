//! Identity hashing for accumulated series
//!
//! Two distinct keys are derived from a sample:
//!
//! - the accumulation identity ([`identity_key`]) covers the fully-qualified
//!   name and every sorted `key:value` label pair, so each series owns exactly
//!   one store entry across scrapes;
//! - the schema hash ([`hash_label_keys`]) covers label names only and is used
//!   within one scrape to detect label-schema divergence.
//!
//! Both use 64-bit FNV-1a, matching the hashing the Prometheus client uses
//! for metric descriptors.

const OFFSET64: u64 = 14695981039346656037;
const PRIME64: u64 = 1099511628211;

/// Byte that separates hashed label names
pub const SEPARATOR_BYTE: u8 = 255;

/// Fresh FNV-1a state
pub fn hash_new() -> u64 {
    OFFSET64
}

/// Fold a string into the hash state
pub fn hash_add(mut h: u64, s: &str) -> u64 {
    for byte in s.bytes() {
        h ^= byte as u64;
        h = h.wrapping_mul(PRIME64);
    }
    h
}

/// Fold a single byte into the hash state
pub fn hash_add_byte(mut h: u64, byte: u8) -> u64 {
    h ^= byte as u64;
    h.wrapping_mul(PRIME64)
}

/// Accumulation identity of a series: `fq_name|k1:v1|k2:v2...` with keys sorted.
pub fn identity_key(fq_name: &str, label_keys: &[String], label_values: &[String]) -> u64 {
    let mut pairs: Vec<(&str, &str)> = label_keys
        .iter()
        .zip(label_values.iter())
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let mut text = String::with_capacity(fq_name.len() + pairs.len() * 16);
    text.push_str(fq_name);
    text.push('|');
    for (idx, (key, value)) in pairs.iter().enumerate() {
        if idx > 0 {
            text.push('|');
        }
        text.push_str(key);
        text.push(':');
        text.push_str(value);
    }

    hash_add(hash_new(), &text)
}

/// Schema hash over sorted label keys, values ignored.
pub fn hash_label_keys(label_keys: &[String]) -> u64 {
    let mut sorted: Vec<&str> = label_keys.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut h = hash_new();
    for key in sorted {
        h = hash_add(h, key);
        h = hash_add_byte(h, SEPARATOR_BYTE);
    }
    h
}
