//! Entity identifiers.
//!
//! Generated ids are 26 characters of Crockford base-32: ten characters of
//! millisecond timestamp followed by sixteen characters of random suffix.
//! They sort by creation time as plain strings.
//!
//! Ids that come back from the remote may be numbers; [`normalize_id`]
//! turns any id value into the string form used locally.

use lorekeep_protocol::Record;
use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Length of a generated id.
pub const ID_LEN: usize = 26;

const TIME_LEN: usize = 10;
const RANDOM_BITS: u32 = 80;
const RANDOM_MASK: u128 = (1 << RANDOM_BITS) - 1;
const MAX_MILLIS: u64 = (1 << 48) - 1;

#[derive(Debug, Default)]
struct Last {
    millis: u64,
    random: u128,
}

/// Generates time-ordered ids.
///
/// For a non-decreasing sequence of instants the ids compare
/// non-decreasingly. Within one millisecond, or when the clock steps
/// backwards, the previous random suffix is incremented instead of drawn.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: Mutex<Option<Last>>,
}

impl IdGenerator {
    /// Creates a generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates an id for the given instant.
    ///
    /// Instants before the Unix epoch are treated as the epoch.
    pub fn new_id(&self, instant: SystemTime) -> String {
        let millis = instant
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis().min(u128::from(MAX_MILLIS)) as u64)
            .unwrap_or(0);

        let mut last = self.last.lock();
        let next = match last.as_ref() {
            Some(prev) if millis <= prev.millis => {
                if prev.random < RANDOM_MASK {
                    Last {
                        millis: prev.millis,
                        random: prev.random + 1,
                    }
                } else {
                    Last {
                        millis: (prev.millis + 1).min(MAX_MILLIS),
                        random: fresh_random(),
                    }
                }
            }
            _ => Last {
                millis,
                random: fresh_random(),
            },
        };

        let id = encode(next.millis, next.random);
        *last = Some(next);
        id
    }

    /// Generates an id for the current time.
    pub fn next_id(&self) -> String {
        self.new_id(SystemTime::now())
    }
}

fn fresh_random() -> u128 {
    rand::thread_rng().gen::<u128>() & RANDOM_MASK
}

fn encode(millis: u64, random: u128) -> String {
    let value = (u128::from(millis) << RANDOM_BITS) | random;
    (0..ID_LEN)
        .map(|i| {
            let shift = 5 * (ID_LEN - 1 - i);
            char::from(ALPHABET[((value >> shift) & 0x1F) as usize])
        })
        .collect()
}

fn decode_char(c: u8) -> Option<u64> {
    let upper = c.to_ascii_uppercase();
    ALPHABET
        .iter()
        .position(|&a| a == upper)
        .map(|p| p as u64)
}

/// Decodes the millisecond timestamp of a generated id.
///
/// Returns `None` for anything that is not a well-formed generated id.
pub fn id_timestamp(id: &str) -> Option<u64> {
    let bytes = id.as_bytes();
    if bytes.len() != ID_LEN || !bytes.iter().all(|&b| decode_char(b).is_some()) {
        return None;
    }

    let millis = bytes[..TIME_LEN]
        .iter()
        .try_fold(0u64, |acc, &b| Some((acc << 5) | decode_char(b)?))?;
    (millis <= MAX_MILLIS).then_some(millis)
}

/// Returns the local string form of an id value.
///
/// Strings are returned unchanged. Integers render in decimal, and floats
/// with an integral value render as integers, so `3.0` becomes `"3"`.
/// Anything else renders as its JSON text.
pub fn normalize_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => "0".to_string(),
            Some(f) if f.is_finite() && f.fract() == 0.0 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Rewrites a record's `id` attribute into its local string form.
///
/// Records without an id, or with a null one, are left alone.
pub fn normalize_record_id(record: &mut Record) {
    if let Some(id) = record.get_mut("id") {
        if !id.is_string() && !id.is_null() {
            *id = Value::String(normalize_id(id));
        }
    }
}
