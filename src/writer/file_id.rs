//! Trailer `/ID` generation.
//!
//! New identifiers come from two explicit seeds, so a fixed seed gives
//! byte-identical output across runs.

use crate::object::Object;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static SEED_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The two seeds an identifier is generated from.
///
/// With a caller seed both halves derive from it; otherwise the clock and a
/// process wide counter are used so that two writes in the same instant
/// still differ.
pub fn seed_pair(seed: Option<u64>) -> (u64, u64) {
    match seed {
        Some(s) => (s, s.rotate_left(32) ^ 0x9E37_79B9_7F4A_7C15),
        None => {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default();
            (nanos, SEED_COUNTER.fetch_add(1, Ordering::Relaxed))
        },
    }
}

/// 16 pseudo-random bytes: two words from each seed.
pub fn generate_file_id(seed1: u64, seed2: u64) -> Vec<u8> {
    let mut id = Vec::with_capacity(16);
    for seed in [seed1, seed2] {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..2 {
            id.extend_from_slice(&rng.next_u32().to_le_bytes());
        }
    }
    id
}

/// The `[<permanent> <changing>]` pair written to the trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileId {
    /// Permanent identifier, kept across revisions
    pub permanent: Vec<u8>,
    /// Identifier of this revision
    pub changing: Vec<u8>,
}

impl FileId {
    /// Work out the identifier pair for a write.
    ///
    /// The permanent half is inherited from `old` when present. The changing
    /// half is also inherited for an incremental update of an encrypted file,
    /// regenerated for any other file that had an ID, and equal to the
    /// permanent half for a file that had none.
    pub fn derive(
        old: Option<&[Object]>,
        incremental: bool,
        encrypted: bool,
        seeds: (u64, u64),
    ) -> Self {
        let old_part = |i: usize| {
            old.and_then(|arr| arr.get(i))
                .and_then(|o| o.as_string())
                .map(|b| b.to_vec())
        };

        let permanent = old_part(0).unwrap_or_else(|| generate_file_id(seeds.0, seeds.1));
        if old.is_none() {
            return Self {
                changing: permanent.clone(),
                permanent,
            };
        }

        let changing = match old_part(1) {
            Some(prev) if incremental && encrypted => prev,
            _ => generate_file_id(seeds.1, seeds.0),
        };
        Self {
            permanent,
            changing,
        }
    }

    /// `/ID` array value.
    pub fn to_object(&self) -> Object {
        Object::Array(vec![
            Object::hex_string(self.permanent.clone()),
            Object::hex_string(self.changing.clone()),
        ])
    }
}
