//! Golomb-coded set (GCS) filter (design spec §4.9, §Glossary "GCS").
//!
//! A BIP158-style construction: hash every member into a uniform range of
//! `N * M` values (`N` = member count, `M = 2^P` sets the false-positive
//! rate to `1/M`), sort, delta-encode, and Golomb-Rice code each delta
//! with parameter `P`. Chosen over a Bloom filter because it gives a
//! tighter size bound at the same target false-positive rate, which
//! matters when the encoded filter must fit a fixed per-REQUEST_SYNC byte
//! budget.

use crate::{GossipError, Result};

/// Default target false-positive rate for sync filters.
pub const DEFAULT_FP_RATE: f64 = 0.01;

/// Default byte budget for an encoded filter.
pub const DEFAULT_BYTE_BUDGET: usize = 400;

/// Derive the Golomb-Rice parameter `P` from a target false-positive rate:
/// `M = 2^P` is chosen so `1/M <= fp_rate`.
pub fn parameter_for_fp_rate(fp_rate: f64) -> u8 {
    if fp_rate <= 0.0 {
        return 32;
    }
    let p = (1.0 / fp_rate).log2().ceil() as i32;
    p.clamp(1, 32) as u8
}

/// Map a 32-byte item hash into the range `[0, modulus)`, matching the
/// BIP158 `hash_to_range` construction (using the item's own hash rather
/// than an external keyed hash, since our items are already digests).
fn hash_to_range(item_hash: &[u8; 32], modulus: u64) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&item_hash[..8]);
    let h = u64::from_be_bytes(buf);
    ((h as u128 * modulus as u128) >> 64) as u64
}

struct BitWriter {
    bytes: Vec<u8>,
    bit_pos: u8,
}

impl BitWriter {
    fn new() -> Self {
        Self { bytes: Vec::new(), bit_pos: 0 }
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_pos == 0 {
            self.bytes.push(0);
        }
        if bit {
            let idx = self.bytes.len() - 1;
            self.bytes[idx] |= 1 << (7 - self.bit_pos);
        }
        self.bit_pos = (self.bit_pos + 1) % 8;
    }

    fn push_unary(&mut self, q: u64) {
        for _ in 0..q {
            self.push_bit(true);
        }
        self.push_bit(false);
    }

    fn push_bits(&mut self, value: u64, num_bits: u8) {
        for i in (0..num_bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
    }

    fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

struct BitReader<'a> {
    bytes: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, bit_pos: 0 }
    }

    fn read_bit(&mut self) -> Option<bool> {
        let byte_idx = self.bit_pos / 8;
        let bit_idx = self.bit_pos % 8;
        let byte = *self.bytes.get(byte_idx)?;
        self.bit_pos += 1;
        Some((byte >> (7 - bit_idx)) & 1 == 1)
    }

    fn read_unary(&mut self) -> Option<u64> {
        let mut q = 0u64;
        loop {
            match self.read_bit()? {
                true => q += 1,
                false => return Some(q),
            }
        }
    }

    fn read_bits(&mut self, num_bits: u8) -> Option<u64> {
        let mut value = 0u64;
        for _ in 0..num_bits {
            value = (value << 1) | if self.read_bit()? { 1 } else { 0 };
        }
        Some(value)
    }
}

/// An encoded Golomb-coded set filter.
#[derive(Clone, Debug)]
pub struct GcsFilter {
    n: u64,
    p: u8,
    data: Vec<u8>,
}

impl GcsFilter {
    /// Build a filter over `items`, at Golomb-Rice parameter derived from
    /// `fp_rate`, including as many (already-sorted-by-caller-order)
    /// items as fit within `byte_budget`. Returns the filter and the
    /// number of items actually included.
    pub fn build_with_budget(items: &[[u8; 32]], fp_rate: f64, byte_budget: usize) -> (Self, usize) {
        let p = parameter_for_fp_rate(fp_rate);
        let mut included = items.len();

        loop {
            let filter = Self::encode(&items[..included], p);
            if filter.data.len() <= byte_budget || included == 0 {
                return (filter, included);
            }
            included -= 1;
        }
    }

    /// Build a filter over exactly `items` at Golomb-Rice parameter `p`,
    /// with no byte budget enforcement.
    pub fn encode(items: &[[u8; 32]], p: u8) -> Self {
        let n = items.len() as u64;
        let m = 1u64 << p;
        let modulus = n.max(1) * m;

        let mut values: Vec<u64> = items.iter().map(|h| hash_to_range(h, modulus)).collect();
        values.sort_unstable();

        let mut writer = BitWriter::new();
        let mut prev = 0u64;
        for value in &values {
            let delta = value.saturating_sub(prev);
            prev = *value;
            writer.push_unary(delta >> p);
            writer.push_bits(delta & ((1u64 << p) - 1), p);
        }

        Self { n, p, data: writer.into_bytes() }
    }

    /// Number of items the filter was built from.
    pub fn len(&self) -> u64 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        self.data.len()
    }

    /// Golomb-Rice parameter used.
    pub fn parameter(&self) -> u8 {
        self.p
    }

    /// Test whether `item_hash` is (probably) a member of the filter.
    pub fn contains(&self, item_hash: &[u8; 32]) -> bool {
        let m = 1u64 << self.p;
        let modulus = self.n.max(1) * m;
        let target = hash_to_range(item_hash, modulus);

        let mut reader = BitReader::new(&self.data);
        let mut acc = 0u64;
        for _ in 0..self.n {
            let Some(q) = reader.read_unary() else { return false };
            let Some(r) = reader.read_bits(self.p) else { return false };
            acc += (q << self.p) | r;
            if acc == target {
                return true;
            }
            if acc > target {
                return false;
            }
        }
        false
    }

    /// Serialize as `[n: u32 BE][p: u8][data...]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 + self.data.len());
        out.extend_from_slice(&(self.n as u32).to_be_bytes());
        out.push(self.p);
        out.extend_from_slice(&self.data);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 5 {
            return Err(GossipError::MalformedFilter("too short".into()));
        }
        let n = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64;
        let p = bytes[4];
        Ok(Self { n, p, data: bytes[5..].to_vec() })
    }
}
