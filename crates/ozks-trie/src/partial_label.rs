//! A fixed-capacity (256-bit) bit string used as trie labels.
//!
//! Grounded on `oZKS/partial_label.h`/`.cpp`: four `u64` words, MSB-first
//! within each word and across words, `CommonPrefix`/`CommonPrefixCount`
//! computed word-at-a-time via XOR + leading-zero-count rather than a
//! bit-by-bit loop. The original normalizes host endianness with a
//! store-then-reverse-bytes trick; this port instead builds each word
//! directly with `u64::from_be_bytes`, which needs no such workaround.

use std::cmp::Ordering;
use std::fmt;

pub const MAX_BIT_COUNT: u32 = 256;
pub const BYTE_COUNT: usize = 32;
/// 32 bytes of label data plus a 4-byte little-endian bit count.
pub const SAVE_SIZE: usize = BYTE_COUNT + 4;

const WORDS: usize = 4;
const BITS_PER_WORD: u32 = 64;

#[derive(Clone, Copy, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PartialLabel {
    words: [u64; WORDS],
    bit_count: u32,
}

impl PartialLabel {
    /// The empty label: the trie root before any insertion creates a split.
    pub fn empty() -> Self {
        PartialLabel { words: [0; WORDS], bit_count: 0 }
    }

    /// Builds a label from up to [`MAX_BIT_COUNT`] bits of `bytes`, MSB-first.
    /// If `bit_count` is `None`, the full byte span is used (`bytes.len() * 8`
    /// bits).
    pub fn from_bytes(bytes: &[u8], bit_count: Option<u32>) -> Self {
        let total_bits = bit_count.unwrap_or_else(|| (bytes.len() as u32) * 8).min(MAX_BIT_COUNT);
        let mut words = [0u64; WORDS];
        for (word_idx, word) in words.iter_mut().enumerate() {
            let start = word_idx * 8;
            if start >= bytes.len() {
                break;
            }
            let mut chunk = [0u8; 8];
            let end = (start + 8).min(bytes.len());
            chunk[..end - start].copy_from_slice(&bytes[start..end]);
            *word = u64::from_be_bytes(chunk);
        }
        let mut label = PartialLabel { words, bit_count: total_bits };
        label.mask_trailing_bits();
        label
    }

    /// Truncates `label` to its first `bit_count` bits.
    pub fn truncated(label: &PartialLabel, bit_count: u32) -> Self {
        let mut truncated = *label;
        truncated.bit_count = bit_count.min(label.bit_count).min(MAX_BIT_COUNT);
        truncated.mask_trailing_bits();
        truncated
    }

    pub fn from_bits(bits: &[bool]) -> Self {
        let mut label = PartialLabel::empty();
        for &bit in bits {
            label.push_bit(bit);
        }
        label
    }

    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    pub fn is_empty(&self) -> bool {
        self.bit_count == 0
    }

    /// The bit at `bit_idx`, MSB-first. Panics if `bit_idx >= bit_count()`,
    /// matching the original's bounds-checked `bit()`/`operator[]`.
    pub fn bit(&self, bit_idx: u32) -> bool {
        assert!(bit_idx < self.bit_count, "bit index {bit_idx} out of range");
        let word = self.words[(bit_idx / BITS_PER_WORD) as usize];
        let offset_in_word = bit_idx % BITS_PER_WORD;
        let mask = 1u64 << (BITS_PER_WORD - 1 - offset_in_word);
        (word & mask) != 0
    }

    /// Appends one bit, growing the label's length by one. Panics at
    /// capacity, matching the original's `MaxBitCount` check.
    pub fn push_bit(&mut self, bit: bool) {
        assert!(self.bit_count < MAX_BIT_COUNT, "label already at maximum bit count");
        if bit {
            let word_idx = (self.bit_count / BITS_PER_WORD) as usize;
            let offset_in_word = self.bit_count % BITS_PER_WORD;
            self.words[word_idx] |= 1u64 << (BITS_PER_WORD - 1 - offset_in_word);
        }
        self.bit_count += 1;
    }

    /// The MSB-first byte representation, zero-padded to a whole number of
    /// bytes (`ceil(bit_count / 8)` bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        let byte_len = (self.bit_count as usize).div_ceil(8);
        let mut out = Vec::with_capacity(byte_len);
        for word in &self.words {
            out.extend_from_slice(&word.to_be_bytes());
        }
        out.truncate(byte_len);
        out
    }

    /// Fixed 36-byte serialization: 32 bytes of label data (zero-padded)
    /// followed by a little-endian `u32` bit count.
    pub fn to_save_bytes(&self) -> [u8; SAVE_SIZE] {
        let mut out = [0u8; SAVE_SIZE];
        for (idx, word) in self.words.iter().enumerate() {
            out[idx * 8..idx * 8 + 8].copy_from_slice(&word.to_be_bytes());
        }
        out[BYTE_COUNT..].copy_from_slice(&self.bit_count.to_le_bytes());
        out
    }

    pub fn from_save_bytes(bytes: &[u8; SAVE_SIZE]) -> Self {
        let mut words = [0u64; WORDS];
        for (idx, word) in words.iter_mut().enumerate() {
            let mut chunk = [0u8; 8];
            chunk.copy_from_slice(&bytes[idx * 8..idx * 8 + 8]);
            *word = u64::from_be_bytes(chunk);
        }
        let bit_count = u32::from_le_bytes(bytes[BYTE_COUNT..].try_into().expect("4 bytes"));
        PartialLabel { words, bit_count }
    }

    /// The longest common prefix of `a` and `b`, computed word-at-a-time:
    /// for each word pair, `leading_zeros(a_word ^ b_word)` gives the number
    /// of matching bits in that word; the scan stops at the first word with
    /// any mismatch.
    pub fn common_prefix(a: &PartialLabel, b: &PartialLabel) -> PartialLabel {
        let count = PartialLabel::common_prefix_count(a, b);
        PartialLabel::truncated(a, count)
    }

    pub fn common_prefix_count(a: &PartialLabel, b: &PartialLabel) -> u32 {
        let max_bits = a.bit_count.min(b.bit_count);
        let mut matched = 0u32;
        for word_idx in 0..WORDS {
            if matched >= max_bits {
                break;
            }
            let xor = a.words[word_idx] ^ b.words[word_idx];
            let word_match = if xor == 0 { BITS_PER_WORD } else { xor.leading_zeros() };
            let remaining = max_bits - matched;
            matched += word_match.min(remaining);
            if word_match < BITS_PER_WORD {
                break;
            }
        }
        matched
    }

    fn mask_trailing_bits(&mut self) {
        for word_idx in 0..WORDS {
            let word_start_bit = (word_idx as u32) * BITS_PER_WORD;
            if self.bit_count <= word_start_bit {
                self.words[word_idx] = 0;
            } else if self.bit_count < word_start_bit + BITS_PER_WORD {
                let keep = self.bit_count - word_start_bit;
                let mask = !0u64 << (BITS_PER_WORD - keep);
                self.words[word_idx] &= mask;
            }
        }
    }
}

impl PartialEq for PartialLabel {
    fn eq(&self, other: &Self) -> bool {
        self.bit_count == other.bit_count && self.words == other.words
    }
}

impl Ord for PartialLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bit_count.cmp(&other.bit_count).then_with(|| self.words.cmp(&other.words))
    }
}

impl PartialOrd for PartialLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for PartialLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bits = String::with_capacity(self.bit_count as usize);
        for idx in 0..self.bit_count {
            bits.push(if self.bit(idx) { '1' } else { '0' });
        }
        write!(f, "PartialLabel({bits})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(&[true, true, false, true], &[true, true, true, false], 2)]
    #[case(&[true, false], &[true, false], 2)]
    #[case(&[false, true], &[true, false], 0)]
    fn common_prefix_count_matches_expected(
        #[case] a_bits: &[bool],
        #[case] b_bits: &[bool],
        #[case] expected: u32,
    ) {
        let a = PartialLabel::from_bits(a_bits);
        let b = PartialLabel::from_bits(b_bits);
        assert_eq!(PartialLabel::common_prefix_count(&a, &b), expected);
    }

    #[test]
    fn empty_label_has_zero_bits() {
        let label = PartialLabel::empty();
        assert_eq!(label.bit_count(), 0);
        assert!(label.is_empty());
    }

    #[test]
    fn from_bytes_reads_msb_first() {
        let label = PartialLabel::from_bytes(&[0b1000_0000], None);
        assert_eq!(label.bit_count(), 8);
        assert!(label.bit(0));
        assert!(!label.bit(1));
    }

    #[test]
    fn push_bit_extends_length() {
        let mut label = PartialLabel::empty();
        label.push_bit(true);
        label.push_bit(false);
        assert_eq!(label.bit_count(), 2);
        assert!(label.bit(0));
        assert!(!label.bit(1));
    }

    #[test]
    fn common_prefix_count_stops_at_first_mismatch() {
        let a = PartialLabel::from_bits(&[true, true, false, true]);
        let b = PartialLabel::from_bits(&[true, true, true, false]);
        assert_eq!(PartialLabel::common_prefix_count(&a, &b), 2);
    }

    #[test]
    fn common_prefix_count_crosses_word_boundary() {
        let mut bits_a = vec![true; 64];
        bits_a.push(true);
        let mut bits_b = vec![true; 64];
        bits_b.push(false);
        let a = PartialLabel::from_bits(&bits_a);
        let b = PartialLabel::from_bits(&bits_b);
        assert_eq!(PartialLabel::common_prefix_count(&a, &b), 64);
    }

    #[test]
    fn save_round_trip_preserves_label() {
        let label = PartialLabel::from_bits(&[true, false, true, true, false]);
        let bytes = label.to_save_bytes();
        let back = PartialLabel::from_save_bytes(&bytes);
        assert_eq!(label, back);
    }

    #[test]
    fn ordering_compares_length_then_bits() {
        let short = PartialLabel::from_bits(&[true]);
        let long = PartialLabel::from_bits(&[true, false]);
        assert!(short < long);
    }

    #[test]
    #[should_panic]
    fn push_bit_panics_at_capacity() {
        let mut label = PartialLabel::empty();
        for _ in 0..MAX_BIT_COUNT {
            label.push_bit(true);
        }
        label.push_bit(true);
    }
}
