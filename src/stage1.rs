//! Stage 1: find the structural indexes.
//!
//! The input is processed in 64-byte blocks. Each block yields bitmasks for
//! backslashes, quotes, whitespace and structural characters; the generic
//! pipeline below combines them (carrying string and escape state across
//! blocks) into the positions of every structural character and every
//! scalar-leading byte outside of strings. Implementations only supply the
//! block-level primitives, so SIMD backends and the portable fallback share
//! the same pipeline.

use crate::error::ErrorType;
use crate::safer_unchecked::GetSaferUnchecked;

const EVEN_BITS: u64 = 0x5555_5555_5555_5555;
const ODD_BITS: u64 = !EVEN_BITS;

pub(crate) trait Stage1Parse {
    type SimdRepresentation;

    unsafe fn new(ptr: &[u8]) -> Self;

    /// Bit i set iff byte i equals `m`.
    unsafe fn cmp_mask_against_input(&self, m: u8) -> u64;

    /// Bit i set iff byte i is less than or equal to `maxval`.
    unsafe fn unsigned_lteq_against_input(&self, maxval: Self::SimdRepresentation) -> u64;

    /// Whitespace and structural-character masks for the block.
    unsafe fn find_whitespace_and_structurals(&self, whitespace: &mut u64, structurals: &mut u64);

    /// Prefix parity of the quote bits: bit i is set iff an odd number of
    /// quotes precede or include position i.
    unsafe fn compute_quote_mask(quote_bits: u64) -> u64;

    /// Turn a bitmask into indexes relative to `idx - 64` (the mask always
    /// belongs to the previous block by the time it is flattened).
    unsafe fn flatten_bits(base: &mut Vec<u32>, idx: u32, bits: u64);

    unsafe fn fill_s8(n: i8) -> Self::SimdRepresentation;

    /// Mark the character following an odd-length run of backslashes:
    /// that character is escaped. Run parity carries across blocks.
    #[cfg_attr(not(feature = "no-inline"), inline)]
    unsafe fn find_odd_backslash_sequences(&self, prev_iter_ends_odd_backslash: &mut u64) -> u64 {
        let bs_bits = self.cmp_mask_against_input(b'\\');
        let start_edges = bs_bits & !(bs_bits << 1);
        // a run starting on an even offset flips the escape sense of the
        // run starting odd, and the carry-in swaps which is which
        let even_start_mask = EVEN_BITS ^ *prev_iter_ends_odd_backslash;
        let even_starts = start_edges & even_start_mask;
        let odd_starts = start_edges & !even_start_mask;
        let even_carries = bs_bits.wrapping_add(even_starts);
        let (mut odd_carries, iter_ends_odd_backslash) = bs_bits.overflowing_add(odd_starts);
        odd_carries |= *prev_iter_ends_odd_backslash;
        *prev_iter_ends_odd_backslash = u64::from(iter_ends_odd_backslash);
        let even_carry_ends = even_carries & !bs_bits;
        let odd_carry_ends = odd_carries & !bs_bits;
        let even_start_odd_end = even_carry_ends & ODD_BITS;
        let odd_start_even_end = odd_carry_ends & EVEN_BITS;
        even_start_odd_end | odd_start_even_end
    }

    /// Compute the mask of bytes inside strings (opening quote included,
    /// closing quote excluded) and flag unescaped control bytes within.
    #[cfg_attr(not(feature = "no-inline"), inline)]
    unsafe fn find_quote_mask_and_bits(
        &self,
        odd_ends: u64,
        prev_iter_inside_quote: &mut u64,
        quote_bits: &mut u64,
        error_mask: &mut u64,
    ) -> u64 {
        *quote_bits = self.cmp_mask_against_input(b'"') & !odd_ends;
        let mut quote_mask = Self::compute_quote_mask(*quote_bits);
        quote_mask ^= *prev_iter_inside_quote;
        let unescaped = self.unsigned_lteq_against_input(Self::fill_s8(0x1F));
        *error_mask |= quote_mask & unescaped;
        // sign-extend the top bit: all ones while a string spans blocks
        *prev_iter_inside_quote = static_cast_u64!(static_cast_i64!(quote_mask) >> 63);
        quote_mask
    }

    /// Combine the block masks into the final structural set: operators and
    /// opening quotes, plus the first byte of every scalar run outside
    /// strings.
    #[cfg_attr(not(feature = "no-inline"), inline)]
    fn finalize_structurals(
        mut structurals: u64,
        whitespace: u64,
        quote_mask: u64,
        quote_bits: u64,
        prev_iter_ends_pseudo_pred: &mut u64,
    ) -> u64 {
        structurals &= !quote_mask;
        structurals |= quote_bits;
        let pseudo_pred: u64 = structurals | whitespace;
        let shifted_pseudo_pred: u64 = (pseudo_pred << 1) | *prev_iter_ends_pseudo_pred;
        *prev_iter_ends_pseudo_pred = pseudo_pred >> 63;
        let pseudo_structurals: u64 = shifted_pseudo_pred & !whitespace & !quote_mask;
        structurals |= pseudo_structurals;
        // closing quotes were useful as scalar terminators above but are
        // not structural themselves
        structurals &= !(quote_bits & !quote_mask);
        structurals
    }
}

/// Run stage 1 over `input[..len]`, filling `structural_indexes`.
///
/// Fails with `StringError` when a string contains an unescaped control
/// byte or is still open at end of input.
pub(crate) fn find_structural_bits<S: Stage1Parse>(
    input: &[u8],
    len: usize,
    structural_indexes: &mut Vec<u32>,
) -> Result<(), ErrorType> {
    structural_indexes.clear();
    structural_indexes.reserve(len + 1);

    let mut idx: usize = 0;
    // mask from the previous block, flattened one block late
    let mut structurals: u64 = 0;
    let mut prev_iter_ends_odd_backslash: u64 = 0;
    let mut prev_iter_inside_quote: u64 = 0;
    // start of input counts as following whitespace
    let mut prev_iter_ends_pseudo_pred: u64 = 1;
    let mut error_mask: u64 = 0;

    unsafe {
        while idx + 64 <= len {
            let chunk = input.get_kinda_unchecked(idx..idx + 64);
            let block = S::new(chunk);
            let odd_ends = block.find_odd_backslash_sequences(&mut prev_iter_ends_odd_backslash);
            let mut quote_bits = 0;
            let quote_mask = block.find_quote_mask_and_bits(
                odd_ends,
                &mut prev_iter_inside_quote,
                &mut quote_bits,
                &mut error_mask,
            );
            S::flatten_bits(structural_indexes, idx as u32, structurals);
            let mut whitespace = 0;
            let mut block_structurals = 0;
            block.find_whitespace_and_structurals(&mut whitespace, &mut block_structurals);
            structurals = S::finalize_structurals(
                block_structurals,
                whitespace,
                quote_mask,
                quote_bits,
                &mut prev_iter_ends_pseudo_pred,
            );
            idx += 64;
        }

        if idx < len {
            // pad the tail block with spaces; whitespace is inert in every
            // mask above
            let mut tmpbuf = [0x20u8; 64];
            tmpbuf
                .get_unchecked_mut(..len - idx)
                .copy_from_slice(input.get_kinda_unchecked(idx..len));
            let block = S::new(&tmpbuf);
            let odd_ends = block.find_odd_backslash_sequences(&mut prev_iter_ends_odd_backslash);
            let mut quote_bits = 0;
            let quote_mask = block.find_quote_mask_and_bits(
                odd_ends,
                &mut prev_iter_inside_quote,
                &mut quote_bits,
                &mut error_mask,
            );
            S::flatten_bits(structural_indexes, idx as u32, structurals);
            let mut whitespace = 0;
            let mut block_structurals = 0;
            block.find_whitespace_and_structurals(&mut whitespace, &mut block_structurals);
            structurals = S::finalize_structurals(
                block_structurals,
                whitespace,
                quote_mask,
                quote_bits,
                &mut prev_iter_ends_pseudo_pred,
            );
            idx += 64;
        }

        S::flatten_bits(structural_indexes, idx as u32, structurals);
    }

    if error_mask != 0 {
        return Err(ErrorType::StringError);
    }
    if prev_iter_inside_quote != 0 {
        // a quote opened and never closed
        return Err(ErrorType::StringError);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::impls::native::SimdInput;

    fn indexes(input: &str) -> Result<Vec<usize>, ErrorType> {
        let mut out = Vec::new();
        find_structural_bits::<SimdInput>(input.as_bytes(), input.len(), &mut out)?;
        Ok(out.into_iter().map(|i| i as usize).collect())
    }

    #[test]
    fn object_and_scalars() {
        // every operator, the opening quotes, and the scalar heads
        assert_eq!(
            indexes(r#"{"a": true, "b": 17}"#).unwrap(),
            vec![0, 1, 4, 6, 10, 12, 15, 17, 19]
        );
    }

    #[test]
    fn nothing_inside_strings() {
        // the braces and colon inside the string must not be indexed, and
        // the closing quote is not structural
        assert_eq!(indexes(r#"["{x:}"]"#).unwrap(), vec![0, 1, 7]);
    }

    #[test]
    fn escaped_quotes_stay_in_string() {
        assert_eq!(indexes(r#""a\"b""#).unwrap(), vec![0]);
        assert_eq!(indexes(r#""a\\""#).unwrap(), vec![0]);
    }

    #[test]
    fn scalar_heads_only() {
        // `truu` is one scalar: only its first byte is indexed
        assert_eq!(indexes("truu").unwrap(), vec![0]);
        assert_eq!(indexes("  42 ").unwrap(), vec![2]);
    }

    #[test]
    fn carries_across_blocks() {
        // a string spanning a 64-byte boundary keeps its interior unindexed
        let long = format!(r#"{{"k": "{}", "n": 1}}"#, "x".repeat(80));
        let idxs = indexes(&long).unwrap();
        let bytes = long.as_bytes();
        for &i in &idxs {
            assert!(bytes[i] != b'x', "indexed string interior at {i}");
        }
        assert!(idxs.contains(&0));
        assert!(idxs.contains(&(long.len() - 1)));
    }

    #[test]
    fn unclosed_string_is_an_error() {
        assert_eq!(indexes(r#""abc"#), Err(ErrorType::StringError));
    }

    #[test]
    fn control_byte_in_string_is_an_error() {
        assert_eq!(indexes("\"a\nb\""), Err(ErrorType::StringError));
    }
}
