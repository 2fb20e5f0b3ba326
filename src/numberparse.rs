//! JSON number parsing straight onto the tape.
//!
//! A literal that is a plain integer lands as `Int64` (or `Uint64` when it
//! is positive and only fits unsigned); everything else, including integers
//! beyond 64 bits, degrades to `Double`. A literal whose nearest double is
//! not finite is an error.

use crate::charutils::is_structural_or_whitespace;
use crate::tape::TapeWriter;

/// Parse the number starting at `src` and append its one- or two-word tape
/// entry. Returns false on any RFC 8259 violation, a missing terminator, or
/// an out-of-range double.
///
/// # Safety
/// `src` must point into a buffer that stays readable for the whole literal
/// plus one terminator byte; the padded input guarantees this because the
/// zero padding is neither a digit nor part of any number production. The
/// tape must have two reserved slots.
#[cfg_attr(not(feature = "no-inline"), inline)]
#[allow(clippy::cast_possible_wrap)]
pub(crate) unsafe fn parse_number(src: *const u8, tape: &mut TapeWriter) -> bool {
    let negative = *src == b'-';
    let mut p = src.add(usize::from(negative));
    if !(*p).is_ascii_digit() {
        return false;
    }

    let mut i: u64 = 0;
    let mut overflow = false;
    if *p == b'0' {
        p = p.add(1);
        if (*p).is_ascii_digit() {
            // leading zeros are forbidden
            return false;
        }
    } else {
        while (*p).is_ascii_digit() {
            match i
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(*p - b'0')))
            {
                Some(v) => i = v,
                None => overflow = true,
            }
            p = p.add(1);
        }
    }

    let mut is_float = false;
    if *p == b'.' {
        is_float = true;
        p = p.add(1);
        if !(*p).is_ascii_digit() {
            return false;
        }
        while (*p).is_ascii_digit() {
            p = p.add(1);
        }
    }
    if *p == b'e' || *p == b'E' {
        is_float = true;
        p = p.add(1);
        if *p == b'+' || *p == b'-' {
            p = p.add(1);
        }
        if !(*p).is_ascii_digit() {
            return false;
        }
        while (*p).is_ascii_digit() {
            p = p.add(1);
        }
    }

    if is_structural_or_whitespace(*p) == 0 {
        return false;
    }

    if is_float || overflow || (negative && i > 1 << 63) {
        let len = p.offset_from(src) as usize;
        // SAFETY: every byte scanned above is ASCII
        let literal = std::str::from_utf8_unchecked(std::slice::from_raw_parts(src, len));
        return match literal.parse::<f64>() {
            Ok(value) if value.is_finite() => {
                tape.append_f64(value);
                true
            }
            _ => false,
        };
    }

    if negative {
        // i <= 2^63 here, so the wrap is exactly i64::MIN at the boundary
        tape.append_s64((i as i64).wrapping_neg());
    } else if i > i64::MAX as u64 {
        tape.append_u64(i);
    } else {
        tape.append_s64(i as i64);
    }
    true
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tape::TapeTag;

    fn parse(literal: &str) -> Option<(TapeTag, u64)> {
        let mut src = literal.as_bytes().to_vec();
        src.resize(literal.len() + 32, 0);
        let mut words = vec![0u64; 2];
        let mut writer = TapeWriter::new(words.as_mut_ptr());
        let ok = unsafe { parse_number(src.as_ptr(), &mut writer) };
        if !ok {
            return None;
        }
        assert_eq!(writer.next_tape_index(), 2);
        Some((TapeTag::from_u8((words[0] >> 56) as u8)?, words[1]))
    }

    #[test]
    fn integers() {
        assert_eq!(parse("0,"), Some((TapeTag::Int64, 0)));
        assert_eq!(parse("42,"), Some((TapeTag::Int64, 42)));
        assert_eq!(parse("-17]"), Some((TapeTag::Int64, (-17i64) as u64)));
        assert_eq!(
            parse("9223372036854775807,"),
            Some((TapeTag::Int64, i64::MAX as u64))
        );
        assert_eq!(
            parse("-9223372036854775808,"),
            Some((TapeTag::Int64, i64::MIN as u64))
        );
    }

    #[test]
    fn unsigned_and_overflow() {
        assert_eq!(
            parse("9223372036854775808,"),
            Some((TapeTag::Uint64, 9_223_372_036_854_775_808))
        );
        assert_eq!(
            parse("18446744073709551615,"),
            Some((TapeTag::Uint64, u64::MAX))
        );
        // one past u64::MAX degrades to a double
        assert_eq!(
            parse("18446744073709551616,"),
            Some((TapeTag::Double, 18_446_744_073_709_551_616.0f64.to_bits()))
        );
        assert_eq!(
            parse("-9223372036854775809,"),
            Some((TapeTag::Double, (-9_223_372_036_854_775_809.0f64).to_bits()))
        );
    }

    #[test]
    fn doubles() {
        assert_eq!(parse("0.5,"), Some((TapeTag::Double, 0.5f64.to_bits())));
        assert_eq!(parse("1e3 "), Some((TapeTag::Double, 1000.0f64.to_bits())));
        assert_eq!(
            parse("-2.5E-2}"),
            Some((TapeTag::Double, (-0.025f64).to_bits()))
        );
        assert_eq!(parse("0.0,"), Some((TapeTag::Double, 0.0f64.to_bits())));
    }

    #[test]
    fn rejects() {
        for bad in [
            "01,", "-,", "-a,", "1.,", ".5,", "1e,", "1e+,", "1.2.3,", "9e999,", "1x,", "4\"",
        ] {
            assert_eq!(parse(bad), None, "{bad}");
        }
    }
}
