//! Scan a quoted JSON string and unescape it into the string buffer.

use crate::charutils::{codepoint_to_utf8, hex_to_u32_nocheck};

/// Single-character escape values; 0 marks an invalid escape.
#[rustfmt::skip]
const ESCAPE_MAP: [u8; 256] = {
    let mut map = [0u8; 256];
    map[b'"' as usize] = 0x22;
    map[b'/' as usize] = 0x2F;
    map[b'\\' as usize] = 0x5C;
    map[b'b' as usize] = 0x08;
    map[b'f' as usize] = 0x0C;
    map[b'n' as usize] = 0x0A;
    map[b'r' as usize] = 0x0D;
    map[b't' as usize] = 0x09;
    map
};

/// Decode a `\uXXXX` sequence (optionally a surrogate pair) at `*src`,
/// which points at the backslash. Advances both cursors; returns false on a
/// malformed or unpaired sequence.
///
/// # Safety
/// `*src..src_end` must be readable and `*dst` must have four writable
/// bytes. `src_end` may be at most a few bytes before the end of the
/// allocation (the caller's padding covers the pointer arithmetic).
#[cfg_attr(not(feature = "no-inline"), inline)]
unsafe fn handle_unicode_codepoint(
    src: &mut *const u8,
    src_end: *const u8,
    dst: &mut *mut u8,
) -> bool {
    if src.add(6) > src_end {
        return false;
    }
    let mut code_point = hex_to_u32_nocheck(&*src.add(2).cast::<[u8; 4]>());
    *src = src.add(6);
    if (0xD800..0xDC00).contains(&code_point) {
        // high surrogate: the low half must follow immediately
        if src.add(6) > src_end || **src != b'\\' || *src.add(1) != b'u' {
            return false;
        }
        let code_point_2 = hex_to_u32_nocheck(&*src.add(2).cast::<[u8; 4]>());
        let low_bit = code_point_2.wrapping_sub(0xDC00);
        if (low_bit >> 10) != 0 {
            return false;
        }
        code_point = (((code_point - 0xD800) << 10) | low_bit) + 0x10000;
        *src = src.add(6);
    } else if (0xDC00..0xE000).contains(&code_point) {
        // unpaired low surrogate
        return false;
    }
    let offset = codepoint_to_utf8(code_point, *dst);
    *dst = dst.add(offset);
    offset > 0
}

/// Copy the string starting at the opening quote `src` into `dst`, decoding
/// escapes. Returns the one-past-last destination pointer, or `None` on an
/// invalid escape, an unescaped control byte, or when `src_end` is reached
/// before the closing quote.
///
/// # Safety
/// `src` must point at a `"` inside a buffer readable up to `src_end`, and
/// `dst` must have at least `src_end - src` writable bytes.
pub(crate) unsafe fn parse_str(
    mut src: *const u8,
    src_end: *const u8,
    mut dst: *mut u8,
) -> Option<*mut u8> {
    src = src.add(1);
    loop {
        if src >= src_end {
            // ran off the document without a closing quote
            return None;
        }
        let c = *src;
        if c == b'"' {
            return Some(dst);
        }
        if c == b'\\' {
            if src.add(2) > src_end {
                return None;
            }
            let escape_char = *src.add(1);
            if escape_char == b'u' {
                if !handle_unicode_codepoint(&mut src, src_end, &mut dst) {
                    return None;
                }
            } else {
                let escape_result = ESCAPE_MAP[escape_char as usize];
                if escape_result == 0 {
                    return None;
                }
                dst.write(escape_result);
                dst = dst.add(1);
                src = src.add(2);
            }
        } else if c < 0x20 {
            return None;
        } else {
            dst.write(c);
            dst = dst.add(1);
            src = src.add(1);
        }
    }
}
