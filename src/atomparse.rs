//! Constant-time keyword checks for `true`, `false` and `null`.
//!
//! The fixed-width variants read a fixed number of bytes past the structural
//! index and rely on the input padding. The `_root` variants take the
//! remaining document length instead, for the last value in a document where
//! the padding contents are not ours to interpret.

use crate::charutils::is_not_structural_or_whitespace;

#[cfg_attr(not(feature = "no-inline"), inline)]
fn str4ncmp(src: &[u8], atom: &[u8; 4]) -> u32 {
    let mut srcval = [0u8; 4];
    srcval.copy_from_slice(&src[..4]);
    u32::from_le_bytes(srcval) ^ u32::from_le_bytes(*atom)
}

#[cfg_attr(not(feature = "no-inline"), inline)]
pub(crate) fn is_valid_true_atom(loc: &[u8]) -> bool {
    (str4ncmp(loc, b"true") | is_not_structural_or_whitespace(loc[4])) == 0
}

#[cfg_attr(not(feature = "no-inline"), inline)]
pub(crate) fn is_valid_false_atom(loc: &[u8]) -> bool {
    // "false" is five bytes; compare the tail four so a single 32-bit load
    // suffices, the leading 'f' was dispatched on already.
    (str4ncmp(&loc[1..], b"alse") | is_not_structural_or_whitespace(loc[5])) == 0
}

#[cfg_attr(not(feature = "no-inline"), inline)]
pub(crate) fn is_valid_null_atom(loc: &[u8]) -> bool {
    (str4ncmp(loc, b"null") | is_not_structural_or_whitespace(loc[4])) == 0
}

#[cfg_attr(not(feature = "no-inline"), inline)]
pub(crate) fn is_valid_true_atom_root(loc: &[u8], remaining: usize) -> bool {
    match remaining {
        5.. => is_valid_true_atom(loc),
        4 => str4ncmp(loc, b"true") == 0,
        _ => false,
    }
}

#[cfg_attr(not(feature = "no-inline"), inline)]
pub(crate) fn is_valid_false_atom_root(loc: &[u8], remaining: usize) -> bool {
    match remaining {
        6.. => is_valid_false_atom(loc),
        5 => str4ncmp(&loc[1..], b"alse") == 0,
        _ => false,
    }
}

#[cfg_attr(not(feature = "no-inline"), inline)]
pub(crate) fn is_valid_null_atom_root(loc: &[u8], remaining: usize) -> bool {
    match remaining {
        5.. => is_valid_null_atom(loc),
        4 => str4ncmp(loc, b"null") == 0,
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn padded(s: &str) -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.resize(s.len() + 8, 0);
        v
    }

    #[test]
    fn fixed_width() {
        assert!(is_valid_true_atom(&padded("true,")));
        assert!(is_valid_true_atom(&padded("true}")));
        assert!(is_valid_true_atom(&padded("true ")));
        assert!(!is_valid_true_atom(&padded("truu,")));
        assert!(!is_valid_true_atom(&padded("truex")));
        assert!(is_valid_false_atom(&padded("false]")));
        assert!(!is_valid_false_atom(&padded("falsy]")));
        assert!(is_valid_null_atom(&padded("null\t")));
        assert!(!is_valid_null_atom(&padded("nul],")));
    }

    #[test]
    fn end_of_buffer_aware() {
        assert!(is_valid_true_atom_root(&padded("true"), 4));
        assert!(!is_valid_true_atom_root(&padded("tru"), 3));
        assert!(is_valid_false_atom_root(&padded("false"), 5));
        assert!(!is_valid_false_atom_root(&padded("fals"), 4));
        assert!(is_valid_null_atom_root(&padded("null"), 4));
        assert!(is_valid_null_atom_root(&padded("null "), 5));
        assert!(!is_valid_null_atom_root(&padded("nullx"), 5));
    }
}
