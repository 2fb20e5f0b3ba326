//! Stage 2: walk the structural indexes and build the tape.
//!
//! The driver is the goto-style state machine of the two-stage design: a
//! handful of states, no recursion, and a per-depth scope stack instead of a
//! call stack. Container start words are reserved with `skip` and
//! back-patched when the matching end word is appended, so the tape is
//! written strictly in document order apart from those patches.

use crate::atomparse::{
    is_valid_false_atom, is_valid_false_atom_root, is_valid_null_atom, is_valid_null_atom_root,
    is_valid_true_atom, is_valid_true_atom_root,
};
use crate::error::{Error, ErrorType};
use crate::numberparse::parse_number;
use crate::safer_unchecked::GetSaferUnchecked;
use crate::stringparse::parse_str;
use crate::tape::{TapeTag, TapeWriter};
use crate::{Result, PADDING};

macro_rules! get {
    ($a:expr, $i:expr) => {{
        unsafe { *$a.get_kinda_unchecked($i) }
    }};
}

/// Where the driver resumes once the scope that stores this closes. A scope
/// can only ever close into an enclosing array, an enclosing object (after
/// the value position), or the end of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeReturn {
    ArrayContinue,
    Finish,
    ObjectContinue,
}

/// Per-depth record: the reserved tape slot of the open container, its
/// running child count, and the resume state for when it closes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ContainingScope {
    tape_index: u32,
    count: u32,
    ret: ScopeReturn,
}

#[derive(Debug, Clone, Copy)]
enum State {
    ObjectBegin,
    ObjectKey,
    ObjectContinue,
    ScopeEnd,
    ArrayBegin,
    MainArraySwitch,
    ArrayContinue,
}

/// Build the tape for one document out of `input[..len]` and its structural
/// indexes, starting at `start_structural`. On success returns the position
/// in `structural_indexes` just past the document, which a streaming caller
/// feeds back in to resume; the non-streaming variant instead requires the
/// document to consume every index.
///
/// `tape`, `string_buf` and `stack` are cleared and re-reserved here; on
/// either exit their lengths are set to what was actually written, but after
/// a failure the contents are meaningless and must be discarded.
///
/// # Safety contract
/// `input` must be readable for `len + PADDING` bytes, and
/// `structural_indexes` must be what stage 1 produced for this buffer:
/// strictly increasing offsets below `len`. Both hold by construction in the
/// public entry points and are debug-asserted here.
#[allow(clippy::too_many_lines, clippy::cognitive_complexity)]
pub(crate) fn build_tape<const STREAMING: bool>(
    input: &[u8],
    len: usize,
    structural_indexes: &[u32],
    start_structural: usize,
    max_depth: usize,
    stack: &mut Vec<ContainingScope>,
    tape: &mut Vec<u64>,
    string_buf: &mut Vec<u8>,
) -> Result<usize> {
    debug_assert!(input.len() >= len + PADDING);
    debug_assert!(structural_indexes.windows(2).all(|w| w[0] < w[1]));
    debug_assert!(structural_indexes.iter().all(|&i| (i as usize) < len));

    let n_structural_indexes = structural_indexes.len();
    if unlikely!(start_structural >= n_structural_indexes) {
        return Err(Error::generic(ErrorType::Empty));
    }

    tape.clear();
    tape.reserve(2 * n_structural_indexes + 8);
    string_buf.clear();
    string_buf.reserve(5 * len / 3 + 64 + PADDING);
    stack.clear();
    stack.reserve(max_depth);

    let input_ptr = input.as_ptr();
    let input_end = unsafe { input_ptr.add(len) };
    let str_ptr = string_buf.as_mut_ptr();
    let stack_ptr = stack.as_mut_ptr();

    let mut writer = TapeWriter::new(tape.as_mut_ptr());
    // next free byte in the string buffer
    let mut str_loc: usize = 0;

    // Current nesting level; the root document is the scope at depth 0.
    let mut depth: usize = 0;
    // Cursor into `structural_indexes`.
    let mut i: usize = start_structural;
    // Byte offset of the structural currently being handled.
    let mut idx: usize = 0;
    // The byte at `idx`.
    let mut c: u8 = 0;
    let mut state;

    macro_rules! success {
        () => {{
            unsafe {
                tape.set_len(writer.next_tape_index());
                string_buf.set_len(str_loc);
            }
            return Ok(i);
        }};
    }

    // The shared error epilogue: set the buffer lengths so the Vecs stay
    // sound, then classify from the depth and the byte we choked on.
    macro_rules! fail {
        () => {{
            let error = if depth >= max_depth {
                ErrorType::DepthError
            } else {
                match c {
                    b'"' => ErrorType::StringError,
                    b'0'..=b'9' | b'-' => ErrorType::NumberError,
                    b't' => ErrorType::TAtomError,
                    b'f' => ErrorType::FAtomError,
                    b'n' => ErrorType::NAtomError,
                    _ => ErrorType::TapeError,
                }
            };
            fail!(error);
        }};
        ($t:expr) => {{
            unsafe {
                tape.set_len(writer.next_tape_index());
                string_buf.set_len(str_loc);
            }
            return Err(Error::new_c(idx, c as char, $t));
        }};
    }

    macro_rules! update_char {
        () => {
            if likely!(i < n_structural_indexes) {
                idx = get!(structural_indexes, i) as usize;
                i += 1;
                c = get!(input, idx);
            } else {
                // the document ended with a value still expected
                idx = len;
                c = 0;
                fail!(ErrorType::TapeError);
            }
        };
    }

    macro_rules! peek_char {
        () => {
            if likely!(i < n_structural_indexes) {
                get!(input, get!(structural_indexes, i) as usize)
            } else {
                idx = len;
                c = 0;
                fail!(ErrorType::TapeError);
            }
        };
    }

    macro_rules! goto {
        ($state:expr) => {{
            state = $state;
            continue;
        }};
    }

    macro_rules! start_scope {
        ($ret:expr) => {
            if unlikely!(depth >= max_depth) {
                fail!();
            }
            unsafe {
                stack_ptr.add(depth).write(ContainingScope {
                    tape_index: writer.next_tape_index() as u32,
                    count: 0,
                    ret: $ret,
                });
            }
            // the start word is only written once its end index is known
            writer.skip();
            depth += 1;
        };
    }

    macro_rules! end_scope {
        ($start_tag:expr, $end_tag:expr) => {{
            depth -= 1;
            let scope = unsafe { *stack_ptr.add(depth) };
            unsafe { writer.append(u64::from(scope.tape_index), $end_tag) };
            let cnt = u64::from(scope.count.min(0x00FF_FFFF));
            let val = (writer.next_tape_index() as u64) | (cnt << 32);
            unsafe { writer.write(scope.tape_index as usize, val, $start_tag) };
        }};
    }

    // A value lands in the scope one below the current depth.
    macro_rules! increment_count {
        () => {
            unsafe { (*stack_ptr.add(depth - 1)).count += 1 }
        };
    }

    macro_rules! parse_string {
        () => {{
            unsafe { writer.append(str_loc as u64, TapeTag::String) };
            // leave four bytes for the length prefix, back-filled on success
            let dst = unsafe { str_ptr.add(str_loc + 4) };
            match unsafe { parse_str(input_ptr.add(idx), input_end, dst) } {
                Some(end) => unsafe {
                    let str_len = end.offset_from(dst) as usize;
                    str_ptr
                        .add(str_loc)
                        .cast::<[u8; 4]>()
                        .write((str_len as u32).to_le_bytes());
                    end.write(0);
                    str_loc += 4 + str_len + 1;
                },
                None => fail!(),
            }
        }};
    }

    macro_rules! parse_number {
        () => {
            if unlikely!(unsafe { !parse_number(input_ptr.add(idx), &mut writer) }) {
                fail!();
            }
        };
    }

    macro_rules! parse_true_atom {
        () => {{
            if unlikely!(!is_valid_true_atom(unsafe { input.get_kinda_unchecked(idx..) })) {
                fail!();
            }
            unsafe { writer.append(0, TapeTag::TrueValue) };
        }};
    }

    macro_rules! parse_false_atom {
        () => {{
            if unlikely!(!is_valid_false_atom(unsafe { input.get_kinda_unchecked(idx..) })) {
                fail!();
            }
            unsafe { writer.append(0, TapeTag::FalseValue) };
        }};
    }

    macro_rules! parse_null_atom {
        () => {{
            if unlikely!(!is_valid_null_atom(unsafe { input.get_kinda_unchecked(idx..) })) {
                fail!();
            }
            unsafe { writer.append(0, TapeTag::NullValue) };
        }};
    }

    macro_rules! finish {
        () => {{
            // close the root document scope
            end_scope!(TapeTag::Root, TapeTag::Root);
            if unlikely!(depth != 0) {
                fail!(ErrorType::TapeError);
            }
            if !STREAMING && unlikely!(i != n_structural_indexes) {
                // structural content after the root value
                idx = get!(structural_indexes, i) as usize;
                c = get!(input, idx);
                fail!(ErrorType::TapeError);
            }
            success!();
        }};
    }

    // Push the root document scope, then dispatch on the first value. The
    // root leaf parsers use the length-aware variants because the last value
    // of the document may end flush with the buffer.
    start_scope!(ScopeReturn::Finish);
    update_char!();
    match c {
        b'{' => {
            start_scope!(ScopeReturn::Finish);
            state = State::ObjectBegin;
        }
        b'[' => {
            start_scope!(ScopeReturn::Finish);
            if !STREAMING {
                // Structural indexing and the grammar must agree on where a
                // root array ends; if the last structural byte is not `]`
                // the index array cannot be trusted at depth.
                let last = get!(structural_indexes, n_structural_indexes - 1) as usize;
                if unlikely!(get!(input, last) != b']') {
                    fail!(ErrorType::TapeError);
                }
            }
            state = State::ArrayBegin;
        }
        b'"' => {
            parse_string!();
            finish!();
        }
        b't' => {
            if unlikely!(!is_valid_true_atom_root(
                unsafe { input.get_kinda_unchecked(idx..) },
                len - idx
            )) {
                fail!();
            }
            unsafe { writer.append(0, TapeTag::TrueValue) };
            finish!();
        }
        b'f' => {
            if unlikely!(!is_valid_false_atom_root(
                unsafe { input.get_kinda_unchecked(idx..) },
                len - idx
            )) {
                fail!();
            }
            unsafe { writer.append(0, TapeTag::FalseValue) };
            finish!();
        }
        b'n' => {
            if unlikely!(!is_valid_null_atom_root(
                unsafe { input.get_kinda_unchecked(idx..) },
                len - idx
            )) {
                fail!();
            }
            unsafe { writer.append(0, TapeTag::NullValue) };
            finish!();
        }
        b'-' | b'0'..=b'9' => {
            // The caller's padding bytes are unspecified, so a root number
            // is re-terminated with spaces in a scratch copy before parsing.
            let mut copy = vec![b' '; len + PADDING];
            copy[..len].copy_from_slice(unsafe { input.get_kinda_unchecked(..len) });
            if unlikely!(unsafe { !parse_number(copy.as_ptr().add(idx), &mut writer) }) {
                fail!();
            }
            finish!();
        }
        _ => fail!(),
    }

    loop {
        match state {
            State::ObjectBegin => {
                update_char!();
                match c {
                    b'"' => {
                        increment_count!();
                        parse_string!();
                        goto!(State::ObjectKey);
                    }
                    b'}' => {
                        end_scope!(TapeTag::StartObject, TapeTag::EndObject);
                        goto!(State::ScopeEnd);
                    }
                    _ => fail!(),
                }
            }

            State::ObjectKey => {
                update_char!();
                if unlikely!(c != b':') {
                    fail!();
                }
                update_char!();
                match c {
                    b'{' => {
                        start_scope!(ScopeReturn::ObjectContinue);
                        goto!(State::ObjectBegin);
                    }
                    b'[' => {
                        start_scope!(ScopeReturn::ObjectContinue);
                        goto!(State::ArrayBegin);
                    }
                    b'"' => parse_string!(),
                    b't' => parse_true_atom!(),
                    b'f' => parse_false_atom!(),
                    b'n' => parse_null_atom!(),
                    b'-' | b'0'..=b'9' => parse_number!(),
                    _ => fail!(),
                }
                goto!(State::ObjectContinue);
            }

            State::ObjectContinue => {
                update_char!();
                match c {
                    b',' => {
                        increment_count!();
                        update_char!();
                        if unlikely!(c != b'"') {
                            fail!();
                        }
                        parse_string!();
                        goto!(State::ObjectKey);
                    }
                    b'}' => {
                        end_scope!(TapeTag::StartObject, TapeTag::EndObject);
                        goto!(State::ScopeEnd);
                    }
                    _ => fail!(),
                }
            }

            State::ScopeEnd => {
                // resume wherever the scope that just closed said to
                match unsafe { (*stack_ptr.add(depth)).ret } {
                    ScopeReturn::ArrayContinue => goto!(State::ArrayContinue),
                    ScopeReturn::ObjectContinue => goto!(State::ObjectContinue),
                    ScopeReturn::Finish => finish!(),
                }
            }

            State::ArrayBegin => {
                if peek_char!() == b']' {
                    update_char!();
                    end_scope!(TapeTag::StartArray, TapeTag::EndArray);
                    goto!(State::ScopeEnd);
                }
                increment_count!();
                goto!(State::MainArraySwitch);
            }

            State::MainArraySwitch => {
                update_char!();
                match c {
                    b'{' => {
                        start_scope!(ScopeReturn::ArrayContinue);
                        goto!(State::ObjectBegin);
                    }
                    b'[' => {
                        start_scope!(ScopeReturn::ArrayContinue);
                        goto!(State::ArrayBegin);
                    }
                    b'"' => parse_string!(),
                    b't' => parse_true_atom!(),
                    b'f' => parse_false_atom!(),
                    b'n' => parse_null_atom!(),
                    b'-' | b'0'..=b'9' => parse_number!(),
                    _ => fail!(),
                }
                goto!(State::ArrayContinue);
            }

            State::ArrayContinue => {
                update_char!();
                match c {
                    b',' => {
                        increment_count!();
                        goto!(State::MainArraySwitch);
                    }
                    b']' => {
                        end_scope!(TapeTag::StartArray, TapeTag::EndArray);
                        goto!(State::ScopeEnd);
                    }
                    _ => fail!(),
                }
            }
        }
    }
}
