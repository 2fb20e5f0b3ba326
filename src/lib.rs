//! Structural tape builder for two-stage JSON parsing.
//!
//! Parsing runs in two passes over a padded copy of the input. Stage 1 scans
//! 64-byte blocks and records the byte offset of every structurally
//! significant character (braces, brackets, commas, colons, opening quotes
//! and the first byte of every scalar). Stage 2 walks those offsets with a
//! flat state machine and emits the *tape*: one 64-bit word per structural
//! element, with container boundaries cross-referenced so consumers can skip
//! subtrees in constant time, plus a string buffer holding the unescaped
//! string data.
//!
//! ```
//! let tape = simd_tape::to_tape(br#"{"a": [1, 2], "b": "three"}"#)?;
//! assert_eq!(tape.to_json(), r#"{"a":[1,2],"b":"three"}"#);
//! # Ok::<(), simd_tape::Error>(())
//! ```
//!
//! The scratch buffers can be reused across documents to avoid repeated
//! allocation:
//!
//! ```
//! let mut buffers = simd_tape::Buffers::new(64);
//! for doc in [&br#"[1,2,3]"#[..], &br#"{"k":true}"#[..]] {
//!     let tape = simd_tape::to_tape_with_buffers(doc, &mut buffers)?;
//!     assert!(tape.len() > 2);
//! }
//! # Ok::<(), simd_tape::Error>(())
//! ```

#![warn(clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_safety_doc,
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;

#[macro_use]
mod macros;

mod atomparse;
mod charutils;
mod error;
mod impls;
mod numberparse;
mod safer_unchecked;
mod stage1;
mod stage2;
mod stringparse;
mod tape;


pub use crate::error::{Error, ErrorType};
pub use crate::tape::{Node, Tape, TapeTag};

pub type Result<T> = std::result::Result<T, Error>;

/// Readable bytes guaranteed past the end of the working input buffer.
/// Fixed-width atom checks and number lookahead may overread by up to this
/// much, and SIMD stage-1 backends load whole blocks.
pub const PADDING: usize = 32;

/// Default cap on container nesting. One level is taken by the document
/// itself.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

const ALIGNMENT: usize = 64;

/// A 64-byte-aligned owned byte buffer. Holds the padded copy of the input
/// so block loads never cross into unmapped memory.
pub struct AlignedBuf {
    layout: Layout,
    capacity: usize,
    len: usize,
    inner: NonNull<u8>,
}

// The buffer is plain bytes behind a unique owner.
unsafe impl Send for AlignedBuf {}
unsafe impl Sync for AlignedBuf {}

impl AlignedBuf {
    /// Allocate an aligned buffer of `capacity` bytes with length zero.
    ///
    /// # Panics
    /// On allocation failure or a capacity that overflows the layout rules.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            return Self {
                layout: Layout::new::<u8>(),
                capacity: 0,
                len: 0,
                inner: NonNull::dangling(),
            };
        }
        let layout = match Layout::from_size_align(capacity, ALIGNMENT) {
            Ok(layout) => layout,
            Err(_) => Self::capacity_overflow(),
        };
        let inner = match NonNull::new(unsafe { alloc(layout) }) {
            Some(inner) => inner,
            None => handle_alloc_error(layout),
        };
        Self {
            layout,
            capacity,
            len: 0,
            inner,
        }
    }

    fn capacity_overflow() -> ! {
        panic!("capacity overflow")
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.inner.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.inner.as_ptr()
    }

    /// # Safety
    /// The first `n` bytes must have been initialized and `n` must not
    /// exceed the capacity.
    pub unsafe fn set_len(&mut self, n: usize) {
        debug_assert!(n <= self.capacity);
        self.len = n;
    }
}

impl Deref for AlignedBuf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        unsafe { std::slice::from_raw_parts(self.inner.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        if self.capacity != 0 {
            unsafe { dealloc(self.inner.as_ptr(), self.layout) }
        }
    }
}

impl fmt::Debug for AlignedBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Reusable scratch space for parsing: the padded input copy, the
/// structural index vector and the scope stack. Reusing one `Buffers`
/// across documents keeps the hot path allocation-free once the buffers
/// have grown to the working-set size.
#[derive(Debug)]
pub struct Buffers {
    input_buffer: AlignedBuf,
    structural_indexes: Vec<u32>,
    stack: Vec<stage2::ContainingScope>,
}

impl Default for Buffers {
    fn default() -> Self {
        Self::new(128)
    }
}

impl Buffers {
    /// Scratch space sized for inputs of roughly `input_len` bytes; every
    /// buffer grows on demand if a larger document comes along.
    #[must_use]
    pub fn new(input_len: usize) -> Self {
        Self {
            input_buffer: AlignedBuf::with_capacity(input_len + PADDING),
            structural_indexes: Vec::with_capacity(input_len / 2),
            stack: Vec::with_capacity(DEFAULT_MAX_DEPTH),
        }
    }
}

/// Parse `input` into a fresh [`Tape`] with internally allocated buffers.
pub fn to_tape(input: &[u8]) -> Result<Tape> {
    let mut buffers = Buffers::new(input.len());
    to_tape_with_buffers(input, &mut buffers)
}

/// Parse `input` into a fresh [`Tape`], reusing `buffers` for scratch.
pub fn to_tape_with_buffers(input: &[u8], buffers: &mut Buffers) -> Result<Tape> {
    to_tape_with_buffers_and_max_depth(input, buffers, DEFAULT_MAX_DEPTH)
}

/// [`to_tape_with_buffers`] with an explicit nesting cap. Opening a scope
/// past `max_depth` fails with [`ErrorType::DepthError`].
pub fn to_tape_with_buffers_and_max_depth(
    input: &[u8],
    buffers: &mut Buffers,
    max_depth: usize,
) -> Result<Tape> {
    let len = input.len();

    if simdutf8::basic::from_utf8(input).is_err() {
        return Err(Error::generic(ErrorType::InvalidUtf8));
    }

    if buffers.input_buffer.capacity() < len + PADDING {
        buffers.input_buffer = AlignedBuf::with_capacity(len + PADDING);
    }
    unsafe {
        let ptr = buffers.input_buffer.as_mut_ptr();
        ptr.copy_from_nonoverlapping(input.as_ptr(), len);
        // zeroed padding is inert for every downstream scan
        ptr.add(len).write_bytes(0, PADDING);
        buffers.input_buffer.set_len(len + PADDING);
    }

    stage1::find_structural_bits::<impls::native::SimdInput>(
        &buffers.input_buffer,
        len,
        &mut buffers.structural_indexes,
    )
    .map_err(Error::generic)?;

    let mut tape = Tape::default();
    stage2::build_tape::<false>(
        &buffers.input_buffer,
        len,
        &buffers.structural_indexes,
        0,
        max_depth,
        &mut buffers.stack,
        &mut tape.tape,
        &mut tape.string_buf,
    )?;
    Ok(tape)
}
