// src/scanner/buffer.rs
// Backing storage for compact scanners: either an owned heap buffer or a
// read-only view over memory someone else keeps alive (typically an mmap).

use std::ops::Deref;

use super::error::{FormatError, Result, ScanError};

/// Width of one table entry in bytes.
pub const ENTRY_SIZE: usize = std::mem::size_of::<u64>();

/// Alignment every serialized section starts on.
pub const ALIGNMENT: usize = ENTRY_SIZE;

#[derive(Clone, Debug)]
pub enum Buffer<'a> {
    Owned(Vec<u64>),
    Borrowed(&'a [u64]),
}

impl Default for Buffer<'_> {
    fn default() -> Self {
        Buffer::Owned(Vec::new())
    }
}

impl<'a> Buffer<'a> {
    pub fn zeroed(entries: usize) -> Self {
        Buffer::Owned(vec![0u64; entries])
    }

    /// Binds `bytes` as a table of little-endian `u64` entries without copying.
    pub fn borrow_bytes(bytes: &'a [u8]) -> Result<Self> {
        if cfg!(target_endian = "big") {
            return Err(FormatError::BigEndian.into());
        }
        if bytes.len() % ENTRY_SIZE != 0 {
            return Err(FormatError::BadGeometry(format!(
                "buffer length {} is not a multiple of {ENTRY_SIZE}",
                bytes.len()
            ))
            .into());
        }
        // SAFETY: every bit pattern is a valid u64; the prefix check below
        // rejects inputs whose start is not suitably aligned.
        let (prefix, words, suffix) = unsafe { bytes.align_to::<u64>() };
        if !prefix.is_empty() || !suffix.is_empty() {
            return Err(FormatError::Misaligned { align: ALIGNMENT }.into());
        }
        Ok(Buffer::Borrowed(words))
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Buffer::Owned(_))
    }

    /// Write access; mapped buffers are read-only for their whole lifetime.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u64]> {
        match self {
            Buffer::Owned(v) => Ok(v.as_mut_slice()),
            Buffer::Borrowed(_) => Err(ScanError::Precondition(
                "attempt to modify a scanner bound over borrowed memory".into(),
            )),
        }
    }

    pub fn into_owned(self) -> Buffer<'static> {
        match self {
            Buffer::Owned(v) => Buffer::Owned(v),
            Buffer::Borrowed(s) => Buffer::Owned(s.to_vec()),
        }
    }
}

impl Deref for Buffer<'_> {
    type Target = [u64];

    #[inline(always)]
    fn deref(&self) -> &[u64] {
        match self {
            Buffer::Owned(v) => v,
            Buffer::Borrowed(s) => s,
        }
    }
}

/// Serialized scanner bytes copied into 8-byte aligned storage, suitable for
/// `mmap`-style binding when the source could not guarantee alignment.
#[derive(Clone, Debug, Default)]
pub struct AlignedBytes {
    words: Vec<u64>,
    len: usize,
}

impl AlignedBytes {
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut words = vec![0u64; bytes.len().div_ceil(ENTRY_SIZE)];
        for (w, chunk) in words.iter_mut().zip(bytes.chunks(ENTRY_SIZE)) {
            let mut le = [0u8; ENTRY_SIZE];
            le[..chunk.len()].copy_from_slice(chunk);
            *w = u64::from_ne_bytes(le);
        }
        Self {
            words,
            len: bytes.len(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the Vec owns at least `len` initialized bytes, and u8 has no
        // alignment or validity requirements.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[inline]
pub fn align_up(n: usize) -> usize {
    n.div_ceil(ALIGNMENT) * ALIGNMENT
}
