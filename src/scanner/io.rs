// src/scanner/io.rs
use std::io::{BufWriter, Read, Write};

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use super::buffer::{ALIGNMENT, ENTRY_SIZE, align_up};
use super::error::{FormatError, Result};
use super::letters::Letters;
use super::multi::Scanner;

// -------------------- Binary header --------------------

pub(crate) const MAGIC: &[u8; 8] = b"SCNGLUE\0";
pub(crate) const FORMAT_VERSION: u32 = 1;
pub(crate) const HEADER_LEN: usize = 8 + 4 + 4 + 4 + 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub(crate) enum ScannerKind {
    Simple = 1,
    Multi = 2,
}

pub(crate) fn header_bytes(kind: ScannerKind, locals_len: usize) -> [u8; HEADER_LEN] {
    let mut h = [0u8; HEADER_LEN];
    h[..8].copy_from_slice(MAGIC);
    h[8..12].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    h[12..16].copy_from_slice(&(kind as u32).to_le_bytes());
    h[16..20].copy_from_slice(&(locals_len as u32).to_le_bytes());
    // 20..24 reserved
    h
}

pub(crate) fn validate_header(h: &[u8], kind: ScannerKind, locals_len: usize) -> Result<()> {
    let mut c = MapCursor::new(h);
    if c.take(8, "header")? != MAGIC {
        return Err(FormatError::BadMagic.into());
    }
    let version = c.take_u32("header")?;
    if version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion {
            found: version,
            expected: FORMAT_VERSION,
        }
        .into());
    }
    let found_kind = c.take_u32("header")?;
    if found_kind != kind as u32 {
        return Err(FormatError::WrongKind {
            found: found_kind,
            expected: kind as u32,
        }
        .into());
    }
    let found_locals = c.take_u32("header")?;
    if found_locals as usize != locals_len {
        return Err(FormatError::LocalsSize {
            found: found_locals,
            expected: locals_len as u32,
        }
        .into());
    }
    let _reserved = c.take_u32("header")?;
    Ok(())
}

// -------------------- Slice cursor (mmap path) --------------------

/// Forward-only reader over a borrowed image; every slice it hands out lives
/// as long as the image itself.
pub(crate) struct MapCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MapCursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.data.len())
            .ok_or(FormatError::Eof { what })?;
        let s = &self.data[self.pos..end];
        self.pos = end;
        Ok(s)
    }

    pub(crate) fn take_u16(&mut self, what: &'static str) -> Result<u16> {
        let mut le = [0u8; 2];
        le.copy_from_slice(self.take(2, what)?);
        Ok(u16::from_le_bytes(le))
    }

    pub(crate) fn take_u32(&mut self, what: &'static str) -> Result<u32> {
        let mut le = [0u8; 4];
        le.copy_from_slice(self.take(4, what)?);
        Ok(u32::from_le_bytes(le))
    }

    pub(crate) fn take_u64(&mut self, what: &'static str) -> Result<u64> {
        let mut le = [0u8; 8];
        le.copy_from_slice(self.take(8, what)?);
        Ok(u64::from_le_bytes(le))
    }

    /// Skips padding up to the next aligned offset. A short tail is not an
    /// error: the image may legitimately end right after the last section.
    pub(crate) fn align(&mut self) {
        self.pos = align_up(self.pos).min(self.data.len());
    }

    pub(crate) fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

// -------------------- Stream helpers (save/load path) --------------------

/// Counts bytes so padding can be computed without seeking.
pub(crate) struct CountingWriter<W: Write> {
    inner: BufWriter<W>,
    written: usize,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(w: W) -> Self {
        Self {
            inner: BufWriter::new(w),
            written: 0,
        }
    }

    pub(crate) fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len();
        Ok(())
    }

    pub(crate) fn put_entries(&mut self, entries: &[u64]) -> Result<()> {
        // stream in reasonably large chunks to reduce syscalls
        const CHUNK: usize = 1 << 16;
        let mut bytes = Vec::with_capacity(CHUNK.min(entries.len()) * ENTRY_SIZE);
        for chunk in entries.chunks(CHUNK) {
            bytes.clear();
            for &e in chunk {
                bytes.extend_from_slice(&e.to_le_bytes());
            }
            self.put(&bytes)?;
        }
        Ok(())
    }

    pub(crate) fn pad(&mut self) -> Result<()> {
        let pad = align_up(self.written) - self.written;
        self.put(&[0u8; ALIGNMENT][..pad])
    }

    pub(crate) fn finish(mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// `read_exact` that reports a short read as a format error naming `what`.
pub(crate) fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8], what: &'static str) -> Result<()> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FormatError::Eof { what }.into()
        } else {
            e.into()
        }
    })
}

/// Reads padding after `consumed` bytes of an image.
pub(crate) fn skip_padding<R: Read>(r: &mut R, consumed: usize) -> Result<()> {
    let pad = align_up(consumed) - consumed;
    let mut sink = [0u8; ALIGNMENT];
    read_exact_or_eof(r, &mut sink[..pad], "padding")
}

pub(crate) fn read_entries<R: Read>(r: &mut R, n: usize, what: &'static str) -> Result<Vec<u64>> {
    // the count comes from an untrusted header; let a short stream fail first
    let mut out = Vec::with_capacity(n.min(1 << 20));
    let mut le = [0u8; ENTRY_SIZE];
    for _ in 0..n {
        read_exact_or_eof(r, &mut le, what)?;
        out.push(u64::from_le_bytes(le));
    }
    Ok(out)
}

pub(crate) fn geometry(msg: String) -> super::error::ScanError {
    FormatError::BadGeometry(msg).into()
}

// -------------------- JSON (debug dump) --------------------

#[serde_as]
#[derive(Serialize, Deserialize)]
struct ScannerDisk {
    #[serde_as(as = "[_; 256]")]
    letters: [u16; 256],
    states_count: u32,
    regexps_count: u32,
    initial: u64,
    final_index: Vec<u64>,
    final_table: Vec<u64>,
    transitions: Vec<u64>,
}

impl From<&Scanner<'_>> for ScannerDisk {
    fn from(s: &Scanner<'_>) -> Self {
        Self {
            letters: *s.letters().map(),
            states_count: s.size() as u32,
            regexps_count: s.regexps_count() as u32,
            initial: s.initial_offset() as u64,
            final_index: s.final_index().to_vec(),
            final_table: s.final_table().to_vec(),
            transitions: s.transitions().to_vec(),
        }
    }
}

impl ScannerDisk {
    fn into_scanner(self) -> Result<Scanner<'static>> {
        let letters = Letters::from_map(self.letters)
            .ok_or_else(|| geometry("letter classes are not dense".into()))?;
        Scanner::from_parts(
            letters,
            self.states_count as usize,
            self.regexps_count as usize,
            self.initial,
            self.final_index,
            self.final_table,
            self.transitions,
        )
    }
}

pub fn save_scanner_json(path: &std::path::Path, s: &Scanner<'_>) -> Result<()> {
    let f = std::fs::File::create(path)?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer(&mut w, &ScannerDisk::from(s))?;
    w.flush()?;
    Ok(())
}

pub fn load_scanner_json_bytes(data: &[u8]) -> Result<Scanner<'static>> {
    serde_json::from_slice::<ScannerDisk>(data)?.into_scanner()
}
