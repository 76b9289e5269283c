// src/scanner/multi.rs
// Multi-pattern compact scanner. This is what glue produces.
//
// Buffer layout (all u64 entries):
//   final_index[states]          offset of each state's record in final_table
//   final_table[final_len]       ids..., FINAL_SENTINEL per state
//   transitions[states * row]    row = [tag, delta(letter 0), ..., delta(letter k-1)]
//
// A live state is the byte offset of its row's first letter entry from the
// start of the transition region, so `next` is one load and one add.

use std::io::{Read, Write};

use super::automaton::Automaton;
use super::buffer::{ALIGNMENT, Buffer, ENTRY_SIZE};
use super::error::{FormatError, Result, ScanError};
use super::fsm::Fsm;
use super::io::{
    CountingWriter, HEADER_LEN, MapCursor, ScannerKind, geometry, header_bytes, read_entries,
    read_exact_or_eof, skip_padding, validate_header,
};
use super::letters::Letters;

pub type State = usize;

pub const FINAL_FLAG: u64 = 1;
pub const DEAD_FLAG: u64 = 2;
/// Terminates every finalization record.
pub const FINAL_SENTINEL: u64 = u64::MAX;

const LOCALS_LEN: usize = 4 + 4 + 4 + 4 + 8 + 8;
const LETTERS_LEN: usize = 256 * 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Locals {
    states_count: u32,
    letters_count: u32,
    regexps_count: u32,
    initial: u64,
    final_table_len: u64,
}

impl Locals {
    fn to_bytes(self) -> [u8; LOCALS_LEN] {
        let mut b = [0u8; LOCALS_LEN];
        b[0..4].copy_from_slice(&self.states_count.to_le_bytes());
        b[4..8].copy_from_slice(&self.letters_count.to_le_bytes());
        b[8..12].copy_from_slice(&self.regexps_count.to_le_bytes());
        // 12..16 reserved
        b[16..24].copy_from_slice(&self.initial.to_le_bytes());
        b[24..32].copy_from_slice(&self.final_table_len.to_le_bytes());
        b
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        let mut c = MapCursor::new(bytes);
        let states_count = c.take_u32("locals")?;
        let letters_count = c.take_u32("locals")?;
        let regexps_count = c.take_u32("locals")?;
        let _reserved = c.take_u32("locals")?;
        let initial = c.take_u64("locals")?;
        let final_table_len = c.take_u64("locals")?;
        Ok(Self {
            states_count,
            letters_count,
            regexps_count,
            initial,
            final_table_len,
        })
    }

    fn row_len(&self) -> usize {
        self.letters_count as usize + 1
    }

    /// Validates the declared geometry and returns the buffer size in entries.
    fn check(&self, letters: &Letters) -> Result<usize> {
        if self.letters_count as usize != letters.count() {
            return Err(geometry(format!(
                "declared {} letters, table has {}",
                self.letters_count,
                letters.count()
            )));
        }
        let states = self.states_count as usize;
        if states == 0 {
            return Err(geometry("scanner has no states".into()));
        }
        let row_bytes = self.row_len() * ENTRY_SIZE;
        let init = self.initial as usize;
        if init % row_bytes != ENTRY_SIZE || init / row_bytes >= states {
            return Err(geometry(format!("initial offset {} out of range", self.initial)));
        }
        if (self.final_table_len as usize) < states {
            return Err(geometry(format!(
                "final table of {} entries cannot hold {states} records",
                self.final_table_len
            )));
        }
        states
            .checked_mul(self.row_len())
            .and_then(|t| t.checked_add(states))
            .and_then(|t| t.checked_add(self.final_table_len as usize))
            .ok_or_else(|| geometry("buffer size overflows".into()))
    }
}

/// Deterministic multi-pattern scanner over a letter partition.
#[derive(Clone, Debug)]
pub struct Scanner<'a> {
    m: Locals,
    letters: Letters,
    buffer: Buffer<'a>,
    /// Write cursor into the final table while a scanner is being built.
    final_end: usize,
}

impl Default for Scanner<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Scanner<'a> {
    /// Null scanner: a single dead, non-accepting state over one letter.
    /// Gluing it with `s` yields a scanner equivalent to `s`.
    pub fn new() -> Self {
        Self {
            m: Locals {
                states_count: 1,
                letters_count: 1,
                regexps_count: 0,
                initial: ENTRY_SIZE as u64,
                final_table_len: 1,
            },
            letters: Letters::single(),
            // final_index | final_table | [tag, delta]
            buffer: Buffer::Owned(vec![0, FINAL_SENTINEL, DEAD_FLAG, 0]),
            final_end: 1,
        }
    }

    /// Allocates a zeroed scanner with room for `states` rows and
    /// `final_ids` matched ids (plus one sentinel per state). Row 0 is the
    /// initial state until `set_initial` says otherwise.
    pub(crate) fn init(
        states: usize,
        letters: Letters,
        final_ids: usize,
        regexps_count: usize,
    ) -> Result<Scanner<'static>> {
        let states_count = u32::try_from(states).map_err(|_| ScanError::SizeExceeded {
            resource: "scanner states",
            limit: u32::MAX as usize,
        })?;
        let regexps_count = u32::try_from(regexps_count).map_err(|_| ScanError::SizeExceeded {
            resource: "pattern count",
            limit: u32::MAX as usize,
        })?;
        let final_table_len = final_ids.checked_add(states).ok_or(ScanError::SizeExceeded {
            resource: "final table",
            limit: usize::MAX,
        })?;
        let m = Locals {
            states_count,
            letters_count: letters.count() as u32,
            regexps_count,
            initial: ENTRY_SIZE as u64,
            final_table_len: final_table_len as u64,
        };
        let entries = m.check(&letters)?;
        Ok(Scanner {
            m,
            letters,
            buffer: Buffer::zeroed(entries),
            final_end: 0,
        })
    }

    /// Builds a single-pattern scanner (pattern id 0) from `fsm`.
    pub fn from_fsm(fsm: &Fsm) -> Result<Scanner<'static>> {
        let fsm = fsm.canonize()?;
        let letters = fsm.letters();
        let reps = letters.representatives();
        let dead = fsm.dead_states();
        let finals = (0..fsm.size()).filter(|&s| fsm.is_final(s)).count();

        let mut sc = Scanner::init(fsm.size(), letters, finals, 1)?;
        for state in 0..fsm.size() {
            let ids: &[u64] = if fsm.is_final(state) { &[0] } else { &[] };
            sc.push_final_record(state, ids.iter().copied())?;
            let tag = (if fsm.is_final(state) { FINAL_FLAG } else { 0 })
                | (if dead[state] { DEAD_FLAG } else { 0 });
            sc.set_tag(state, tag)?;
            for (letter, &b) in reps.iter().enumerate() {
                if let Some(&to) = fsm.destinations(state, b).first() {
                    sc.set_jump(state, letter, to)?;
                }
            }
        }
        sc.set_initial(fsm.initial())?;
        log::debug!(
            "[scanner] built {} states over {} letters",
            sc.size(),
            sc.letters_count()
        );
        Ok(sc)
    }

    /// Reassembles a scanner from its raw sections.
    pub(crate) fn from_parts(
        letters: Letters,
        states: usize,
        regexps_count: usize,
        initial: u64,
        final_index: Vec<u64>,
        final_table: Vec<u64>,
        transitions: Vec<u64>,
    ) -> Result<Scanner<'static>> {
        let m = Locals {
            states_count: u32::try_from(states)
                .map_err(|_| geometry(format!("{states} states")))?,
            letters_count: letters.count() as u32,
            regexps_count: u32::try_from(regexps_count)
                .map_err(|_| geometry(format!("{regexps_count} patterns")))?,
            initial,
            final_table_len: final_table.len() as u64,
        };
        let entries = m.check(&letters)?;
        if final_index.len() != states || final_index.len() + final_table.len() + transitions.len() != entries
        {
            return Err(geometry("section sizes disagree with declared geometry".into()));
        }
        let mut buf = final_index;
        buf.extend_from_slice(&final_table);
        buf.extend_from_slice(&transitions);
        Ok(Scanner {
            final_end: m.final_table_len as usize,
            m,
            letters,
            buffer: Buffer::Owned(buf),
        })
    }

    // -------------------- geometry --------------------

    pub fn size(&self) -> usize {
        self.m.states_count as usize
    }

    pub fn regexps_count(&self) -> usize {
        self.m.regexps_count as usize
    }

    pub fn letters_count(&self) -> usize {
        self.m.letters_count as usize
    }

    pub fn letters(&self) -> &Letters {
        &self.letters
    }

    #[inline(always)]
    fn row_len(&self) -> usize {
        self.m.row_len()
    }

    fn final_start(&self) -> usize {
        self.size()
    }

    fn transitions_start(&self) -> usize {
        self.final_start() + self.m.final_table_len as usize
    }

    pub fn final_index(&self) -> &[u64] {
        &self.buffer[..self.final_start()]
    }

    pub fn final_table(&self) -> &[u64] {
        &self.buffer[self.final_start()..self.transitions_start()]
    }

    pub fn transitions(&self) -> &[u64] {
        &self.buffer[self.transitions_start()..]
    }

    /// Size of the memory buffer in bytes.
    pub fn buf_size(&self) -> usize {
        self.buffer.len() * ENTRY_SIZE
    }

    pub fn owns_buffer(&self) -> bool {
        self.buffer.is_owned()
    }

    /// Deep copy that no longer borrows from a mapping.
    pub fn to_owned_scanner(&self) -> Scanner<'static> {
        Scanner {
            m: self.m,
            letters: self.letters.clone(),
            buffer: self.buffer.clone().into_owned(),
            final_end: self.final_end,
        }
    }

    // -------------------- matching --------------------

    pub fn initial_offset(&self) -> usize {
        self.m.initial as usize
    }

    #[inline(always)]
    pub fn initialize(&self) -> State {
        self.m.initial as usize
    }

    #[inline(always)]
    pub fn next(&self, state: State, byte: u8) -> State {
        let delta = self.transitions()[state / ENTRY_SIZE + self.letters.get(byte)];
        state.wrapping_add(delta as usize)
    }

    #[inline(always)]
    pub fn tag(&self, state: State) -> u64 {
        self.transitions()[state / ENTRY_SIZE - 1]
    }

    #[inline(always)]
    pub fn is_final(&self, state: State) -> bool {
        self.tag(state) & FINAL_FLAG != 0
    }

    #[inline(always)]
    pub fn is_dead(&self, state: State) -> bool {
        self.tag(state) & DEAD_FLAG != 0
    }

    pub fn state_index(&self, state: State) -> usize {
        state / (self.row_len() * ENTRY_SIZE)
    }

    /// Live state handle of row `index`.
    pub fn state_at(&self, index: usize) -> State {
        (index * self.row_len() + 1) * ENTRY_SIZE
    }

    pub fn accepted_regexps(&self, state: State) -> &[u64] {
        let Some(&start) = self.final_index().get(self.state_index(state)) else {
            return &[];
        };
        let tail = self.final_table().get(start as usize..).unwrap_or(&[]);
        let len = tail
            .iter()
            .position(|&id| id == FINAL_SENTINEL)
            .unwrap_or(tail.len());
        &tail[..len]
    }

    // -------------------- construction --------------------

    fn check_state(&self, index: usize) -> Result<()> {
        if index < self.size() {
            Ok(())
        } else {
            Err(ScanError::Precondition(format!(
                "state {index} out of range (size {})",
                self.size()
            )))
        }
    }

    pub(crate) fn set_jump(&mut self, from: usize, letter: usize, to: usize) -> Result<()> {
        self.check_state(from)?;
        self.check_state(to)?;
        if letter >= self.letters_count() {
            return Err(ScanError::Precondition(format!("letter {letter} out of range")));
        }
        let row = self.row_len();
        let at = self.transitions_start() + from * row + 1 + letter;
        let delta = (to as i64 - from as i64) * (row * ENTRY_SIZE) as i64;
        self.buffer.as_mut_slice()?[at] = delta as u64;
        Ok(())
    }

    pub(crate) fn set_tag(&mut self, state: usize, tag: u64) -> Result<()> {
        self.check_state(state)?;
        let at = self.transitions_start() + state * self.row_len();
        self.buffer.as_mut_slice()?[at] = tag;
        Ok(())
    }

    pub(crate) fn set_initial(&mut self, state: usize) -> Result<()> {
        self.check_state(state)?;
        self.buffer.as_mut_slice()?;
        self.m.initial = self.state_at(state) as u64;
        Ok(())
    }

    /// Appends the finalization record of `state`: its ids then the sentinel.
    pub(crate) fn push_final_record<I>(&mut self, state: usize, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = u64>,
    {
        self.check_state(state)?;
        let base = self.final_start();
        let cap = self.m.final_table_len as usize;
        let overflow = ScanError::SizeExceeded {
            resource: "final table",
            limit: cap,
        };
        let mut end = self.final_end;
        let buf = self.buffer.as_mut_slice()?;
        buf[state] = end as u64;
        for id in ids.into_iter().chain(std::iter::once(FINAL_SENTINEL)) {
            if end >= cap {
                return Err(overflow);
            }
            buf[base + end] = id;
            end += 1;
        }
        self.final_end = end;
        Ok(())
    }

    /// True once every slot of the final table has been written.
    pub(crate) fn final_table_complete(&self) -> bool {
        self.final_end == self.m.final_table_len as usize
    }

    // -------------------- serialization --------------------

    pub fn save<W: Write>(&self, w: W) -> Result<()> {
        let mut w = CountingWriter::new(w);
        w.put(&header_bytes(ScannerKind::Multi, LOCALS_LEN))?;
        w.pad()?;
        w.put(&self.m.to_bytes())?;
        let mut letters = [0u8; LETTERS_LEN];
        for (i, &c) in self.letters.map().iter().enumerate() {
            letters[i * 2..i * 2 + 2].copy_from_slice(&c.to_le_bytes());
        }
        w.put(&letters)?;
        w.pad()?;
        w.put_entries(&self.buffer)?;
        w.pad()?;
        w.finish()
    }

    pub fn load<R: Read>(mut r: R) -> Result<Scanner<'static>> {
        let mut header = [0u8; HEADER_LEN];
        read_exact_or_eof(&mut r, &mut header, "header")?;
        validate_header(&header, ScannerKind::Multi, LOCALS_LEN)?;
        skip_padding(&mut r, HEADER_LEN)?;

        let mut locals = [0u8; LOCALS_LEN];
        read_exact_or_eof(&mut r, &mut locals, "locals")?;
        let m = Locals::parse(&locals)?;

        let mut raw = [0u8; LETTERS_LEN];
        read_exact_or_eof(&mut r, &mut raw, "letters")?;
        let letters = parse_letters(&raw)?;
        let entries = m.check(&letters)?;
        skip_padding(&mut r, LOCALS_LEN + LETTERS_LEN)?;

        let buf = read_entries(&mut r, entries, "transition table")?;
        log::debug!("[scanner] loaded {} states ({} entries)", m.states_count, entries);
        Ok(Scanner {
            final_end: m.final_table_len as usize,
            m,
            letters,
            buffer: Buffer::Owned(buf),
        })
    }

    /// Binds a scanner directly over a serialized image without copying the
    /// tables. Returns the scanner and the unconsumed tail of `data`.
    pub fn mmap(data: &'a [u8]) -> Result<(Scanner<'a>, &'a [u8])> {
        if data.as_ptr().align_offset(ALIGNMENT) != 0 {
            return Err(FormatError::Misaligned { align: ALIGNMENT }.into());
        }
        let mut c = MapCursor::new(data);
        validate_header(c.take(HEADER_LEN, "header")?, ScannerKind::Multi, LOCALS_LEN)?;
        c.align();
        let m = Locals::parse(c.take(LOCALS_LEN, "locals")?)?;
        let letters = parse_letters(c.take(LETTERS_LEN, "letters")?)?;
        let entries = m.check(&letters)?;
        c.align();
        let len = entries
            .checked_mul(ENTRY_SIZE)
            .ok_or_else(|| geometry("buffer size overflows".into()))?;
        let bytes = c.take(len, "transition table")?;
        let buffer = Buffer::borrow_bytes(bytes)?;
        c.align();
        Ok((
            Scanner {
                final_end: m.final_table_len as usize,
                m,
                letters,
                buffer,
            },
            c.rest(),
        ))
    }
}

fn parse_letters(raw: &[u8]) -> Result<Letters> {
    let mut c = MapCursor::new(raw);
    let mut map = [0u16; 256];
    for slot in map.iter_mut() {
        *slot = c.take_u16("letters")?;
    }
    Letters::from_map(map).ok_or_else(|| geometry("letter classes are not dense".into()))
}

impl Automaton for Scanner<'_> {
    type State = State;

    fn size(&self) -> usize {
        Scanner::size(self)
    }
    fn regexps_count(&self) -> usize {
        Scanner::regexps_count(self)
    }
    fn initialize(&self) -> State {
        Scanner::initialize(self)
    }
    #[inline(always)]
    fn next(&self, state: State, byte: u8) -> State {
        Scanner::next(self, state, byte)
    }
    fn is_final(&self, state: State) -> bool {
        Scanner::is_final(self, state)
    }
    fn is_dead(&self, state: State) -> bool {
        Scanner::is_dead(self, state)
    }
    fn accepted_regexps(&self, state: State) -> &[u64] {
        Scanner::accepted_regexps(self, state)
    }
    fn letters(&self) -> &Letters {
        Scanner::letters(self)
    }
    fn state_index(&self, state: State) -> usize {
        Scanner::state_index(self, state)
    }
}
