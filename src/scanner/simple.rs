// src/scanner/simple.rs
// Single-pattern scanner with one row entry per raw byte: faster than
// `Scanner` (no letter lookup) at the cost of memory.

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
use super::multi::{DEAD_FLAG, FINAL_FLAG, State};

/// All bytes plus the leading tag entry.
const STATE_ROW_SIZE: usize = 256 + 1;
const ROW_BYTES: usize = STATE_ROW_SIZE * ENTRY_SIZE;
const LOCALS_LEN: usize = 4 + 4 + 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Locals {
    states_count: u32,
    initial: u64,
}

impl Locals {
    fn to_bytes(self) -> [u8; LOCALS_LEN] {
        let mut b = [0u8; LOCALS_LEN];
        b[0..4].copy_from_slice(&self.states_count.to_le_bytes());
        // 4..8 reserved
        b[8..16].copy_from_slice(&self.initial.to_le_bytes());
        b
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        let mut c = MapCursor::new(bytes);
        let states_count = c.take_u32("locals")?;
        let _reserved = c.take_u32("locals")?;
        let initial = c.take_u64("locals")?;
        Ok(Self {
            states_count,
            initial,
        })
    }

    fn check(&self) -> Result<usize> {
        let states = self.states_count as usize;
        if states == 0 {
            return Err(geometry("scanner has no states".into()));
        }
        let init = self.initial as usize;
        if init % ROW_BYTES != ENTRY_SIZE || init / ROW_BYTES >= states {
            return Err(geometry(format!("initial offset {init} out of range")));
        }
        states
            .checked_mul(STATE_ROW_SIZE)
            .ok_or_else(|| geometry("buffer size overflows".into()))
    }
}

#[derive(Clone, Debug)]
pub struct SimpleScanner<'a> {
    m: Locals,
    letters: Letters,
    transitions: Buffer<'a>,
}

impl Default for SimpleScanner<'_> {
    fn default() -> Self {
        Self::new()
    }
}

static ACCEPTED: [u64; 1] = [0];

impl<'a> SimpleScanner<'a> {
    /// Null scanner: one dead state that loops on every byte.
    pub fn new() -> Self {
        let mut row = vec![0u64; STATE_ROW_SIZE];
        row[0] = DEAD_FLAG;
        Self {
            m: Locals {
                states_count: 1,
                initial: ENTRY_SIZE as u64,
            },
            letters: Letters::identity(),
            transitions: Buffer::Owned(row),
        }
    }

    pub fn from_fsm(fsm: &Fsm) -> Result<SimpleScanner<'static>> {
        let fsm = fsm.canonize()?;
        let states_count = u32::try_from(fsm.size()).map_err(|_| ScanError::SizeExceeded {
            resource: "scanner states",
            limit: u32::MAX as usize,
        })?;
        let mut sc = SimpleScanner {
            m: Locals {
                states_count,
                initial: ENTRY_SIZE as u64,
            },
            letters: Letters::identity(),
            transitions: Buffer::zeroed(fsm.size() * STATE_ROW_SIZE),
        };
        let dead = fsm.dead_states();
        for state in 0..fsm.size() {
            let tag = (if fsm.is_final(state) { FINAL_FLAG } else { 0 })
                | (if dead[state] { DEAD_FLAG } else { 0 });
            sc.set_tag(state, tag)?;
        }
        for from in 0..fsm.size() {
            for b in 0u8..=255 {
                for &to in fsm.destinations(from, b) {
                    sc.set_jump(from, b, to)?;
                }
            }
        }
        sc.set_initial(fsm.initial())?;
        Ok(sc)
    }

    pub fn size(&self) -> usize {
        self.m.states_count as usize
    }

    pub fn regexps_count(&self) -> usize {
        1
    }

    pub fn letters_count(&self) -> usize {
        256
    }

    #[inline(always)]
    pub fn initialize(&self) -> State {
        self.m.initial as usize
    }

    #[inline(always)]
    pub fn next(&self, state: State, byte: u8) -> State {
        let shift = self.transitions[state / ENTRY_SIZE + byte as usize];
        state.wrapping_add(shift as usize)
    }

    #[inline(always)]
    pub fn is_final(&self, state: State) -> bool {
        self.transitions[state / ENTRY_SIZE - 1] & FINAL_FLAG != 0
    }

    #[inline(always)]
    pub fn is_dead(&self, state: State) -> bool {
        self.transitions[state / ENTRY_SIZE - 1] & DEAD_FLAG != 0
    }

    pub fn state_index(&self, state: State) -> usize {
        state / ROW_BYTES
    }

    /// Size of the transition buffer in bytes.
    pub fn buf_size(&self) -> usize {
        self.transitions.len() * ENTRY_SIZE
    }

    pub fn owns_buffer(&self) -> bool {
        self.transitions.is_owned()
    }

    pub fn to_owned_scanner(&self) -> SimpleScanner<'static> {
        SimpleScanner {
            m: self.m,
            letters: Letters::identity(),
            transitions: self.transitions.clone().into_owned(),
        }
    }

    fn set_jump(&mut self, from: usize, byte: u8, to: usize) -> Result<()> {
        let n = self.size();
        if from >= n || to >= n {
            return Err(ScanError::Precondition(format!("jump {from}->{to} out of range")));
        }
        let delta = (to as i64 - from as i64) * ROW_BYTES as i64;
        self.transitions.as_mut_slice()?[from * STATE_ROW_SIZE + 1 + byte as usize] = delta as u64;
        Ok(())
    }

    fn set_tag(&mut self, state: usize, tag: u64) -> Result<()> {
        self.transitions.as_mut_slice()?[state * STATE_ROW_SIZE] = tag;
        Ok(())
    }

    fn set_initial(&mut self, state: usize) -> Result<()> {
        self.transitions.as_mut_slice()?;
        self.m.initial = ((state * STATE_ROW_SIZE + 1) * ENTRY_SIZE) as u64;
        Ok(())
    }

    // -------------------- serialization --------------------

    pub fn save<W: Write>(&self, w: W) -> Result<()> {
        let mut w = CountingWriter::new(w);
        w.put(&header_bytes(ScannerKind::Simple, LOCALS_LEN))?;
        w.pad()?;
        w.put(&self.m.to_bytes())?;
        w.pad()?;
        w.put_entries(&self.transitions)?;
        w.pad()?;
        w.finish()
    }

    pub fn load<R: Read>(mut r: R) -> Result<SimpleScanner<'static>> {
        let mut header = [0u8; HEADER_LEN];
        read_exact_or_eof(&mut r, &mut header, "header")?;
        validate_header(&header, ScannerKind::Simple, LOCALS_LEN)?;
        skip_padding(&mut r, HEADER_LEN)?;
        let mut locals = [0u8; LOCALS_LEN];
        read_exact_or_eof(&mut r, &mut locals, "locals")?;
        let m = Locals::parse(&locals)?;
        let entries = m.check()?;
        skip_padding(&mut r, LOCALS_LEN)?;
        let transitions = read_entries(&mut r, entries, "transition table")?;
        Ok(SimpleScanner {
            m,
            letters: Letters::identity(),
            transitions: Buffer::Owned(transitions),
        })
    }

    /// Binds the scanner over `data` without copying; returns the unconsumed
    /// tail.
    pub fn mmap(data: &'a [u8]) -> Result<(SimpleScanner<'a>, &'a [u8])> {
        if data.as_ptr().align_offset(ALIGNMENT) != 0 {
            return Err(FormatError::Misaligned { align: ALIGNMENT }.into());
        }
        let mut c = MapCursor::new(data);
        validate_header(c.take(HEADER_LEN, "header")?, ScannerKind::Simple, LOCALS_LEN)?;
        c.align();
        let m = Locals::parse(c.take(LOCALS_LEN, "locals")?)?;
        let entries = m.check()?;
        c.align();
        let len = entries
            .checked_mul(ENTRY_SIZE)
            .ok_or_else(|| geometry("buffer size overflows".into()))?;
        let transitions = Buffer::borrow_bytes(c.take(len, "transition table")?)?;
        c.align();
        Ok((
            SimpleScanner {
                m,
                letters: Letters::identity(),
                transitions,
            },
            c.rest(),
        ))
    }
}

impl Automaton for SimpleScanner<'_> {
    type State = State;

    fn size(&self) -> usize {
        SimpleScanner::size(self)
    }
    fn regexps_count(&self) -> usize {
        1
    }
    fn initialize(&self) -> State {
        SimpleScanner::initialize(self)
    }
    #[inline(always)]
    fn next(&self, state: State, byte: u8) -> State {
        SimpleScanner::next(self, state, byte)
    }
    fn is_final(&self, state: State) -> bool {
        SimpleScanner::is_final(self, state)
    }
    fn is_dead(&self, state: State) -> bool {
        SimpleScanner::is_dead(self, state)
    }
    fn accepted_regexps(&self, state: State) -> &[u64] {
        if self.is_final(state) { &ACCEPTED[..] } else { &[] }
    }
    fn letters(&self) -> &Letters {
        &self.letters
    }
    fn state_index(&self, state: State) -> usize {
        SimpleScanner::state_index(self, state)
    }
}
