// src/scanner/glue.rs
// Scanner agglutination: product construction of two deterministic scanners.

use std::marker::PhantomData;
use std::time::Instant;

use super::automaton::Automaton;
use super::config::GlueConfig;
use super::determine::{DetTask, determine};
use super::error::{Result, ScanError};
use super::letters::Letters;
use super::lookup::GLUE_LOOKUP_CAPACITY;
use super::multi::{DEAD_FLAG, FINAL_FLAG, Scanner};

/// Two bytes may share a product letter only if both inputs agree on them.
pub struct LettersEquality<'a> {
    lhs: &'a Letters,
    rhs: &'a Letters,
}

impl<'a> LettersEquality<'a> {
    pub fn new(lhs: &'a Letters, rhs: &'a Letters) -> Self {
        Self { lhs, rhs }
    }

    #[inline]
    pub fn equal(&self, a: u8, b: u8) -> bool {
        self.lhs.get(a) == self.lhs.get(b) && self.rhs.get(a) == self.rhs.get(b)
    }

    /// Coarsest partition respecting both inputs.
    pub fn joint(&self) -> Letters {
        Letters::partition(|a, b| self.equal(a, b))
    }
}

/// How the flags of two sub-states combine into the glued state's tag.
pub trait TagPolicy {
    fn tag(lhs_final: bool, rhs_final: bool, lhs_dead: bool, rhs_dead: bool) -> u64;
}

/// Accept when either side accepts; dead only when both sides are.
pub struct Union;

impl TagPolicy for Union {
    fn tag(lhs_final: bool, rhs_final: bool, lhs_dead: bool, rhs_dead: bool) -> u64 {
        (if lhs_final || rhs_final { FINAL_FLAG } else { 0 })
            | (if lhs_dead && rhs_dead { DEAD_FLAG } else { 0 })
    }
}

pub struct ScannerGlueTask<'l, 'r, L, R, P = Union> {
    lhs: &'l L,
    rhs: &'r R,
    letters: Letters,
    sc: Option<Scanner<'static>>,
    policy: PhantomData<P>,
}

impl<'l, 'r, L, R, P> ScannerGlueTask<'l, 'r, L, R, P>
where
    L: Automaton,
    R: Automaton,
    P: TagPolicy,
{
    pub fn new(lhs: &'l L, rhs: &'r R) -> Self {
        let letters = LettersEquality::new(lhs.letters(), rhs.letters()).joint();
        Self {
            lhs,
            rhs,
            letters,
            sc: None,
            policy: PhantomData,
        }
    }

    fn sc_mut(&mut self) -> Result<&mut Scanner<'static>> {
        self.sc.as_mut().ok_or_else(|| {
            ScanError::Precondition("connect called before accept_states".into())
        })
    }
}

impl<L, R, P> DetTask for ScannerGlueTask<'_, '_, L, R, P>
where
    L: Automaton,
    R: Automaton,
    P: TagPolicy,
{
    type State = (L::State, R::State);
    type Output = Scanner<'static>;

    fn initial(&self) -> Self::State {
        (self.lhs.initialize(), self.rhs.initialize())
    }

    fn key(&self, (l, r): Self::State) -> (u32, u32) {
        (self.lhs.state_index(l) as u32, self.rhs.state_index(r) as u32)
    }

    fn letters(&self) -> &Letters {
        &self.letters
    }

    fn next(&self, (l, r): Self::State, representative: u8) -> Self::State {
        (
            self.lhs.next(l, representative),
            self.rhs.next(r, representative),
        )
    }

    fn accept_states(&mut self, states: &[Self::State]) -> Result<()> {
        let (lhs, rhs) = (self.lhs, self.rhs);
        let final_ids: usize = states
            .iter()
            .map(|&(l, r)| lhs.accepted_regexps(l).len() + rhs.accepted_regexps(r).len())
            .sum();
        let shift = lhs.regexps_count() as u64;
        let mut sc = Scanner::init(
            states.len(),
            self.letters.clone(),
            final_ids,
            lhs.regexps_count() + rhs.regexps_count(),
        )?;

        for (state, &(l, r)) in states.iter().enumerate() {
            let ids = lhs
                .accepted_regexps(l)
                .iter()
                .copied()
                .chain(rhs.accepted_regexps(r).iter().map(|&id| id + shift));
            sc.push_final_record(state, ids)?;
            sc.set_tag(
                state,
                P::tag(lhs.is_final(l), rhs.is_final(r), lhs.is_dead(l), rhs.is_dead(r)),
            )?;
        }
        if !sc.final_table_complete() {
            return Err(ScanError::SizeExceeded {
                resource: "final table",
                limit: sc.final_table().len(),
            });
        }
        self.sc = Some(sc);
        Ok(())
    }

    fn connect(&mut self, from: usize, to: usize, letter: usize) -> Result<()> {
        self.sc_mut()?.set_jump(from, letter, to)
    }

    fn into_output(self) -> Result<Scanner<'static>> {
        self.sc.ok_or_else(|| {
            ScanError::Precondition("glue finished before accept_states".into())
        })
    }
}

/// Glues two scanners into one recognizing the union of their patterns.
/// Pattern ids of `rhs` are shifted by `lhs.regexps_count()`.
pub fn glue<L, R>(lhs: &L, rhs: &R, config: &GlueConfig) -> Result<Scanner<'static>>
where
    L: Automaton,
    R: Automaton,
{
    glue_with::<Union, L, R>(lhs, rhs, config)
}

pub fn glue_with<P, L, R>(lhs: &L, rhs: &R, config: &GlueConfig) -> Result<Scanner<'static>>
where
    P: TagPolicy,
    L: Automaton,
    R: Automaton,
{
    if lhs.size() == 0 || rhs.size() == 0 {
        return Err(ScanError::Precondition(format!(
            "cannot glue a scanner without states ({} x {})",
            lhs.size(),
            rhs.size()
        )));
    }
    let t0 = Instant::now();
    let task = ScannerGlueTask::<L, R, P>::new(lhs, rhs);
    let max_size = config.effective_max_size();
    let sc = determine::<_, GLUE_LOOKUP_CAPACITY>(task, max_size)?;
    log::info!(
        "[glue] {} x {} states -> {} states, {} letters, {} patterns ({:?})",
        lhs.size(),
        rhs.size(),
        sc.size(),
        sc.letters_count(),
        sc.regexps_count(),
        t0.elapsed()
    );
    Ok(sc)
}

impl Scanner<'_> {
    /// Glues `lhs` and `rhs`; `max_size == 0` selects the default bound.
    pub fn glue(lhs: &Scanner<'_>, rhs: &Scanner<'_>, max_size: usize) -> Result<Scanner<'static>> {
        glue(lhs, rhs, &GlueConfig::with_max_size(max_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::fsm::Fsm;

    #[test]
    fn output_requires_accepted_states() {
        let sc = Scanner::from_fsm(&Fsm::literal(b"x")).unwrap();
        let task = ScannerGlueTask::<_, _, Union>::new(&sc, &sc);
        assert!(matches!(task.into_output(), Err(ScanError::Precondition(_))));
    }
}
