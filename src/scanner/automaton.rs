// src/scanner/automaton.rs
use super::letters::Letters;

/// What product construction needs to know about a finished deterministic
/// scanner.
pub trait Automaton {
    /// Opaque handle of a live state.
    type State: Copy;

    /// Number of states.
    fn size(&self) -> usize;

    /// Number of distinct patterns this scanner recognizes; pattern ids are
    /// `0..regexps_count()`.
    fn regexps_count(&self) -> usize;

    fn initialize(&self) -> Self::State;

    fn next(&self, state: Self::State, byte: u8) -> Self::State;

    fn is_final(&self, state: Self::State) -> bool;

    /// No accepting state is reachable from `state`.
    fn is_dead(&self, state: Self::State) -> bool;

    /// Ids of the patterns matched in `state`, in ascending storage order.
    fn accepted_regexps(&self, state: Self::State) -> &[u64];

    fn letters(&self) -> &Letters;

    /// Dense index of `state` in `0..size()`.
    fn state_index(&self, state: Self::State) -> usize;

    fn run(&self, input: &[u8]) -> Self::State {
        input
            .iter()
            .fold(self.initialize(), |s, &b| self.next(s, b))
    }

    fn matches(&self, input: &[u8]) -> bool {
        self.is_final(self.run(input))
    }
}
