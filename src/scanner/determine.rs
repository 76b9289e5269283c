// src/scanner/determine.rs
// Breadth-first exploration of a product state space driving a `DetTask`.

use std::time::Instant;

use super::error::{Result, ScanError};
use super::letters::Letters;
use super::lookup::GluedStateLookupTable;

/// Callbacks the driver uses to explore and materialize a product automaton.
pub trait DetTask {
    /// Product-space coordinate, e.g. a pair of source states.
    type State: Copy;
    type Output;

    fn initial(&self) -> Self::State;

    /// Dedup key of `state`.
    fn key(&self, state: Self::State) -> (u32, u32);

    /// Partition of the product alphabet.
    fn letters(&self) -> &Letters;

    /// Successor of `state` on any byte of `letter`, given its representative.
    fn next(&self, state: Self::State, representative: u8) -> Self::State;

    /// Called once with every reachable state, in index order.
    fn accept_states(&mut self, states: &[Self::State]) -> Result<()>;

    /// Called once per (state, letter) edge.
    fn connect(&mut self, from: usize, to: usize, letter: usize) -> Result<()>;

    /// Fails if the output was never materialized.
    fn into_output(self) -> Result<Self::Output>;
}

/// Explores `task` from its initial state. Fails without producing anything
/// once more than `max_size` states are reachable.
pub fn determine<T, const N: usize>(mut task: T, max_size: usize) -> Result<T::Output>
where
    T: DetTask,
{
    let t0 = Instant::now();
    let reps = task.letters().representatives();
    let letters_count = reps.len();

    let mut index = GluedStateLookupTable::<N>::new();
    let mut states: Vec<T::State> = Vec::new();
    // jumps[from * letters_count + letter] = to
    let mut jumps: Vec<u32> = Vec::new();

    if max_size == 0 {
        return Err(ScanError::SizeExceeded {
            resource: "product states",
            limit: 0,
        });
    }
    let init = task.initial();
    index.get_or_insert(task.key(init), 0)?;
    states.push(init);

    let mut head = 0usize;
    while head < states.len() {
        let from = states[head];
        head += 1;
        for &rep in &reps {
            let to = task.next(from, rep);
            let fresh = states.len() as u32;
            let (idx, inserted) = index.get_or_insert(task.key(to), fresh)?;
            if inserted {
                if states.len() >= max_size {
                    log::debug!(
                        "[determine] aborting: more than {max_size} states after {:?}",
                        t0.elapsed()
                    );
                    return Err(ScanError::SizeExceeded {
                        resource: "product states",
                        limit: max_size,
                    });
                }
                states.push(to);
            }
            jumps.push(idx);
        }
    }

    log::debug!(
        "[determine] {} states x {} letters explored in {:?}",
        states.len(),
        letters_count,
        t0.elapsed()
    );

    task.accept_states(&states)?;
    for (i, &to) in jumps.iter().enumerate() {
        task.connect(i / letters_count, to as usize, i % letters_count)?;
    }
    task.into_output()
}
