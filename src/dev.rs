// src/dev.rs
// Random automata and inputs shared by the fuzz binary and the tests.

use rand::Rng;

use crate::scanner::Fsm;

/// Random deterministic automaton over `alphabet`. Roughly `edge_pct`% of
/// (state, byte) pairs get an edge, the rest fall into the sink on canonize.
pub fn random_fsm<R: Rng>(rng: &mut R, states: usize, alphabet: &[u8], edge_pct: u32) -> Fsm {
    let mut fsm = Fsm::new();
    for _ in 1..states.max(1) {
        fsm.add_state();
    }
    for s in 0..fsm.size() {
        if rng.random_range(0..100) < 30 {
            fsm.set_final(s, true);
        }
        for &b in alphabet {
            if rng.random_range(0..100) < edge_pct {
                let to = rng.random_range(0..fsm.size());
                fsm.connect(s, b, to);
            }
        }
    }
    fsm
}

pub fn random_input<R: Rng>(rng: &mut R, alphabet: &[u8], max_len: usize) -> Vec<u8> {
    let len = rng.random_range(0..=max_len);
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())])
        .collect()
}
