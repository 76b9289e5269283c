// src/scanner/fsm.rs
// Small byte-level automaton used as the input of scanner construction.

use std::collections::VecDeque;

use hashbrown::HashMap;

use super::error::{Result, ScanError};
use super::letters::Letters;

/// A finite automaton over raw bytes. Edges may fan out to several
/// destinations while building, but scanners only accept deterministic ones.
#[derive(Clone, Debug)]
pub struct Fsm {
    initial: usize,
    finals: Vec<bool>,
    edges: Vec<HashMap<u8, Vec<usize>>>,
}

impl Default for Fsm {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm {
    /// One non-final initial state, no edges.
    pub fn new() -> Self {
        Self {
            initial: 0,
            finals: vec![false],
            edges: vec![HashMap::new()],
        }
    }

    /// Accepts exactly `bytes`.
    pub fn literal(bytes: &[u8]) -> Self {
        let mut fsm = Self::new();
        let mut cur = fsm.initial;
        for &b in bytes {
            let next = fsm.add_state();
            fsm.connect(cur, b, next);
            cur = next;
        }
        fsm.set_final(cur, true);
        fsm
    }

    pub fn add_state(&mut self) -> usize {
        self.finals.push(false);
        self.edges.push(HashMap::new());
        self.finals.len() - 1
    }

    pub fn size(&self) -> usize {
        self.finals.len()
    }

    pub fn initial(&self) -> usize {
        self.initial
    }

    pub fn set_initial(&mut self, state: usize) {
        assert!(state < self.size(), "state {state} out of range");
        self.initial = state;
    }

    pub fn set_final(&mut self, state: usize, is_final: bool) {
        self.finals[state] = is_final;
    }

    pub fn is_final(&self, state: usize) -> bool {
        self.finals[state]
    }

    pub fn connect(&mut self, from: usize, byte: u8, to: usize) {
        assert!(to < self.size(), "state {to} out of range");
        let tos = self.edges[from].entry(byte).or_default();
        if !tos.contains(&to) {
            tos.push(to);
        }
    }

    pub fn connect_bytes(&mut self, from: usize, bytes: &[u8], to: usize) {
        for &b in bytes {
            self.connect(from, b, to);
        }
    }

    pub fn connect_range(&mut self, from: usize, lo: u8, hi: u8, to: usize) {
        for b in lo..=hi {
            self.connect(from, b, to);
        }
    }

    pub fn connect_all_except(&mut self, from: usize, except: &[u8], to: usize) {
        let mut skip = [false; 256];
        for &e in except {
            skip[e as usize] = true;
        }
        for b in 0u8..=255 {
            if !skip[b as usize] {
                self.connect(from, b, to);
            }
        }
    }

    pub fn destinations(&self, state: usize, byte: u8) -> &[usize] {
        self.edges[state].get(&byte).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_deterministic(&self) -> bool {
        self.edges.iter().all(|e| e.values().all(|tos| tos.len() <= 1))
    }

    /// Reference matcher: walks the first destination of every edge.
    pub fn accepts(&self, input: &[u8]) -> bool {
        let mut state = self.initial;
        for &b in input {
            match self.destinations(state, b).first() {
                Some(&next) => state = next,
                None => return false,
            }
        }
        self.is_final(state)
    }

    /// Renumbers reachable states breadth-first (initial becomes 0) and routes
    /// every missing edge into a single non-final sink, so the result is total.
    pub fn canonize(&self) -> Result<Fsm> {
        if !self.is_deterministic() {
            return Err(ScanError::Precondition(
                "automaton must be deterministic before building a scanner".into(),
            ));
        }

        let mut order = vec![self.initial];
        let mut renum: HashMap<usize, usize> = HashMap::new();
        renum.insert(self.initial, 0);
        let mut queue = VecDeque::from([self.initial]);
        let mut need_sink = false;
        while let Some(s) = queue.pop_front() {
            for b in 0u8..=255 {
                match self.destinations(s, b).first() {
                    Some(&to) => {
                        if !renum.contains_key(&to) {
                            renum.insert(to, order.len());
                            order.push(to);
                            queue.push_back(to);
                        }
                    }
                    None => need_sink = true,
                }
            }
        }

        let mut out = Fsm {
            initial: 0,
            finals: order.iter().map(|&s| self.finals[s]).collect(),
            edges: vec![HashMap::new(); order.len()],
        };
        let sink = need_sink.then(|| out.add_state());
        for (new_from, &old_from) in order.iter().enumerate() {
            for b in 0u8..=255 {
                let to = match self.destinations(old_from, b).first() {
                    Some(old_to) => renum[old_to],
                    None => sink.expect("sink exists whenever an edge is missing"),
                };
                out.connect(new_from, b, to);
            }
        }
        if let Some(sink) = sink {
            out.connect_all_except(sink, &[], sink);
        }
        log::debug!(
            "[fsm] canonized {} states -> {} (sink: {})",
            self.size(),
            out.size(),
            sink.is_some()
        );
        Ok(out)
    }

    /// Coarsest byte partition under which every state's edges agree.
    pub fn letters(&self) -> Letters {
        let mut classes: HashMap<Vec<Option<usize>>, u16> = HashMap::new();
        let mut map = [0u16; 256];
        for b in 0u8..=255 {
            let sig: Vec<Option<usize>> = (0..self.size())
                .map(|s| self.destinations(s, b).first().copied())
                .collect();
            let next_id = classes.len() as u16;
            map[b as usize] = *classes.entry(sig).or_insert(next_id);
        }
        Letters::from_map(map).expect("class ids are assigned densely")
    }

    /// `dead[s]` is true when no final state is reachable from `s`.
    pub fn dead_states(&self) -> Vec<bool> {
        let n = self.size();
        let mut rev: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (from, edges) in self.edges.iter().enumerate() {
            for tos in edges.values() {
                for &to in tos {
                    rev[to].push(from);
                }
            }
        }
        let mut alive = self.finals.clone();
        let mut queue: VecDeque<usize> = (0..n).filter(|&s| alive[s]).collect();
        while let Some(s) = queue.pop_front() {
            for &p in &rev[s] {
                if !alive[p] {
                    alive[p] = true;
                    queue.push_back(p);
                }
            }
        }
        alive.into_iter().map(|a| !a).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonize_completes_with_sink() {
        let fsm = Fsm::literal(b"ab").canonize().unwrap();
        // start, after 'a', after "ab", sink
        assert_eq!(fsm.size(), 4);
        assert!(fsm.is_deterministic());
        for s in 0..fsm.size() {
            for b in 0u8..=255 {
                assert_eq!(fsm.destinations(s, b).len(), 1);
            }
        }
        assert_eq!(fsm.dead_states(), vec![false, false, false, true]);
        assert!(fsm.accepts(b"ab"));
        assert!(!fsm.accepts(b"abc"));
    }

    #[test]
    fn canonize_rejects_nondeterminism() {
        let mut fsm = Fsm::new();
        let a = fsm.add_state();
        let b = fsm.add_state();
        fsm.connect(0, b'x', a);
        fsm.connect(0, b'x', b);
        assert!(matches!(fsm.canonize(), Err(ScanError::Precondition(_))));
    }

    #[test]
    fn letters_of_literal() {
        let fsm = Fsm::literal(b"ab").canonize().unwrap();
        // 'a', 'b' and everything else
        assert_eq!(fsm.letters().count(), 3);
    }
}
