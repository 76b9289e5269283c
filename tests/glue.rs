//! Product construction: union semantics, id shifting, flags and bounds.

use std::{
    cell::RefCell,
    collections::{HashSet, VecDeque},
};

use rand::{SeedableRng, rngs::StdRng};
use scanglue::{
    dev::{random_fsm, random_input},
    scanner::{
        Automaton, Fsm, GlueConfig, Letters, LettersEquality, ScanError, Scanner, ScannerGlueTask,
        SimpleScanner, Union, determine, glue,
    },
};

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

fn literal(p: &[u8]) -> Scanner<'static> {
    Scanner::from_fsm(&Fsm::literal(p)).expect("literal scanner")
}

/// Every state reachable from `from`, following one byte per letter class.
fn reachable<A: Automaton<State = usize>>(sc: &A, from: usize) -> Vec<usize> {
    let reps = sc.letters().representatives();
    let mut seen = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);
    while let Some(s) = queue.pop_front() {
        for &b in &reps {
            let t = sc.next(s, b);
            if seen.insert(t) {
                queue.push_back(t);
            }
        }
    }
    seen.into_iter().collect()
}

fn all_states(sc: &Scanner<'_>) -> Vec<usize> {
    (0..sc.size()).map(|i| sc.state_at(i)).collect()
}

#[test]
fn ab_plus_ac() {
    let g = Scanner::glue(&literal(b"ab"), &literal(b"ac"), 0).unwrap();

    assert_eq!(g.regexps_count(), 2);
    let ab = g.run(b"ab");
    assert!(g.is_final(ab));
    assert_eq!(g.accepted_regexps(ab), &[0]);
    let ac = g.run(b"ac");
    assert!(g.is_final(ac));
    assert_eq!(g.accepted_regexps(ac), &[1]);
    let ad = g.run(b"ad");
    assert!(!g.is_final(ad));
    assert!(g.accepted_regexps(ad).is_empty());
    assert!(g.is_dead(ad));

    // start, after 'a', accept "ab", accept "ac", plus the shared sink
    let live: Vec<usize> = all_states(&g).into_iter().filter(|&s| !g.is_dead(s)).collect();
    assert_eq!(live.len(), 4);
    assert_eq!(g.size(), 5);
    // 'a', 'b', 'c' and everything else
    assert_eq!(g.letters_count(), 4);
}

#[test]
fn union_matches_components_on_random_automata() {
    let seed = env_u64("GLUE_SEED", 7);
    let alphabet = b"abcd";
    for case in 0..40u64 {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(case));
        let a = Scanner::from_fsm(&random_fsm(&mut rng, 5, alphabet, 75)).unwrap();
        let b = Scanner::from_fsm(&random_fsm(&mut rng, 5, alphabet, 75)).unwrap();
        let g = glue(&a, &b, &GlueConfig::default()).unwrap();
        for _ in 0..300 {
            let input = random_input(&mut rng, alphabet, 10);
            assert_eq!(
                g.matches(&input),
                a.matches(&input) || b.matches(&input),
                "case {case} input {input:?}"
            );
        }
    }
}

#[test]
fn pattern_ids_stay_disjoint_across_repeated_glue() {
    let (a, b, c) = (literal(b"x"), literal(b"xy"), literal(b"x"));
    let ab = Scanner::glue(&a, &b, 0).unwrap();
    let abc = Scanner::glue(&ab, &c, 0).unwrap();
    assert_eq!(abc.regexps_count(), 3);

    assert_eq!(abc.accepted_regexps(abc.run(b"x")), &[0, 2]);
    assert_eq!(abc.accepted_regexps(abc.run(b"xy")), &[1]);
    assert!(abc.accepted_regexps(abc.run(b"y")).is_empty());

    // every record is the lhs ids followed by the shifted rhs ids
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..200 {
        let input = random_input(&mut rng, b"xy", 4);
        let want: Vec<u64> = ab
            .accepted_regexps(ab.run(&input))
            .iter()
            .copied()
            .chain(c.accepted_regexps(c.run(&input)).iter().map(|&id| id + 2))
            .collect();
        assert_eq!(abc.accepted_regexps(abc.run(&input)), want.as_slice());
    }
}

#[test]
fn glued_scanner_is_total_and_deterministic() {
    let mut rng = StdRng::seed_from_u64(11);
    let a = Scanner::from_fsm(&random_fsm(&mut rng, 6, b"abc", 60)).unwrap();
    let b = Scanner::from_fsm(&random_fsm(&mut rng, 6, b"abc", 60)).unwrap();
    let g = glue(&a, &b, &GlueConfig::default()).unwrap();

    let valid: HashSet<usize> = all_states(&g).into_iter().collect();
    for &s in &valid {
        for byte in 0u8..=255 {
            let t = g.next(s, byte);
            assert!(valid.contains(&t), "state {s} byte {byte} -> {t}");
        }
    }
    // every row is reachable from the initial state
    assert_eq!(reachable(&g, g.initialize()).len(), g.size());
}

#[test]
fn dead_flag_is_sound() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..20 {
        let a = Scanner::from_fsm(&random_fsm(&mut rng, 5, b"ab", 60)).unwrap();
        let b = Scanner::from_fsm(&random_fsm(&mut rng, 5, b"ab", 60)).unwrap();
        let g = glue(&a, &b, &GlueConfig::default()).unwrap();
        for s in all_states(&g).into_iter().filter(|&s| g.is_dead(s)) {
            assert!(
                reachable(&g, s).into_iter().all(|t| !g.is_final(t)),
                "dead state {s} reaches an accepting state"
            );
        }
    }
}

#[test]
fn bound_is_enforced() {
    let (a, b) = (literal(b"ab"), literal(b"ac"));
    match Scanner::glue(&a, &b, 4) {
        Err(ScanError::SizeExceeded { limit, .. }) => assert_eq!(limit, 4),
        other => panic!("expected SizeExceeded, got {other:?}"),
    }
    assert_eq!(Scanner::glue(&a, &b, 5).unwrap().size(), 5);
}

#[test]
fn simple_and_multi_scanners_glue_together() {
    let mut digits = Fsm::new();
    let d = digits.add_state();
    digits.connect_range(0, b'0', b'9', d);
    digits.connect_range(d, b'0', b'9', d);
    digits.set_final(d, true);
    let simple = SimpleScanner::from_fsm(&digits).unwrap();
    let word = literal(b"42x");

    let g = glue(&simple, &word, &GlueConfig::default()).unwrap();
    assert_eq!(g.accepted_regexps(g.run(b"42")), &[0]);
    assert_eq!(g.accepted_regexps(g.run(b"42x")), &[1]);
    assert!(g.is_dead(g.run(b"x")));
    // the simple side distinguishes every byte
    assert_eq!(g.letters_count(), 256);
}

#[test]
fn letters_equality_splits_on_either_side() {
    let lhs = Letters::partition(|a, b| a.is_ascii_digit() == b.is_ascii_digit());
    let rhs = Letters::partition(|a, b| a.is_ascii_lowercase() == b.is_ascii_lowercase());
    let eq = LettersEquality::new(&lhs, &rhs);
    assert!(eq.equal(b'1', b'7'));
    assert!(eq.equal(b'a', b'z'));
    assert!(!eq.equal(b'1', b'a'));
    assert!(!eq.equal(b'a', b'A'));
    assert_eq!(eq.joint().count(), 3);
}

#[test]
fn config_defaults_and_json() {
    assert_eq!(GlueConfig::default().effective_max_size(), 80_000);
    assert_eq!(GlueConfig::with_max_size(0).effective_max_size(), 80_000);
    let cfg = GlueConfig::from_json_bytes(br#"{"max_size": 12}"#).unwrap();
    assert_eq!(cfg.effective_max_size(), 12);
    let cfg = GlueConfig::from_json_bytes(b"{}").unwrap();
    assert_eq!(cfg, GlueConfig::default());
    assert!(matches!(
        GlueConfig::from_json_bytes(b"{\"max_size\": -1}"),
        Err(ScanError::Json(_))
    ));
}

#[test]
fn null_scanner_is_neutral_for_glue() {
    let ab = literal(b"ab");
    for g in [
        Scanner::glue(&Scanner::default(), &ab, 0).unwrap(),
        Scanner::glue(&ab, &Scanner::new(), 0).unwrap(),
    ] {
        assert_eq!(g.regexps_count(), 1);
        assert_eq!(g.accepted_regexps(g.run(b"ab")), &[0]);
        assert!(!g.matches(b""));
        assert!(g.is_dead(g.run(b"b")));
    }

    // a simple scanner always owns pattern id 0, even when it matches nothing
    let g = glue(&SimpleScanner::new(), &ab, &GlueConfig::default()).unwrap();
    assert_eq!(g.accepted_regexps(g.run(b"ab")), &[1]);
    assert!(!g.matches(b"a"));

    let nn = Scanner::glue(&Scanner::new(), &Scanner::default(), 0).unwrap();
    assert_eq!(nn.size(), 1);
    assert_eq!(nn.regexps_count(), 0);
    assert!(!nn.matches(b""));
    assert!(nn.is_dead(nn.run(b"anything")));
}

#[test]
fn lookup_exhaustion_is_distinct_from_the_state_bound() {
    // 8 letters deep plus the sink: 10 diagonal product states
    let word = literal(b"abcdefgh");

    let task = ScannerGlueTask::<_, _, Union>::new(&word, &word);
    match determine::<_, 8>(task, 1_000) {
        Err(ScanError::LookupTableFull { capacity }) => assert_eq!(capacity, 8),
        other => panic!("expected LookupTableFull, got {other:?}"),
    }

    let task = ScannerGlueTask::<_, _, Union>::new(&word, &word);
    match determine::<_, 8>(task, 3) {
        Err(ScanError::SizeExceeded { limit, .. }) => assert_eq!(limit, 3),
        other => panic!("expected SizeExceeded, got {other:?}"),
    }

    let task = ScannerGlueTask::<_, _, Union>::new(&word, &word);
    assert_eq!(determine::<_, 16>(task, 1_000).unwrap().size(), 10);
}

/// Reports each state's ids only the first time it is asked about them.
struct FirstAnswerOnly {
    inner: Scanner<'static>,
    answered: RefCell<HashSet<usize>>,
}

impl Automaton for FirstAnswerOnly {
    type State = usize;

    fn size(&self) -> usize {
        self.inner.size()
    }
    fn regexps_count(&self) -> usize {
        self.inner.regexps_count()
    }
    fn initialize(&self) -> usize {
        self.inner.initialize()
    }
    fn next(&self, state: usize, byte: u8) -> usize {
        self.inner.next(state, byte)
    }
    fn is_final(&self, state: usize) -> bool {
        self.inner.is_final(state)
    }
    fn is_dead(&self, state: usize) -> bool {
        self.inner.is_dead(state)
    }
    fn accepted_regexps(&self, state: usize) -> &[u64] {
        if self.answered.borrow_mut().insert(state) {
            self.inner.accepted_regexps(state)
        } else {
            &[]
        }
    }
    fn letters(&self) -> &Letters {
        self.inner.letters()
    }
    fn state_index(&self, state: usize) -> usize {
        self.inner.state_index(state)
    }
}

#[test]
fn unfilled_final_table_is_rejected() {
    let lhs = FirstAnswerOnly {
        inner: literal(b"a"),
        answered: RefCell::new(HashSet::new()),
    };
    let rhs = literal(b"b");
    match glue(&lhs, &rhs, &GlueConfig::default()) {
        Err(ScanError::SizeExceeded { resource, .. }) => assert_eq!(resource, "final table"),
        other => panic!("expected an incomplete final table, got {other:?}"),
    }
}
