// src/bin/fuzz_glue.rs
// Glue random automata and check the union property on random inputs.
// Knobs:
//   - FUZZ_SEED=n      base seed (default 42)
//   - FUZZ_CASES=n     number of automaton pairs (default 200)
//   - FUZZ_STATES=n    states per random automaton (default 6)
//   - FUZZ_INPUTS=n    inputs checked per pair (default 500)

use std::time::Instant;

use anyhow::{Result, bail};
use rand::{SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use scanglue::{
    dev::{random_fsm, random_input},
    scanner::{Automaton, GlueConfig, Scanner, glue},
};

const ALPHABET: &[u8] = b"abc";

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
}

/// Returns a description of the first mismatch, if any.
fn run_case(seed: u64, states: usize, inputs: usize) -> Option<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let a = Scanner::from_fsm(&random_fsm(&mut rng, states, ALPHABET, 70)).ok()?;
    let b = Scanner::from_fsm(&random_fsm(&mut rng, states, ALPHABET, 70)).ok()?;
    let g = match glue(&a, &b, &GlueConfig::default()) {
        Ok(g) => g,
        Err(e) => return Some(format!("seed={seed}: glue failed: {e}")),
    };

    for _ in 0..inputs {
        let input = random_input(&mut rng, ALPHABET, 12);
        let (sa, sb, sg) = (a.run(&input), b.run(&input), g.run(&input));
        if g.is_final(sg) != (a.is_final(sa) || b.is_final(sb)) {
            return Some(format!("seed={seed} input={input:?}: final flag mismatch"));
        }
        let shift = a.regexps_count() as u64;
        let want: Vec<u64> = a
            .accepted_regexps(sa)
            .iter()
            .copied()
            .chain(b.accepted_regexps(sb).iter().map(|&id| id + shift))
            .collect();
        if g.accepted_regexps(sg) != want.as_slice() {
            return Some(format!(
                "seed={seed} input={input:?}: ids {:?} != {want:?}",
                g.accepted_regexps(sg)
            ));
        }
        if g.is_dead(sg) && g.is_final(sg) {
            return Some(format!("seed={seed} input={input:?}: dead state is final"));
        }
    }
    None
}

fn main() -> Result<()> {
    env_logger::init();

    let seed = env_u64("FUZZ_SEED", 42);
    let cases = env_u64("FUZZ_CASES", 200);
    let states = env_usize("FUZZ_STATES", 6);
    let inputs = env_usize("FUZZ_INPUTS", 500);

    let t0 = Instant::now();
    let failures: Vec<String> = (0..cases)
        .into_par_iter()
        .filter_map(|i| run_case(seed ^ i.wrapping_mul(0x9E3779B97F4A7C15), states, inputs))
        .collect();

    println!(
        "[fuzz_glue] {cases} cases x {inputs} inputs in {} ms, {} failures",
        t0.elapsed().as_millis(),
        failures.len()
    );
    for f in failures.iter().take(10) {
        eprintln!("  {f}");
    }
    if !failures.is_empty() {
        bail!("{} failing cases", failures.len());
    }
    Ok(())
}
