// src/main.rs
use anyhow::{Context, Result};
use scanglue::scanner::{Automaton, Fsm, GlueConfig, Scanner, glue};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut patterns: Vec<String> = std::env::args().skip(1).collect();
    if patterns.is_empty() {
        patterns = vec!["ab".into(), "ac".into()];
    }
    let cfg = GlueConfig::from_env();

    let mut glued: Option<Scanner<'static>> = None;
    for p in &patterns {
        let sc = Scanner::from_fsm(&Fsm::literal(p.as_bytes()))
            .with_context(|| format!("building scanner for {p:?}"))?;
        glued = Some(match glued {
            None => sc,
            Some(acc) => glue(&acc, &sc, &cfg).with_context(|| format!("gluing {p:?}"))?,
        });
    }
    let sc = glued.context("no patterns")?;

    println!(
        "glued {} patterns: {} states, {} letters, {} bytes",
        sc.regexps_count(),
        sc.size(),
        sc.letters_count(),
        sc.buf_size()
    );

    let mut samples: Vec<&[u8]> = patterns.iter().map(|p| p.as_bytes()).collect();
    samples.push(b"ad");
    samples.push(b"");
    for input in samples {
        let state = sc.run(input);
        println!(
            "{:?}  final={}  dead={}  ids={:?}",
            String::from_utf8_lossy(input),
            sc.is_final(state),
            sc.is_dead(state),
            sc.accepted_regexps(state)
        );
    }
    Ok(())
}
