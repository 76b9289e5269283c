// src/bin/gen_scanner.rs
// Glue literal patterns into one scanner, save it, map it back and verify.
// Usage: cargo run --bin gen_scanner -- <pattern>...
// Extras:
//   - SCANGLUE_OUT=path       output file (default: tables/scanner.bin, relative to the cwd)
//   - SCANGLUE_MAX_SIZE=n     state bound for each glue step

use std::{fs, path::PathBuf, time::Instant};

use anyhow::{Context, Result, bail};
use memmap2::Mmap;
use scanglue::scanner::{Automaton, Fsm, GlueConfig, Scanner, glue};

fn main() -> Result<()> {
    env_logger::init();

    let patterns: Vec<String> = std::env::args().skip(1).collect();
    if patterns.is_empty() {
        bail!("usage: gen_scanner <pattern>...  (writes $SCANGLUE_OUT, default ./tables/scanner.bin)");
    }
    let cfg = GlueConfig::from_env();
    let out_path = PathBuf::from(
        std::env::var("SCANGLUE_OUT").unwrap_or_else(|_| "tables/scanner.bin".into()),
    );

    println!("[gen_scanner] gluing {} patterns...", patterns.len());
    let t0 = Instant::now();
    let mut sc = Scanner::from_fsm(&Fsm::literal(patterns[0].as_bytes()))?;
    for p in &patterns[1..] {
        let rhs = Scanner::from_fsm(&Fsm::literal(p.as_bytes()))?;
        sc = glue(&sc, &rhs, &cfg).with_context(|| format!("gluing {p:?}"))?;
    }
    println!(
        "[gen_scanner] {} states, {} letters in {} ms",
        sc.size(),
        sc.letters_count(),
        t0.elapsed().as_millis()
    );

    if let Some(dir) = out_path.parent() {
        fs::create_dir_all(dir)?;
    }
    let f = fs::File::create(&out_path)
        .with_context(|| format!("create {}", out_path.display()))?;
    sc.save(f)?;

    // Map the image back and make sure it answers like the in-memory copy.
    let f = fs::File::open(&out_path)?;
    // SAFETY: the file was just written by us and is not modified while mapped.
    let map = unsafe { Mmap::map(&f)? };
    let (mapped, rest) = Scanner::mmap(&map).context("mapping saved scanner")?;
    if !rest.is_empty() {
        bail!("{} trailing bytes after scanner image", rest.len());
    }
    for (id, p) in patterns.iter().enumerate() {
        let want = sc.accepted_regexps(sc.run(p.as_bytes()));
        let got = mapped.accepted_regexps(mapped.run(p.as_bytes()));
        if want != got || !want.contains(&(id as u64)) {
            bail!("pattern {id} ({p:?}): in-memory ids {want:?}, mapped ids {got:?}");
        }
    }

    println!(
        "[gen_scanner] wrote {} bytes (~{:.1} KiB) → {}",
        map.len(),
        map.len() as f64 / 1024.0,
        out_path.display()
    );
    Ok(())
}
