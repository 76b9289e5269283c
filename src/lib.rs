// src/lib.rs
pub mod dev;
pub mod scanner;

pub use scanner::{Automaton, Fsm, GlueConfig, ScanError, Scanner, SimpleScanner, glue};
