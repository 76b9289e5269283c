// src/scanner/mod.rs
pub mod automaton;
pub mod buffer;
pub mod config;
pub mod determine;
pub mod error;
pub mod fsm;
pub mod glue;
pub mod io;
pub mod letters;
pub mod lookup;
pub mod multi;
pub mod simple;

pub use automaton::Automaton;
pub use buffer::{AlignedBytes, Buffer};
pub use config::{DEFAULT_MAX_SIZE, GlueConfig};
pub use determine::{DetTask, determine};
pub use error::{FormatError, ScanError};
pub use fsm::Fsm;
pub use glue::{LettersEquality, ScannerGlueTask, TagPolicy, Union, glue, glue_with};
pub use io::{load_scanner_json_bytes, save_scanner_json};
pub use letters::Letters;
pub use lookup::{GLUE_LOOKUP_CAPACITY, GluedStateLookupTable};
pub use multi::{DEAD_FLAG, FINAL_FLAG, FINAL_SENTINEL, Scanner, State};
pub use simple::SimpleScanner;
