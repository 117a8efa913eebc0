//! Scanner side of the pipeline
//!
//! Line source → debounce gate → scan assembler.

pub mod assembler;
pub mod debounce;
pub mod line_source;
pub mod types;

pub use assembler::{Assembly, BodyDecoder, Decoding, ScanAssembler};
pub use debounce::DebounceGate;
pub use line_source::{LineReader, LineSource, open_serial, run_line_reader};
pub use types::*;
