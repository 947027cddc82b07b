//! Line parsers for levels, timing, vector and master files.
//!
//! Each file language is a line-oriented regular grammar. Parsers thread an
//! explicit [`ParserContext`] through every line instead of keeping global
//! "last seen" state, and every failure reports the file and line number.
//!
//! - [`levels`]: `hp93000,level,0.1` files
//! - [`timing`]: `hp93000,timing,0.1` files
//! - [`vectors`]: `hp93000,vector,0.1` pattern files
//! - [`pmf`]: pattern master files, used to look up labels by name
//! - [`master`]: level and timing master files, and header-based dispatch

pub mod common;
pub mod context;
pub mod error;
pub mod levels;
pub mod master;
pub mod pmf;
pub mod timing;
pub mod vectors;

pub use context::{Location, ParserContext};
pub use error::{ParseError, Result};
pub use levels::{load_levels_file, parse_levels_str};
pub use master::{
    load_levels, load_timing, parse_master_str, resolve_master_path, MasterEntry, MasterFile,
    MasterKind,
};
pub use pmf::{load_pmf, parse_pmf_str, PatternMasterFile};
pub use timing::{load_timing_file, parse_timing_str};
pub use vectors::{load_vector_file, parse_vector_str};
