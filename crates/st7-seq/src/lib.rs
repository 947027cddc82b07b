//! Sequencer program interpreter: vector and cycle counts for pattern
//! labels.
//!
//! - [`program`]: cost of `GENV`/`RPTV` instruction streams
//! - [`label`]: MAIN and burst labels assembled from vector file records
//! - [`source`]: label lookup by name, cached per run
//! - [`mpb`]: burst ports costed through the MAIN labels they call
//! - [`flatten`]: per-pin rows through the pin topology

pub mod error;
pub mod flatten;
pub mod label;
pub mod mpb;
pub mod program;
pub mod source;

pub use error::{Result, SeqError};
pub use flatten::{main_label_rows, mpb_label_rows, pin_owners, pin_rows, PinRow};
pub use label::assemble;
pub use mpb::{interpret_mpb_label, PortCost};
pub use program::{build, instruction_cost, interpret_main_label, Cost};
pub use source::{CacheStats, LabelCache, LabelSource};
