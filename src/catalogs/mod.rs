//! Lookup tables and raw-observation sources consumed by the scorer.

pub mod terms;

pub use terms::{read_observations_csv, read_term_table_csv, TermEntry, TermLookup};
