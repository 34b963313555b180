//! Output formatting module.

pub mod table;

pub use table::print_report;
