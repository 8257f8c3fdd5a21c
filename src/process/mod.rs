// src/process/mod.rs

pub mod date_parser;
pub mod raw_table;
pub mod record;
pub mod reshape;

pub use raw_table::RawTable;
pub use record::{PriceRecord, PERIODS_PER_DAY};
pub use reshape::{reshape, DefectCounts, DefectKind, Reshaped};
