//! Record filtering and output.
//!
//! - [`filter`] - Record filtering by date and token count
//! - [`output`] - Format writers (CSV, JSON, JSONL)

pub mod filter;
pub mod output;

pub use filter::{FilterConfig, apply_filters};
pub use output::{COLUMNS, OutputRecord};

#[cfg(feature = "csv-output")]
pub use output::{to_csv, write_csv};
#[cfg(feature = "json-output")]
pub use output::{to_json, to_jsonl, write_json, write_jsonl};
