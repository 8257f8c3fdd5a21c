pub mod detect;
pub mod registry;

pub use detect::{detect_columns, AreaColumn, AreaColumnMapping};
pub use registry::{AreaKeyword, KeywordRegistry};
