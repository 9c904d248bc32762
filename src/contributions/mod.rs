pub mod errors;
pub mod pipeline;
pub mod recipients;
pub mod records;
pub mod reports;
