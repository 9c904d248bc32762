//! Running median by zip code and median by date over a stream of individual
//! contribution records.

pub mod contributions;
pub mod logging;
