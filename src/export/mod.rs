pub mod csv;
pub mod report;

pub use csv::*;
pub use report::*;
