pub mod charts;
pub mod help;
pub mod responders;
pub mod table;

pub use charts::*;
pub use help::*;
pub use responders::*;
pub use table::TableView;
