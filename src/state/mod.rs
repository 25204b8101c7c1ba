pub mod display;
pub mod history;
pub mod route;
pub mod sample;
pub mod stats;

pub use display::*;
pub use history::*;
pub use route::*;
pub use sample::*;
pub use stats::*;
