pub mod fact;
pub mod header;
pub mod tags;

pub use fact::*;
pub use header::*;
pub use tags::*;
