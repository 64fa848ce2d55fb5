pub mod change;
pub mod common;
pub mod record;
pub mod tree;
pub mod user_context;

pub use change::*;
pub use common::*;
pub use record::*;
pub use tree::*;
pub use user_context::*;
