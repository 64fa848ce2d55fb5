pub mod edit_handlers;
pub mod factory_extractor;
pub mod handlers;
pub mod pending_handlers;
pub mod redirect_handlers;
pub mod routes;
pub mod user_extractor;

pub use edit_handlers::*;
pub use handlers::*;
pub use pending_handlers::*;
pub use redirect_handlers::*;
pub use routes::*;
