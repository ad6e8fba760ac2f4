pub mod context;
pub mod handlers;
pub mod messages;
pub mod password_reset;

pub use context::RequestContext;
