//! HTTP facade over the agent
//!
//! - `routes`   -- the axum router
//! - `handlers` -- endpoint handlers and error mapping
//! - `state`    -- shared application state
//! - `trace`    -- reshaping agent traces into API messages
//! - `types`    -- request and response bodies
//! - `server`   -- listener, startup task and graceful shutdown

pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod trace;
pub mod types;

pub use routes::create_router;
pub use server::{run, start_server};
pub use state::AppState;
