pub mod handlers;
pub mod http_server;
pub mod state;
pub mod types;

pub use http_server::build_router;
pub use state::AppState;
