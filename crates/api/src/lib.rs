pub mod app;
pub mod config;
pub mod error;
pub mod gql;
pub mod state;
pub mod transport;

pub use state::AppState;
