pub mod admin;
pub mod audio;
pub mod auth;
pub mod book;
pub mod error;
pub mod extract;
pub mod feedback;
pub mod listening;
pub mod middleware;
pub mod reading;
pub mod router;
pub mod settings;
pub mod state;
pub mod status;

pub use router::api_router;
pub use state::{ApiConfig, AppState, AppStateInner};
