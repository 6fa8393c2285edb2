pub mod error;
pub mod handlers;
pub mod reports;
pub mod requests;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
