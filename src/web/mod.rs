pub mod auth;
pub mod extract;
pub mod print_requests;
pub mod proxy;
pub mod responses;
pub mod router;
pub mod state;
pub mod storage;
pub mod uploads;

pub use state::AppState;
