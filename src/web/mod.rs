pub mod admin;
mod admin_utils;
pub mod auth;
pub mod content;
pub mod responses;
pub mod router;
pub mod state;
pub mod submissions;
pub mod templates;
mod uploads;

pub use state::AppState;
