pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod middleware;
pub mod validation;

pub use app::{app, AppState};
