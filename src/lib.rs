pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod frontend;
pub mod handlers;
pub mod middleware;
pub mod tenancy;

pub use app::{app, connect_store, AppState, Storage};
