pub mod bot;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod keyboard;
pub mod store;
