pub mod cache;
pub mod config;
pub mod navigation;
pub mod projection;
pub mod session;
