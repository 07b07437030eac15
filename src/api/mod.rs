//! HTTP surface: request interceptors, demo handlers and the server loop.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod server;
