pub mod components;
pub mod config;
pub mod error;
pub mod utils;

#[cfg(feature = "web-interface")]
pub mod web;
