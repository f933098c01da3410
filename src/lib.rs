pub mod api;
pub mod client;
pub mod config;
pub mod configure;
pub mod credential;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod session;
pub mod sink;
pub mod stream;

#[cfg(test)]
pub mod mock;
