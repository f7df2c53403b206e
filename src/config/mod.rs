pub mod config;
pub mod request_timeout;
