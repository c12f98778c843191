pub mod auth;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod http;
pub mod model;
pub mod notify;
pub mod run;
pub mod source;
