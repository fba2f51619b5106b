pub mod config;
pub mod mongo;
pub mod seed;
pub mod server;
