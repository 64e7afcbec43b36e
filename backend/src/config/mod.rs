pub mod entity;
pub mod manager;
pub mod server;
