pub mod codec;
pub mod common;
