//! Web service around a chest CT scan classifier: validated per-stage
//! pipeline configuration, base64 image handling, TorchScript inference and
//! background training runs.

pub mod components;
pub mod config;
pub mod pipeline;
pub mod routes;
pub mod training;
pub mod utils;
