//! Glue for host web frameworks.

pub mod axum;
