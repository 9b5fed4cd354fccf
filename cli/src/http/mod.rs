//! Control-plane HTTP transport

pub mod api;
pub mod branches;
pub mod client;
pub mod deployments;
pub mod envvars;
pub mod projects;
