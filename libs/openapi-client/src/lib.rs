//! Taskship control-plane API models
//!
//! Request and response bodies exchanged with the control plane. This crate
//! carries no I/O; the CLI owns the transport.

pub mod models;
