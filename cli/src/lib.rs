//! Taskship CLI library
//!
//! Bundles a task project, builds its image and drives the remote
//! deployment to completion.

pub mod app;
pub mod authn;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod progress;
pub mod reporter;
pub mod storage;
pub mod utils;
