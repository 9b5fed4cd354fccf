//! Authentication

pub mod login;
