//! Deploy pipeline

pub mod branch;
pub mod build_logs;
pub mod bundle;
pub mod coordinator;
pub mod docker;
pub mod envsync;
pub mod failure;
pub mod fsm;
pub mod git;
pub mod lifecycle;
pub mod outputs;
pub mod session;
