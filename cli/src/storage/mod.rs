//! Local configuration and storage

pub mod dotenv;
pub mod layout;
pub mod profiles;
pub mod settings;
