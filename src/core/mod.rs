pub mod config;
pub mod error;
pub mod insight;
pub mod paths;
pub mod record;
pub mod topics;
