pub mod config;
pub mod instructions;
pub mod baseline;
