pub mod config;
pub mod doc;
pub mod generate;
