pub mod config;
pub mod infer;
pub mod resolve;
pub mod rewrite_tables;
