pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fasta;
pub mod fetch;
pub mod filter;
pub mod gff;
pub mod output;
pub mod store;
