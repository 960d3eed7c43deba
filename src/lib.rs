pub mod archive;
pub mod assemble;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod decompress;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod output;
pub mod place;
pub mod progress;
pub mod staging;
pub mod transform;
pub mod transport;
