pub mod archive;
pub mod cli;
pub mod config;
pub mod detector;
pub mod error;
pub mod job;
pub mod ocr;
pub mod renamer;
pub mod scanner;
pub mod server;
