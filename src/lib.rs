// src/lib.rs
pub mod assembler;
pub mod batch;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod extractors;
pub mod storage;
pub mod utils;
