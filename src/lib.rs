pub mod application;
pub mod commands;
pub mod config;
pub mod error;
pub mod git;
pub mod package;
pub mod process;
pub mod runtime;
pub mod toolchain;
