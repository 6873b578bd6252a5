//! Application layer - use cases that coordinate the package services.

mod install;

pub use install::{
    InstallOptions, InstallReport, InstallStatus, Installer, LinkedExecutable,
};
