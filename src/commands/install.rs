use anyhow::Result;
use log::debug;

use crate::application::{InstallOptions, InstallReport, InstallStatus, Installer};
use crate::config::Config;
use crate::package::LinkOutcome;
use crate::process::ProcessRunner;
use crate::runtime::Runtime;

use super::pinned_reference;

/// Install one package and, unless disabled, link its executables.
#[tracing::instrument(skip(runtime, runner, config))]
pub fn install<R: Runtime, P: ProcessRunner>(
    runtime: &R,
    runner: &P,
    config: &Config,
    package: &str,
    options: &InstallOptions,
) -> Result<()> {
    let reference = pinned_reference(runtime, config, package)?;
    debug!("Installing {} with {:?}", reference, options);

    let installer = Installer::new(runtime, runner, config);
    let report = installer.install(&reference, options)?;
    print_report(config, &report);
    Ok(())
}

pub(crate) fn print_report(config: &Config, report: &InstallReport) {
    let executables = report.executables.join(", ");
    match report.status {
        InstallStatus::AlreadyInstalled => {
            println!("{} is already installed ({})", report.reference, executables)
        }
        InstallStatus::Reinstalled => {
            println!("Reinstalled {} ({})", report.reference, executables)
        }
        InstallStatus::Installed => println!("Installed {} ({})", report.reference, executables),
    }

    for linked in &report.links {
        let path = config.link_path(&linked.name);
        match &linked.outcome {
            LinkOutcome::Linked => println!("  Linked {}", path.display()),
            LinkOutcome::Replaced(previous) => println!(
                "  Linked {} (replaced {})",
                path.display(),
                previous.description()
            ),
            LinkOutcome::Declined(conflict) => eprintln!("  Warning: {}", conflict),
        }
    }
}
