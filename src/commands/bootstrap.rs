use anyhow::Result;
use log::{debug, warn};
use std::collections::HashSet;

use crate::application::{InstallOptions, Installer};
use crate::config::Config;
use crate::package::{Manifest, Overwrite};
use crate::process::ProcessRunner;
use crate::runtime::Runtime;

use super::install::print_report;

/// Install every package listed in the Kilnfile, in file order.
///
/// Later duplicates of a repository are skipped. A failing entry is reported
/// and the rest are still installed; the command fails if any entry did.
#[tracing::instrument(skip(runtime, runner, config))]
pub fn bootstrap<R: Runtime, P: ProcessRunner>(
    runtime: &R,
    runner: &P,
    config: &Config,
    link: bool,
    overwrite: Option<Overwrite>,
) -> Result<()> {
    let manifest = Manifest::load(runtime, &config.manifest_path)?;
    for diagnostic in manifest.diagnostics() {
        eprintln!("Warning: {}", diagnostic);
    }

    if manifest.is_empty() {
        println!("{} lists no packages.", config.manifest_path.display());
        return Ok(());
    }

    let options = InstallOptions {
        link,
        overwrite: overwrite.unwrap_or_default(),
        ..Default::default()
    };
    let installer = Installer::new(runtime, runner, config);

    let mut seen = HashSet::new();
    let mut attempted = 0;
    let mut failed = Vec::new();
    for entry in &manifest.entries {
        if !seen.insert(entry.sanitized_directory_name().to_lowercase()) {
            debug!("Skipping duplicate {}", entry);
            continue;
        }
        attempted += 1;

        match installer.install(entry, &options) {
            Ok(report) => print_report(config, &report),
            Err(e) => {
                warn!("Failed to install {}: {:#}", entry, e);
                eprintln!("Failed to install {}: {:#}", entry, e);
                failed.push(entry.to_string());
            }
        }
    }

    if !failed.is_empty() {
        anyhow::bail!(
            "{} of {} package(s) failed to install: {}",
            failed.len(),
            attempted,
            failed.join(", ")
        );
    }
    println!("Installed {} package(s) from {}", attempted, config.manifest_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{PackageReference, PackageStore};
    use crate::process::{MockProcessRunner, ProcessOutput};
    use crate::runtime::RealRuntime;
    use crate::test_utils::{fake_cargo, fake_cargo_package, install_fake_package, test_config};
    use std::fs;

    #[test]
    fn test_bootstrap_missing_kilnfile() {
        let runtime = RealRuntime;
        let runner = MockProcessRunner::new();
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());

        let err = bootstrap(&runtime, &runner, &config, false, None).unwrap_err();
        assert!(err.to_string().contains("No Kilnfile found"));
    }

    #[test]
    fn test_bootstrap_empty_kilnfile() {
        let runtime = RealRuntime;
        let runner = MockProcessRunner::new();
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        fs::write(&config.manifest_path, "# nothing yet\n").unwrap();

        bootstrap(&runtime, &runner, &config, false, None).unwrap();
    }

    #[test_log::test]
    fn test_bootstrap_installs_first_of_duplicates_and_continues_after_failure() {
        let runtime = RealRuntime;
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        fs::write(
            &config.manifest_path,
            "o/missing@1.0\no/tool@1.0\nO/Tool@2.0\no/cached@3.0\n",
        )
        .unwrap();
        install_fake_package(&config, &PackageReference::new("o/cached", "3.0"), &["cached"]);

        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|program, args, _| {
                program == "git" && args[0] == "clone" && args.iter().any(|a| a.ends_with("o/missing.git"))
            })
            .times(1)
            .returning(|_, _, _| Ok(ProcessOutput::failure(128, "fatal: not found")));
        runner
            .expect_run()
            .withf(|program, args, _| {
                program == "git" && args[0] == "clone" && args.iter().any(|a| a.ends_with("o/tool.git"))
            })
            .times(1)
            .returning(|_, args, _| {
                assert!(args.contains(&"1.0".to_string()));
                fake_cargo_package(args.last().unwrap(), &["tool"]);
                Ok(ProcessOutput::success(""))
            });
        runner
            .expect_run()
            .withf(|program, _, _| program == "cargo")
            .returning(|_, args, dir| Ok(fake_cargo(args, dir)));

        let err = bootstrap(&runtime, &runner, &config, false, None).unwrap_err();
        assert!(err.to_string().starts_with("1 of 3 package(s) failed"));

        let store = PackageStore::new(&runtime, &config);
        assert!(store.is_installed(&PackageReference::new("o/tool", "1.0")));
        assert!(!store.is_installed(&PackageReference::new("o/tool", "2.0")));
    }
}
