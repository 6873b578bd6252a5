use anyhow::Result;
use log::debug;

use crate::application::{InstallOptions, InstallStatus, Installer};
use crate::config::Config;
use crate::process::ProcessRunner;
use crate::runtime::Runtime;

use super::{lookup_reference, select_executable};

/// Run an executable of a package, installing it first if needed. Returns the
/// executable's exit code.
#[tracing::instrument(skip(runtime, runner, config))]
pub fn run<R: Runtime, P: ProcessRunner>(
    runtime: &R,
    runner: &P,
    config: &Config,
    package: &str,
    executable: Option<&str>,
    args: &[String],
) -> Result<i32> {
    let reference = lookup_reference(runtime, config, package)?;

    let installer = Installer::new(runtime, runner, config);
    let report = installer.install(&reference, &InstallOptions::default())?;
    if report.status != InstallStatus::AlreadyInstalled {
        eprintln!("Installed {}", report.reference);
    }

    let name = select_executable(&report.reference, &report.executables, executable)?;
    let path = installer.store().install_path(&report.reference).join(&name);
    debug!("Running {:?} with {:?}", path, args);

    runner.run_interactive(&path, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KilnError;
    use crate::package::{PackageReference, PackageStore};
    use crate::process::MockProcessRunner;
    use crate::runtime::RealRuntime;
    use crate::test_utils::{install_fake_package, test_config};
    use mockall::predicate::eq;

    #[test]
    fn test_run_pinned_package_by_short_name() {
        let runtime = RealRuntime;
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let reference = PackageReference::new("yonaskolb/mint", "0.17.0");
        install_fake_package(&config, &reference, &["mint"]);
        // Pin the version so nothing is resolved remotely
        std::fs::write(&config.manifest_path, "yonaskolb/mint@0.17.0\n").unwrap();

        let expected = PackageStore::new(&runtime, &config)
            .install_path(&reference)
            .join("mint");
        let mut runner = MockProcessRunner::new();
        runner.expect_run().never();
        runner
            .expect_run_interactive()
            .with(eq(expected), eq(vec!["--help".to_string()]))
            .times(1)
            .returning(|_, _| Ok(3));

        let code = run(
            &runtime,
            &runner,
            &config,
            "mint",
            None,
            &["--help".to_string()],
        )
        .unwrap();
        assert_eq!(code, 3);
    }

    #[test]
    fn test_run_unknown_executable() {
        let runtime = RealRuntime;
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let reference = PackageReference::new("o/tool", "1.0");
        install_fake_package(&config, &reference, &["tool"]);

        let mut runner = MockProcessRunner::new();
        runner.expect_run_interactive().never();

        let err = run(&runtime, &runner, &config, "o/tool@1.0", Some("other"), &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KilnError>(),
            Some(KilnError::ExecutableNotFound { .. })
        ));
    }
}
