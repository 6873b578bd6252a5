//! Git operations, run through the `git` executable.

use anyhow::Result;
use log::debug;
use std::path::Path;

use crate::error::KilnError;
use crate::package::{RemoteRefs, looks_like_commit};
use crate::process::{ProcessRunner, args};

const GIT: &str = "git";
const TAG_PREFIX: &str = "refs/tags/";
const HEAD_PREFIX: &str = "ref: refs/heads/";

pub struct GitClient<'a, P: ProcessRunner> {
    runner: &'a P,
}

impl<'a, P: ProcessRunner> GitClient<'a, P> {
    pub fn new(runner: &'a P) -> Self {
        Self { runner }
    }

    /// Check out `version` of `url` into `dest`, which must not exist yet.
    ///
    /// Tags and branches get a shallow single-branch clone. Commit hashes need
    /// the full history, so they are cloned fully and checked out afterwards.
    #[tracing::instrument(skip(self))]
    pub fn clone(&self, url: &str, version: &str, dest: &Path) -> Result<()> {
        let not_found = || KilnError::RepositoryNotFound {
            url: url.to_string(),
            reference: Some(version.to_string()),
        };
        let work_dir = dest.parent().unwrap_or(Path::new("."));
        let dest_arg = dest.to_string_lossy().into_owned();

        let clone_args = if looks_like_commit(version) {
            args(["clone", "--quiet", "--", url, dest_arg.as_str()])
        } else {
            args([
                "clone",
                "--quiet",
                "--depth",
                "1",
                "--branch",
                version,
                "--",
                url,
                dest_arg.as_str(),
            ])
        };

        let output = self.runner.run(GIT, &clone_args, work_dir)?;
        if !output.is_success() {
            debug!("git clone failed: {}", output.diagnostics());
            return Err(not_found().into());
        }

        if looks_like_commit(version) {
            let output = self
                .runner
                .run(GIT, &args(["checkout", "--quiet", version]), dest)?;
            if !output.is_success() {
                debug!("git checkout failed: {}", output.diagnostics());
                return Err(not_found().into());
            }
        }

        Ok(())
    }
}

impl<P: ProcessRunner> RemoteRefs for GitClient<'_, P> {
    #[tracing::instrument(skip(self))]
    fn list_tags(&self, url: &str) -> Result<Vec<String>> {
        let output = self.runner.run(
            GIT,
            &args(["ls-remote", "--tags", "--refs", "--", url]),
            Path::new("."),
        )?;
        if !output.is_success() {
            debug!("git ls-remote failed: {}", output.diagnostics());
            return Err(KilnError::RepositoryNotFound {
                url: url.to_string(),
                reference: None,
            }
            .into());
        }
        Ok(parse_tags(&output.stdout))
    }

    #[tracing::instrument(skip(self))]
    fn default_branch(&self, url: &str) -> Result<Option<String>> {
        let cmd = args(["ls-remote", "--symref", "--", url, "HEAD"]);
        let output = self.runner.run(GIT, &cmd, Path::new("."))?.check(GIT, &cmd)?;
        Ok(parse_head_symref(&output.stdout))
    }
}

/// Tag names from `git ls-remote --tags --refs` output, in listed order.
fn parse_tags(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split('\t').nth(1))
        .filter_map(|reference| reference.trim().strip_prefix(TAG_PREFIX))
        .map(String::from)
        .collect()
}

/// Branch from the `ref: refs/heads/<branch>\tHEAD` line of `--symref` output.
fn parse_head_symref(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let (reference, name) = line.split_once('\t')?;
        if name.trim() != "HEAD" {
            return None;
        }
        reference.strip_prefix(HEAD_PREFIX).map(String::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{MockProcessRunner, ProcessOutput};
    use std::path::PathBuf;

    const URL: &str = "https://github.com/o/tool.git";

    #[test]
    fn test_parse_tags() {
        let stdout = "\
1111111111111111111111111111111111111111\trefs/tags/v1.0.0
2222222222222222222222222222222222222222\trefs/tags/v1.1.0
3333333333333333333333333333333333333333\trefs/tags/release/2024
";
        assert_eq!(parse_tags(stdout), vec!["v1.0.0", "v1.1.0", "release/2024"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn test_parse_head_symref() {
        let stdout = "ref: refs/heads/main\tHEAD\n4444444444444444444444444444444444444444\tHEAD\n";
        assert_eq!(parse_head_symref(stdout), Some("main".to_string()));
        assert_eq!(
            parse_head_symref("4444444444444444444444444444444444444444\tHEAD\n"),
            None
        );
    }

    #[test]
    fn test_list_tags_runs_ls_remote() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|program, args, _| {
                program == "git" && args == ["ls-remote", "--tags", "--refs", "--", URL]
            })
            .times(1)
            .returning(|_, _, _| Ok(ProcessOutput::success("abc\trefs/tags/0.1.0\n")));

        let git = GitClient::new(&runner);
        assert_eq!(git.list_tags(URL).unwrap(), vec!["0.1.0"]);
    }

    #[test]
    fn test_list_tags_unreachable_is_repository_not_found() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(|_, _, _| {
            Ok(ProcessOutput::failure(
                128,
                "fatal: repository 'https://github.com/o/tool.git/' not found",
            ))
        });

        let git = GitClient::new(&runner);
        let err = git.list_tags(URL).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KilnError>(),
            Some(KilnError::RepositoryNotFound { url, reference: None }) if url == URL
        ));
    }

    #[test]
    fn test_default_branch() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|_, args, _| args.iter().any(|a| a == "--symref"))
            .returning(|_, _, _| Ok(ProcessOutput::success("ref: refs/heads/trunk\tHEAD\n")));

        let git = GitClient::new(&runner);
        assert_eq!(git.default_branch(URL).unwrap(), Some("trunk".to_string()));
    }

    #[test]
    fn test_clone_tag_is_shallow() {
        let mut runner = MockProcessRunner::new();
        let dest = PathBuf::from("/tmp/kiln-checkout/tool");
        runner
            .expect_run()
            .withf(|_, args, work_dir| {
                args[0] == "clone"
                    && args.windows(2).any(|w| w == ["--branch", "1.2.0"])
                    && args.contains(&"--depth".to_string())
                    && work_dir == Path::new("/tmp/kiln-checkout")
            })
            .times(1)
            .returning(|_, _, _| Ok(ProcessOutput::success("")));

        let git = GitClient::new(&runner);
        git.clone(URL, "1.2.0", &dest).unwrap();
    }

    #[test]
    fn test_locations_are_never_read_as_options() {
        const HOSTILE: &str = "--upload-pack=touch /tmp/owned@x";
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|_, args, _| {
                args == [
                    "clone",
                    "--quiet",
                    "--depth",
                    "1",
                    "--branch",
                    "1.0",
                    "--",
                    HOSTILE,
                    "/tmp/kiln-checkout/tool",
                ]
            })
            .times(1)
            .returning(|_, _, _| Ok(ProcessOutput::success("")));
        runner
            .expect_run()
            .withf(|_, args, _| args == ["ls-remote", "--symref", "--", HOSTILE, "HEAD"])
            .times(1)
            .returning(|_, _, _| Ok(ProcessOutput::success("")));

        let git = GitClient::new(&runner);
        git.clone(HOSTILE, "1.0", Path::new("/tmp/kiln-checkout/tool"))
            .unwrap();
        assert_eq!(git.default_branch(HOSTILE).unwrap(), None);
    }

    #[test]
    fn test_clone_commit_checks_out_after_full_clone() {
        let mut runner = MockProcessRunner::new();
        let mut seq = mockall::Sequence::new();
        let dest = PathBuf::from("/tmp/kiln-checkout/tool");

        runner
            .expect_run()
            .withf(|_, args, _| args[0] == "clone" && !args.contains(&"--depth".to_string()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(ProcessOutput::success("")));
        runner
            .expect_run()
            .withf(|_, args, work_dir| {
                args == ["checkout", "--quiet", "0a1b2c3d"]
                    && work_dir == Path::new("/tmp/kiln-checkout/tool")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(ProcessOutput::success("")));

        let git = GitClient::new(&runner);
        git.clone(URL, "0a1b2c3d", &dest).unwrap();
    }

    #[test]
    fn test_clone_missing_ref_is_repository_not_found() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(|_, _, _| {
            Ok(ProcessOutput::failure(
                128,
                "warning: Could not find remote branch 9.9.9 to clone.",
            ))
        });

        let git = GitClient::new(&runner);
        let err = git
            .clone(URL, "9.9.9", Path::new("/tmp/kiln-checkout/tool"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KilnError>(),
            Some(KilnError::RepositoryNotFound { reference: Some(r), .. }) if r == "9.9.9"
        ));
    }
}
