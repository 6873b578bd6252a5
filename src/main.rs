use anyhow::Result;
use clap::Parser;
use kiln::application::InstallOptions;
use kiln::config::Config;
use kiln::package::Overwrite;
use kiln::process::RealProcessRunner;
use kiln::runtime::RealRuntime;
use std::path::PathBuf;

/// kiln - build and cache command-line tools from Cargo packages
///
/// Packages are git repositories, written as `owner/repo`, a host path such as
/// `gitlab.com/owner/repo`, or a full git URL, optionally followed by
/// `@version`. Versions without an explicit pin come from the Kilnfile, or
/// else the latest tag.
///
/// Examples:
///   kiln install owner/tool@1.2.0   # Build, cache and link tool 1.2.0
///   kiln run owner/tool -- --help   # Run a tool without linking it
#[derive(Parser, Debug)]
#[command(author, version = env!("KILN_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Package store directory (defaults to ~/.kiln)
    #[arg(long = "path", env = "KILN_PATH", value_name = "PATH", global = true)]
    store_root: Option<PathBuf>,

    /// Directory for executable links (defaults to ~/.kiln/bin)
    #[arg(
        long = "link-path",
        env = "KILN_LINK_PATH",
        value_name = "PATH",
        global = true
    )]
    link_dir: Option<PathBuf>,

    /// Kilnfile to read pinned versions from
    #[arg(long = "kilnfile", value_name = "FILE", global = true)]
    manifest: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Build a package and link its executables
    Install(InstallArgs),

    /// Run an executable of a package, installing it first if needed
    Run(RunArgs),

    /// Remove every cached version of a package
    Uninstall(UninstallArgs),

    /// List installed packages
    List(ListArgs),

    /// Install every package listed in the Kilnfile
    Bootstrap(BootstrapArgs),

    /// Print the path of an installed executable
    Which(WhichArgs),
}

#[derive(clap::Args, Debug)]
struct InstallArgs {
    /// The package, e.g. "owner/repo@1.0.0"
    #[arg(value_name = "PACKAGE")]
    package: String,

    /// Rebuild even if the version is already installed
    #[arg(short, long)]
    force: bool,

    /// Do not link executables into the link directory
    #[arg(long)]
    no_link: bool,

    /// Replace files kiln did not create (y/n); prompts when omitted
    #[arg(long, value_name = "Y|N")]
    overwrite: Option<Overwrite>,

    /// Only link this executable
    #[arg(short, long, value_name = "NAME")]
    executable: Option<String>,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// The package, e.g. "owner/repo@1.0.0"
    #[arg(value_name = "PACKAGE")]
    package: String,

    /// Executable to run when the package has several
    #[arg(value_name = "EXECUTABLE")]
    executable: Option<String>,

    /// Arguments passed to the executable
    #[arg(last = true)]
    args: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct UninstallArgs {
    /// Package name or repository
    #[arg(value_name = "NAME")]
    name: String,
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    /// Print installed packages in Kilnfile format
    #[arg(long)]
    dump: bool,
}

#[derive(clap::Args, Debug)]
struct BootstrapArgs {
    /// Link executables into the link directory
    #[arg(short, long)]
    link: bool,

    /// Replace files kiln did not create (y/n); prompts when omitted
    #[arg(long, value_name = "Y|N")]
    overwrite: Option<Overwrite>,
}

#[derive(clap::Args, Debug)]
struct WhichArgs {
    /// The package, e.g. "owner/repo@1.0.0"
    #[arg(value_name = "PACKAGE")]
    package: String,

    /// Executable to locate when the package has several
    #[arg(value_name = "EXECUTABLE")]
    executable: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match execute(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns the process exit code.
fn execute(cli: Cli) -> Result<i32> {
    let runtime = RealRuntime;
    let runner = RealProcessRunner;
    let config = Config::resolve(&runtime, cli.store_root, cli.link_dir, cli.manifest)?;

    match cli.command {
        Commands::Install(args) => {
            let options = InstallOptions {
                force: args.force,
                link: !args.no_link,
                overwrite: args
                    .overwrite
                    .unwrap_or_else(|| Overwrite::from_force(args.force)),
                executable: args.executable,
            };
            kiln::commands::install(&runtime, &runner, &config, &args.package, &options)?;
        }
        Commands::Run(args) => {
            return kiln::commands::run(
                &runtime,
                &runner,
                &config,
                &args.package,
                args.executable.as_deref(),
                &args.args,
            );
        }
        Commands::Uninstall(args) => kiln::commands::uninstall(&runtime, &config, &args.name)?,
        Commands::List(args) => kiln::commands::list(&runtime, &config, args.dump)?,
        Commands::Bootstrap(args) => {
            kiln::commands::bootstrap(&runtime, &runner, &config, args.link, args.overwrite)?
        }
        Commands::Which(args) => kiln::commands::which(
            &runtime,
            &config,
            &args.package,
            args.executable.as_deref(),
        )?,
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from(["kiln", "install", "owner/repo@1.0"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.package, "owner/repo@1.0");
                assert!(!args.force);
                assert!(!args.no_link);
                assert_eq!(args.overwrite, None);
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_install_overwrite_values() {
        let cli = Cli::try_parse_from(["kiln", "install", "o/r", "--overwrite", "y"]).unwrap();
        match cli.command {
            Commands::Install(args) => assert_eq!(args.overwrite, Some(Overwrite::Always)),
            _ => panic!("Expected Install command"),
        }

        let cli = Cli::try_parse_from(["kiln", "install", "o/r", "--overwrite", "NO"]).unwrap();
        match cli.command {
            Commands::Install(args) => assert_eq!(args.overwrite, Some(Overwrite::Never)),
            _ => panic!("Expected Install command"),
        }

        assert!(Cli::try_parse_from(["kiln", "install", "o/r", "--overwrite", "maybe"]).is_err());
    }

    #[test]
    fn test_cli_run_passes_trailing_args() {
        let cli = Cli::try_parse_from(["kiln", "run", "o/r", "tool", "--", "--help", "-x"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.package, "o/r");
                assert_eq!(args.executable.as_deref(), Some("tool"));
                assert_eq!(args.args, vec!["--help", "-x"]);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_global_paths() {
        let cli = Cli::try_parse_from([
            "kiln",
            "list",
            "--path",
            "/tmp/store",
            "--link-path",
            "/tmp/bin",
            "--kilnfile",
            "/tmp/Kilnfile",
        ])
        .unwrap();
        assert_eq!(cli.store_root, Some(PathBuf::from("/tmp/store")));
        assert_eq!(cli.link_dir, Some(PathBuf::from("/tmp/bin")));
        assert_eq!(cli.manifest, Some(PathBuf::from("/tmp/Kilnfile")));
    }

    #[test]
    fn test_cli_bootstrap_and_list_flags() {
        let cli = Cli::try_parse_from(["kiln", "bootstrap", "--link"]).unwrap();
        assert!(matches!(cli.command, Commands::Bootstrap(BootstrapArgs { link: true, .. })));

        let cli = Cli::try_parse_from(["kiln", "list", "--dump"]).unwrap();
        assert!(matches!(cli.command, Commands::List(ListArgs { dump: true })));
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["kiln", "owner/repo"]).is_err());
    }
}
