use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Disable the download progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    /// Set proxy
    #[arg(required = false, long, short = 'P', global = true)]
    pub proxy: Option<String>,

    /// Set request headers
    #[arg(required = false, long, short = 'H', global = true)]
    pub header: Option<Vec<String>>,

    /// Set user agent
    #[arg(required = false, long, short = 'A', global = true)]
    pub user_agent: Option<String>,

    /// Target operating system (darwin, linux, windows)
    #[arg(required = false, long, global = true)]
    pub os: Option<String>,

    /// Target architecture (amd64, arm64)
    #[arg(required = false, long, global = true)]
    pub arch: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the latest stable release
    Latest,

    /// List published releases, newest first
    #[clap(name = "list", visible_alias = "ls")]
    List {
        /// Only show patches of this minor series (e.g. v1.29)
        #[arg(required = false, short, long)]
        minor: Option<String>,

        /// Show at most this many releases
        #[arg(required = false, short, long)]
        limit: Option<usize>,
    },

    /// Resolve a version token (v1.30.1, 1.29, latest) to a release
    #[command(arg_required_else_help = true)]
    Resolve {
        /// Version token
        token: String,
    },

    /// Download a checksum-verified kubectl binary
    #[clap(name = "download", visible_alias = "dl")]
    Download {
        /// Version token. Falls back to $KVM_VERSION_TARGET, then the latest release
        version: Option<String>,

        /// Output file path
        #[arg(required = false, short, long, value_hint = ValueHint::FilePath)]
        output: Option<String>,
    },

    /// Manage the download cache
    #[command(arg_required_else_help = true)]
    Cache {
        #[clap(subcommand)]
        action: CacheAction,
    },

    /// Generate default config with documentation
    #[clap(name = "defconfig")]
    DefConfig,

    /// View env
    Env,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// List cached versions and their digests
    #[clap(visible_alias = "ls")]
    List,

    /// Remove every cached binary and registry entry
    Clear,

    /// Re-hash cached binaries and report corrupted ones
    Verify,

    /// Print the cache directory
    Path,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_download() {
        let args = Args::parse_from(["kvm", "download", "v1.29", "-o", "/tmp/kubectl", "-vv"]);
        assert_eq!(args.verbose, 2);
        match args.command {
            Commands::Download {
                version,
                output,
            } => {
                assert_eq!(version.as_deref(), Some("v1.29"));
                assert_eq!(output.as_deref(), Some("/tmp/kubectl"));
            }
            _ => panic!("expected download command"),
        }
    }

    #[test]
    fn test_parse_global_platform_flags() {
        let args = Args::parse_from(["kvm", "--os", "darwin", "latest", "--arch", "arm64"]);
        assert_eq!(args.os.as_deref(), Some("darwin"));
        assert_eq!(args.arch.as_deref(), Some("arm64"));
        assert!(matches!(args.command, Commands::Latest));
    }

    #[test]
    fn test_parse_cache_clear() {
        let args = Args::parse_from(["kvm", "cache", "clear"]);
        assert!(matches!(
            args.command,
            Commands::Cache {
                action: CacheAction::Clear
            }
        ));
    }
}
