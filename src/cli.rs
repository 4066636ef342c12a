use crate::composer::{ComposerAction, ComposerInstaller};
use crate::config::Config;
use crate::error::Result;
use crate::host::Host;
use crate::installer::Installer;
use crate::options::InstallOptions;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const LONG_ABOUT: &str = "\
Installs Cloudify's CLI on Linux, Windows and OS X (Darwin).
On Linux, Debian/Ubuntu, CentOS/RHEL and Arch are supported.

Dependencies (pip, virtualenv, python-dev, pycrypto) are only installed when
explicitly requested, or when --force is given.

If a wheels directory is found (see --wheels-path) it is used for an offline
installation unless --force-online is set; should the offline installation
fail, an online one follows.

When running under sudo and installing into a virtualenv, root privileges are
dropped so the virtualenv is owned by the invoking user.";

#[derive(Parser)]
#[command(name = "get-cloudify")]
#[command(about = "Bootstrap installer for the Cloudify CLI")]
#[command(version, long_about = LONG_ABOUT)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose level logging to shell.
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors.
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Installs Cloudify CLI.
    Cli(CliArgs),

    /// Installs or uninstalls Cloudify Blueprint Composer.
    Composer(ComposerArgs),
}

#[derive(Args, Debug, Default)]
pub struct CliArgs {
    /// Force install any requirements (USE WITH CARE!).
    #[arg(short, long)]
    pub force: bool,

    /// Path to a Virtualenv to install Cloudify in.
    #[arg(short = 'e', long)]
    pub virtualenv: Option<PathBuf>,

    /// Attempt to install a specific version of Cloudify.
    #[arg(long, conflicts_with_all = ["pre", "source", "use_branch"])]
    pub version: Option<String>,

    /// Attempt to install the latest Cloudify Milestone.
    #[arg(long, conflicts_with_all = ["source", "use_branch"])]
    pub pre: bool,

    /// Install from the provided URL or local path.
    #[arg(short, long, conflicts_with = "use_branch")]
    pub source: Option<String>,

    /// Install from a GitHub branch, given as <branch> or <user>/<branch>.
    #[arg(long)]
    pub use_branch: Option<String>,

    /// Install default or provided requirements files.
    #[arg(short = 'r', long, num_args = 0..)]
    pub with_requirements: Option<Vec<PathBuf>>,

    /// Upgrades Cloudify if already installed.
    #[arg(short, long)]
    pub upgrade: bool,

    /// Even if wheels are found locally, install from PyPI.
    #[arg(long, conflicts_with = "wheels_path")]
    pub force_online: bool,

    /// Path to wheels (defaults to "<cwd>/wheelhouse").
    #[arg(long)]
    pub wheels_path: Option<PathBuf>,

    /// Python path to use when creating a virtualenv.
    #[arg(long)]
    pub python_path: Option<PathBuf>,

    /// Extra arguments appended to every pip install command.
    #[arg(long, allow_hyphen_values = true)]
    pub pip_args: Option<String>,

    /// Attempt to install pip.
    #[arg(long)]
    pub install_pip: bool,

    /// Attempt to install Virtualenv.
    #[arg(long)]
    pub install_virtualenv: bool,

    /// Attempt to install Python Developers Package.
    #[arg(long, hide = cfg!(windows))]
    pub install_pythondev: bool,

    /// Attempt to install PyCrypto.
    #[arg(long, hide = cfg!(not(windows)))]
    pub install_pycrypto: bool,
}

#[derive(Args, Debug)]
pub struct ComposerArgs {
    /// Installs a specific version.
    #[arg(long, required_unless_present = "uninstall", conflicts_with = "uninstall")]
    pub version: Option<String>,

    /// Uninstalls the composer.
    #[arg(long)]
    pub uninstall: bool,
}

impl CliArgs {
    /// 合并命令行与配置文件，命令行优先
    pub fn into_options(self, config: &Config, host: &Host) -> Result<InstallOptions> {
        let source = match (self.source, self.use_branch) {
            (Some(source), _) => Some(source),
            (None, Some(branch)) => Some(config.branch_url(&branch)?),
            (None, None) => None,
        };

        let mut builder = InstallOptions::builder()
            .force(self.force)
            .upgrade(self.upgrade)
            .pre(self.pre)
            .force_online(self.force_online)
            .install_pip(self.install_pip)
            .install_virtualenv(self.install_virtualenv)
            .install_pythondev(self.install_pythondev)
            .install_pycrypto(self.install_pycrypto);
        if let Some(env) = self.virtualenv {
            builder = builder.virtualenv(env);
        }
        if let Some(version) = self.version {
            builder = builder.version(version);
        }
        if let Some(source) = source {
            builder = builder.source(source);
        }
        if let Some(files) = self.with_requirements {
            builder = builder.with_requirements(files);
        }
        if let Some(path) = self.wheels_path.or_else(|| config.wheels_path.clone()) {
            builder = builder.wheels_path(path);
        }
        if let Some(path) = self.python_path.or_else(|| config.python_path.clone()) {
            builder = builder.python_path(path);
        }
        if let Some(args) = self.pip_args {
            builder = builder.pip_args(args);
        }
        builder.build(host)
    }
}

impl ComposerArgs {
    pub fn action(self) -> ComposerAction {
        match self.version {
            Some(version) if !self.uninstall => ComposerAction::Install { version },
            _ => ComposerAction::Uninstall,
        }
    }
}

impl Cli {
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    pub async fn execute(self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let host = Host::detect()?;

        match self.command {
            Commands::Cli(args) => {
                let options = args.into_options(&config, &host)?;
                let mut installer = Installer::new(options, host, config);
                installer.execute().await?;
                Ok(())
            }
            Commands::Composer(args) => {
                ComposerInstaller::new(args.action(), host, config)
                    .execute()
                    .await
            }
        }
    }
}
