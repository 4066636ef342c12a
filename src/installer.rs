//! Cloudify CLI installation.
//!
//! [`Installer::execute`] walks a fixed, forward-only sequence of [`Stage`]s.
//! Each stage either does its work, is skipped because the options or host
//! do not call for it, or fails, and a failure ends the run with the error
//! kind of that stage. The single recovery path is the offline wheel install
//! falling back to an online one.

use crate::archive;
use crate::config::Config;
use crate::download::{Downloader, Fetch};
use crate::error::{Error, Result};
use crate::executor::{CommandRunner, ShellRunner};
use crate::host::{DistroFamily, Host, Platform};
use crate::options::{InstallOptions, Requirements};
use crate::privilege;
use crate::python::{self, PipInstall};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PACKAGE: &str = "cloudify";
pub const REQUIREMENT_FILE_NAMES: [&str; 2] = ["dev-requirements.txt", "requirements.txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    UpgradeGuard,
    Pip,
    VirtualenvTool,
    PythonDev,
    DropPrivileges,
    CreateVirtualenv,
    Pycrypto,
    Requirements,
    Install,
    Report,
    Done,
}

impl Stage {
    pub fn next(self) -> Self {
        match self {
            Stage::UpgradeGuard => Stage::Pip,
            Stage::Pip => Stage::VirtualenvTool,
            Stage::VirtualenvTool => Stage::PythonDev,
            Stage::PythonDev => Stage::DropPrivileges,
            Stage::DropPrivileges => Stage::CreateVirtualenv,
            Stage::CreateVirtualenv => Stage::Pycrypto,
            Stage::Pycrypto => Stage::Requirements,
            Stage::Requirements => Stage::Install,
            Stage::Install => Stage::Report,
            Stage::Report | Stage::Done => Stage::Done,
        }
    }
}

/// What a successful run leaves for the user to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub activate_command: Option<String>,
}

pub struct Installer<R = ShellRunner, F = Downloader> {
    options: InstallOptions,
    host: Host,
    config: Config,
    runner: R,
    fetcher: F,
    requirement_files: Vec<PathBuf>,
    /// 从源码包中解出的 requirements 文件所在目录，随 Installer 一起删除
    requirements_dir: Option<TempDir>,
    report: InstallReport,
}

impl Installer {
    pub fn new(options: InstallOptions, host: Host, config: Config) -> Self {
        Self::with_components(options, host, config, ShellRunner::new(), Downloader::new())
    }
}

impl<R: CommandRunner, F: Fetch> Installer<R, F> {
    pub fn with_components(
        options: InstallOptions,
        host: Host,
        config: Config,
        runner: R,
        fetcher: F,
    ) -> Self {
        Self {
            options,
            host,
            config,
            runner,
            fetcher,
            requirement_files: Vec::new(),
            requirements_dir: None,
            report: InstallReport::default(),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn options(&self) -> &InstallOptions {
        &self.options
    }

    /// Installation logic.
    ///
    /// `force` installs every prerequisite. A wheels directory, when present
    /// and online installation is not forced, is tried first; if that offline
    /// attempt fails an online installation follows.
    pub async fn execute(&mut self) -> Result<InstallReport> {
        tracing::debug!("Identified Platform: {:?}", self.host.platform);
        tracing::debug!("Identified Distribution: {}", self.host.distro);
        tracing::debug!("Identified Release: {}", self.host.release);

        let mut stage = Stage::UpgradeGuard;
        while stage != Stage::Done {
            tracing::trace!("Entering stage {:?}", stage);
            self.run_stage(stage).await?;
            stage = stage.next();
        }
        Ok(std::mem::take(&mut self.report))
    }

    async fn run_stage(&mut self, stage: Stage) -> Result<()> {
        let force = self.options.force();
        let windows = self.host.platform.is_windows();
        match stage {
            Stage::UpgradeGuard => self.handle_upgrade().await,
            Stage::Pip if force || self.options.install_pip() => self.install_pip().await,
            Stage::VirtualenvTool
                if self.options.virtualenv().is_some()
                    && (force || self.options.install_virtualenv()) =>
            {
                self.install_virtualenv_tool().await
            }
            Stage::PythonDev if !windows && (force || self.options.install_pythondev()) => {
                self.install_pythondev().await
            }
            // 先降权再写入 virtualenv，保证环境归调用者所有
            Stage::DropPrivileges
                if !windows && (self.host.in_virtualenv || self.options.virtualenv().is_some()) =>
            {
                privilege::drop_root_privileges(&self.host)
            }
            Stage::CreateVirtualenv => match self.options.virtualenv() {
                Some(env) if !python::activation_marker(self.host.platform, env).is_file() => {
                    python::make_virtualenv(&self.runner, env, self.options.python_path()).await
                }
                _ => Ok(()),
            },
            Stage::Pycrypto if windows && (force || self.options.install_pycrypto()) => {
                self.install_pycrypto().await
            }
            Stage::Requirements => self.resolve_requirements().await,
            Stage::Install => self.install().await,
            Stage::Report => {
                if let Some(env) = self.options.virtualenv() {
                    let command = python::activate_command(self.host.platform, env);
                    tracing::info!("You can now run: \"{}\" to activate the Virtualenv.", command);
                    self.report.activate_command = Some(command);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Whether the package is importable by the target interpreter: the
    /// named virtualenv's if one was given, the configured one otherwise.
    pub async fn is_installed(&self) -> Result<bool> {
        let python = match self.options.virtualenv() {
            Some(env) => python::env_bin_path(self.host.platform, env).join("python"),
            None => self.options.python_path().to_path_buf(),
        };
        python::is_importable(&self.runner, &python, PACKAGE).await
    }

    async fn handle_upgrade(&self) -> Result<()> {
        if !self.is_installed().await? {
            return Ok(());
        }
        tracing::info!("Cloudify is already installed in the path.");
        if self.options.upgrade() {
            tracing::info!("Upgrading...");
            Ok(())
        } else {
            Err(Error::AlreadyInstalled(
                "Use the --upgrade flag to upgrade.".to_string(),
            ))
        }
    }

    async fn install_pip(&self) -> Result<()> {
        tracing::info!("Installing pip...");
        let python = self.options.python_path();
        if python::is_importable(&self.runner, python, "pip").await? {
            tracing::info!("pip is already installed in the path.");
            return Ok(());
        }

        // 临时目录在所有返回路径上都会被删除
        let tempdir = tempfile::tempdir()?;
        let get_pip = tempdir.path().join("get-pip.py");
        let url = &self.config.get_pip_url;
        self.fetcher.fetch(url, &get_pip).await.map_err(|e| {
            Error::DependencyDownload(format!("Failed pip download from {}. ({})", url, e))
        })?;

        let result = self
            .runner
            .run(&format!("{} {}", python.display(), get_pip.display()), false)
            .await?;
        if !result.success() {
            return Err(Error::DependencyInstallation(
                "Could not install pip".to_string(),
            ));
        }
        Ok(())
    }

    async fn install_virtualenv_tool(&self) -> Result<()> {
        if python::is_importable(&self.runner, self.options.python_path(), "virtualenv").await? {
            tracing::info!("virtualenv is already installed in the path.");
            return Ok(());
        }
        tracing::info!("Installing virtualenv...");
        let pip = PipInstall::new("virtualenv", self.host.platform)
            .extra_args(self.options.pip_args());
        python::install_package(&self.runner, &pip, self.host.in_virtualenv).await
    }

    /// Installs a compiler and the Python headers with the distribution's
    /// package manager.
    async fn install_pythondev(&self) -> Result<()> {
        tracing::info!("Installing python-dev...");
        let cmd = match (self.host.platform, self.host.family) {
            (Platform::Darwin, _) => {
                tracing::info!("python-dev package not required on Darwin.");
                return Ok(());
            }
            (_, DistroFamily::Debian) => "apt-get install -y gcc python3-dev",
            (_, DistroFamily::RedHat) => "yum -y install gcc python3-devel",
            // Arch 的 python 包自带头文件
            (_, DistroFamily::Arch) => "pacman -S gcc --noconfirm",
            _ => {
                return Err(Error::UnsupportedDistribution(
                    "python-dev package installation not supported in current distribution."
                        .to_string(),
                ))
            }
        };
        let result = self.runner.run(cmd, false).await?;
        if !result.success() {
            return Err(Error::DependencyInstallation(
                "Could not install python-dev.".to_string(),
            ));
        }
        Ok(())
    }

    /// PyCrypto ships as a Windows executable installer, which pip cannot
    /// handle, so it goes through easy_install.
    async fn install_pycrypto(&self) -> Result<()> {
        let bits = python::interpreter_bits(&self.runner, self.options.python_path()).await?;
        tracing::info!("Installing PyCrypto {}bit...", bits);
        let url = if bits == 32 {
            &self.config.pycrypto_32_url
        } else {
            &self.config.pycrypto_64_url
        };
        let easy_install = match self.options.virtualenv() {
            Some(env) => python::env_bin_path(self.host.platform, env)
                .join("easy_install")
                .display()
                .to_string(),
            None => "easy_install".to_string(),
        };
        let result = self
            .runner
            .run(&format!("{} {}", easy_install, url), false)
            .await?;
        if !result.success() {
            return Err(Error::DependencyInstallation(
                "Could not install PyCrypto.".to_string(),
            ));
        }
        Ok(())
    }

    async fn resolve_requirements(&mut self) -> Result<()> {
        let files = match (self.options.with_requirements(), self.options.source()) {
            (Some(Requirements::Default), Some(source)) => {
                let source = source.to_string();
                self.default_requirement_files(&source).await?
            }
            (Some(Requirements::Files(files)), _) => files.clone(),
            _ => Vec::new(),
        };
        self.requirement_files = files;
        Ok(())
    }

    /// Finds `dev-requirements.txt` / `requirements.txt` for `source`.
    ///
    /// A local directory is searched directly. Anything else is treated as an
    /// archive: a URL is downloaded first, and the downloaded file is removed
    /// again whether or not extraction succeeds.
    pub async fn default_requirement_files(&mut self, source: &str) -> Result<Vec<PathBuf>> {
        let local = Path::new(source);
        if local.is_dir() {
            return Ok(find_requirement_files(local));
        }

        let extract_dir = tempfile::Builder::new()
            .prefix("cli-requirements")
            .tempdir()?;
        if local.is_file() {
            extract_requirement_files(local, extract_dir.path()).await?;
        } else {
            let download_dir = tempfile::tempdir()?;
            let archive = download_dir.path().join("cli_source");
            self.fetcher.fetch(source, &archive).await.map_err(|e| {
                Error::DependencyDownload(format!("Could not download {} ({})", source, e))
            })?;
            let extracted = extract_requirement_files(&archive, extract_dir.path()).await;
            drop(download_dir);
            extracted?;
        }

        // GitHub 的源码包总是带一层顶级目录
        let root = archive::content_root(extract_dir.path())?;
        let files = find_requirement_files(&root);
        if files.is_empty() {
            tracing::warn!("No requirement files found in {}", source);
        }
        self.requirements_dir = Some(extract_dir);
        Ok(files)
    }

    async fn install(&self) -> Result<()> {
        let opts = &self.options;
        let module = opts.source().unwrap_or(PACKAGE);
        let online = PipInstall::new(module, self.host.platform)
            .version(opts.version())
            .pre(opts.pre())
            .virtualenv(opts.virtualenv())
            .requirement_files(&self.requirement_files)
            .upgrade(opts.upgrade())
            .extra_args(opts.pip_args());
        let in_venv = self.host.in_virtualenv;

        if !opts.force_online() && opts.wheels_path().is_dir() {
            tracing::info!(
                "Wheels directory found: \"{}\". Attempting offline installation...",
                opts.wheels_path().display()
            );
            // 本地 wheel 集合常缺少正式版元数据，离线安装总是允许预发布版本
            let offline = online.clone().version(None).pre(true).offline(opts.wheels_path());
            match python::install_package(&self.runner, &offline, in_venv).await {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!("Offline installation failed ({}).", e),
            }
        }
        python::install_package(&self.runner, &online, in_venv).await
    }
}

fn find_requirement_files(dir: &Path) -> Vec<PathBuf> {
    REQUIREMENT_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file())
        .collect()
}

async fn extract_requirement_files(archive: &Path, destination: &Path) -> Result<()> {
    let (src, dst) = (archive.to_path_buf(), destination.to_path_buf());
    let outcome = tokio::task::spawn_blocking(move || {
        archive::extract_matching(&src, &dst, &REQUIREMENT_FILE_NAMES)
    })
    .await
    .map_err(|e| Error::Execution(e.to_string()))?;
    outcome.map(|_| ()).map_err(|e| {
        Error::DependencyExtraction(format!("Could not extract {} ({})", archive.display(), e))
    })
}
