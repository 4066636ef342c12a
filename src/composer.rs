//! Cloudify Blueprint Composer：安装 Node.js、Composer 前端包以及 DSL 解析器 CLI，
//! 或将三者全部删除。

use crate::archive;
use crate::config::Config;
use crate::download::{Downloader, Fetch};
use crate::error::{Error, Result};
use crate::executor::{CommandRunner, ShellRunner};
use crate::host::Host;
use crate::privilege;
use crate::python::{self, PipInstall};
use std::path::{Path, PathBuf};

/// Where the composer pieces live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerLayout {
    pub nodejs_home: PathBuf,
    pub composer_home: PathBuf,
    pub dsl_virtualenv: PathBuf,
}

impl Default for ComposerLayout {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            nodejs_home: PathBuf::from("/opt/nodejs"),
            composer_home: PathBuf::from("/var/www/blueprint-composer"),
            dsl_virtualenv: home.join("dsl-cli-ve2"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerAction {
    Install { version: String },
    Uninstall,
}

pub struct ComposerInstaller<R = ShellRunner, F = Downloader> {
    action: ComposerAction,
    host: Host,
    config: Config,
    layout: ComposerLayout,
    python_path: PathBuf,
    runner: R,
    fetcher: F,
}

impl ComposerInstaller {
    pub fn new(action: ComposerAction, host: Host, config: Config) -> Self {
        Self::with_components(
            action,
            host,
            config,
            ComposerLayout::default(),
            ShellRunner::new(),
            Downloader::new(),
        )
    }
}

impl<R: CommandRunner, F: Fetch> ComposerInstaller<R, F> {
    pub fn with_components(
        action: ComposerAction,
        host: Host,
        config: Config,
        layout: ComposerLayout,
        runner: R,
        fetcher: F,
    ) -> Self {
        let python_path = config
            .python_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(host.default_python()));
        Self {
            action,
            host,
            config,
            layout,
            python_path,
            runner,
            fetcher,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub async fn execute(&self) -> Result<()> {
        let version = match &self.action {
            ComposerAction::Uninstall => {
                tracing::info!("Uninstalling Cloudify Blueprint Composer.");
                return self.remove_all().await;
            }
            ComposerAction::Install { version } => version,
        };

        if self.host.platform.is_windows() {
            return Err(Error::UnsupportedPlatform(
                "This installer does not currently support installing the composer on Windows."
                    .to_string(),
            ));
        }

        self.install_nodejs().await?;
        self.install_composer(version).await?;
        self.install_dsl_parser().await?;
        tracing::info!(
            "You can now run: sudo {} {} to run Cloudify Blueprint Composer.",
            self.layout.nodejs_home.join("bin").join("node").display(),
            self.layout
                .composer_home
                .join("package")
                .join("server.js")
                .display()
        );
        Ok(())
    }

    /// 下载 Node.js 二进制包，把其顶级目录的内容移入 nodejs_home
    async fn install_nodejs(&self) -> Result<()> {
        let workdir = tempfile::tempdir()?;
        let tarball = workdir.path().join("nodejs.tar.gz");
        let unpacked = workdir.path().join("unpacked");
        tokio::fs::create_dir_all(&self.layout.nodejs_home).await?;

        self.download(&self.config.nodejs_url, &tarball).await?;
        extract(&tarball, &unpacked).await?;
        let source = archive::content_root(&unpacked)?;

        let result = self
            .runner
            .run(
                &format!(
                    "mv {}/* {}",
                    source.display(),
                    self.layout.nodejs_home.display()
                ),
                false,
            )
            .await?;
        if !result.success() {
            return Err(Error::DependencyInstallation(format!(
                "Could not move Node.js into {}",
                self.layout.nodejs_home.display()
            )));
        }
        Ok(())
    }

    async fn install_composer(&self, version: &str) -> Result<()> {
        let workdir = tempfile::tempdir()?;
        let tarball = workdir.path().join("composer.tgz");
        tokio::fs::create_dir_all(&self.layout.composer_home).await?;

        self.download(&self.config.composer_url(version), &tarball)
            .await?;
        extract(&tarball, &self.layout.composer_home).await
    }

    async fn install_dsl_parser(&self) -> Result<()> {
        privilege::drop_root_privileges(&self.host)?;
        let env = &self.layout.dsl_virtualenv;
        python::make_virtualenv(&self.runner, env, &self.python_path).await?;
        let pip = PipInstall::new(self.config.dsl_parser_cli_url.as_str(), self.host.platform)
            .virtualenv(Some(env));
        python::install_package(&self.runner, &pip, false).await
    }

    async fn remove_all(&self) -> Result<()> {
        let targets = [
            ("Nodejs", &self.layout.nodejs_home),
            ("DSL Parser", &self.layout.dsl_virtualenv),
            ("Composer", &self.layout.composer_home),
        ];
        for (name, dir) in targets {
            tracing::info!("Removing {}...", name);
            if tokio::fs::try_exists(dir).await? {
                tokio::fs::remove_dir_all(dir).await?;
            } else {
                tracing::debug!("{} does not exist, skipping", dir.display());
            }
        }
        Ok(())
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<()> {
        self.fetcher.fetch(url, destination).await.map_err(|e| {
            Error::DependencyDownload(format!("Could not download {} ({})", url, e))
        })
    }
}

async fn extract(archive: &Path, destination: &Path) -> Result<()> {
    let (src, dst) = (archive.to_path_buf(), destination.to_path_buf());
    tokio::task::spawn_blocking(move || archive::extract_all(&src, &dst))
        .await
        .map_err(|e| Error::Execution(e.to_string()))?
        .map_err(|e| {
            Error::DependencyExtraction(format!("Could not extract {} ({})", archive.display(), e))
        })
}
