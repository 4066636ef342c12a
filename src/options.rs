use crate::error::{Error, Result};
use crate::host::{Host, Platform};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

pub const DEFAULT_WHEELS_PATH: &str = "wheelhouse";

/// Which requirement files to pass to pip alongside the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirements {
    /// 从 source 中寻找默认的 requirements 文件
    Default,
    Files(Vec<PathBuf>),
}

/// Resolved, validated options for one CLI installation.
///
/// Only [`InstallOptionsBuilder::build`] produces one, so every value has
/// passed validation; the record is read-only afterwards.
///
/// ```compile_fail
/// use get_cloudify::options::InstallOptions;
///
/// let options = InstallOptions::builder()
///     .build(&get_cloudify::host::Host::new(get_cloudify::host::Platform::Linux))
///     .unwrap();
/// let _conflicting = InstallOptions {
///     version: Some("3.2".to_string()),
///     source: Some("https://example.com/cli.tar.gz".to_string()),
///     ..options
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    force: bool,
    upgrade: bool,
    virtualenv: Option<PathBuf>,
    version: Option<String>,
    pre: bool,
    source: Option<String>,
    with_requirements: Option<Requirements>,
    force_online: bool,
    wheels_path: PathBuf,
    python_path: PathBuf,
    pip_args: Option<String>,
    install_pip: bool,
    install_virtualenv: bool,
    install_pythondev: bool,
    install_pycrypto: bool,
}

impl InstallOptions {
    pub fn builder() -> InstallOptionsBuilder {
        InstallOptionsBuilder::default()
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn upgrade(&self) -> bool {
        self.upgrade
    }

    /// Absolute path of the target virtualenv.
    pub fn virtualenv(&self) -> Option<&Path> {
        self.virtualenv.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn pre(&self) -> bool {
        self.pre
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn with_requirements(&self) -> Option<&Requirements> {
        self.with_requirements.as_ref()
    }

    pub fn force_online(&self) -> bool {
        self.force_online
    }

    pub fn wheels_path(&self) -> &Path {
        &self.wheels_path
    }

    pub fn python_path(&self) -> &Path {
        &self.python_path
    }

    pub fn pip_args(&self) -> Option<&str> {
        self.pip_args.as_deref()
    }

    pub fn install_pip(&self) -> bool {
        self.install_pip
    }

    pub fn install_virtualenv(&self) -> bool {
        self.install_virtualenv
    }

    pub fn install_pythondev(&self) -> bool {
        self.install_pythondev
    }

    pub fn install_pycrypto(&self) -> bool {
        self.install_pycrypto
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptionsBuilder {
    force: bool,
    upgrade: bool,
    virtualenv: Option<PathBuf>,
    version: Option<String>,
    pre: bool,
    source: Option<String>,
    with_requirements: Option<Vec<PathBuf>>,
    force_online: bool,
    wheels_path: Option<PathBuf>,
    python_path: Option<PathBuf>,
    pip_args: Option<String>,
    install_pip: bool,
    install_virtualenv: bool,
    install_pythondev: bool,
    install_pycrypto: bool,
}

impl InstallOptionsBuilder {
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn upgrade(mut self, upgrade: bool) -> Self {
        self.upgrade = upgrade;
        self
    }

    pub fn virtualenv(mut self, env: impl Into<PathBuf>) -> Self {
        self.virtualenv = Some(env.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn pre(mut self, pre: bool) -> Self {
        self.pre = pre;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// An empty list asks for the default requirement files of the source.
    pub fn with_requirements(mut self, files: Vec<PathBuf>) -> Self {
        self.with_requirements = Some(files);
        self
    }

    pub fn force_online(mut self, force_online: bool) -> Self {
        self.force_online = force_online;
        self
    }

    pub fn wheels_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.wheels_path = Some(path.into());
        self
    }

    pub fn python_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.python_path = Some(path.into());
        self
    }

    pub fn pip_args(mut self, args: impl Into<String>) -> Self {
        self.pip_args = Some(args.into());
        self
    }

    pub fn install_pip(mut self, yes: bool) -> Self {
        self.install_pip = yes;
        self
    }

    pub fn install_virtualenv(mut self, yes: bool) -> Self {
        self.install_virtualenv = yes;
        self
    }

    pub fn install_pythondev(mut self, yes: bool) -> Self {
        self.install_pythondev = yes;
        self
    }

    pub fn install_pycrypto(mut self, yes: bool) -> Self {
        self.install_pycrypto = yes;
        self
    }

    pub fn build(self, host: &Host) -> Result<InstallOptions> {
        let selectors = [
            self.version.is_some(),
            self.pre,
            self.source.is_some(),
        ];
        if selectors.iter().filter(|set| **set).count() > 1 {
            return Err(Error::Config(
                "--version, --pre and --source are mutually exclusive.".to_string(),
            ));
        }

        let with_requirements = match (self.with_requirements, &self.source) {
            (Some(_), None) => {
                return Err(Error::Config(
                    "--source or --use-branch is required when calling with \
                     --with-requirements."
                        .to_string(),
                ))
            }
            (None, Some(_)) => {
                tracing::warn!(
                    "A source URL or branch was specified, but --with-requirements \
                     was omitted. You may need to retry using --with-requirements \
                     if the installation fails."
                );
                None
            }
            (Some(files), Some(_)) if files.is_empty() => Some(Requirements::Default),
            (Some(files), Some(_)) => Some(Requirements::Files(files)),
            (None, None) => None,
        };

        // 与当前平台无关的开关只警告，不报错
        if self.install_pycrypto && host.platform != Platform::Windows {
            tracing::warn!("Pycrypto only relevant on Windows.");
        }
        if self.install_pythondev && host.platform == Platform::Windows {
            tracing::warn!("Pythondev only relevant on Linux or OSx.");
        }

        let virtualenv = self
            .virtualenv
            .as_deref()
            .map(absolute)
            .transpose()?;

        Ok(InstallOptions {
            force: self.force,
            upgrade: self.upgrade,
            virtualenv,
            version: self.version,
            pre: self.pre,
            source: self.source,
            with_requirements,
            force_online: self.force_online,
            wheels_path: self
                .wheels_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WHEELS_PATH)),
            python_path: self
                .python_path
                .unwrap_or_else(|| PathBuf::from(host.default_python())),
            pip_args: self.pip_args,
            install_pip: self.install_pip,
            install_virtualenv: self.install_virtualenv,
            install_pythondev: self.install_pythondev,
            install_pycrypto: self.install_pycrypto,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path.absolutize()?.into_owned())
}
