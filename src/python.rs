//! pip / virtualenv command construction shared by both installers.

use crate::error::{Error, Result};
use crate::executor::CommandRunner;
use crate::host::Platform;
use std::path::{Path, PathBuf};

/// 虚拟环境中可执行文件所在目录
pub fn env_bin_path(platform: Platform, env: &Path) -> PathBuf {
    env.join(if platform.is_windows() { "Scripts" } else { "bin" })
}

/// The file whose presence means the environment was already created.
pub fn activation_marker(platform: Platform, env: &Path) -> PathBuf {
    env_bin_path(platform, env).join(if platform.is_windows() {
        "activate.bat"
    } else {
        "activate"
    })
}

pub fn activate_command(platform: Platform, env: &Path) -> String {
    let activate = env_bin_path(platform, env).join("activate");
    if platform.is_windows() {
        format!("{}.bat", activate.display())
    } else {
        format!("source {}", activate.display())
    }
}

/// Builder for one `pip install` command line.
#[derive(Debug, Clone)]
pub struct PipInstall {
    package: String,
    version: Option<String>,
    pre: bool,
    virtualenv: Option<PathBuf>,
    wheels_path: Option<PathBuf>,
    requirement_files: Vec<PathBuf>,
    upgrade: bool,
    extra_args: Option<String>,
    platform: Platform,
}

impl PipInstall {
    pub fn new(package: impl Into<String>, platform: Platform) -> Self {
        Self {
            package: package.into(),
            version: None,
            pre: false,
            virtualenv: None,
            wheels_path: None,
            requirement_files: Vec::new(),
            upgrade: false,
            extra_args: None,
            platform,
        }
    }

    pub fn version(mut self, version: Option<&str>) -> Self {
        self.version = version.map(str::to_string);
        self
    }

    pub fn pre(mut self, pre: bool) -> Self {
        self.pre = pre;
        self
    }

    pub fn virtualenv(mut self, env: Option<&Path>) -> Self {
        self.virtualenv = env.map(Path::to_path_buf);
        self
    }

    /// 只从本地 wheel 目录安装，不访问索引
    pub fn offline(mut self, wheels_path: &Path) -> Self {
        self.wheels_path = Some(wheels_path.to_path_buf());
        self
    }

    pub fn requirement_files(mut self, files: &[PathBuf]) -> Self {
        self.requirement_files = files.to_vec();
        self
    }

    pub fn upgrade(mut self, upgrade: bool) -> Self {
        self.upgrade = upgrade;
        self
    }

    pub fn extra_args(mut self, args: Option<&str>) -> Self {
        self.extra_args = args.map(str::to_string);
        self
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// The target as pip sees it, `name==version` when pinned.
    pub fn requirement(&self) -> String {
        match &self.version {
            Some(v) => format!("{}=={}", self.package, v),
            None => self.package.clone(),
        }
    }

    pub fn command(&self) -> String {
        let pip = match &self.virtualenv {
            Some(env) => env_bin_path(self.platform, env)
                .join("pip")
                .display()
                .to_string(),
            None => "pip".to_string(),
        };
        let mut cmd = vec![pip, "install".to_string()];
        for file in &self.requirement_files {
            cmd.push("-r".to_string());
            cmd.push(file.display().to_string());
        }
        cmd.push(self.requirement());
        if let Some(wheels) = &self.wheels_path {
            cmd.push("--no-index".to_string());
            cmd.push("--find-links".to_string());
            cmd.push(wheels.display().to_string());
        }
        if self.pre {
            cmd.push("--pre".to_string());
        }
        if self.upgrade {
            cmd.push("--upgrade".to_string());
        }
        if let Some(extra) = self.extra_args.as_deref().filter(|a| !a.trim().is_empty()) {
            cmd.push(extra.trim().to_string());
        }
        cmd.join(" ")
    }
}

/// Runs `pip install`; a non-zero status is a dependency installation failure.
pub async fn install_package<R: CommandRunner>(
    runner: &R,
    pip: &PipInstall,
    in_ambient_virtualenv: bool,
) -> Result<()> {
    tracing::info!("Installing {}...", pip.requirement());
    if in_ambient_virtualenv && pip.virtualenv.is_none() {
        tracing::info!("Installing within current virtualenv.");
    }
    let result = runner.run(&pip.command(), false).await?;
    if !result.success() {
        tracing::error!("{}", result.stdout);
        return Err(Error::DependencyInstallation(format!(
            "Could not install package: {}.",
            pip.requirement()
        )));
    }
    Ok(())
}

pub async fn make_virtualenv<R: CommandRunner>(
    runner: &R,
    env: &Path,
    python_path: &Path,
) -> Result<()> {
    tracing::info!("Creating Virtualenv {}...", env.display());
    let result = runner
        .run(
            &format!("virtualenv -p {} {}", python_path.display(), env.display()),
            false,
        )
        .await?;
    if !result.success() {
        return Err(Error::VirtualenvCreation(format!(
            "Could not create virtualenv: {}",
            env.display()
        )));
    }
    Ok(())
}

/// 用指定解释器尝试 import，失败的 stderr 不记录为错误
pub async fn is_importable<R: CommandRunner>(
    runner: &R,
    python_path: &Path,
    module: &str,
) -> Result<bool> {
    let result = runner
        .run(
            &format!("{} -c \"import {}\"", python_path.display(), module),
            true,
        )
        .await?;
    Ok(result.success())
}

/// Pointer width of the interpreter in bits, 64 if it cannot be determined.
pub async fn interpreter_bits<R: CommandRunner>(runner: &R, python_path: &Path) -> Result<u32> {
    let result = runner
        .run(
            &format!(
                "{} -c \"import struct; print(struct.calcsize('P') * 8)\"",
                python_path.display()
            ),
            true,
        )
        .await?;
    Ok(result
        .stdout
        .trim()
        .parse()
        .ok()
        .filter(|_| result.success())
        .unwrap_or(64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_install() {
        let pip = PipInstall::new("test-package", Platform::Linux);
        assert_eq!(pip.command(), "pip install test-package");
    }

    #[test]
    fn install_into_virtualenv_uses_its_pip() {
        let pip = PipInstall::new("test-package", Platform::Linux)
            .virtualenv(Some(Path::new("/my/venv")));
        assert_eq!(pip.command(), "/my/venv/bin/pip install test-package");
    }

    #[test]
    fn full_command_shape() {
        let pip = PipInstall::new("cloudify", Platform::Linux)
            .version(Some("3.2"))
            .requirement_files(&[PathBuf::from("a.txt"), PathBuf::from("b.txt")])
            .upgrade(true)
            .extra_args(Some("--no-cache-dir"));
        assert_eq!(
            pip.command(),
            "pip install -r a.txt -r b.txt cloudify==3.2 --upgrade --no-cache-dir"
        );
    }

    #[test]
    fn offline_command_shape() {
        let pip = PipInstall::new("cloudify", Platform::Linux)
            .offline(Path::new("wheelhouse"))
            .pre(true);
        assert_eq!(
            pip.command(),
            "pip install cloudify --no-index --find-links wheelhouse --pre"
        );
    }

    #[test]
    fn activation_per_platform() {
        let env = Path::new("venv");
        assert_eq!(activate_command(Platform::Linux, env), "source venv/bin/activate");
        assert!(activate_command(Platform::Windows, env).ends_with("activate.bat"));
        assert!(activation_marker(Platform::Windows, env).ends_with("activate.bat"));
        assert_eq!(
            activation_marker(Platform::Darwin, env),
            PathBuf::from("venv/bin/activate")
        );
    }
}
