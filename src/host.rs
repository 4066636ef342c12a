//! Host descriptor: the platform facts the installer branches on.
//!
//! Detected once at startup and handed to the installers by value, so every
//! platform-specific branch can be exercised by constructing a different
//! descriptor.

use crate::error::{Error, Result};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Darwin,
    Windows,
}

impl Platform {
    pub fn current() -> Result<Self> {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Result<Self> {
        match os {
            "linux" => Ok(Platform::Linux),
            "macos" => Ok(Platform::Darwin),
            "windows" => Ok(Platform::Windows),
            other => Err(Error::UnsupportedPlatform(format!(
                "Platform {} not supported.",
                other
            ))),
        }
    }

    pub fn is_windows(self) -> bool {
        self == Platform::Windows
    }
}

/// 只区分安装编译工具链时需要的包管理器家族
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistroFamily {
    Debian,
    RedHat,
    Arch,
    Unknown,
}

impl DistroFamily {
    pub fn classify(distro: &str, arch_release_present: bool) -> Self {
        Self::from_os_release(
            &OsRelease {
                id: distro.to_string(),
                ..OsRelease::default()
            },
            arch_release_present,
        )
    }

    /// `ID` first, then each `ID_LIKE` entry in order, so derivatives such as
    /// linuxmint or rocky land in their parent's family.
    pub fn from_os_release(release: &OsRelease, arch_release_present: bool) -> Self {
        std::iter::once(release.id.as_str())
            .chain(release.id_like.iter().map(String::as_str))
            .find_map(Self::from_id)
            .unwrap_or(if arch_release_present {
                DistroFamily::Arch
            } else {
                DistroFamily::Unknown
            })
    }

    fn from_id(id: &str) -> Option<Self> {
        match id {
            "ubuntu" | "debian" => Some(DistroFamily::Debian),
            "centos" | "redhat" | "rhel" | "fedora" => Some(DistroFamily::RedHat),
            "arch" | "archlinux" => Some(DistroFamily::Arch),
            _ => None,
        }
    }
}

/// 从 /etc/os-release 中取出的发行版标识，均为小写
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub id: String,
    pub id_like: Vec<String>,
    pub version_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub platform: Platform,
    pub distro: String,
    pub release: String,
    pub family: DistroFamily,
    /// 以有效 uid 0 运行
    pub is_root: bool,
    /// 当前进程运行在某个已激活的 virtualenv 中
    pub in_virtualenv: bool,
}

impl Host {
    pub fn detect() -> Result<Self> {
        let platform = Platform::current()?;

        let os_release = if platform == Platform::Linux {
            let content = std::fs::read_to_string("/etc/os-release").unwrap_or_default();
            parse_os_release(&content)
        } else {
            OsRelease::default()
        };
        let family = DistroFamily::from_os_release(
            &os_release,
            Path::new("/etc/arch-release").is_file(),
        );

        Ok(Self {
            platform,
            distro: os_release.id,
            release: os_release.version_id,
            family,
            is_root: effective_root(),
            in_virtualenv: std::env::var_os("VIRTUAL_ENV").is_some(),
        })
    }

    /// A plain, unprivileged host outside any virtualenv.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            distro: String::new(),
            release: String::new(),
            family: DistroFamily::Unknown,
            is_root: false,
            in_virtualenv: false,
        }
    }

    pub fn with_distro(mut self, distro: &str) -> Self {
        self.distro = distro.to_lowercase();
        self.family = DistroFamily::classify(&self.distro, false);
        self
    }

    /// Takes distribution, release and family from os-release content.
    pub fn with_os_release(mut self, content: &str) -> Self {
        let os_release = parse_os_release(content);
        self.family = DistroFamily::from_os_release(&os_release, false);
        self.distro = os_release.id;
        self.release = os_release.version_id;
        self
    }

    pub fn default_python(&self) -> &'static str {
        if self.platform.is_windows() {
            "python.exe"
        } else {
            "python"
        }
    }
}

pub fn parse_os_release(content: &str) -> OsRelease {
    let mut release = OsRelease::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'').to_lowercase();
        match key.trim() {
            "ID" => release.id = value,
            "ID_LIKE" => release.id_like = value.split_whitespace().map(str::to_string).collect(),
            "VERSION_ID" => release.version_id = value,
            _ => {}
        }
    }
    release
}

#[cfg(unix)]
fn effective_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn effective_root() -> bool {
    false
}
