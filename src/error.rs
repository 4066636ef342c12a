use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    UnsupportedPlatform(String),

    #[error("{0}")]
    VirtualenvCreation(String),

    #[error("{0}")]
    DependencyDownload(String),

    #[error("{0}")]
    DependencyExtraction(String),

    #[error("{0}")]
    DependencyInstallation(String),

    #[error("{0}")]
    UnsupportedDistribution(String),

    #[error("{0}")]
    AlreadyInstalled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Privilege error: {0}")]
    Privilege(String),
}

impl Error {
    /// 进程退出码，脚本调用方据此区分失败原因
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::UnsupportedPlatform(_) => 200,
            Error::VirtualenvCreation(_) => 210,
            Error::DependencyDownload(_) => 220,
            Error::DependencyExtraction(_) => 221,
            Error::DependencyInstallation(_) => 222,
            Error::UnsupportedDistribution(_) => 223,
            Error::AlreadyInstalled(_) => 230,
            Error::Config(_) => 2,
            Error::Io(_) | Error::Network(_) | Error::Execution(_) | Error::Privilege(_) => 1,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Error::UnsupportedPlatform(_) => "unsupported_platform",
            Error::VirtualenvCreation(_) => "virtualenv_creation_failure",
            Error::DependencyDownload(_) => "dependency_download_failure",
            Error::DependencyExtraction(_) => "dependency_extraction_failure",
            Error::DependencyInstallation(_) => "dependency_installation_failure",
            Error::UnsupportedDistribution(_) => "dependency_unsupported_on_distribution",
            Error::AlreadyInstalled(_) => "cloudify_already_installed",
            Error::Config(_) => "invalid_configuration",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Execution(_) => "execution_error",
            Error::Privilege(_) => "privilege_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
