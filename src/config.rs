use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const GET_PIP_URL: &str = "https://bootstrap.pypa.io/get-pip.py";
pub const PYCRYPTO_64_URL: &str =
    "http://www.voidspace.org.uk/downloads/pycrypto26/pycrypto-2.6.win-amd64-py2.7.exe";
pub const PYCRYPTO_32_URL: &str =
    "http://www.voidspace.org.uk/downloads/pycrypto26/pycrypto-2.6.win32-py2.7.exe";
pub const REPO_URL_TEMPLATE: &str = "https://github.com/{user}/cloudify-cli/archive/{branch}.tar.gz";
pub const NODEJS_URL: &str = "http://nodejs.org/dist/v0.10.35/node-v0.10.35-linux-x64.tar.gz";
pub const COMPOSER_URL_TEMPLATE: &str =
    "https://s3.amazonaws.com/cloudify-ui/composer-builds/{version}/blueprintcomposer-{version}.tgz";
pub const DSL_PARSER_CLI_URL: &str =
    "https://github.com/cloudify-cosmo/cloudify-dsl-parser-cli/archive/master.zip";

#[derive(Debug, Clone)]
pub struct Config {
    /// 未显式指定 --python-path 时使用的解释器
    pub python_path: Option<PathBuf>,
    /// 未显式指定 --wheels-path 时使用的离线 wheel 目录
    pub wheels_path: Option<PathBuf>,
    pub get_pip_url: String,
    pub pycrypto_32_url: String,
    pub pycrypto_64_url: String,
    pub repo_url_template: String,
    pub nodejs_url: String,
    pub composer_url_template: String,
    pub dsl_parser_cli_url: String,
}

/// 配置文件磁盘格式：路径为字符串，便于 TOML 中使用 ~
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    python_path: Option<String>,
    wheels_path: Option<String>,
    get_pip_url: Option<String>,
    pycrypto_32_url: Option<String>,
    pycrypto_64_url: Option<String>,
    repo_url_template: Option<String>,
    nodejs_url: Option<String>,
    composer_url_template: Option<String>,
    dsl_parser_cli_url: Option<String>,
}

/// 将 "~" 或 "~/path" 展开为家目录路径
fn expand_tilde(path: &str) -> PathBuf {
    let path = path.trim();
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    }
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            python_path: None,
            wheels_path: None,
            get_pip_url: GET_PIP_URL.to_string(),
            pycrypto_32_url: PYCRYPTO_32_URL.to_string(),
            pycrypto_64_url: PYCRYPTO_64_URL.to_string(),
            repo_url_template: REPO_URL_TEMPLATE.to_string(),
            nodejs_url: NODEJS_URL.to_string(),
            composer_url_template: COMPOSER_URL_TEMPLATE.to_string(),
            dsl_parser_cli_url: DSL_PARSER_CLI_URL.to_string(),
        }
    }
}

impl Config {
    /// 默认配置文件路径：~/.config/get-cloudify/config.toml
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".config").join("get-cloudify").join("config.toml"))
    }

    /// 从指定路径或默认路径加载配置；文件不存在时返回默认配置
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let path = override_path
            .map(Path::to_path_buf)
            .or_else(Self::default_config_path);
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default()),
        };

        tracing::debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;

        let default = Self::default();
        Ok(Self {
            python_path: file.python_path.as_deref().map(expand_tilde),
            wheels_path: file.wheels_path.as_deref().map(expand_tilde),
            get_pip_url: file.get_pip_url.unwrap_or(default.get_pip_url),
            pycrypto_32_url: file.pycrypto_32_url.unwrap_or(default.pycrypto_32_url),
            pycrypto_64_url: file.pycrypto_64_url.unwrap_or(default.pycrypto_64_url),
            repo_url_template: file.repo_url_template.unwrap_or(default.repo_url_template),
            nodejs_url: file.nodejs_url.unwrap_or(default.nodejs_url),
            composer_url_template: file
                .composer_url_template
                .unwrap_or(default.composer_url_template),
            dsl_parser_cli_url: file.dsl_parser_cli_url.unwrap_or(default.dsl_parser_cli_url),
        })
    }

    /// `--use-branch` 的两种写法：`<branch>` 或 `<user>/<branch>`
    pub fn branch_url(&self, branch_spec: &str) -> Result<String> {
        let (user, branch) = match branch_spec.split('/').collect::<Vec<_>>().as_slice() {
            [branch] => ("cloudify-cosmo", *branch),
            [user, branch] => (*user, *branch),
            _ => {
                return Err(Error::Config(
                    "--use-branch should be specified either as <branch> or as \
                     <user>/<branch>. Too many \"/\" found in arguments."
                        .to_string(),
                ))
            }
        };
        Ok(self
            .repo_url_template
            .replace("{user}", user)
            .replace("{branch}", branch))
    }

    pub fn composer_url(&self, version: &str) -> String {
        self.composer_url_template.replace("{version}", version)
    }
}
