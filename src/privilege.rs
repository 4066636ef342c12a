//! Dropping root back to the invoking user.
//!
//! Running the installer through sudo and then creating a virtualenv would
//! leave the environment owned by root. The saved sudo identity replaces the
//! real, effective and saved uid/gid before anything is written into the
//! environment, so child shells cannot fall back to root.

use crate::error::Result;
use crate::host::Host;

/// The identity sudo recorded for the user who invoked it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElevationContext {
    pub uid: u32,
    pub gid: u32,
}

impl ElevationContext {
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("SUDO_UID").ok().as_deref(),
            std::env::var("SUDO_GID").ok().as_deref(),
        )
    }

    /// 缺失或无法解析的值回落到 0
    pub fn from_vars(uid: Option<&str>, gid: Option<&str>) -> Self {
        let parse = |v: Option<&str>| v.and_then(|s| s.trim().parse().ok()).unwrap_or(0);
        Self {
            uid: parse(uid),
            gid: parse(gid),
        }
    }
}

/// Drops to the sudo-invoking user when `host` says we are root; a no-op
/// otherwise.
pub fn drop_root_privileges(host: &Host) -> Result<()> {
    if !host.is_root {
        return Ok(());
    }
    tracing::info!("Dropping root permissions...");
    set_identity(ElevationContext::from_env())
}

#[cfg(unix)]
fn set_identity(ctx: ElevationContext) -> Result<()> {
    use crate::error::Error;
    use nix::unistd::{setgid, setuid, Gid, Uid};

    // 以 root 调用时 setuid/setgid 同时改写 real/effective/saved id，不可逆
    // 必须先改 gid，改完 uid 后就没有权限再改 gid 了
    setgid(Gid::from_raw(ctx.gid))
        .map_err(|e| Error::Privilege(format!("setgid({}) failed: {}", ctx.gid, e)))?;
    setuid(Uid::from_raw(ctx.uid))
        .map_err(|e| Error::Privilege(format!("setuid({}) failed: {}", ctx.uid, e)))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_identity(_ctx: ElevationContext) -> Result<()> {
    Ok(())
}
