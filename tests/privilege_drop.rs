#![cfg(unix)]
//! Changing identity is process-wide and irreversible, so this lives in its
//! own test binary with a single test.

use get_cloudify::executor::{CommandRunner, ShellRunner};
use get_cloudify::host::{Host, Platform};
use get_cloudify::privilege::drop_root_privileges;
use std::os::unix::fs::{MetadataExt, PermissionsExt};

const NOBODY: u32 = 65534;

#[tokio::test]
async fn child_processes_run_as_the_sudo_user() {
    if !nix::unistd::geteuid().is_root() {
        eprintln!("skipping: needs to run as root");
        return;
    }

    let scratch = tempfile::tempdir().unwrap();
    std::fs::set_permissions(scratch.path(), std::fs::Permissions::from_mode(0o777)).unwrap();
    std::env::set_var("SUDO_UID", NOBODY.to_string());
    std::env::set_var("SUDO_GID", NOBODY.to_string());

    let host = Host {
        is_root: true,
        ..Host::new(Platform::Linux)
    };
    drop_root_privileges(&host).unwrap();

    assert_eq!(nix::unistd::getuid().as_raw(), NOBODY);
    assert_eq!(nix::unistd::geteuid().as_raw(), NOBODY);

    let runner = ShellRunner::new();
    let id = runner.run("id -u", false).await.unwrap();
    assert_eq!(id.stdout, format!("{}\n", NOBODY));

    let env = scratch.path().join("env");
    let mkdir = runner
        .run(&format!("mkdir '{}'", env.display()), false)
        .await
        .unwrap();
    assert!(mkdir.success(), "{}", mkdir.stderr);
    let metadata = std::fs::metadata(&env).unwrap();
    assert_eq!(metadata.uid(), NOBODY);
    assert_eq!(metadata.gid(), NOBODY);
}
