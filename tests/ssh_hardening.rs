#![allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
//! Integration tests for sshd configuration and root revocation.

mod common;

use common::{FakeExecutor, FakeHost};
use hardn::cli::Selection;
use hardn::commands::run::execute_plan;
use hardn::exec::ExecResult;
use hardn::logging::TaskStatus;
use hardn::tasks::{self, Action};

fn only(actions: &[Action]) -> Selection {
    Selection::Only(actions.iter().copied().collect())
}

#[test]
fn alpine_rewrites_main_config_and_revokes_root() {
    let host = FakeHost::alpine().configure(|c| {
        c.disable_root = true;
        c.ssh_port = 2208;
    });
    host.write("/etc/ssh/sshd_config", "Port 22\nPermitRootLogin yes\n");

    execute_plan(
        &tasks::all_tasks(),
        &only(&[Action::ConfigureSsh, Action::DisableRoot]),
        &host.context(),
    )
    .unwrap();

    let config = host.read("/etc/ssh/sshd_config");
    assert!(config.contains("Port 2208\n"));
    assert!(config.contains("PermitRootLogin no\n"));
    assert!(!config.contains("PermitRootLogin yes"));
    assert!(config.contains("Subsystem sftp /usr/lib/ssh/sftp-server"));
    assert!(host.exec.called("rc-service sshd restart"));
    assert!(!host.exec.called("systemctl"));

    let backups = host.backups();
    assert_eq!(backups.len(), 1);
    let saved = std::fs::read_to_string(host.root.path().join(&backups[0])).unwrap();
    assert_eq!(saved, "Port 22\nPermitRootLogin yes\n");
    assert_eq!(
        host.log.status_of("Revoke root SSH login"),
        Some(TaskStatus::Skipped)
    );
}

#[test]
fn debian_writes_drop_in_and_socket_override() {
    let host = FakeHost::debian().configure(|c| {
        c.ssh_port = 2208;
        c.permit_root_login = false;
        c.ssh_allowed_users = vec!["sysadmin".into(), "ops".into()];
    });

    execute_plan(
        &tasks::all_tasks(),
        &only(&[Action::ConfigureSsh]),
        &host.context(),
    )
    .unwrap();

    let drop_in = host.read("/etc/ssh/sshd_config.d/hardn.conf");
    assert!(drop_in.contains("AllowUsers sysadmin ops\n"));
    assert!(drop_in.contains("PermitRootLogin no\n"));
    assert!(drop_in.contains("ListenAddress 0.0.0.0:2208\n"));
    assert!(
        host.read("/etc/systemd/system/ssh.socket.d/listen.conf")
            .contains("ListenStream=2208")
    );
    assert!(host.exec.called("systemctl daemon-reload"));
    assert!(host.exec.called("systemctl restart ssh"));
    assert_eq!(host.log.status_of("Configure SSH"), Some(TaskStatus::Ok));
}

#[test]
fn socket_unit_left_alone_when_disabled() {
    let host = FakeHost::debian().executor(
        FakeExecutor::new().respond("systemctl is-enabled ssh.socket", ExecResult::failed(1, "")),
    );

    execute_plan(
        &tasks::all_tasks(),
        &only(&[Action::ConfigureSsh]),
        &host.context(),
    )
    .unwrap();

    assert!(host.exec.called("systemctl restart ssh"));
    assert!(!host.exec.called("systemctl restart ssh.socket"));
}

#[test]
fn revoking_twice_changes_nothing_the_second_time() {
    let host = FakeHost::debian();
    host.write(
        "/etc/ssh/sshd_config.d/hardn.conf",
        "PermitRootLogin yes\nAllowUsers root admin\nAllowUsers root\n",
    );
    let selection = only(&[Action::DisableRoot]);

    execute_plan(&tasks::all_tasks(), &selection, &host.context()).unwrap();
    let revoked = host.read("/etc/ssh/sshd_config.d/hardn.conf");
    assert_eq!(revoked, "PermitRootLogin no\nAllowUsers admin\n");
    let restarts = host
        .exec
        .calls()
        .iter()
        .filter(|c| *c == "systemctl restart ssh")
        .count();
    assert_eq!(restarts, 1);

    execute_plan(&tasks::all_tasks(), &selection, &host.context()).unwrap();
    assert_eq!(host.read("/etc/ssh/sshd_config.d/hardn.conf"), revoked);
    assert_eq!(host.backups().len(), 1);
    let restarts_after = host
        .exec
        .calls()
        .iter()
        .filter(|c| *c == "systemctl restart ssh")
        .count();
    assert_eq!(restarts_after, 1);
}

#[test]
fn revoking_without_config_fails_the_action() {
    let host = FakeHost::debian();
    let result = execute_plan(
        &tasks::all_tasks(),
        &only(&[Action::DisableRoot]),
        &host.context(),
    );
    assert!(result.is_ok());
    assert_eq!(
        host.log.status_of("Revoke root SSH login"),
        Some(TaskStatus::Failed)
    );
}
