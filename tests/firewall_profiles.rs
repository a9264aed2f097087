#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Integration tests for firewall bring-up and application profiles.

mod common;

use common::{FakeExecutor, FakeHost};
use hardn::cli::Selection;
use hardn::commands::run::execute_plan;
use hardn::config::AppProfile;
use hardn::exec::ExecResult;
use hardn::logging::TaskStatus;
use hardn::tasks::{self, Action};

fn firewall_only() -> Selection {
    Selection::Only([Action::ConfigureUfw].into())
}

fn lab_https() -> AppProfile {
    AppProfile {
        name: "LabHTTPS".into(),
        title: "Lab HTTPS".into(),
        description: "tls".into(),
        ports: vec!["30443/tcp".into()],
    }
}

#[test]
fn profile_is_rendered_and_allowed_by_name() {
    let host = FakeHost::debian().configure(|c| c.ufw_app_profiles = vec![lab_https()]);

    execute_plan(&tasks::all_tasks(), &firewall_only(), &host.context()).unwrap();

    insta::assert_snapshot!(host.read("/etc/ufw/applications.d/hardn"), @r"
    [LabHTTPS]
    title=Lab HTTPS
    description=tls
    ports=30443/tcp
    ");
    let calls = host.exec.calls();
    let allow_profile = calls.iter().position(|c| c == "ufw allow LabHTTPS").unwrap();
    let enable = calls.iter().position(|c| c == "ufw --force enable").unwrap();
    assert!(allow_profile < enable);
    assert_eq!(host.log.status_of("Configure firewall"), Some(TaskStatus::Ok));
}

#[test]
fn bring_up_sets_defaults_before_the_ssh_rule() {
    let host = FakeHost::debian().configure(|c| {
        c.ssh_port = 2208;
        c.ufw_allowed_ports = [2208, 8443].into();
    });

    execute_plan(&tasks::all_tasks(), &firewall_only(), &host.context()).unwrap();

    let ufw: Vec<String> = host
        .exec
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("ufw "))
        .collect();
    assert_eq!(
        ufw,
        vec![
            "ufw default deny incoming",
            "ufw default allow outgoing",
            "ufw allow 2208/tcp comment SSH",
            "ufw allow 8443/tcp",
            "ufw --force enable",
        ]
    );
    assert!(host.exec.called("apt-get install -y ufw"));
    assert!(!host.exists("/etc/ufw/applications.d/hardn"));
}

#[test]
fn failing_profile_fails_the_action() {
    let host = FakeHost::debian()
        .configure(|c| c.ufw_app_profiles = vec![lab_https()])
        .executor(FakeExecutor::new().respond(
            "ufw allow LabHTTPS",
            ExecResult::failed(1, "ERROR: Could not find a profile matching 'LabHTTPS'"),
        ));

    execute_plan(&tasks::all_tasks(), &firewall_only(), &host.context()).unwrap();

    assert_eq!(host.log.status_of("Configure firewall"), Some(TaskStatus::Failed));
    assert!(!host.exec.called("ufw --force enable"));
}

#[test]
fn alpine_enables_the_ufw_service() {
    let host = FakeHost::alpine();
    execute_plan(&tasks::all_tasks(), &firewall_only(), &host.context()).unwrap();
    assert!(host.exec.called("rc-update add ufw"));
    assert!(host.exec.called("rc-service ufw start"));
}
