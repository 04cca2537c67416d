mod support;

use std::collections::HashMap;

use anyhow::Result;
use credbroker::checkout::IamClient;
use credbroker::kubeconfig::{build_entries, KubeConfig, KubeConfigMerger, TenantScope};
use credbroker::Error;
use support::{kube_profile, FakeIamClient};
use tempfile::TempDir;

fn scope(tenant: &str) -> TenantScope {
    TenantScope {
        tenant: tenant.to_string(),
        username: "alice".to_string(),
        exec_command: "credbroker".to_string(),
    }
}

fn names(entries: &[credbroker::kubeconfig::NamedEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

const HAND_WRITTEN: &str = r#"apiVersion: v1
kind: Config
current-context: minikube
preferences: {}
clusters:
- name: minikube
  cluster:
    server: https://192.168.49.2:8443
contexts:
- name: minikube
  context:
    cluster: minikube
    user: minikube
users:
- name: minikube
  user:
    client-key: /home/alice/.minikube/client.key
"#;

#[test]
fn tenants_do_not_clobber_each_other() -> Result<()> {
    let dir = TempDir::new()?;
    let merger = KubeConfigMerger::new(dir.path().join("config"));
    std::fs::write(merger.path(), HAND_WRITTEN)?;

    let first = build_entries(&scope("a"), &[kube_profile("AWS", "Prod", "Admin", "https://a")], &HashMap::new())?;
    merger.merge(&first, "a")?;
    let second = build_entries(&scope("b"), &[kube_profile("GCP", "Dev", "Viewer", "https://b")], &HashMap::new())?;
    merger.merge(&second, "b")?;

    let config = merger.load()?;
    assert_eq!(names(&config.clusters), ["minikube", "a-prod-admin", "b-dev-viewer"]);
    assert_eq!(names(&config.contexts), ["minikube", "a-prod-admin", "b-dev-viewer"]);
    assert_eq!(names(&config.users), ["minikube", "a-alice", "b-alice"]);
    assert_eq!(
        config.extra.get("current-context").and_then(|v| v.as_str()),
        Some("minikube")
    );
    assert_eq!(
        config.users[0].get("user").unwrap()["client-key"],
        "/home/alice/.minikube/client.key"
    );
    Ok(())
}

#[test]
fn rerun_replaces_only_the_tenants_entries() -> Result<()> {
    let dir = TempDir::new()?;
    let merger = KubeConfigMerger::new(dir.path().join("config"));

    let before = build_entries(
        &scope("a"),
        &[
            kube_profile("AWS", "Prod", "Admin", "https://a"),
            kube_profile("AWS", "Dev", "Admin", "https://d"),
        ],
        &HashMap::new(),
    )?;
    merger.merge(&before, "a")?;
    let other = build_entries(&scope("b"), &[kube_profile("GCP", "Dev", "Viewer", "https://b")], &HashMap::new())?;
    merger.merge(&other, "b")?;

    // Access to the dev profile was revoked.
    let after = build_entries(&scope("a"), &[kube_profile("AWS", "Prod", "Admin", "https://a")], &HashMap::new())?;
    merger.merge(&after, "a")?;

    let config = merger.load()?;
    assert_eq!(names(&config.clusters), ["b-dev-viewer", "a-prod-admin"]);
    assert_eq!(names(&config.users), ["b-alice", "a-alice"]);
    Ok(())
}

#[test]
fn tenant_alias_prefix_does_not_claim_longer_tenant() -> Result<()> {
    let dir = TempDir::new()?;
    let merger = KubeConfigMerger::new(dir.path().join("config"));

    let dev = build_entries(&scope("acme-dev"), &[kube_profile("GCP", "Dev", "Viewer", "https://b")], &HashMap::new())?;
    merger.merge(&dev, "acme-dev")?;
    let main = build_entries(&scope("acme"), &[kube_profile("AWS", "Prod", "Admin", "https://a")], &HashMap::new())?;
    merger.merge(&main, "acme")?;
    merger.merge(&main, "acme")?;

    let config = merger.load()?;
    assert_eq!(names(&config.clusters), ["acme-dev-dev-viewer", "acme-prod-admin"]);
    assert_eq!(names(&config.contexts), ["acme-dev-dev-viewer", "acme-prod-admin"]);
    assert_eq!(names(&config.users), ["acme-dev-alice", "acme-alice"]);
    Ok(())
}

#[test]
fn rerun_is_byte_identical() -> Result<()> {
    let dir = TempDir::new()?;
    let merger = KubeConfigMerger::new(dir.path().join("config"));
    std::fs::write(merger.path(), HAND_WRITTEN)?;

    let aliases = HashMap::from([("aws/prod/admin".to_string(), "prod".to_string())]);
    let profiles = [
        kube_profile("AWS", "Prod", "Admin", "https://a"),
        kube_profile("Azure", "Prod", "Admin", "https://a"),
    ];

    merger.merge(&build_entries(&scope("a"), &profiles, &aliases)?, "a")?;
    let once = std::fs::read(merger.path())?;
    merger.merge(&build_entries(&scope("a"), &profiles, &aliases)?, "a")?;
    let twice = std::fs::read(merger.path())?;

    assert_eq!(once, twice);
    Ok(())
}

#[test]
fn alias_context_replaces_a_foreign_context_of_the_same_name() -> Result<()> {
    let dir = TempDir::new()?;
    let merger = KubeConfigMerger::new(dir.path().join("config"));
    std::fs::write(
        merger.path(),
        "contexts:\n- name: prod\n  context:\n    cluster: old\n    user: old\n",
    )?;

    let aliases = HashMap::from([("aws/prod/admin".to_string(), "prod".to_string())]);
    let entries = build_entries(&scope("a"), &[kube_profile("AWS", "Prod", "Admin", "https://a")], &aliases)?;
    let merged = merger.merge(&entries, "a")?;

    assert_eq!(names(&merged.contexts), ["prod"]);
    assert_eq!(merged.contexts[0].get("context").unwrap()["cluster"], "a-prod-admin");
    Ok(())
}

#[test]
fn malformed_file_is_a_hard_error_and_left_alone() -> Result<()> {
    let dir = TempDir::new()?;
    let merger = KubeConfigMerger::new(dir.path().join("config"));
    let garbage = "clusters: [unterminated\n  - : :\n";
    std::fs::write(merger.path(), garbage)?;

    let entries = build_entries(&scope("a"), &[kube_profile("AWS", "Prod", "Admin", "https://a")], &HashMap::new())?;
    let err = merger.merge(&entries, "a").unwrap_err();

    assert!(matches!(err, Error::MalformedExistingConfig { .. }));
    assert_eq!(std::fs::read_to_string(merger.path())?, garbage);
    Ok(())
}

#[test]
fn empty_or_missing_file_starts_fresh() -> Result<()> {
    let dir = TempDir::new()?;
    let entries = build_entries(&scope("a"), &[kube_profile("AWS", "Prod", "Admin", "https://a")], &HashMap::new())?;

    let missing = KubeConfigMerger::new(dir.path().join("kube").join("config"));
    assert_eq!(missing.load()?, KubeConfig::default());
    let merged = missing.merge(&entries, "a")?;
    assert_eq!(merged.api_version, "v1");
    assert_eq!(merged.kind, "Config");

    let empty = KubeConfigMerger::new(dir.path().join("empty"));
    std::fs::write(empty.path(), "\n")?;
    assert_eq!(empty.merge(&entries, "a")?, merged);
    Ok(())
}

#[tokio::test]
async fn profiles_from_iam_client_feed_the_builder() -> Result<()> {
    let client = FakeIamClient::failing().with_profiles(vec![
        kube_profile("AWS", "Prod", "Admin", "https://a"),
        kube_profile("GCP", "Prod", "Admin", "https://a"),
    ]);
    let profiles = client.kube_profiles().await?;
    let entries = build_entries(&scope("a"), &profiles, &HashMap::new())?;

    assert_eq!(names(&entries.clusters), ["a-aws-prod-admin", "a-gcp-prod-admin"]);
    assert_eq!(names(&entries.users), ["a-alice"]);
    Ok(())
}
