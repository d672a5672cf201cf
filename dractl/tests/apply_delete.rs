//! Apply/delete reconciliation against an in-memory control plane.

mod common;

use common::{FakeCluster, Op};
use dractl::chart::Chart;
use dractl::config::{DeployConfig, Platform};
use dractl::deploy::{self, ApplyOutcome, DeployError};

fn openshift_config() -> DeployConfig {
    DeployConfig {
        namespace: "ns1".to_string(),
        image: Some("quay.io/x/y:v2".to_string()),
        command: Some("run".to_string()),
        platform: Platform::OpenShift,
        ..Default::default()
    }
}

#[tokio::test]
async fn apply_creates_everything_then_is_unchanged() {
    let chart = Chart::embedded().unwrap();
    let cfg = openshift_config();
    let cluster = FakeCluster::default();

    let results = deploy::apply(&cluster, &chart, &cfg).await.unwrap();
    assert!(!results.is_empty());
    assert!(
        results.iter().all(|(_, o)| *o == ApplyOutcome::Created),
        "first apply must create every resource: {results:?}"
    );

    // Second pass converges without any further mutation.
    cluster.clear_ops();
    let results = deploy::apply(&cluster, &chart, &cfg).await.unwrap();
    assert!(
        results.iter().all(|(_, o)| *o == ApplyOutcome::Unchanged),
        "second apply must leave every resource unchanged: {results:?}"
    );
    assert!(
        cluster.ops().iter().all(|op| !op.is_mutation()),
        "converged apply must only read: {:?}",
        cluster.ops()
    );
}

#[tokio::test]
async fn namespace_is_created_once_before_any_resource() {
    let chart = Chart::embedded().unwrap();
    let cfg = openshift_config();
    let cluster = FakeCluster::default();

    deploy::apply(&cluster, &chart, &cfg).await.unwrap();

    let ops = cluster.ops();
    let ns_creates: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter_map(|(i, op)| match op {
            Op::Create(k) if k.starts_with("Namespace/") => Some(i),
            _ => None,
        })
        .collect();
    assert_eq!(ns_creates.len(), 1, "exactly one namespace create");

    let first_other_write = ops
        .iter()
        .position(|op| {
            op.is_mutation()
                && !matches!(op, Op::Create(k) if k.starts_with("Namespace/"))
        })
        .expect("apply must write resources");
    assert!(
        ns_creates[0] < first_other_write,
        "namespace create must precede all resource writes"
    );
}

#[tokio::test]
async fn existing_namespace_is_left_alone() {
    let chart = Chart::embedded().unwrap();
    let cfg = openshift_config();
    let cluster = FakeCluster::default();

    deploy::apply(&cluster, &chart, &cfg).await.unwrap();
    cluster.clear_ops();
    deploy::apply(&cluster, &chart, &cfg).await.unwrap();

    assert!(
        !cluster
            .ops()
            .iter()
            .any(|op| matches!(op, Op::Create(k) if k.starts_with("Namespace/"))),
        "no second namespace create"
    );
}

#[tokio::test]
async fn changed_image_updates_only_the_daemonset() {
    let chart = Chart::embedded().unwrap();
    let cfg = openshift_config();
    let cluster = FakeCluster::default();

    deploy::apply(&cluster, &chart, &cfg).await.unwrap();

    let cfg_v3 = DeployConfig {
        image: Some("quay.io/x/y:v3".to_string()),
        ..cfg
    };
    let results = deploy::apply(&cluster, &chart, &cfg_v3).await.unwrap();
    for (ident, outcome) in &results {
        let expected = if ident.kind == "DaemonSet" {
            ApplyOutcome::Updated
        } else {
            ApplyOutcome::Unchanged
        };
        assert_eq!(*outcome, expected, "{ident}");
    }

    let ds_ident = results
        .iter()
        .map(|(i, _)| i)
        .find(|i| i.kind == "DaemonSet")
        .unwrap();
    let live = cluster.object(ds_ident).unwrap();
    assert_eq!(
        live["spec"]["template"]["spec"]["containers"][0]["image"],
        "quay.io/x/y:v3"
    );
}

#[tokio::test]
async fn apply_aborts_on_first_failure_with_identity() {
    let chart = Chart::embedded().unwrap();
    let cfg = openshift_config();
    let cluster = FakeCluster::default();
    cluster.fail_creates_of("DaemonSet");

    let err = deploy::apply(&cluster, &chart, &cfg).await.unwrap_err();
    match err {
        DeployError::Apply { ident, .. } => {
            assert_eq!(ident.kind, "DaemonSet");
        }
        other => panic!("unexpected error {other}"),
    }

    // Nothing past the failing resource was attempted: the daemonset
    // sorts before the service account and the admission policy.
    assert!(!cluster
        .ops()
        .iter()
        .any(|op| matches!(op, Op::Create(k) if k.starts_with("ServiceAccount/"))));
}

#[tokio::test]
async fn delete_removes_cluster_scoped_in_dependency_order() {
    let chart = Chart::embedded().unwrap();
    let cfg = openshift_config();
    let cluster = FakeCluster::default();

    deploy::apply(&cluster, &chart, &cfg).await.unwrap();
    cluster.clear_ops();
    deploy::delete(&cluster, &chart, &cfg).await.unwrap();

    let deletes: Vec<String> = cluster
        .ops()
        .iter()
        .filter_map(|op| match op {
            Op::Delete(k) => {
                Some(k.split('/').next().unwrap().to_string())
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        deletes,
        [
            "ValidatingAdmissionPolicyBinding",
            "ValidatingAdmissionPolicy",
            "SecurityContextConstraints",
            "ClusterRoleBinding",
            "ClusterRole",
            "DeviceClass",
            "DeviceClass",
            "Namespace",
        ]
    );
    assert_eq!(cluster.len(), 0, "cascade must empty the cluster");
}

#[tokio::test]
async fn delete_twice_is_clean() {
    let chart = Chart::embedded().unwrap();
    let cfg = openshift_config();
    let cluster = FakeCluster::default();

    deploy::apply(&cluster, &chart, &cfg).await.unwrap();
    deploy::delete(&cluster, &chart, &cfg).await.unwrap();
    // Everything is already absent now; a second teardown must not error.
    deploy::delete(&cluster, &chart, &cfg).await.unwrap();
}

#[tokio::test]
async fn delete_on_empty_cluster_is_clean() {
    let chart = Chart::embedded().unwrap();
    let cfg = openshift_config();
    let cluster = FakeCluster::default();

    deploy::delete(&cluster, &chart, &cfg).await.unwrap();
    assert_eq!(cluster.len(), 0);
}
