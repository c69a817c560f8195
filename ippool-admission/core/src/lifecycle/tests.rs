use super::*;
use crate::{decision::Rejection, k8s::IP_POOL_ANNOTATION, Operation, BY_PASS};
use anyhow::anyhow;
use http::StatusCode;
use parking_lot::Mutex;
use serde_json::json;
use tokio::time;

struct JsonDecoder;

struct FailingDecoder;

/// Fails to decode any payload without an `apiVersion`.
struct PickyDecoder;

struct StaticFetcher(Option<VirtualMachine>);

struct PendingFetcher;

struct TestGateway {
    calls: Mutex<Vec<Forward>>,
    verdict: Verdict,
}

fn init_tracing() -> tracing::subscriber::DefaultGuard {
    tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .finish(),
    )
}

fn mk_vm_json(ns: &str, name: &str, pool: Option<&str>) -> serde_json::Value {
    let template = match pool {
        Some(pool) => json!({
            "metadata": { "annotations": { IP_POOL_ANNOTATION: pool } },
            "spec": { "domain": { "devices": {} } },
        }),
        None => json!({
            "spec": { "domain": { "devices": {} } },
        }),
    };
    json!({
        "apiVersion": "kubevirt.io/v1",
        "kind": "VirtualMachine",
        "metadata": { "namespace": ns, "name": name },
        "spec": { "runStrategy": "Always", "template": template },
    })
}

fn mk_vm(ns: &str, name: &str, pool: Option<&str>) -> VirtualMachine {
    serde_json::from_value(mk_vm_json(ns, name, pool)).expect("vm must decode")
}

fn mk_create(pool: Option<&str>) -> Request<serde_json::Value> {
    Request {
        namespace: "ns-0".to_string(),
        name: "vm-0".to_string(),
        object: Some(mk_vm_json("ns-0", "vm-0", pool)),
        old_object: None,
    }
}

fn mk_update(old: Option<&str>, new: Option<&str>) -> Request<serde_json::Value> {
    Request {
        namespace: "ns-0".to_string(),
        name: "vm-0".to_string(),
        object: Some(mk_vm_json("ns-0", "vm-0", new)),
        old_object: Some(mk_vm_json("ns-0", "vm-0", old)),
    }
}

fn mk_delete() -> Request<serde_json::Value> {
    Request {
        namespace: "ns-0".to_string(),
        name: "vm-0".to_string(),
        object: None,
        old_object: None,
    }
}

#[tokio::test]
async fn create_without_pool_bypasses() {
    let _tracing = init_tracing();
    for pool in [None, Some("")] {
        let gateway = TestGateway::default();
        let verdict = on_create(&JsonDecoder, &gateway, &mk_create(pool)).await;
        assert_eq!(verdict, Verdict::Allow(BY_PASS.to_string()));
        assert_eq!(gateway.call_count(), 0);
    }
}

#[tokio::test]
async fn create_with_pool_forwards() {
    let _tracing = init_tracing();
    let req = mk_create(Some("pool-a"));
    assert_eq!(
        decide_create(&JsonDecoder, &req),
        Decision::Forward(Forward::Create {
            pool: "pool-a".into(),
            namespace: "ns-0".to_string(),
        })
    );

    let gateway = TestGateway::default();
    let verdict = on_create(&JsonDecoder, &gateway, &req).await;
    assert_eq!(verdict, Verdict::by_pass());
    assert_eq!(
        gateway.calls(),
        vec![Forward::Create {
            pool: "pool-a".into(),
            namespace: "ns-0".to_string(),
        }]
    );
}

#[tokio::test]
async fn gateway_verdict_is_returned_verbatim() {
    let rejection = Rejection::new(StatusCode::CONFLICT, "10.0.0.5 is already in use");
    let gateway = TestGateway::rejecting(rejection.clone());

    let verdict = on_create(&JsonDecoder, &gateway, &mk_create(Some("10.0.0.5"))).await;
    assert_eq!(verdict, Verdict::Reject(rejection.clone()));

    let verdict = on_update(
        &JsonDecoder,
        &gateway,
        &mk_update(None, Some("10.0.0.5")),
    )
    .await;
    assert_eq!(verdict, Verdict::Reject(rejection));
    assert_eq!(gateway.call_count(), 2);
}

#[tokio::test]
async fn create_decode_failure_rejects() {
    let gateway = TestGateway::default();
    let verdict = on_create(&FailingDecoder, &gateway, &mk_create(Some("pool-a"))).await;
    let Verdict::Reject(rejection) = verdict else {
        panic!("decode failure must reject");
    };
    assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
    assert!(
        rejection.message.contains("unexpected payload"),
        "{}",
        rejection.message
    );
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn create_missing_object_rejects() {
    let gateway = TestGateway::default();
    let mut req = mk_create(Some("pool-a"));
    req.object = None;
    let verdict = on_create(&JsonDecoder, &gateway, &req).await;
    assert_eq!(
        verdict,
        Verdict::Reject(Rejection::new(
            StatusCode::BAD_REQUEST,
            "admission request missing 'object'"
        ))
    );
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn update_reordered_pool_bypasses() {
    let gateway = TestGateway::default();
    let req = mk_update(Some("pool-a,pool-b"), Some("pool-b,pool-a"));
    assert_eq!(decide_update(&JsonDecoder, &req), Decision::by_pass());
    assert_eq!(
        on_update(&JsonDecoder, &gateway, &req).await,
        Verdict::by_pass()
    );
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn update_without_pools_bypasses() {
    for (old, new) in [
        (None, None),
        (Some(""), None),
        (None, Some("")),
        (Some(""), Some("")),
    ] {
        let gateway = TestGateway::default();
        let verdict = on_update(&JsonDecoder, &gateway, &mk_update(old, new)).await;
        assert_eq!(verdict, Verdict::by_pass(), "old={old:?} new={new:?}");
        assert_eq!(gateway.call_count(), 0);
    }
}

#[tokio::test]
async fn update_changed_pool_forwards() {
    let _tracing = init_tracing();
    for (old, new) in [
        (Some("pool-a"), Some("pool-a,pool-b")),
        (Some("pool-a"), Some("pool-b")),
        (None, Some("pool-a")),
        (Some("pool-a"), Some("")),
    ] {
        let gateway = TestGateway::default();
        let verdict = on_update(&JsonDecoder, &gateway, &mk_update(old, new)).await;
        assert_eq!(verdict, Verdict::by_pass());
        assert_eq!(
            gateway.calls(),
            vec![Forward::Update {
                old: old.unwrap_or_default().into(),
                new: new.unwrap_or_default().into(),
                namespace: "ns-0".to_string(),
            }],
            "old={old:?} new={new:?}"
        );
    }
}

#[test]
fn update_forwards_old_namespace() {
    let req = Request {
        namespace: "ns-1".to_string(),
        name: "vm-0".to_string(),
        object: Some(mk_vm_json("ns-1", "vm-0", Some("pool-b"))),
        old_object: Some(mk_vm_json("ns-0", "vm-0", Some("pool-a"))),
    };
    let Decision::Forward(forward) = decide_update(&JsonDecoder, &req) else {
        panic!("changed pool must forward");
    };
    assert_eq!(forward.operation(), Operation::Update);
    assert!(matches!(forward, Forward::Update { namespace, .. } if namespace == "ns-0"));
}

#[tokio::test]
async fn update_decode_failures_reject() {
    // Old object is invalid.
    let gateway = TestGateway::default();
    let mut req = mk_update(Some("pool-a"), Some("pool-b"));
    req.old_object = Some(json!({ "spec": {} }));
    let verdict = on_update(&PickyDecoder, &gateway, &req).await;
    let Verdict::Reject(rejection) = verdict else {
        panic!("old decode failure must reject");
    };
    assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
    assert!(rejection.message.contains("'oldObject'"), "{}", rejection.message);
    assert!(rejection.message.contains("missing apiVersion"), "{}", rejection.message);

    // New object is invalid.
    let mut req = mk_update(Some("pool-a"), Some("pool-b"));
    req.object = Some(json!({ "spec": {} }));
    let verdict = on_update(&PickyDecoder, &gateway, &req).await;
    let Verdict::Reject(rejection) = verdict else {
        panic!("new decode failure must reject");
    };
    assert!(rejection.message.contains("'object'"), "{}", rejection.message);

    // Old object is absent.
    let mut req = mk_update(Some("pool-a"), Some("pool-b"));
    req.old_object = None;
    assert_eq!(
        decide_update(&JsonDecoder, &req),
        Decision::Reject(Rejection::new(
            StatusCode::BAD_REQUEST,
            "admission request missing 'oldObject'"
        ))
    );

    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn delete_without_pool_bypasses() {
    for pool in [None, Some("")] {
        let gateway = TestGateway::default();
        let fetcher = StaticFetcher(Some(mk_vm("ns-0", "vm-0", pool)));
        let verdict = on_delete(&fetcher, &gateway, &mk_delete()).await;
        assert_eq!(verdict, Verdict::by_pass());
        assert_eq!(gateway.call_count(), 0);
    }
}

#[tokio::test]
async fn delete_with_pool_forwards() {
    let gateway = TestGateway::default();
    let fetcher = StaticFetcher(Some(mk_vm("ns-0", "vm-0", Some("10.0.0.5,10.0.0.6"))));
    assert_eq!(
        decide_delete(&fetcher, &mk_delete()).await,
        Decision::Forward(Forward::Delete {
            pool: "10.0.0.5,10.0.0.6".into(),
            namespace: "ns-0".to_string(),
        })
    );

    let verdict = on_delete(&fetcher, &gateway, &mk_delete()).await;
    assert!(verdict.is_allowed());
    assert_eq!(
        gateway.calls(),
        vec![Forward::Delete {
            pool: "10.0.0.5,10.0.0.6".into(),
            namespace: "ns-0".to_string(),
        }]
    );
}

#[tokio::test]
async fn delete_fetch_failure_rejects() {
    let gateway = TestGateway::default();
    let verdict = on_delete(&StaticFetcher(None), &gateway, &mk_delete()).await;
    let Verdict::Reject(rejection) = verdict else {
        panic!("fetch failure must reject");
    };
    assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        rejection.message,
        "failed to get VirtualMachine ns-0/vm-0: virtualmachines \"vm-0\" not found"
    );
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn delete_dropped_before_fetch_completes() {
    let gateway = TestGateway::default();
    let res = time::timeout(
        time::Duration::from_millis(10),
        on_delete(&PendingFetcher, &gateway, &mk_delete()),
    )
    .await;
    assert!(res.is_err(), "fetch must not complete");
    assert_eq!(gateway.call_count(), 0);
}

// === impl JsonDecoder ===

impl Decode<serde_json::Value> for JsonDecoder {
    fn decode(&self, raw: &serde_json::Value) -> Result<VirtualMachine> {
        Ok(serde_json::from_value(raw.clone())?)
    }
}

impl Decode<serde_json::Value> for FailingDecoder {
    fn decode(&self, _: &serde_json::Value) -> Result<VirtualMachine> {
        Err(anyhow!("unexpected payload"))
    }
}

impl Decode<serde_json::Value> for PickyDecoder {
    fn decode(&self, raw: &serde_json::Value) -> Result<VirtualMachine> {
        if raw.get("apiVersion").is_none() {
            return Err(anyhow!("missing apiVersion"));
        }
        JsonDecoder.decode(raw)
    }
}

// === impl StaticFetcher ===

#[async_trait::async_trait]
impl Fetch for StaticFetcher {
    async fn fetch(&self, _namespace: &str, name: &str) -> Result<VirtualMachine> {
        self.0
            .clone()
            .ok_or_else(|| anyhow!("virtualmachines {name:?} not found"))
    }
}

#[async_trait::async_trait]
impl Fetch for PendingFetcher {
    async fn fetch(&self, _namespace: &str, _name: &str) -> Result<VirtualMachine> {
        futures::future::pending().await
    }
}

// === impl TestGateway ===

impl TestGateway {
    fn rejecting(rejection: Rejection) -> Self {
        Self {
            calls: Default::default(),
            verdict: Verdict::Reject(rejection),
        }
    }

    fn calls(&self) -> Vec<Forward> {
        self.calls.lock().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(&self, forward: Forward) -> Verdict {
        self.calls.lock().push(forward);
        self.verdict.clone()
    }
}

impl Default for TestGateway {
    fn default() -> Self {
        Self {
            calls: Default::default(),
            verdict: Verdict::by_pass(),
        }
    }
}

#[async_trait::async_trait]
impl Reconcile for TestGateway {
    async fn on_create(&self, pool: &PoolSpec, namespace: &str) -> Verdict {
        self.record(Forward::Create {
            pool: pool.clone(),
            namespace: namespace.to_string(),
        })
    }

    async fn on_update(&self, old: &PoolSpec, new: &PoolSpec, namespace: &str) -> Verdict {
        self.record(Forward::Update {
            old: old.clone(),
            new: new.clone(),
            namespace: namespace.to_string(),
        })
    }

    async fn on_delete(&self, pool: &PoolSpec, namespace: &str) -> Verdict {
        self.record(Forward::Delete {
            pool: pool.clone(),
            namespace: namespace.to_string(),
        })
    }
}
