//! End-to-end call scenarios within one fabric.

use std::sync::atomic::Ordering;
use std::time::Duration;

use mooring::prelude::*;
use serde_json::json;

use crate::common;
use crate::deploy::{deploy_local, Gated};

const BOUND: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sum_resolves_future() {
    let d = deploy_local(&common::scheduler());
    assert!(d.client.is_connected_to_server());
    assert_eq!(d.client.server_uri().as_ref(), Some(d.server.inbound_uri()));

    let future = d.client.call("add", vec![json!(2), json!(3)]).expect("call");
    let outcome = future.wait_timeout(BOUND).await;
    assert_eq!(outcome, Ok(Some(json!(5))));
    assert_eq!(d.client.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connect_fails_without_matching_server() {
    common::init_tracing();
    let fabric = Fabric::new(FabricConfig::local("no-server"));
    let scheduler = common::scheduler();
    let bare = common::component("bare", &fabric, &scheduler);
    let caller = common::component("caller", &fabric, &scheduler);

    let client =
        AsyncCallClient::install(&caller, AsyncCallConfig::default()).expect("install");
    let err = client.connect_to_server(bare.discovery_uri()).unwrap_err();
    assert!(matches!(
        err,
        AsyncCallError::Discovery(DiscoveryError::UnexpectedMatchCount { found: 0, .. })
    ));
    assert!(!client.is_connected_to_server());
    assert!(matches!(client.call("add", vec![]), Err(AsyncCallError::NotConnected)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_back_to_back_calls_do_not_cross() {
    let d = deploy_local(&common::scheduler());

    let slow = d
        .client
        .call("delayed", vec![json!(150), json!("slow")])
        .expect("slow call");
    let fast = d
        .client
        .call("delayed", vec![json!(0), json!("fast")])
        .expect("fast call");
    assert_ne!(slow.correlation_id(), fast.correlation_id());

    assert_eq!(fast.wait_timeout(BOUND).await, Ok(Some(json!("fast"))));
    assert_eq!(slow.wait_timeout(BOUND).await, Ok(Some(json!("slow"))));
    assert_eq!(d.server.reception_channel_count(), 1);
}

#[test]
fn test_call_returns_before_execute_runs_on_a_worker() {
    let scheduler = common::owned_scheduler();
    let d = deploy_local(&scheduler);
    let gated = Gated::default();
    d.server
        .register_handler("gate", Arc::new(gated.clone()))
        .expect("register");

    let caller = std::thread::current().id();
    let future = d.client.call("gate", vec![]).expect("call");
    gated.open.store(true, Ordering::Release);

    assert_eq!(future.blocking_wait(), Ok(Some(json!("ran"))));
    let (worker, opened_first) = gated.seen.lock().take().expect("handler ran");
    assert_ne!(worker, caller);
    assert!(opened_first, "execute finished before call() returned");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_call_future_is_not_cancellable() {
    let d = deploy_local(&common::scheduler());

    let future = d
        .client
        .call("delayed", vec![json!(20), json!("done")])
        .expect("call");
    assert!(!future.cancel());
    assert!(!future.is_cancelled());
    assert_eq!(future.wait_timeout(BOUND).await, Ok(Some(json!("done"))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failures_reach_the_caller() {
    let d = deploy_local(&common::scheduler());

    let unknown = d.client.call("divide", vec![]).expect("call");
    assert_eq!(
        unknown.wait_timeout(BOUND).await,
        Err(CallError::UnknownOperation {
            operation: "divide".to_string()
        })
    );

    let failing = d.client.call("fail", vec![]).expect("call");
    assert!(matches!(
        failing.wait_timeout(BOUND).await,
        Err(CallError::Execution { .. })
    ));

    let bad_args = d.client.call("add", vec![json!("two")]).expect("call");
    assert!(matches!(
        bad_args.wait_timeout(BOUND).await,
        Err(CallError::InvalidArguments { .. })
    ));

    let forgotten = d.client.call("forget", vec![]).expect("call");
    assert_eq!(forgotten.wait_timeout(BOUND).await, Err(CallError::BrokenPromise));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_decode_typed_result() {
    let d = deploy_local(&common::scheduler());

    let envelope = CallEnvelope::new("add", vec![])
        .arg(&40)
        .and_then(|e| e.arg(&2))
        .expect("envelope");
    let future = d.client.async_call_with_future(envelope).expect("call");
    let sum: i64 = future.decode().await.expect("decode");
    assert_eq!(sum, 42);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_preferred_pool_runs_calls() {
    common::init_tracing();
    let fabric = Fabric::new(FabricConfig::local("pools"));
    let scheduler: Arc<dyn TaskScheduler> = Arc::new(
        TokioScheduler::current()
            .expect("runtime")
            .with_pool("calls", tokio::runtime::Handle::current()),
    );
    let server_component = common::component("server", &fabric, &scheduler);
    let client_component = common::component("client", &fabric, &scheduler);

    let config = AsyncCallConfig::builder().preferred_pool("calls").build();
    let server = AsyncCallServer::install(&server_component, config).expect("server");
    server
        .register_handler(
            "pool",
            handler_fn(|ctx, _| Ok(Some(json!({ "operation": ctx.operation() })))),
        )
        .expect("register");

    let client =
        AsyncCallClient::install(&client_component, AsyncCallConfig::default()).expect("client");
    client
        .connect_to_server(server_component.discovery_uri())
        .expect("connect");
    let outcome = client
        .call("pool", vec![])
        .expect("call")
        .wait_timeout(BOUND)
        .await
        .expect("outcome")
        .expect("value");
    assert_eq!(outcome["operation"], json!("pool"));
}
