//! Result delivery: exactly-once completion, the per-client reception
//! channel, and teardown.

use std::sync::Barrier;
use std::time::Duration;

use mooring::prelude::*;
use serde_json::json;

use crate::common;
use crate::deploy::deploy_local;

const BOUND: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_duplicate_delivery_completes_once() {
    let d = deploy_local(&common::scheduler());

    let future = d.client.call("park", vec![]).expect("call");
    let id = future.correlation_id().clone();
    d.parking.wait_for(1).await;

    assert!(d.client.receive(&id, Ok(Some(json!("first")))));
    assert!(!d.client.receive(&id, Ok(Some(json!("second")))));

    // The server's own answer arrives late and is dropped.
    let parked = d.parking.parked.lock().pop().expect("parked reply");
    parked.send(Some(json!("late"))).expect("late send is accepted");

    assert_eq!(future.wait_timeout(BOUND).await, Ok(Some(json!("first"))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_correlation_id_is_ignored() {
    let d = deploy_local(&common::scheduler());

    let future = d.client.call("park", vec![]).expect("call");
    d.parking.wait_for(1).await;
    assert_eq!(d.client.pending_count(), 1);

    assert!(!d.client.receive(&CorrelationId::from_wire("never-issued"), Ok(None)));
    assert_eq!(d.client.pending_count(), 1);

    let parked = d.parking.parked.lock().pop().expect("parked reply");
    parked.send_value(&"answered").expect("send");
    assert_eq!(future.wait_timeout(BOUND).await, Ok(Some(json!("answered"))));
}

#[test]
fn test_concurrent_first_contact_opens_one_channel() {
    let scheduler = common::owned_scheduler();
    let d = deploy_local(&scheduler);
    let threads = 8;
    let barrier = Barrier::new(threads);

    std::thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                barrier.wait();
                d.server
                    .connect_reception_port(d.client.reception_uri())
                    .expect("connect reception port");
            });
        }
    });
    assert_eq!(d.server.reception_channel_count(), 1);
}

#[test]
fn test_concurrent_calls_share_one_channel() {
    let scheduler = common::owned_scheduler();
    let d = deploy_local(&scheduler);
    let threads = 8;
    let barrier = Barrier::new(threads);

    let sums: Vec<Option<serde_json::Value>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads as i64)
            .map(|i| {
                let barrier = &barrier;
                let client = &d.client;
                scope.spawn(move || {
                    barrier.wait();
                    client
                        .call("add", vec![json!(i), json!(100)])
                        .expect("call")
                        .blocking_wait()
                        .expect("outcome")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect()
    });

    let expected: Vec<_> = (0..threads as i64).map(|i| Some(json!(i + 100))).collect();
    assert_eq!(sums, expected);
    assert_eq!(d.server.reception_channel_count(), 1);
    assert_eq!(d.client.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnect_drops_channel_and_allows_reconnect() {
    let d = deploy_local(&common::scheduler());

    let first = d.client.call("add", vec![json!(1)]).expect("call");
    assert_eq!(first.wait_timeout(BOUND).await, Ok(Some(json!(1))));
    assert!(d.server.has_reception_channel(d.client.reception_uri()));

    d.client.disconnect_from_server().expect("disconnect");
    assert!(!d.client.is_connected_to_server());
    assert_eq!(d.server.reception_channel_count(), 0);
    assert!(matches!(
        d.client.call("add", vec![]),
        Err(AsyncCallError::NotConnected)
    ));

    d.client
        .connect_to_server(d.server_component.discovery_uri())
        .expect("reconnect");
    let again = d.client.call("add", vec![json!(2), json!(2)]).expect("call");
    assert_eq!(again.wait_timeout(BOUND).await, Ok(Some(json!(4))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_connect_is_rejected() {
    let d = deploy_local(&common::scheduler());
    let err = d
        .client
        .connect_to_server(d.server_component.discovery_uri())
        .unwrap_err();
    assert_eq!(err, AsyncCallError::AlreadyConnected);
    assert!(err.is_precondition_violation());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_finalise_abandons_pending_calls() {
    let d = deploy_local(&common::scheduler());

    let future = d.client.call("park", vec![]).expect("call");
    d.parking.wait_for(1).await;

    d.client.finalise().expect("finalise");
    assert!(!d.client.is_connected_to_server());
    assert_eq!(d.server.reception_channel_count(), 0);
    assert_eq!(future.wait_timeout(BOUND).await, Err(CallError::Abandoned));

    // The parked reply has nowhere to go any more.
    let parked = d.parking.parked.lock().pop().expect("parked reply");
    assert!(matches!(
        parked.send(None),
        Err(AsyncCallError::NoReceptionChannel { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_finalised_server_refuses_calls() {
    let d = deploy_local(&common::scheduler());
    d.server.finalise().expect("finalise");

    let err = d.client.call("add", vec![json!(1)]).unwrap_err();
    assert!(matches!(
        err,
        AsyncCallError::Invocation(InvocationError::Unavailable { .. })
    ));
    assert_eq!(d.client.pending_count(), 0);

    d.client.finalise().expect("client finalise");
    assert!(d.client_component.port(d.client.reception_uri()).is_none());
}
