//! Outbound to inbound connections and connection state discipline.

use std::sync::{Arc, Barrier};

use mooring::port::{InboundHandler, Invocation};
use mooring::prelude::*;
use serde_json::{json, Value};

use crate::common;

const GREETER: Capability = Capability::from_static("Greeter");

fn greeter() -> Arc<dyn InboundHandler> {
    Arc::new(
        |inv: Invocation| -> Result<Value, InvocationError> {
            match inv.operation.as_str() {
                "greet" => Ok(json!(format!("hello {}", inv.decode_arg::<String>(0)?))),
                _ => Ok(Value::Null),
            }
        },
    )
}

struct Setup {
    client: Arc<Component>,
    server: Arc<Component>,
    outbound: Arc<Port>,
    inbound: Arc<Port>,
}

fn setup() -> Setup {
    common::init_tracing();
    let fabric = Fabric::new(FabricConfig::local("connection"));
    let scheduler = common::owned_scheduler();
    let client = common::component("client", &fabric, &scheduler);
    let server = common::component("server", &fabric, &scheduler);

    let inbound = server.create_port(PortSpec::inbound(GREETER, Some(greeter())));
    inbound.publish().expect("publish inbound");
    let outbound = client.create_port(PortSpec::outbound(GREETER));
    outbound.publish().expect("publish outbound");

    Setup {
        client,
        server,
        outbound,
        inbound,
    }
}

#[test]
fn test_outbound_call_reaches_inbound_handler() {
    let s = setup();
    s.outbound
        .do_connection(s.inbound.uri(), &ConnectorKey::DIRECT)
        .expect("connect");

    assert!(s.outbound.connected());
    assert_eq!(s.outbound.client_uri().as_ref(), Some(s.outbound.uri()));
    assert_eq!(s.outbound.server_uri().as_ref(), Some(s.inbound.uri()));
    assert_eq!(s.outbound.connector_key(), Some(ConnectorKey::DIRECT));
    assert!(!s.outbound.is_remote());
    // An inbound peer serves many clients and records none of them.
    assert!(!s.inbound.connected());

    let reply = s
        .outbound
        .call(Invocation::new("greet", vec![json!("ada")]))
        .expect("call");
    assert_eq!(reply, json!("hello ada"));
}

#[test]
fn test_connect_disconnect_cycles_keep_one_connector() {
    let s = setup();
    for _ in 0..3 {
        s.outbound
            .do_connection(s.inbound.uri(), &ConnectorKey::DIRECT)
            .expect("connect");
        assert!(s.outbound.connected());
        assert_eq!(s.outbound.status(), PortStatus::Connected);

        s.outbound.do_disconnection().expect("disconnect");
        assert!(!s.outbound.connected());
        assert_eq!(s.outbound.peer_uri(), None);
        assert!(matches!(
            s.outbound.call(Invocation::new("greet", vec![json!("x")])),
            Err(InvocationError::NotConnected { .. })
        ));
    }
}

#[test]
fn test_state_discipline_violations() {
    let s = setup();

    let err = s.outbound.do_disconnection().unwrap_err();
    assert!(matches!(err, PortError::NotConnected { .. }));
    assert!(err.is_precondition_violation());

    s.outbound
        .do_connection(s.inbound.uri(), &ConnectorKey::DIRECT)
        .expect("connect");
    let err = s
        .outbound
        .do_connection(s.inbound.uri(), &ConnectorKey::DIRECT)
        .unwrap_err();
    assert!(matches!(err, PortError::AlreadyConnected { .. }));
    assert!(err.is_precondition_violation());

    // The failed second connect leaves the first edge untouched.
    assert_eq!(s.outbound.server_uri().as_ref(), Some(s.inbound.uri()));

    let err = s.outbound.destroy().unwrap_err();
    assert!(matches!(err, PortError::AlreadyConnected { .. }));
    let err = s.outbound.unpublish().unwrap_err();
    assert!(matches!(err, PortError::AlreadyConnected { .. }));
}

#[test]
fn test_concurrent_connects_have_one_winner() {
    let s = setup();
    let threads = 8;
    let barrier = Barrier::new(threads);

    let results: Vec<Result<(), PortError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    s.outbound
                        .do_connection(s.inbound.uri(), &ConnectorKey::DIRECT)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect()
    });

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(
            matches!(
                err,
                PortError::AlreadyConnected { .. } | PortError::ConnectionInProgress { .. }
            ),
            "unexpected error: {err}"
        );
    }
    assert!(s.outbound.connected());
}

#[test]
fn test_destroyed_server_port_is_unavailable() {
    let s = setup();
    s.outbound
        .do_connection(s.inbound.uri(), &ConnectorKey::DIRECT)
        .expect("connect");
    s.server.destroy_port(s.inbound.uri()).expect("destroy");

    let err = s
        .outbound
        .call(Invocation::new("greet", vec![json!("x")]))
        .unwrap_err();
    assert!(matches!(err, InvocationError::Unavailable { .. }));

    // The client can still let go of the dangling edge.
    s.outbound.do_disconnection().expect("disconnect");
    s.client.destroy_port(s.outbound.uri()).expect("destroy outbound");
}

#[test]
fn test_inbound_port_never_initiates() {
    let s = setup();
    let err = s
        .inbound
        .do_connection(s.outbound.uri(), &ConnectorKey::DIRECT)
        .unwrap_err();
    assert!(matches!(err, PortError::InitiatorOnly { .. }));
    assert!(matches!(
        s.inbound.do_disconnection(),
        Err(PortError::InitiatorOnly { .. })
    ));
}

#[test]
fn test_connecting_to_unpublished_inbound_fails() {
    let s = setup();
    s.inbound.unpublish().expect("unpublish");
    let err = s
        .outbound
        .do_connection(s.inbound.uri(), &ConnectorKey::DIRECT)
        .unwrap_err();
    assert!(matches!(err, PortError::Registry(RegistryError::Unresolvable { .. })));
    assert!(!err.is_precondition_violation());
    assert!(!s.outbound.connected());
}

#[test]
fn test_component_shutdown_releases_everything() {
    let s = setup();
    s.outbound
        .do_connection(s.inbound.uri(), &ConnectorKey::DIRECT)
        .expect("connect");

    s.client.shutdown();
    assert!(s.outbound.is_destroyed());
    assert_eq!(s.client.port_count(), 0);

    s.server.shutdown();
    assert!(s.inbound.is_destroyed());
    assert!(s.server.fabric().registry().is_empty());
}
