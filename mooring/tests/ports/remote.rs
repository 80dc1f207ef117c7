//! Links between ports living in different fabrics.

use std::sync::Arc;

use mooring::port::{InboundHandler, Invocation};
use mooring::prelude::*;
use serde_json::{json, Value};

use crate::common;

const ADDER: Capability = Capability::from_static("Adder");

fn adder() -> Arc<dyn InboundHandler> {
    Arc::new(|inv: Invocation| -> Result<Value, InvocationError> {
        let a: i64 = inv.decode_arg(0)?;
        let b: i64 = inv.decode_arg(1)?;
        Ok(json!(a + b))
    })
}

#[test]
fn test_outbound_resolves_inbound_in_other_fabric() {
    common::init_tracing();
    let (left, right) = common::linked_fabrics();
    let scheduler = common::owned_scheduler();
    let client = common::component("client", &left, &scheduler);
    let server = common::component("server", &right, &scheduler);

    let inbound = server.create_port(PortSpec::inbound(ADDER, Some(adder())));
    inbound.publish().expect("publish");
    let outbound = client.create_port(PortSpec::outbound(ADDER));
    outbound.publish().expect("publish");

    assert!(left.registry().get(inbound.uri()).is_none());

    outbound
        .do_connection(inbound.uri(), &ConnectorKey::DIRECT)
        .expect("connect");
    assert!(outbound.is_remote());

    let sum = outbound
        .call(Invocation::new("add", vec![json!(40), json!(2)]))
        .expect("call");
    assert_eq!(sum, json!(42));

    // Errors raised by the remote handler survive the round trip.
    let err = outbound
        .call(Invocation::new("add", vec![json!("forty")]))
        .unwrap_err();
    assert!(matches!(err, InvocationError::InvalidArguments { .. }));

    outbound.do_disconnection().expect("disconnect");
}

#[test]
fn test_two_way_handshake_crosses_fabrics() {
    common::init_tracing();
    let (left, right) = common::linked_fabrics();
    let scheduler = common::owned_scheduler();
    let here = common::component("here", &left, &scheduler);
    let there = common::component("there", &right, &scheduler);

    let echo = |tag: &'static str| -> Arc<dyn InboundHandler> {
        Arc::new(move |_inv: Invocation| -> Result<Value, InvocationError> { Ok(json!(tag)) })
    };
    let a = here.create_port(PortSpec::two_way(ADDER, echo("here")));
    let b = there.create_port(PortSpec::two_way(ADDER, echo("there")));
    a.publish().expect("publish");
    b.publish().expect("publish");

    a.do_connection(b.uri(), &ConnectorKey::TWO_WAY)
        .expect("connect");
    assert!(a.is_remote());
    assert!(b.is_remote());
    assert_eq!(a.client_uri().as_ref(), Some(a.uri()));
    assert_eq!(a.server_uri().as_ref(), Some(b.uri()));
    assert_eq!(b.client_uri().as_ref(), Some(b.uri()));
    assert_eq!(b.server_uri().as_ref(), Some(a.uri()));
    assert_eq!(a.call(Invocation::new("ping", vec![])).expect("a to b"), json!("there"));
    assert_eq!(b.call(Invocation::new("ping", vec![])).expect("b to a"), json!("here"));

    a.do_disconnection().expect("disconnect");
    assert!(!b.connected());
}

#[test]
fn test_local_fabric_never_resolves_remotely() {
    common::init_tracing();
    let (_left, right) = common::linked_fabrics();
    let isolated = Fabric::new(FabricConfig::local("isolated"));
    let scheduler = common::owned_scheduler();
    let server = common::component("server", &right, &scheduler);
    let client = common::component("client", &isolated, &scheduler);

    let inbound = server.create_port(PortSpec::inbound(ADDER, Some(adder())));
    inbound.publish().expect("publish");
    let outbound = client.create_port(PortSpec::outbound(ADDER));
    outbound.publish().expect("publish");

    let err = outbound
        .do_connection(inbound.uri(), &ConnectorKey::DIRECT)
        .unwrap_err();
    assert!(matches!(err, PortError::Registry(RegistryError::Unresolvable { .. })));
}
