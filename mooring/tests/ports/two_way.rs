//! Symmetric peer-to-peer ports.

use std::sync::Arc;

use mooring::port::{InboundHandler, Invocation};
use mooring::prelude::*;
use serde_json::{json, Value};

use crate::common;

const CHAT: Capability = Capability::from_static("Chat");

fn named(name: &'static str) -> Arc<dyn InboundHandler> {
    Arc::new(move |inv: Invocation| -> Result<Value, InvocationError> {
        Ok(json!(format!("{name} got {}", inv.operation)))
    })
}

fn peers() -> (Arc<Component>, Arc<Port>, Arc<Port>) {
    common::init_tracing();
    let fabric = Fabric::new(FabricConfig::local("two-way"));
    let scheduler = common::owned_scheduler();
    let component = common::component("peers", &fabric, &scheduler);

    let alice = component.create_port(PortSpec::two_way(CHAT, named("alice")));
    let bob = component.create_port(PortSpec::two_way(CHAT, named("bob")));
    alice.publish().expect("publish alice");
    bob.publish().expect("publish bob");
    (component, alice, bob)
}

#[test]
fn test_both_sides_bind_and_route_to_each_other() {
    let (_component, alice, bob) = peers();
    alice
        .do_connection(bob.uri(), &ConnectorKey::TWO_WAY)
        .expect("connect");

    assert!(alice.connected());
    assert!(bob.connected());

    // The responder sees the reverse pair.
    assert_eq!(alice.client_uri().as_ref(), Some(alice.uri()));
    assert_eq!(alice.server_uri().as_ref(), Some(bob.uri()));
    assert_eq!(bob.client_uri().as_ref(), Some(bob.uri()));
    assert_eq!(bob.server_uri().as_ref(), Some(alice.uri()));
    assert!(alice.is_initiator());
    assert!(!bob.is_initiator());
    assert_eq!(alice.peer_uri().as_ref(), Some(bob.uri()));
    assert_eq!(bob.peer_uri().as_ref(), Some(alice.uri()));

    assert_eq!(
        alice.call(Invocation::new("hi", vec![])).expect("alice to bob"),
        json!("bob got hi")
    );
    assert_eq!(
        bob.call(Invocation::new("hey", vec![])).expect("bob to alice"),
        json!("alice got hey")
    );
}

#[test]
fn test_only_initiator_disconnects() {
    let (_component, alice, bob) = peers();
    alice
        .do_connection(bob.uri(), &ConnectorKey::TWO_WAY)
        .expect("connect");

    let err = bob.do_disconnection().unwrap_err();
    assert!(matches!(err, PortError::NotInitiator { .. }));
    assert!(bob.connected());

    alice.do_disconnection().expect("disconnect");
    assert!(!alice.connected());
    assert!(!bob.connected());
    assert!(matches!(
        bob.call(Invocation::new("hi", vec![])),
        Err(InvocationError::NotConnected { .. })
    ));
}

#[test]
fn test_busy_peer_refuses_second_initiator() {
    let (component, alice, bob) = peers();
    let carol = component.create_port(PortSpec::two_way(CHAT, named("carol")));
    carol.publish().expect("publish carol");

    alice
        .do_connection(bob.uri(), &ConnectorKey::TWO_WAY)
        .expect("connect");
    let err = carol
        .do_connection(bob.uri(), &ConnectorKey::TWO_WAY)
        .unwrap_err();
    assert!(matches!(err, PortError::AlreadyConnected { .. }));

    assert!(!carol.connected());
    assert_eq!(bob.peer_uri().as_ref(), Some(alice.uri()));
}

#[test]
fn test_two_way_rejects_one_way_peer() {
    let (component, alice, _bob) = peers();
    let inbound = component.create_port(PortSpec::inbound(CHAT, Some(named("server"))));
    inbound.publish().expect("publish");

    let err = alice
        .do_connection(inbound.uri(), &ConnectorKey::TWO_WAY)
        .unwrap_err();
    assert!(matches!(err, PortError::IncompatibleRoles { .. }));
    assert!(!alice.connected());
}

#[test]
fn test_shutdown_releases_obeyed_link() {
    common::init_tracing();
    let fabric = Fabric::new(FabricConfig::local("two-way-shutdown"));
    let scheduler = common::owned_scheduler();
    let left = common::component("left", &fabric, &scheduler);
    let right = common::component("right", &fabric, &scheduler);

    let alice = left.create_port(PortSpec::two_way(CHAT, named("alice")));
    let bob = right.create_port(PortSpec::two_way(CHAT, named("bob")));
    alice.publish().expect("publish alice");
    bob.publish().expect("publish bob");
    alice
        .do_connection(bob.uri(), &ConnectorKey::TWO_WAY)
        .expect("connect");

    right.shutdown();
    assert!(bob.is_destroyed());
    assert_eq!(right.port_count(), 0);
    assert!(fabric.registry().get(bob.uri()).is_none());

    assert!(matches!(
        alice.call(Invocation::new("hi", vec![])),
        Err(InvocationError::Unavailable { .. })
    ));
    // The peer is gone, so the initiator only clears its own side.
    assert!(alice.do_disconnection().is_err());
    assert!(!alice.connected());
}
