//! Data ports: pull from a provider, push to a consumer.

use std::sync::Arc;

use mooring::port::{consumer_handler, provider_handler, DataConsumer, DataProvider};
use mooring::prelude::*;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::common;

const READINGS: Capability = Capability::from_static("Readings");

struct Sensor {
    next: Mutex<i64>,
}

impl DataProvider for Sensor {
    fn request(&self) -> Result<Value, InvocationError> {
        let mut next = self.next.lock();
        *next += 10;
        Ok(json!({ "celsius": *next }))
    }
}

#[derive(Clone, Default)]
struct Log {
    seen: Arc<Mutex<Vec<Value>>>,
}

impl DataConsumer for Log {
    fn receive(&self, value: Value) -> Result<(), InvocationError> {
        self.seen.lock().push(value);
        Ok(())
    }
}

#[test]
fn test_pull_and_push_over_one_link() {
    common::init_tracing();
    let fabric = Fabric::new(FabricConfig::local("data"));
    let scheduler = common::owned_scheduler();
    let station = common::component("station", &fabric, &scheduler);
    let display = common::component("display", &fabric, &scheduler);

    let log = Log::default();
    let provider = station.create_port(PortSpec::data_inbound(
        READINGS,
        provider_handler(Sensor {
            next: Mutex::new(0),
        }),
    ));
    let consumer =
        display.create_port(PortSpec::data_outbound(READINGS, consumer_handler(log.clone())));
    provider.publish().expect("publish provider");
    consumer.publish().expect("publish consumer");

    consumer
        .do_connection(provider.uri(), &ConnectorKey::DATA)
        .expect("connect");
    assert!(consumer.connected());
    assert!(provider.connected());
    assert_eq!(provider.peer_uri().as_ref(), Some(consumer.uri()));

    assert_eq!(consumer.pull().expect("pull"), json!({ "celsius": 10 }));
    assert_eq!(consumer.pull().expect("pull"), json!({ "celsius": 20 }));

    provider.push(json!({ "celsius": 99 })).expect("push");
    assert_eq!(log.seen.lock().as_slice(), &[json!({ "celsius": 99 })]);

    // Each side only speaks its own direction.
    assert!(matches!(
        provider.pull(),
        Err(InvocationError::WrongRole { .. })
    ));
    assert!(matches!(
        consumer.push(json!(1)),
        Err(InvocationError::WrongRole { .. })
    ));

    assert!(matches!(
        provider.do_disconnection(),
        Err(PortError::InitiatorOnly { .. })
    ));
    consumer.do_disconnection().expect("disconnect");
    assert!(!provider.connected());
    assert!(matches!(
        provider.push(json!(0)),
        Err(InvocationError::NotConnected { .. })
    ));
}

#[test]
fn test_data_outbound_rejects_plain_inbound() {
    common::init_tracing();
    let fabric = Fabric::new(FabricConfig::local("data"));
    let scheduler = common::owned_scheduler();
    let component = common::component("mixed", &fabric, &scheduler);

    let inbound = component.create_port(PortSpec::inbound(READINGS, None));
    let consumer = component.create_port(PortSpec::data_outbound(
        READINGS,
        consumer_handler(Log::default()),
    ));
    inbound.publish().expect("publish");
    consumer.publish().expect("publish");

    let err = consumer
        .do_connection(inbound.uri(), &ConnectorKey::DATA)
        .unwrap_err();
    assert!(matches!(err, PortError::IncompatibleRoles { .. }));
    assert!(!consumer.connected());
}
