//! A client and a server component wired for async calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use async_trait::async_trait;
use mooring::prelude::*;
use parking_lot::Mutex;
use serde_json::Value;

use crate::common;

/// Sums integer arguments.
struct Adder;

#[async_trait]
impl CallHandler for Adder {
    async fn execute(
        &self,
        _ctx: CallContext,
        args: Vec<Value>,
        reply: ResultSender,
    ) -> Result<(), CallError> {
        let mut sum = 0i64;
        for arg in &args {
            match arg.as_i64() {
                Some(n) => sum += n,
                None => {
                    return reply
                        .send_error(CallError::InvalidArguments {
                            message: format!("not an integer: {arg}"),
                        })
                        .map_err(execution);
                }
            }
        }
        reply.send_value(&sum).map_err(execution)
    }
}

/// Sleeps `args[0]` milliseconds, then echoes `args[1]`.
struct Delayed;

#[async_trait]
impl CallHandler for Delayed {
    async fn execute(
        &self,
        _ctx: CallContext,
        args: Vec<Value>,
        reply: ResultSender,
    ) -> Result<(), CallError> {
        let millis = args.first().and_then(Value::as_u64).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        reply.send(args.get(1).cloned()).map_err(execution)
    }
}

/// Holds on to every reply so tests can answer calls themselves.
#[derive(Clone, Default)]
pub struct Parking {
    pub parked: Arc<Mutex<Vec<ResultSender>>>,
}

#[async_trait]
impl CallHandler for Parking {
    async fn execute(
        &self,
        _ctx: CallContext,
        _args: Vec<Value>,
        reply: ResultSender,
    ) -> Result<(), CallError> {
        self.parked.lock().push(reply);
        Ok(())
    }
}

impl Parking {
    /// Wait until `count` replies are parked.
    pub async fn wait_for(&self, count: usize) {
        while self.parked.lock().len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Drops its reply unanswered.
struct Forgetful;

#[async_trait]
impl CallHandler for Forgetful {
    async fn execute(
        &self,
        _ctx: CallContext,
        _args: Vec<Value>,
        reply: ResultSender,
    ) -> Result<(), CallError> {
        drop(reply);
        Ok(())
    }
}

/// Waits for the caller to open the gate, then records the thread it ran
/// on and whether the gate was open by then.
#[derive(Clone, Default)]
pub struct Gated {
    pub open: Arc<AtomicBool>,
    pub seen: Arc<Mutex<Option<(ThreadId, bool)>>>,
}

#[async_trait]
impl CallHandler for Gated {
    async fn execute(
        &self,
        _ctx: CallContext,
        _args: Vec<Value>,
        reply: ResultSender,
    ) -> Result<(), CallError> {
        let open = &self.open;
        let waited = tokio::time::timeout(Duration::from_secs(2), async {
            while !open.load(Ordering::Acquire) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        *self.seen.lock() = Some((std::thread::current().id(), waited.is_ok()));
        reply.send_value(&"ran").map_err(execution)
    }
}

fn execution(err: AsyncCallError) -> CallError {
    CallError::Execution {
        message: err.to_string(),
    }
}

pub struct Deployment {
    pub client_component: Arc<Component>,
    pub server_component: Arc<Component>,
    pub client: AsyncCallClient,
    pub server: AsyncCallServer,
    pub parking: Parking,
}

/// Install both plugins, register the test handlers and connect.
pub fn deploy(
    client_fabric: &Arc<Fabric>,
    server_fabric: &Arc<Fabric>,
    scheduler: &Arc<dyn TaskScheduler>,
) -> Deployment {
    common::init_tracing();
    let server_component = common::component("calculator", server_fabric, scheduler);
    let client_component = common::component("caller", client_fabric, scheduler);

    let server =
        AsyncCallServer::install(&server_component, AsyncCallConfig::default()).expect("server");
    let parking = Parking::default();
    server.register_handler("add", Arc::new(Adder)).expect("add");
    server.register_handler("delayed", Arc::new(Delayed)).expect("delayed");
    server
        .register_handler("park", Arc::new(parking.clone()))
        .expect("park");
    server.register_handler("forget", Arc::new(Forgetful)).expect("forget");
    server
        .register_handler(
            "fail",
            handler_fn(|ctx, _args| {
                Err(CallError::Execution {
                    message: format!("{} always fails", ctx.operation()),
                })
            }),
        )
        .expect("fail");

    let client =
        AsyncCallClient::install(&client_component, AsyncCallConfig::default()).expect("client");
    client
        .connect_to_server(server_component.discovery_uri())
        .expect("connect to server");

    Deployment {
        client_component,
        server_component,
        client,
        server,
        parking,
    }
}

/// Both components in one local fabric.
pub fn deploy_local(scheduler: &Arc<dyn TaskScheduler>) -> Deployment {
    let fabric = Fabric::new(FabricConfig::local("async-call"));
    deploy(&fabric, &fabric, scheduler)
}
