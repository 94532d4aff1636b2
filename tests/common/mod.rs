//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use serde_json::Value;

use estate_lifecycle::health::{
    Criticality, FnProbe, HealthAggregator, ProbeRegistry, ServiceStatus,
};
use estate_lifecycle::lifecycle::{DrainReport, DrainTarget, ProcessExit};
use estate_lifecycle::resources::Resource;

/// Ordered record of what the shutdown sequence touched.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

/// Records exit codes instead of terminating the test process.
#[derive(Default)]
pub struct RecordingExit {
    codes: Mutex<Vec<i32>>,
}

impl RecordingExit {
    pub fn codes(&self) -> Vec<i32> {
        self.codes.lock().unwrap().clone()
    }
}

impl ProcessExit for RecordingExit {
    fn exit(&self, code: i32) {
        self.codes.lock().unwrap().push(code);
    }
}

/// A resource whose disconnect is logged and can be made to fail.
pub struct FakeResource {
    name: &'static str,
    log: EventLog,
    fail_disconnect: bool,
    pub disconnects: AtomicUsize,
}

impl FakeResource {
    pub fn new(name: &'static str, log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            log,
            fail_disconnect: false,
            disconnects: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &'static str, log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            log,
            fail_disconnect: true,
            disconnects: AtomicUsize::new(0),
        })
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resource for FakeResource {
    fn name(&self) -> &str {
        self.name
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("disconnect:{}", self.name));
        if self.fail_disconnect {
            anyhow::bail!("{} refused to close", self.name);
        }
        Ok(())
    }
}

/// A drain target that only records calls.
pub struct FakeDrain {
    log: EventLog,
    pub stops: AtomicUsize,
}

impl FakeDrain {
    pub fn new(log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            stops: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl DrainTarget for FakeDrain {
    fn stop_accepting(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.log.push("stop_accepting");
    }

    async fn drain(&self, _grace: Duration) -> DrainReport {
        self.log.push("drain");
        DrainReport::default()
    }
}

/// A probe definition for building aggregators in tests.
pub struct FakeProbe {
    pub name: &'static str,
    pub criticality: Criticality,
    pub status: ServiceStatus,
    pub calls: Arc<AtomicUsize>,
}

pub fn probe(name: &'static str, critical: bool, status: ServiceStatus) -> FakeProbe {
    FakeProbe {
        name,
        criticality: Criticality::from_flag(critical),
        status,
        calls: Arc::new(AtomicUsize::new(0)),
    }
}

pub fn aggregator(probes: &[FakeProbe]) -> Arc<HealthAggregator> {
    let mut registry = ProbeRegistry::new();
    for fake in probes {
        let status = fake.status.clone();
        let calls = fake.calls.clone();
        registry
            .register(
                Arc::new(FnProbe::new(fake.name, move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let status = status.clone();
                    async move { status }
                })),
                fake.criticality,
            )
            .unwrap();
    }
    Arc::new(HealthAggregator::new(registry, Duration::from_secs(1)))
}

pub fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
