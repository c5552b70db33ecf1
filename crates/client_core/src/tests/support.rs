use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use shared::ConnectionConfig;
use tokio::sync::broadcast;

use crate::transport::{Transport, TransportError, TransportEvent, TransportFactory};

#[derive(Clone, Default)]
struct Script {
    connect_failure: Option<String>,
    call_failure: Option<String>,
    disconnect_failure: Option<String>,
    response: Option<Value>,
}

/// Hands out scripted transports and keeps every one it created.
#[derive(Default)]
pub(crate) struct MockTransportFactory {
    script: Mutex<Script>,
    created: Mutex<Vec<Arc<MockTransport>>>,
}

impl MockTransportFactory {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_connects(&self, message: &str) {
        self.script.lock().connect_failure = Some(message.into());
    }

    pub(crate) fn succeed_connects(&self) {
        self.script.lock().connect_failure = None;
    }

    pub(crate) fn fail_calls(&self, message: &str) {
        self.script.lock().call_failure = Some(message.into());
    }

    pub(crate) fn fail_disconnects(&self, message: &str) {
        self.script.lock().disconnect_failure = Some(message.into());
    }

    pub(crate) fn respond_with(&self, response: Value) {
        self.script.lock().response = Some(response);
    }

    pub(crate) fn created(&self) -> usize {
        self.created.lock().len()
    }

    pub(crate) fn transport(&self, index: usize) -> Arc<MockTransport> {
        Arc::clone(&self.created.lock()[index])
    }

    pub(crate) fn latest(&self) -> Arc<MockTransport> {
        let created = self.created.lock();
        Arc::clone(created.last().expect("no transport created yet"))
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self) -> Arc<dyn Transport> {
        let (events, _) = broadcast::channel(64);
        let transport = Arc::new(MockTransport {
            script: self.script.lock().clone(),
            events,
            connects: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
        });
        self.created.lock().push(Arc::clone(&transport));
        transport
    }
}

pub(crate) struct MockTransport {
    script: Script,
    events: broadcast::Sender<TransportEvent>,
    connects: Mutex<Vec<(String, Option<String>)>>,
    calls: Mutex<Vec<(String, Option<Value>)>>,
    disconnects: AtomicUsize,
}

impl MockTransport {
    pub(crate) fn emit(&self, name: &str, payload: Value) {
        let _ = self.events.send(TransportEvent::Event {
            name: name.into(),
            payload,
        });
    }

    pub(crate) fn close(&self, reason: Option<&str>) {
        let _ = self.events.send(TransportEvent::Closed {
            reason: reason.map(str::to_string),
        });
    }

    pub(crate) fn report_error(&self, message: &str) {
        let _ = self.events.send(TransportEvent::Error {
            message: message.into(),
        });
    }

    pub(crate) fn connects(&self) -> Vec<(String, Option<String>)> {
        self.connects.lock().clone()
    }

    pub(crate) fn calls(&self) -> Vec<(String, Option<Value>)> {
        self.calls.lock().clone()
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str, password: Option<&str>) -> Result<(), TransportError> {
        self.connects
            .lock()
            .push((url.to_string(), password.map(str::to_string)));
        match &self.script.connect_failure {
            Some(message) => Err(TransportError::Connect {
                url: url.to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        self.calls.lock().push((method.to_string(), params));
        match &self.script.call_failure {
            Some(message) => Err(TransportError::Call {
                method: method.to_string(),
                message: message.clone(),
            }),
            None => Ok(self
                .script
                .response
                .clone()
                .unwrap_or_else(|| json!({ "requestStatus": { "result": true, "code": 100 } }))),
        }
    }

    fn subscribe_events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        match &self.script.disconnect_failure {
            Some(message) => Err(TransportError::Disconnect(message.clone())),
            None => Ok(()),
        }
    }
}

pub(crate) fn valid_config() -> ConnectionConfig {
    ConnectionConfig::new("127.0.0.1", "4455", "secret")
}

/// Polls `condition` until it holds, failing the test after a while.
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition was not met in time");
}
