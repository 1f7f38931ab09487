//! Scripted in-process [`ApplicationClient`] and store builders for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::client::{AppTarget, ApplicationClient, GraphQlRequest, OperationKind};
use crate::config::SyncConfig;
use crate::domain::ManualClock;
use crate::error::SyncError;
use crate::persistence::{BootstrapRecordStore, MemoryRecordStore};
use crate::store::AuctionStore;

/// Start time of every test clock, ms since epoch.
pub(crate) const T0: i64 = 10_000_000;

#[derive(Debug, Clone)]
enum Reply {
    Body(String),
    Fail(SyncError),
}

/// One call as the fake saw it.
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub(crate) target: Option<AppTarget>,
    pub(crate) request: GraphQlRequest,
}

#[derive(Debug, Default)]
struct Script {
    queued: HashMap<String, VecDeque<Reply>>,
    standing: HashMap<String, Reply>,
    delays: HashMap<String, Duration>,
    calls: Vec<RecordedCall>,
}

/// Answers requests by root field name from a script.
///
/// Queued replies are used first, in order; then the standing reply for
/// the field. Unscripted fields fail with a transport error.
#[derive(Debug, Default)]
pub(crate) struct FakeClient {
    script: Mutex<Script>,
}

impl FakeClient {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Standing reply `{"data": {field: payload}}`.
    pub(crate) fn respond(&self, field: &str, payload: Value) {
        let body = envelope(field, payload);
        self.script()
            .standing
            .insert(field.to_string(), Reply::Body(body));
    }

    /// One-shot reply used before the standing one.
    pub(crate) fn respond_once(&self, field: &str, payload: Value) {
        let body = envelope(field, payload);
        self.script()
            .queued
            .entry(field.to_string())
            .or_default()
            .push_back(Reply::Body(body));
    }

    /// Standing raw body.
    pub(crate) fn respond_raw(&self, field: &str, body: &str) {
        self.script()
            .standing
            .insert(field.to_string(), Reply::Body(body.to_string()));
    }

    /// Standing failure.
    pub(crate) fn fail(&self, field: &str, error: SyncError) {
        self.script()
            .standing
            .insert(field.to_string(), Reply::Fail(error));
    }

    /// One-shot failure used before the standing reply.
    pub(crate) fn fail_once(&self, field: &str, error: SyncError) {
        self.script()
            .queued
            .entry(field.to_string())
            .or_default()
            .push_back(Reply::Fail(error));
    }

    /// Delays every reply for `field`.
    pub(crate) fn delay(&self, field: &str, delay: Duration) {
        self.script().delays.insert(field.to_string(), delay);
    }

    /// Number of calls made for `field`.
    pub(crate) fn calls(&self, field: &str) -> usize {
        self.script()
            .calls
            .iter()
            .filter(|call| call.request.field() == field)
            .count()
    }

    /// Every call made, in order.
    pub(crate) fn recorded(&self) -> Vec<RecordedCall> {
        self.script().calls.clone()
    }

    /// Names of the mutations sent, in order.
    pub(crate) fn mutations(&self) -> Vec<String> {
        self.script()
            .calls
            .iter()
            .filter(|call| call.request.kind() == OperationKind::Mutation)
            .map(|call| call.request.field().to_string())
            .collect()
    }

    async fn answer(
        &self,
        target: Option<&AppTarget>,
        request: &GraphQlRequest,
    ) -> Result<String, SyncError> {
        let field = request.field().to_string();
        let (reply, delay) = {
            let mut script = self.script();
            script.calls.push(RecordedCall {
                target: target.cloned(),
                request: request.clone(),
            });
            let queued = script.queued.get_mut(&field).and_then(VecDeque::pop_front);
            let reply = queued.or_else(|| script.standing.get(&field).cloned());
            (reply, script.delays.get(&field).copied())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Fail(error)) => Err(error),
            None => Err(SyncError::Transport(format!("unscripted field `{field}`"))),
        }
    }
}

fn envelope(field: &str, payload: Value) -> String {
    let mut data = serde_json::Map::new();
    data.insert(field.to_string(), payload);
    json!({ "data": data }).to_string()
}

#[async_trait]
impl ApplicationClient for FakeClient {
    async fn query(&self, target: &AppTarget, request: &GraphQlRequest) -> Result<String, SyncError> {
        self.answer(Some(target), request).await
    }

    async fn mutate(
        &self,
        target: &AppTarget,
        request: &GraphQlRequest,
    ) -> Result<String, SyncError> {
        self.answer(Some(target), request).await
    }

    async fn system_query(&self, request: &GraphQlRequest) -> Result<String, SyncError> {
        self.answer(None, request).await
    }

    async fn system_mutate(&self, request: &GraphQlRequest) -> Result<String, SyncError> {
        self.answer(None, request).await
    }
}

/// Everything a store test needs, wired together.
#[derive(Debug)]
pub(crate) struct Harness {
    pub(crate) client: Arc<FakeClient>,
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) records: Arc<MemoryRecordStore>,
    pub(crate) store: AuctionStore,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_config(&SyncConfig::default())
    }

    pub(crate) fn with_config(config: &SyncConfig) -> Self {
        let client = FakeClient::new();
        let clock = Arc::new(ManualClock::new(T0));
        let records = Arc::new(MemoryRecordStore::new());
        let store = AuctionStore::with_clock(
            Arc::clone(&client) as Arc<dyn ApplicationClient>,
            Arc::clone(&records) as Arc<dyn BootstrapRecordStore>,
            config,
            Arc::clone(&clock) as Arc<dyn crate::domain::Clock>,
        );
        Self {
            client,
            clock,
            records,
            store,
        }
    }
}
