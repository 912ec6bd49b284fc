//! Section-keyed reads and writes against the `content` table.
//!
//! # Load
//!
//! Every stored row replaces its whole section in a copy of the seed tree.
//! Sections without a row keep their seed value. Any failure (store error,
//! malformed row, timeout) yields the seed tree and one failure event.
//!
//! # Persist
//!
//! One upsert per edit, keyed by section, carrying the whole section.
//! Writes are tagged with a per-section revision. A write is dropped when a
//! newer revision of the same section has already landed, and the check and
//! the upsert happen under one per-section lock:
//!
//! ```text
//!   edit rev 1 ──► persist(1) ─────────────── lands? ─► yes, landed = 1
//!   edit rev 2 ──► persist(2) ──► lands ─► landed = 2
//!                                  persist(1) arrives late ─► superseded
//! ```
//!
//! Failed writes are reported, never retried, and never roll back the local
//! tree. The store can fall behind the live tree until the next successful
//! write of that section.
//!
//! # Timeouts
//!
//! A blocking store call cannot be cancelled. When the persist deadline passes
//! the ticket resolves to [`PersistOutcome::TimedOut`] and the event says the
//! write is unconfirmed: an upsert already running may still land. A write
//! that has not started by the deadline is abandoned and never lands.

use super::{
    report::{FailureEvent, FailureSink},
    tree::{ContentNode, ContentTree},
};
use crate::store::{DataStore, Row, StoreError, Table};
use anyhow::bail;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{runtime::Handle, task::JoinHandle, time::timeout};

/// Result of one persist call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Written,
    /// A newer revision of the section had already landed.
    Superseded { landed: u64 },
    Failed,
    /// The deadline passed while the upsert was running; it may still land.
    TimedOut,
}

/// Handle on an in-flight persist. Dropping it does not cancel the write.
#[derive(Debug)]
pub struct PersistTicket {
    section: String,
    revision: u64,
    task: JoinHandle<PersistOutcome>,
}

impl PersistTicket {
    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Wait for the write to finish.
    pub async fn outcome(self) -> PersistOutcome {
        self.task.await.unwrap_or(PersistOutcome::Failed)
    }
}

/// Timeouts bounding store calls.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub load: Duration,
    pub persist: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            load: Duration::from_secs(5),
            persist: Duration::from_secs(5),
        }
    }
}

/// Per-section highest landed revision.
type Landed = Arc<Mutex<u64>>;

#[derive(Clone)]
pub struct ContentStore {
    store: Arc<dyn DataStore>,
    sink: Arc<dyn FailureSink>,
    runtime: Handle,
    timeouts: Timeouts,
    landed: Arc<Mutex<FxHashMap<String, Landed>>>,
}

impl ContentStore {
    pub fn new(
        store: Arc<dyn DataStore>,
        sink: Arc<dyn FailureSink>,
        runtime: Handle,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            store,
            sink,
            runtime,
            timeouts,
            landed: Arc::default(),
        }
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Read all rows and lay them over `seed`.
    ///
    /// Never fails: on any error the seed comes back and the failure is
    /// reported once.
    pub async fn load_all(&self, seed: ContentTree) -> ContentTree {
        let store = Arc::clone(&self.store);
        let read = self
            .runtime
            .spawn_blocking(move || store.read_rows(Table::Content, None));

        let reason = match timeout(self.timeouts.load, read).await {
            Ok(Ok(Ok(rows))) => match merge_rows(&seed, &rows) {
                Ok(tree) => return tree,
                Err(reason) => reason,
            },
            Ok(Ok(Err(err))) => format!("{:#}", anyhow::Error::new(err)),
            Ok(Err(join)) => format!("load task failed: {join}"),
            Err(_) => format!("timed out after {:?}", self.timeouts.load),
        };

        self.sink.report(FailureEvent::Load { reason });
        seed
    }

    /// Upsert the whole `section` object, fire-and-forget.
    ///
    /// `revision` must grow with every edit of the section.
    pub fn persist_section(&self, section: &str, data: &ContentNode, revision: u64) -> PersistTicket {
        let row = content_row(section, data);
        let store = Arc::clone(&self.store);
        let sink = Arc::clone(&self.sink);
        let landed = self.landed_cell(section);
        let limit = self.timeouts.persist;
        let deadline = Instant::now() + limit;
        let name = section.to_owned();

        let task = self.runtime.spawn(async move {
            let write = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
                let mut landed = landed.lock();
                if *landed >= revision {
                    return Ok(PersistOutcome::Superseded { landed: *landed });
                }
                if Instant::now() >= deadline {
                    bail!("deadline passed before the write started");
                }
                store.upsert_row(Table::Content, row, "section")?;
                *landed = revision;
                Ok(PersistOutcome::Written)
            });

            let reason = match timeout(limit, write).await {
                Ok(Ok(Ok(outcome))) => return outcome,
                Ok(Ok(Err(err))) => format!("{err:#}"),
                Ok(Err(join)) => format!("persist task failed: {join}"),
                Err(_) => {
                    sink.report(FailureEvent::PersistUnconfirmed {
                        section: name,
                        revision,
                        after: limit,
                    });
                    return PersistOutcome::TimedOut;
                }
            };
            sink.report(FailureEvent::Persist {
                section: name,
                revision,
                reason,
            });
            PersistOutcome::Failed
        });

        PersistTicket {
            section: section.to_owned(),
            revision,
            task,
        }
    }

    fn landed_cell(&self, section: &str) -> Landed {
        Arc::clone(self.landed.lock().entry(section.to_owned()).or_default())
    }
}

fn content_row(section: &str, data: &ContentNode) -> Row {
    let mut row = Row::new();
    row.insert("section".into(), Value::from(section));
    row.insert("data".into(), data.to_json());
    row.insert(
        "updated_at".into(),
        Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    row
}

/// Replace seed sections with stored ones, section by section.
fn merge_rows(seed: &ContentTree, rows: &[Row]) -> Result<ContentTree, String> {
    rows.iter().try_fold(seed.clone(), |tree, row| {
        let section = row
            .get("section")
            .and_then(Value::as_str)
            .ok_or_else(|| "content row without a section key".to_owned())?;
        let data = row
            .get("data")
            .ok_or_else(|| format!("content row `{section}` without data"))?;
        Ok(tree.with_section(section, ContentNode::from_json(data)))
    })
}
