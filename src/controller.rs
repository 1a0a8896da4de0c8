//! Polling controller
//!
//! Lists services from the store, keeps one schedule entry per service and
//! reconciles whatever is due. Services are reconciled one at a time, so a
//! key never has two reconciliations in flight.

use crate::api::ObjectKey;
use crate::config::BackoffConfig;
use crate::reconciler::{Action, Reconciler};
use crate::store::{ObjectStore, StoreError};
use identity::Authenticator;
use std::collections::{BTreeMap, BTreeSet};
use std::thread;
use std::time::{Duration, Instant};

/// Longest a service waits between attempts, whatever the configuration says
const MAX_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// `now + delay`, clamped so a huge configured delay cannot overflow
fn due_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay.min(MAX_DELAY)).unwrap_or(now)
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    due: Instant,
    /// Consecutive failed attempts
    failures: u32,
}

/// Counts for one pass over the due services
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub reconciled: usize,
    pub deferred: usize,
    pub failed: usize,
}

impl TickReport {
    pub fn total(&self) -> usize {
        self.reconciled + self.deferred + self.failed
    }
}

pub struct Controller<S, A> {
    reconciler: Reconciler<S, A>,
    namespace: Option<String>,
    resync: Duration,
    backoff: BackoffConfig,
    entries: BTreeMap<ObjectKey, Entry>,
}

impl<S: ObjectStore, A: Authenticator> Controller<S, A> {
    pub fn new(
        reconciler: Reconciler<S, A>,
        namespace: Option<String>,
        resync: Duration,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            reconciler,
            namespace,
            resync,
            backoff,
            entries: BTreeMap::new(),
        }
    }

    /// Refresh the key set from the store
    fn sync_keys(&mut self, now: Instant) -> Result<(), StoreError> {
        let keys: BTreeSet<ObjectKey> = self
            .reconciler
            .store()
            .list_services(self.namespace.as_deref())?
            .into_iter()
            .map(|s| s.metadata.key())
            .collect();

        self.entries.retain(|key, _| {
            let keep = keys.contains(key);
            if !keep {
                log::debug!("{key}: gone from store, dropping");
            }
            keep
        });
        for key in keys {
            self.entries.entry(key).or_insert(Entry {
                due: now,
                failures: 0,
            });
        }
        Ok(())
    }

    /// Reconcile every service due at `now`
    pub fn tick(&mut self, now: Instant) -> Result<TickReport, StoreError> {
        self.sync_keys(now)?;

        let due: Vec<ObjectKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.due <= now)
            .map(|(key, _)| key.clone())
            .collect();

        let mut report = TickReport::default();
        for key in due {
            let result = self.reconciler.reconcile(&key);
            let Some(entry) = self.entries.get_mut(&key) else {
                continue;
            };

            match result {
                Ok(outcome) => {
                    entry.failures = 0;
                    match outcome.action {
                        Action::Done => {
                            entry.due = due_after(now, self.resync);
                            report.reconciled += 1;
                        }
                        Action::RequeueAfter(delay) => {
                            entry.due = due_after(now, delay);
                            report.deferred += 1;
                        }
                    }
                }
                Err(err) if err.is_conflict() => {
                    log::info!("{key}: {err}, retrying");
                    entry.due = now;
                    report.failed += 1;
                }
                Err(err) => {
                    entry.failures += 1;
                    let delay = self.backoff.delay_for_failures(entry.failures);
                    entry.due = due_after(now, delay);
                    report.failed += 1;

                    let category = err.category();
                    log::warn!(
                        "{key}: {} (attempt {}, retrying in {:?})",
                        error_chain(&err),
                        entry.failures,
                        delay
                    );
                    log::debug!("{key}: {category}: {}", category.advice());
                }
            }
        }
        Ok(report)
    }

    /// Time until the earliest entry is due, if any
    fn until_next_due(&self, now: Instant) -> Option<Duration> {
        self.entries
            .values()
            .map(|e| e.due.saturating_duration_since(now))
            .min()
    }

    /// Run passes until interrupted, or a single pass with `once`
    ///
    /// A store error ends a single pass; the loop logs it and keeps polling.
    pub fn run(&mut self, once: bool, poll: Duration) -> Result<TickReport, StoreError> {
        if once {
            return self.tick(Instant::now());
        }

        loop {
            let now = Instant::now();
            match self.tick(now) {
                Ok(report) if report.total() > 0 => log::info!(
                    "Pass done: {} reconciled, {} deferred, {} failed",
                    report.reconciled,
                    report.deferred,
                    report.failed
                ),
                Ok(_) => {}
                Err(e) => log::error!("Failed to list services: {e}"),
            }

            let wait = self
                .until_next_due(Instant::now())
                .map_or(poll, |d| d.min(poll));
            thread::sleep(wait.max(Duration::from_millis(100)));
        }
    }
}

/// Render an error with its sources, `outer: inner: root`
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
