//! In-memory collaborators for session tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::database::repositories::{MediaStore, PlanPolicyProvider, UsageLedger};
use crate::domain::{MediaItem, MediaType, PlanPolicy};
use crate::engine::{
    EncodingEngine, EngineEvent, EngineHandle, EngineProgress, EngineReporter, engine_channel,
};
use crate::input::InputPlan;
use crate::{Error, Result};

type ReporterSlot = Arc<parking_lot::Mutex<Option<EngineReporter>>>;

/// Engine whose jobs are driven by the test.
///
/// Launches and terminations are recorded in order in `log`.
#[derive(Default)]
pub(crate) struct ScriptedEngine {
    log: Arc<parking_lot::Mutex<Vec<String>>>,
    jobs: parking_lot::Mutex<Vec<ReporterSlot>>,
    launches: AtomicUsize,
    pub reject_next: AtomicBool,
}

impl ScriptedEngine {
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn slot(&self, job: usize) -> ReporterSlot {
        self.jobs.lock()[job].clone()
    }

    /// Report progress for the job launched `job`-th (zero based).
    pub fn progress(&self, job: usize, elapsed_secs: f64) {
        let slot = self.slot(job);
        let guard = slot.lock();
        let reporter = guard.as_ref().unwrap();
        assert!(reporter.report_progress(EngineProgress {
            elapsed_secs,
            bitrate_kbps: Some(3000.0),
            speed: Some(1.0),
        }));
    }

    pub async fn finish(&self, job: usize, outcome: EngineEvent) {
        let reporter = self.slot(job).lock().take().unwrap();
        reporter.finish(outcome).await;
    }
}

#[async_trait]
impl EncodingEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn launch(&self, plan: &InputPlan, _destination: &str) -> Result<EngineHandle> {
        if self.reject_next.swap(false, Ordering::SeqCst) {
            return Err(Error::engine("binary not found"));
        }

        let job = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.lock().push(format!("launch:{}:{}", job, plan.kind()));

        let (handle, reporter) = engine_channel(format!("job-{}", job));
        let token = reporter.cancellation_token();
        let slot: ReporterSlot = Arc::new(parking_lot::Mutex::new(Some(reporter)));
        self.jobs.lock().push(slot.clone());

        let log = self.log.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            log.lock().push(format!("terminate:{}", job));
            let reporter = slot.lock().take();
            if let Some(reporter) = reporter {
                reporter.finish(EngineEvent::Terminated).await;
            }
        });

        Ok(handle)
    }

    fn is_available(&self) -> bool {
        true
    }

    fn version(&self) -> Option<String> {
        Some("scripted 1.0".to_string())
    }
}

#[derive(Default)]
pub(crate) struct MemoryLedger {
    usage: parking_lot::Mutex<HashMap<String, u64>>,
    pub increments: parking_lot::Mutex<Vec<u64>>,
}

impl MemoryLedger {
    pub fn with_usage(account_id: &str, usage: u64) -> Self {
        let ledger = Self::default();
        ledger.usage.lock().insert(account_id.to_string(), usage);
        ledger
    }
}

#[async_trait]
impl UsageLedger for MemoryLedger {
    async fn get_usage(&self, account_id: &str) -> Result<u64> {
        Ok(self.usage.lock().get(account_id).copied().unwrap_or(0))
    }

    async fn add_usage(&self, account_id: &str, delta_secs: u64) -> Result<u64> {
        self.increments.lock().push(delta_secs);
        let mut usage = self.usage.lock();
        let total = usage.entry(account_id.to_string()).or_insert(0);
        *total += delta_secs;
        Ok(*total)
    }

    async fn reset_usage(&self, account_id: &str) -> Result<()> {
        self.usage.lock().insert(account_id.to_string(), 0);
        Ok(())
    }
}

pub(crate) struct FixedPolicy(pub PlanPolicy);

#[async_trait]
impl PlanPolicyProvider for FixedPolicy {
    async fn get_policy(&self, _account_id: &str) -> Result<PlanPolicy> {
        Ok(self.0.clone())
    }
}

pub(crate) struct MemoryMedia(pub Vec<MediaItem>);

#[async_trait]
impl MediaStore for MemoryMedia {
    async fn find_items(&self, account_id: &str, ids: &[String]) -> Result<Vec<MediaItem>> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.0
                    .iter()
                    .find(|item| &item.id == id && item.account_id == account_id)
                    .cloned()
            })
            .collect())
    }

    async fn find_item(&self, account_id: &str, id: &str) -> Result<Option<MediaItem>> {
        Ok(self
            .0
            .iter()
            .find(|item| item.id == id && item.account_id == account_id)
            .cloned())
    }
}

/// A media item owned by account `acc` under `/media`.
pub(crate) fn item(id: &str, media_type: MediaType) -> MediaItem {
    let extension = match media_type {
        MediaType::Video => "mp4",
        MediaType::Audio => "mp3",
        MediaType::Image => "jpg",
    };
    let filename = format!("{}.{}", id, extension);
    MediaItem {
        id: id.to_string(),
        account_id: "acc".to_string(),
        path: PathBuf::from("/media").join(&filename),
        filename,
        size_bytes: 1024,
        media_type,
    }
}
