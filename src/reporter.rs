//! Phase status reporting
//!
//! The pipeline awaits the reporter at every phase boundary, so a reporter
//! sees phases strictly in order and never concurrently.

use crate::error::Result;
use crate::types::PipelinePhase;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Sink notified at each pipeline phase transition
///
/// A returned error is logged by the pipeline; the run continues.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, phase: PipelinePhase) -> Result<()>;
}

#[async_trait]
impl<T: StatusReporter + ?Sized> StatusReporter for Arc<T> {
    async fn report(&self, phase: PipelinePhase) -> Result<()> {
        (**self).report(phase).await
    }
}

/// Reporter that emits each phase as a tracing event
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusReporter;

#[async_trait]
impl StatusReporter for LogStatusReporter {
    async fn report(&self, phase: PipelinePhase) -> Result<()> {
        tracing::info!(status = %phase.status_key(), "Marketing assets status");
        Ok(())
    }
}

/// Reporter that records every phase, for tests and diagnostics
#[derive(Debug, Default, Clone)]
pub struct MemoryStatusReporter {
    phases: Arc<Mutex<Vec<PipelinePhase>>>,
}

impl MemoryStatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phases reported so far, in order
    pub async fn phases(&self) -> Vec<PipelinePhase> {
        self.phases.lock().await.clone()
    }

    /// Phases reported so far, as status vocabulary strings
    pub async fn statuses(&self) -> Vec<&'static str> {
        self.phases
            .lock()
            .await
            .iter()
            .map(|phase| phase.as_str())
            .collect()
    }

    pub async fn clear(&self) {
        self.phases.lock().await.clear();
    }
}

#[async_trait]
impl StatusReporter for MemoryStatusReporter {
    async fn report(&self, phase: PipelinePhase) -> Result<()> {
        self.phases.lock().await.push(phase);
        Ok(())
    }
}
