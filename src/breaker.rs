//! Circuit breaker: failure containment around every pipeline stage.
//!
//! Records a checkpoint per stage, fails the whole run fast on the first
//! fatal stage error, and writes a structured error manifest to the
//! well-known manifest directory before propagating. Degraded stages
//! (capability fallback) pass through and are only recorded.
//!
//! Manifest writing itself never panics and never masks the original
//! error: a write failure is logged and the fatal error still propagates.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::capability::CapabilitySet;
use crate::config;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{PipelineError, Stage, StageStatus};

// ---------------------------------------------------------------------------
// Run state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Running,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CheckpointStatus {
    Ok,
    Degraded,
    Fatal,
}

/// Audit record for one stage invocation. Created and owned exclusively
/// by the breaker; stages never see it.
#[derive(Debug, Clone, Serialize)]
pub struct SubphaseCheckpoint {
    pub stage: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub status: CheckpointStatus,
    pub capability_flags: Vec<String>,
    pub detail: Option<String>,
}

/// Error manifest emitted on abort.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorManifest {
    pub run_id: String,
    pub stage: String,
    pub error_code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub checkpoints: Vec<SubphaseCheckpoint>,
}

// ---------------------------------------------------------------------------
// Circuit breaker
// ---------------------------------------------------------------------------

pub struct CircuitBreaker {
    run_id: String,
    state: RunState,
    checkpoints: Vec<SubphaseCheckpoint>,
    manifest_dir: Option<PathBuf>,
}

impl CircuitBreaker {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            state: RunState::Running,
            checkpoints: Vec::new(),
            manifest_dir: config::manifest_dir(),
        }
    }

    /// Override the manifest directory (tests, embedding callers).
    pub fn with_manifest_dir(run_id: &str, dir: PathBuf) -> Self {
        Self {
            run_id: run_id.to_string(),
            state: RunState::Running,
            checkpoints: Vec::new(),
            manifest_dir: Some(dir),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn checkpoints(&self) -> &[SubphaseCheckpoint] {
        &self.checkpoints
    }

    /// Run one stage under failure containment.
    ///
    /// Checkpoint first, then fail-fast: on a fatal stage error the run
    /// transitions to `Aborted`, the manifest is written, and a typed
    /// error is returned. Once aborted (or completed) no further stage
    /// will execute.
    pub fn execute(
        &mut self,
        stage: &dyn Stage,
        ctx: &mut PipelineContext,
        caps: &CapabilitySet,
    ) -> Result<(), PipelineError> {
        if self.state != RunState::Running {
            return Err(PipelineError::StageFatal {
                stage: stage.name(),
                code: "run_not_running",
                message: format!("run is {:?}, refusing to execute further stages", self.state),
            });
        }

        let started_at = Utc::now();
        tracing::debug!(run_id = %self.run_id, stage = stage.name(), "Stage starting");

        let outcome = stage.run(ctx, caps);
        let ended_at = Utc::now();

        match outcome {
            Ok(StageStatus::Completed) => {
                self.checkpoints.push(SubphaseCheckpoint {
                    stage: stage.name().to_string(),
                    started_at,
                    ended_at,
                    status: CheckpointStatus::Ok,
                    capability_flags: caps.flags(),
                    detail: None,
                });
                tracing::info!(
                    run_id = %self.run_id,
                    stage = stage.name(),
                    duration_ms = (ended_at - started_at).num_milliseconds(),
                    "Stage completed"
                );
                Ok(())
            }
            Ok(StageStatus::Degraded { reason }) => {
                self.checkpoints.push(SubphaseCheckpoint {
                    stage: stage.name().to_string(),
                    started_at,
                    ended_at,
                    status: CheckpointStatus::Degraded,
                    capability_flags: caps.flags(),
                    detail: Some(reason.clone()),
                });
                tracing::warn!(
                    run_id = %self.run_id,
                    stage = stage.name(),
                    reason = %reason,
                    "Stage completed degraded"
                );
                Ok(())
            }
            Err(err) => {
                self.checkpoints.push(SubphaseCheckpoint {
                    stage: stage.name().to_string(),
                    started_at,
                    ended_at,
                    status: CheckpointStatus::Fatal,
                    capability_flags: caps.flags(),
                    detail: Some(err.message.clone()),
                });
                self.state = RunState::Aborted;

                tracing::error!(
                    run_id = %self.run_id,
                    stage = stage.name(),
                    code = err.code,
                    error = %err.message,
                    "Stage failed fatally, run aborted"
                );

                self.write_manifest(stage.name(), err.code, &err.message);

                Err(PipelineError::StageFatal {
                    stage: stage.name(),
                    code: err.code,
                    message: err.message,
                })
            }
        }
    }

    /// Mark the run complete. Only valid from `Running`.
    pub fn complete(&mut self) {
        if self.state == RunState::Running {
            self.state = RunState::Completed;
        }
    }

    /// Write the error manifest to the well-known path. Never panics;
    /// a write failure is logged and swallowed so the original stage
    /// error still reaches the caller.
    fn write_manifest(&self, stage: &str, error_code: &str, message: &str) {
        let Some(dir) = &self.manifest_dir else {
            tracing::warn!(run_id = %self.run_id, "No manifest directory, manifest not written");
            return;
        };

        let manifest = ErrorManifest {
            run_id: self.run_id.clone(),
            stage: stage.to_string(),
            error_code: error_code.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
            checkpoints: self.checkpoints.clone(),
        };

        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::warn!(path = %dir.display(), error = %e, "Manifest dir creation failed");
            return;
        }

        let path = dir.join(format!("{}-manifest.json", self.run_id));
        match serde_json::to_string_pretty(&manifest) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    tracing::warn!(path = %path.display(), error = %e, "Manifest write failed");
                } else {
                    tracing::info!(path = %path.display(), "Error manifest written");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Manifest serialization failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageError;

    struct OkStage;
    impl Stage for OkStage {
        fn name(&self) -> &'static str {
            "ok_stage"
        }
        fn run(
            &self,
            _ctx: &mut PipelineContext,
            _caps: &CapabilitySet,
        ) -> Result<StageStatus, StageError> {
            Ok(StageStatus::Completed)
        }
    }

    struct DegradedStage;
    impl Stage for DegradedStage {
        fn name(&self) -> &'static str {
            "degraded_stage"
        }
        fn run(
            &self,
            _ctx: &mut PipelineContext,
            _caps: &CapabilitySet,
        ) -> Result<StageStatus, StageError> {
            Ok(StageStatus::Degraded {
                reason: "no signal pack".into(),
            })
        }
    }

    struct FatalStage;
    impl Stage for FatalStage {
        fn name(&self) -> &'static str {
            "fatal_stage"
        }
        fn run(
            &self,
            _ctx: &mut PipelineContext,
            _caps: &CapabilitySet,
        ) -> Result<StageStatus, StageError> {
            Err(StageError::new("boom", "cannot produce a valid result"))
        }
    }

    fn setup(dir: &tempfile::TempDir) -> (CircuitBreaker, PipelineContext, CapabilitySet) {
        let breaker =
            CircuitBreaker::with_manifest_dir("run-breaker-01", dir.path().to_path_buf());
        let ctx = PipelineContext::new("run-breaker-01", 1);
        let caps = CapabilitySet::probe(None);
        (breaker, ctx, caps)
    }

    #[test]
    fn ok_and_degraded_stages_keep_the_run_alive() {
        let dir = tempfile::tempdir().unwrap();
        let (mut breaker, mut ctx, caps) = setup(&dir);

        breaker.execute(&OkStage, &mut ctx, &caps).unwrap();
        breaker.execute(&DegradedStage, &mut ctx, &caps).unwrap();

        assert_eq!(breaker.state(), RunState::Running);
        assert_eq!(breaker.checkpoints().len(), 2);
        assert_eq!(breaker.checkpoints()[0].status, CheckpointStatus::Ok);
        assert_eq!(breaker.checkpoints()[1].status, CheckpointStatus::Degraded);

        breaker.complete();
        assert_eq!(breaker.state(), RunState::Completed);
    }

    #[test]
    fn fatal_stage_aborts_and_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let (mut breaker, mut ctx, caps) = setup(&dir);

        breaker.execute(&OkStage, &mut ctx, &caps).unwrap();
        let err = breaker.execute(&FatalStage, &mut ctx, &caps).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::StageFatal {
                stage: "fatal_stage",
                code: "boom",
                ..
            }
        ));
        assert_eq!(breaker.state(), RunState::Aborted);

        let manifest_path = dir.path().join("run-breaker-01-manifest.json");
        let json = std::fs::read_to_string(manifest_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["stage"], "fatal_stage");
        assert_eq!(value["error_code"], "boom");
        // Checkpoint log includes the prior ok stage and the fatal one.
        assert_eq!(value["checkpoints"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn aborted_breaker_refuses_further_stages() {
        let dir = tempfile::tempdir().unwrap();
        let (mut breaker, mut ctx, caps) = setup(&dir);

        let _ = breaker.execute(&FatalStage, &mut ctx, &caps);
        let err = breaker.execute(&OkStage, &mut ctx, &caps).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StageFatal {
                code: "run_not_running",
                ..
            }
        ));
    }

    #[test]
    fn completing_an_aborted_run_does_not_resurrect_it() {
        let dir = tempfile::tempdir().unwrap();
        let (mut breaker, mut ctx, caps) = setup(&dir);

        let _ = breaker.execute(&FatalStage, &mut ctx, &caps);
        breaker.complete();
        assert_eq!(breaker.state(), RunState::Aborted);
    }
}
