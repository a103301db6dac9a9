//! Finite state machine for a single stack deployment attempt

use serde::Serialize;

/// Deployment phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentPhase {
    /// Decoding and validating the payload, no side effects
    Validating,

    /// Checking the stack name against the endpoint's stacks
    NameChecking,

    /// Writing or cloning the stack files
    SourceResolving,

    /// Checking the stack file against the endpoint security settings
    PolicyChecking,

    /// Running the compose control path inside the credential session
    CredentialedDeploying,

    /// Writing the stack record and its resource control
    Persisting,

    /// Stack deployed and recorded
    Done,

    /// Removing the project directory after a failure
    RollingBack,

    /// Attempt failed
    Failed,
}

impl DeploymentPhase {
    /// Whether the project directory exists on disk in this phase
    pub fn is_materialized(&self) -> bool {
        matches!(
            self,
            DeploymentPhase::PolicyChecking
                | DeploymentPhase::CredentialedDeploying
                | DeploymentPhase::Persisting
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentPhase::Done | DeploymentPhase::Failed)
    }
}

/// Phase event
#[derive(Debug, Clone)]
pub enum PhaseEvent {
    /// Current phase completed successfully
    Advance,

    /// Current phase failed
    Fail(String),

    /// Rollback finished, successfully or not
    RolledBack,
}

/// Deployment FSM
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    phase: DeploymentPhase,
    error: Option<String>,
}

impl DeploymentFsm {
    pub fn new() -> Self {
        Self {
            phase: DeploymentPhase::Validating,
            error: None,
        }
    }

    pub fn phase(&self) -> DeploymentPhase {
        self.phase
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the last failure happened after the stack files were materialized
    pub fn requires_rollback(&self) -> bool {
        self.phase == DeploymentPhase::RollingBack
    }

    /// Process an event and transition
    pub fn process(&mut self, event: PhaseEvent) -> Result<DeploymentPhase, String> {
        use DeploymentPhase::*;

        let next = match (self.phase, &event) {
            (Validating, PhaseEvent::Advance) => NameChecking,
            (NameChecking, PhaseEvent::Advance) => SourceResolving,
            (SourceResolving, PhaseEvent::Advance) => PolicyChecking,
            (PolicyChecking, PhaseEvent::Advance) => CredentialedDeploying,
            (CredentialedDeploying, PhaseEvent::Advance) => Persisting,
            (Persisting, PhaseEvent::Advance) => Done,

            (phase, PhaseEvent::Fail(err)) if !phase.is_terminal() && phase != RollingBack => {
                self.error = Some(err.clone());
                if phase.is_materialized() {
                    RollingBack
                } else {
                    Failed
                }
            }

            (RollingBack, PhaseEvent::RolledBack) => Failed,

            (phase, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", phase, event));
            }
        };

        self.phase = next;
        Ok(next)
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new()
    }
}
