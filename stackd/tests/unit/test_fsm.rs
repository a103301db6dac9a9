//! FSM unit tests

use stackd::deploy::fsm::{DeploymentFsm, DeploymentPhase, PhaseEvent};

#[test]
fn test_fsm_initial_phase() {
    let fsm = DeploymentFsm::new();
    assert_eq!(fsm.phase(), DeploymentPhase::Validating);
    assert!(fsm.error().is_none());
    assert!(!fsm.requires_rollback());
}

#[test]
fn test_fsm_success_flow() {
    let mut fsm = DeploymentFsm::new();

    // Validating -> NameChecking -> SourceResolving
    fsm.process(PhaseEvent::Advance).unwrap();
    assert_eq!(fsm.phase(), DeploymentPhase::NameChecking);
    fsm.process(PhaseEvent::Advance).unwrap();
    assert_eq!(fsm.phase(), DeploymentPhase::SourceResolving);

    // files on disk from here on
    fsm.process(PhaseEvent::Advance).unwrap();
    assert_eq!(fsm.phase(), DeploymentPhase::PolicyChecking);
    assert!(fsm.phase().is_materialized());

    fsm.process(PhaseEvent::Advance).unwrap();
    assert_eq!(fsm.phase(), DeploymentPhase::CredentialedDeploying);
    fsm.process(PhaseEvent::Advance).unwrap();
    assert_eq!(fsm.phase(), DeploymentPhase::Persisting);

    // Persisting -> Done
    fsm.process(PhaseEvent::Advance).unwrap();
    assert_eq!(fsm.phase(), DeploymentPhase::Done);
    assert!(fsm.phase().is_terminal());
}

#[test]
fn test_fsm_deploy_failure_flow() {
    let mut fsm = DeploymentFsm::new();
    for _ in 0..4 {
        fsm.process(PhaseEvent::Advance).unwrap();
    }
    assert_eq!(fsm.phase(), DeploymentPhase::CredentialedDeploying);

    fsm.process(PhaseEvent::Fail("compose up failed".to_string()))
        .unwrap();
    assert_eq!(fsm.phase(), DeploymentPhase::RollingBack);
    assert_eq!(fsm.error(), Some("compose up failed"));

    // no progress until the directory is gone
    assert!(fsm.process(PhaseEvent::Advance).is_err());
    assert!(fsm.process(PhaseEvent::Fail("again".to_string())).is_err());

    fsm.process(PhaseEvent::RolledBack).unwrap();
    assert_eq!(fsm.phase(), DeploymentPhase::Failed);
    assert_eq!(fsm.error(), Some("compose up failed"));
}

#[test]
fn test_fsm_validation_failure_is_final() {
    let mut fsm = DeploymentFsm::new();
    fsm.process(PhaseEvent::Fail("Invalid stack name".to_string()))
        .unwrap();
    assert_eq!(fsm.phase(), DeploymentPhase::Failed);

    // Failed accepts nothing
    assert!(fsm.process(PhaseEvent::RolledBack).is_err());
    assert!(fsm.process(PhaseEvent::Advance).is_err());
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = DeploymentFsm::new();

    // nothing to roll back before the files exist
    let result = fsm.process(PhaseEvent::RolledBack);
    assert!(result.is_err());
    assert_eq!(fsm.phase(), DeploymentPhase::Validating);
}

#[test]
fn test_fsm_phase_serialization() {
    let phase = serde_json::to_string(&DeploymentPhase::CredentialedDeploying).unwrap();
    assert_eq!(phase, "\"credentialed_deploying\"");
}
