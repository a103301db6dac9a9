//! Stack creation, listing and inspection against an in-memory store and fake docker

use std::sync::atomic::Ordering;

use stackd::errors::StackError;
use stackd::models::endpoint::EndpointId;
use stackd::models::stack::{StackId, StackStatus};

use crate::common::*;

#[tokio::test]
async fn test_create_from_inline_content() {
    let h = Harness::new().await;
    let ctx = h.context(ALICE).await;

    let stack = h
        .orchestrator
        .create_compose_stack(&ctx, LOCKED_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap();

    assert_eq!(stack.name, "web");
    assert_eq!(stack.endpoint_id, LOCKED_ENDPOINT);
    assert_eq!(stack.entry_point, "docker-compose.yml");
    assert_eq!(stack.status, StackStatus::Active);
    assert_eq!(stack.created_by, "alice");
    assert!(stack.git_config.is_none());

    let rc = stack.resource_control.as_ref().unwrap();
    assert_eq!(rc.resource_id, "5_web");
    assert_eq!(rc.user_accesses.len(), 1);
    assert_eq!(rc.user_accesses[0].user_id, ALICE);

    let content = std::fs::read_to_string(stack.entry_point_path()).unwrap();
    assert_eq!(content, COMPOSE_FILE);
    assert_eq!(h.project_dirs(), vec![stack.id.folder()]);

    let stored = h.stored_stacks().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, stack.id);

    assert_eq!(h.events(), vec!["login docker.io", "up web", "logout"]);
}

#[tokio::test]
async fn test_name_is_normalized() {
    let h = Harness::new().await;
    let ctx = h.context(ALICE).await;

    let stack = h
        .orchestrator
        .create_compose_stack(&ctx, LOCKED_ENDPOINT, inline(" My-Web.App ", COMPOSE_FILE))
        .await
        .unwrap();
    assert_eq!(stack.name, "my-webapp");
}

#[tokio::test]
async fn test_duplicate_name_is_rejected_without_side_effects() {
    let h = Harness::new().await;
    let alice = h.context(ALICE).await;
    let bob = h.context(BOB).await;

    let first = h
        .orchestrator
        .create_compose_stack(&alice, LOCKED_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap();

    // names compare case-insensitively
    let err = h
        .orchestrator
        .create_compose_stack(&bob, LOCKED_ENDPOINT, inline("WEB", "services: {}\n"))
        .await
        .unwrap_err();
    assert!(matches!(err, StackError::Conflict(_)));
    assert_eq!(err.message(), "A stack with the name 'web' is already running");

    // first stack untouched
    assert_eq!(h.project_dirs(), vec![first.id.folder()]);
    let content = std::fs::read_to_string(first.entry_point_path()).unwrap();
    assert_eq!(content, COMPOSE_FILE);
    assert_eq!(h.stored_stacks().await.len(), 1);
    assert_eq!(
        h.events().iter().filter(|e| e.starts_with("up")).count(),
        1
    );
}

#[tokio::test]
async fn test_same_name_on_another_endpoint() {
    let h = Harness::new().await;
    let admin = h.context(ADMIN).await;

    h.orchestrator
        .create_compose_stack(&admin, LOCKED_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap();
    h.orchestrator
        .create_compose_stack(&admin, PRIVATE_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap();

    assert_eq!(h.stored_stacks().await.len(), 2);
    assert_eq!(h.project_dirs().len(), 2);
}

#[tokio::test]
async fn test_invalid_requests_have_no_side_effects() {
    let h = Harness::new().await;
    let ctx = h.context(ALICE).await;

    for (request, reason) in [
        (inline("   ", COMPOSE_FILE), "Invalid stack name"),
        (inline("!!!", COMPOSE_FILE), "Invalid stack name"),
        (inline("web", "  "), "Invalid stack file content"),
        (
            repository("app", "/etc/compose.yml"),
            "Invalid Compose file path. Must be relative to the repository root",
        ),
    ] {
        match h
            .orchestrator
            .create_compose_stack(&ctx, LOCKED_ENDPOINT, request)
            .await
        {
            Err(StackError::Validation(r)) => assert_eq!(r, reason),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    assert!(h.project_dirs().is_empty());
    assert!(h.stored_stacks().await.is_empty());
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn test_endpoint_access() {
    let h = Harness::new().await;
    let alice = h.context(ALICE).await;

    let err = h
        .orchestrator
        .create_compose_stack(&alice, PRIVATE_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap_err();
    assert!(matches!(err, StackError::Forbidden(_)));

    let err = h
        .orchestrator
        .create_compose_stack(&alice, EndpointId(99), inline("web", COMPOSE_FILE))
        .await
        .unwrap_err();
    assert!(matches!(err, StackError::NotFound(_)));

    assert!(h.project_dirs().is_empty());
}

#[tokio::test]
async fn test_create_from_repository() {
    let h = Harness::new().await;
    let ctx = h.context(ALICE).await;

    let stack = h
        .orchestrator
        .create_compose_stack(&ctx, LOCKED_ENDPOINT, repository("app", "deploy/compose.yml"))
        .await
        .unwrap();

    assert_eq!(stack.entry_point, "deploy/compose.yml");
    let git = stack.git_config.as_ref().unwrap();
    assert_eq!(git.url, "https://git.example.com/team/app.git");
    assert_eq!(git.reference_name, "refs/heads/main");
    assert_eq!(git.config_file_path, "deploy/compose.yml");

    // credentials never reach the record
    let stored = serde_json::to_string(&h.stored_stacks().await).unwrap();
    assert!(!stored.contains("repo-password"));
    assert!(!stored.contains("deployer"));

    assert_eq!(
        h.events(),
        vec![
            "clone https://git.example.com/team/app.git",
            "login docker.io",
            "up app",
            "logout"
        ]
    );
}

#[tokio::test]
async fn test_clone_failure_leaves_nothing_behind() {
    let h = Harness::new().await;
    let ctx = h.context(ALICE).await;
    h.cloner.fail.store(true, Ordering::SeqCst);

    let err = h
        .orchestrator
        .create_compose_stack(&ctx, LOCKED_ENDPOINT, repository("app", ""))
        .await
        .unwrap_err();

    assert!(matches!(err, StackError::Storage { .. }));
    assert_eq!(err.message(), "Unable to clone git repository");
    assert!(h.project_dirs().is_empty());
    assert!(h.stored_stacks().await.is_empty());
    assert!(!h.events().iter().any(|e| e.starts_with("up")));
}

#[tokio::test]
async fn test_policy_violation_rolls_back() {
    let h = Harness::new().await;
    let ctx = h.context(ALICE).await;

    let err = h
        .orchestrator
        .create_compose_stack(&ctx, LOCKED_ENDPOINT, inline("web", PRIVILEGED_COMPOSE_FILE))
        .await
        .unwrap_err();

    match &err {
        StackError::PolicyViolation(reason) => assert!(reason.contains("privileged")),
        other => panic!("expected policy violation, got {:?}", other),
    }
    assert!(h.project_dirs().is_empty());
    assert!(h.stored_stacks().await.is_empty());
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn test_administrators_bypass_security_settings() {
    let h = Harness::new().await;

    for (user, name) in [(ADMIN, "admin-web"), (OPERATOR, "operator-web")] {
        let ctx = h.context(user).await;
        h.orchestrator
            .create_compose_stack(&ctx, LOCKED_ENDPOINT, inline(name, PRIVILEGED_COMPOSE_FILE))
            .await
            .unwrap();
    }

    assert_eq!(h.stored_stacks().await.len(), 2);
}

#[tokio::test]
async fn test_team_access_and_registries() {
    let h = Harness::new().await;
    let alice = h.context(ALICE).await;
    let bob = h.context(BOB).await;

    // endpoint granted through bob's team, no restrictions there
    h.orchestrator
        .create_compose_stack(&bob, TEAM_ENDPOINT, inline("web", PRIVILEGED_COMPOSE_FILE))
        .await
        .unwrap();
    assert_eq!(
        h.events(),
        vec![
            format!("login {}", TEAM_REGISTRY),
            "login docker.io".to_string(),
            "up web".to_string(),
            "logout".to_string(),
        ]
    );

    let err = h
        .orchestrator
        .create_compose_stack(&alice, TEAM_ENDPOINT, inline("api", COMPOSE_FILE))
        .await
        .unwrap_err();
    assert!(matches!(err, StackError::Forbidden(_)));
}

#[tokio::test]
async fn test_registries_are_filtered_per_user() {
    let h = Harness::new().await;
    let alice = h.context(ALICE).await;

    h.orchestrator
        .create_compose_stack(&alice, LOCKED_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap();
    assert!(!h.events().iter().any(|e| e.contains(TEAM_REGISTRY)));
}

#[tokio::test]
async fn test_deploy_failure_rolls_back() {
    let h = Harness::new().await;
    let ctx = h.context(ALICE).await;
    h.compose.fail.store(true, Ordering::SeqCst);

    let err = h
        .orchestrator
        .create_compose_stack(&ctx, LOCKED_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap_err();

    assert!(matches!(err, StackError::Deployment { secondary: None, .. }));
    assert!(h.project_dirs().is_empty());
    assert!(h.stored_stacks().await.is_empty());

    // credentials are cleared even though the deployment failed
    assert_eq!(h.events().last().map(String::as_str), Some("logout"));
}

#[tokio::test]
async fn test_logout_failure_is_reported() {
    let h = Harness::new().await;
    let ctx = h.context(ALICE).await;
    h.authenticator.fail_logout.store(true, Ordering::SeqCst);

    let err = h
        .orchestrator
        .create_compose_stack(&ctx, LOCKED_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap_err();
    assert!(err.message().starts_with("Unable to logout from registries"));
    assert!(h.project_dirs().is_empty());

    // a deployment failure keeps its own cause
    h.compose.fail.store(true, Ordering::SeqCst);
    let err = h
        .orchestrator
        .create_compose_stack(&ctx, LOCKED_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap_err();
    match err {
        StackError::Deployment { cause, secondary } => {
            assert!(!cause.starts_with("Unable to logout"));
            assert!(secondary.is_some());
        }
        other => panic!("expected deployment error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_persist_failure_rolls_back() {
    let h = Harness::new().await;
    let ctx = h.context(ALICE).await;
    h.store.fail_create_stack.store(true, Ordering::SeqCst);

    let err = h
        .orchestrator
        .create_compose_stack(&ctx, LOCKED_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap_err();

    assert!(matches!(err, StackError::Persistence { .. }));
    assert!(h.project_dirs().is_empty());
    assert!(h.stored_stacks().await.is_empty());
}

#[tokio::test]
async fn test_resource_control_failure_removes_record() {
    let h = Harness::new().await;
    let ctx = h.context(ALICE).await;
    h.store.fail_resource_control.store(true, Ordering::SeqCst);

    let err = h
        .orchestrator
        .create_compose_stack(&ctx, LOCKED_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap_err();

    assert_eq!(
        err.message(),
        "Unable to persist resource control inside the database"
    );
    assert!(h.project_dirs().is_empty());
    assert!(h.stored_stacks().await.is_empty());

    // the name is free again
    h.store.fail_resource_control.store(false, Ordering::SeqCst);
    h.orchestrator
        .create_compose_stack(&ctx, LOCKED_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_stacks_is_filtered_by_ownership() {
    let h = Harness::new().await;
    let admin = h.context(ADMIN).await;
    let alice = h.context(ALICE).await;
    let bob = h.context(BOB).await;

    h.orchestrator
        .create_compose_stack(&alice, LOCKED_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap();
    h.orchestrator
        .create_compose_stack(&bob, LOCKED_ENDPOINT, inline("api", COMPOSE_FILE))
        .await
        .unwrap();
    h.orchestrator
        .create_compose_stack(&admin, PRIVATE_ENDPOINT, inline("db", COMPOSE_FILE))
        .await
        .unwrap();

    let names = |stacks: Vec<stackd::models::stack::Stack>| {
        let mut names: Vec<String> = stacks.into_iter().map(|s| s.name).collect();
        names.sort();
        names
    };

    let visible = h.orchestrator.list_stacks(&alice, None).await.unwrap();
    assert!(visible.iter().all(|s| s.resource_control.is_some()));
    assert_eq!(names(visible), vec!["web"]);

    let all = h.orchestrator.list_stacks(&admin, None).await.unwrap();
    assert_eq!(names(all), vec!["api", "db", "web"]);

    let on_private = h
        .orchestrator
        .list_stacks(&admin, Some(PRIVATE_ENDPOINT))
        .await
        .unwrap();
    assert_eq!(names(on_private), vec!["db"]);
}

#[tokio::test]
async fn test_inspect_stack() {
    let h = Harness::new().await;
    let admin = h.context(ADMIN).await;
    let alice = h.context(ALICE).await;
    let bob = h.context(BOB).await;

    let stack = h
        .orchestrator
        .create_compose_stack(&alice, LOCKED_ENDPOINT, inline("web", COMPOSE_FILE))
        .await
        .unwrap();

    let inspected = h.orchestrator.inspect_stack(&alice, stack.id).await.unwrap();
    assert_eq!(inspected.name, "web");
    assert!(inspected.resource_control.is_some());

    h.orchestrator.inspect_stack(&admin, stack.id).await.unwrap();

    let err = h.orchestrator.inspect_stack(&bob, stack.id).await.unwrap_err();
    assert!(matches!(err, StackError::Forbidden(_)));

    let err = h
        .orchestrator
        .inspect_stack(&alice, StackId(404))
        .await
        .unwrap_err();
    assert!(matches!(err, StackError::NotFound(_)));
}
