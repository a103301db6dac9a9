//! Stack deployment orchestration
//!
//! Drives one creation attempt through the [`DeploymentFsm`] phases: validate the request,
//! check the name, materialize the source, check the security policy, deploy under the
//! credential session and persist. Any failure after the files exist removes them again.

use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::authn::access::{
    authorized_endpoint_access, decorate_stacks, filter_authorized_stacks, filter_registries,
    user_can_access_resource,
};
use crate::authn::context::RestrictedRequestContext;
use crate::datastore::{DataStore, StoreError};
use crate::deploy::engine::{DeploymentConfig, DeploymentEngine};
use crate::deploy::fsm::{DeploymentFsm, PhaseEvent};
use crate::deploy::names::{is_unique_name, normalize_stack_name};
use crate::deploy::rollback::RollbackGuard;
use crate::deploy::source::{CreateComposeStackRequest, SourceResolver};
use crate::errors::StackError;
use crate::filesys::project::ProjectStore;
use crate::models::endpoint::{Endpoint, EndpointId};
use crate::models::resource_control::{ResourceControl, ResourceControlType};
use crate::models::stack::{Stack, StackId};

pub struct StackOrchestrator {
    store: Arc<dyn DataStore>,
    projects: Arc<dyn ProjectStore>,
    resolver: SourceResolver,
    engine: DeploymentEngine,
}

impl StackOrchestrator {
    pub fn new(
        store: Arc<dyn DataStore>,
        projects: Arc<dyn ProjectStore>,
        resolver: SourceResolver,
        engine: DeploymentEngine,
    ) -> Self {
        Self {
            store,
            projects,
            resolver,
            engine,
        }
    }

    /// Create and deploy a compose stack on `endpoint_id`
    pub async fn create_compose_stack(
        &self,
        context: &RestrictedRequestContext,
        endpoint_id: EndpointId,
        request: CreateComposeStackRequest,
    ) -> Result<Stack, StackError> {
        let deployment_id = Uuid::new_v4();
        let span = info_span!(
            "deploy_stack",
            stack = %request.name,
            endpoint = %endpoint_id,
            deployment_id = %deployment_id,
        );

        let mut fsm = DeploymentFsm::new();
        let result = self
            .run_attempt(&mut fsm, context, endpoint_id, request)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &result {
            Ok(stack) => info!("Stack {} created with id {}", stack.name, stack.id),
            Err(e) => warn!("Stack creation failed in phase {:?}: {}", fsm.phase(), e),
        });
        result
    }

    async fn run_attempt(
        &self,
        fsm: &mut DeploymentFsm,
        context: &RestrictedRequestContext,
        endpoint_id: EndpointId,
        mut request: CreateComposeStackRequest,
    ) -> Result<Stack, StackError> {
        // validating
        let endpoint = step(fsm, self.validate(context, endpoint_id, &mut request).await)?;

        // name checking
        step(fsm, self.check_name(&endpoint, &request.name).await)?;

        // source resolving
        let stack_id = self
            .store
            .next_identifier()
            .await
            .map_err(|e| StackError::persistence("Unable to allocate a stack identifier", e));
        let stack_id = step_fail_only(fsm, stack_id)?;
        let resolved = step(fsm, self.resolver.resolve(stack_id, &request.source).await)?;

        let mut guard = RollbackGuard::arm(self.projects.clone(), &resolved.project_path);

        let mut stack = Stack::new_compose(
            stack_id,
            request.name,
            endpoint.id,
            resolved.entry_point,
            request.env,
        );
        stack.project_path = resolved.project_path.to_string_lossy().into_owned();
        stack.git_config = resolved.git_config;

        let outcome = self.deploy_and_persist(fsm, context, stack, endpoint).await;
        match outcome {
            Ok(stack) => {
                guard.disarm();
                Ok(stack)
            }
            Err(e) => {
                guard.rollback().await;
                record(fsm, PhaseEvent::RolledBack);
                Err(e)
            }
        }
    }

    async fn deploy_and_persist(
        &self,
        fsm: &mut DeploymentFsm,
        context: &RestrictedRequestContext,
        mut stack: Stack,
        endpoint: Endpoint,
    ) -> Result<Stack, StackError> {
        // policy checking
        let config = self.deployment_config(context, &stack, endpoint).await;
        let config = step_fail_only(fsm, config)?;
        stack.created_by = config.user.username.clone();
        step(fsm, self.engine.check_policy(&config).await)?;

        // credentialed deploying
        step(fsm, self.engine.deploy(&config).await)?;

        // persisting
        let stack = step(fsm, self.persist(context, stack).await)?;
        Ok(stack)
    }

    async fn validate(
        &self,
        context: &RestrictedRequestContext,
        endpoint_id: EndpointId,
        request: &mut CreateComposeStackRequest,
    ) -> Result<Endpoint, StackError> {
        request.validate()?;

        request.name = normalize_stack_name(&request.name);
        if request.name.is_empty() {
            return Err(StackError::Validation("Invalid stack name".to_string()));
        }

        let endpoint = self.load_endpoint(endpoint_id).await?;
        if !authorized_endpoint_access(&endpoint, context) {
            return Err(StackError::Forbidden(
                "Permission denied to access endpoint".to_string(),
            ));
        }
        Ok(endpoint)
    }

    async fn check_name(&self, endpoint: &Endpoint, name: &str) -> Result<(), StackError> {
        let unique = is_unique_name(self.store.as_ref(), endpoint.id, name, None)
            .await
            .map_err(|e| StackError::storage("Unable to check for name collision", e))?;
        if !unique {
            return Err(name_conflict(name));
        }
        Ok(())
    }

    async fn deployment_config(
        &self,
        context: &RestrictedRequestContext,
        stack: &Stack,
        endpoint: Endpoint,
    ) -> Result<DeploymentConfig, StackError> {
        let docker_hub = self.store.docker_hub().await.map_err(|e| {
            StackError::persistence("Unable to retrieve DockerHub details from the database", e)
        })?;

        let registries = self.store.registries().await.map_err(|e| {
            StackError::persistence("Unable to retrieve registries from the database", e)
        })?;

        let user = self.store.user(context.user_id).await.map_err(|e| {
            StackError::persistence("Unable to load user information from the database", e)
        })?;

        Ok(DeploymentConfig {
            stack: stack.clone(),
            endpoint,
            docker_hub,
            registries: filter_registries(registries, context),
            context: context.clone(),
            user,
        })
    }

    async fn persist(
        &self,
        context: &RestrictedRequestContext,
        mut stack: Stack,
    ) -> Result<Stack, StackError> {
        if let Err(e) = self.store.create_stack(&stack).await {
            return Err(match e {
                StoreError::Conflict(_) => name_conflict(&stack.name),
                e => StackError::persistence("Unable to persist the stack inside the database", e),
            });
        }

        let resource_control = ResourceControl::new_private(
            stack.resource_id(),
            ResourceControlType::Stack,
            context.user_id,
        );
        match self.store.create_resource_control(resource_control).await {
            Ok(resource_control) => {
                stack.resource_control = Some(resource_control);
                Ok(stack)
            }
            Err(e) => {
                if let Err(delete_err) = self.store.delete_stack(stack.id).await {
                    error!(
                        "Unable to remove stack record {} after resource control failure: {}",
                        stack.id, delete_err
                    );
                }
                Err(StackError::persistence(
                    "Unable to persist resource control inside the database",
                    e,
                ))
            }
        }
    }

    async fn load_endpoint(&self, endpoint_id: EndpointId) -> Result<Endpoint, StackError> {
        self.store.endpoint(endpoint_id).await.map_err(|e| {
            if e.is_not_found() {
                StackError::NotFound("Unable to find an endpoint with the specified identifier inside the database".to_string())
            } else {
                StackError::persistence("Unable to find an endpoint with the specified identifier inside the database", e)
            }
        })
    }

    /// Stacks the caller may see, optionally restricted to one endpoint
    pub async fn list_stacks(
        &self,
        context: &RestrictedRequestContext,
        endpoint_id: Option<EndpointId>,
    ) -> Result<Vec<Stack>, StackError> {
        let stacks = self
            .store
            .stacks()
            .await
            .map_err(|e| StackError::persistence("Unable to retrieve stacks from the database", e))?;
        let resource_controls = self.store.resource_controls().await.map_err(|e| {
            StackError::persistence("Unable to retrieve resource controls from the database", e)
        })?;

        let stacks: Vec<Stack> = stacks
            .into_iter()
            .filter(|s| endpoint_id.is_none_or(|id| s.endpoint_id == id))
            .collect();
        let stacks = decorate_stacks(stacks, &resource_controls);
        let visible = filter_authorized_stacks(stacks, context);

        debug!("Listing {} stacks for user {}", visible.len(), context.user_id);
        Ok(visible)
    }

    /// One stack, decorated with its resource control
    pub async fn inspect_stack(
        &self,
        context: &RestrictedRequestContext,
        id: StackId,
    ) -> Result<Stack, StackError> {
        let stack = self.store.stack(id).await.map_err(|e| {
            if e.is_not_found() {
                StackError::NotFound("Unable to find a stack with the specified identifier inside the database".to_string())
            } else {
                StackError::persistence("Unable to find a stack with the specified identifier inside the database", e)
            }
        })?;

        let endpoint = self.load_endpoint(stack.endpoint_id).await?;
        if !authorized_endpoint_access(&endpoint, context) {
            return Err(StackError::Forbidden(
                "Permission denied to access endpoint".to_string(),
            ));
        }

        let resource_control = match self
            .store
            .resource_control_by_resource_id(&stack.resource_id(), ResourceControlType::Stack)
            .await
        {
            Ok(rc) => Some(rc),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                return Err(StackError::persistence(
                    "Unable to retrieve a resource control associated to the stack",
                    e,
                ))
            }
        };

        if !context.is_admin
            && !resource_control
                .as_ref()
                .is_some_and(|rc| user_can_access_resource(rc, context))
        {
            return Err(StackError::Forbidden(
                "Access denied to resource".to_string(),
            ));
        }

        let mut stack = stack;
        stack.resource_control = resource_control;
        Ok(stack)
    }
}

fn name_conflict(name: &str) -> StackError {
    StackError::Conflict(format!(
        "A stack with the name '{}' is already running",
        name
    ))
}

/// Feed an event to the FSM, logging a rejected transition
fn record(fsm: &mut DeploymentFsm, event: PhaseEvent) -> bool {
    match fsm.process(event) {
        Ok(_) => true,
        Err(e) => {
            error!("Deployment phase tracking out of step: {}", e);
            false
        }
    }
}

/// Record the outcome of the current phase
fn step<T>(fsm: &mut DeploymentFsm, result: Result<T, StackError>) -> Result<T, StackError> {
    match &result {
        Ok(_) => record(fsm, PhaseEvent::Advance),
        Err(e) => record(fsm, PhaseEvent::Fail(e.to_string())),
    };
    result
}

/// Record a failure inside the current phase without completing it
fn step_fail_only<T>(
    fsm: &mut DeploymentFsm,
    result: Result<T, StackError>,
) -> Result<T, StackError> {
    if let Err(e) = &result {
        record(fsm, PhaseEvent::Fail(e.to_string()));
    }
    result
}
