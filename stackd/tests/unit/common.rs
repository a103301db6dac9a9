//! Shared fixtures: an in-memory store with switchable failures, a real project store in a
//! temporary directory and recording fakes for git and docker.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use stackd::authn::context::RestrictedRequestContext;
use stackd::datastore::json::JsonDataStore;
use stackd::datastore::{
    EndpointStore, RegistryStore, ResourceControlStore, StackStore, StoreError, UserStore,
};
use stackd::deploy::command::CommandError;
use stackd::deploy::compose::ComposeStackManager;
use stackd::deploy::engine::DeploymentEngine;
use stackd::deploy::git::{CloneError, CloneParameters, RepositoryCloner};
use stackd::deploy::orchestrator::StackOrchestrator;
use stackd::deploy::session::{CredentialSession, RegistryAuthenticator};
use stackd::deploy::source::{CreateComposeStackRequest, SourceResolver};
use stackd::filesys::project::{FsProjectStore, ProjectStore};
use stackd::models::endpoint::{
    AccessPolicy, Endpoint, EndpointId, EndpointSecuritySettings, ENDPOINT_ADMIN_ROLE_ID,
};
use stackd::models::registry::{DockerHub, Registry, RegistryId};
use stackd::models::resource_control::{ResourceControl, ResourceControlType};
use stackd::models::stack::{Stack, StackId};
use stackd::models::user::{MembershipRole, TeamId, TeamMembership, User, UserId, UserRole};
use stackd_api::{ComposeStackFromFileContentPayload, ComposeStackFromGitRepositoryPayload};

pub const ADMIN: UserId = UserId(1);
pub const ALICE: UserId = UserId(2);
pub const BOB: UserId = UserId(3);
pub const OPERATOR: UserId = UserId(4);

/// Endpoint 5: alice, bob and operator have access, operator as endpoint administrator.
/// Every security feature is disallowed for regular users.
pub const LOCKED_ENDPOINT: EndpointId = EndpointId(5);

/// Endpoint 6: administrators only
pub const PRIVATE_ENDPOINT: EndpointId = EndpointId(6);

/// Endpoint 7: open to the builders team, nothing restricted
pub const TEAM_ENDPOINT: EndpointId = EndpointId(7);

/// Bob's team
pub const BUILDERS: TeamId = TeamId(1);

/// Registry granted to the builders team
pub const TEAM_REGISTRY: &str = "registry.example.com";

pub const COMPOSE_FILE: &str = "services:\n  web:\n    image: nginx:1.25\n";
pub const PRIVILEGED_COMPOSE_FILE: &str =
    "services:\n  web:\n    image: nginx:1.25\n    privileged: true\n";

/// Ordered log shared by the git and docker fakes
pub type EventLog = Arc<Mutex<Vec<String>>>;

fn unavailable(program: &str) -> CommandError {
    CommandError::Spawn {
        program: program.to_string(),
        source: std::io::Error::other("simulated failure"),
    }
}

// ================================ STORE ===================================== //

/// JSON store with failures that can be switched on per operation
pub struct FlakyStore {
    pub inner: JsonDataStore,
    pub fail_create_stack: AtomicBool,
    pub fail_resource_control: AtomicBool,
}

#[async_trait]
impl StackStore for FlakyStore {
    async fn stacks(&self) -> Result<Vec<Stack>, StoreError> {
        self.inner.stacks().await
    }

    async fn stack(&self, id: StackId) -> Result<Stack, StoreError> {
        self.inner.stack(id).await
    }

    async fn next_identifier(&self) -> Result<StackId, StoreError> {
        self.inner.next_identifier().await
    }

    async fn create_stack(&self, stack: &Stack) -> Result<(), StoreError> {
        if self.fail_create_stack.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.create_stack(stack).await
    }

    async fn delete_stack(&self, id: StackId) -> Result<(), StoreError> {
        self.inner.delete_stack(id).await
    }
}

#[async_trait]
impl ResourceControlStore for FlakyStore {
    async fn create_resource_control(
        &self,
        resource_control: ResourceControl,
    ) -> Result<ResourceControl, StoreError> {
        if self.fail_resource_control.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.create_resource_control(resource_control).await
    }

    async fn resource_controls(&self) -> Result<Vec<ResourceControl>, StoreError> {
        self.inner.resource_controls().await
    }

    async fn resource_control_by_resource_id(
        &self,
        resource_id: &str,
        resource_type: ResourceControlType,
    ) -> Result<ResourceControl, StoreError> {
        self.inner
            .resource_control_by_resource_id(resource_id, resource_type)
            .await
    }
}

#[async_trait]
impl UserStore for FlakyStore {
    async fn user(&self, id: UserId) -> Result<User, StoreError> {
        self.inner.user(id).await
    }

    async fn team_memberships_by_user(&self, id: UserId) -> Result<Vec<TeamMembership>, StoreError> {
        self.inner.team_memberships_by_user(id).await
    }
}

#[async_trait]
impl RegistryStore for FlakyStore {
    async fn registries(&self) -> Result<Vec<Registry>, StoreError> {
        self.inner.registries().await
    }

    async fn docker_hub(&self) -> Result<DockerHub, StoreError> {
        self.inner.docker_hub().await
    }
}

#[async_trait]
impl EndpointStore for FlakyStore {
    async fn endpoint(&self, id: EndpointId) -> Result<Endpoint, StoreError> {
        self.inner.endpoint(id).await
    }
}

// ================================ FAKES ===================================== //

/// Writes the configured compose file into the destination instead of cloning
pub struct FakeCloner {
    pub events: EventLog,
    pub fail: AtomicBool,
    pub content: Mutex<String>,
}

#[async_trait]
impl RepositoryCloner for FakeCloner {
    async fn clone_repository(&self, params: CloneParameters<'_>) -> Result<(), CloneError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("clone {}", params.url));

        // a failing clone still leaves a partial checkout behind
        std::fs::create_dir_all(params.destination.join(".git")).map_err(|e| {
            CloneError::Command(CommandError::Spawn {
                program: "git".to_string(),
                source: e,
            })
        })?;
        if self.fail.load(Ordering::SeqCst) {
            return Err(CloneError::Command(unavailable("git")));
        }

        let content = self.content.lock().unwrap().clone();
        for entry in ["docker-compose.yml", "deploy/compose.yml"] {
            let path = params.destination.join(entry);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, &content).unwrap();
        }
        Ok(())
    }
}

/// Records `up` calls and how many ran at the same time
pub struct FakeCompose {
    pub events: EventLog,
    pub fail: AtomicBool,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub delay: Duration,
}

#[async_trait]
impl ComposeStackManager for FakeCompose {
    async fn up(&self, stack: &Stack, _endpoint: &Endpoint) -> Result<(), CommandError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("up {}", stack.name));

        tokio::time::sleep(self.delay).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("docker"));
        }
        Ok(())
    }
}

pub struct FakeAuthenticator {
    pub events: EventLog,
    pub fail_logout: AtomicBool,
}

#[async_trait]
impl RegistryAuthenticator for FakeAuthenticator {
    async fn login(
        &self,
        server: &str,
        _username: &str,
        _password: &SecretString,
        _endpoint: &Endpoint,
    ) -> Result<(), CommandError> {
        self.events.lock().unwrap().push(format!("login {}", server));
        Ok(())
    }

    async fn logout(&self, _endpoint: &Endpoint) -> Result<(), CommandError> {
        self.events.lock().unwrap().push("logout".to_string());
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(unavailable("logout"));
        }
        Ok(())
    }
}

// =============================== HARNESS ==================================== //

pub struct Harness {
    pub root: PathBuf,
    pub store: Arc<FlakyStore>,
    pub projects: Arc<FsProjectStore>,
    pub events: EventLog,
    pub cloner: Arc<FakeCloner>,
    pub compose: Arc<FakeCompose>,
    pub authenticator: Arc<FakeAuthenticator>,
    pub orchestrator: Arc<StackOrchestrator>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_compose_delay(Duration::from_millis(0)).await
    }

    pub async fn with_compose_delay(delay: Duration) -> Self {
        let root = std::env::temp_dir().join(format!("stackd-it-{}", uuid::Uuid::new_v4()));
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));

        let store = Arc::new(FlakyStore {
            inner: JsonDataStore::in_memory(),
            fail_create_stack: AtomicBool::new(false),
            fail_resource_control: AtomicBool::new(false),
        });
        seed(&store.inner).await;

        let projects = Arc::new(FsProjectStore::new(root.join("compose")));
        let cloner = Arc::new(FakeCloner {
            events: events.clone(),
            fail: AtomicBool::new(false),
            content: Mutex::new(COMPOSE_FILE.to_string()),
        });
        let compose = Arc::new(FakeCompose {
            events: events.clone(),
            fail: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            delay,
        });
        let authenticator = Arc::new(FakeAuthenticator {
            events: events.clone(),
            fail_logout: AtomicBool::new(false),
        });

        let project_store: Arc<dyn ProjectStore> = projects.clone();
        let resolver = SourceResolver::new(project_store.clone(), cloner.clone());
        let engine = DeploymentEngine::new(
            project_store.clone(),
            compose.clone(),
            CredentialSession::new(authenticator.clone()),
        );
        let orchestrator = Arc::new(StackOrchestrator::new(
            store.clone(),
            project_store,
            resolver,
            engine,
        ));

        Self {
            root,
            store,
            projects,
            events,
            cloner,
            compose,
            authenticator,
            orchestrator,
        }
    }

    pub async fn context(&self, user: UserId) -> RestrictedRequestContext {
        let user = self.store.inner.user(user).await.unwrap();
        let memberships = self
            .store
            .inner
            .team_memberships_by_user(user.id)
            .await
            .unwrap();
        RestrictedRequestContext::for_user(&user, memberships)
    }

    /// Stack folders present under the compose root
    pub fn project_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = match std::fs::read_dir(self.projects.root()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        dirs.sort();
        dirs
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub async fn stored_stacks(&self) -> Vec<Stack> {
        self.store.inner.stacks().await.unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

async fn seed(store: &JsonDataStore) {
    for (id, username, role) in [
        (ADMIN, "admin", UserRole::Administrator),
        (ALICE, "alice", UserRole::Standard),
        (BOB, "bob", UserRole::Standard),
        (OPERATOR, "operator", UserRole::Standard),
    ] {
        store
            .upsert_user(User {
                id,
                username: username.to_string(),
                role,
            })
            .await
            .unwrap();
    }

    let mut locked = Endpoint::new(LOCKED_ENDPOINT, "production", "");
    for user in [ALICE, BOB] {
        locked
            .user_access_policies
            .insert(user, AccessPolicy::default());
    }
    locked.user_access_policies.insert(
        OPERATOR,
        AccessPolicy {
            role_id: ENDPOINT_ADMIN_ROLE_ID,
        },
    );
    store.upsert_endpoint(locked).await.unwrap();
    store
        .upsert_endpoint(Endpoint::new(PRIVATE_ENDPOINT, "restricted", ""))
        .await
        .unwrap();

    let mut open = Endpoint::new(TEAM_ENDPOINT, "staging", "tcp://10.0.0.7:2375");
    open.security_settings = EndpointSecuritySettings::permissive();
    open.team_access_policies
        .insert(BUILDERS, AccessPolicy::default());
    store.upsert_endpoint(open).await.unwrap();

    store
        .add_team_membership(TeamMembership {
            user_id: BOB,
            team_id: BUILDERS,
            role: MembershipRole::Member,
        })
        .await
        .unwrap();

    let mut registry = Registry {
        id: RegistryId(1),
        name: "team".to_string(),
        url: TEAM_REGISTRY.to_string(),
        authentication: true,
        username: "builders".to_string(),
        password: "registry-password".to_string(),
        user_access_policies: Default::default(),
        team_access_policies: Default::default(),
    };
    registry
        .team_access_policies
        .insert(BUILDERS, AccessPolicy::default());
    store.upsert_registry(registry).await.unwrap();

    store
        .set_docker_hub(DockerHub {
            authentication: true,
            username: "stackd".to_string(),
            password: "hub-password".to_string(),
        })
        .await
        .unwrap();
}

pub fn inline(name: &str, content: &str) -> CreateComposeStackRequest {
    CreateComposeStackRequest::from_file_content(ComposeStackFromFileContentPayload {
        name: name.to_string(),
        stack_file_content: content.to_string(),
        env: vec![],
    })
}

pub fn repository(name: &str, compose_file_path: &str) -> CreateComposeStackRequest {
    CreateComposeStackRequest::from_repository(ComposeStackFromGitRepositoryPayload {
        name: name.to_string(),
        repository_url: "https://git.example.com/team/app.git".to_string(),
        repository_reference_name: "refs/heads/main".to_string(),
        repository_authentication: true,
        repository_username: "deployer".to_string(),
        repository_password: "repo-password".to_string(),
        compose_file_path_in_repository: compose_file_path.to_string(),
        env: vec![],
    })
}
