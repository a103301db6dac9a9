//! HTTP request handlers

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::response::IntoResponse;
use axum::Json;
use stackd_api::{
    ComposeStackFromFileContentPayload, ComposeStackFromGitRepositoryPayload, StackCreateQuery,
    StackListQuery, StatusResponse, VersionResponse,
};

use crate::deploy::source::CreateComposeStackRequest;
use crate::errors::StackError;
use crate::models::endpoint::EndpointId;
use crate::models::stack::{Pair, Stack, StackId, StackType};
use crate::server::error::ApiError;
use crate::server::extract::AuthenticatedUser;
use crate::server::state::ServerState;
use crate::utils::version_info;

pub async fn status_handler() -> impl IntoResponse {
    let version = version_info();
    Json(StatusResponse {
        status: "healthy".to_string(),
        service: "stackd".to_string(),
        version: version.version,
    })
}

pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// `POST /api/stacks?type=2&method=...&endpointId=N`
pub async fn create_stack_handler(
    State(state): State<Arc<ServerState>>,
    AuthenticatedUser(context): AuthenticatedUser,
    query: Result<Query<StackCreateQuery>, QueryRejection>,
    request: Request,
) -> Result<Json<Stack>, ApiError> {
    let Query(query) = query.map_err(|e| StackError::Validation(e.body_text()))?;

    if StackType::from_code(query.stack_type) != Some(StackType::Compose) {
        return Err(StackError::Validation(
            "Invalid value for query parameter: type. Only compose stacks (2) are supported"
                .to_string(),
        )
        .into());
    }

    let create = match query.method.as_str() {
        "string" => {
            let Json(payload) = Json::<ComposeStackFromFileContentPayload>::from_request(request, &state)
                .await
                .map_err(|e| StackError::Validation(e.body_text()))?;
            CreateComposeStackRequest::from_file_content(payload)
        }
        "repository" => {
            let Json(payload) = Json::<ComposeStackFromGitRepositoryPayload>::from_request(request, &state)
                .await
                .map_err(|e| StackError::Validation(e.body_text()))?;
            CreateComposeStackRequest::from_repository(payload)
        }
        "file" => {
            let multipart = Multipart::from_request(request, &state)
                .await
                .map_err(|e| StackError::Validation(e.body_text()))?;
            read_upload(multipart).await?
        }
        _ => {
            return Err(StackError::Validation(
                "Invalid value for query parameter: method. Value must be one of: string, repository or file"
                    .to_string(),
            )
            .into())
        }
    };

    let stack = state
        .orchestrator
        .create_compose_stack(&context, EndpointId(query.endpoint_id), create)
        .await?;
    Ok(Json(stack))
}

/// Multipart form with `Name`, `file` and an optional JSON `Env` array
async fn read_upload(mut multipart: Multipart) -> Result<CreateComposeStackRequest, StackError> {
    let mut name = String::new();
    let mut content = Vec::new();
    let mut env = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| StackError::Validation(e.body_text()))?
    {
        match field.name() {
            Some("Name") => {
                name = field
                    .text()
                    .await
                    .map_err(|_| StackError::Validation("Invalid stack name".to_string()))?;
            }
            Some("file") => {
                content = field
                    .bytes()
                    .await
                    .map_err(|_| {
                        StackError::Validation(
                            "Invalid Compose file. Ensure that the Compose file is uploaded correctly"
                                .to_string(),
                        )
                    })?
                    .to_vec();
            }
            Some("Env") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|_| StackError::Validation("Invalid Env parameter".to_string()))?;
                if !raw.trim().is_empty() {
                    env = serde_json::from_str::<Vec<Pair>>(&raw)
                        .map_err(|_| StackError::Validation("Invalid Env parameter".to_string()))?;
                }
            }
            _ => {}
        }
    }

    Ok(CreateComposeStackRequest::from_upload(name, content, env))
}

/// `GET /api/stacks[?endpointId=N]`
pub async fn list_stacks_handler(
    State(state): State<Arc<ServerState>>,
    AuthenticatedUser(context): AuthenticatedUser,
    Query(query): Query<StackListQuery>,
) -> Result<Json<Vec<Stack>>, ApiError> {
    let stacks = state
        .orchestrator
        .list_stacks(&context, query.endpoint_id.map(EndpointId))
        .await?;
    Ok(Json(stacks))
}

/// `GET /api/stacks/{id}`
pub async fn inspect_stack_handler(
    State(state): State<Arc<ServerState>>,
    AuthenticatedUser(context): AuthenticatedUser,
    Path(id): Path<u32>,
) -> Result<Json<Stack>, ApiError> {
    let stack = state
        .orchestrator
        .inspect_stack(&context, StackId(id))
        .await?;
    Ok(Json(stack))
}
