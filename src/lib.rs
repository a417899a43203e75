use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod access;
pub mod api_envelope;
pub mod config;
pub mod endpoint;
pub mod identity;
pub mod observability;
pub mod project_store;
pub mod web;


use crate::access::{AuthorizationOutcome, ProjectAccess, ProjectListing};
use crate::api_envelope::{
    ApiErrorResponse, internal_error, not_found_error, ok_data, unauthorized_error,
};
use crate::config::Config;
use crate::endpoint::{ResolvedEndpoint, SandboxEndpointResolver};
use crate::identity::{Identity, IdentityResolver, RequestContext};
use crate::observability::{AuditEvent, Observability};
use crate::project_store::{EnvVarRecord, MemoryProjectStore, ProjectDetail, ProjectStore};
use crate::web::{
    EndpointView, EnvVarView, ProjectSummaryView, ProjectView, SessionView, WebBody, WebPage,
};

const SERVICE_NAME: &str = "portside-web-service";
const SESSION_COOKIE_NAME: &str = "ps_session";
const HEADER_REQUEST_ID: &str = "x-request-id";

#[derive(Clone)]
struct AppState {
    identity: IdentityResolver,
    access: ProjectAccess,
    endpoints: SandboxEndpointResolver,
    observability: Observability,
    started_at: SystemTime,
}

pub fn build_router(config: Config) -> Router {
    build_router_with_observability(config, Observability::default())
}

pub fn build_router_with_observability(config: Config, observability: Observability) -> Router {
    let store: Arc<dyn ProjectStore> = Arc::new(MemoryProjectStore::from_config(&config));
    let identity = IdentityResolver::from_config(&config);
    build_router_with_collaborators(config, identity, store, observability)
}

/// Wires the router with explicit collaborators. Tests substitute the
/// session provider and the store here instead of reaching for globals.
pub fn build_router_with_collaborators(
    config: Config,
    identity: IdentityResolver,
    store: Arc<dyn ProjectStore>,
    observability: Observability,
) -> Router {
    let endpoints = SandboxEndpointResolver::from_config(&config);
    let request_timeout = Duration::from_secs(config.request_timeout_seconds);

    let state = AppState {
        identity,
        access: ProjectAccess::new(store),
        endpoints,
        observability,
        started_at: SystemTime::now(),
    };

    Router::new()
        .route("/", get(home_page))
        .route("/healthz", get(health))
        .route("/login", get(login_page))
        .route("/logout", post(logout))
        .route("/auth/error", get(auth_error_page))
        .route("/projects", get(projects_page))
        .route("/projects/:project_id", get(project_overview_page))
        .route("/projects/:project_id/settings", get(project_settings_page))
        .route("/api/v1/projects", get(api_list_projects))
        .route("/api/v1/projects/:project_id", get(api_show_project))
        .fallback(fallback_page)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    session_provider: &'static str,
}

#[derive(Debug, Deserialize)]
struct AuthErrorQuery {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiProject {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ApiEnvVar {
    key: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct ApiProjectDetail {
    project: ApiProject,
    endpoint: ResolvedEndpoint,
    environments: Vec<ApiEnvVar>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = match state.started_at.elapsed() {
        Ok(duration) => duration.as_secs(),
        Err(_) => 0,
    };

    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
        session_provider: state.identity.provider_name(),
    })
}

async fn home_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = match resolve_request_identity(&state, &headers).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    page_response(
        StatusCode::OK,
        &WebPage {
            title: "Portside".to_string(),
            path: "/".to_string(),
            session: session_view(&identity),
            body: WebBody::Home,
        },
    )
}

async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = match resolve_request_identity(&state, &headers).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    if !identity.is_anonymous() {
        return Redirect::temporary("/projects").into_response();
    }

    page_response(
        StatusCode::OK,
        &WebPage {
            title: "Sign in".to_string(),
            path: "/login".to_string(),
            session: None,
            body: WebBody::Login,
        },
    )
}

async fn logout() -> Response {
    let mut response = Redirect::temporary("/").into_response();
    if let Ok(value) = HeaderValue::from_str(&clear_session_cookie()) {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    response
}

/// The error surface is deliberately self-contained: it renders for any
/// caller, signed in or not, and never consults a collaborator.
async fn auth_error_page(Query(query): Query<AuthErrorQuery>) -> Response {
    page_response(
        StatusCode::OK,
        &WebPage {
            title: "Sign-in problem".to_string(),
            path: "/auth/error".to_string(),
            session: None,
            body: WebBody::AuthError { code: query.error },
        },
    )
}

async fn projects_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request_id = request_id(&headers);
    let identity = match resolve_request_identity(&state, &headers).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match state.access.list(&identity).await {
        Ok(ProjectListing::RedirectRequired) => {
            state
                .observability
                .audit(AuditEvent::new("projects.list.redirected", request_id.as_str()));
            Redirect::temporary("/login").into_response()
        }
        Ok(ProjectListing::Projects(projects)) => {
            let projects = projects
                .into_iter()
                .map(|record| ProjectSummaryView {
                    id: record.id,
                    name: record.name,
                    created_at: record.created_at.format("%Y-%m-%d").to_string(),
                })
                .collect();

            page_response(
                StatusCode::OK,
                &WebPage {
                    title: "Projects".to_string(),
                    path: "/projects".to_string(),
                    session: session_view(&identity),
                    body: WebBody::Projects { projects },
                },
            )
        }
        Err(error) => {
            tracing::error!(
                target: "portside.web",
                request_id = request_id.as_str(),
                error = %error,
                "project listing failed",
            );
            server_error_response("/projects")
        }
    }
}

async fn project_overview_page(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/projects/{project_id}");
    match authorize_for_page(&state, &headers, &project_id, &path).await {
        PageAuthorization::Ready {
            identity,
            detail,
            endpoint,
        } => {
            let sandbox_count = detail.sandboxes.len();
            page_response(
                StatusCode::OK,
                &WebPage {
                    title: detail.project.name.clone(),
                    path,
                    session: session_view(&identity),
                    body: WebBody::ProjectOverview {
                        project: project_view(&detail),
                        endpoint: endpoint_view(&endpoint),
                        sandbox_count,
                    },
                },
            )
        }
        PageAuthorization::Response(response) => response,
    }
}

async fn project_settings_page(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/projects/{project_id}/settings");
    match authorize_for_page(&state, &headers, &project_id, &path).await {
        PageAuthorization::Ready {
            identity,
            detail,
            endpoint,
        } => {
            let environments = detail.environments.iter().map(env_var_view).collect();
            page_response(
                StatusCode::OK,
                &WebPage {
                    title: format!("{} settings", detail.project.name),
                    path,
                    session: session_view(&identity),
                    body: WebBody::ProjectSettings {
                        project: project_view(&detail),
                        endpoint: endpoint_view(&endpoint),
                        environments,
                    },
                },
            )
        }
        PageAuthorization::Response(response) => response,
    }
}

enum PageAuthorization {
    Ready {
        identity: Identity,
        detail: ProjectDetail,
        endpoint: ResolvedEndpoint,
    },
    Response(Response),
}

/// Shared gate for the project-scoped pages: identity, then authorization,
/// then endpoint resolution, strictly in that order. Denied outcomes
/// short-circuit before any endpoint work happens.
async fn authorize_for_page(
    state: &AppState,
    headers: &HeaderMap,
    project_id: &str,
    path: &str,
) -> PageAuthorization {
    let request_id = request_id(headers);
    let identity = match resolve_request_identity(state, headers).await {
        Ok(identity) => identity,
        Err(response) => return PageAuthorization::Response(response),
    };

    match state.access.authorize(&identity, project_id).await {
        Ok(AuthorizationOutcome::Unauthenticated) => {
            PageAuthorization::Response(Redirect::temporary("/login").into_response())
        }
        Ok(AuthorizationOutcome::NotFound) => {
            let mut event = AuditEvent::new("project.authorize.denied", request_id.as_str())
                .with_attribute("project_id", project_id);
            if let Some(user_id) = identity.user_id() {
                event = event.with_user_id(user_id);
            }
            state.observability.audit(event);
            PageAuthorization::Response(not_found_response(path))
        }
        Ok(AuthorizationOutcome::Authorized(detail)) => {
            let endpoint = state.endpoints.resolve(&detail);
            if endpoint.synthesized {
                state
                    .observability
                    .increment_counter("endpoint.synthesized", &request_id);
            }
            PageAuthorization::Ready {
                identity,
                detail,
                endpoint,
            }
        }
        Err(error) => {
            tracing::error!(
                target: "portside.web",
                request_id = request_id.as_str(),
                project_id,
                error = %error,
                "project authorization failed",
            );
            PageAuthorization::Response(server_error_response(path))
        }
    }
}

async fn fallback_page() -> Response {
    not_found_response("/")
}

async fn api_list_projects(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiErrorResponse>)> {
    let request_id = request_id(&headers);
    let identity = resolve_api_identity(&state, &headers).await?;

    match state.access.list(&identity).await {
        Ok(ProjectListing::RedirectRequired) => Err(unauthorized_error("Unauthenticated.")),
        Ok(ProjectListing::Projects(projects)) => {
            let projects: Vec<ApiProject> = projects
                .into_iter()
                .map(|record| ApiProject {
                    id: record.id,
                    name: record.name,
                    created_at: record.created_at,
                })
                .collect();
            Ok(ok_data(projects))
        }
        Err(error) => {
            tracing::error!(
                target: "portside.api",
                request_id = request_id.as_str(),
                error = %error,
                "project listing failed",
            );
            Err(internal_error("Service dependency failed."))
        }
    }
}

async fn api_show_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiErrorResponse>)> {
    let request_id = request_id(&headers);
    let identity = resolve_api_identity(&state, &headers).await?;

    match state.access.authorize(&identity, &project_id).await {
        Ok(AuthorizationOutcome::Unauthenticated) => Err(unauthorized_error("Unauthenticated.")),
        Ok(AuthorizationOutcome::NotFound) => Err(not_found_error("Project not found.")),
        Ok(AuthorizationOutcome::Authorized(detail)) => {
            let endpoint = state.endpoints.resolve(&detail);
            if endpoint.synthesized {
                state
                    .observability
                    .increment_counter("endpoint.synthesized", &request_id);
            }
            Ok(ok_data(ApiProjectDetail {
                project: ApiProject {
                    id: detail.project.id.clone(),
                    name: detail.project.name.clone(),
                    created_at: detail.project.created_at,
                },
                endpoint,
                environments: detail
                    .environments
                    .iter()
                    .map(|record| ApiEnvVar {
                        key: record.key.clone(),
                        value: record.value.clone(),
                    })
                    .collect(),
            }))
        }
        Err(error) => {
            tracing::error!(
                target: "portside.api",
                request_id = request_id.as_str(),
                project_id,
                error = %error,
                "project authorization failed",
            );
            Err(internal_error("Service dependency failed."))
        }
    }
}

/// Resolves the request identity for a web surface; provider transport
/// failure becomes the generic error page without leaking provider text.
async fn resolve_request_identity(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Identity, Response> {
    let context = RequestContext::new(session_credential_from_headers(headers));
    state.identity.resolve(&context).await.map_err(|error| {
        tracing::error!(
            target: "portside.web",
            request_id = request_id(headers).as_str(),
            error = %error,
            "identity resolution failed",
        );
        server_error_response("/")
    })
}

async fn resolve_api_identity(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Identity, (StatusCode, Json<ApiErrorResponse>)> {
    let context = RequestContext::new(session_credential_from_headers(headers));
    state.identity.resolve(&context).await.map_err(|error| {
        tracing::error!(
            target: "portside.api",
            request_id = request_id(headers).as_str(),
            error = %error,
            "identity resolution failed",
        );
        internal_error("Service dependency failed.")
    })
}

fn session_view(identity: &Identity) -> Option<SessionView> {
    identity.user_id().map(|user_id| SessionView {
        user_id: user_id.to_string(),
    })
}

fn project_view(detail: &ProjectDetail) -> ProjectView {
    ProjectView {
        id: detail.project.id.clone(),
        name: detail.project.name.clone(),
        created_at: detail.project.created_at.format("%Y-%m-%d").to_string(),
    }
}

fn endpoint_view(endpoint: &ResolvedEndpoint) -> EndpointView {
    EndpointView {
        url: endpoint.url.clone(),
        synthesized: endpoint.synthesized,
    }
}

fn env_var_view(record: &EnvVarRecord) -> EnvVarView {
    EnvVarView {
        key: record.key.clone(),
        value: record.value.clone(),
    }
}

fn page_response(status: StatusCode, page: &WebPage) -> Response {
    let mut response = Html(web::render_page(page)).into_response();
    *response.status_mut() = status;
    response
}

/// The wording is identical whether the project is missing or owned by
/// someone else; foreign ids must not be distinguishable.
fn not_found_response(path: &str) -> Response {
    page_response(
        StatusCode::NOT_FOUND,
        &WebPage {
            title: "Not found".to_string(),
            path: path.to_string(),
            session: None,
            body: WebBody::NotFound,
        },
    )
}

fn server_error_response(path: &str) -> Response {
    page_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &WebPage {
            title: "Something went wrong".to_string(),
            path: path.to_string(),
            session: None,
            body: WebBody::ServerError,
        },
    )
}

fn session_credential_from_headers(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| extract_cookie_value(headers, SESSION_COOKIE_NAME))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

fn extract_cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|part| {
        let (name, value) = part.trim().split_once('=')?;
        if name == cookie_name && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(HEADER_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}
