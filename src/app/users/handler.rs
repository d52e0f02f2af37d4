//! 用户 axum 处理器

use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::{input::read_user_form, model::User, model::UserForm, service::UserResource};
use crate::core::{error::UserError, middleware::request_logging_middleware};

#[derive(Clone)]
pub struct AppState {
    pub users: UserResource,
}

/// 请求体与查询串合并后的表单，解码规则见 [`read_user_form`]
pub struct UserInput(pub UserForm);

#[async_trait]
impl<S> FromRequest<S> for UserInput
where
    S: Send + Sync,
{
    type Rejection = UserError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        read_user_form(req).await.map(Self)
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    UserInput(form): UserInput,
) -> Result<(StatusCode, Json<User>), UserError> {
    let user = state.users.create(form).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, UserError> {
    Ok(Json(state.users.list().await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, UserError> {
    Ok(Json(state.users.get(&id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    UserInput(form): UserInput,
) -> Result<Json<User>, UserError> {
    Ok(Json(state.users.update(&id, form).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, UserError> {
    state.users.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 创建路由，`request_timeout` 之后请求被取消并返回 408
pub fn create_routes(users: UserResource, request_timeout: Duration) -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(AppState { users })
}
