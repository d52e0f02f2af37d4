//! 裸 hyper 传输层
//!
//! 不经过 axum：matchit 基数树匹配路径，hyper 负责连接。与 axum 处理器
//! 共用同一个 [`UserResource`] 和同一张错误映射表，状态码和响应体一致。

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{header, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use super::input::read_user_form;
use super::service::UserResource;
use crate::core::error::ErrorResponse;
use crate::core::middleware::{request_id_for, REQUEST_ID_HEADER};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub type HyperResponse = Response<Full<Bytes>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Collection,
    Item,
}

pub struct HyperRouter {
    users: UserResource,
    routes: matchit::Router<Endpoint>,
    request_timeout: Duration,
}

impl HyperRouter {
    pub fn new(users: UserResource, request_timeout: Duration) -> Result<Self, matchit::InsertError> {
        let mut routes = matchit::Router::new();
        routes.insert("/users", Endpoint::Collection)?;
        routes.insert("/users/{id}", Endpoint::Item)?;

        Ok(Self {
            users,
            routes,
            request_timeout,
        })
    }

    /// 处理一个请求；所有失败都在内部转成响应
    pub async fn dispatch<B>(&self, req: Request<B>) -> HyperResponse
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let start = Instant::now();
        let request_id = request_id_for(req.headers());
        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        let mut response = match tokio::time::timeout(self.request_timeout, self.route(req)).await {
            Ok(response) => response,
            Err(_) => error_response(&ErrorResponse::new(
                StatusCode::REQUEST_TIMEOUT,
                "timeout",
                "request timed out",
            )),
        };

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        info!(
            request_id = %request_id,
            method = %method,
            uri = %path,
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request completed"
        );
        response
    }

    async fn route<B>(&self, req: Request<B>) -> HyperResponse
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (endpoint, id) = match self.routes.at(req.uri().path()) {
            Ok(matched) => (
                *matched.value,
                matched.params.get("id").unwrap_or_default().to_owned(),
            ),
            Err(_) => {
                return error_response(&ErrorResponse::new(
                    StatusCode::NOT_FOUND,
                    "not_found",
                    format!("no route for {}", req.uri().path()),
                ))
            }
        };

        let users = &self.users;
        let result = match (endpoint, req.method().clone()) {
            (Endpoint::Collection, Method::GET) => users
                .list()
                .await
                .map(|list| json_response(StatusCode::OK, &list)),
            (Endpoint::Collection, Method::POST) => match read_user_form(req).await {
                Ok(form) => users
                    .create(form)
                    .await
                    .map(|user| json_response(StatusCode::CREATED, &user)),
                Err(err) => Err(err),
            },
            (Endpoint::Item, Method::GET) => users
                .get(&id)
                .await
                .map(|user| json_response(StatusCode::OK, &user)),
            (Endpoint::Item, Method::PUT) => match read_user_form(req).await {
                Ok(form) => users
                    .update(&id, form)
                    .await
                    .map(|user| json_response(StatusCode::OK, &user)),
                Err(err) => Err(err),
            },
            (Endpoint::Item, Method::DELETE) => users.delete(&id).await.map(|()| no_content()),
            (_, method) => {
                return error_response(&ErrorResponse::new(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "method_not_allowed",
                    format!("{method} is not supported here"),
                ))
            }
        };

        result.unwrap_or_else(|err| error_response(&ErrorResponse::from(&err)))
    }
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> HyperResponse {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!("failed to encode response body: {e}");
            let mut response = Response::new(Full::new(Bytes::from_static(b"internal server error")));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

fn error_response(body: &ErrorResponse) -> HyperResponse {
    let status = StatusCode::from_u16(body.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, body)
}

fn no_content() -> HyperResponse {
    let mut response = Response::new(Full::default());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

/// 接受连接直到 `shutdown` 完成，然后通知每个连接在当前请求结束后关闭
pub async fn serve(
    listener: TcpListener,
    router: Arc<HyperRouter>,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "hyper transport listening");

    let builder = ConnBuilder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            biased;
            () = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("accept error: {e}");
                    continue;
                }
            },
        };

        let router = Arc::clone(&router);
        let svc = service_fn(move |req| {
            let router = Arc::clone(&router);
            async move { Ok::<_, Infallible>(router.dispatch(req).await) }
        });

        let conn = graceful.watch(builder.serve_connection(TokioIo::new(stream), svc).into_owned());
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                warn!(%peer, "connection error: {e}");
            }
        });
    }

    drop(listener);
    info!("hyper transport draining connections");
    tokio::select! {
        () = graceful.shutdown() => info!("hyper transport stopped"),
        () = tokio::time::sleep(DRAIN_TIMEOUT) => {
            warn!("connections outlived the drain window, stopping anyway");
        }
    }
    Ok(())
}
