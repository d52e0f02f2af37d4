use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use frameworks_crud::app::users::hyper_handler::{self, HyperResponse, HyperRouter};
use frameworks_crud::app::users::input::MAX_BODY_BYTES;
use frameworks_crud::app::users::model::NewUser;
use frameworks_crud::{MemoryUserStore, StoreError, User, UserId, UserResource, UserStore};

fn router() -> HyperRouter {
    let users = UserResource::new(Arc::new(MemoryUserStore::new()));
    HyperRouter::new(users, Duration::from_secs(5)).unwrap()
}

fn request(method: Method, uri: &str, form: Option<&str>) -> Request<Full<Bytes>> {
    let builder = Request::builder().method(method).uri(uri);
    match form {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Full::new(Bytes::from(body.to_owned())))
            .unwrap(),
        None => builder.body(Full::default()).unwrap(),
    }
}

async fn body_json(response: HyperResponse) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_create_update_delete_scenario() {
    let router = router();

    let response = router
        .dispatch(request(Method::POST, "/users", Some("name=Ann&email=ann%40x.com&age=30")))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let created = body_json(response).await;
    assert_eq!(created["id"], 1);
    assert_eq!(created["email"], "ann@x.com");
    assert_eq!(created["age"], 30);

    let response = router.dispatch(request(Method::PUT, "/users/1", Some("age=31"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["age"], 31);
    assert_eq!(updated["name"], "Ann");

    let response = router.dispatch(request(Method::DELETE, "/users/1", None)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router.dispatch(request(Method::GET, "/users/1", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_json_body_and_listing() {
    let router = router();

    let req = Request::builder()
        .method(Method::POST)
        .uri("/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from_static(br#"{"name":"Jo","email":"jo@x.com","age":"7"}"#)))
        .unwrap();
    assert_eq!(router.dispatch(req).await.status(), StatusCode::CREATED);

    let response = router.dispatch(request(Method::GET, "/users", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let list = body_json(response).await;
    assert_eq!(list.as_array().map(Vec::len), Some(1));
    assert_eq!(list[0]["name"], "Jo");
}

#[tokio::test]
async fn test_fields_from_query_string() {
    let router = router();

    let response = router
        .dispatch(request(Method::POST, "/users?name=Ann&email=ann%40x.com&age=30", None))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router.dispatch(request(Method::PUT, "/users/1?age=31", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!((updated["name"].clone(), updated["age"].clone()), (Value::from("Ann"), Value::from(31)));
}

#[tokio::test]
async fn test_oversize_body_is_413() {
    let body = format!("name={}", "a".repeat(MAX_BODY_BYTES));
    let req = Request::builder()
        .method(Method::POST)
        .uri("/users")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Full::new(Bytes::from(body)))
        .unwrap();

    let response = router().dispatch(req).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["error"], "payload_too_large");
}

#[tokio::test]
async fn test_empty_list_is_empty_array() {
    let response = router().dispatch(request(Method::GET, "/users", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, Value::Array(vec![]));
}

#[tokio::test]
async fn test_same_status_codes_as_axum() {
    let router = router();

    let cases = [
        (request(Method::POST, "/users", Some("name=&email=a%40x.com&age=1")), StatusCode::BAD_REQUEST),
        (request(Method::POST, "/users", Some("name=A&email=a%40x.com&age=x")), StatusCode::BAD_REQUEST),
        (request(Method::GET, "/users/abc", None), StatusCode::BAD_REQUEST),
        (request(Method::GET, "/users/5", None), StatusCode::NOT_FOUND),
        (request(Method::PUT, "/users/5", Some("name=B")), StatusCode::NOT_FOUND),
        (request(Method::DELETE, "/users/5", None), StatusCode::NOT_FOUND),
    ];
    for (req, expected) in cases {
        let uri = req.uri().clone();
        assert_eq!(router.dispatch(req).await.status(), expected, "{uri}");
    }
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let router = router();
    let form = "name=Ann&email=ann%40x.com&age=30";

    assert_eq!(router.dispatch(request(Method::POST, "/users", Some(form))).await.status(), StatusCode::CREATED);
    let response = router.dispatch(request(Method::POST, "/users", Some(form))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "conflict");
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let router = router();

    let response = router.dispatch(request(Method::GET, "/accounts", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router.dispatch(request(Method::PATCH, "/users/1", None)).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response).await["error"], "method_not_allowed");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let req = Request::builder()
        .uri("/users")
        .header("x-request-id", "abc-123")
        .body(Full::<Bytes>::default())
        .unwrap();
    let response = router().dispatch(req).await;
    assert_eq!(response.headers()["x-request-id"], "abc-123");
}

struct SlowStore;

#[async_trait]
impl UserStore for SlowStore {
    async fn insert(&self, _user: NewUser) -> Result<User, StoreError> {
        std::future::pending().await
    }
    async fn select_all(&self) -> Result<Vec<User>, StoreError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
    async fn select_by_id(&self, id: UserId) -> Result<User, StoreError> {
        Err(StoreError::NotFound(id))
    }
    async fn update(&self, _user: User) -> Result<User, StoreError> {
        std::future::pending().await
    }
    async fn delete_by_id(&self, _id: UserId) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection reset".to_string()))
    }
}

#[tokio::test]
async fn test_deadlines_and_store_failures() {
    let users = UserResource::new(Arc::new(SlowStore));
    let router = HyperRouter::new(users.clone(), Duration::from_millis(50)).unwrap();

    // 请求级超时
    let response = router.dispatch(request(Method::GET, "/users", None)).await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

    // 存储调用超时先于请求超时触发
    let router = HyperRouter::new(
        users.with_store_timeout(Duration::from_millis(10)),
        Duration::from_secs(5),
    )
    .unwrap();
    let response = router.dispatch(request(Method::GET, "/users", None)).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    let response = router.dispatch(request(Method::DELETE, "/users/1", None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "internal");
    assert!(!body["message"].as_str().unwrap().contains("connection reset"));
}

#[tokio::test]
async fn test_shutdown_closes_idle_keep_alive_connections() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(hyper_handler::serve(listener, Arc::new(router()), async move {
        let _ = stop_rx.await;
    }));

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /users HTTP/1.1\r\nhost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut received = Vec::new();
    let mut chunk = [0u8; 1024];
    while !received.ends_with(b"[]") {
        let n = client.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before the response");
        received.extend_from_slice(&chunk[..n]);
    }
    assert!(received.starts_with(b"HTTP/1.1 200"));

    // 连接空闲时关闭，不用等满排空窗口
    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(client.read(&mut chunk).await.unwrap(), 0);
}
