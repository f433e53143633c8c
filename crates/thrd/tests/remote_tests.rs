//! Remote backend integration tests against a stub peer.
//!
//! The stub implements just enough of the v1 thread API to exercise the
//! proxy paths: create-vs-update on save, the post round trip, narrow
//! refresh, listing, and the role sub-resource.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use thrd::thread::schema::{V1DeleteRole, V1Message, V1PostMessage, V1Thread, V1Threads, V1UpdateThread};
use thrd::{NewMessage, NewThread, RemoteThreadStore, Role, Thread, ThreadError, ThreadQuery};

const TOKEN: &str = "test-token";

type Hub = Arc<Mutex<HashMap<String, V1Thread>>>;

fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

async fn require_token(req: Request, next: Next) -> Result<Response, StatusCode> {
    let authorized = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer test-token");
    if authorized {
        Ok(next.run(req).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

async fn list_threads(
    State(hub): State<Hub>,
    payload: Option<Json<Value>>,
) -> Json<V1Threads> {
    let filter = payload.map(|Json(v)| v).unwrap_or_default();
    let mut threads: Vec<V1Thread> = hub
        .lock()
        .unwrap()
        .values()
        .filter(|t| {
            filter["id"].as_str().is_none_or(|id| t.id == id)
                && filter["owner_id"]
                    .as_str()
                    .is_none_or(|o| t.owner_id.as_deref() == Some(o))
                && filter["public"].as_bool().is_none_or(|p| t.public == p)
                && filter["name"]
                    .as_str()
                    .is_none_or(|n| t.name.as_deref() == Some(n))
        })
        .cloned()
        .collect();
    threads.sort_by(|a, b| b.created.total_cmp(&a.created));
    Json(V1Threads { threads })
}

async fn create_thread(State(hub): State<Hub>, Json(thread): Json<V1Thread>) -> StatusCode {
    hub.lock().unwrap().insert(thread.id.clone(), thread);
    StatusCode::CREATED
}

async fn get_thread(
    State(hub): State<Hub>,
    Path(id): Path<String>,
) -> Result<Json<V1Thread>, StatusCode> {
    hub.lock()
        .unwrap()
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_thread(
    State(hub): State<Hub>,
    Path(id): Path<String>,
    Json(update): Json<V1UpdateThread>,
) -> Result<StatusCode, StatusCode> {
    let mut hub = hub.lock().unwrap();
    let thread = hub.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    thread.name = update.name;
    thread.public = update.public;
    thread.metadata = update.metadata;
    thread.updated = now_seconds();
    Ok(StatusCode::OK)
}

async fn delete_thread(
    State(hub): State<Hub>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    hub.lock()
        .unwrap()
        .remove(&id)
        .map(|_| StatusCode::OK)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn post_message(
    State(hub): State<Hub>,
    Path(id): Path<String>,
    Json(body): Json<V1PostMessage>,
) -> Result<StatusCode, StatusCode> {
    let mut hub = hub.lock().unwrap();
    let thread = hub.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    thread.messages.push(V1Message {
        id: Uuid::new_v4().to_string(),
        role: body.role,
        text: body.msg,
        images: body.images,
        private: Some(false),
        created: now_seconds(),
        metadata: None,
        thread_id: Some(id),
    });
    thread.updated = now_seconds();
    Ok(StatusCode::OK)
}

async fn add_role(
    State(hub): State<Hub>,
    Path(id): Path<String>,
    Json(role): Json<Role>,
) -> Result<StatusCode, StatusCode> {
    let mut hub = hub.lock().unwrap();
    let thread = hub.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    thread.role_mapping.insert(role.name.clone(), role);
    Ok(StatusCode::OK)
}

async fn remove_role(
    State(hub): State<Hub>,
    Path(id): Path<String>,
    Json(body): Json<V1DeleteRole>,
) -> Result<StatusCode, StatusCode> {
    let mut hub = hub.lock().unwrap();
    let thread = hub.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    thread
        .role_mapping
        .remove(&body.name)
        .map(|_| StatusCode::OK)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn spawn_hub() -> (String, Hub) {
    let hub: Hub = Arc::new(Mutex::new(HashMap::new()));
    let app = Router::new()
        .route("/v1/threads", get(list_threads).post(create_thread))
        .route(
            "/v1/threads/{id}",
            get(get_thread).put(update_thread).delete(delete_thread),
        )
        .route("/v1/threads/{id}/msgs", post(post_message))
        .route("/v1/threads/{id}/roles", post(add_role).delete(remove_role))
        .layer(middleware::from_fn(require_token))
        .with_state(hub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), hub)
}

async fn remote_store() -> (Arc<RemoteThreadStore>, Hub, String) {
    let (base_url, hub) = spawn_hub().await;
    let store = Arc::new(RemoteThreadStore::new(&base_url).with_token(TOKEN));
    (store, hub, base_url)
}

#[tokio::test]
async fn save_creates_then_updates() {
    let (store, hub, _) = remote_store().await;

    let mut thread = Thread::create(
        store,
        NewThread::new().owner_id("u1").name("first"),
    )
    .await
    .unwrap();

    {
        let hub = hub.lock().unwrap();
        let stored = hub.get(thread.id()).unwrap();
        assert_eq!(stored.name.as_deref(), Some("first"));
        assert_eq!(stored.owner_id.as_deref(), Some("u1"));
    }

    thread.set_name("second");
    thread.set_metadata(json!({"stage": "renamed"}));
    thread.save().await.unwrap();

    let hub = hub.lock().unwrap();
    let stored = hub.get(thread.id()).unwrap();
    assert_eq!(stored.name.as_deref(), Some("second"));
    assert_eq!(stored.metadata, Some(json!({"stage": "renamed"})));
}

#[tokio::test]
async fn post_round_trips_through_peer() {
    let (store, _, _) = remote_store().await;
    let mut thread = Thread::create(store, NewThread::new()).await.unwrap();

    thread.post(NewMessage::new("user", "hello")).await.unwrap();

    let messages = thread.messages(true);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[0].text, "hello");
    // The peer assigned the identity, not the posting side.
    assert_eq!(messages[0].thread_id.as_deref(), Some(thread.id()));
    assert!(!messages[0].id.is_empty());
}

#[tokio::test]
async fn refresh_scope_is_narrow() {
    let (store, hub, _) = remote_store().await;
    let mut thread = Thread::create(
        store,
        NewThread::new().owner_id("original-owner").name("before"),
    )
    .await
    .unwrap();

    {
        let mut hub = hub.lock().unwrap();
        let stored = hub.get_mut(thread.id()).unwrap();
        stored.name = Some("after".to_string());
        stored.owner_id = Some("someone-else".to_string());
    }

    thread.refresh().await.unwrap();

    // Peer-owned content is overwritten, local identity is not.
    assert_eq!(thread.name(), Some("after"));
    assert_eq!(thread.owner_id(), Some("original-owner"));
}

#[tokio::test]
async fn find_tags_results_with_the_peer() {
    let (store, _, base_url) = remote_store().await;
    for name in ["one", "two"] {
        Thread::create(
            store.clone(),
            NewThread::new().owner_id("owner-a").name(name),
        )
        .await
        .unwrap();
    }
    Thread::create(store.clone(), NewThread::new().owner_id("owner-b"))
        .await
        .unwrap();

    let found = Thread::find(store, &ThreadQuery::new().owner_id("owner-a"))
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    for thread in &found {
        assert_eq!(thread.remote(), Some(base_url.as_str()));
    }
}

#[tokio::test]
async fn role_changes_hit_the_sub_resource() {
    let (store, hub, _) = remote_store().await;
    let mut thread = Thread::create(store, NewThread::new()).await.unwrap();

    thread
        .add_role(Role {
            name: "critic".to_string(),
            user_id: "u9".to_string(),
            user_name: "Nine".to_string(),
            icon: "nine.png".to_string(),
            description: None,
        })
        .await
        .unwrap();
    {
        let hub = hub.lock().unwrap();
        let stored = hub.get(thread.id()).unwrap();
        assert!(stored.role_mapping.contains_key("critic"));
    }

    thread.remove_role("critic").await.unwrap();
    let hub = hub.lock().unwrap();
    let stored = hub.get(thread.id()).unwrap();
    assert!(stored.role_mapping.is_empty());
}

#[tokio::test]
async fn refresh_of_unknown_thread_is_not_found() {
    let (store, hub, _) = remote_store().await;
    let mut thread = Thread::create(store, NewThread::new()).await.unwrap();
    hub.lock().unwrap().clear();

    let err = thread.refresh().await.unwrap_err();
    assert!(matches!(err, ThreadError::NotFound(_)));
}

#[tokio::test]
async fn peer_errors_propagate_with_status() {
    let (store, hub, _) = remote_store().await;
    let thread = Thread::create(store, NewThread::new()).await.unwrap();
    hub.lock().unwrap().clear();

    let err = thread.delete().await.unwrap_err();
    assert!(matches!(err, ThreadError::Api { status: 404, .. }));
}

#[tokio::test]
async fn bad_credential_is_rejected_by_the_peer() {
    let (base_url, _) = spawn_hub().await;
    let store = Arc::new(RemoteThreadStore::new(&base_url).with_token("wrong"));

    let err = Thread::create(store, NewThread::new()).await.unwrap_err();
    assert!(matches!(err, ThreadError::Api { status: 401, .. }));
}
