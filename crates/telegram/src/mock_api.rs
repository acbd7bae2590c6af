//! In-process stand-in for the Bot API, served by axum.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::{StatusCode, Uri},
        response::{IntoResponse, Response},
    },
    serde_json::{Value, json},
    tokio::{sync::oneshot, task::JoinHandle},
};

pub(crate) const TOKEN: &str = "test-token";

#[derive(Debug, Clone)]
pub(crate) struct Captured {
    pub method: String,
    pub body: Value,
}

#[derive(Clone, Default)]
struct Shared {
    requests: Arc<Mutex<Vec<Captured>>>,
    updates: Arc<Mutex<VecDeque<Value>>>,
    conflict: Arc<std::sync::atomic::AtomicBool>,
}

pub(crate) struct MockApi {
    shared: Shared,
    url: reqwest::Url,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl MockApi {
    pub async fn start() -> Self {
        let shared = Shared::default();
        let app = Router::new().fallback(handle).with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock telegram api");
        });

        let url = reqwest::Url::parse(&format!("http://{addr}/")).expect("parse api url");
        Self {
            shared,
            url,
            shutdown,
            server,
        }
    }

    pub fn bot(&self) -> teloxide::Bot {
        teloxide::Bot::new(TOKEN).set_api_url(self.url.clone())
    }

    /// Queue an update for the next `getUpdates` call.
    pub fn push_update(&self, update: Value) {
        self.shared
            .updates
            .lock()
            .expect("updates lock")
            .push_back(update);
    }

    /// Make `getUpdates` answer with the "another instance" conflict.
    pub fn fail_updates_with_conflict(&self) {
        self.shared
            .conflict
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.shared.requests.lock().expect("requests lock").clone()
    }

    pub fn calls(&self, method: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method.eq_ignore_ascii_case(method))
            .count()
    }

    pub fn sent_messages(&self) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|r| r.method.eq_ignore_ascii_case("sendMessage"))
            .map(|r| r.body)
            .collect()
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        self.server.await.expect("server join");
    }
}

async fn handle(State(shared): State<Shared>, uri: Uri, body: Bytes) -> Response {
    let path = uri.path();

    if let Some(rest) = path.strip_prefix(&format!("/file/bot{TOKEN}/")) {
        if rest.contains("missing") {
            return StatusCode::NOT_FOUND.into_response();
        }
        return format!("bytes-of:{rest}").into_response();
    }

    let method = path.rsplit('/').next().unwrap_or_default().to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    shared
        .requests
        .lock()
        .expect("requests lock")
        .push(Captured {
            method: method.clone(),
            body: body.clone(),
        });

    let result = match method.to_ascii_lowercase().as_str() {
        "getme" => json!({
            "id": 1,
            "is_bot": true,
            "first_name": "Intake",
            "username": "intake_bot",
            "can_join_groups": true,
            "can_read_all_group_messages": false,
            "supports_inline_queries": false,
            "can_connect_to_business": false,
            "has_main_web_app": false
        }),
        "sendmessage" => json!({
            "message_id": 100,
            "date": 0,
            "chat": { "id": body["chat_id"].as_i64().unwrap_or(42), "type": "private" },
            "text": body["text"].clone()
        }),
        "getfile" => {
            let file_id = body["file_id"].as_str().unwrap_or_default();
            json!({
                "file_id": file_id,
                "file_unique_id": format!("u-{file_id}"),
                "file_size": 16,
                "file_path": format!("documents/{file_id}.bin")
            })
        },
        "getupdates" => {
            if shared.conflict.load(std::sync::atomic::Ordering::SeqCst) {
                return Json(json!({
                    "ok": false,
                    "error_code": 409,
                    "description": "Conflict: terminated by other getUpdates request; make sure that only one bot instance is running"
                }))
                .into_response();
            }
            let pending: Vec<Value> = shared
                .updates
                .lock()
                .expect("updates lock")
                .drain(..)
                .collect();
            if pending.is_empty() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Value::Array(pending)
        },
        _ => Value::Bool(true),
    };

    Json(json!({ "ok": true, "result": result })).into_response()
}
