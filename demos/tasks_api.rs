//! Task-management API demo with the full logging pipeline attached.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example tasks_api
//!
//! Try:
//!   curl http://localhost:3000/api/health
//!   curl -H 'x-request-id: abc123' http://localhost:3000/api/tasks
//!   curl -X POST http://localhost:3000/api/tasks \
//!        -H 'content-type: application/json' \
//!        -d '{"title":"write the runbook"}'
//!   curl -X PUT http://localhost:3000/api/tasks/1 \
//!        -H 'content-type: application/json' \
//!        -d '{"title":"write the runbook","completed":true}'
//!   curl -X DELETE http://localhost:3000/api/tasks/1
//!
//! Then look at `logs/access.log` and the JSON lines on stdout.
//!
//! Storage is an in-memory map; swap in a real database client where the
//! `Store` methods lock the map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tatami::middleware::{AccessLog, Logging, RequestLogger};
use tatami::{Request, Response, Router, Server, StatusCode, health};

#[derive(Clone, Serialize)]
struct Task {
    id: u64,
    title: String,
    completed: bool,
}

#[derive(Deserialize)]
struct TaskInput {
    title: String,
    #[serde(default)]
    completed: bool,
}

struct Store {
    tasks: Mutex<HashMap<u64, Task>>,
    next_id: AtomicU64,
}

impl Store {
    fn new() -> Arc<Self> {
        Arc::new(Self { tasks: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) })
    }
}

#[tokio::main]
async fn main() -> Result<(), tatami::Error> {
    tracing_subscriber::fmt::init();

    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_owned());
    let addr = std::env::var("PORT")
        .map(|p| format!("0.0.0.0:{p}"))
        .unwrap_or_else(|_| "0.0.0.0:3000".to_owned());

    let logging = Logging::new(
        RequestLogger::stdout(),
        AccessLog::open(&log_dir, "access.log")?,
    );

    let store = Store::new();
    let app = Router::new()
        .get("/api/health", health::liveness)
        .get("/api/tasks", {
            let s = Arc::clone(&store);
            move |req| list_tasks(Arc::clone(&s), req)
        })
        .get("/api/tasks/{id}", {
            let s = Arc::clone(&store);
            move |req| get_task(Arc::clone(&s), req)
        })
        .post("/api/tasks", {
            let s = Arc::clone(&store);
            move |req| create_task(Arc::clone(&s), req)
        })
        .put("/api/tasks/{id}", {
            let s = Arc::clone(&store);
            move |req| update_task(Arc::clone(&s), req)
        })
        .delete("/api/tasks/{id}", {
            let s = Arc::clone(&store);
            move |req| delete_task(Arc::clone(&s), req)
        });

    Server::bind(&addr).logging(logging).serve(app).await
}

fn id_param(req: &Request) -> Option<u64> {
    req.param("id").and_then(|id| id.parse().ok())
}

async fn list_tasks(store: Arc<Store>, _req: Request) -> Response {
    let mut tasks: Vec<Task> = store.tasks.lock().unwrap().values().cloned().collect();
    tasks.sort_by_key(|t| t.id);
    Response::json(serde_json::to_vec(&tasks).unwrap())
}

async fn get_task(store: Arc<Store>, req: Request) -> Response {
    let Some(id) = id_param(&req) else {
        return Response::status(StatusCode::BAD_REQUEST);
    };
    match store.tasks.lock().unwrap().get(&id) {
        Some(task) => Response::json(serde_json::to_vec(task).unwrap()),
        None => Response::status(StatusCode::NOT_FOUND),
    }
}

async fn create_task(store: Arc<Store>, req: Request) -> Response {
    let Ok(input) = serde_json::from_slice::<TaskInput>(req.body()) else {
        return Response::status(StatusCode::BAD_REQUEST);
    };
    let id = store.next_id.fetch_add(1, Ordering::Relaxed);
    let task = Task { id, title: input.title, completed: input.completed };
    let body = serde_json::to_vec(&task).unwrap();
    store.tasks.lock().unwrap().insert(id, task);
    Response::builder()
        .status(StatusCode::CREATED)
        .header("location", &format!("/api/tasks/{id}"))
        .json(body)
}

async fn update_task(store: Arc<Store>, req: Request) -> Response {
    let Some(id) = id_param(&req) else {
        return Response::status(StatusCode::BAD_REQUEST);
    };
    let Ok(input) = serde_json::from_slice::<TaskInput>(req.body()) else {
        return Response::status(StatusCode::BAD_REQUEST);
    };
    let mut tasks = store.tasks.lock().unwrap();
    match tasks.get_mut(&id) {
        Some(task) => {
            task.title = input.title;
            task.completed = input.completed;
            Response::json(serde_json::to_vec(task).unwrap())
        }
        None => Response::status(StatusCode::NOT_FOUND),
    }
}

async fn delete_task(store: Arc<Store>, req: Request) -> Response {
    let Some(id) = id_param(&req) else {
        return Response::status(StatusCode::BAD_REQUEST);
    };
    match store.tasks.lock().unwrap().remove(&id) {
        Some(_) => Response::status(StatusCode::NO_CONTENT),
        None => Response::status(StatusCode::NOT_FOUND),
    }
}
