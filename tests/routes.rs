//! Compiled collection routes driven end to end over the in-memory driver.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use honohub::{
    Access, ActionArgs, AppError, CollectionAction, CollectionConfig, ColumnSchema, ColumnType, Driver, DriverFactory,
    Hook, HookEvent, Hub, ListQuery, ListResult, MemoryStore, Operation, Pagination, Record, TableSchema,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn todos() -> TableSchema {
    TableSchema::new(
        "todos",
        vec![
            ColumnSchema::new("id", ColumnType::Integer).primary().with_default(),
            ColumnSchema::new("message", ColumnType::Text).not_null(),
            ColumnSchema::new("done", ColumnType::Boolean),
        ],
    )
}

fn router(store: &MemoryStore, config: CollectionConfig<MemoryStore>) -> axum::Router {
    Hub::new(store.clone()).collection(config).build().unwrap()
}

async fn send(router: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn api(router: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let body = match body {
        Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
        None => Body::empty(),
    };
    send(router, builder.body(body).unwrap()).await
}

async fn seed(store: &MemoryStore, n: usize) {
    store
        .insert_rows(
            "todos",
            (1..=n).map(|i| json!({ "id": i, "message": format!("Todo {}", i), "done": false })),
        )
        .await;
}

#[tokio::test]
async fn create_then_retrieve_round_trip() {
    let store = MemoryStore::new();
    let r = router(&store, CollectionConfig::new(todos()));

    let (s, created) = api(&r, "POST", "/collections/todos", Some(json!({ "message": "Buy milk", "done": false }))).await;
    assert_eq!(s, StatusCode::CREATED);
    assert_eq!(created["id"], json!(1));
    assert_eq!(created["message"], "Buy milk");

    let (s, fetched) = api(&r, "GET", "/collections/todos/1", None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn list_pages_with_total_count() {
    let store = MemoryStore::new();
    seed(&store, 15).await;
    let r = router(&store, CollectionConfig::new(todos()).pagination(Pagination::limit(10)));

    let (s, page) = api(&r, "GET", "/collections/todos?limit=5&offset=10", None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(page["results"].as_array().unwrap().len(), 5);
    assert_eq!(page["count"], json!(15));

    let (_, page) = api(&r, "GET", "/collections/todos", None).await;
    assert_eq!(page["results"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn unpaginated_list_is_a_bare_array() {
    let store = MemoryStore::new();
    seed(&store, 3).await;
    let r = router(&store, CollectionConfig::new(todos()).searchable(["message"]).default_sort("-id"));

    let (s, rows) = api(&r, "GET", "/collections/todos?search=todo%202", None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(rows, json!([{ "id": 2, "message": "Todo 2", "done": false }]));

    let (_, rows) = api(&r, "GET", "/collections/todos", None).await;
    assert_eq!(rows[0]["id"], json!(3));
}

fn notes() -> TableSchema {
    TableSchema::new(
        "notes",
        vec![
            ColumnSchema::new("id", ColumnType::Integer).primary().with_default(),
            ColumnSchema::new("title", ColumnType::Text),
            ColumnSchema::new("body", ColumnType::Text),
        ],
    )
}

#[tokio::test]
async fn search_matches_any_searchable_field_and_count_stays_total() {
    let store = MemoryStore::new();
    store
        .insert_rows(
            "notes",
            [
                json!({ "id": 1, "title": "Groceries", "body": "oat milk" }),
                json!({ "id": 2, "title": "Milkshake recipe", "body": "banana" }),
                json!({ "id": 3, "title": "Chores", "body": "laundry" }),
            ],
        )
        .await;
    let config = CollectionConfig::new(notes())
        .searchable(["title", "body"])
        .default_sort("id")
        .pagination(Pagination::limit(10));
    let r = router(&store, config);

    let (s, page) = api(&r, "GET", "/collections/notes?search=MILK", None).await;
    assert_eq!(s, StatusCode::OK);
    let ids: Vec<_> = page["results"].as_array().unwrap().iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!(1), json!(2)]);
    assert_eq!(page["count"], json!(3));
}

#[tokio::test]
async fn limit_above_max_is_rejected() {
    let store = MemoryStore::new();
    let r = router(&store, CollectionConfig::new(todos()).pagination(Pagination::bounded(10, 10)));

    let (s, err) = api(&r, "GET", "/collections/todos?limit=20", None).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "limit_exceeded");

    let (s, err) = api(&r, "GET", "/collections/todos?limit=-1", None).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "bad_request");
}

struct CountingDriver {
    calls: Arc<AtomicUsize>,
}

impl CountingDriver {
    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Driver for CountingDriver {
    async fn list(&self, _query: &ListQuery) -> Result<ListResult, AppError> {
        self.hit();
        Ok(ListResult::Rows(vec![]))
    }

    async fn count(&self) -> Result<u64, AppError> {
        self.hit();
        Ok(0)
    }

    async fn validate(&self, _raw: Value) -> Result<Record, AppError> {
        self.hit();
        Ok(Record::new())
    }

    async fn create(&self, _data: Record) -> Result<Value, AppError> {
        self.hit();
        Ok(json!({}))
    }

    async fn retrieve(&self, _id: &str) -> Result<Option<Value>, AppError> {
        self.hit();
        Ok(None)
    }

    async fn update(&self, _id: &str, _data: Record) -> Result<Option<Value>, AppError> {
        self.hit();
        Ok(None)
    }

    async fn delete(&self, _id: &str) -> Result<Option<Value>, AppError> {
        self.hit();
        Ok(None)
    }

    async fn delete_many(&self, _ids: &[Value]) -> Result<u64, AppError> {
        self.hit();
        Ok(0)
    }
}

#[tokio::test]
async fn access_denial_runs_no_hooks_and_no_driver() {
    let driver_calls = Arc::new(AtomicUsize::new(0));
    let hook_calls = Arc::new(AtomicUsize::new(0));

    let calls = driver_calls.clone();
    let mut config = CollectionConfig::new(todos())
        .access(Access::deny_all())
        .driver(DriverFactory::new(move |_db: &MemoryStore, _c| {
            Arc::new(CountingDriver { calls: calls.clone() }) as Arc<dyn Driver>
        }));
    for event in HookEvent::ALL {
        let hits = hook_calls.clone();
        config = config.hook(
            event,
            Hook::observe(move |_args| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );
    }
    let r = router(&MemoryStore::new(), config);

    let body = Some(json!({ "message": "x" }));
    for (method, uri, body) in [
        ("GET", "/collections/todos", None),
        ("GET", "/collections/todos/count", None),
        ("POST", "/collections/todos", body.clone()),
        ("GET", "/collections/todos/1", None),
        ("PUT", "/collections/todos/1", body.clone()),
        ("DELETE", "/collections/todos/1", None),
    ] {
        let (s, err) = api(&r, method, uri, body).await;
        assert_eq!(s, StatusCode::FORBIDDEN, "{} {}", method, uri);
        assert_eq!(err["error"]["code"], "access_denied");
    }
    assert_eq!(driver_calls.load(Ordering::SeqCst), 0);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn header_access_lets_matching_requests_through() {
    let store = MemoryStore::new();
    let r = router(&store, CollectionConfig::new(todos()).access(Access::require_header("x-api-key", "secret")));

    let (s, _) = api(&r, "GET", "/collections/todos", None).await;
    assert_eq!(s, StatusCode::FORBIDDEN);

    let req = Request::builder()
        .uri("/collections/todos")
        .header("x-api-key", "secret")
        .body(Body::empty())
        .unwrap();
    let (s, _) = send(&r, req).await;
    assert_eq!(s, StatusCode::OK);
}

#[tokio::test]
async fn before_change_replaces_the_written_payload() {
    let store = MemoryStore::new();
    let config = CollectionConfig::new(todos())
        .hook(HookEvent::BeforeChange, Hook::new(|_args| async { Ok(None) }))
        .hook(
            HookEvent::BeforeChange,
            Hook::new(|args| async move {
                let mut data = args.data;
                data["message"] = json!("REPLACED");
                Ok(Some(data))
            }),
        );
    let r = router(&store, config);

    let (s, doc) = api(&r, "POST", "/collections/todos", Some(json!({ "message": "original" }))).await;
    assert_eq!(s, StatusCode::CREATED);
    assert_eq!(doc["message"], "REPLACED");

    let (s, doc) = api(&r, "PUT", "/collections/todos/1", Some(json!({ "message": "edited" }))).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(doc["message"], "REPLACED");
    assert_eq!(store.rows("todos").await[0]["message"], "REPLACED");
}

#[tokio::test]
async fn hooks_see_the_original_document_on_update() {
    let store = MemoryStore::new();
    seed(&store, 1).await;
    let seen = Arc::new(std::sync::Mutex::new(None));
    let sink = seen.clone();
    let config = CollectionConfig::new(todos()).hook(
        HookEvent::BeforeValidate,
        Hook::observe(move |args| {
            let sink = sink.clone();
            async move {
                *sink.lock().unwrap() = args.original_doc;
                Ok(())
            }
        }),
    );
    let r = router(&store, config);

    let (s, _) = api(&r, "PUT", "/collections/todos/1", Some(json!({ "message": "new" }))).await;
    assert_eq!(s, StatusCode::OK);
    let original = seen.lock().unwrap().clone().unwrap();
    assert_eq!(original["message"], "Todo 1");
}

#[tokio::test]
async fn failing_hooks_abort_the_request() {
    let store = MemoryStore::new();
    seed(&store, 1).await;
    let config = CollectionConfig::new(todos())
        .hook(
            HookEvent::BeforeChange,
            Hook::new(|_args| async { Err(AppError::Conflict("todos are frozen".into())) }),
        )
        .hook(
            HookEvent::BeforeDelete,
            Hook::observe(|_args| async { Err(AppError::BadRequest("keep it".into())) }),
        );
    let r = router(&store, config);

    let (s, err) = api(&r, "POST", "/collections/todos", Some(json!({ "message": "new" }))).await;
    assert_eq!(s, StatusCode::CONFLICT);
    assert_eq!(err["error"]["code"], "conflict");

    let (s, _) = api(&r, "PUT", "/collections/todos/1", Some(json!({ "message": "edited" }))).await;
    assert_eq!(s, StatusCode::CONFLICT);

    let (s, err) = api(&r, "DELETE", "/collections/todos/1", None).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "bad_request");

    let rows = store.rows("todos").await;
    assert_eq!(rows, vec![json!({ "id": 1, "message": "Todo 1", "done": false })]);
}

#[tokio::test]
async fn after_hooks_replace_the_response() {
    let store = MemoryStore::new();
    seed(&store, 2).await;
    let config = CollectionConfig::new(todos())
        .hook(
            HookEvent::AfterRead,
            Hook::new(|args| async move { Ok(Some(json!({ "wrapped": args.data }))) }),
        )
        .hook(
            HookEvent::AfterChange,
            Hook::new(|args| async move { Ok(Some(json!({ "id": args.data["id"], "written": args.original_doc }))) }),
        )
        .hook(
            HookEvent::AfterDelete,
            Hook::new(|args| async move { Ok(Some(json!({ "deleted": args.data["id"] }))) }),
        );
    let r = router(&store, config);

    let (s, body) = api(&r, "GET", "/collections/todos/1", None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["wrapped"]["message"], "Todo 1");

    let (_, body) = api(&r, "GET", "/collections/todos", None).await;
    assert_eq!(body["wrapped"].as_array().unwrap().len(), 2);

    let (s, body) = api(&r, "POST", "/collections/todos", Some(json!({ "message": "third" }))).await;
    assert_eq!(s, StatusCode::CREATED);
    assert_eq!(body, json!({ "id": 3, "written": { "message": "third" } }));

    let (s, body) = api(&r, "DELETE", "/collections/todos/2", None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body, json!({ "deleted": 2 }));
    assert_eq!(store.rows("todos").await.len(), 2);
}

#[tokio::test]
async fn access_sees_the_operation() {
    let store = MemoryStore::new();
    seed(&store, 1).await;
    let config = CollectionConfig::new(todos()).access(Access::new(|ctx| async move {
        ctx.operation != Some(Operation::Delete)
    }));
    let r = router(&store, config);

    let (s, _) = api(&r, "GET", "/collections/todos/1", None).await;
    assert_eq!(s, StatusCode::OK);

    let (s, err) = api(&r, "DELETE", "/collections/todos/1", None).await;
    assert_eq!(s, StatusCode::FORBIDDEN);
    assert_eq!(err["error"]["code"], "access_denied");
    assert_eq!(store.rows("todos").await.len(), 1);
}

#[tokio::test]
async fn empty_body_and_missing_documents() {
    let store = MemoryStore::new();
    let r = router(&store, CollectionConfig::new(todos()));

    let req = Request::builder()
        .method("POST")
        .uri("/collections/todos")
        .header("content-type", "application/json")
        .body(Body::empty())
        .unwrap();
    let (s, err) = send(&r, req).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "empty_body");

    let (s, err) = api(&r, "GET", "/collections/todos/42", None).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "not_found");

    let (s, _) = api(&r, "PUT", "/collections/todos/42", Some(json!({ "message": "x" }))).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_returns_the_document_once() {
    let store = MemoryStore::new();
    seed(&store, 2).await;
    let r = router(&store, CollectionConfig::new(todos()));

    let (s, doc) = api(&r, "DELETE", "/collections/todos/2", None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(doc["message"], "Todo 2");

    let (s, _) = api(&r, "DELETE", "/collections/todos/2", None).await;
    assert_eq!(s, StatusCode::NOT_FOUND);

    let (_, count) = api(&r, "GET", "/collections/todos/count", None).await;
    assert_eq!(count, json!({ "count": 1 }));
}

#[tokio::test]
async fn invalid_payload_reports_field_errors() {
    let store = MemoryStore::new();
    let r = router(&store, CollectionConfig::new(todos()));

    let (s, err) = api(&r, "POST", "/collections/todos", Some(json!({ "done": "yes" }))).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "validation_failed");
    let fields: Vec<_> = err["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fields, vec!["message", "done"]);
    assert!(store.rows("todos").await.is_empty());
}

#[tokio::test]
async fn form_bodies_are_coerced_by_column_type() {
    let store = MemoryStore::new();
    let r = router(&store, CollectionConfig::new(todos()));

    let req = Request::builder()
        .method("POST")
        .uri("/collections/todos")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("message=from+a+form&done=on"))
        .unwrap();
    let (s, doc) = send(&r, req).await;
    assert_eq!(s, StatusCode::CREATED);
    assert_eq!(doc["message"], "from a form");
    assert_eq!(doc["done"], json!(true));
}

#[tokio::test]
async fn action_items_are_bounded() {
    let store = MemoryStore::new();
    let r = router(&store, CollectionConfig::new(todos()));

    let (s, _) = api(&r, "POST", "/collections/todos/actions/bulk_delete", Some(json!({ "items": [] }))).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);

    let items: Vec<Value> = (0..101).map(|i| json!({ "id": i })).collect();
    let (s, _) = api(&r, "POST", "/collections/todos/actions/bulk_delete", Some(json!({ "items": items }))).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);

    let (s, _) = api(&r, "POST", "/collections/todos/actions/nope", Some(json!({ "items": [{}] }))).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_delete_skips_items_without_the_key() {
    let store = MemoryStore::new();
    seed(&store, 3).await;
    let r = router(&store, CollectionConfig::new(todos()));

    let (s, report) = api(
        &r,
        "POST",
        "/collections/todos/actions/bulk_delete",
        Some(json!({ "items": [{ "id": 1 }, { "message": "no key" }, { "id": 3 }] })),
    )
    .await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(report["processed"], json!(2));
    assert_eq!(report["skipped"][0]["index"], json!(1));

    let rows = store.rows("todos").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(2));
}

#[tokio::test]
async fn bulk_delete_normalizes_text_keys_and_reports_bad_ones() {
    let store = MemoryStore::new();
    seed(&store, 4).await;
    let r = router(&store, CollectionConfig::new(todos()));

    let (s, report) = api(
        &r,
        "POST",
        "/collections/todos/actions/bulk_delete",
        Some(json!({ "items": [{ "id": "1" }, { "message": "no key" }, { "id": 2 }, { "id": "abc" }] })),
    )
    .await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(report["processed"], json!(2));
    let skipped: Vec<_> = report["skipped"].as_array().unwrap().iter().map(|s| s["index"].clone()).collect();
    assert_eq!(skipped, vec![json!(1), json!(3)]);

    let ids: Vec<_> = store.rows("todos").await.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!(3), json!(4)]);
}

#[tokio::test]
async fn failing_action_hides_its_cause() {
    let store = MemoryStore::new();
    let config = CollectionConfig::new(todos()).action(CollectionAction::new(
        "explode",
        |_args: ActionArgs<MemoryStore>| async { Err(AppError::Internal("secret detail".into())) },
    ));
    let r = router(&store, config);

    let (s, err) = api(&r, "POST", "/collections/todos/actions/explode", Some(json!({ "items": [1] }))).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "action_failed");
    assert!(!err["error"]["message"].as_str().unwrap().contains("secret"));
}

#[tokio::test]
async fn disabled_actions_mount_no_action_routes() {
    let store = MemoryStore::new();
    let r = router(&store, CollectionConfig::new(todos()).disable_actions());

    let (s, _) = api(&r, "POST", "/collections/todos/actions/bulk_delete", Some(json!({ "items": [{ "id": 1 }] }))).await;
    assert!(s == StatusCode::NOT_FOUND || s == StatusCode::METHOD_NOT_ALLOWED);
}
