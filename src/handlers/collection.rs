//! Collection CRUD and action handlers.
//!
//! Each handler runs `beforeOperation` first and `afterOperation` last, with the
//! operation's own hooks in between.

use crate::action::{parse_action_items, ActionArgs};
use crate::config::TableSchema;
use crate::driver::{Database, ListQuery, Record};
use crate::error::AppError;
use crate::extractors::{Operation, RequestContext};
use crate::hooks::{HookEvent, HookPipeline};
use crate::response::{created, ok};
use crate::state::CollectionState;
use axum::{
    body::to_bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    response::Response,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn pipeline<'a, D>(state: &'a CollectionState<D>, ctx: RequestContext, op: Operation) -> HookPipeline<'a> {
    HookPipeline::new(&state.collection.hooks, Arc::new(ctx.with_operation(op)), op)
}

fn require_id(ctx: &RequestContext) -> Result<String, AppError> {
    ctx.param("id")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(AppError::MissingId)
}

fn parse_count(ctx: &RequestContext, name: &str, default: u32) -> Result<u32, AppError> {
    match ctx.query_param(name) {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", name))),
    }
}

fn into_record(v: Value, event: HookEvent) -> Result<Record, AppError> {
    match v {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::Internal(format!("{} produced a non-object payload", event.as_str()))),
    }
}

fn to_json<T: serde::Serialize>(v: &T) -> Result<Value, AppError> {
    serde_json::to_value(v).map_err(|e| AppError::Internal(e.to_string()))
}

fn form_value(schema: &TableSchema, name: &str, raw: &str) -> Value {
    schema
        .column(name)
        .map(|c| c.column_type.coerce_form_value(raw))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Read a JSON, URL-encoded or multipart body. Form values are coerced by column type.
async fn read_body(schema: &TableSchema, req: Request) -> Result<Value, AppError> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let mut out = Record::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else { continue };
            let text = field.text().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
            out.insert(name.clone(), form_value(schema, &name, &text));
        }
        return if out.is_empty() { Err(AppError::EmptyBody) } else { Ok(Value::Object(out)) };
    }

    let bytes = to_bytes(req.into_body(), usize::MAX)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::EmptyBody);
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let out: Record = url::form_urlencoded::parse(&bytes)
            .map(|(k, v)| {
                let v = form_value(schema, &k, &v);
                (k.into_owned(), v)
            })
            .collect();
        return if out.is_empty() { Err(AppError::EmptyBody) } else { Ok(Value::Object(out)) };
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Null) => Err(AppError::EmptyBody),
        Ok(v) => Ok(v),
        Err(e) => Err(AppError::BadRequest(format!("invalid JSON body: {}", e))),
    }
}

pub async fn list<D: Database>(State(state): State<CollectionState<D>>, ctx: RequestContext) -> Result<Response, AppError> {
    let hooks = pipeline(&state, ctx, Operation::List);
    hooks.observe(HookEvent::BeforeOperation).await?;
    let ctx = hooks.context();
    let query = ListQuery {
        limit: parse_count(ctx, "limit", state.collection.default_limit())?,
        offset: parse_count(ctx, "offset", 0)?,
        search: ctx.query_param("search").map(str::to_string),
        sort_by: ctx.query_param("sortBy").map(str::to_string),
    };
    hooks.observe(HookEvent::BeforeRead).await?;
    let result = state.driver.list(&query).await?;
    let body = hooks.thread(HookEvent::AfterRead, to_json(&result)?, None).await?;
    let body = hooks.thread(HookEvent::AfterOperation, body, None).await?;
    Ok(ok(body))
}

pub async fn count<D: Database>(State(state): State<CollectionState<D>>, ctx: RequestContext) -> Result<Response, AppError> {
    let hooks = pipeline(&state, ctx, Operation::Count);
    hooks.observe(HookEvent::BeforeOperation).await?;
    let n = state.driver.count().await?;
    let body = hooks.thread(HookEvent::AfterOperation, json!({ "count": n }), None).await?;
    Ok(ok(body))
}

pub async fn create<D: Database>(
    State(state): State<CollectionState<D>>,
    ctx: RequestContext,
    req: Request,
) -> Result<Response, AppError> {
    let hooks = pipeline(&state, ctx, Operation::Create);
    hooks.observe(HookEvent::BeforeOperation).await?;
    let raw = read_body(&state.collection.schema, req).await?;
    let raw = hooks.thread(HookEvent::BeforeValidate, raw, None).await?;
    let data = state.driver.validate(raw).await?;
    let data = hooks.thread(HookEvent::BeforeChange, Value::Object(data), None).await?;
    let record = into_record(data.clone(), HookEvent::BeforeChange)?;
    let doc = state.driver.create(record).await?;
    let doc = hooks.thread(HookEvent::AfterChange, doc, Some(&data)).await?;
    let doc = hooks.thread(HookEvent::AfterOperation, doc, None).await?;
    tracing::debug!(collection = %state.collection.slug, "document created");
    Ok(created(doc))
}

pub async fn retrieve<D: Database>(State(state): State<CollectionState<D>>, ctx: RequestContext) -> Result<Response, AppError> {
    let hooks = pipeline(&state, ctx, Operation::Retrieve);
    hooks.observe(HookEvent::BeforeOperation).await?;
    let id = require_id(hooks.context())?;
    hooks.observe(HookEvent::BeforeRead).await?;
    let doc = state
        .driver
        .retrieve(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(id.clone()))?;
    let doc = hooks.thread(HookEvent::AfterRead, doc, None).await?;
    let doc = hooks.thread(HookEvent::AfterOperation, doc, None).await?;
    Ok(ok(doc))
}

pub async fn update<D: Database>(
    State(state): State<CollectionState<D>>,
    ctx: RequestContext,
    req: Request,
) -> Result<Response, AppError> {
    let hooks = pipeline(&state, ctx, Operation::Update);
    hooks.observe(HookEvent::BeforeOperation).await?;
    let id = require_id(hooks.context())?;
    let raw = read_body(&state.collection.schema, req).await?;
    let original = state
        .driver
        .retrieve(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(id.clone()))?;
    let raw = hooks.thread(HookEvent::BeforeValidate, raw, Some(&original)).await?;
    let data = state.driver.validate(raw).await?;
    let data = hooks
        .thread(HookEvent::BeforeChange, Value::Object(data), Some(&original))
        .await?;
    let record = into_record(data.clone(), HookEvent::BeforeChange)?;
    let doc = state
        .driver
        .update(&id, record)
        .await?
        .ok_or_else(|| AppError::NotFound(id.clone()))?;
    let doc = hooks.thread(HookEvent::AfterChange, doc, Some(&data)).await?;
    let doc = hooks.thread(HookEvent::AfterOperation, doc, None).await?;
    Ok(ok(doc))
}

pub async fn delete<D: Database>(State(state): State<CollectionState<D>>, ctx: RequestContext) -> Result<Response, AppError> {
    let hooks = pipeline(&state, ctx, Operation::Delete);
    hooks.observe(HookEvent::BeforeOperation).await?;
    let id = require_id(hooks.context())?;
    hooks.observe(HookEvent::BeforeDelete).await?;
    let doc = state
        .driver
        .delete(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(id.clone()))?;
    let doc = hooks.thread(HookEvent::AfterDelete, doc, None).await?;
    let doc = hooks.thread(HookEvent::AfterOperation, doc, None).await?;
    Ok(ok(doc))
}

/// `POST /actions/{name}`. Any failure inside the action is logged and reported as
/// [`AppError::ActionFailed`].
pub async fn run_action<D: Database>(
    State(state): State<CollectionState<D>>,
    ctx: RequestContext,
    req: Request,
) -> Result<Response, AppError> {
    let name = ctx.param("name").unwrap_or_default().to_string();
    let action = state
        .collection
        .action(&name)
        .ok_or_else(|| AppError::NotFound(format!("action '{}'", name)))?;
    let bytes = to_bytes(req.into_body(), usize::MAX)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let items = parse_action_items(&bytes)?;
    let total = items.len();
    let args = ActionArgs {
        items,
        context: Arc::new(ctx.with_operation(Operation::Action)),
        db: state.db.clone(),
        collection: state.collection.clone(),
        driver: state.driver.clone(),
    };
    match action.run(args).await {
        Ok(report) => {
            tracing::info!(
                collection = %state.collection.slug,
                action = %name,
                items = total,
                processed = report.processed,
                skipped = report.skipped.len(),
                "action completed"
            );
            Ok(ok(to_json(&report)?))
        }
        Err(e) => {
            tracing::error!(collection = %state.collection.slug, action = %name, error = %e, "action failed");
            Err(AppError::ActionFailed)
        }
    }
}
