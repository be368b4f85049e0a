//! Lifecycle hooks: ordered interceptors run around each CRUD operation.
//!
//! Threading hooks (`beforeValidate`, `beforeChange`, and the `after*` slots) fold the
//! in-flight payload through the chain: a hook returning `Some(v)` replaces the payload,
//! `None` passes it on untouched. Observation hooks (`beforeRead`, `beforeDelete`,
//! `beforeOperation`) can only abort. Any hook error aborts the request.

use crate::error::AppError;
use crate::extractors::{Operation, RequestContext};
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookEvent {
    BeforeOperation,
    BeforeValidate,
    BeforeChange,
    AfterChange,
    BeforeRead,
    AfterRead,
    BeforeDelete,
    AfterDelete,
    AfterOperation,
}

impl HookEvent {
    pub const ALL: [HookEvent; 9] = [
        HookEvent::BeforeOperation,
        HookEvent::BeforeValidate,
        HookEvent::BeforeChange,
        HookEvent::AfterChange,
        HookEvent::BeforeRead,
        HookEvent::AfterRead,
        HookEvent::BeforeDelete,
        HookEvent::AfterDelete,
        HookEvent::AfterOperation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::BeforeOperation => "beforeOperation",
            HookEvent::BeforeValidate => "beforeValidate",
            HookEvent::BeforeChange => "beforeChange",
            HookEvent::AfterChange => "afterChange",
            HookEvent::BeforeRead => "beforeRead",
            HookEvent::AfterRead => "afterRead",
            HookEvent::BeforeDelete => "beforeDelete",
            HookEvent::AfterDelete => "afterDelete",
            HookEvent::AfterOperation => "afterOperation",
        }
    }
}

/// What a hook sees.
#[derive(Clone, Debug)]
pub struct HookArgs {
    pub context: Arc<RequestContext>,
    pub event: HookEvent,
    pub operation: Operation,
    /// In-flight payload: raw body, validated data, or the operation's result.
    /// `Null` for observation hooks.
    pub data: Value,
    /// The stored document on update (`beforeValidate`, `beforeChange`), or the data that
    /// was written (`afterChange`).
    pub original_doc: Option<Value>,
}

pub type HookResult = Result<Option<Value>, AppError>;

type HookFn = dyn Fn(HookArgs) -> BoxFuture<'static, HookResult> + Send + Sync;

#[derive(Clone)]
pub struct Hook(Arc<HookFn>);

impl Hook {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(HookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Hook(Arc::new(move |args| Box::pin(f(args))))
    }

    /// A hook that only observes; its return value is never used as a replacement.
    pub fn observe<F, Fut>(f: F) -> Self
    where
        F: Fn(HookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let f = Arc::new(f);
        Hook::new(move |args| {
            let f = f.clone();
            async move {
                (*f)(args).await?;
                Ok(None)
            }
        })
    }

    pub async fn call(&self, args: HookArgs) -> HookResult {
        (self.0)(args).await
    }
}

/// Per-event hook lists, each run in registration order.
#[derive(Clone, Default)]
pub struct CollectionHooks {
    pub before_operation: Vec<Hook>,
    pub before_validate: Vec<Hook>,
    pub before_change: Vec<Hook>,
    pub after_change: Vec<Hook>,
    pub before_read: Vec<Hook>,
    pub after_read: Vec<Hook>,
    pub before_delete: Vec<Hook>,
    pub after_delete: Vec<Hook>,
    pub after_operation: Vec<Hook>,
}

impl CollectionHooks {
    pub fn get(&self, event: HookEvent) -> &[Hook] {
        match event {
            HookEvent::BeforeOperation => &self.before_operation,
            HookEvent::BeforeValidate => &self.before_validate,
            HookEvent::BeforeChange => &self.before_change,
            HookEvent::AfterChange => &self.after_change,
            HookEvent::BeforeRead => &self.before_read,
            HookEvent::AfterRead => &self.after_read,
            HookEvent::BeforeDelete => &self.before_delete,
            HookEvent::AfterDelete => &self.after_delete,
            HookEvent::AfterOperation => &self.after_operation,
        }
    }

    pub fn push(&mut self, event: HookEvent, hook: Hook) {
        let slot = match event {
            HookEvent::BeforeOperation => &mut self.before_operation,
            HookEvent::BeforeValidate => &mut self.before_validate,
            HookEvent::BeforeChange => &mut self.before_change,
            HookEvent::AfterChange => &mut self.after_change,
            HookEvent::BeforeRead => &mut self.before_read,
            HookEvent::AfterRead => &mut self.after_read,
            HookEvent::BeforeDelete => &mut self.before_delete,
            HookEvent::AfterDelete => &mut self.after_delete,
            HookEvent::AfterOperation => &mut self.after_operation,
        };
        slot.push(hook);
    }

    pub fn len(&self) -> usize {
        HookEvent::ALL.iter().map(|e| self.get(*e).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs a collection's hooks for one request.
pub struct HookPipeline<'a> {
    hooks: &'a CollectionHooks,
    context: Arc<RequestContext>,
    operation: Operation,
}

impl<'a> HookPipeline<'a> {
    pub fn new(hooks: &'a CollectionHooks, context: Arc<RequestContext>, operation: Operation) -> Self {
        HookPipeline {
            hooks,
            context,
            operation,
        }
    }

    pub fn context(&self) -> &Arc<RequestContext> {
        &self.context
    }

    /// Run observation hooks for `event`; return values are ignored.
    pub async fn observe(&self, event: HookEvent) -> Result<(), AppError> {
        for hook in self.hooks.get(event) {
            hook.call(self.args(event, Value::Null, None)).await?;
        }
        Ok(())
    }

    /// Fold `payload` through the hooks for `event`.
    pub async fn thread(&self, event: HookEvent, payload: Value, original_doc: Option<&Value>) -> Result<Value, AppError> {
        let mut payload = payload;
        for hook in self.hooks.get(event) {
            let args = self.args(event, payload.clone(), original_doc.cloned());
            if let Some(replaced) = hook.call(args).await? {
                payload = replaced;
            }
        }
        Ok(payload)
    }

    fn args(&self, event: HookEvent, data: Value, original_doc: Option<Value>) -> HookArgs {
        HookArgs {
            context: self.context.clone(),
            event,
            operation: self.operation,
            data,
            original_doc,
        }
    }
}
