//! Per-request capability handed to access predicates, hooks and actions.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path},
    http::{request::Parts, HeaderMap, Method, Uri},
};
use std::collections::HashMap;

/// CRUD operation a request is performing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    List,
    Count,
    Create,
    Retrieve,
    Update,
    Delete,
    Action,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Count => "count",
            Operation::Create => "create",
            Operation::Retrieve => "retrieve",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Action => "action",
        }
    }
}

/// Snapshot of the inbound request. Carries no body: handlers read the body themselves.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub operation: Option<Operation>,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        let query = parts
            .uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        RequestContext {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            params: HashMap::new(),
            query,
            operation: None,
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Operation implied by the method and matched route, for checks that run before
    /// the handler assigns one.
    pub fn infer_operation(&self) -> Option<Operation> {
        if self.params.contains_key("name") {
            return (self.method == Method::POST).then_some(Operation::Action);
        }
        if self.params.contains_key("id") {
            return match self.method {
                Method::GET => Some(Operation::Retrieve),
                Method::PUT => Some(Operation::Update),
                Method::DELETE => Some(Operation::Delete),
                _ => None,
            };
        }
        if self.uri.path().trim_end_matches('/').ends_with("/count") {
            return (self.method == Method::GET).then_some(Operation::Count);
        }
        match self.method {
            Method::GET => Some(Operation::List),
            Method::POST => Some(Operation::Create),
            _ => None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let mut ctx = RequestContext::from_parts(parts);
        if let Ok(Path(params)) = Path::<HashMap<String, String>>::from_request_parts(parts, state).await {
            ctx.params = params;
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn query_and_headers_are_captured() {
        let (parts, _) = Request::builder()
            .uri("/collections/todos?limit=5&search=milk%20tea")
            .header("x-user", " alice ")
            .body(())
            .unwrap()
            .into_parts();
        let ctx = RequestContext::from_parts(&parts).with_operation(Operation::List);
        assert_eq!(ctx.query_param("limit"), Some("5"));
        assert_eq!(ctx.query_param("search"), Some("milk tea"));
        assert_eq!(ctx.header("x-user"), Some("alice"));
        assert_eq!(ctx.operation, Some(Operation::List));
    }

    fn context(method: Method, uri: &str, params: &[(&str, &str)]) -> RequestContext {
        let (parts, _) = Request::builder().method(method).uri(uri).body(()).unwrap().into_parts();
        let mut ctx = RequestContext::from_parts(&parts);
        ctx.params = params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ctx
    }

    #[test]
    fn operation_follows_method_and_route() {
        assert_eq!(context(Method::GET, "/", &[]).infer_operation(), Some(Operation::List));
        assert_eq!(context(Method::POST, "/", &[]).infer_operation(), Some(Operation::Create));
        assert_eq!(context(Method::GET, "/count", &[]).infer_operation(), Some(Operation::Count));
        assert_eq!(context(Method::GET, "/3", &[("id", "3")]).infer_operation(), Some(Operation::Retrieve));
        assert_eq!(context(Method::PUT, "/3", &[("id", "3")]).infer_operation(), Some(Operation::Update));
        assert_eq!(context(Method::DELETE, "/3", &[("id", "3")]).infer_operation(), Some(Operation::Delete));
        assert_eq!(
            context(Method::POST, "/actions/bulk_delete", &[("name", "bulk_delete")]).infer_operation(),
            Some(Operation::Action)
        );
        assert_eq!(context(Method::PATCH, "/", &[]).infer_operation(), None);
    }
}
