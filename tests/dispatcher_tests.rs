#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use brrtguard::dispatcher::{Dispatcher, HandlerOutput, Operation, OperationOptions};
use brrtguard::middleware::Middleware;
use brrtguard::server::{make_response, ApiResponse, HeaderVec, ParsedRequest};
use brrtguard::spec::{OperationMeta, ParameterLocation, ParameterMeta};
use brrtguard::validator::Problem;
use brrtguard::validator_cache::ValidatorCache;
use http::Method;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn single(meta: OperationMeta) -> Dispatcher {
    Dispatcher::new(vec![meta], OperationOptions::default(), ValidatorCache::default())
}

#[test]
fn test_unknown_operation_is_404_problem() {
    let dispatcher = common::dispatcher_with(OperationOptions::default());
    let resp = dispatcher
        .dispatch("does_not_exist", ParsedRequest::new(Method::GET, "/nowhere"))
        .unwrap();
    assert_eq!(resp.status, 404);
    let body = resp.json().unwrap();
    assert_eq!(body["title"], "Not Found");
    assert_eq!(body["instance"], "/nowhere");
}

#[test]
fn test_declared_but_unregistered_operation_is_404() {
    let dispatcher = common::dispatcher_with(OperationOptions::default());
    let resp = dispatcher
        .dispatch("list_pets", ParsedRequest::new(Method::GET, "/pets"))
        .unwrap();
    assert_eq!(resp.status, 404);
}

#[test]
fn test_register_undeclared_operation_fails() {
    let mut dispatcher = common::dispatcher_with(OperationOptions::default());
    let err = dispatcher
        .register_handler("nope", |_req: &ParsedRequest| json!(null))
        .unwrap_err();
    assert!(err.to_string().contains("nope"));
}

#[test]
fn test_operation_ids_sorted() {
    let dispatcher = common::dispatcher_with(OperationOptions::default());
    assert_eq!(
        dispatcher.operation_ids(),
        vec!["add_pet", "get_pet", "list_pets", "upload_photo"]
    );
}

#[test]
fn test_handler_output_shapes() {
    let meta = OperationMeta::new("shape", Method::GET, "/shape");

    let mut dispatcher = single(meta);
    dispatcher
        .register_handler("shape", |_req: &ParsedRequest| json!({"a": 1}))
        .unwrap();
    let resp = dispatcher.dispatch("shape", ParsedRequest::new(Method::GET, "/shape")).unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "{\n  \"a\": 1\n}\n");
    assert_eq!(resp.get_header("content-type"), Some("application/json"));

    dispatcher
        .register_handler("shape", |_req: &ParsedRequest| (json!({"a": 2}), 202))
        .unwrap();
    let resp = dispatcher.dispatch("shape", ParsedRequest::new(Method::GET, "/shape")).unwrap();
    assert_eq!(resp.status, 202);

    dispatcher
        .register_handler("shape", |_req: &ParsedRequest| {
            let mut headers = HeaderVec::new();
            headers.push((Arc::from("X-Rate"), "10".to_string()));
            (json!(null), 204, headers)
        })
        .unwrap();
    let resp = dispatcher.dispatch("shape", ParsedRequest::new(Method::GET, "/shape")).unwrap();
    assert_eq!(resp.status, 204);
    assert!(resp.body.is_empty());
    assert_eq!(resp.get_header("x-rate"), Some("10"));

    dispatcher
        .register_handler("shape", |_req: &ParsedRequest| -> HandlerOutput {
            ApiResponse {
                status: 302,
                headers: HeaderVec::new(),
                body: Vec::new(),
                mimetype: None,
                data: None,
            }
            .into()
        })
        .unwrap();
    let resp = dispatcher.dispatch("shape", ParsedRequest::new(Method::GET, "/shape")).unwrap();
    assert_eq!(resp.status, 302);
    assert!(resp.headers.is_empty());
}

#[test]
fn test_non_json_mimetype_sends_raw_text() {
    let meta = OperationMeta::new("hello", Method::GET, "/hello").with_produces(["text/plain"]);
    let mut dispatcher = single(meta);
    dispatcher
        .register_handler("hello", |_req: &ParsedRequest| json!("hello world"))
        .unwrap();
    let op = dispatcher.operation("hello").unwrap();
    assert_eq!(op.mimetype(), "text/plain");
    let resp = dispatcher.dispatch("hello", ParsedRequest::new(Method::GET, "/hello")).unwrap();
    assert_eq!(resp.text(), "hello world");
    assert_eq!(resp.get_header("content-type"), Some("text/plain"));
}

#[test]
fn test_handler_sees_materialized_arrays() {
    let operations = common::petstore_operations();
    let mut dispatcher = Dispatcher::new(operations, OperationOptions::default(), ValidatorCache::default());
    dispatcher
        .register_handler("list_pets", |req: &ParsedRequest| {
            json!({"tags": req.query.get("tags").map(|v| v.to_json())})
        })
        .unwrap();
    let req = ParsedRequest::new(Method::GET, "/pets")
        .with_query("tags", "a")
        .with_query("tags", "b,c");
    let resp = dispatcher.dispatch("list_pets", req).unwrap();
    assert_eq!(resp.json().unwrap()["tags"], json!(["a", "b", "c"]));
}

struct ApiKey;

impl Middleware for ApiKey {
    fn name(&self) -> &str {
        "api_key"
    }

    fn before(&self, req: &mut ParsedRequest) -> Result<(), Problem> {
        match req.get_header("x-api-key") {
            Some("secret") => Ok(()),
            _ => Err(Problem::new(401, "Unauthorized", "API key required")),
        }
    }
}

#[derive(Default)]
struct Counter {
    seen: AtomicUsize,
}

impl Middleware for Counter {
    fn after(&self, _req: &ParsedRequest, res: &mut ApiResponse, _latency: Duration) {
        self.seen.fetch_add(1, Ordering::SeqCst);
        res.set_header("X-Seen", "1".to_string());
    }
}

#[test]
fn test_user_middleware_runs_after_validation() {
    let meta = OperationMeta::new("secure", Method::GET, "/secure")
        .with_parameter(ParameterMeta::new("page", ParameterLocation::Query, json!({"type": "integer"})));
    let counter = Arc::new(Counter::default());
    let mut dispatcher = single(meta);
    dispatcher.add_middleware(Arc::new(ApiKey));
    dispatcher.add_middleware(Arc::clone(&counter) as Arc<dyn Middleware>);
    dispatcher
        .register_handler("secure", |_req: &ParsedRequest| json!({"ok": true}))
        .unwrap();

    // parameter validation rejects before the key is checked
    let req = ParsedRequest::new(Method::GET, "/secure").with_query("page", "x");
    assert_eq!(dispatcher.dispatch("secure", req).unwrap().status, 400);

    let resp = dispatcher
        .dispatch("secure", ParsedRequest::new(Method::GET, "/secure"))
        .unwrap();
    assert_eq!(resp.status, 401);
    assert_eq!(resp.get_header("x-seen"), Some("1"));

    let req = ParsedRequest::new(Method::GET, "/secure").with_header("X-Api-Key", "secret");
    let resp = dispatcher.dispatch("secure", req).unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(counter.seen.load(Ordering::SeqCst), 3);
}

#[test]
fn test_operation_call_http() {
    let operations = common::petstore_operations();
    let meta = common::find_operation(&operations, "get_pet");
    let handler: brrtguard::dispatcher::Handler = Arc::new(|req: &ParsedRequest| {
        let id = req.path_params.get("pet_id").and_then(|v| v.as_str()).unwrap_or_default();
        HandlerOutput::from(json!({"id": id.parse::<i64>().unwrap_or(0), "name": "Rex"}))
    });
    let operation = Operation::new(meta, handler, &OperationOptions::default(), &ValidatorCache::default()).unwrap();

    let request = http::Request::builder()
        .method(Method::GET)
        .uri("/pets/12")
        .body(Vec::new())
        .unwrap();
    let resp = operation.call_http(request, [("pet_id", "12")]).unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body, json!({"id": 12, "name": "Rex"}));

    let request = http::Request::builder()
        .method(Method::GET)
        .uri("/pets/rex")
        .body(Vec::new())
        .unwrap();
    let resp = operation.call_http(request, [("pet_id", "rex")]).unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.headers()["content-type"], "application/problem+json");
}

#[test]
fn test_shared_across_threads() {
    let operations = common::petstore_operations();
    let mut dispatcher = Dispatcher::new(operations, OperationOptions::default(), ValidatorCache::default());
    dispatcher
        .register_handler("get_pet", |_req: &ParsedRequest| json!({"name": "Rex"}))
        .unwrap();
    let dispatcher = Arc::new(dispatcher);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            std::thread::spawn(move || {
                let id = i.to_string();
                let req = ParsedRequest::new(Method::GET, format!("/pets/{id}")).with_path_param("pet_id", id);
                dispatcher.dispatch("get_pet", req).unwrap().status
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 200);
    }
}

#[test]
fn test_make_response_matches_handler_shaping() {
    let direct = make_response(json!({"a": 1}), 200, HeaderVec::new(), "application/json");
    let mut dispatcher = single(OperationMeta::new("shape", Method::GET, "/shape"));
    dispatcher
        .register_handler("shape", |_req: &ParsedRequest| json!({"a": 1}))
        .unwrap();
    let shaped = dispatcher.dispatch("shape", ParsedRequest::new(Method::GET, "/shape")).unwrap();
    assert_eq!(direct, shaped);
}

#[test]
fn test_parameter_errors_reported_before_content_type() {
    let mut dispatcher = common::dispatcher_with(OperationOptions::default());
    dispatcher
        .register_handler("upload_photo", |_req: &ParsedRequest| json!({}))
        .unwrap();

    let bad_param = ParsedRequest::new(Method::POST, "/pets/abc/photo")
        .with_path_param("pet_id", "abc")
        .with_content_type("text/plain")
        .with_body("hello");
    assert_eq!(dispatcher.dispatch("upload_photo", bad_param).unwrap().status, 400);

    let good_param = ParsedRequest::new(Method::POST, "/pets/1/photo")
        .with_path_param("pet_id", "1")
        .with_content_type("text/plain")
        .with_body("hello");
    assert_eq!(dispatcher.dispatch("upload_photo", good_param).unwrap().status, 415);
}
