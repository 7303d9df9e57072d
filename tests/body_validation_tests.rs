#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use brrtguard::dispatcher::{Dispatcher, OperationOptions};
use brrtguard::server::{FileUpload, ParsedRequest};
use brrtguard::spec::{OperationMeta, RequestBodyMeta};
use brrtguard::validator::{ContentHandlerRegistry, RequestBodyValidator, ValidationError};
use brrtguard::validator_cache::ValidatorCache;
use http::Method;
use serde_json::{json, Value};
use std::sync::Arc;

fn petstore() -> Dispatcher {
    let mut dispatcher = common::dispatcher_with(OperationOptions::default());
    dispatcher
        .register_handler("add_pet", |req: &ParsedRequest| {
            (req.body_data.clone().unwrap_or(Value::Null), 201)
        })
        .unwrap();
    dispatcher
        .register_handler("upload_photo", |req: &ParsedRequest| {
            req.body_data.clone().unwrap_or(Value::Null)
        })
        .unwrap();
    dispatcher
}

fn pet_body(required: bool, nullable: bool) -> RequestBodyValidator {
    let mut body = RequestBodyMeta::new(json!({
        "type": "object",
        "required": ["name"],
        "properties": {"name": {"type": "string"}}
    }))
    .required(required);
    body.nullable = nullable;
    RequestBodyValidator::new(
        "add_pet",
        &body,
        &["application/json".to_string()],
        false,
        Arc::new(ContentHandlerRegistry::default()),
        &ValidatorCache::default(),
    )
    .unwrap()
}

#[test]
fn test_malformed_json_body_is_400() {
    let dispatcher = petstore();
    let req = ParsedRequest::new(Method::POST, "/pets")
        .with_content_type("application/json")
        .with_body("{\"name\": ");
    let resp = dispatcher.dispatch("add_pet", req).unwrap();
    assert_eq!(resp.status, 400);
    assert_eq!(resp.get_header("content-type"), Some("application/problem+json"));
    assert_eq!(resp.json().unwrap()["detail"], "Request body is not valid JSON");
}

#[test]
fn test_empty_optional_body_does_not_error() {
    let v = pet_body(false, false);
    let mut req = ParsedRequest::new(Method::POST, "/pets").with_content_type("application/json");
    assert!(v.validate(&mut req).is_ok());
    assert!(req.body_data.is_none());
}

#[test]
fn test_empty_required_body_validates_null() {
    let v = pet_body(true, false);
    let mut req = ParsedRequest::new(Method::POST, "/pets").with_content_type("application/json");
    assert!(matches!(v.validate(&mut req), Err(ValidationError::Schema { .. })));

    let v = pet_body(true, true);
    let mut req = ParsedRequest::new(Method::POST, "/pets").with_content_type("application/json");
    assert!(v.validate(&mut req).is_ok());
}

#[test]
fn test_nullable_body_accepts_null_literal() {
    let v = pet_body(true, true);
    let mut req = ParsedRequest::new(Method::POST, "/pets")
        .with_content_type("application/json")
        .with_body("null");
    assert!(v.validate(&mut req).is_ok());
}

#[test]
fn test_valid_json_body_reaches_handler() {
    let dispatcher = petstore();
    let req = ParsedRequest::new(Method::POST, "/pets")
        .with_content_type("application/json")
        .with_body(r#"{"name": "Rex", "tag": "dog"}"#);
    let resp = dispatcher.dispatch("add_pet", req).unwrap();
    assert_eq!(resp.status, 201);
    assert_eq!(resp.json().unwrap(), json!({"name": "Rex", "tag": "dog"}));
}

#[test]
fn test_schema_failure_is_400() {
    let dispatcher = petstore();
    let req = ParsedRequest::new(Method::POST, "/pets")
        .with_content_type("application/json")
        .with_body(r#"{"tag": "dog"}"#);
    let resp = dispatcher.dispatch("add_pet", req).unwrap();
    assert_eq!(resp.status, 400);
    assert_eq!(resp.json().unwrap()["title"], "Bad Request");
}

#[test]
fn test_unsupported_content_type_is_415() {
    let dispatcher = petstore();
    let req = ParsedRequest::new(Method::POST, "/pets")
        .with_content_type("text/plain")
        .with_body("Rex");
    let resp = dispatcher.dispatch("add_pet", req).unwrap();
    assert_eq!(resp.status, 415);
    let detail = resp.json().unwrap()["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Invalid Content-type (text/plain)"));
    assert!(detail.contains("application/json"));
}

#[test]
fn test_missing_content_type_with_required_body_is_415() {
    let v = pet_body(true, false);
    let mut req = ParsedRequest::new(Method::POST, "/pets").with_body(r#"{"name": "Rex"}"#);
    let err = v.validate(&mut req).unwrap_err();
    assert_eq!(err.status(), 415);
    assert!(err.to_string().contains("(none)"));
}

#[test]
fn test_vendor_json_matches_by_handler_name() {
    let v = RequestBodyValidator::new(
        "op",
        &RequestBodyMeta::new(json!({"type": "object"})),
        &["application/json".to_string()],
        false,
        Arc::new(ContentHandlerRegistry::default()),
        &ValidatorCache::default(),
    )
    .unwrap();
    let mut req = ParsedRequest::new(Method::POST, "/")
        .with_content_type("application/vnd.api+json")
        .with_body("{}");
    assert!(v.validate(&mut req).is_ok());
}

#[test]
fn test_form_fields_coerced_before_validation() {
    let dispatcher = petstore();
    let req = ParsedRequest::new(Method::POST, "/pets/1/photo")
        .with_path_param("pet_id", "1")
        .with_content_type("multipart/form-data; boundary=xyz")
        .with_form("caption", "sleepy")
        .with_form("rating", "3")
        .with_file("photo", FileUpload::new("rex.png", vec![0x89, 0x50]));
    let resp = dispatcher.dispatch("upload_photo", req).unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.json().unwrap(),
        json!({"caption": "sleepy", "rating": 3, "photo": ""})
    );
}

#[test]
fn test_form_coercion_failure_is_400() {
    let dispatcher = petstore();
    let req = ParsedRequest::new(Method::POST, "/pets/1/photo")
        .with_path_param("pet_id", "1")
        .with_content_type("application/x-www-form-urlencoded")
        .with_body("rating=high");
    let resp = dispatcher.dispatch("upload_photo", req).unwrap();
    assert_eq!(resp.status, 400);
}

#[test]
fn test_urlencoded_transport_request() {
    let dispatcher = petstore();
    let http_req = http::Request::builder()
        .method(Method::POST)
        .uri("/pets/4/photo")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(b"caption=zoom&rating=5".to_vec())
        .unwrap();
    let req = ParsedRequest::from_http(http_req, [("pet_id", "4")]);
    let resp = dispatcher.dispatch("upload_photo", req).unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json().unwrap()["rating"], 5);
}

#[test]
fn test_streaming_body_passes_through() {
    let meta = OperationMeta::new("put_blob", Method::PUT, "/blob")
        .with_consumes(["application/octet-stream"])
        .with_body(RequestBodyMeta::new(json!({"type": "string", "format": "binary"})).required(true));
    let mut dispatcher = Dispatcher::new(vec![meta], OperationOptions::default(), ValidatorCache::default());
    dispatcher
        .register_handler("put_blob", |req: &ParsedRequest| json!({"size": req.body.len()}))
        .unwrap();
    let req = ParsedRequest::new(Method::PUT, "/blob")
        .with_content_type("application/octet-stream")
        .with_body(vec![0u8, 1, 2, 3]);
    let resp = dispatcher.dispatch("put_blob", req).unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json().unwrap()["size"], 4);
}
