#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use brrtguard::dispatcher::{Dispatcher, OperationOptions};
use brrtguard::server::ParsedRequest;
use brrtguard::spec::{CollectionFormat, OperationMeta, ParameterLocation, ParameterMeta};
use brrtguard::validator::{ParameterValidator, ValidationError};
use brrtguard::validator_cache::ValidatorCache;
use http::Method;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn validator(parameters: &[ParameterMeta], strict: bool) -> ParameterValidator {
    ParameterValidator::new("test_op", parameters, strict, &ValidatorCache::default()).unwrap()
}

fn name_param() -> ParameterMeta {
    ParameterMeta::new("name", ParameterLocation::Path, json!({"type": "string"})).required(true)
}

#[test]
fn test_strict_mode_rejects_extra_query_and_skips_handler() {
    let invoked = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&invoked);

    let options = OperationOptions {
        strict_validation: true,
        ..OperationOptions::default()
    };
    let mut dispatcher = common::dispatcher_with(options);
    dispatcher
        .register_handler("list_pets", move |_req: &ParsedRequest| {
            seen.store(true, Ordering::SeqCst);
            json!([])
        })
        .unwrap();

    let req = ParsedRequest::new(Method::GET, "/pets?foo=1")
        .with_query("limit", "5")
        .with_query("foo", "1");
    let resp = dispatcher.dispatch("list_pets", req).unwrap();

    assert_eq!(resp.status, 400);
    assert!(!invoked.load(Ordering::SeqCst));
    let body = resp.json().unwrap();
    assert_eq!(body["detail"], "Extra query parameter(s) foo not in spec");
    assert_eq!(body["extra_query"], json!(["foo"]));
}

#[test]
fn test_lenient_mode_ignores_extra_query() {
    let mut dispatcher = common::dispatcher_with(OperationOptions::default());
    dispatcher
        .register_handler("list_pets", |_req: &ParsedRequest| json!([]))
        .unwrap();
    let req = ParsedRequest::new(Method::GET, "/pets").with_query("foo", "1");
    assert_eq!(dispatcher.dispatch("list_pets", req).unwrap().status, 200);
}

#[test]
fn test_missing_required_path_parameter() {
    let v = validator(&[name_param()], false);
    let err = v.validate(&ParsedRequest::new(Method::GET, "/greet")).unwrap_err();
    assert_eq!(err.to_string(), "Missing path parameter 'name'");
    assert_eq!(err.status(), 400);
}

#[test]
fn test_nullable_path_parameter_accepts_null() {
    let v = validator(&[name_param().nullable(true)], false);
    let req = ParsedRequest::new(Method::GET, "/greet/null").with_path_param("name", "null");
    assert!(v.validate(&req).is_ok());

    let int_param = ParameterMeta::new("id", ParameterLocation::Path, json!({"type": "integer"}))
        .required(true)
        .nullable(true);
    let v = validator(&[int_param], false);
    let req = ParsedRequest::new(Method::GET, "/items/None").with_path_param("id", "None");
    assert!(v.validate(&req).is_ok());
}

#[test]
fn test_path_lookup_accepts_underscored_capture() {
    let param = ParameterMeta::new("pet-id", ParameterLocation::Path, json!({"type": "integer"}));
    let v = validator(&[param], false);
    let req = ParsedRequest::new(Method::GET, "/pets/3").with_path_param("pet_id", "3");
    assert!(v.validate(&req).is_ok());
    let req = ParsedRequest::new(Method::GET, "/pets/x").with_path_param("pet_id", "x");
    assert!(matches!(v.validate(&req), Err(ValidationError::TypeCoercion(_))));
}

#[test]
fn test_query_schema_constraints_after_coercion() {
    let limit = ParameterMeta::new("limit", ParameterLocation::Query, json!({"type": "integer", "minimum": 1}));
    let v = validator(&[limit], false);
    assert!(v
        .validate(&ParsedRequest::new(Method::GET, "/").with_query("limit", "3"))
        .is_ok());
    assert!(matches!(
        v.validate(&ParsedRequest::new(Method::GET, "/").with_query("limit", "0")),
        Err(ValidationError::Schema { .. })
    ));
    assert!(matches!(
        v.validate(&ParsedRequest::new(Method::GET, "/").with_query("limit", "ten")),
        Err(ValidationError::TypeCoercion(_))
    ));
}

#[test]
fn test_repeated_scalar_uses_last_occurrence() {
    let limit = ParameterMeta::new("limit", ParameterLocation::Query, json!({"type": "integer", "maximum": 10}));
    let v = validator(&[limit], false);
    let req = ParsedRequest::new(Method::GET, "/")
        .with_query("limit", "50")
        .with_query("limit", "5");
    assert!(v.validate(&req).is_ok());
}

#[test]
fn test_header_arrays_split_and_trimmed() {
    let param = ParameterMeta::new(
        "X-Ids",
        ParameterLocation::Header,
        json!({"type": "array", "items": {"type": "integer"}}),
    )
    .with_collection_format(CollectionFormat::Csv);
    let v = validator(&[param], false);
    let req = ParsedRequest::new(Method::GET, "/").with_header("x-ids", "1, 2 ,3");
    assert!(v.validate(&req).is_ok());
    let req = ParsedRequest::new(Method::GET, "/").with_header("X-IDS", "1,b");
    assert!(v.validate(&req).is_err());
}

#[test]
fn test_locations_checked_in_order() {
    let params = [
        ParameterMeta::new("token", ParameterLocation::Header, json!({"type": "string"})).required(true),
        ParameterMeta::new("page", ParameterLocation::Query, json!({"type": "integer"})),
    ];
    let v = validator(&params, false);
    let req = ParsedRequest::new(Method::GET, "/").with_query("page", "x");
    assert!(matches!(v.validate(&req), Err(ValidationError::TypeCoercion(_))));
}

#[test]
fn test_form_file_presence_only() {
    let params = [ParameterMeta::new("photo", ParameterLocation::FormData, json!({"type": "file"})).required(true)];
    let v = validator(&params, false);
    let err = v.validate(&ParsedRequest::new(Method::POST, "/")).unwrap_err();
    assert_eq!(err.to_string(), "Missing formdata parameter 'photo'");

    let req = ParsedRequest::new(Method::POST, "/")
        .with_file("photo", brrtguard::server::FileUpload::new("a.png", vec![0u8; 4]));
    assert!(v.validate(&req).is_ok());
}

#[test]
fn test_strict_mode_rejects_extra_form_fields() {
    let meta = OperationMeta::new("upload", Method::POST, "/upload")
        .with_parameter(ParameterMeta::new("caption", ParameterLocation::FormData, json!({"type": "string"})));
    let options = OperationOptions {
        strict_validation: true,
        ..OperationOptions::default()
    };
    let mut dispatcher = Dispatcher::new(vec![meta], options, ValidatorCache::default());
    dispatcher
        .register_handler("upload", |_req: &ParsedRequest| json!({}))
        .unwrap();
    let req = ParsedRequest::new(Method::POST, "/upload")
        .with_form("caption", "hi")
        .with_form("rogue", "1");
    let resp = dispatcher.dispatch("upload", req).unwrap();
    assert_eq!(resp.status, 400);
    assert_eq!(resp.json().unwrap()["extra_formData"], json!(["rogue"]));
}

const OPENAPI3_FORM: &str = r#"openapi: "3.0.0"
info: {title: Forms, version: "1.0.0"}
paths:
  /pets:
    post:
      operationId: add_pet_form
      requestBody:
        required: true
        content:
          application/x-www-form-urlencoded:
            schema:
              type: object
              properties:
                name: {type: string}
      responses:
        "200": {description: ok}
"#;

fn strict_form_dispatcher() -> Dispatcher {
    let operations = brrtguard::spec::load_spec_from_str(OPENAPI3_FORM).unwrap();
    let options = OperationOptions {
        strict_validation: true,
        ..OperationOptions::default()
    };
    let mut dispatcher = Dispatcher::new(operations, options, ValidatorCache::default());
    dispatcher
        .register_handler("add_pet_form", |req: &ParsedRequest| {
            json!(req.body_data.clone().unwrap_or_default())
        })
        .unwrap();
    dispatcher
}

#[test]
fn test_strict_mode_accepts_request_body_form_fields() {
    let dispatcher = strict_form_dispatcher();
    let req = ParsedRequest::new(Method::POST, "/pets")
        .with_content_type("application/x-www-form-urlencoded")
        .with_form("name", "Rex");
    let resp = dispatcher.dispatch("add_pet_form", req).unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json().unwrap(), json!({"name": "Rex"}));
}

#[test]
fn test_strict_mode_rejects_fields_missing_from_request_body_schema() {
    let dispatcher = strict_form_dispatcher();
    let req = ParsedRequest::new(Method::POST, "/pets")
        .with_content_type("application/x-www-form-urlencoded")
        .with_form("name", "Rex")
        .with_form("rogue", "1");
    let resp = dispatcher.dispatch("add_pet_form", req).unwrap();
    assert_eq!(resp.status, 400);
    assert_eq!(resp.json().unwrap()["extra_formData"], json!(["rogue"]));
}

#[test]
fn test_parameter_validator_leaves_body_form_fields_alone() {
    let params = [ParameterMeta::new("limit", ParameterLocation::Query, json!({"type": "integer"}))];
    let v = validator(&params, true);
    let req = ParsedRequest::new(Method::POST, "/").with_form("name", "Rex");
    assert!(v.validate(&req).is_ok());
}
