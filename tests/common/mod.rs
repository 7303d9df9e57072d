#![allow(dead_code)]

use brrtguard::dispatcher::{Dispatcher, OperationOptions};
use brrtguard::spec::{load_spec, OperationMeta};
use brrtguard::validator_cache::ValidatorCache;
use std::io::Write;
use tempfile::NamedTempFile;

pub mod temp_files {
    use super::*;

    /// Write `content` to a temporary file with the given extension. The file
    /// is removed when the returned handle is dropped.
    pub fn create_temp_spec(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("brrtguard_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    pub fn create_temp_yaml(content: &str) -> NamedTempFile {
        create_temp_spec(content, "yaml")
    }

    pub fn create_temp_json(content: &str) -> NamedTempFile {
        create_temp_spec(content, "json")
    }
}

/// Swagger 2 pet store used across the integration tests.
pub const PETSTORE_SWAGGER2: &str = r##"swagger: "2.0"
info:
  title: Pet Store
  version: "1.0.0"
consumes:
  - application/json
produces:
  - application/json
definitions:
  Pet:
    type: object
    required: [name]
    properties:
      id: {type: integer}
      name: {type: string}
      tag: {type: string}
paths:
  /pets:
    get:
      operationId: list_pets
      parameters:
        - name: limit
          in: query
          type: integer
          minimum: 1
        - name: tags
          in: query
          type: array
          items: {type: string}
          collectionFormat: multi
      responses:
        "200":
          description: pets
          schema:
            type: array
            items: {$ref: "#/definitions/Pet"}
    post:
      operationId: add_pet
      parameters:
        - name: pet
          in: body
          required: true
          schema: {$ref: "#/definitions/Pet"}
      responses:
        "201":
          description: created
          schema: {$ref: "#/definitions/Pet"}
          headers:
            Location: {type: string}
  /pets/{pet_id}:
    get:
      operationId: get_pet
      parameters:
        - name: pet_id
          in: path
          required: true
          type: integer
      responses:
        "200":
          description: pet
          schema: {$ref: "#/definitions/Pet"}
        default:
          description: error
  /pets/{pet_id}/photo:
    post:
      operationId: upload_photo
      consumes:
        - multipart/form-data
        - application/x-www-form-urlencoded
      parameters:
        - name: pet_id
          in: path
          required: true
          type: integer
        - name: caption
          in: formData
          type: string
        - name: rating
          in: formData
          type: integer
        - name: photo
          in: formData
          type: file
      responses:
        "200": {description: ok}
"##;

/// The same operations written as an OpenAPI 3 document.
pub const PETSTORE_OPENAPI3: &str = r##"openapi: 3.0.3
info:
  title: Pet Store
  version: "1.0.0"
components:
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        id: {type: integer}
        name: {type: string}
        tag: {type: string}
  parameters:
    PetId:
      name: pet_id
      in: path
      required: true
      schema: {type: integer}
paths:
  /pets:
    get:
      operationId: list_pets
      parameters:
        - name: limit
          in: query
          schema: {type: integer, minimum: 1}
        - name: tags
          in: query
          schema:
            type: array
            items: {type: string}
      responses:
        "200":
          description: pets
          content:
            application/json:
              schema:
                type: array
                items: {$ref: "#/components/schemas/Pet"}
    post:
      operationId: add_pet
      requestBody:
        required: true
        content:
          application/json:
            schema: {$ref: "#/components/schemas/Pet"}
      responses:
        "201":
          description: created
          headers:
            Location:
              required: true
              schema: {type: string}
          content:
            application/json:
              schema: {$ref: "#/components/schemas/Pet"}
  /pets/{pet_id}:
    get:
      operationId: get_pet
      parameters:
        - $ref: "#/components/parameters/PetId"
      responses:
        "200":
          description: pet
          content:
            application/json:
              schema: {$ref: "#/components/schemas/Pet"}
        default:
          description: error
"##;

pub fn petstore_operations() -> Vec<OperationMeta> {
    let file = temp_files::create_temp_yaml(PETSTORE_SWAGGER2);
    load_spec(file.path()).unwrap()
}

pub fn find_operation(operations: &[OperationMeta], operation_id: &str) -> OperationMeta {
    operations
        .iter()
        .find(|op| op.operation_id == operation_id)
        .cloned()
        .unwrap_or_else(|| panic!("operation {operation_id} not found"))
}

pub fn dispatcher_with(options: OperationOptions) -> Dispatcher {
    Dispatcher::new(petstore_operations(), options, ValidatorCache::default())
}
