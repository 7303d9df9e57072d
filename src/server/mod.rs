pub mod request;
pub mod response;

pub use request::{mime_essence, parse_query_params, FileUpload, MultiMap, ParamValue, ParsedRequest};
pub use response::{all_json, dumps, is_json_mimetype, make_response, ApiResponse, HeaderVec};
