//! Consolidation of array-typed parameters.
//!
//! Array values reach the server as one or more string occurrences
//! (`?x=a,b&x=c`). Before validation each array parameter is replaced with a
//! single materialized [`ParamValue::Array`] according to the configured
//! [`ArrayParser`] and the parameter's collection format.

use crate::server::{MultiMap, ParamValue, ParsedRequest};
use crate::spec::{CollectionFormat, ParameterLocation, ParameterMeta};
use std::str::FromStr;
use tracing::debug;

/// How repeated occurrences of a non-`multi` array parameter are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayParser {
    /// Honor the collection format: `multi` flattens every occurrence,
    /// anything else splits the last occurrence only.
    #[default]
    StrictCollectionFormat,
    /// Like `StrictCollectionFormat`, but non-`multi` formats use the first
    /// occurrence.
    FirstValue,
    /// Split every occurrence by the declared delimiter and flatten.
    AlwaysMulti,
}

impl ArrayParser {
    /// Merge the raw occurrences of one parameter into a flat list of items.
    pub fn consolidate(&self, occurrences: &[&str], format: CollectionFormat) -> Vec<String> {
        let delimiter = format.delimiter();
        let selected: Vec<&str> = match (self, format) {
            (ArrayParser::AlwaysMulti, _) | (_, CollectionFormat::Multi) => occurrences.to_vec(),
            (ArrayParser::StrictCollectionFormat, _) => occurrences.last().copied().into_iter().collect(),
            (ArrayParser::FirstValue, _) => occurrences.first().copied().into_iter().collect(),
        };
        selected
            .into_iter()
            .flat_map(|occurrence| split_value(occurrence, delimiter))
            .collect()
    }

    /// Replace every array-typed query, formData and path parameter of
    /// `request` with its materialized list.
    ///
    /// Parameters that are absent, not array-typed, or already materialized
    /// are left alone. Headers are split later by the parameter validator.
    pub fn normalize(&self, parameters: &[ParameterMeta], request: &mut ParsedRequest) {
        for param in parameters.iter().filter(|p| p.is_array()) {
            match param.location {
                ParameterLocation::Query => self.normalize_map(param, &mut request.query),
                ParameterLocation::FormData => self.normalize_map(param, &mut request.form),
                ParameterLocation::Path => normalize_path(param, &mut request.path_params),
                ParameterLocation::Header => {}
            }
        }
    }

    fn normalize_map(&self, param: &ParameterMeta, map: &mut MultiMap) {
        let occurrences = map.get_all(&param.name);
        if occurrences.is_empty() {
            return;
        }
        let raw: Option<Vec<&str>> = occurrences.iter().map(|v| v.as_str()).collect();
        let Some(raw) = raw else {
            return;
        };
        let items = self.consolidate(&raw, param.collection_format);
        debug!(
            parameter = %param.name,
            location = %param.location,
            collection_format = %param.collection_format,
            occurrences = raw.len(),
            items = items.len(),
            "Array parameter consolidated"
        );
        map.replace(&param.name, items);
    }
}

/// Path captures are single strings and split the same way under every
/// strategy.
fn normalize_path(param: &ParameterMeta, path_params: &mut MultiMap) {
    let Some(ParamValue::Single(raw)) = path_params.get(&param.name) else {
        return;
    };
    let items = split_value(raw, param.collection_format.delimiter());
    path_params.replace(&param.name, items);
}

fn split_value(value: &str, delimiter: char) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(delimiter).map(str::to_string).collect()
}

impl FromStr for ArrayParser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "strict-collection-format" => Ok(ArrayParser::StrictCollectionFormat),
            "first-value" | "first" => Ok(ArrayParser::FirstValue),
            "always-multi" | "multi" => Ok(ArrayParser::AlwaysMulti),
            other => Err(format!(
                "unknown array parser '{other}' (expected strict, first-value or always-multi)"
            )),
        }
    }
}

impl std::fmt::Display for ArrayParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ArrayParser::StrictCollectionFormat => "strict",
            ArrayParser::FirstValue => "first-value",
            ArrayParser::AlwaysMulti => "always-multi",
        };
        write!(f, "{}", s)
    }
}
