use crate::dispatcher::{Dispatcher, OperationOptions};
use crate::runtime_config::RuntimeConfig;
use crate::server::{FileUpload, ParsedRequest};
use crate::spec::{load_spec, OperationMeta};
use crate::validator::ArrayParser;
use crate::validator_cache::ValidatorCache;
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::io::Write;
use std::path::PathBuf;

/// Command-line interface for brrtguard
#[derive(Parser, Debug)]
#[command(name = "brrtguard")]
#[command(about = "OpenAPI request validation and coercion", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List operations, parameters and media types of a specification
    Inspect {
        /// Path to the OpenAPI specification file (YAML or JSON)
        #[arg(short, long)]
        spec: PathBuf,
    },
    /// Validate one request against an operation, answered by an echo handler
    Check {
        /// Path to the OpenAPI specification file (YAML or JSON)
        #[arg(short, long)]
        spec: PathBuf,

        /// Operation id (or x-handler name) to run
        #[arg(short, long)]
        operation: String,

        /// Query parameter occurrence `name=value` (repeatable)
        #[arg(long, value_parser = parse_key_value)]
        query: Vec<(String, String)>,

        /// Path parameter `name=value` (repeatable)
        #[arg(long, value_parser = parse_key_value)]
        path: Vec<(String, String)>,

        /// Header `name=value` (repeatable)
        #[arg(long, value_parser = parse_key_value)]
        header: Vec<(String, String)>,

        /// Form field occurrence `name=value` (repeatable)
        #[arg(long, value_parser = parse_key_value)]
        form: Vec<(String, String)>,

        /// Uploaded file `field=path` (repeatable)
        #[arg(long, value_parser = parse_key_value)]
        file: Vec<(String, String)>,

        /// Request Content-Type
        #[arg(long)]
        content_type: Option<String>,

        /// Raw request body
        #[arg(long)]
        body: Option<String>,

        /// Reject undeclared query and form parameters
        #[arg(long, default_value_t = false)]
        strict: bool,

        /// Validate the echoed response against the declared responses
        #[arg(long, default_value_t = false)]
        validate_responses: bool,

        /// Array parameter strategy: strict, first-value or always-multi
        #[arg(long)]
        array_parser: Option<ArrayParser>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{s}'"))
}

/// Parse the process arguments and run the command, writing to stdout.
///
/// # Errors
///
/// Returns an error if the specification cannot be loaded, the operation is
/// unknown, or the echoed response does not conform to the operation.
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&cli, &RuntimeConfig::from_env(), &mut out)
}

/// Run `cli` with `config` as the base configuration.
pub fn execute(cli: &Cli, config: &RuntimeConfig, out: &mut impl Write) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Inspect { spec } => {
            let operations = load_spec(spec)?;
            print_operations(&operations, out)?;
            Ok(())
        }
        Commands::Check {
            spec,
            operation,
            query,
            path,
            header,
            form,
            file,
            content_type,
            body,
            strict,
            validate_responses,
            array_parser,
        } => {
            let mut config = *config;
            config.strict_validation |= *strict;
            config.validate_responses |= *validate_responses;
            if let Some(parser) = array_parser {
                config.array_parser = *parser;
            }

            let operations = load_spec(spec)?;
            let meta = operations
                .iter()
                .find(|op| op.operation_id == *operation)
                .with_context(|| format!("operation '{operation}' not found in {}", spec.display()))?;
            let mut request = ParsedRequest::new(meta.method.clone(), meta.path_pattern.clone());
            for (k, v) in query {
                request = request.with_query(k.as_str(), v.as_str());
            }
            for (k, v) in path {
                request = request.with_path_param(k.as_str(), v.as_str());
            }
            for (k, v) in header {
                request = request.with_header(k, v.as_str());
            }
            for (k, v) in form {
                request = request.with_form(k.as_str(), v.as_str());
            }
            for (field, file_path) in file {
                let data = std::fs::read(file_path)
                    .with_context(|| format!("failed to read upload {file_path}"))?;
                request = request.with_file(field.as_str(), FileUpload::new(file_path.as_str(), data));
            }
            if let Some(ct) = content_type {
                request = request.with_content_type(ct);
            }
            if let Some(body) = body {
                request = request.with_body(body.as_bytes());
            }

            let mut dispatcher = Dispatcher::new(
                operations.clone(),
                OperationOptions::from(&config),
                ValidatorCache::new(config.schema_cache),
            );
            dispatcher.register_handler(operation, echo_handler)?;
            let response = dispatcher.dispatch(operation, request)?;
            writeln!(out, "HTTP {}", response.status)?;
            out.write_all(&response.body)?;
            if !response.body.ends_with(b"\n") {
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

/// Handler answering with what the pipeline handed it: the declared
/// parameters as coerced strings, and the validated body.
pub fn echo_handler(req: &ParsedRequest) -> Value {
    let to_object = |map: &crate::server::MultiMap| -> Value {
        Value::Object(
            map.keys()
                .into_iter()
                .filter_map(|k| map.get(k).map(|v| (k.to_string(), v.to_json())))
                .collect::<Map<String, Value>>(),
        )
    };
    json!({
        "method": req.method.as_str(),
        "query": to_object(&req.query),
        "path_params": to_object(&req.path_params),
        "form": to_object(&req.form),
        "body": req.body_data.clone().unwrap_or(Value::Null),
    })
}

fn print_operations(operations: &[OperationMeta], out: &mut impl Write) -> std::io::Result<()> {
    let mut sorted: Vec<&OperationMeta> = operations.iter().collect();
    sorted.sort_by(|a, b| {
        (a.path_pattern.as_str(), a.method.as_str()).cmp(&(b.path_pattern.as_str(), b.method.as_str()))
    });
    for op in sorted {
        writeln!(out, "{} {} -> {}", op.method, op.path_pattern, op.operation_id)?;
        writeln!(out, "  consumes: {}", op.consumes.join(", "))?;
        writeln!(out, "  produces: {}", op.produces.join(", "))?;
        for p in &op.parameters {
            let ty = p.schema_type().unwrap_or("any");
            let mut flags = Vec::new();
            if p.required {
                flags.push("required".to_string());
            }
            if p.nullable {
                flags.push("nullable".to_string());
            }
            if p.is_array() {
                flags.push(format!("collectionFormat={}", p.collection_format));
            }
            writeln!(out, "  - {} ({}, {}) {}", p.name, p.location, ty, flags.join(" "))?;
        }
        if let Some(body) = &op.body {
            let required = if body.required { " required" } else { "" };
            writeln!(out, "  body:{} {}", required, body.schema)?;
        }
        let mut statuses: Vec<&String> = op.responses.keys().collect();
        statuses.sort();
        if !statuses.is_empty() {
            let statuses: Vec<&str> = statuses.into_iter().map(String::as_str).collect();
            writeln!(out, "  responses: {}", statuses.join(", "))?;
        }
    }
    Ok(())
}
