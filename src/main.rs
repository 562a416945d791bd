//! Purpose: `protoform` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Command output is a single JSON value on stdout.
//! Invariants: Errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.

use clap::{Parser, Subcommand};
use protoform::api::{
    Error, ErrorKind, LoadOptions, Registry, SchemaDocument, build, extract, fill, to_exit_code,
    unqualified,
};
use serde_json::{Value, json};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::{fs, io};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "protoform",
    version,
    about = "Build, fill, and validate protobuf request forms from reflection schemas"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List message and enum types in a schema document.
    Types {
        /// Path to a reflection schema document (JSON).
        schema: PathBuf,
    },
    /// Show the fields of one message type.
    Fields {
        schema: PathBuf,
        /// Fully-qualified message name, e.g. demo.EchoRequest.
        message: String,
    },
    /// Build a form for a message type and extract its default value.
    Defaults {
        schema: PathBuf,
        message: String,
    },
    /// Fill a form from a JSON object of raw inputs and validate it.
    Check {
        schema: PathBuf,
        message: String,
        /// JSON object of raw field inputs; use `-` to read stdin.
        #[arg(long)]
        input: String,
    },
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = Cli::parse();
    match cli.command {
        Command::Types { schema } => {
            let document = load_schema(&schema)?;
            let registry = document.registry();
            emit_json(json!({
                "messages": registry.message_names(),
                "enums": registry.enum_names(),
                "input_type": document.input_type(),
            }));
            Ok(0)
        }
        Command::Fields { schema, message } => {
            let document = load_schema(&schema)?;
            let descriptor = document.registry().resolve_message(&message)?;
            let rows: Vec<Value> = descriptor
                .fields
                .iter()
                .map(|field| field_row(document.registry(), descriptor.prefix_name.as_deref(), field))
                .collect();
            emit_json(json!({ "message": unqualified(&message), "fields": rows }));
            Ok(0)
        }
        Command::Defaults { schema, message } => {
            let document = load_schema(&schema)?;
            let descriptor = document.registry().resolve_message(&message)?;
            let tree = build(document.registry(), &descriptor);
            let extraction = extract(&tree);
            emit_json(json!({
                "message": unqualified(&message),
                "value": extraction.value,
                "errors": extraction.errors,
                "issues": tree.issues(),
            }));
            Ok(0)
        }
        Command::Check {
            schema,
            message,
            input,
        } => {
            let document = load_schema(&schema)?;
            let descriptor = document.registry().resolve_message(&message)?;
            let mut tree = build(document.registry(), &descriptor);
            let raw = read_input(&input)?;
            let values: Value = serde_json::from_str(&raw).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("input is not valid JSON")
                    .with_hint("pass a JSON object of field name to raw value")
                    .with_source(err)
            })?;
            fill(&mut tree, document.registry(), &values)?;

            let extraction = extract(&tree);
            emit_json(json!({
                "message": unqualified(&message),
                "value": extraction.value,
                "errors": extraction.errors,
            }));
            if extraction.is_clean() {
                Ok(0)
            } else {
                Ok(to_exit_code(ErrorKind::Invalid))
            }
        }
    }
}

fn load_schema(path: &Path) -> Result<SchemaDocument, Error> {
    let text = fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read schema document {}", path.display()))
            .with_source(err)
    })?;
    let options = LoadOptions {
        sort_fields_by_number: true,
    };
    SchemaDocument::from_json(&text, &options)
}

fn read_input(input: &str) -> Result<String, Error> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read input from stdin")
                .with_source(err)
        })?;
        return Ok(buffer);
    }
    fs::read_to_string(input).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read input file {input}"))
            .with_source(err)
    })
}

fn field_row(registry: &Registry, prefix: Option<&str>, field: &protoform::api::FieldDescriptor) -> Value {
    let type_display = match &field.type_name {
        Some(name) => unqualified(name).to_string(),
        None => field.field_type.name().to_string(),
    };
    let comment = prefix
        .map(|prefix| format!("{prefix}.{}", field.name))
        .and_then(|key| registry.comment(&key).map(str::to_string));
    json!({
        "name": field.name,
        "number": field.number,
        "type": type_display,
        "label": field.label.name(),
        "default": field.default_value,
        "comment": comment,
    })
}

fn emit_json(value: Value) {
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    println!("{json}");
}

fn emit_error(err: &Error) {
    let value = json!({
        "error": {
            "kind": format!("{:?}", err.kind()),
            "message": err.to_string(),
            "field": err.field(),
            "type_name": err.type_name(),
            "hint": err.hint(),
        }
    });
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
