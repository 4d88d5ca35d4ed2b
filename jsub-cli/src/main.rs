//! jsub CLI - Command-line tool for JSON subset extraction
//!
//! This binary provides command-line interfaces for:
//! - extract: pull a subset document and named metadata out of one JSON value
//! - tokens: print the token stream of a JSON document

use clap::{ArgAction, Parser, Subcommand};
use jsub_format::ErrorKind;
use jsub_io::{
    extract_from_reader, ExtractError, ExtractOptions, ExtractRequest, JsonTokenReader, Limits,
    ReaderLimits, SelectionSpec, TokenSource,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "jsub")]
#[command(about = "Single-pass JSON subset and metadata extraction")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a subset and metadata from a JSON document
    ///
    /// Selections are JSON objects given inline or as @FILE.
    ///
    /// Examples:
    ///   jsub extract doc.json --fields '{"list":{"[*]":{"id":{}}}}'
    ///   jsub extract - --keys '{}' --metadata '{"n":"length(list)"}'
    ///   jsub extract doc.json --config jsub.toml --pretty
    Extract {
        /// Input file, or - for stdin
        input: String,
        /// Keys-of selection (JSON object or @FILE)
        #[arg(long)]
        keys: Option<String>,
        /// Full-copy selection (JSON object or @FILE)
        #[arg(long)]
        fields: Option<String>,
        /// Metadata selection: name to path expression (JSON object or @FILE)
        #[arg(long)]
        metadata: Option<String>,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Maximum subset size in bytes
        #[arg(long)]
        max_subset_size: Option<u64>,
        /// Maximum metadata size in bytes
        #[arg(long)]
        max_metadata_size: Option<u64>,
        /// Maximum nesting depth of the input
        #[arg(long)]
        max_depth: Option<usize>,
        /// Accept content after the first JSON value
        #[arg(long)]
        allow_trailing: bool,
        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the token stream of a JSON document, one token per line
    Tokens {
        /// Input file, or - for stdin
        input: String,
        /// Maximum nesting depth of the input
        #[arg(long)]
        max_depth: Option<usize>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid {what}: {reason}")]
    Invalid { what: String, reason: String },
}

impl CliError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        CliError::Io {
            context: context.into(),
            source,
        }
    }

    fn invalid(what: impl Into<String>, reason: impl ToString) -> Self {
        CliError::Invalid {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    fn exit_code(&self) -> u8 {
        match self {
            CliError::Extract(err) => match err.kind() {
                ErrorKind::Structure | ErrorKind::Selection => 2,
                ErrorKind::SizeExceeded => 3,
                ErrorKind::TokenStream | ErrorKind::Internal => 1,
            },
            CliError::Invalid { .. } => 2,
            CliError::Io { .. } => 1,
        }
    }
}

impl From<jsub_io::TokenError> for CliError {
    fn from(err: jsub_io::TokenError) -> Self {
        CliError::Extract(err.into())
    }
}

/// TOML configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    limits: LimitsSection,
    reader: ReaderSection,
    selection: SelectionSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LimitsSection {
    max_subset_size: Option<u64>,
    max_metadata_size: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ReaderSection {
    max_depth: Option<usize>,
    max_string_len: Option<usize>,
}

/// Selections as JSON text
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SelectionSection {
    keys: Option<String>,
    fields: Option<String>,
    metadata: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Extract {
            input,
            keys,
            fields,
            metadata,
            config,
            max_subset_size,
            max_metadata_size,
            max_depth,
            allow_trailing,
            pretty,
            output,
        } => {
            let overrides = Overrides {
                keys,
                fields,
                metadata,
                max_subset_size,
                max_metadata_size,
                max_depth,
                allow_trailing,
            };
            handle_extract(&input, config.as_deref(), overrides, pretty, output.as_deref())
        }
        Commands::Tokens { input, max_depth } => handle_tokens(&input, max_depth),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Command-line values taking precedence over the config file
struct Overrides {
    keys: Option<String>,
    fields: Option<String>,
    metadata: Option<String>,
    max_subset_size: Option<u64>,
    max_metadata_size: Option<u64>,
    max_depth: Option<usize>,
    allow_trailing: bool,
}

fn handle_extract(
    input: &str,
    config: Option<&Path>,
    overrides: Overrides,
    pretty: bool,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => ConfigFile::default(),
    };
    let request = build_request(config, overrides)?;
    tracing::debug!(selection = ?request.selection, "extract request built");

    let reader = open_input(input)?;
    let summary = extract_from_reader(reader, &request)?;
    tracing::info!(
        tokens_read = summary.metrics.tokens_read,
        bytes_read = summary.metrics.bytes_read,
        subset_bytes = summary.metrics.subset_bytes,
        metadata_bytes = summary.metrics.metadata_bytes,
        elapsed_ms = summary.metrics.duration.as_millis() as u64,
        "extraction complete"
    );

    let document = json!({
        "subset": summary.extracted.subset.unwrap_or(Value::Null),
        "metadata": summary.extracted.metadata.to_json_map(),
    });
    let text = if pretty {
        serde_json::to_string_pretty(&document)
    } else {
        serde_json::to_string(&document)
    }
    .map_err(|err| CliError::invalid("output", err))?;

    match output {
        Some(path) => fs::write(path, format!("{}\n", text))
            .map_err(|err| CliError::io(format!("failed to write {}", path.display()), err)),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", text).map_err(|err| CliError::io("failed to write output", err))
        }
    }
}

fn build_request(config: ConfigFile, overrides: Overrides) -> Result<ExtractRequest, CliError> {
    let keys = overrides.keys.or(config.selection.keys);
    let fields = overrides.fields.or(config.selection.fields);
    let metadata = overrides.metadata.or(config.selection.metadata);

    let selection = SelectionSpec {
        keys: keys.map(|text| parse_selection("keys", &text)).transpose()?,
        fields: fields.map(|text| parse_selection("fields", &text)).transpose()?,
        metadata: metadata
            .map(|text| parse_selection("metadata", &text))
            .transpose()?,
    };
    if selection.is_empty() {
        tracing::warn!("no keys, fields or metadata selection given; output will be empty");
    }

    let defaults = ExtractOptions::default();
    let limits = Limits {
        max_subset_size: overrides
            .max_subset_size
            .or(config.limits.max_subset_size)
            .unwrap_or(defaults.limits.max_subset_size),
        max_metadata_size: overrides
            .max_metadata_size
            .or(config.limits.max_metadata_size)
            .unwrap_or(defaults.limits.max_metadata_size),
    };
    let reader_limits = ReaderLimits {
        max_depth: overrides
            .max_depth
            .or(config.reader.max_depth)
            .unwrap_or(defaults.reader_limits.max_depth),
        max_string_len: config
            .reader
            .max_string_len
            .unwrap_or(defaults.reader_limits.max_string_len),
    };

    Ok(ExtractRequest {
        selection,
        options: ExtractOptions {
            limits,
            reader_limits,
            require_single_value: !overrides.allow_trailing,
        },
    })
}

fn load_config(path: &Path) -> Result<ConfigFile, CliError> {
    let text = fs::read_to_string(path)
        .map_err(|err| CliError::io(format!("failed to read config {}", path.display()), err))?;
    toml::from_str(&text).map_err(|err| CliError::invalid(format!("config {}", path.display()), err))
}

/// Parse inline JSON or `@FILE` into a selection object
fn parse_selection(what: &str, text: &str) -> Result<Map<String, Value>, CliError> {
    let owned;
    let json = match text.strip_prefix('@') {
        Some(path) => {
            owned = fs::read_to_string(path)
                .map_err(|err| CliError::io(format!("failed to read {} file {}", what, path), err))?;
            owned.as_str()
        }
        None => text,
    };
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CliError::invalid(
            format!("{} selection", what),
            format!("expected a JSON object, found {}", json_kind(&other)),
        )),
        Err(err) => Err(CliError::invalid(format!("{} selection", what), err)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn open_input(input: &str) -> Result<Box<dyn Read>, CliError> {
    if input == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(input)
        .map_err(|err| CliError::io(format!("failed to open {}", input), err))?;
    Ok(Box::new(file))
}

fn handle_tokens(input: &str, max_depth: Option<usize>) -> Result<(), CliError> {
    let limits = ReaderLimits {
        max_depth: max_depth.unwrap_or(ReaderLimits::default().max_depth),
        ..ReaderLimits::default()
    };
    let mut reader = JsonTokenReader::with_limits(open_input(input)?, limits)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    while let Some(token) = reader.next_token()? {
        writeln!(out, "{}", token).map_err(|err| CliError::io("failed to write output", err))?;
    }
    reader.finish()?;
    out.flush()
        .map_err(|err| CliError::io("failed to write output", err))?;

    tracing::info!(
        tokens = reader.tokens_read(),
        bytes = reader.bytes_read(),
        "token stream complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_overrides() -> Overrides {
        Overrides {
            keys: None,
            fields: None,
            metadata: None,
            max_subset_size: None,
            max_metadata_size: None,
            max_depth: None,
            allow_trailing: false,
        }
    }

    #[test]
    fn config_file_parses_all_sections() {
        let config: ConfigFile = toml::from_str(
            r#"
            [limits]
            max_subset_size = 1000
            max_metadata_size = 50

            [reader]
            max_depth = 16

            [selection]
            fields = '{"a": {}}'
            metadata = '{"n": "length(a)"}'
            "#,
        )
        .unwrap();
        let request = build_request(config, no_overrides()).unwrap();
        assert_eq!(request.options.limits.max_subset_size, 1000);
        assert_eq!(request.options.limits.max_metadata_size, 50);
        assert_eq!(request.options.reader_limits.max_depth, 16);
        assert!(request.selection.fields.is_some());
        assert!(request.selection.keys.is_none());
        assert!(request.options.require_single_value);
    }

    #[test]
    fn flags_override_config() {
        let config: ConfigFile = toml::from_str("[limits]\nmax_subset_size = 1000\n").unwrap();
        let overrides = Overrides {
            max_subset_size: Some(10),
            keys: Some("{}".to_string()),
            ..no_overrides()
        };
        let request = build_request(config, overrides).unwrap();
        assert_eq!(request.options.limits.max_subset_size, 10);
        assert_eq!(request.options.limits.max_metadata_size, 16_000);
        assert_eq!(request.selection.keys, Some(Map::new()));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        assert!(toml::from_str::<ConfigFile>("[limits]\nmax_size = 1\n").is_err());
    }

    #[test]
    fn selection_must_be_object() {
        let err = parse_selection("fields", "[1]").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("an array"));
        assert!(parse_selection("fields", "{").is_err());
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let size = CliError::Extract(ExtractError::SizeExceeded {
            target: jsub_format::SizeTarget::Subset,
            limit: 1,
            attempted: 2,
        });
        assert_eq!(size.exit_code(), 3);

        let structure = CliError::Extract(ExtractError::Structure {
            path: "a".to_string(),
            reason: "bad".to_string(),
        });
        assert_eq!(structure.exit_code(), 2);

        let token = CliError::from(jsub_io::TokenError::UnexpectedEnd);
        assert_eq!(token.exit_code(), 1);
    }
}
