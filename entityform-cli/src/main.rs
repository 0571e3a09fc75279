use std::fmt::Write as FmtWrite;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Report, Result, WrapErr, eyre};
use indexmap::IndexSet;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use entityform::{
    DocumentFormat, EntityValues, FieldOverrides, OutputDestination, OutputOptions, Ruleset,
    SchemaId, SchemaRegistry, emit, form::ResolveContext, form::resolve_fields,
    init_entity_values, parse_document_str, parse_entity_schemas, reconcile,
};

const LOG_ENV: &str = "ENTITYFORM_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "entityform",
    version,
    about = "Inspect entity schemas: defaults, validation, field resolution and reconciliation"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output destination ("-" writes to stdout)
    #[arg(short = 'o', long = "output", value_name = "DEST", global = true)]
    output: Option<String>,

    /// Emit compact JSON/TOML rather than pretty formatting
    #[arg(long = "no-pretty", global = true)]
    no_pretty: bool,

    /// Overwrite the output file even if it already exists
    #[arg(short = 'f', long = "force", short_alias = 'y', alias = "yes", global = true)]
    force: bool,

    /// Increase log verbosity (-v info, -vv debug); ENTITYFORM_LOG overrides it
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the initial values of a new entity
    Defaults(SchemaArgs),
    /// Validate entity values against a schema
    Validate {
        #[command(flatten)]
        schema: SchemaArgs,
        /// Values source: file path, inline payload, or "-" for stdin
        #[arg(short = 'd', long = "values", value_name = "SPEC")]
        values: String,
    },
    /// Resolve the field descriptors a form would render
    Fields {
        #[command(flatten)]
        schema: SchemaArgs,
        /// Current values; defaults are used when omitted
        #[arg(short = 'd', long = "values", value_name = "SPEC")]
        values: Option<String>,
        /// Latest live values, to flag touched fields that changed upstream
        #[arg(long = "live", value_name = "SPEC")]
        live: Option<String>,
        /// Fields the user has edited
        #[arg(short = 't', long = "touched", value_name = "KEY", value_delimiter = ',')]
        touched: Vec<String>,
    },
    /// Merge a live snapshot into local values
    Reconcile {
        #[command(flatten)]
        schema: SchemaArgs,
        #[arg(long = "baseline", value_name = "SPEC")]
        baseline: String,
        #[arg(long = "live", value_name = "SPEC")]
        live: String,
        #[arg(long = "local", value_name = "SPEC")]
        local: String,
        #[arg(short = 't', long = "touched", value_name = "KEY", value_delimiter = ',')]
        touched: Vec<String>,
    },
}

#[derive(Debug, Args)]
struct SchemaArgs {
    /// Schema source: file path, inline payload, or "-" for stdin
    #[arg(short = 's', long = "schema", value_name = "SPEC")]
    schema: String,

    /// Schema to use from a bundle; defaults to the first one
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    name: Option<String>,
}

#[derive(Debug)]
enum InputSource {
    File(PathBuf),
    Stdin,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut diagnostics = DiagnosticCollector::default();
    let output = build_output_options(&cli, &mut diagnostics);
    diagnostics.into_result()?;

    let result = match &cli.command {
        Command::Defaults(args) => {
            let (registry, id) = load_schema(args)?;
            let schema = registry
                .get(id)
                .ok_or_else(|| eyre!("schema vanished from registry"))?;
            Value::Object(init_entity_values(schema))
        }
        Command::Validate { schema, values } => {
            let (registry, id) = load_schema(schema)?;
            let values = load_values(values, "values")?;
            let ruleset = Ruleset::compile(Arc::new(registry), id)?;
            let errors = ruleset.validate(&values);
            let report = json!({ "valid": errors.is_empty(), "errors": errors });
            emit(&report, &output).map_err(|err| eyre!("{err:#}"))?;
            if errors.is_empty() {
                return Ok(());
            }
            return Err(eyre!("{} validation error(s)", errors.len()));
        }
        Command::Fields {
            schema,
            values,
            live,
            touched,
        } => {
            let (registry, id) = load_schema(schema)?;
            let values = match values {
                Some(spec) => load_values(spec, "values")?,
                None => registry
                    .get(id)
                    .map(init_entity_values)
                    .unwrap_or_default(),
            };
            let live = live
                .as_deref()
                .map(|spec| load_values(spec, "live values"))
                .transpose()?;
            let touched: IndexSet<String> = touched.iter().cloned().collect();
            let overrides = FieldOverrides::new();
            let cx = ResolveContext::new(&registry, id, &overrides, &touched)
                .with_live(live.as_ref());
            serde_json::to_value(resolve_fields(&values, &cx))
                .wrap_err("failed to serialize field descriptors")?
        }
        Command::Reconcile {
            schema,
            baseline,
            live,
            local,
            touched,
        } => {
            let (registry, id) = load_schema(schema)?;
            let schema = registry
                .get(id)
                .ok_or_else(|| eyre!("schema vanished from registry"))?;
            let baseline = load_values(baseline, "baseline")?;
            let live = load_values(live, "live values")?;
            let local = load_values(local, "local values")?;
            let touched: IndexSet<String> = touched.iter().cloned().collect();
            let merged = reconcile(schema, &baseline, &live, &local, &touched);
            serde_json::to_value(merged).wrap_err("failed to serialize reconciliation")?
        }
    };

    emit(&result, &output).map_err(|err| eyre!("{err:#}"))
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_schema(args: &SchemaArgs) -> Result<(SchemaRegistry, SchemaId)> {
    let document = load_value(&args.schema, "schema")?;
    let registry = parse_entity_schemas(&document).map_err(|err| eyre!("{err:#}"))?;
    let id = match args.name.as_deref() {
        Some(name) => registry
            .id_of(name)
            .ok_or_else(|| eyre!("schema '{name}' is not in the document"))?,
        None => registry
            .iter()
            .next()
            .map(|(id, _)| id)
            .ok_or_else(|| eyre!("the schema document is empty"))?,
    };
    Ok((registry, id))
}

fn load_values(spec: &str, label: &str) -> Result<EntityValues> {
    match load_value(spec, label)? {
        Value::Object(values) => Ok(values),
        _ => Err(eyre!("{label} must be a map of field names to values")),
    }
}

fn load_value(spec: &str, label: &str) -> Result<Value> {
    let format = if spec == "-" {
        DocumentFormat::default()
    } else {
        DocumentFormat::from_path(Path::new(spec)).unwrap_or_default()
    };
    if spec == "-" {
        let contents = read_from_source(&InputSource::Stdin)?;
        return parse_contents(&contents, format, label);
    }
    if looks_inline(spec) {
        return parse_contents(spec, format, &format!("inline {label}"));
    }

    let path = PathBuf::from(spec);
    match read_from_source(&InputSource::File(path.clone())) {
        Ok(contents) => parse_contents(&contents, format, label),
        Err(err) => {
            if is_not_found(&err) {
                let inline_label = format!("inline {label}");
                return parse_contents(spec, format, &inline_label);
            }
            Err(err.wrap_err(format!("failed to load {label} from {}", path.display())))
        }
    }
}

fn looks_inline(spec: &str) -> bool {
    matches!(spec.trim_start().chars().next(), Some('{' | '['))
}

fn read_from_source(source: &InputSource) -> Result<String> {
    match source {
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .wrap_err("failed to read from stdin")?;
            Ok(buffer)
        }
        InputSource::File(path) => fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read file {}", path.display())),
    }
}

fn is_not_found(err: &Report) -> bool {
    err.downcast_ref::<io::Error>()
        .is_some_and(|io_err| io_err.kind() == io::ErrorKind::NotFound)
}

fn parse_contents(contents: &str, format: DocumentFormat, label: &str) -> Result<Value> {
    match parse_document_str(contents, format) {
        Ok(value) => Ok(value),
        Err(primary) => {
            for candidate in DocumentFormat::available_formats() {
                if candidate == format {
                    continue;
                }
                if let Ok(value) = parse_document_str(contents, candidate) {
                    return Ok(value);
                }
            }
            Err(Report::msg(format!(
                "failed to parse {label}: tried {} (first error: {primary})",
                format_list()
            )))
        }
    }
}

fn format_list() -> String {
    let items: Vec<String> = DocumentFormat::available_formats()
        .into_iter()
        .map(|fmt| fmt.to_string())
        .collect();
    items.join(", ")
}

#[derive(Default)]
struct DiagnosticCollector {
    messages: Vec<String>,
}

impl DiagnosticCollector {
    fn push_output(&mut self, message: impl Into<String>) {
        self.messages.push(format!("output: {}", message.into()));
    }

    fn into_result(self) -> Result<()> {
        if self.messages.is_empty() {
            return Ok(());
        }
        let mut body = String::from("encountered output issues:\n");
        for (idx, msg) in self.messages.iter().enumerate() {
            let _ = writeln!(body, "  {}. {}", idx + 1, msg);
        }
        Err(eyre!(body))
    }
}

fn build_output_options(cli: &Cli, diagnostics: &mut DiagnosticCollector) -> OutputOptions {
    let options = OutputOptions::default().with_pretty(!cli.no_pretty);
    let Some(raw) = cli.output.as_deref() else {
        return options;
    };
    if raw.trim().is_empty() {
        diagnostics.push_output("output destination cannot be empty");
        return options;
    }
    if raw == "-" {
        return options;
    }

    let path = PathBuf::from(raw);
    let format = match DocumentFormat::from_path(&path) {
        Some(format) => format,
        None => {
            diagnostics.push_output(format!(
                "cannot infer format from output file {}; use one of: {}",
                path.display(),
                format_list()
            ));
            DocumentFormat::default()
        }
    };
    if !cli.force && path.exists() {
        diagnostics.push_output(format!(
            "file {} already exists (pass --force to overwrite)",
            path.display()
        ));
    }
    OutputOptions {
        format,
        ..options.with_destination(OutputDestination::File(path))
    }
}
