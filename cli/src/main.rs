use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Once;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kiln_core::{Engine, EngineBuilder, Runtime, RuntimeConfig, Value, ValueTag};


static TRACE_INIT: Once = Once::new();
const DEFAULT_TRACE_FILTER: &str = "kiln::compile=debug,kiln::opt=debug,kiln::vm=debug,kiln_cli=info";

#[derive(Debug, Parser)]
#[command(name = "kiln", author, version, about = "CLI for Kiln", long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: Commands,

    /// TOML file with runtime limits (`stack_capacity`, `max_frames`)
    #[arg(long, global = true, value_name = "FILE", value_parser = parse_sanitized_path)]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile and execute a script; trailing arguments become `args`
    Run {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print the optimized instructions of every function
    Dump {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        /// Skip the peephole optimizer
        #[arg(long)]
        no_opt: bool,
    },
}

/// Script and config paths stay below the working directory.
fn script_path(raw: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(raw);
    if path.components().any(|c| c == Component::ParentDir) {
        anyhow::bail!("refusing path '{raw}': '..' segments are not allowed");
    }
    Ok(path.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    script_path(raw).map_err(|e| e.to_string())
}

/// What `KILN_TRACE` asks for.
#[derive(Debug, PartialEq, Eq)]
enum TraceRequest {
    Off,
    /// `RUST_LOG` if set, else the built-in kiln filter.
    Default,
    Filter(String),
}

impl TraceRequest {
    fn parse(raw: &str) -> Self {
        let value = raw.trim();
        match value.to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "off" => Self::Off,
            "1" | "true" | "on" => Self::Default,
            _ => Self::Filter(value.to_string()),
        }
    }
}

fn maybe_init_tracing() {
    let Ok(raw) = std::env::var("KILN_TRACE") else {
        return;
    };
    let filter_expr = match TraceRequest::parse(&raw) {
        TraceRequest::Off => return,
        TraceRequest::Default => std::env::var("RUST_LOG").ok(),
        TraceRequest::Filter(expr) => Some(expr),
    };

    TRACE_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt};

        let builder = fmt().with_writer(std::io::stderr);
        let builder = match filter_expr.and_then(|expr| EnvFilter::try_new(expr).ok()) {
            Some(filter) => builder.with_env_filter(filter),
            None => builder.with_env_filter(DEFAULT_TRACE_FILTER),
        };
        let _ = builder.try_init();
    });
}

fn write_line(text: &str, newline: bool) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(text.as_bytes())?;
    if newline {
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Host functions available to scripts run from the command line.
fn engine() -> Engine {
    let mut builder = EngineBuilder::new();
    builder
        .register_host_function("print", 1, false, |_, args| {
            write_line(&args[0].display_string(), false)?;
            Ok(Value::Null)
        })
        .register_host_function("println", 1, false, |_, args| {
            write_line(&args[0].display_string(), true)?;
            Ok(Value::Null)
        })
        .register_host_function("println", 0, false, |_, _| {
            write_line("", true)?;
            Ok(Value::Null)
        })
        .register_host_method(ValueTag::String, "len", 1, |_, args| Ok(Value::from(args[0].len()?)))
        .register_host_method(ValueTag::Map, "len", 1, |_, args| Ok(Value::from(args[0].len()?)));
    builder.build()
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read config '{}'", path.display()))?;
    RuntimeConfig::from_toml_str(&text).with_context(|| format!("Invalid config '{}'", path.display()))
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file '{}'", path.display()))
}

fn origin_of(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy())
        .into_owned()
}

fn run_file(path: &Path, args: &[String], config: RuntimeConfig) -> anyhow::Result<()> {
    let source = read_source(path)?;
    let unit = engine().compile(&source, &origin_of(path))?;
    let mut runtime = Runtime::with_config(unit, config);
    let args = args.iter().map(|a| Value::from(a.as_str())).collect();
    let result = runtime.execute(args)?;
    if !matches!(result, Value::Null) {
        write_line(&result.display_string(), true)?;
    }
    Ok(())
}

fn dump_file(path: &Path, optimize: bool) -> anyhow::Result<()> {
    let source = read_source(path)?;
    let options = kiln_core::CompileOptions { optimize };
    let unit = engine().compile_with(&source, &origin_of(path), &options)?;
    write_line(&unit.disassemble(), false)
}

fn main() -> anyhow::Result<()> {
    maybe_init_tracing();
    let cli = CliArgs::parse();
    match cli.command {
        Commands::Run { file, args } => {
            let config = load_config(cli.config.as_deref())?;
            run_file(&file, &args, config)
        }
        Commands::Dump { file, no_opt } => dump_file(&file, !no_opt),
    }
}
