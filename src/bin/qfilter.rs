//! qfilter: translate query strings to SQL from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Translate a query string
//! qfilter '_from=users&name__icont=ann&_order=-id'
//!
//! # Extra params and JSON output
//! qfilter 'age__gte=18' -p status=active --from users --format json
//!
//! # Explain how a key is read
//! qfilter explain created_at__gte
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use qfilter::operators::value_text;
use qfilter::prelude::*;
use qfilter::query_string::split_assignment;
use qfilter::translator::{FROM_KEY, ORDER_KEY, SELECT_KEY};
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qfilter")]
#[command(version)]
#[command(about = "Translate query-string filters into parameterized SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    qfilter '_from=users&name__icont=ann&_order=-id'
    qfilter 'age__gte=18' -p status=active --from users --typed
    qfilter 'q.id__any=1,2&page=3' --prefix q --format json
    qfilter explain created_at__gte")]
struct Cli {
    /// Query string to translate (a leading '?' is fine)
    query: Option<String>,

    /// Extra key=value parameters, read after the query string (put under --prefix)
    #[arg(short, long = "param")]
    params: Vec<String>,

    /// Columns to select (sets _select)
    #[arg(long)]
    select: Option<String>,

    /// Source relation (sets _from)
    #[arg(long)]
    from: Option<String>,

    /// Ordering, '-col' for descending (sets _order)
    #[arg(long)]
    order: Option<String>,

    /// Only read keys shaped '<prefix>.<key>'
    #[arg(long)]
    prefix: Option<String>,

    /// Pass _from through verbatim
    #[arg(long)]
    no_quote_from: bool,

    /// Emit field paths without quotes
    #[arg(long)]
    no_quote_fields: bool,

    /// Bind numbers and booleans as such instead of strings
    #[arg(short, long)]
    typed: bool,

    /// Config file (defaults to the per-user qfilter/config.toml)
    #[arg(short, long, env = "QFILTER_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in and configured operators
    Operators,
    /// Show how a filter key is read
    Explain {
        /// The filter key, e.g. created_at__gte
        key: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "qfilter=debug" } else { "qfilter=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let options = build_options(cli)?;

    match &cli.command {
        Some(Commands::Operators) => {
            show_operators(&options);
            Ok(())
        }
        Some(Commands::Explain { key }) => {
            explain_key(key, &options);
            Ok(())
        }
        None => translate_query(cli, &options),
    }
}

fn build_options(cli: &Cli) -> anyhow::Result<FilterOptions> {
    let config = match &cli.config {
        Some(path) => FilterConfig::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => FilterConfig::load_default().context("reading default config")?,
    };

    let mut options = config.into_options()?;
    if let Some(prefix) = &cli.prefix {
        options.key_prefix = Some(prefix.clone());
    }
    if cli.no_quote_from {
        options.quote_identifiers_in_from = false;
    }
    if cli.no_quote_fields {
        options.quote_field_identifiers = false;
    }
    Ok(options)
}

fn collect_params(cli: &Cli, options: &FilterOptions) -> anyhow::Result<Params> {
    let query = cli.query.as_deref().unwrap_or("");
    let mut params = if cli.typed {
        parse_query_string_typed(query)?
    } else {
        parse_query_string(query)?
    };

    for raw in &cli.params {
        let (key, val) = split_assignment(raw)
            .with_context(|| format!("expected key=value, got '{}'", raw))?;
        params.insert(scoped_key(options, key), scalar(val, cli.typed));
    }

    let reserved = [
        (SELECT_KEY, &cli.select),
        (FROM_KEY, &cli.from),
        (ORDER_KEY, &cli.order),
    ];
    for (name, flag) in reserved {
        if let Some(val) = flag {
            params.insert(scoped_key(options, name), Value::String(val.clone()));
        }
    }

    Ok(params)
}

/// Put a flag-supplied key under the configured prefix, unless it already is.
fn scoped_key(options: &FilterOptions, key: &str) -> String {
    match &options.key_prefix {
        Some(prefix) if !key.starts_with(&format!("{}.", prefix)) => format!("{}.{}", prefix, key),
        _ => key.to_string(),
    }
}

fn scalar(raw: &str, typed: bool) -> Value {
    if typed {
        qfilter::query_string::infer_scalar(raw)
    } else {
        Value::String(raw.to_string())
    }
}

fn translate_query(cli: &Cli, options: &FilterOptions) -> anyhow::Result<()> {
    let params = collect_params(cli, options)?;
    if cli.query.is_none() && params.is_empty() {
        println!("{}", "qfilter: query strings in, parameterized SQL out".cyan().bold());
        println!();
        println!("Usage: qfilter <QUERY> [OPTIONS]");
        println!();
        println!("Try: qfilter --help");
        return Ok(());
    }

    if cli.verbose {
        eprintln!("{} {} parameter(s)", "Input:".dimmed(), params.len());
    }

    let query = translate(&params, options)?;

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&query)?);
        }
        OutputFormat::Text => {
            println!("{}", "SQL:".green().bold());
            println!("  {}", query.sql.white());

            if !query.data.is_empty() {
                println!();
                println!("{}", "Binds:".cyan());
                for (name, val) in &query.data {
                    println!("  :{} = {}", name, val.to_string().yellow());
                }
            }
        }
    }

    Ok(())
}

fn show_operators(options: &FilterOptions) {
    println!("{}", "qfilter operators".cyan().bold());
    println!();
    println!(
        "{:10} {:34} {}",
        "Suffix".white().bold(),
        "Predicate".white().bold(),
        "Bind value".white().bold()
    );
    println!("{}", "─".repeat(64).dimmed());

    for op in Builtin::ALL {
        let overridden = options.custom_operators.contains(op.name());
        let name = if overridden {
            format!("{} *", op.name())
        } else {
            op.name().to_string()
        };
        println!(
            "{:10} {:34} {}",
            name.cyan().bold(),
            op.shape(),
            describe(op.transform()).dimmed()
        );
    }

    if !options.custom_operators.is_empty() {
        println!();
        println!("{}", "Custom (* marks an override):".yellow());
        for name in options.custom_operators.names() {
            let sample = options
                .custom_operators
                .get(name)
                .map(|op| op.build("field", "key", &Value::String("value".to_string())));
            match sample {
                Some(Ok(p)) => println!("  {:10} {}", name.cyan(), p.sql),
                _ => println!("  {:10} {}", name.cyan(), "(no sample)".dimmed()),
            }
        }
    }
}

fn describe(transform: ValueTransform) -> &'static str {
    match transform {
        ValueTransform::None => "as given",
        ValueTransform::Starts => "value%",
        ValueTransform::Ends => "%value",
        ValueTransform::Contains => "%value%",
        ValueTransform::Split => "split on ','",
    }
}

fn explain_key(key: &str, options: &FilterOptions) {
    let parsed = FilterKey::parse(key);
    println!("{}", "qfilter key explanation".cyan().bold());
    println!();
    println!("  {} {}", "Key:".dimmed(), key.yellow());

    let resolved = parsed
        .suffix
        .and_then(|s| options.custom_operators.resolve(s).map(|(op, source)| (s, op, source)));

    let (field, op, operator) = match resolved {
        Some((name, op, source)) => (parsed.field, op, format!("{} ({})", name, source)),
        None => (key, Builtin::Eq.as_operator(), "eq (default, whole key)".to_string()),
    };
    println!("  {} {}", "Field:".dimmed(), field.white());
    println!("  {} {}", "Operator:".dimmed(), operator.cyan());
    println!("  {} :{}", "Bind:".dimmed(), key);

    let sample = Value::String("value".to_string());
    let column = qfilter::ident::field(field, options.quote_field_identifiers);
    let built = op.build(&column, key, &sample);

    match built {
        Ok(p) => {
            println!();
            println!("{}", "Predicate:".green().bold());
            println!("  {}", p.sql.white());
            println!("  {} {}", "'value' binds as".dimmed(), value_text(&p.value).yellow());
        }
        Err(e) => eprintln!("{} {}", "Operator Error:".red().bold(), e),
    }
}
