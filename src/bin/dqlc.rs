//! Command-line front end for the statement compiler.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use dqlc::{
    db::ClientConfig,
    query::{Field, Function, Query, Value},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dqlc",
    version,
    about = "Compile graph queries from the command line",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for compiled statements"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Compile a single query and print it")]
    Compile(CompileCmd),

    #[command(about = "Print the effective client configuration as TOML")]
    Config(ConfigCmd),
}

#[derive(Args, Debug)]
struct CompileCmd {
    #[arg(long, value_name = "NAME", help = "Root function name (has, eq, uid, ...)")]
    func: String,

    #[arg(
        long = "arg",
        value_name = "KIND=VALUE",
        help = "Function argument; KIND is pred, string, int or uid"
    )]
    args: Vec<String>,

    #[arg(
        long = "field",
        value_name = "PATH",
        help = "Selected field; nested fields use slash paths (friend/name)"
    )]
    fields: Vec<String>,

    #[arg(long, help = "Limit the root block to the first N results")]
    first: Option<i64>,

    #[arg(long, help = "Skip N results of the root block")]
    offset: Option<i64>,

    #[arg(long, value_name = "PREDICATE", help = "Sort the root block ascending")]
    order_asc: Option<String>,

    #[arg(long, value_name = "PREDICATE", help = "Sort the root block descending")]
    order_desc: Option<String>,

    #[arg(long, help = "Statement name")]
    name: Option<String>,

    #[arg(long, help = "Also print parameter bindings as JSON")]
    vars: bool,
}

#[derive(Args, Debug)]
struct ConfigCmd {
    #[arg(
        long,
        value_name = "FILE",
        env = "DQLC_CONFIG",
        help = "Config file (defaults to <config dir>/dqlc/config.toml)"
    )]
    path: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Compile(cmd) => run_compile(&cmd, cli.format)?,
        Command::Config(cmd) => {
            let config = ClientConfig::load_or_default(cmd.path)?;
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

fn run_compile(cmd: &CompileCmd, format: OutputFormat) -> Result<(), Box<dyn Error>> {
    let mut function = Function::named(&cmd.func);
    for raw in &cmd.args {
        function = function.value(parse_arg(raw)?);
    }

    let mut query = Query::new().func(function);
    if let Some(name) = &cmd.name {
        query = query.name(name.as_str());
    }
    query = query.fields(Field::from_paths(&cmd.fields)?);
    if let Some(n) = cmd.first {
        query = query.first(n);
    }
    if let Some(n) = cmd.offset {
        query = query.offset(n);
    }
    if let Some(pred) = &cmd.order_asc {
        query = query.order_asc(pred.as_str());
    }
    if let Some(pred) = &cmd.order_desc {
        query = query.order_desc(pred.as_str());
    }

    let statement = query.compile()?;
    match format {
        OutputFormat::Text => {
            println!("{}", statement.text);
            if cmd.vars {
                println!("{}", serde_json::to_string_pretty(&statement.vars)?);
            }
        }
        OutputFormat::Json => {
            let out = serde_json::json!({
                "query": statement.text,
                "vars": statement.vars,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn parse_arg(raw: &str) -> Result<Value, Box<dyn Error>> {
    let (kind, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("argument '{raw}' must look like KIND=VALUE"))?;
    let value = match kind {
        "pred" | "predicate" => Value::predicate(value),
        "uid" => Value::uid(value),
        "string" | "str" => Value::from(value),
        "int" => Value::from(value.parse::<i64>()?),
        other => return Err(format!("unknown argument kind '{other}'").into()),
    };
    Ok(value)
}
