use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use memostore_cache::ArgValue;
use memostore_remote::DEFAULT_CONFIG_PATH;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "memostore")]
#[command(about = "Inspect and exercise a content-addressed result cache")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'c',
        long,
        global = true,
        env = "MEMOSTORE_CONFIG",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Path to the store configuration file"
    )]
    pub config: PathBuf,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub log_level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Print the fingerprint and object key of a call")]
    Fingerprint {
        #[arg(long, help = "Computation identifier, e.g. poly@v1")]
        id: String,
        #[arg(
            long = "arg",
            value_name = "VALUE",
            value_parser = parse_value,
            help = "Positional argument (repeatable); see VALUE syntax below"
        )]
        args: Vec<ArgValue>,
        #[arg(
            long = "kwarg",
            value_name = "NAME=VALUE",
            value_parser = parse_kwarg,
            help = "Named argument (repeatable)"
        )]
        kwargs: Vec<(String, ArgValue)>,
    },
    #[command(about = "Check whether an entry is cached")]
    Exists {
        #[arg(help = "32-character hex fingerprint")]
        fingerprint: String,
    },
    #[command(about = "List the entries of a cached archive")]
    Inspect {
        #[arg(help = "32-character hex fingerprint")]
        fingerprint: String,
    },
    #[command(about = "Create the configured bucket if it does not exist")]
    Bootstrap,
    #[command(about = "Run the example computations twice each through the cache")]
    Demo,
}

/// Parse an argument value.
///
/// Plain text is taken as-is. Typed values use a prefix: `hex:`, `int:`,
/// `uint:`, `float:`, `bool:`, `json:`, or `text:` for text that would
/// otherwise look typed. The literal `null` is the null value.
pub fn parse_value(raw: &str) -> Result<ArgValue, String> {
    if raw == "null" {
        return Ok(ArgValue::Null);
    }
    let Some((kind, rest)) = raw.split_once(':') else {
        return Ok(ArgValue::Text(raw.to_string()));
    };
    match kind {
        "text" => Ok(ArgValue::Text(rest.to_string())),
        "hex" => hex::decode(rest)
            .map(ArgValue::Bytes)
            .map_err(|e| format!("invalid hex '{rest}': {e}")),
        "int" => rest
            .parse()
            .map(ArgValue::Int)
            .map_err(|e| format!("invalid integer '{rest}': {e}")),
        "uint" => rest
            .parse()
            .map(ArgValue::UInt)
            .map_err(|e| format!("invalid unsigned integer '{rest}': {e}")),
        "float" => rest
            .parse()
            .map(ArgValue::Float)
            .map_err(|e| format!("invalid float '{rest}': {e}")),
        "bool" => rest
            .parse()
            .map(ArgValue::Bool)
            .map_err(|e| format!("invalid boolean '{rest}': {e}")),
        "json" => serde_json::from_str(rest)
            .map(ArgValue::Json)
            .map_err(|e| format!("invalid JSON '{rest}': {e}")),
        _ => Ok(ArgValue::Text(raw.to_string())),
    }
}

/// Parse `NAME=VALUE`, with VALUE in [`parse_value`] syntax
pub fn parse_kwarg(raw: &str) -> Result<(String, ArgValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    if name.is_empty() {
        return Err(format!("empty argument name in '{raw}'"));
    }
    Ok((name.to_string(), parse_value(value)?))
}
