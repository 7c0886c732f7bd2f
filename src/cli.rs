//! Command-line surface: the `patch` subcommand.
//!
//! Operation flags are repeatable and may be interleaved; the assembled
//! patch follows their command-line order, which `collect_operations`
//! reconstructs from the parser's value indices.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::{ArgAction, ArgMatches, Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;

use crate::error::GraftError;
use crate::patch::{
    AddOperation, CopyOperation, MoveOperation, PatchOperation, Pointer, RemoveOperation,
    ReplaceOperation, TestOperation,
};

#[derive(Debug, Parser)]
#[command(
    name = "graft",
    version,
    about = "Apply JSON Patch operations to YAML while preserving formatting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Transform a structured document with JSON Patch operations
    Patch(PatchArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Yaml,
}

#[derive(Debug, Args)]
pub struct PatchArgs {
    /// Format of the source document
    #[arg(long, value_enum)]
    pub format: Format,

    /// JSON Patch file (RFC 6902 array) to apply
    #[arg(long, value_name = "PATH", action = ArgAction::Append)]
    pub patch_file: Vec<String>,

    /// Add a value at a path
    #[arg(long, num_args = 2, value_names = ["PATH", "VALUE"], action = ArgAction::Append)]
    pub add: Vec<String>,

    /// Remove the value at a path
    #[arg(long, value_name = "PATH", action = ArgAction::Append)]
    pub remove: Vec<String>,

    /// Replace the value at a path
    #[arg(long, num_args = 2, value_names = ["PATH", "VALUE"], action = ArgAction::Append)]
    pub replace: Vec<String>,

    /// Move the value at a path to another path
    #[arg(long = "move", num_args = 2, value_names = ["FROM", "TO"], action = ArgAction::Append)]
    pub mov: Vec<String>,

    /// Copy the value at a path to another path
    #[arg(long, num_args = 2, value_names = ["FROM", "TO"], action = ArgAction::Append)]
    pub copy: Vec<String>,

    /// Assert the value at a path
    #[arg(long, num_args = 2, value_names = ["PATH", "VALUE"], action = ArgAction::Append)]
    pub test: Vec<String>,

    /// Source file (defaults to stdin)
    pub source: Option<PathBuf>,

    /// Destination file (defaults to stdout)
    pub destination: Option<PathBuf>,
}

/// Parse a CLI value: `string:`, `int:`, `float:`, `bool:`, `json:`
/// prefixes select a type, anything else is read as JSON.
pub fn parse_value(text: &str) -> Result<Value, GraftError> {
    if let Some(rest) = text.strip_prefix("string:") {
        return Ok(Value::String(rest.to_string()));
    }
    if let Some(rest) = text.strip_prefix("int:") {
        return rest
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| GraftError::MalformedPatch(format!("invalid integer value {rest:?}")));
    }
    if let Some(rest) = text.strip_prefix("float:") {
        return rest
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| GraftError::MalformedPatch(format!("invalid float value {rest:?}")));
    }
    if let Some(rest) = text.strip_prefix("bool:") {
        return match rest {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(GraftError::MalformedPatch(format!("invalid bool value {rest:?}"))),
        };
    }
    let rest = text.strip_prefix("json:").unwrap_or(text);
    serde_json::from_str(rest)
        .map_err(|e| GraftError::MalformedPatch(format!("invalid JSON value {rest:?}: {e}")))
}

/// Assemble the patch from all operation flags in command-line order.
pub fn collect_operations(
    args: &PatchArgs,
    matches: &ArgMatches,
) -> Result<Vec<PatchOperation>, GraftError> {
    // (position of first value, ops) per flag occurrence
    let mut staged: Vec<(usize, Vec<PatchOperation>)> = Vec::new();

    stage(&mut staged, matches, "patch_file", &args.patch_file, 1, |v| {
        let text = fs::read_to_string(&v[0])?;
        crate::patch::parse_patch(&text)
    })?;
    stage(&mut staged, matches, "add", &args.add, 2, |v| {
        Ok(vec![PatchOperation::Add(AddOperation {
            path: Pointer::parse(&v[0])?,
            value: parse_value(&v[1])?,
        })])
    })?;
    stage(&mut staged, matches, "remove", &args.remove, 1, |v| {
        Ok(vec![PatchOperation::Remove(RemoveOperation { path: Pointer::parse(&v[0])? })])
    })?;
    stage(&mut staged, matches, "replace", &args.replace, 2, |v| {
        Ok(vec![PatchOperation::Replace(ReplaceOperation {
            path: Pointer::parse(&v[0])?,
            value: parse_value(&v[1])?,
        })])
    })?;
    stage(&mut staged, matches, "mov", &args.mov, 2, |v| {
        Ok(vec![PatchOperation::Move(MoveOperation {
            from: Pointer::parse(&v[0])?,
            path: Pointer::parse(&v[1])?,
        })])
    })?;
    stage(&mut staged, matches, "copy", &args.copy, 2, |v| {
        Ok(vec![PatchOperation::Copy(CopyOperation {
            from: Pointer::parse(&v[0])?,
            path: Pointer::parse(&v[1])?,
        })])
    })?;
    stage(&mut staged, matches, "test", &args.test, 2, |v| {
        Ok(vec![PatchOperation::Test(TestOperation {
            path: Pointer::parse(&v[0])?,
            value: parse_value(&v[1])?,
        })])
    })?;

    staged.sort_by_key(|(position, _)| *position);
    Ok(staged.into_iter().flat_map(|(_, ops)| ops).collect())
}

fn stage(
    staged: &mut Vec<(usize, Vec<PatchOperation>)>,
    matches: &ArgMatches,
    id: &str,
    values: &[String],
    arity: usize,
    build: impl Fn(&[String]) -> Result<Vec<PatchOperation>, GraftError>,
) -> Result<(), GraftError> {
    let Some(indices) = matches.indices_of(id) else {
        return Ok(());
    };
    let indices: Vec<usize> = indices.collect();
    for (chunk, positions) in values.chunks(arity).zip(indices.chunks(arity)) {
        staged.push((positions[0], build(chunk)?));
    }
    Ok(())
}

/// Run the `patch` subcommand: read, apply, write.
pub fn run_patch(args: &PatchArgs, matches: &ArgMatches) -> Result<(), GraftError> {
    let ops = collect_operations(args, matches)?;

    let source = match &args.source {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let output = match args.format {
        Format::Yaml => crate::yaml::apply_patch(&source, &ops)?,
    };

    match &args.destination {
        Some(path) => fs::write(path, output)?,
        None => io::stdout().write_all(output.as_bytes())?,
    }
    Ok(())
}
