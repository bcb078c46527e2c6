use jpx_core::{JsonPath, Node, NormalizedPath, QueryOptions};
use serde_json::{Value, json};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "Usage: jpx [OPTIONS] <QUERY> [FILE]\n\nFor more information, try '--help'";

fn print_help() {
    println!(
        "jpx {VERSION} - JSONPath processor (extended dialect)

Usage: jpx [OPTIONS] <QUERY> [FILE]

Arguments:
  <QUERY>    JSONPath query
  [FILE]     Input JSON file (reads from stdin if omitted)

Options:
      --paths     Print normalized paths instead of values
      --nodes     Print {{\"path\", \"value\"}} pairs
      --pointer   Print paths as JSON pointers (with --paths or --nodes)
      --no-dups   Drop results whose path was already selected
      --sort      Order results by path
      --parallel  Evaluate bracket branches in parallel
  -h, --help      Show this help message
  -V, --version   Show version

Set RUST_LOG=debug to trace parsing and evaluation."
    );
}

fn print_version() {
    println!("jpx {VERSION}");
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Output {
    #[default]
    Values,
    Paths,
    Nodes,
}

#[derive(Debug, Default, PartialEq)]
struct QueryArgs {
    query: String,
    file: Option<String>,
    output: Output,
    pointer: bool,
    options: QueryOptions,
}

#[derive(Debug, PartialEq)]
enum ParsedArgs {
    Help,
    Version,
    Query(QueryArgs),
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<ParsedArgs, String> {
    let mut parsed = QueryArgs::default();
    let mut positional = Vec::new();

    for arg in args {
        match arg.as_str() {
            "-h" | "--help" => return Ok(ParsedArgs::Help),
            "-V" | "--version" => return Ok(ParsedArgs::Version),
            "--paths" => parsed.output = Output::Paths,
            "--nodes" => parsed.output = Output::Nodes,
            "--pointer" => parsed.pointer = true,
            "--no-dups" => parsed.options = parsed.options.with_no_duplicates(true),
            "--sort" => parsed.options = parsed.options.with_sort(true),
            "--parallel" => parsed.options = parsed.options.parallel(),
            // A query always starts with '$', so '-' marks an option
            s if s.starts_with('-') && s.len() > 1 => {
                return Err(format!("unknown option: {s}\n\n{USAGE}"));
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let Some(query) = positional.next() else {
        return Err(format!("missing required argument: <QUERY>\n\n{USAGE}"));
    };
    parsed.query = query;
    parsed.file = positional.next();
    if positional.next().is_some() {
        return Err(format!("too many arguments\n\n{USAGE}"));
    }

    Ok(ParsedArgs::Query(parsed))
}

fn read_input(file: Option<&str>) -> Result<String, String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| format!("error reading file '{path}': {e}")),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| format!("error reading stdin: {e}"))?;
            Ok(buffer)
        }
    }
}

fn render_path(path: &NormalizedPath, pointer: bool) -> Value {
    if pointer {
        Value::String(path.to_json_pointer())
    } else {
        Value::String(path.to_string())
    }
}

/// Evaluate the query and shape the results for printing
fn execute(args: &QueryArgs, json: &Value) -> Result<Value, String> {
    let path = JsonPath::parse(&args.query)
        .map_err(|e| format!("error parsing JSONPath query: {e}"))?;
    let nodes = path
        .select_nodes(json, &args.options)
        .map_err(|e| format!("error evaluating JSONPath query: {e}"))?;
    log::debug!("query selected {} node(s)", nodes.len());

    let output = match args.output {
        Output::Values => nodes.iter().map(Node::to_owned_value).collect(),
        Output::Paths => nodes
            .iter()
            .map(|n| render_path(&n.path, args.pointer))
            .collect(),
        Output::Nodes => nodes
            .into_iter()
            .map(|n| json!({"path": render_path(&n.path, args.pointer), "value": n.value}))
            .collect(),
    };
    Ok(output)
}

fn run() -> Result<(), String> {
    let args = parse_args(env::args().skip(1))?;

    match args {
        ParsedArgs::Help => {
            print_help();
            Ok(())
        }
        ParsedArgs::Version => {
            print_version();
            Ok(())
        }
        ParsedArgs::Query(args) => {
            let input = read_input(args.file.as_deref())?;

            let json: Value = serde_json::from_str(&input)
                .map_err(|e| format!("error parsing JSON: {e}"))?;

            let results = execute(&args, &json)?;

            let output = serde_json::to_string_pretty(&results)
                .map_err(|e| format!("error serializing output: {e}"))?;

            println!("{output}");
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("jpx: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use jpx_core::ExecutionMode;

    fn args(list: &[&str]) -> Result<ParsedArgs, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    fn query_args(list: &[&str]) -> QueryArgs {
        match args(list).unwrap() {
            ParsedArgs::Query(parsed) => parsed,
            other => panic!("expected query arguments, got {other:?}"),
        }
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(args(&["--help"]).unwrap(), ParsedArgs::Help);
        assert_eq!(args(&["$", "-V"]).unwrap(), ParsedArgs::Version);
    }

    #[test]
    fn test_flags() {
        let parsed = query_args(&[
            "--paths",
            "--pointer",
            "--sort",
            "--no-dups",
            "--parallel",
            "$.a",
            "in.json",
        ]);
        assert_eq!(parsed.query, "$.a");
        assert_eq!(parsed.file.as_deref(), Some("in.json"));
        assert_eq!(parsed.output, Output::Paths);
        assert!(parsed.pointer);
        assert!(parsed.options.sort);
        assert!(parsed.options.no_duplicates);
        assert_eq!(parsed.options.mode, ExecutionMode::Parallel);
    }

    #[test]
    fn test_argument_errors() {
        assert!(args(&[]).unwrap_err().starts_with("missing required argument"));
        assert!(args(&["--bogus", "$"]).unwrap_err().starts_with("unknown option"));
        assert!(args(&["$", "a", "b"]).unwrap_err().starts_with("too many arguments"));
    }

    #[test]
    fn test_execute_outputs() {
        let json = json!({"a/b": [10, 20]});

        let values = execute(&query_args(&["$['a/b'][*]"]), &json).unwrap();
        assert_eq!(values, json!([10, 20]));

        let paths = execute(&query_args(&["--paths", "$['a/b'][1]"]), &json).unwrap();
        assert_eq!(paths, json!(["$['a/b'][1]"]));

        let nodes =
            execute(&query_args(&["--nodes", "--pointer", "$['a/b'][0]"]), &json).unwrap();
        assert_eq!(nodes, json!([{"path": "/a~1b/0", "value": 10}]));
    }

    #[test]
    fn test_execute_errors() {
        let json = json!([]);
        assert!(execute(&query_args(&["$["]), &json).unwrap_err().starts_with("error parsing"));
        assert!(
            execute(&query_args(&["$[?nope(@)]"]), &json)
                .unwrap_err()
                .starts_with("error evaluating")
        );
    }
}
