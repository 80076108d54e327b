use clap::{Arg, ArgAction, Command as ClapCommand};
use std::fs;
use std::io;

use ember::error::ScriptError;
use ember::interpreter::{Interpreter, DEFAULT_MAX_CALL_DEPTH};
use ember::lexer::Lexer;

/// Executed when neither a file nor `--eval` is given.
const DEFAULT_SNIPPET: &str = "int test = 5;";

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), ScriptError> {
    let matches = ClapCommand::new("ember")
        .version("0.1.0")
        .about("Ember scripting language interpreter")
        .arg(
            Arg::new("input")
                .help("Source file to execute")
                .index(1),
        )
        .arg(
            Arg::new("eval")
                .short('e')
                .long("eval")
                .value_name("CODE")
                .help("Execute CODE instead of a file; `main` may be omitted")
                .conflicts_with("input"),
        )
        .arg(
            Arg::new("tokens")
                .long("tokens")
                .help("Print the token stream as JSON and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ast")
                .long("ast")
                .help("Print the parsed program as JSON and exit")
                .action(ArgAction::SetTrue)
                .conflicts_with("tokens"),
        )
        .arg(
            Arg::new("max-depth")
                .long("max-depth")
                .value_name("N")
                .help("Maximum function call depth")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log interpreter activity to stderr")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    init_tracing(matches.get_flag("verbose"));

    let (source, implicit_main) = match (
        matches.get_one::<String>("input"),
        matches.get_one::<String>("eval"),
    ) {
        (Some(path), _) => (fs::read_to_string(path)?, false),
        (None, Some(code)) => (code.clone(), true),
        (None, None) => (DEFAULT_SNIPPET.to_string(), true),
    };

    if matches.get_flag("tokens") {
        let tokens = Lexer::new(&source).tokenize()?;
        println!("{}", to_json(&tokens)?);
        return Ok(());
    }

    let mut program = ember::parse(&source)?;

    if matches.get_flag("ast") {
        println!("{}", to_json(&program)?);
        return Ok(());
    }

    if implicit_main {
        program = program.with_implicit_main();
    }

    let max_depth = matches
        .get_one::<usize>("max-depth")
        .copied()
        .unwrap_or(DEFAULT_MAX_CALL_DEPTH);

    let message = Interpreter::new(&program)
        .with_max_call_depth(max_depth)
        .execute()?;
    println!("{}", message);

    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> io::Result<String> {
    serde_json::to_string_pretty(value).map_err(io::Error::from)
}

/// Installs a stderr subscriber when `RUST_LOG` is set or `--verbose` is
/// passed; otherwise tracing stays disabled.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("ember=debug")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        return;
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .with(filter)
        .init();
}
