use std::{fs, path::PathBuf, process::ExitCode, rc::Rc};

use clap::{Parser, Subcommand};
use tracing::debug;

use pypp::{lexer, parser, Interpreter, LoaderConfig, ModuleLoader, PyppError, Repl};

#[derive(Parser)]
#[command(author, version, about = "py++ language interpreter")]
struct Args {
    /// Log module resolution and loading to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Extra directories searched for imported modules
    #[arg(
        long = "lib",
        value_name = "DIR",
        env = "PYPP_PATH",
        value_delimiter = ':',
        global = true
    )]
    lib: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a py++ script file
    Run { script: PathBuf },
    /// Evaluate a snippet of py++ code
    Eval { source: String },
    /// Start an interactive REPL session
    Repl,
    /// Print the tokens of a script
    Tokens { script: PathBuf },
    /// Print the syntax tree of a script
    Ast { script: PathBuf },
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("PYPP_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .with(filter)
        .init();
}

fn loader_config(script_dir: Option<PathBuf>, lib: Vec<PathBuf>) -> LoaderConfig {
    let mut config = LoaderConfig::default().with_search_paths(lib);
    if let Some(dir) = script_dir {
        config = config.with_priority_path(dir);
    }
    debug!(paths = ?config.search_paths(), "module search path");
    config
}

fn execute(args: Args) -> Result<(), PyppError> {
    match args.command.unwrap_or(Command::Repl) {
        Command::Run { script } => {
            let source = fs::read_to_string(&script)?;
            let script_dir = script
                .parent()
                .map(|dir| {
                    if dir.as_os_str().is_empty() {
                        PathBuf::from(".")
                    } else {
                        dir.to_path_buf()
                    }
                });
            let loader = ModuleLoader::new(loader_config(script_dir, args.lib));
            let mut interpreter = Interpreter::with_loader(Rc::new(loader));
            interpreter.eval_source(&source)?;
            Ok(())
        }
        Command::Eval { source } => {
            let loader = ModuleLoader::new(loader_config(None, args.lib));
            let mut interpreter = Interpreter::with_loader(Rc::new(loader));
            let value = interpreter.eval_source(&source)?;
            if !value.is_null() {
                println!("{value:?}");
            }
            Ok(())
        }
        Command::Repl => {
            let loader = ModuleLoader::new(loader_config(None, args.lib));
            Repl::with_loader(Rc::new(loader)).run()
        }
        Command::Tokens { script } => {
            let source = fs::read_to_string(&script)?;
            for token in lexer::tokenize(&source)? {
                println!(
                    "{}:{} {:?} {:?}",
                    token.pos.line, token.pos.column, token.kind, token.lexeme
                );
            }
            Ok(())
        }
        Command::Ast { script } => {
            let source = fs::read_to_string(&script)?;
            let program = parser::parse_program(&source)?;
            println!("{program:#?}");
            Ok(())
        }
    }
}
