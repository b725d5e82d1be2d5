use clap::Parser;
use jsbox::{EngineError, Interpreter, InterpreterOptions, JsValue};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Deeply nested guest calls recurse on the host stack.
const STACK_SIZE: usize = 256 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "jsbox", version, about = "A small embeddable JavaScript interpreter")]
struct Cli {
    /// Script file to execute
    file: Option<PathBuf>,

    /// Evaluate inline code
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Run every program in strict mode
    #[arg(long)]
    strict: bool,

    /// Maximum nesting of guest calls
    #[arg(long, default_value_t = 512)]
    max_call_depth: usize,

    /// Abort after this many evaluation steps
    #[arg(long)]
    step_limit: Option<u64>,
}

impl Cli {
    fn options(&self) -> InterpreterOptions {
        let options = InterpreterOptions::default()
            .strict(self.strict)
            .max_call_depth(self.max_call_depth);
        match self.step_limit {
            Some(limit) => options.step_limit(limit),
            None => options,
        }
    }
}

fn run_source(interp: &mut Interpreter, source: &str) -> Result<(), EngineError> {
    let value = interp.run(source)?;
    if !matches!(value, JsValue::Undefined) {
        println!("{value}");
    }
    Ok(())
}

fn execute_code(options: InterpreterOptions, code: &str) -> ExitCode {
    let mut interp = Interpreter::with_options(options);
    match run_source(&mut interp, code) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}

fn run_file(options: InterpreterOptions, path: &Path) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), EngineError::Io(e));
            return ExitCode::from(1);
        }
    };
    execute_code(options, &source)
}

fn run_repl(options: InterpreterOptions) -> ExitCode {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut interp = Interpreter::with_options(options);

    println!("jsbox v{}", env!("CARGO_PKG_VERSION"));
    println!("Type expressions. Press Ctrl-D to exit.");

    loop {
        print!("> ");
        if stdout.flush().is_err() {
            break;
        }

        let mut line = String::new();
        let read_result = stdin.lock().read_line(&mut line);

        match read_result {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if !trimmed.is_empty()
                    && let Err(e) = run_source(&mut interp, trimmed)
                {
                    eprintln!("{e}");
                }
            }
            Err(e) => {
                eprintln!("Read error: {e}");
                return ExitCode::from(1);
            }
        }
    }

    println!();
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let worker = std::thread::Builder::new().stack_size(STACK_SIZE).spawn(move || {
        let options = cli.options();
        if let Some(code) = &cli.eval {
            return execute_code(options, code);
        }
        if let Some(path) = &cli.file {
            return run_file(options, path);
        }
        run_repl(options)
    });

    match worker.map(|handle| handle.join()) {
        Ok(Ok(code)) => code,
        Ok(Err(_)) => ExitCode::from(101),
        Err(e) => {
            eprintln!("failed to start interpreter thread: {e}");
            ExitCode::from(1)
        }
    }
}
