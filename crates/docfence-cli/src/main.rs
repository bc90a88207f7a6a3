mod fixtures;
mod reporter;
mod session;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use crossterm::tty::IsTty;
use docfence_engine::{FenceSyntax, TracebackStyle};

use crate::session::{SessionOptions, USAGE_ERROR, run_session};

/// Run the Python code fences of Markdown documents and docstrings as tests
#[derive(Parser, Debug)]
#[command(name = "docfence")]
#[command(version, about, long_about = None)]
struct Args {
    /// Files or directories to collect from
    #[arg(value_name = "PATH", default_value = ".")]
    paths: Vec<PathBuf>,

    /// Collect code fences (overrides `enabled` in the config file)
    #[arg(long = "markdown-docs")]
    markdown_docs: bool,

    /// Fence info string syntax: default or superfences
    #[arg(long = "markdown-docs-syntax", value_name = "SYNTAX")]
    syntax: Option<FenceSyntax>,

    /// Only run tests whose node id contains this (prefix with `not ` to invert)
    #[arg(short = 'k', long = "keyword", value_name = "EXPRESSION")]
    keyword: Option<String>,

    /// Only run tests carrying this marker
    #[arg(short = 'm', long = "marker", value_name = "MARKER")]
    marker: Option<String>,

    /// Traceback style for failures: long, short or line
    #[arg(long = "tb", value_name = "STYLE", default_value = "long")]
    tb: TracebackStyle,

    /// Stop after the first failure or error
    #[arg(short = 'x', long = "exitfirst")]
    exitfirst: bool,

    /// One line per test, and the code of failing fences
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Config file to use instead of ./docfence.toml
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Python interpreter for the default runner
    #[arg(long = "python", value_name = "INTERPRETER")]
    python: Option<String>,
}

impl Args {
    fn into_options(self, root: PathBuf, color: bool) -> SessionOptions {
        SessionOptions {
            root,
            paths: self.paths,
            enable: self.markdown_docs,
            syntax: self.syntax,
            keyword: self.keyword,
            marker: self.marker,
            style: self.tb,
            exitfirst: self.exitfirst,
            verbose: self.verbose,
            config: self.config,
            python: self.python,
            color,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("error: cannot determine the current directory: {e}");
            return ExitCode::from(USAGE_ERROR);
        }
    };
    let stdout = std::io::stdout();
    let color = stdout.is_tty() && std::env::var_os("NO_COLOR").is_none();
    let options = args.into_options(root, color);

    match run_session(&options, stdout.lock()) {
        Ok(status) => ExitCode::from(status.code()),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(USAGE_ERROR)
        }
    }
}
