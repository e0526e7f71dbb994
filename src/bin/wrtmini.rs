//! The `wrtmini` command-line front end (§4.8, ambient): loads a `.wasm`
//! file, runs it through `parse_module`/`validate_module`, and optionally
//! instantiates and calls an exported function.
//!
//! Grounded in the teacher's `main.rs` (open a file, parse it, print the
//! result) and in `examples/0xphen-sebi`'s `sebi-cli` for the `clap`-derive
//! option-struct shape; generalized from the teacher's hardcoded
//! `"locals.wasm"` path and `env_logger` init to a real argument surface and
//! the `tracing`/`tracing-subscriber`/`tracing-tree` stack the teacher's own
//! `Cargo.toml` already declares but never wires up (see SPEC_FULL.md's
//! logging section).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use wrtmini::limits::LimitCategory;
use wrtmini::runtime::{Instance, NoImports};
use wrtmini::{load_module, ParserLimits};

#[derive(Debug, Parser)]
#[command(name = "wrtmini", version, about = "A WebAssembly 1.0 (MVP) parser, validator and interpreter")]
struct Args {
    /// Path to the .wasm module to load.
    wasm_path: PathBuf,

    /// Which runtime backend executes the module. Only `runtime-int` is
    /// built in this configuration; the others are accepted so command
    /// lines written against a fuller build still parse, but are rejected
    /// at startup.
    #[arg(long, value_enum, default_value = "runtime-int")]
    runtime: RuntimeSelector,

    /// Export to call after instantiation. Without this, the module is
    /// only parsed, validated, and instantiated (running its start
    /// function, if any).
    #[arg(long)]
    call: Option<String>,

    /// i32 arguments passed to `--call`'s export, in order.
    #[arg(long = "arg", value_name = "I32")]
    args: Vec<i32>,

    /// Bounds a parser resource category: `--wasm-set-parser-limit
    /// imported_functions 16`. Repeatable.
    #[arg(long = "wasm-set-parser-limit", value_names = ["CATEGORY", "LIMIT"], num_args = 2)]
    wasm_set_parser_limit: Vec<String>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease log verbosity (repeatable: -q, -qq).
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
enum RuntimeSelector {
    RuntimeInt,
    RuntimeJit,
    RuntimeTiered,
    RuntimeAot,
    RuntimeCustomCompiler,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if args.runtime != RuntimeSelector::RuntimeInt {
        eprintln!("[error] {:?} is not built in this configuration; only runtime-int is available", args.runtime);
        return ExitCode::from(255); // the documented -1 CLI-usage exit code
    }

    let mut limits = ParserLimits::default();
    for pair in args.wasm_set_parser_limit.chunks(2) {
        let [category, limit] = pair else {
            eprintln!("[error] --wasm-set-parser-limit takes exactly two values: <category> <u64>");
            return ExitCode::from(255);
        };
        let category: LimitCategory = match category.parse() {
            Ok(c) => c,
            Err(e) => {
                eprintln!("[error] {e}");
                return ExitCode::from(255);
            }
        };
        let limit: u32 = match limit.parse() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("[error] --wasm-set-parser-limit limit must be a non-negative integer, got {limit:?}");
                return ExitCode::from(255);
            }
        };
        limits.set(category, limit);
    }

    let bytes = match std::fs::read(&args.wasm_path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("[error] reading {}: {e}", args.wasm_path.display());
            return ExitCode::FAILURE;
        }
    };

    let module = match load_module(&bytes, &limits) {
        Ok(m) => m,
        Err(diagnostic) => {
            eprintln!("{diagnostic}");
            return ExitCode::FAILURE;
        }
    };

    let mut instance = match Instance::instantiate(&module, NoImports) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("[error] instantiation failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(name) = &args.call {
        let export = module.exports.iter().find(|e| &e.name == name && e.kind == wrtmini::types::ExportKind::Function);
        let Some(export) = export else {
            eprintln!("[error] no exported function named {name:?}");
            return ExitCode::FAILURE;
        };
        let call_args: Vec<wrtmini::types::Value> = args.args.iter().map(|v| wrtmini::types::Value::I32(*v)).collect();
        match instance.call(export.index, &call_args) {
            Ok(results) => println!("{results:?}"),
            Err(trap) => {
                eprintln!("[error] trap: {trap}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn init_logging(verbose: u8, quiet: u8) {
    let level = match verbose as i8 - quiet as i8 {
        i8::MIN..=-2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry().with(filter).with(tracing_tree::HierarchicalLayer::new(2)).try_init();
}
