use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use ilc::config::Config;
use ilc::diagnostics::{render_diagnostics, render_error, CompileError, Diagnostic};
use ilc::il::{self, Module};
use ilc::span::LineIndex;
use ilc::transform::OptLevel;
use ilc::vm::{self, BreakPoint, DebugOptions, TraceMode, VmError};
use ilc::CompileOptions;

#[derive(Parser)]
#[command(name = "ilc", version, about = "BASIC front end, IL optimizer and VM")]
struct Cli {
    /// Log filter, e.g. `ilc::opt=debug` (defaults to RUST_LOG, then `warn`)
    #[arg(long, global = true)]
    log: Option<String>,

    /// Project configuration file (defaults to ilc.toml next to the source)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an IL module (.il) or compile and run a BASIC program
    Run {
        file: PathBuf,
        #[command(flatten)]
        build: BuildFlags,
        #[command(flatten)]
        debug: DebugFlags,
    },
    /// Language front ends
    Front {
        #[command(subcommand)]
        lang: FrontLang,
    },
    /// Run optimization passes over an IL module
    IlOpt {
        input: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated pass names; `O1`/`O2` expand to their pipelines
        #[arg(long, value_delimiter = ',')]
        passes: Vec<String>,
        /// Optimization level used when no --passes are given
        #[arg(short = 'O', default_value = "O1")]
        level: OptLevel,
        /// Re-verify after every pass
        #[arg(long)]
        verify_each: bool,
    },
}

#[derive(Subcommand)]
enum FrontLang {
    /// BASIC: `-emit-il` or `-run`
    Basic(FrontArgs),
}

#[derive(Args)]
#[command(group = clap::ArgGroup::new("mode").required(true).args(["emit_il", "run"]))]
struct FrontArgs {
    /// Print the IL module
    #[arg(long)]
    emit_il: bool,
    /// Compile and execute
    #[arg(long)]
    run: bool,
    file: PathBuf,
    /// With -emit-il, write the IL here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[command(flatten)]
    build: BuildFlags,
    #[command(flatten)]
    debug: DebugFlags,
}

#[derive(Args, Default)]
struct BuildFlags {
    /// Optimization level (overrides ilc.toml)
    #[arg(short = 'O')]
    opt: Option<OptLevel>,
    /// Emit explicit array bounds checks
    #[arg(long)]
    bounds_checks: bool,
    /// Leave out array bounds checks
    #[arg(long, conflicts_with = "bounds_checks")]
    no_bounds_checks: bool,
    /// Re-verify after every optimization pass
    #[arg(long)]
    verify_each: bool,
    /// How to print diagnostics
    #[arg(long, value_enum, default_value_t = DiagFormat::Pretty)]
    diag_format: DiagFormat,
}

#[derive(Args, Default)]
struct DebugFlags {
    /// Trace execution per IL instruction or per source line
    #[arg(long, num_args = 0..=1, default_missing_value = "il", require_equals = true)]
    trace: Option<TraceMode>,
    /// Read INPUT from this file
    #[arg(long)]
    stdin_from: Option<PathBuf>,
    /// Abort after this many instructions
    #[arg(long)]
    max_steps: Option<u64>,
    /// Stop at a block label or at `file:line`
    #[arg(long = "break")]
    breaks: Vec<BreakPoint>,
    /// Report every store to this variable
    #[arg(long)]
    watch: Vec<String>,
    /// Print per-function call counts
    #[arg(long)]
    count: bool,
    /// Print elapsed run time
    #[arg(long)]
    time: bool,
    /// Print the trap location as well as its message
    #[arg(long)]
    dump_trap: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum DiagFormat {
    #[default]
    Pretty,
    Plain,
    Json,
}

/// `-emit-il` and `-run` are spelled with a single dash.
fn normalize_args(args: impl Iterator<Item = OsString>) -> Vec<OsString> {
    args.map(|a| match a.to_str() {
        Some("-emit-il") => OsString::from("--emit-il"),
        Some("-run") => OsString::from("--run"),
        _ => a,
    })
    .collect()
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() { ExitCode::from(1) } else { ExitCode::SUCCESS };
        }
    };
    init_logging(cli.log.as_deref());

    let status = match cli.command {
        Commands::Run { file, build, debug } => {
            if file.extension().is_some_and(|e| e == "il") {
                match read(&file).and_then(|text| ilc::parse_il(&text)) {
                    Ok(module) => execute(&module, &file, &Config::default(), &debug),
                    Err(err) => report_compile_error(&err, "", &file, build.diag_format),
                }
            } else {
                front_basic(&file, cli.config.as_deref(), &build, &debug, None, true)
            }
        }
        Commands::Front { lang: FrontLang::Basic(args) } => front_basic(
            &args.file,
            cli.config.as_deref(),
            &args.build,
            &args.debug,
            args.output.as_deref(),
            args.run,
        ),
        Commands::IlOpt { input, output, passes, level, verify_each } => {
            il_opt(&input, output.as_deref(), &passes, level, verify_each)
        }
    };
    ExitCode::from(status)
}

fn read(path: &Path) -> Result<String, CompileError> {
    std::fs::read_to_string(path)
        .map_err(|e| CompileError::io(format!("cannot read {}: {e}", path.display()), path.to_path_buf()))
}

fn front_basic(
    file: &Path,
    config_path: Option<&Path>,
    build: &BuildFlags,
    debug: &DebugFlags,
    output: Option<&Path>,
    run: bool,
) -> u8 {
    let config = match Config::discover(file, config_path) {
        Ok(c) => c,
        Err(err) => return report_compile_error(&err, "", file, build.diag_format),
    };
    let source = match read(file) {
        Ok(s) => s,
        Err(err) => return report_compile_error(&err, "", file, build.diag_format),
    };

    let mut opts = CompileOptions::from_config(&config);
    if let Some(level) = build.opt {
        opts.opt = level;
    }
    if build.bounds_checks {
        opts.lower.bounds_checks = true;
    }
    if build.no_bounds_checks {
        opts.lower.bounds_checks = false;
    }
    opts.verify_each |= build.verify_each;

    let compiled = match ilc::compile_basic(&source, &opts) {
        Ok(c) => c,
        Err(err) => return report_compile_error(&err, &source, file, build.diag_format),
    };
    if !compiled.warnings.is_empty() {
        eprint!("{}", format_diagnostics(&compiled.warnings, &source, file, build.diag_format));
    }

    if run {
        return execute(&compiled.module, file, &config, debug);
    }
    let text = il::print_module(&compiled.module);
    match output {
        Some(path) => match std::fs::write(path, text) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("error: cannot write {}: {e}", path.display());
                1
            }
        },
        None => {
            print!("{text}");
            0
        }
    }
}

fn debug_options(config: &Config, flags: &DebugFlags) -> DebugOptions {
    let mut opts = config.debug_options();
    if flags.max_steps.is_some() {
        opts.max_steps = flags.max_steps;
    }
    if flags.trace.is_some() {
        opts.trace = flags.trace;
    }
    opts.breaks = flags.breaks.clone();
    opts.watch = flags.watch.clone();
    opts.count = flags.count;
    opts.stdin_from = flags.stdin_from.clone();
    opts
}

/// Run `module` and turn the outcome into a process status.
fn execute(module: &Module, file: &Path, config: &Config, flags: &DebugFlags) -> u8 {
    let opts = debug_options(config, flags);
    let started = Instant::now();
    let result = run_on_big_stack(module, opts);
    if flags.time {
        eprintln!("[TIME] {:.3} ms", started.elapsed().as_secs_f64() * 1000.0);
    }
    match result {
        Ok(outcome) => {
            if flags.count {
                let mut calls: Vec<_> = outcome.calls.iter().collect();
                calls.sort();
                for (name, n) in calls {
                    eprintln!("[COUNT] fn=@{name} calls={n}");
                }
            }
            (outcome.exit_code & 0xff) as u8
        }
        Err(err) => {
            report_vm_error(&err, file, flags.dump_trap);
            err.exit_code() as u8
        }
    }
}

/// Interpreted calls recurse on the host stack.
const VM_STACK_SIZE: usize = 256 * 1024 * 1024;

fn run_on_big_stack(module: &Module, opts: DebugOptions) -> Result<vm::RunOutcome, VmError> {
    std::thread::scope(|s| {
        let worker = std::thread::Builder::new()
            .name("ilc-vm".into())
            .stack_size(VM_STACK_SIZE)
            .spawn_scoped(s, || vm::run_module(module, opts));
        match worker {
            Ok(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(VmError::Malformed("VM thread panicked".into()))),
            Err(e) => Err(VmError::Malformed(format!("cannot spawn VM thread: {e}"))),
        }
    })
}

fn report_vm_error(err: &VmError, file: &Path, dump_trap: bool) {
    match err {
        VmError::Trap { message, function, block, line, kind } => {
            eprintln!("Trap: {message}");
            if dump_trap {
                let at = if *line > 0 { format!("{}:{line}", file.display()) } else { file.display().to_string() };
                eprintln!("  code {} in @{function}, block {block} ({at})", *kind as i32);
            }
        }
        // The VM already printed the [BREAK] line.
        VmError::Break { .. } => {}
        other => eprintln!("{other}"),
    }
}

fn report_compile_error(err: &CompileError, source: &str, file: &Path, format: DiagFormat) -> u8 {
    let text = match err {
        CompileError::Semantic { diagnostics } => format_diagnostics(diagnostics, source, file, format),
        other => render_error(source, &file.display().to_string(), other),
    };
    eprint!("{text}");
    1
}

fn format_diagnostics(diags: &[Diagnostic], source: &str, file: &Path, format: DiagFormat) -> String {
    let filename = file.display().to_string();
    match format {
        DiagFormat::Pretty => render_diagnostics(source, &filename, diags),
        DiagFormat::Plain => {
            let index = LineIndex::new(source);
            diags.iter().map(|d| d.to_line(&filename, &index) + "\n").collect()
        }
        DiagFormat::Json => match serde_json::to_string_pretty(diags) {
            Ok(json) => json + "\n",
            Err(e) => format!("error: cannot serialize diagnostics: {e}\n"),
        },
    }
}

fn il_opt(input: &Path, output: Option<&Path>, passes: &[String], level: OptLevel, verify_each: bool) -> u8 {
    let mut module = match read(input).and_then(|text| ilc::parse_il(&text)) {
        Ok(m) => m,
        Err(err) => return report_compile_error(&err, "", input, DiagFormat::Plain),
    };
    let result = if passes.is_empty() {
        ilc::optimize(&mut module, level, verify_each)
    } else {
        ilc::optimize_with(&mut module, passes, verify_each)
    };
    if let Err(err) = result.and_then(|()| il::verify_module(&module)) {
        return report_compile_error(&err, "", input, DiagFormat::Plain);
    }
    let text = il::print_module(&module);
    match output {
        Some(path) => match std::fs::write(path, text) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("error: cannot write {}: {e}", path.display());
                1
            }
        },
        None => {
            print!("{text}");
            0
        }
    }
}
