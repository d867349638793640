use serde::Serialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use svgcheck_core::{
    CheckOptions, Diagnostic, DiagnosticSink, DirCache, IncludeCache, LoadOptions, Loader, Mode,
    Outcome, OutputPolicy, RepairPolicy, Severity, write,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Check(svgcheck_core::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Check(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<svgcheck_core::Error> for CliError {
    fn from(value: svgcheck_core::Error) -> Self {
        Self::Check(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Default)]
struct Args {
    input: Option<String>,
    out: Option<String>,
    mode: Mode,
    output: OutputPolicy,
    load: LoadOptions,
    cache: Option<PathBuf>,
    clear_cache: bool,
    policy: Option<PathBuf>,
    json: bool,
    verbose: bool,
    version: bool,
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    file: &'a str,
    line: u32,
    column: u32,
    severity: Severity,
    code: &'a str,
    message: &'a str,
}

impl<'a> From<&'a Diagnostic> for JsonDiagnostic<'a> {
    fn from(d: &'a Diagnostic) -> Self {
        Self {
            file: &d.location.file,
            line: d.location.line,
            column: d.location.column,
            severity: d.severity,
            code: d.code.as_str(),
            message: &d.message,
        }
    }
}

fn usage() -> &'static str {
    "svgcheck\n\
\n\
USAGE:\n\
  svgcheck [-r] [-o <file>|--out=<file>] [-a] [-q] [-N] [-X] [--cache=<dir>] [--clear-cache]\n\
           [--policy <file.json>] [--json] [-v] [<path>|-]\n\
  svgcheck -V | --version\n\
\n\
OPTIONS:\n\
  -r, --repair         fix what can be fixed (default is check-only)\n\
  -o, --out <file>     write the output document there (default stdout)\n\
  -a, --always-emit    write the document even when unchanged; show info findings on clean runs\n\
  -q, --quiet          hide info findings and the summary line\n\
  -N, --no-network     refuse remote include targets\n\
  -X, --no-xinclude    leave xi:include elements unresolved\n\
      --cache <dir>    directory holding fetched include targets\n\
      --clear-cache    empty the cache directory first\n\
      --policy <file>  repair policy constants as JSON\n\
      --json           print findings as a JSON array\n\
  -v, --verbose        debug logging (or set SVGCHECK_LOG)\n\
\n\
NOTES:\n\
  - If <path> is '-', input is read from stdin.\n\
  - Findings go to stderr; the document goes to stdout unless --out is given.\n\
  - Exit status is 0 for a clean, grammar-valid drawing, 1 otherwise, 2 for usage errors.\n\
"
}

fn value_of<'a>(
    flag: &str,
    arg: &'a str,
    it: &mut impl Iterator<Item = &'a String>,
) -> Result<Option<&'a str>, CliError> {
    if arg == flag {
        return it
            .next()
            .map(|v| Some(v.as_str()))
            .ok_or(CliError::Usage(usage()));
    }
    Ok(arg
        .strip_prefix(flag)
        .and_then(|rest| rest.strip_prefix('=')))
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "--version" | "-V" => args.version = true,
            "--repair" | "-r" => args.mode = Mode::Repair,
            "--always-emit" | "-a" => args.output.always_emit = true,
            "--quiet" | "-q" => args.output.quiet = true,
            "--no-network" | "-N" => args.load.network = false,
            "--no-xinclude" | "-X" => args.load.xinclude = false,
            "--clear-cache" => args.clear_cache = true,
            "--json" => args.json = true,
            "--verbose" | "-v" => args.verbose = true,
            "-o" => {
                let Some(out) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.out = Some(out.clone());
            }
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            "-" => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some("-".to_string());
            }
            other if other.starts_with("--") => {
                if let Some(v) = value_of("--out", other, &mut it)? {
                    args.out = Some(v.to_string());
                } else if let Some(v) = value_of("--cache", other, &mut it)? {
                    args.cache = Some(PathBuf::from(v));
                } else if let Some(v) = value_of("--policy", other, &mut it)? {
                    args.policy = Some(PathBuf::from(v));
                } else {
                    return Err(CliError::Usage(usage()));
                }
            }
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    if args.clear_cache && args.cache.is_none() {
        return Err(CliError::Usage(usage()));
    }
    if args.input.is_none() && !args.clear_cache && !args.version {
        return Err(CliError::Usage(usage()));
    }
    Ok(args)
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("SVGCHECK_LOG").unwrap_or_else(|_| fallback.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn load_policy(path: Option<&Path>) -> Result<RepairPolicy, CliError> {
    match path {
        None => Ok(RepairPolicy::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(RepairPolicy::from_json(&text)?)
        }
    }
}

fn load_document(
    args: &Args,
    cache: Option<&DirCache>,
) -> Result<svgcheck_core::Document, CliError> {
    let mut loader = Loader::new(args.load);
    if let Some(cache) = cache {
        loader = loader.with_cache(cache);
    }
    match args.input.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(loader.load_str(&buf, "<stdin>")?)
        }
        Some(path) => Ok(loader.load_file(Path::new(path))?),
    }
}

fn write_document(text: &str, out: Option<&str>) -> Result<(), CliError> {
    match out {
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
        Some(path) => std::fs::write(path, text)?,
    }
    Ok(())
}

fn report(outcome: &Outcome, args: &Args) -> Result<(), CliError> {
    let mut all = DiagnosticSink::new();
    for d in outcome.diagnostics() {
        all.push(d.clone());
    }

    if args.json {
        let visible: Vec<JsonDiagnostic<'_>> = all
            .visible(args.output)
            .into_iter()
            .map(JsonDiagnostic::from)
            .collect();
        let mut stderr = std::io::stderr().lock();
        serde_json::to_writer_pretty(&mut stderr, &visible)?;
        writeln!(stderr)?;
    } else {
        eprint!("{}", all.render(args.output));
    }

    if !args.output.quiet {
        let verdict = if outcome.passed() { "ok" } else { "failed" };
        eprintln!(
            "svgcheck: {} fatal, {} warning(s), {} info; {} edit(s); grammar {}; {verdict}",
            all.count(Severity::Fatal),
            all.count(Severity::Warning),
            all.count(Severity::Info),
            outcome.report.edits,
            if outcome.validation.valid { "valid" } else { "invalid" },
        );
    }
    Ok(())
}

/// Returns whether the drawing passed.
fn run(args: Args) -> Result<bool, CliError> {
    if args.version {
        println!("svgcheck {}", env!("CARGO_PKG_VERSION"));
        return Ok(true);
    }

    let mut cache = args.cache.as_ref().map(DirCache::new);
    if args.clear_cache {
        if let Some(cache) = cache.as_mut() {
            let removed = cache.delete_all()?;
            if !args.output.quiet {
                eprintln!("svgcheck: removed {removed} cached include(s)");
            }
        }
        if args.input.is_none() {
            return Ok(true);
        }
    }

    let options = CheckOptions {
        mode: args.mode,
        policy: load_policy(args.policy.as_deref())?,
    };
    let mut doc = load_document(&args, cache.as_ref())?;
    let outcome = svgcheck_core::run(&mut doc, &options);
    tracing::debug!(
        edits = outcome.report.edits,
        roots = outcome.report.svg_roots,
        "check finished"
    );

    if options.repairing() || args.output.always_emit {
        write_document(&write::serialize(&doc), args.out.as_deref())?;
    }
    report(&outcome, &args)?;
    Ok(outcome.passed())
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_tracing(args.verbose);

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("svgcheck: {err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        std::iter::once("svgcheck")
            .chain(items.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parses_short_and_long_forms() {
        let args = parse_args(&argv(&["-r", "-q", "-N", "--out=x.svg", "--cache", "c", "in.svg"]))
            .unwrap();
        assert_eq!(args.mode, Mode::Repair);
        assert!(args.output.quiet);
        assert!(!args.load.network);
        assert!(args.load.xinclude);
        assert_eq!(args.out.as_deref(), Some("x.svg"));
        assert_eq!(args.cache.as_deref(), Some(Path::new("c")));
        assert_eq!(args.input.as_deref(), Some("in.svg"));
    }

    #[test]
    fn rejects_unknown_flags_and_missing_values() {
        assert!(matches!(
            parse_args(&argv(&["--bogus", "a.svg"])),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(parse_args(&argv(&["-o"])), Err(CliError::Usage(_))));
        assert!(matches!(parse_args(&argv(&[])), Err(CliError::Usage(_))));
        assert!(matches!(
            parse_args(&argv(&["--clear-cache"])),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn clear_cache_needs_no_input() {
        let args = parse_args(&argv(&["--cache=dir", "--clear-cache"])).unwrap();
        assert!(args.clear_cache);
        assert!(args.input.is_none());
    }
}
