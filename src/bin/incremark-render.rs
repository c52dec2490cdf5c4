use incremark::{DescriptorFactory, IncrementalMarkdown, MarkdownError, Options};
use std::env;
use std::fs;
use std::process;
use tracing_subscriber::EnvFilter;

struct Args {
    input: String,
    options: Option<String>,
    /// Re-render growing prefixes of this many chars
    stream: Option<usize>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args(env::args().skip(1).collect()) {
        Some(args) => args,
        None => {
            eprintln!("Usage: incremark-render <file.md> [--options <options.yaml|options.json>] [--stream <chars>]");
            eprintln!();
            eprintln!("Examples:");
            eprintln!("  incremark-render README.md");
            eprintln!("  incremark-render reply.md --options chat.yaml --stream 16");
            process::exit(1);
        }
    };

    if let Err(e) = run(&args) {
        eprintln!("✗ {}:", args.input);
        print_error(&e);
        process::exit(1);
    }
}

fn parse_args(raw: Vec<String>) -> Option<Args> {
    let mut input = None;
    let mut options = None;
    let mut stream = None;

    let mut iter = raw.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--options" => options = Some(iter.next()?),
            "--stream" => stream = Some(iter.next()?.parse().ok().filter(|n: &usize| *n > 0)?),
            _ if input.is_none() && !arg.starts_with("--") => input = Some(arg),
            _ => return None,
        }
    }

    Some(Args {
        input: input?,
        options,
        stream,
    })
}

fn load_options(path: &str) -> Result<Options, MarkdownError> {
    let content = fs::read_to_string(path)
        .map_err(|e| MarkdownError::Config(format!("Failed to read {}: {}", path, e)))?;
    if path.ends_with(".json") {
        Options::from_json(&content)
    } else {
        Options::from_yaml(&content)
    }
}

fn run(args: &Args) -> Result<(), MarkdownError> {
    let text = fs::read_to_string(&args.input)
        .map_err(|e| MarkdownError::Config(format!("Failed to read file: {}", e)))?;
    let mut options = match &args.options {
        Some(path) => load_options(path)?,
        None => Options::default(),
    };
    if args.stream.is_some() {
        options.enabled_cache = true;
    }

    let mut md = IncrementalMarkdown::builder(options)
        .factory(DescriptorFactory)
        .build()?;

    let element = match args.stream {
        Some(chunk) => {
            let boundaries: Vec<usize> = text
                .char_indices()
                .map(|(i, _)| i)
                .skip(chunk)
                .step_by(chunk)
                .chain(std::iter::once(text.len()))
                .collect();

            let mut last = None;
            for (pass, end) in boundaries.into_iter().enumerate() {
                last = Some(md.render(&text[..end])?);
                if let Some(stats) = md.last_stats() {
                    eprintln!(
                        "pass {:>4}  {:>6} bytes  hits {:>4}  misses {:>4}  reused {:>6}  converted {:>6}",
                        pass + 1,
                        end,
                        stats.hits,
                        stats.misses,
                        stats.reused_nodes,
                        stats.converted_nodes
                    );
                }
            }
            match last {
                Some(element) => element,
                None => md.render(&text)?,
            }
        }
        None => md.render(&text)?,
    };

    let json = serde_json::to_string_pretty(&element)?;
    println!("{}", json);
    Ok(())
}

fn print_error(error: &MarkdownError) {
    match error {
        MarkdownError::Diagnostic(diagnostic) => {
            eprintln!("  {} ({}:{})", diagnostic.message, diagnostic.source, diagnostic.rule_id);
            if let Some(place) = &diagnostic.place {
                eprintln!("    at line {}, column {}", place.line, place.column);
            }
            if !diagnostic.ancestors.is_empty() {
                eprintln!("    in <{}>", diagnostic.ancestors.join("> <"));
            }
            if let Some(cause) = &diagnostic.cause {
                eprintln!("    {}", cause);
            }
        }
        MarkdownError::Config(msg) => {
            eprintln!("  Configuration error:");
            eprintln!("    {}", msg);
        }
        e => {
            eprintln!("  {}", e);
        }
    }
}
