// Inspect the document assembled from a COLLADA file.
// Run with: cargo run --bin dae_inspect -- <path_to.dae> [--summary] [--id <id>]

use std::env;
use std::fs;
use std::process;

use anyhow::{bail, Context, Result};
use dae_core::{load_collada_with_options, Document, LoaderOptions, Value};

struct Args {
    path: String,
    options: LoaderOptions,
    summary: bool,
    id: Option<String>,
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} <path_to.dae> [options]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --summary          Print entry counts per library instead of the document");
    eprintln!("  --id <id>          Print only the element declared with this id");
    eprintln!("  --strict           Fail on elements the schema does not recognize");
    eprintln!("  --trace            Log every element at trace level (set RUST_LOG=trace)");
    eprintln!("  --options <file>   Read loader options from a JSON file");
    process::exit(1);
}

fn parse_args() -> Result<Args> {
    let mut argv = env::args();
    let program = argv.next().unwrap_or_else(|| "dae_inspect".to_string());

    let mut path = None;
    let mut options = LoaderOptions::default();
    let mut summary = false;
    let mut id = None;
    let (mut strict, mut trace) = (false, false);

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--summary" => summary = true,
            "--strict" => strict = true,
            "--trace" => trace = true,
            "--id" => match argv.next() {
                Some(value) => id = Some(value),
                None => bail!("--id needs a value"),
            },
            "--options" => {
                let Some(file) = argv.next() else {
                    bail!("--options needs a file");
                };
                let text = fs::read_to_string(&file)
                    .with_context(|| format!("reading options from {}", file))?;
                options = serde_json::from_str(&text)
                    .with_context(|| format!("parsing options in {}", file))?;
            }
            "-h" | "--help" => usage(&program),
            other if other.starts_with("--") => bail!("unknown option {}", other),
            other => path = Some(other.to_string()),
        }
    }

    // Flags override the options file
    options.strict |= strict;
    options.trace |= trace;

    let Some(path) = path else { usage(&program) };
    Ok(Args {
        path,
        options,
        summary,
        id,
    })
}

fn print_summary(doc: &Document) {
    println!("=== Document ===");
    if let Some(asset) = doc.get("asset") {
        if let Some(title) = asset.get("title").and_then(Value::as_str) {
            println!("Title: {}", title);
        }
        if let Some(axis) = asset.get("upAxis").and_then(Value::as_str) {
            println!("Up axis: {}", axis);
        }
    }

    println!("\n--- Libraries ---");
    if let Some(root) = doc.root().as_map() {
        for (name, value) in root {
            match value {
                Value::List(items) => println!("  {:<16} {} entries", name, items.len()),
                _ => println!("  {:<16} record", name),
            }
        }
    }

    println!("\n--- Identifiers ---");
    println!("  {} global ids", doc.ids().count());
}

fn main() -> Result<()> {
    env_logger::init();

    let args = parse_args()?;
    log::debug!("Loading {} with {:?}", args.path, args.options);

    let doc = load_collada_with_options(&args.path, &args.options)
        .with_context(|| format!("loading {}", args.path))?;

    if let Some(id) = &args.id {
        let Some(value) = doc.lookup(id) else {
            bail!("no element declares id \"{}\"", id);
        };
        println!("{}", serde_json::to_string_pretty(value)?);
    } else if args.summary {
        print_summary(&doc);
    } else {
        println!("{}", serde_json::to_string_pretty(doc.root())?);
    }
    Ok(())
}
