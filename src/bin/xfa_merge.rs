//! Merge an XFA document and print the Form tree
//!
//! Loads an XDP file (or a template packet plus a datasets packet), runs the
//! data merge and writes the resulting Form tree as JSON to stdout.
//!
//! Usage:
//!   cargo run --release --bin xfa_merge -- form.xdp
//!   cargo run --release --bin xfa_merge -- template.xml --datasets data.xml
//!   cargo run --release --bin xfa_merge -- form.xdp --options '{"max_recursion_depth": 64}' --compact
//!
//! Set RUST_LOG=debug for merge diagnostics.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use xfa_forms::{MergeOptions, XfaParser};

struct MergeConfig {
    input: PathBuf,
    datasets: Option<PathBuf>,
    options: MergeOptions,
    compact: bool,
    remerge: bool,
}

impl MergeConfig {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut input = None;
        let mut datasets = None;
        let mut options = MergeOptions::default();
        let mut compact = false;
        let mut remerge = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--datasets" => {
                    i += 1;
                    let path = args.get(i).ok_or("--datasets needs a file")?;
                    datasets = Some(PathBuf::from(path));
                },
                "--options" => {
                    i += 1;
                    let json = args.get(i).ok_or("--options needs a JSON object")?;
                    options = serde_json::from_str(json).map_err(|e| format!("bad --options: {}", e))?;
                },
                "--compact" => {
                    compact = true;
                },
                "--remerge" => {
                    remerge = true;
                },
                "--help" | "-h" => {
                    return Err(String::new());
                },
                other if other.starts_with("--") => {
                    return Err(format!("unknown flag {}", other));
                },
                other => {
                    input = Some(PathBuf::from(other));
                },
            }
            i += 1;
        }

        Ok(Self {
            input: input.ok_or("missing input file")?,
            datasets,
            options,
            compact,
            remerge,
        })
    }
}

fn usage() {
    eprintln!("Usage: xfa_merge <file.xdp | template.xml --datasets data.xml> [--options JSON] [--remerge] [--compact]");
}

fn run(config: &MergeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let input = fs::read_to_string(&config.input)?;
    let parser = XfaParser::with_options(config.options.clone());
    let mut doc = match &config.datasets {
        Some(path) => {
            let datasets = fs::read_to_string(path)?;
            parser.parse_packets(&input, Some(&datasets))?
        },
        None => parser.parse(&input)?,
    };

    doc.do_data_merge()?;
    if config.remerge {
        doc.re_merge()?;
    }
    log::info!(
        "Merged {}: {} instance managers, {} pending page sets",
        config.input.display(),
        doc.instance_managers().len(),
        doc.pending_page_sets().len()
    );

    let Some(form) = doc.dump_form() else {
        return Err("merge produced no form".into());
    };
    let json = if config.compact {
        serde_json::to_string(&form)?
    } else {
        form.to_json()?
    };
    println!("{}", json);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let config = match MergeConfig::from_args() {
        Ok(config) => config,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("Error: {}", message);
            }
            usage();
            return ExitCode::from(2);
        },
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
