//! httpvcr CLI

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use chrono::DateTime;
use httpvcr::Cassette;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = &args[1];

    let result = match command.as_str() {
        "stats" | "erase" => {
            if args.len() < 3 {
                eprintln!("Usage: httpvcr {command} <cassette.json>");
                process::exit(1);
            }

            let path = PathBuf::from(&args[2]);
            if command == "stats" {
                show_stats(&path)
            } else {
                erase(&path)
            }
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'httpvcr' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    eprintln!("httpvcr v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: httpvcr <command> <cassette.json>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  stats     Show cassette statistics");
    eprintln!("  erase     Delete a cassette file");
}

fn show_stats(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Cassette not found: {}", path.display());
    }

    let cassette = Cassette::open(path).context("Invalid cassette path")?;
    let interactions = cassette.read().context("Failed to read cassette")?;

    println!("Cassette: {}", cassette.name());
    println!("File: {}", cassette.file_path().display());
    println!("Interactions: {}", interactions.len());

    let mut methods: Vec<(&str, usize)> = Vec::new();
    for interaction in &interactions {
        let method = interaction.request.method.as_str();
        match methods.iter_mut().find(|(m, _)| m.eq_ignore_ascii_case(method)) {
            Some((_, count)) => *count += 1,
            None => methods.push((method, 1)),
        }
    }
    for (method, count) in &methods {
        println!("  {method:<8} {count}");
    }

    if let Some(oldest) = interactions.iter().map(|i| i.recorded_at).min() {
        match DateTime::from_timestamp(oldest, 0) {
            Some(at) => println!("Oldest recording: {}", at.to_rfc3339()),
            None => println!("Oldest recording: {oldest}"),
        }
    }

    Ok(())
}

fn erase(path: &Path) -> Result<()> {
    let cassette = Cassette::open(path).context("Invalid cassette path")?;
    cassette.erase()?;
    println!("Erased {}", path.display());
    Ok(())
}
