//! Command-line front end for the jarremap library.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use jarremap::{RemapConfig, Remapper};

#[derive(Parser, Debug)]
#[command(name = "jarremap", version, about = "Remap obfuscated symbols in a JVM archive")]
struct Cli {
    /// Obfuscated input archive
    input: PathBuf,

    /// Destination of the remapped archive
    output: PathBuf,

    /// Class mapping feed
    class_mappings: PathBuf,

    /// Member mapping feed
    member_mappings: PathBuf,

    /// Root namespace prefix enforced on mapped class names
    #[arg(long, value_name = "PREFIX")]
    namespace: Option<String>,

    /// Require and verify the hash column of the class mapping feed
    #[arg(long)]
    check_hashes: bool,

    /// Emit a sibling class-mapping file augmented with content hashes
    #[arg(long)]
    generate_hash_mappings: bool,

    /// Match recorded hashes against the archive and emit regenerated
    /// mappings instead of remapping members
    #[arg(long)]
    generate_from_hashes: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("jarremap", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let mut config = RemapConfig::new(
        cli.input,
        cli.output,
        cli.class_mappings,
        cli.member_mappings,
    );
    if let Some(namespace) = cli.namespace {
        config.root_namespace = namespace;
    }
    config.check_hashes = cli.check_hashes;
    config.generate_hash_mappings = cli.generate_hash_mappings;
    config.regenerate_from_hashes = cli.generate_from_hashes;

    let remapper = Remapper::new(config).context("failed to load mapping feeds")?;
    let summary = remapper.run().context("remapping failed")?;

    println!(
        "Remapped {} entries using {} class and {} member mappings in {}ms",
        summary.entries_written,
        summary.class_mappings,
        summary.member_mappings,
        summary.elapsed.as_millis()
    );
    Ok(())
}
