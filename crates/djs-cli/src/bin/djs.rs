//! Deobfuscator CLI.
//!
//! Reads a JavaScript file (or stdin), runs one restoration recipe, and
//! prints the restored source. Diagnostics go to stderr; the exit code is
//! zero whenever the input parsed, even if parts could not be restored.
//!
//! ```bash
//! djs bundle.js --recipe obfuscator-io --rename -o restored.js
//! cat packed.js | djs --recipe packer-v7
//! ```

use std::io::{Read, Write};
use std::path::PathBuf;

use clap::Parser;
use djs_restore::{deobfuscate, Options, Recipe};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "djs",
    version = env!("CARGO_PKG_VERSION"),
    about = "Restore obfuscated JavaScript to readable source"
)]
struct Cli {
    /// Input file; reads stdin when absent.
    file: Option<PathBuf>,

    /// Restoration recipe to run.
    #[arg(short, long, default_value = "generic", value_parser = parse_recipe)]
    recipe: Recipe,

    /// Rename mangled identifiers to positional names (v0, f0, p0, ...).
    #[arg(long)]
    rename: bool,

    /// Rename every identifier, not only `_0x`-mangled ones.
    #[arg(long, requires = "rename")]
    all_identifiers: bool,

    /// Output file; writes stdout when absent.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_recipe(name: &str) -> Result<Recipe, String> {
    Recipe::from_name(name).ok_or_else(|| {
        let known = Recipe::ALL.map(|r| r.name()).join(", ");
        format!("unknown recipe `{name}` (known: {known})")
    })
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let source = match &cli.file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let mut program = djs_frontend::parse(&source)?;
    let options = Options {
        rename: cli.rename,
        hexadecimal_only: !cli.all_identifiers,
    };
    debug!(recipe = cli.recipe.name(), "parsed input, running recipe");
    let diagnostics = deobfuscate(&mut program, cli.recipe, &options);
    for diagnostic in &diagnostics {
        eprintln!("{diagnostic}");
    }

    let restored = djs_frontend::print(&program)?;
    match &cli.output {
        Some(path) => std::fs::write(path, restored)?,
        None => std::io::stdout().write_all(restored.as_bytes())?,
    }
    Ok(())
}

fn setup_logging(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let formatter = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_level(true);
    tracing_subscriber::registry()
        .with(formatter)
        .with(filter)
        .init();
}
