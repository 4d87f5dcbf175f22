//! Digest command implementation.

use crate::sync::script_digest;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Compute a script digest locally.
#[derive(Args, Debug)]
pub struct DigestArgs {
    /// Script body.
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub script: Option<String>,

    /// Read the script from a file.
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

/// Run the digest command.
pub fn run_digest(args: DigestArgs) -> Result<()> {
    let script = match (args.script, args.file) {
        (Some(script), _) => script,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read script {:?}", path))?,
        (None, None) => anyhow::bail!("no script given"),
    };
    println!("{}", script_digest(&script));
    Ok(())
}
