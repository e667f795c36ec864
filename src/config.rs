//! CLI configuration for the `rvmctl` demo binary.
//!
//! This describes the *binary's* inputs, not the library's: `Rvm::init` takes only a directory
//! path, and these flags exist purely to drive that call and a scripted sequence of operations
//! for interactive/integration smoke-testing.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "rvmctl",
    about = "Scripted driver for the Recoverable Virtual Memory engine"
)]
pub struct Config {
    /// Directory backing this RVM instance. Created if absent, reused if present.
    #[clap(long, short = 'd')]
    pub dir: PathBuf,

    /// Path to a script file of newline-delimited operations to run in order.
    #[clap(long = "script-path", group = "script_source")]
    pub script_path: Option<PathBuf>,

    /// A single scripted operation, given inline. May be repeated to build a script on the
    /// command line without a script file.
    #[clap(long = "op", group = "script_source")]
    pub inline_ops: Vec<String>,
}

impl Config {
    /// Resolve the script lines to run, from `--script-path` or the repeated `--op` flags.
    pub fn script_lines(&self) -> std::io::Result<Vec<String>> {
        if let Some(path) = &self.script_path {
            let contents = std::fs::read_to_string(path)?;
            Ok(contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect())
        } else {
            Ok(self.inline_ops.clone())
        }
    }
}
