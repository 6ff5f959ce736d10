use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "codecell", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: String,

    /// Language identifier of the submitted source
    #[arg(long = "language", short = 'l')]
    pub language: String,

    /// Path to the source file to execute
    pub source_path: String,
}

impl CliArgs {
    /// Load the configuration from the specified file
    pub fn to_config(&self) -> std::io::Result<Config> {
        let file = std::fs::File::open(&self.config_path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| e.into())
    }
}

/// Operator-provided configuration, loaded once at startup and read-only
/// thereafter.
#[derive(Deserialize, Debug)]
pub struct Config {
    /// Parent directory for per-execution workspaces. Defaults to the
    /// per-user cache directory when absent.
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,
    /// Whether a timed-out run surfaces the stdout captured before the
    /// process was killed. Off by default: a timeout reports only the fixed
    /// timeout message.
    #[serde(default)]
    pub surface_partial_output: bool,
    /// Deadline applied to the two in-process script strategies.
    #[serde(default = "default_script_timeout")]
    pub script_timeout_seconds: u64,
    pub toolchains: Vec<ToolchainProfile>,
}

/// How to compile and run one language's code.
///
/// Command templates may reference `%INPUT%` (the entry-point file name,
/// e.g. `main.cpp`) and `%OUTPUT%` (the entry-point stem, e.g. `main`).
/// Submitted code must agree with the profile's entry point where the
/// toolchain cares (e.g. the public class of a Java snippet must match
/// `entry_point`).
#[derive(Deserialize, Debug, Clone)]
pub struct ToolchainProfile {
    pub name: String,
    /// Source file extension, including the leading dot
    pub file_extension: String,
    /// Fixed stem of the source file written into the workspace
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    /// Compilation command; absent for languages run directly from source
    pub compile_command: Option<Vec<String>>,
    pub run_command: Vec<String>,
    /// Wall-clock deadline for the run step
    pub timeout_seconds: u64,
    /// Wall-clock deadline for the compile step
    #[serde(default = "default_compile_timeout")]
    pub compile_timeout_seconds: u64,
}

impl ToolchainProfile {
    /// File name the snippet is written to inside the workspace
    pub fn source_file_name(&self) -> String {
        format!("{}{}", self.entry_point, self.file_extension)
    }
}

fn default_script_timeout() -> u64 {
    5
}

fn default_entry_point() -> String {
    "main".to_string()
}

fn default_compile_timeout() -> u64 {
    30
}
