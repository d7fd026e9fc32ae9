//! Command line arguments

use std::path::PathBuf;

use clap::Parser;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "apk-inspect")]
#[command(about = "Extract security-relevant metadata from an Android APK as a JSON report")]
#[command(version)]
pub struct Args {
    /// APK file to analyze; relative paths are resolved against the current directory
    pub apk: Option<PathBuf>,
}
