//! Command line arguments and engine options.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use glimpse_engine::{EngineError, EngineOptions};

/// Namespace of the demo widgets, always imported.
pub const WIDGET_NAMESPACE: &str = "ui";

#[derive(Parser, Debug)]
#[command(name = "glimpse")]
#[command(about = "Glimpse live evaluator - reads JSON requests on stdin, writes JSON reports on stdout")]
#[command(version)]
pub struct Args {
    /// JSON file with engine options
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Extra conditional symbol (repeatable)
    #[arg(short = 'D', long = "symbol", value_name = "NAME")]
    pub symbols: Vec<String>,

    /// Give up on a request the UI thread has not answered within this time
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Log filter, overriding RUST_LOG
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Report results without driving the preview surface
    #[arg(long)]
    pub no_preview: bool,
}

/// Read the config file, if any, then apply command line overrides.
pub fn load_options(args: &Args) -> Result<EngineOptions, EngineError> {
    let mut options = match &args.config {
        Some(path) => EngineOptions::from_file(path)?,
        None => EngineOptions::default(),
    };

    for symbol in &args.symbols {
        if !options.extra_symbols.contains(symbol) {
            options = options.symbol(symbol.clone());
        }
    }
    if let Some(ms) = args.timeout_ms {
        options = options.dispatch_timeout(Duration::from_millis(ms));
    }
    if !options.extra_imports.iter().any(|ns| ns == WIDGET_NAMESPACE) {
        options = options.import(WIDGET_NAMESPACE);
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("glimpse").chain(argv.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let options = load_options(&args(&[])).unwrap();
        assert_eq!(options.extra_imports, vec![WIDGET_NAMESPACE]);
        assert!(options.extra_symbols.is_empty());
        assert_eq!(options.timeout(), None);
    }

    #[test]
    fn test_file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"extra_symbols": ["TRACE"], "dispatch_timeout_ms": 500, "include_platform_symbol": false}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let options = load_options(&args(&["--config", &path, "-D", "TRACE", "--symbol", "DEMO", "--timeout-ms", "50"]))
            .unwrap();
        assert_eq!(options.extra_symbols, vec!["TRACE", "DEMO"]);
        assert_eq!(options.timeout(), Some(Duration::from_millis(50)));
        assert!(!options.include_platform_symbol);
    }

    #[test]
    fn test_file_imports_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glimpse.json");
        std::fs::write(&path, r#"{"extra_imports": ["ui", "app"]}"#).unwrap();

        let options = load_options(&args(&["--config", path.to_str().unwrap()])).unwrap();
        assert_eq!(options.extra_imports, vec!["ui", "app"]);
    }

    #[test]
    fn test_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            load_options(&args(&["--config", missing.to_str().unwrap()])),
            Err(EngineError::Config(_))
        ));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{").unwrap();
        assert!(matches!(
            load_options(&args(&["--config", broken.to_str().unwrap()])),
            Err(EngineError::Config(_))
        ));
    }
}
