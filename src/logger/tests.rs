//! Tests for the logger module

use crate::logger::config::*;
use crate::logger::error::LoggerError;
use crate::logger::open_log_file;
use std::io::Write;
use std::path::PathBuf;

fn console_only() -> LoggerConfig {
    LoggerConfig {
        level: "info".to_string(),
        console: ConsoleConfig {
            enabled: true,
            colored: false,
        },
        file: FileConfig::default(),
    }
}

#[test]
fn test_default_config_is_valid() {
    let config = LoggerConfig::default();
    assert!(config.console.enabled);
    assert!(!config.file.enabled);
    assert!(config.validate().is_ok());
}

#[test]
fn test_both_outputs_disabled_is_rejected() {
    let mut config = console_only();
    config.console.enabled = false;
    assert!(matches!(config.validate(), Err(LoggerError::Config { .. })));
}

#[test]
fn test_bad_directive_is_rejected() {
    let config = console_only().with_level("info,conveyor=notalevel");
    assert!(matches!(config.validate(), Err(LoggerError::Filter(_))));
}

#[test]
fn test_enabled_file_needs_path() {
    let mut config = console_only();
    config.file.enabled = true;
    config.file.path = PathBuf::new();
    assert!(config.validate().is_err());
}

#[test]
fn test_log_format_parsing() {
    assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
    assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
    assert!("xml".parse::<LogFormat>().is_err());
}

#[test]
fn test_open_log_file_creates_parent_and_truncates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("conveyor.log");
    let mut config = FileConfig {
        enabled: true,
        path: path.clone(),
        append: true,
        format: LogFormat::Json,
    };

    {
        let mut file = open_log_file(&config).unwrap();
        writeln!(file, "first").unwrap();
    }
    {
        let mut file = open_log_file(&config).unwrap();
        writeln!(file, "second").unwrap();
    }
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");

    config.append = false;
    {
        let mut file = open_log_file(&config).unwrap();
        writeln!(file, "third").unwrap();
    }
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "third\n");
}
