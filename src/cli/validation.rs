//! CLI argument validation functions
//!
//! Custom value parsers for arguments clap cannot check on its own.

use std::fs;
use std::path::PathBuf;

/// Validate port number is within valid range (1-65535)
pub fn validate_port(port_str: &str) -> Result<u16, String> {
    let port: u16 = port_str.parse().map_err(|_| {
        format!(
            "Port must be a valid number between 1 and 65535, got: '{}'",
            port_str
        )
    })?;

    if port == 0 {
        return Err("Port must be between 1 and 65535. Port 0 is not allowed.".to_string());
    }

    Ok(port)
}

/// Validate that a file path is accessible (exists and is readable)
pub fn validate_config_file_path(path_str: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(format!("Configuration file does not exist: '{}'", path_str));
    }

    if !path.is_file() {
        return Err(format!("Configuration path is not a file: '{}'", path_str));
    }

    match fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) => Err(format!(
            "Cannot read configuration file '{}': {}",
            path_str, e
        )),
    }
}

/// Validate rollback steps is between 1 and 100
pub fn validate_rollback_steps(steps_str: &str) -> Result<u32, String> {
    let steps: u32 = steps_str.parse().map_err(|_| {
        format!(
            "Rollback steps must be a valid positive number, got: '{}'",
            steps_str
        )
    })?;

    if steps == 0 {
        return Err("Rollback steps must be greater than 0".to_string());
    }

    if steps > 100 {
        return Err("Rollback steps cannot exceed 100 for safety reasons".to_string());
    }

    Ok(steps)
}

/// Validate host address format (basic validation)
pub fn validate_host_address(host_str: &str) -> Result<String, String> {
    let host = host_str.trim();

    if host.is_empty() {
        return Err("Host address cannot be empty".to_string());
    }

    if host.contains(' ') {
        return Err("Host address cannot contain spaces".to_string());
    }

    if host == "localhost" || host == "0.0.0.0" || host.starts_with("127.") {
        return Ok(host.to_string());
    }

    if host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        let parts: Vec<&str> = host.split('.').collect();
        if parts.len() != 4 || parts.iter().any(|p| p.parse::<u8>().is_err()) {
            return Err(format!("Invalid IPv4 address format: '{}'", host_str));
        }
        return Ok(host.to_string());
    }

    if host.len() > 253 {
        return Err("Host address is too long (maximum 253 characters)".to_string());
    }

    Ok(host.to_string())
}

/// Validate a positive millisecond duration
pub fn validate_millis(ms_str: &str) -> Result<u64, String> {
    let ms: u64 = ms_str
        .parse()
        .map_err(|_| format!("Expected a number of milliseconds, got: '{}'", ms_str))?;

    if ms == 0 {
        return Err("Duration must be greater than 0 milliseconds".to_string());
    }

    Ok(ms)
}

/// Validate a worker id: non-empty, printable, no whitespace
pub fn validate_worker_id(id_str: &str) -> Result<String, String> {
    let id = id_str.trim();

    if id.is_empty() {
        return Err("Worker id cannot be empty".to_string());
    }

    if id.len() > 128 {
        return Err("Worker id is too long (maximum 128 characters)".to_string());
    }

    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(format!("Worker id cannot contain whitespace: '{}'", id_str));
    }

    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_port_validation() {
        for port in ["1", "80", "3000", "65535"] {
            assert!(validate_port(port).is_ok(), "Port {} should be valid", port);
        }
        for port in ["0", "65536", "abc", "-1", ""] {
            assert!(validate_port(port).is_err(), "Port {} should be invalid", port);
        }
    }

    #[test]
    fn test_rollback_steps_bounds() {
        assert_eq!(validate_rollback_steps("1"), Ok(1));
        assert_eq!(validate_rollback_steps("100"), Ok(100));
        assert!(validate_rollback_steps("0").is_err());
        assert!(validate_rollback_steps("101").is_err());
        assert!(validate_rollback_steps("two").is_err());
    }

    #[test]
    fn test_host_validation() {
        for host in ["localhost", "0.0.0.0", "127.0.0.1", "10.1.2.3", "queue.internal"] {
            assert!(validate_host_address(host).is_ok(), "{} should be valid", host);
        }
        for host in ["", "   ", "my host", "256.1.1.1", "1.2.3"] {
            assert!(validate_host_address(host).is_err(), "{} should be invalid", host);
        }
    }

    #[test]
    fn test_millis_validation() {
        assert_eq!(validate_millis("500"), Ok(500));
        assert!(validate_millis("0").is_err());
        assert!(validate_millis("1.5").is_err());
    }

    #[test]
    fn test_worker_id_validation() {
        assert_eq!(validate_worker_id(" worker-a "), Ok("worker-a".to_string()));
        assert!(validate_worker_id("").is_err());
        assert!(validate_worker_id("worker a").is_err());
        assert!(validate_worker_id(&"w".repeat(129)).is_err());
    }

    #[test]
    fn test_config_file_path_validation() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 3000").unwrap();
        let path = file.path().to_str().unwrap();
        assert!(validate_config_file_path(path).is_ok());

        assert!(validate_config_file_path("/nonexistent/conveyor.toml").is_err());

        let dir = tempfile::tempdir().unwrap();
        assert!(validate_config_file_path(dir.path().to_str().unwrap()).is_err());
    }
}
