use anyhow::Result;
use std::path::{Path, PathBuf};

/// Resolve an executable given as a path or a bare name on PATH
pub fn find_binary(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if path.components().count() > 1 || path.is_absolute() {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        anyhow::bail!("Binary not found at {}", path.display());
    }

    which::which(name).map_err(|e| anyhow::anyhow!("Could not find '{}' on PATH: {}", name, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary() {
        assert!(find_binary("definitely-not-a-real-binary-xyz").is_err());
        assert!(find_binary("./no/such/tool").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_finds_shell() {
        assert!(find_binary("sh").is_ok());
    }
}
