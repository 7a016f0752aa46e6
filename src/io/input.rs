use std::path::Path;

use anyhow::{Context, Result};

/// Read a plain-text transcript from disk
pub fn read_transcript(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    String::from_utf8(bytes).with_context(|| format!("Transcript is not valid UTF-8: {:?}", path))
}

/// Read the product summary, preferring inline text over a file
pub fn read_product_summary(inline: Option<String>, file: Option<&Path>) -> Result<String> {
    match (inline, file) {
        (Some(text), _) => Ok(text.trim().to_string()),
        (None, Some(path)) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read product summary: {:?}", path))?;
            Ok(text.trim().to_string())
        }
        (None, None) => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interview.txt");
        std::fs::write(&path, "Alice: Hi\nBob: Hello\n").unwrap();

        assert_eq!(read_transcript(&path).unwrap(), "Alice: Hi\nBob: Hello\n");
    }

    #[test]
    fn test_missing_file_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_transcript(&dir.path().join("missing.txt")).unwrap_err();

        assert!(err.to_string().contains("Failed to read file"));
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        assert!(read_transcript(&path).is_err());
    }

    #[test]
    fn test_product_summary_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("product.md");
        std::fs::write(&path, "  Offline-first notes app\n").unwrap();

        assert_eq!(
            read_product_summary(Some("Inline".into()), Some(&path)).unwrap(),
            "Inline"
        );
        assert_eq!(
            read_product_summary(None, Some(&path)).unwrap(),
            "Offline-first notes app"
        );
        assert_eq!(read_product_summary(None, None).unwrap(), "");
    }
}
