//! bvec / bval text files.
//!
//! Values are separated by whitespace or commas; blank lines and lines
//! starting with `#` are skipped.

use std::path::Path;

use anyhow::{Context, Result};

fn parse_rows(text: &str) -> Result<Vec<Vec<f64>>> {
    text.lines()
        .enumerate()
        .map(|(n, line)| (n, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| {
            line.split(|c: char| c.is_whitespace() || c == ',')
                .filter(|token| !token.is_empty())
                .map(|token| {
                    token
                        .parse::<f64>()
                        .with_context(|| format!("line {}: invalid number {:?}", n + 1, token))
                })
                .collect()
        })
        .collect()
}

/// Rows of a gradient-direction file exactly as written, either one row per
/// axis or one row per acquisition.
pub fn read_bvecs<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<f64>>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bvecs file {}", path.display()))?;
    let rows = parse_rows(&text).with_context(|| format!("Malformed bvecs file {}", path.display()))?;
    if rows.is_empty() {
        anyhow::bail!("bvecs file {} is empty", path.display());
    }
    Ok(rows)
}

/// b-values in file order, spread over one or more lines.
pub fn read_bvals<P: AsRef<Path>>(path: P) -> Result<Vec<f64>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bvals file {}", path.display()))?;
    let values: Vec<f64> = parse_rows(&text)
        .with_context(|| format!("Malformed bvals file {}", path.display()))?
        .into_iter()
        .flatten()
        .collect();
    if values.is_empty() {
        anyhow::bail!("bvals file {} is empty", path.display());
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_read_bvecs_keeps_layout() {
        let f = file("0 1 0 0\n0 0 1 0\n0 0 0 1\n");
        let rows = read_bvecs(f.path()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_read_bvecs_commas_and_comments() {
        let f = file("# directions\n0,0,0\n\n1.0, 0.0, 0.0\n");
        let rows = read_bvecs(f.path()).unwrap();
        assert_eq!(rows, vec![vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_read_bvals_multiline() {
        let f = file("0 1000\n1000 0\n");
        assert_eq!(read_bvals(f.path()).unwrap(), vec![0.0, 1000.0, 1000.0, 0.0]);
    }

    #[test]
    fn test_invalid_number() {
        let f = file("0 x 1\n");
        let err = read_bvecs(f.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid number"));
    }

    #[test]
    fn test_empty_file() {
        let f = file("\n\n");
        assert!(read_bvals(f.path()).is_err());
    }
}
