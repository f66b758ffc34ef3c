// thumbkit/src/utils/mod.rs
use crate::core::FILE_SOURCE;
use std::path::{Path, PathBuf};

/// Turn an input/output/watermark reference into a local path.
///
/// Anything following a `file://` marker is the path; a reference without
/// the marker is taken as a bare local path.
pub fn resolve_reference(reference: &str) -> PathBuf {
    match reference.find(FILE_SOURCE) {
        Some(pos) => PathBuf::from(&reference[pos + FILE_SOURCE.len()..]),
        None => PathBuf::from(reference),
    }
}

/// Inverse of [`resolve_reference`] for reporting.
pub fn to_reference(path: &Path) -> String {
    format!("{}{}", FILE_SOURCE, path.display())
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let base = 1024_f64;
    let bytes_f64 = bytes as f64;
    let exponent = ((bytes_f64.log10() / base.log10()).floor() as usize).min(UNITS.len() - 1);
    let size = bytes_f64 / base.powi(exponent as i32);

    format!("{:.2} {}", size, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_file_marker() {
        assert_eq!(resolve_reference("file:///tmp/a.jpg"), PathBuf::from("/tmp/a.jpg"));
        assert_eq!(resolve_reference("/tmp/b.jpg"), PathBuf::from("/tmp/b.jpg"));
        assert_eq!(resolve_reference("relative/c.png"), PathBuf::from("relative/c.png"));
    }

    #[test]
    fn reference_round_trip() {
        let path = Path::new("/srv/out.jpg");
        assert_eq!(resolve_reference(&to_reference(path)), path);
    }

    #[test]
    fn formats_sizes() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512.00 B");
        assert_eq!(format_file_size(2048), "2.00 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
    }
}
