use anyhow::{Result, Context};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File and directory utilities

static UNSAFE_NAME_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("Invalid file name regex")
});

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @returns: Final path component with characters unsafe on common filesystems replaced
    pub fn sanitize_file_name(name: &str) -> String {
        let base = name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(name)
            .trim();
        let cleaned = UNSAFE_NAME_CHARS.replace_all(base, "_").to_string();
        if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
            "document".to_string()
        } else {
            cleaned
        }
    }

    // @generates: Output path for a translated document
    // @params: download_dir, job_id, original file name, output prefix
    pub fn generate_output_path<P: AsRef<Path>>(
        download_dir: P,
        job_id: &str,
        file_name: &str,
        prefix: &str,
    ) -> PathBuf {
        let file_name = Self::sanitize_file_name(file_name);
        download_dir
            .as_ref()
            .join(job_id)
            .join(format!("{}{}", prefix, file_name))
    }

    // @generates: Plain-text fallback path next to the intended output
    pub fn fallback_path<P: AsRef<Path>>(output_path: P) -> PathBuf {
        let mut os = output_path.as_ref().as_os_str().to_os_string();
        os.push(".txt");
        PathBuf::from(os)
    }

    /// Lowercase extension of a file name, without the dot
    pub fn extension_of(file_name: &str) -> Option<String> {
        Path::new(file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    /// Find files with one of the given extensions in a directory
    pub fn find_files<P: AsRef<Path>>(dir: P, extensions: &[&str]) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() {
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy();
                    if extensions.iter().any(|wanted| ext.eq_ignore_ascii_case(wanted.trim_start_matches('.'))) {
                        result.push(path.to_path_buf());
                    }
                }
            }
        }

        result.sort();
        Ok(result)
    }

    /// Read a whole file
    pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        fs::read(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write bytes through a temporary file in the same directory, then rename
    ///
    /// Readers polling the output location never observe a half-written file.
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
        let path = path.as_ref();
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::ensure_dir(parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
        temp.write_all(content)
            .with_context(|| format!("Failed to write temporary file for {:?}", path))?;
        temp.flush()?;
        temp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to move output into place: {:?}", path))?;

        Ok(())
    }

    /// Hex SHA-256 digest of a byte slice
    pub fn sha256_hex(content: &[u8]) -> String {
        let digest = Sha256::digest(content);
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
