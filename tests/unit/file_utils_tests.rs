/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::fs;
use std::path::Path;

use doctran::file_utils::FileManager;
use crate::common;

#[test]
fn test_file_exists_with_existing_file_should_return_true() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let file = temp_dir.path().join("present.txt");
    fs::write(&file, "content")?;

    assert!(FileManager::file_exists(&file));
    assert!(!FileManager::file_exists(temp_dir.path()));
    assert!(!FileManager::file_exists(temp_dir.path().join("missing.txt")));
    Ok(())
}

#[test]
fn test_dir_exists_should_only_accept_directories() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    assert!(FileManager::dir_exists(temp_dir.path()));
    assert!(!FileManager::dir_exists(temp_dir.path().join("nope")));
    Ok(())
}

#[test]
fn test_generate_output_path_should_place_each_job_in_its_own_directory() {
    let a = FileManager::generate_output_path("/srv/out", "job-a", "report.docx", "translated_");
    let b = FileManager::generate_output_path("/srv/out", "job-b", "report.docx", "translated_");

    assert_eq!(a, Path::new("/srv/out/job-a/translated_report.docx"));
    assert_ne!(a.parent(), b.parent());
}

#[test]
fn test_generate_output_path_should_not_escape_download_dir() {
    let path = FileManager::generate_output_path("/srv/out", "job", "../../etc/passwd", "t_");
    assert!(path.starts_with("/srv/out/job"));
}

#[test]
fn test_extension_of_should_lowercase_and_ignore_missing() {
    assert_eq!(FileManager::extension_of("Sheet.XLSX").as_deref(), Some("xlsx"));
    assert_eq!(FileManager::extension_of("README"), None);
}

#[test]
fn test_find_files_should_walk_subdirectories() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("a").join("b");
    fs::create_dir_all(&nested)?;
    fs::write(temp_dir.path().join("one.docx"), b"x")?;
    fs::write(nested.join("two.PDF"), b"x")?;
    fs::write(nested.join("skip.csv"), b"x")?;

    let found = FileManager::find_files(temp_dir.path(), &["docx", "pdf"])?;

    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|p| p.extension().is_some_and(|e| e != "csv")));
    Ok(())
}

#[test]
fn test_write_atomic_then_read_bytes_should_return_same_content() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("job").join("out.bin");

    FileManager::write_atomic(&path, b"\x00\x01binary")?;

    assert_eq!(FileManager::read_bytes(&path)?, b"\x00\x01binary");
    Ok(())
}
