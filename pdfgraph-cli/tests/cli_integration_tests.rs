//! Integration tests for the pdfgraph CLI
//!
//! Runs the built binary against small PDF files written to a temporary
//! directory.

use anyhow::Result;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::{tempdir, TempDir};

const SAMPLE_PDF: &str = "%PDF-1.4
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj
2 0 obj
<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 595 842]
   /Resources << /Font << /F1 5 0 R >> >> >>
endobj
3 0 obj
<< /Type /Page /Parent 2 0 R /Contents 6 0 R >>
endobj
4 0 obj
<< /Type /Page /Parent 2 0 R /Contents 7 0 R /Rotate 90 >>
endobj
5 0 obj
<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>
endobj
6 0 obj
<< /Length 50 >>
stream
BT /F1 12 Tf 72 720 Td (Hello) Tj T* (World) Tj ET
endstream
endobj
7 0 obj
<< >>
stream
BT /F1 12 Tf (Second page) Tj ET
endstream
endobj
trailer
<< /Root 1 0 R /Size 8 >>
%%EOF
";

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pdfgraph"))
}

fn setup_temp_dir() -> TempDir {
    tempdir().expect("Failed to create temp directory")
}

fn write_sample(dir: &Path) -> PathBuf {
    let path = dir.join("sample.pdf");
    fs::write(&path, SAMPLE_PDF).expect("Failed to write sample PDF");
    path
}

fn run(args: &[&str]) -> Result<Output> {
    Ok(cli().args(args).output()?)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_info_command() -> Result<()> {
    let dir = setup_temp_dir();
    let path = write_sample(dir.path());

    let output = run(&["info", path.to_str().unwrap(), "--detailed"])?;
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Pages: 2"));
    assert!(text.contains("Page 1: 3 0 R, 595x842 pts, rotation 0"));
    assert!(text.contains("Page 2: 4 0 R, 842x595 pts, rotation 90"));
    Ok(())
}

#[test]
fn test_extract_text_single_page() -> Result<()> {
    let dir = setup_temp_dir();
    let path = write_sample(dir.path());

    let output = run(&["extract-text", path.to_str().unwrap(), "--page", "0"])?;
    assert!(output.status.success());
    assert_eq!(stdout(&output), "Hello\nWorld\n");
    Ok(())
}

#[test]
fn test_extract_text_to_file() -> Result<()> {
    let dir = setup_temp_dir();
    let path = write_sample(dir.path());
    let target = dir.path().join("out.txt");

    let output = run(&[
        "extract-text",
        path.to_str().unwrap(),
        "--output",
        target.to_str().unwrap(),
    ])?;
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(&target)?, "Hello\nWorld\n\nSecond page");
    Ok(())
}

#[test]
fn test_object_command() -> Result<()> {
    let dir = setup_temp_dir();
    let path = write_sample(dir.path());

    let output = run(&["object", path.to_str().unwrap(), "5"])?;
    assert!(output.status.success());
    assert!(stdout(&output).contains("/Helvetica"));

    let missing = run(&["object", path.to_str().unwrap(), "99"])?;
    assert!(!missing.status.success());
    assert!(String::from_utf8_lossy(&missing.stderr).contains("99 0 R"));
    Ok(())
}

#[test]
fn test_fonts_command() -> Result<()> {
    let dir = setup_temp_dir();
    let path = write_sample(dir.path());

    let output = run(&["fonts", path.to_str().unwrap(), "--page", "1"])?;
    assert!(output.status.success());
    assert_eq!(stdout(&output), "/F1: Helvetica (Type1), 5 0 R\n");
    Ok(())
}

#[test]
fn test_missing_file_fails() -> Result<()> {
    let dir = setup_temp_dir();
    let path = dir.path().join("does_not_exist.pdf");

    let output = run(&["info", path.to_str().unwrap()])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to open PDF"));
    Ok(())
}

#[test]
fn test_page_out_of_range_fails() -> Result<()> {
    let dir = setup_temp_dir();
    let path = write_sample(dir.path());

    let output = run(&["extract-text", path.to_str().unwrap(), "--page", "7"])?;
    assert!(!output.status.success());
    Ok(())
}
