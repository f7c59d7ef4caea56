//! End-to-end tests that drive the `site-chat` binary.
//!
//! Documents are built in memory (docx and xlsx are zip archives), written
//! to a temp directory, and ingested through the CLI. Nothing here talks to
//! the network.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn site_chat_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("site-chat");
    path
}

fn zip_parts(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, body) in parts {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );
    zip_parts(&[("word/document.xml", &xml)])
}

fn xlsx(rows: &[(&str, &str)]) -> Vec<u8> {
    let rows: String = rows
        .iter()
        .map(|(a, b)| {
            format!(
                "<row><c t=\"inlineStr\"><is><t>{}</t></is></c><c t=\"inlineStr\"><is><t>{}</t></is></c></row>",
                a, b
            )
        })
        .collect();
    let sheet = format!("<worksheet><sheetData>{}</sheetData></worksheet>", rows);
    zip_parts(&[("xl/worksheets/sheet1.xml", &sheet)])
}

/// Temp workspace with a config and a `files/` directory of mixed uploads.
fn setup_test_env(config: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("config")).unwrap();
    let files = root.join("files");
    fs::create_dir_all(&files).unwrap();

    fs::write(
        files.join("notes.txt"),
        "Deployment notes: the staging cluster is rebuilt every Monday.",
    )
    .unwrap();
    fs::write(
        files.join("report.docx"),
        docx(&["Quarterly report", "Revenue grew in the northern region."]),
    )
    .unwrap();
    fs::write(
        files.join("inventory.xlsx"),
        xlsx(&[("Item", "Count"), ("Widget", "12"), ("Gadget", "7")]),
    )
    .unwrap();
    fs::write(files.join("legacy.doc"), [0xD0u8, 0xCF, 0x11, 0xE0]).unwrap();
    fs::write(files.join("logo.png"), [0x89u8, b'P', b'N', b'G']).unwrap();

    let config_path = root.join("config").join("site-chat.toml");
    fs::write(&config_path, config).unwrap();
    (tmp, config_path)
}

fn run(root: &Path, config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_with_env(root, config_path, args, &[])
}

fn run_with_env(
    root: &Path,
    config_path: &Path,
    args: &[&str],
    env: &[(&str, &str)],
) -> (String, String, bool) {
    let binary = site_chat_binary();
    let mut cmd = Command::new(&binary);
    cmd.current_dir(root)
        .env_remove("OPENAI_API_KEY")
        .env("RUST_LOG", "warn")
        .arg("--config")
        .arg(config_path)
        .args(args);
    for (k, v) in env {
        cmd.env(k, v);
    }
    let output = cmd
        .output()
        .unwrap_or_else(|e| panic!("Failed to run site-chat binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn read_corpus(path: &Path) -> Vec<serde_json::Value> {
    let raw = fs::read_to_string(path).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn ingest_directory_skips_unsupported_files() {
    let (tmp, config) = setup_test_env("");
    let root = tmp.path();

    let (stdout, stderr, ok) = run(root, &config, &["ingest", "files", "--out", "corpus.json"]);
    assert!(ok, "ingest failed: {}", stderr);
    assert!(stdout.contains("files: 4"), "stdout: {}", stdout);
    assert!(stdout.contains("entries added: 3"), "stdout: {}", stdout);
    assert!(stdout.contains("skipped: 1"), "stdout: {}", stdout);
    assert!(stdout.contains("ok"));
    assert!(stderr.contains("legacy.doc"), "stderr: {}", stderr);

    let records = read_corpus(&root.join("corpus.json"));
    assert_eq!(records.len(), 3);
    let ids: Vec<&str> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert!(ids.contains(&"report.docx"));
    assert!(ids.contains(&"inventory.xlsx"));
    assert!(ids.contains(&"notes.txt"));

    let sheet = records
        .iter()
        .find(|r| r["id"] == "inventory.xlsx")
        .unwrap();
    assert_eq!(sheet["text"], "Widget | 12\nGadget | 7");
    assert_eq!(sheet["metadata"]["label"], "inventory.xlsx");
}

#[test]
fn spreadsheet_rows_mode_gives_one_entry_per_row() {
    let (tmp, config) = setup_test_env("[corpus]\nspreadsheet_mode = \"rows\"\n");
    let root = tmp.path();

    let (stdout, stderr, ok) = run(
        root,
        &config,
        &["ingest", "files/inventory.xlsx", "--out", "rows.json"],
    );
    assert!(ok, "ingest failed: {}", stderr);
    assert!(stdout.contains("entries added: 2"), "stdout: {}", stdout);

    let records = read_corpus(&root.join("rows.json"));
    assert_eq!(records[0]["id"], "inventory.xlsx#row1");
    assert_eq!(records[0]["text"], "Widget | 12");
    assert_eq!(records[0]["metadata"]["label"], "Widget");
    assert_eq!(records[1]["id"], "inventory.xlsx#row2");
    assert_eq!(records.len(), 2, "header row became an entry");
}

#[test]
fn csv_uploads_drop_header_and_unnamed_columns() {
    let (tmp, file_config) = setup_test_env("");
    let root = tmp.path();
    let tables = root.join("tables");
    fs::create_dir_all(&tables).unwrap();
    fs::write(
        tables.join("people.csv"),
        "Unnamed: 0,name,city\n0,Ada,London\n1,Grace,\"Arlington, VA\"\n",
    )
    .unwrap();

    let (stdout, stderr, ok) = run(root, &file_config, &["ingest", "tables", "--out", "file.json"]);
    assert!(ok, "ingest failed: {}", stderr);
    assert!(stdout.contains("entries added: 1"), "stdout: {}", stdout);
    let records = read_corpus(&root.join("file.json"));
    assert_eq!(records[0]["id"], "people.csv");
    assert_eq!(records[0]["text"], "Ada | London\nGrace | Arlington, VA");

    let rows_config = root.join("config").join("rows.toml");
    fs::write(&rows_config, "[corpus]\nspreadsheet_mode = \"rows\"\n").unwrap();
    let (stdout, stderr, ok) = run(
        root,
        &rows_config,
        &["ingest", "tables/people.csv", "--out", "rows.json"],
    );
    assert!(ok, "ingest failed: {}", stderr);
    assert!(stdout.contains("entries added: 2"), "stdout: {}", stdout);
    let records = read_corpus(&root.join("rows.json"));
    assert_eq!(records[0]["id"], "people.csv#row1");
    assert_eq!(records[0]["text"], "Ada | London");
    assert_eq!(records[0]["metadata"]["label"], "Ada");
    assert_eq!(records[1]["id"], "people.csv#row2");
}

#[test]
fn search_finds_ingested_text_case_insensitively() {
    let (tmp, config) = setup_test_env("");
    let root = tmp.path();
    let (_, stderr, ok) = run(root, &config, &["ingest", "files", "--out", "corpus.json"]);
    assert!(ok, "ingest failed: {}", stderr);

    let (stdout, stderr, ok) = run(
        root,
        &config,
        &["search", "NORTHERN region", "--corpus", "corpus.json"],
    );
    assert!(ok, "search failed: {}", stderr);
    assert!(stdout.contains("1. report.docx"), "stdout: {}", stdout);
    assert!(stdout.contains("1 of 1 matching entries"));

    let (stdout, _, ok) = run(root, &config, &["search", "kubernetes", "--corpus", "corpus.json"]);
    assert!(ok);
    assert!(stdout.contains("No results."));
}

#[test]
fn ingest_merges_into_existing_corpus() {
    let (tmp, config) = setup_test_env("");
    let root = tmp.path();
    let (_, stderr, ok) = run(
        root,
        &config,
        &["ingest", "files/notes.txt", "--out", "corpus.json"],
    );
    assert!(ok, "first ingest failed: {}", stderr);

    let (stdout, stderr, ok) = run(
        root,
        &config,
        &[
            "ingest",
            "files/report.docx",
            "--corpus",
            "corpus.json",
            "--out",
            "corpus.json",
        ],
    );
    assert!(ok, "second ingest failed: {}", stderr);
    assert!(stdout.contains("corpus entries: 2"), "stdout: {}", stdout);
    assert_eq!(read_corpus(&root.join("corpus.json")).len(), 2);
}

#[test]
fn export_prints_flat_records() {
    let (tmp, config) = setup_test_env("");
    let root = tmp.path();
    let (_, stderr, ok) = run(root, &config, &["ingest", "files", "--out", "corpus.json"]);
    assert!(ok, "ingest failed: {}", stderr);

    let (stdout, stderr, ok) = run(root, &config, &["export", "--corpus", "corpus.json"]);
    assert!(ok, "export failed: {}", stderr);
    let records: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(records.len(), 3);
    for r in &records {
        assert!(r["id"].is_string());
        assert!(r["text"].is_string());
        assert!(r["metadata"].is_object());
    }

    let (_, stderr, ok) = run(
        root,
        &config,
        &["export", "--corpus", "corpus.json", "--out", "flat.json"],
    );
    assert!(ok, "export to file failed: {}", stderr);
    let written = fs::read_to_string(root.join("flat.json")).unwrap();
    assert_eq!(stdout.trim_end(), written);
}

#[test]
fn ask_without_api_key_fails_before_crawling() {
    let config = "[crawl]\nseeds = [\"http://127.0.0.1:9/docs/\"]\nscope_prefix = \"http://127.0.0.1:9/docs/\"\n";
    let (tmp, config) = setup_test_env(config);
    let root = tmp.path();

    let (stdout, stderr, ok) = run(root, &config, &["ask", "What changed?", "--crawl"]);
    assert!(!ok, "ask should fail without a key");
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {}", stderr);
    assert!(!stderr.contains("crawl finished"), "stderr: {}", stderr);
    assert!(stdout.is_empty(), "stdout: {}", stdout);
}

#[test]
fn ask_with_empty_corpus_is_refused() {
    let (tmp, config) = setup_test_env("");
    let root = tmp.path();

    let (_, stderr, ok) = run_with_env(
        root,
        &config,
        &["ask", "Anything?", "--corpus", "missing.json"],
        &[("OPENAI_API_KEY", "sk-test")],
    );
    assert!(!ok);
    assert!(stderr.contains("corpus is empty"), "stderr: {}", stderr);
}

#[test]
fn crawl_without_crawl_section_is_an_error() {
    let (tmp, config) = setup_test_env("");
    let root = tmp.path();

    let (_, stderr, ok) = run(root, &config, &["crawl"]);
    assert!(!ok);
    assert!(stderr.contains("Crawling is not configured"), "stderr: {}", stderr);
}

#[test]
fn invalid_config_is_rejected() {
    let (tmp, config) = setup_test_env("[llm]\ntemperature = 0.9\n");
    let root = tmp.path();

    let (_, stderr, ok) = run(root, &config, &["search", "anything"]);
    assert!(!ok);
    assert!(stderr.contains("temperature"), "stderr: {}", stderr);
}

#[test]
fn completions_need_no_config() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (stdout, stderr, ok) = run(tmp.path(), &missing, &["completions", "bash"]);
    assert!(ok, "completions failed: {}", stderr);
    assert!(stdout.contains("site-chat"));
}
