// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tempfile::TempDir;

/// Scratch directory used as cwd, HOME and XDG config dir of the binary,
/// so no real config file leaks into a test
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).expect("Failed to write test file");
        path
    }

    /// Write a tweet CSV with one JSON payload per text under column `value`
    pub fn tweets(&self, name: &str, texts: &[&str]) -> PathBuf {
        self.write(name, tweet_csv("value", texts).as_bytes())
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_tweetcount"));
        command
            .args(args)
            .current_dir(self.dir.path())
            .env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path())
            .env_remove("RUST_LOG");
        command
    }

    /// Start the binary without waiting for it, stdout and stderr piped
    pub fn spawn(&self, args: &[&str]) -> Child {
        self.command(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn tweetcount")
    }

    pub fn run(&self, args: &[&str]) -> (String, String, i32) {
        let output = self
            .command(args)
            .output()
            .expect("Failed to run tweetcount");

        (
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            output.status.code().unwrap_or(-1),
        )
    }
}

/// Build CSV text with an `id` column and a JSON tweet payload column
pub fn tweet_csv(column: &str, texts: &[&str]) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["id", column])
        .expect("Failed to write header");
    for (i, text) in texts.iter().enumerate() {
        let payload = serde_json::json!({
            "text": text,
            "id_str": format!("{}", 1000 + i),
            "source": "<a href=\"http://twitter.com\" rel=\"nofollow\">Twitter Web Client</a>",
        })
        .to_string();
        writer
            .write_record([i.to_string(), payload])
            .expect("Failed to write row");
    }
    String::from_utf8(writer.into_inner().expect("Failed to flush CSV")).expect("CSV is UTF-8")
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).expect("Failed to gzip");
    encoder.finish().expect("Failed to finish gzip")
}

/// Lines of stdout, trimmed of trailing whitespace
pub fn lines(stdout: &str) -> Vec<&str> {
    stdout.lines().map(str::trim_end).collect()
}

/// Texts for the mention scenario: @a twice, @b and @c once
pub const MENTION_TEXTS: &[&str] = &[
    "hi @a, how are you",
    "@a again",
    "thanks @b",
    "ping @c #rust",
];
