use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::error::BundleError;

pub const REQUESTS_FILE: &str = "requests.json";
pub const RESPONSES_FILE: &str = "responses.json";
pub const CONSOLE_FILE: &str = "console.json";
pub const JS_CALLS_FILE: &str = "js_calls.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(rename = "postData", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub level: String,
    pub message: String,
}

/// One intercepted call to an instrumented page entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsCall {
    #[serde(rename = "fn")]
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Everything captured for one target.
///
/// A bundle is assembled in memory by its session and written exactly once
/// by [`ArtifactBundle::seal`], which consumes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactBundle {
    pub requests: Vec<RequestRecord>,
    pub responses: Vec<ResponseRecord>,
    pub console_entries: Vec<ConsoleEntry>,
    pub js_calls: Vec<JsCall>,
}

/// Per-list entry counts of a sealed bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BundleCounts {
    pub requests: usize,
    pub responses: usize,
    pub console_entries: usize,
    pub js_calls: usize,
}

/// A bundle that has been durably written under its final name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBundle {
    pub dir: PathBuf,
    pub counts: BundleCounts,
}

impl ArtifactBundle {
    pub fn counts(&self) -> BundleCounts {
        BundleCounts {
            requests: self.requests.len(),
            responses: self.responses.len(),
            console_entries: self.console_entries.len(),
            js_calls: self.js_calls.len(),
        }
    }

    /// Write the four lists to `root/dir_name`.
    ///
    /// Files are written into a hidden staging directory and renamed into
    /// place, so the final directory either holds a complete bundle or does
    /// not exist. An older bundle with the same name is replaced.
    pub fn seal(self, root: &Path, dir_name: &str) -> Result<SealedBundle, BundleError> {
        fs::create_dir_all(root).map_err(|e| BundleError::io(root, e))?;

        let final_dir = root.join(dir_name);
        let staging = root.join(format!(".{dir_name}.partial-{}", Uuid::new_v4().simple()));
        fs::create_dir(&staging).map_err(|e| BundleError::io(&staging, e))?;

        let counts = self.counts();
        let result = self
            .write_files(&staging)
            .and_then(|()| replace_dir(&staging, &final_dir));
        if result.is_err() {
            let _ = fs::remove_dir_all(&staging);
        }
        result?;

        Ok(SealedBundle {
            dir: final_dir,
            counts,
        })
    }

    fn write_files(&self, dir: &Path) -> Result<(), BundleError> {
        write_json(dir, REQUESTS_FILE, &self.requests)?;
        write_json(dir, RESPONSES_FILE, &self.responses)?;
        write_json(dir, CONSOLE_FILE, &self.console_entries)?;
        write_json(dir, JS_CALLS_FILE, &self.js_calls)
    }

    /// Read a sealed bundle back from disk.
    pub fn read_from(dir: &Path) -> Result<Self, BundleError> {
        Ok(Self {
            requests: read_json(dir, REQUESTS_FILE)?,
            responses: read_json(dir, RESPONSES_FILE)?,
            console_entries: read_json(dir, CONSOLE_FILE)?,
            js_calls: read_json(dir, JS_CALLS_FILE)?,
        })
    }
}

/// Move `staging` to `final_dir`. A previous bundle is renamed aside first
/// and only deleted once the new one is in place; it is restored if the
/// swap fails.
fn replace_dir(staging: &Path, final_dir: &Path) -> Result<(), BundleError> {
    if !final_dir.exists() {
        return fs::rename(staging, final_dir).map_err(|e| BundleError::io(final_dir, e));
    }

    let retired = final_dir.with_file_name(format!(
        ".{}.old-{}",
        final_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Uuid::new_v4().simple()
    ));
    fs::rename(final_dir, &retired).map_err(|e| BundleError::io(final_dir, e))?;

    if let Err(e) = fs::rename(staging, final_dir) {
        if let Err(restore) = fs::rename(&retired, final_dir) {
            warn!(
                target: "crawl.bundle",
                dir = %retired.display(),
                error = %restore,
                "could not restore previous bundle"
            );
        }
        return Err(BundleError::io(final_dir, e));
    }

    if let Err(e) = fs::remove_dir_all(&retired) {
        warn!(
            target: "crawl.bundle",
            dir = %retired.display(),
            error = %e,
            "could not remove previous bundle"
        );
    }
    Ok(())
}

fn write_json<T: Serialize>(dir: &Path, file: &'static str, value: &T) -> Result<(), BundleError> {
    let mut bytes =
        serde_json::to_vec_pretty(value).map_err(|source| BundleError::Encode { file, source })?;
    bytes.push(b'\n');

    let path = dir.join(file);
    let mut out = File::create(&path).map_err(|e| BundleError::io(&path, e))?;
    out.write_all(&bytes).map_err(|e| BundleError::io(&path, e))?;
    out.sync_all().map_err(|e| BundleError::io(&path, e))
}

fn read_json<T: DeserializeOwned>(dir: &Path, file: &'static str) -> Result<T, BundleError> {
    let path = dir.join(file);
    let bytes = fs::read(&path).map_err(|e| BundleError::io(&path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| BundleError::Encode { file, source })
}
