//! Log-archive handling: entry extraction and token recovery.
//!
//! A finished login run exposes its logs as a zip bundle with one text file
//! per job step, named `{job}/{step_number}_{step_name}.txt`. The remote
//! workflow prints a single `{"token":"<base64>"}` fragment into its result
//! step; recovery is a pattern scan over the raw text because the log
//! format carries no structured contract.

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use base64::prelude::*;
use regex::Regex;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::AuthError;

/// Default archive entry holding the login result step output.
pub const RESULT_LOG_ENTRY: &str = "login/3_Result.txt";

// First match wins; the workflow emits exactly one fragment.
static TOKEN_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{"token":"[A-Za-z0-9+/=]*"\}"#).expect("invalid token pattern")
});

/// Extract the text of the archive entry whose name exactly matches
/// `entry_name`.
pub fn entry_text(archive: &[u8], entry_name: &str) -> Result<String, AuthError> {
    let mut zip =
        ZipArchive::new(Cursor::new(archive)).map_err(|e| AuthError::LogArchive(e.to_string()))?;
    let mut file = match zip.by_name(entry_name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => {
            return Err(AuthError::LogFileNotFound {
                entry: entry_name.to_string(),
            });
        }
        Err(e) => return Err(AuthError::LogArchive(e.to_string())),
    };
    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|e| AuthError::LogArchive(e.to_string()))?;
    Ok(text)
}

/// Scan log text for the first `{"token":"<base64>"}` fragment and decode it.
///
/// Returns `None` when no fragment matches or the fragment does not decode
/// to UTF-8; the caller decides whether that is fatal.
pub fn extract_token(log_text: &str) -> Option<String> {
    let fragment = TOKEN_FRAGMENT.find(log_text)?.as_str();
    let parsed: TokenFragment = serde_json::from_str(fragment).ok()?;
    let bytes = BASE64_STANDARD.decode(parsed.token).ok()?;
    String::from_utf8(bytes).ok()
}

#[derive(serde::Deserialize)]
struct TokenFragment {
    token: String,
}
