//! First-boot bootstrap payloads.
//!
//! The payload is opaque to the launcher; this module renders the default
//! script that turns on password-based SSH login and resolves operator
//! supplied overrides (inline text or a file path, never both).

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use shell_escape::unix::escape;
use thiserror::Error;

const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";
const SSHD_DROP_IN_DIR: &str = "/etc/ssh/sshd_config.d";
const SSHD_DROP_IN: &str = "/etc/ssh/sshd_config.d/00-skiff.conf";

/// Errors raised while building or resolving a bootstrap payload.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum BootstrapError {
    /// Raised when the administrative password is empty.
    #[error("login password must not be empty")]
    EmptyPassword,
    /// Raised when a login user name is not a plain system user name.
    #[error("invalid login user name `{0}`")]
    InvalidUser(String),
    /// Raised when both inline and file sources are provided.
    #[error("bootstrap script cannot be provided both inline and via file")]
    BothProvided,
    /// Raised when an inline payload is empty or only whitespace.
    #[error("bootstrap script must not be empty")]
    InlineEmpty,
    /// Raised when a file path is empty or only whitespace.
    #[error("bootstrap script file path must not be empty")]
    FilePathEmpty,
    /// Raised when a file resolves to empty or only whitespace.
    #[error("bootstrap script file must not be empty")]
    FileEmpty,
    /// Raised when reading the file source fails.
    #[error("failed to read bootstrap script file `{path}`: {message}")]
    FileRead {
        /// Path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// Script executed once by the instance's first-boot facility.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BootstrapScript(String);

impl BootstrapScript {
    /// Wraps an arbitrary payload.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::InlineEmpty`] when the payload is blank.
    pub fn new(text: impl Into<String>) -> Result<Self, BootstrapError> {
        let payload = text.into();
        validate_payload(&payload)?;
        Ok(Self(payload))
    }

    /// Renders a script that sets `password` for root and every user in
    /// `extra_users`, then enables root and password SSH login.
    ///
    /// The script is safe to run once without input: `sed` rewrites are
    /// idempotent and the drop-in file is overwritten, not appended.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] when the password is empty or a user name is
    /// not a plain system user name.
    pub fn password_login(password: &str, extra_users: &[String]) -> Result<Self, BootstrapError> {
        if password.is_empty() {
            return Err(BootstrapError::EmptyPassword);
        }
        if let Some(bad) = extra_users.iter().find(|user| !is_valid_user(user)) {
            return Err(BootstrapError::InvalidUser(bad.clone()));
        }

        let mut script = String::from("#!/bin/bash\n");
        for user in std::iter::once("root").chain(extra_users.iter().map(String::as_str)) {
            let entry = format!("{user}:{password}");
            script.push_str(&format!(
                "printf '%s\\n' {} | chpasswd\n",
                escape(entry.as_str().into())
            ));
        }
        for setting in ["PermitRootLogin", "PasswordAuthentication"] {
            script.push_str(&format!(
                "sed -i 's/^#\\?{setting}.*/{setting} yes/' {SSHD_CONFIG}\n"
            ));
        }
        script.push_str(&format!(
            "if [ -d {SSHD_DROP_IN_DIR} ]; then\n  printf 'PermitRootLogin yes\\nPasswordAuthentication yes\\n' > {SSHD_DROP_IN}\nfi\n"
        ));
        script.push_str("systemctl restart sshd || systemctl restart ssh\n");
        Ok(Self(script))
    }

    /// Script text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolves an operator supplied bootstrap payload from either an inline
/// value or a file.
///
/// Inline and file sources are mutually exclusive. Both values are trimmed for
/// emptiness checks, but the returned payload preserves the original content.
///
/// # Errors
///
/// Returns [`BootstrapError`] when the inputs are invalid or the file cannot
/// be read.
pub fn resolve_bootstrap_override(
    inline: Option<&str>,
    file: Option<&str>,
) -> Result<Option<BootstrapScript>, BootstrapError> {
    if inline.is_some() && file.is_some() {
        return Err(BootstrapError::BothProvided);
    }

    if let Some(payload) = inline {
        return BootstrapScript::new(payload).map(Some);
    }

    let Some(path) = file else {
        return Ok(None);
    };

    if path.trim().is_empty() {
        return Err(BootstrapError::FilePathEmpty);
    }

    let content = read_to_string_ambient(path).map_err(|message| BootstrapError::FileRead {
        path: path.to_owned(),
        message,
    })?;

    BootstrapScript::new(content)
        .map(Some)
        .map_err(|err| match err {
            BootstrapError::InlineEmpty => BootstrapError::FileEmpty,
            other => other,
        })
}

fn validate_payload(payload: &str) -> Result<(), BootstrapError> {
    if payload.trim().is_empty() {
        return Err(BootstrapError::InlineEmpty);
    }
    Ok(())
}

fn is_valid_user(user: &str) -> bool {
    let mut chars = user.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_lowercase() || first == '_')
        && chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-')
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);

    let (dir_path, file_path) = if path_buf.is_absolute() {
        let parent = path_buf
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path_buf}"))?;
        let file_name = path_buf
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path_buf)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}
