//! Credential providers.
//!
//! Credentials are plain values handed to a storage client when it is built.
//! Nothing here reads or writes process environment variables.

use crate::error::{LakeError, Result};
use crate::io::cloud::traits::{CloudCredentials, CloudIOError, CloudResult, ErrorKind};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

const ACCESS_KEY_ID: &str = "aws_access_key_id";
const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";

/// An access key pair given directly.
#[derive(Clone)]
pub struct StaticCredentials {
    access_key_id: String,
    secret_access_key: String,
}

impl StaticCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl CloudCredentials for StaticCredentials {
    fn identifier(&self) -> &str {
        &self.access_key_id
    }

    fn credential_type(&self) -> &str {
        "access_key"
    }

    fn validate(&self) -> CloudResult<()> {
        if self.access_key_id.is_empty() {
            return Err(CloudIOError::new(ErrorKind::Authentication, "Empty access key id"));
        }
        if self.secret_access_key.is_empty() {
            return Err(CloudIOError::new(ErrorKind::Authentication, "Empty secret access key"));
        }
        Ok(())
    }
}

/// One named profile loaded from an INI-style credentials file
/// (the `~/.aws/credentials` layout).
#[derive(Clone)]
pub struct ProfileCredentials {
    profile: String,
    settings: HashMap<String, String>,
}

impl ProfileCredentials {
    /// Load `profile` from the credentials file at `path`.
    ///
    /// # Errors
    /// [`LakeError::Storage`] if the file cannot be read, [`LakeError::Config`]
    /// if the profile is missing.
    pub fn from_file(path: impl AsRef<Path>, profile: &str) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| LakeError::storage("load credentials", path.display().to_string(), e))?;
        Self::parse(&text, profile).ok_or_else(|| LakeError::Config {
            op: "load credentials",
            message: format!("profile `{profile}` not found in {}", path.display()),
        })
    }

    /// Extract `profile` from credentials-file text.
    #[must_use]
    pub fn parse(text: &str, profile: &str) -> Option<Self> {
        let mut current: Option<&str> = None;
        let mut found = false;
        let mut settings = HashMap::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = Some(section.trim());
                found |= current == Some(profile);
                continue;
            }
            if current != Some(profile) {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                settings.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }
        found.then(|| Self {
            profile: profile.to_string(),
            settings,
        })
    }

    #[must_use]
    pub fn profile(&self) -> &str {
        &self.profile
    }
}

impl fmt::Debug for ProfileCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileCredentials")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl CloudCredentials for ProfileCredentials {
    fn identifier(&self) -> &str {
        self.settings
            .get(ACCESS_KEY_ID)
            .map_or(self.profile.as_str(), String::as_str)
    }

    fn credential_type(&self) -> &str {
        "profile"
    }

    fn validate(&self) -> CloudResult<()> {
        match [ACCESS_KEY_ID, SECRET_ACCESS_KEY]
            .into_iter()
            .find(|key| self.settings.get(*key).is_none_or(String::is_empty))
        {
            Some(missing) => Err(CloudIOError::new(
                ErrorKind::Authentication,
                format!("profile `{}` has no {missing}", self.profile),
            )),
            None => Ok(()),
        }
    }
}
