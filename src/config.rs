use std::{
    collections::BTreeMap,
    env, fmt,
    fs::File,
    io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::debug;

/// The API root that project paths are resolved against, unless overridden.
pub const DEFAULT_KEEN_URL: &str = "https://api.keen.io/3.0/projects/";

/// An error encountered while loading or resolving project settings.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to load config file")]
    Io(#[from] io::Error),
    #[error("Invalid configuration")]
    Invalid(#[from] serde_yaml::Error),
    #[error("Profile '{0}' not found")]
    ProfileNotFound(String),
    #[error("No project id found")]
    NoProjectId,
    #[error("A properly formatted Keen URL is required ({url:?}): {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("An API {0} is required for this operation")]
    MissingKey(KeyKind),
    #[error("The {0} contains invalid characters")]
    InvalidKey(KeyKind),
}

/// The credential tiers a Keen project hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Grants read access to analyses.
    Read,
    /// Grants event writes.
    Write,
    /// Grants everything, including key and dataset administration.
    Master,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyKind::Read => "read key",
            KeyKind::Write => "write key",
            KeyKind::Master => "master key",
        })
    }
}

/// The settings for a single Keen project: where to find the API, which
/// project to address, and the keys used to authorize requests.
#[derive(Clone, PartialEq, Eq)]
pub struct ProjectSettings {
    /// The API root that project paths are resolved against.
    pub keen_url: String,
    /// The project id.
    pub project_id: String,
    /// The read key, if any.
    pub read_key: Option<String>,
    /// The write key, if any.
    pub write_key: Option<String>,
    /// The master key, if any.
    pub master_key: Option<String>,
}

impl fmt::Debug for ProjectSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(key: &Option<String>) -> Option<&'static str> {
            key.as_ref().map(|_| "********")
        }

        f.debug_struct("ProjectSettings")
            .field("keen_url", &self.keen_url)
            .field("project_id", &self.project_id)
            .field("read_key", &redact(&self.read_key))
            .field("write_key", &redact(&self.write_key))
            .field("master_key", &redact(&self.master_key))
            .finish()
    }
}

/// A profile stored in the config file.
#[derive(Debug, Default, Clone, Deserialize)]
struct ConfigProfile {
    keen_url: Option<String>,
    project_id: Option<String>,
    read_key: Option<String>,
    write_key: Option<String>,
    master_key: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct Config {
    profiles: BTreeMap<String, ConfigProfile>,
}

impl ProjectSettings {
    /// Settings for the given project against the default API root, with no
    /// keys set.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            keen_url: DEFAULT_KEEN_URL.to_owned(),
            project_id: project_id.into(),
            read_key: None,
            write_key: None,
            master_key: None,
        }
    }

    /// Override the API root.
    pub fn with_keen_url(self, keen_url: impl Into<String>) -> Self {
        Self {
            keen_url: keen_url.into(),
            ..self
        }
    }

    /// Set the read key.
    pub fn with_read_key(self, key: impl Into<String>) -> Self {
        Self {
            read_key: Some(key.into()),
            ..self
        }
    }

    /// Set the write key.
    pub fn with_write_key(self, key: impl Into<String>) -> Self {
        Self {
            write_key: Some(key.into()),
            ..self
        }
    }

    /// Set the master key.
    pub fn with_master_key(self, key: impl Into<String>) -> Self {
        Self {
            master_key: Some(key.into()),
            ..self
        }
    }

    /// Load the project settings from the Keen configuration file (usually
    /// ~/.config/keen.yaml) and the environment.
    ///
    /// If `KEEN_PROFILE` is set, that will be used to select the profile.
    /// Otherwise the profile `default` will be used.
    pub fn from_default_env() -> Result<Self, Error> {
        if let Ok(s) = env::var("KEEN_PROFILE") {
            Self::from_env(&s)
        } else {
            Self::from_env("default")
        }
    }

    /// Load the given profile from the Keen configuration file (usually
    /// ~/.config/keen.yaml). If no configuration file is present, then the
    /// settings will be loaded solely from the environment.
    ///
    /// The following environment variables override the corresponding values
    /// in the config file:
    ///
    /// | Environment Variable | Config Value |
    /// |----------------------|--------------|
    /// | `KEEN_SERVER_URL`    | `keen_url`   |
    /// | `KEEN_PROJECT_ID`    | `project_id` |
    /// | `KEEN_READ_KEY`      | `read_key`   |
    /// | `KEEN_WRITE_KEY`     | `write_key`  |
    /// | `KEEN_MASTER_KEY`    | `master_key` |
    pub fn from_env(name: &str) -> Result<Self, Error> {
        let overrides = ConfigProfile {
            keen_url: env::var("KEEN_SERVER_URL").ok(),
            project_id: env::var("KEEN_PROJECT_ID").ok(),
            read_key: env::var("KEEN_READ_KEY").ok(),
            write_key: env::var("KEEN_WRITE_KEY").ok(),
            master_key: env::var("KEEN_MASTER_KEY").ok(),
        };

        let profile = match find_config().and_then(|p| read_profile(&p, name)) {
            Ok(p) => p,
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no config file found");
                Default::default()
            }
            Err(Error::ProfileNotFound(_)) if overrides.project_id.is_some() => {
                debug!(profile = name, "profile not in config file, using environment");
                Default::default()
            }
            Err(e) => return Err(e),
        };

        Self::from_raw(overrides.or(profile))
    }

    /// Load the given profile (or 'default') from the given file, which must
    /// be a valid Keen configuration file. Does not read any environment
    /// variables.
    pub fn read(path: impl AsRef<Path>, name: Option<&str>) -> Result<Self, Error> {
        let profile = read_profile(path.as_ref(), name.unwrap_or("default"))?;
        Self::from_raw(profile)
    }

    /// Read all profiles from the given file, keyed by profile name.
    pub fn read_all(path: impl AsRef<Path>) -> Result<BTreeMap<String, Self>, Error> {
        let file = File::open(path.as_ref())?;
        let config: Config = serde_yaml::from_reader(file)?;

        config
            .profiles
            .into_iter()
            .map(|(name, raw)| Ok((name, Self::from_raw(raw)?)))
            .collect()
    }

    fn from_raw(raw: ConfigProfile) -> Result<Self, Error> {
        let ConfigProfile {
            keen_url,
            project_id,
            read_key,
            write_key,
            master_key,
        } = raw;

        let Some(project_id) = project_id.filter(|id| !id.trim().is_empty()) else {
            return Err(Error::NoProjectId);
        };

        Ok(Self {
            keen_url: keen_url.unwrap_or_else(|| DEFAULT_KEEN_URL.to_owned()),
            project_id,
            read_key,
            write_key,
            master_key,
        })
    }

    /// Parse and check the API root. It must be an absolute http(s) URL;
    /// the result always ends with a `/` so that relative paths resolve
    /// beneath it.
    pub fn base_url(&self) -> Result<url::Url, Error> {
        let invalid = |reason: String| Error::InvalidUrl {
            url: self.keen_url.clone(),
            reason,
        };

        if self.keen_url.trim().is_empty() {
            return Err(invalid("empty URL".to_owned()));
        }

        let mut url = url::Url::parse(self.keen_url.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }

        if url.cannot_be_a_base() || url.host().is_none() {
            return Err(invalid("not a base URL".to_owned()));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(url)
    }

    /// The project id, which must not be blank.
    pub fn require_project_id(&self) -> Result<&str, Error> {
        match self.project_id.trim() {
            "" => Err(Error::NoProjectId),
            _ => Ok(&self.project_id),
        }
    }

    /// The key of the given kind, if it is set and non-blank.
    pub fn key(&self, kind: KeyKind) -> Option<&str> {
        let key = match kind {
            KeyKind::Read => &self.read_key,
            KeyKind::Write => &self.write_key,
            KeyKind::Master => &self.master_key,
        };

        key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// The key of the given kind, or an error if the project has none. Every
    /// operation that needs a credential goes through this check before
    /// anything is sent.
    pub fn require_key(&self, kind: KeyKind) -> Result<&str, Error> {
        let key = self.key(kind).ok_or(Error::MissingKey(kind))?;
        if !key.is_ascii() || key.chars().any(|c| c.is_ascii_control()) {
            return Err(Error::InvalidKey(kind));
        }

        Ok(key)
    }
}

impl ConfigProfile {
    /// Fill in any unset values from `other`.
    fn or(self, other: ConfigProfile) -> ConfigProfile {
        ConfigProfile {
            keen_url: self.keen_url.or(other.keen_url),
            project_id: self.project_id.or(other.project_id),
            read_key: self.read_key.or(other.read_key),
            write_key: self.write_key.or(other.write_key),
            master_key: self.master_key.or(other.master_key),
        }
    }
}

fn find_config() -> Result<PathBuf, Error> {
    let Some(home) = env::home_dir() else {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            "No $HOME found for the current user",
        )));
    };

    let canonical = home.join(".config/keen.yaml");
    if canonical.exists() {
        return Ok(canonical);
    }

    for fallback in [".config/keen.yml", ".keen/config.yaml", ".keen/config.yml"] {
        let path = home.join(fallback);
        if path.exists() {
            return Ok(path);
        }
    }

    Ok(canonical)
}

fn read_profile(p: &Path, name: &str) -> Result<ConfigProfile, Error> {
    let file = File::open(p)?;
    let mut config: Config = serde_yaml::from_reader(file).map_err(Error::Invalid)?;
    let Some(config_profile) = config.profiles.remove(name) else {
        return Err(Error::ProfileNotFound(name.to_string()));
    };

    debug!(path = %p.display(), profile = name, "loaded config file");

    Ok(config_profile)
}
