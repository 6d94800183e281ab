//! Read-only access to Git configuration (`meta.*` keys and friends).

use tracing::instrument;

/// A value read from Git configuration.
pub trait ConfigValue {
    /// Parse this value out of the raw configuration entry.
    fn from_config(config: &git2::Config, name: &str) -> eyre::Result<Option<Self>>
    where
        Self: Sized;
}

impl ConfigValue for String {
    fn from_config(config: &git2::Config, name: &str) -> eyre::Result<Option<Self>> {
        match config.get_string(name) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl ConfigValue for bool {
    fn from_config(config: &git2::Config, name: &str) -> eyre::Result<Option<Self>> {
        match config.get_bool(name) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl ConfigValue for i64 {
    fn from_config(config: &git2::Config, name: &str) -> eyre::Result<Option<Self>> {
        match config.get_i64(name) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Read-only configuration lookup.
pub trait ConfigRead {
    /// Look up a key, returning `None` if it's unset.
    fn get<V: ConfigValue>(&self, name: &str) -> eyre::Result<Option<V>>;

    /// Look up a key, falling back to a default if it's unset.
    fn get_or<V: ConfigValue>(&self, name: &str, default: V) -> eyre::Result<V> {
        Ok(self.get(name)?.unwrap_or(default))
    }

    /// Look up a key, lazily computing a default if it's unset.
    fn get_or_else<V: ConfigValue>(
        &self,
        name: &str,
        default: impl FnOnce() -> V,
    ) -> eyre::Result<V> {
        Ok(self.get(name)?.unwrap_or_else(default))
    }
}

/// Wrapper around `git2::Config` implementing [`ConfigRead`].
pub struct Config {
    inner: git2::Config,
}

impl From<git2::Config> for Config {
    fn from(inner: git2::Config) -> Self {
        Config { inner }
    }
}

impl ConfigRead for Config {
    #[instrument(skip(self))]
    fn get<V: ConfigValue>(&self, name: &str) -> eyre::Result<Option<V>> {
        V::from_config(&self.inner, name)
    }
}

impl ConfigRead for git2::Config {
    fn get<V: ConfigValue>(&self, name: &str) -> eyre::Result<Option<V>> {
        V::from_config(self, name)
    }
}
