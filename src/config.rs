use std::{env, path::PathBuf};

use crate::schema::SchemaCache;

pub const SCHEMA_DIR_VAR: &str = "MICRODATA_SCHEMA_DIR";
pub const BASE_URL_VAR: &str = "MICRODATA_BASE_URL";
const DEFAULT_SCHEMA_DIR: &str = "schemas";

/// Runtime settings taken from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding `pnad.yml` and `pof.yml`.
    pub schema_dir: PathBuf,
    /// Replaces the remote base declared by the schema documents.
    pub base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            schema_dir: non_empty(SCHEMA_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEMA_DIR)),
            base_url: non_empty(BASE_URL_VAR),
        }
    }

    pub fn schema_cache(&self) -> SchemaCache {
        SchemaCache::new(&self.schema_dir).with_base_url(self.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(|_| None);
        assert_eq!(cfg.schema_dir, PathBuf::from("schemas"));
        assert_eq!(cfg.base_url, None);
    }

    #[test]
    fn reads_overrides_and_ignores_blank_values() {
        let vars: HashMap<&str, &str> = [
            (SCHEMA_DIR_VAR, "/etc/microdata"),
            (BASE_URL_VAR, "  "),
        ]
        .into_iter()
        .collect();
        let cfg = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.schema_dir, PathBuf::from("/etc/microdata"));
        assert_eq!(cfg.base_url, None);
    }
}
