//! Named connection profiles
//!
//! Profiles are read from the `[broker]` table of a TOML file:
//!
//! ```toml
//! [broker.local]
//! address = "tcp://localhost:61616"
//! username = "admin"
//! password = "admin"
//! ```
//!
//! The table is flattened into dotted paths (`local.address`, ...) once at
//! load time; the catalog is read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use mqweb_types::{Error, Result};
use tracing::{debug, info, warn};

/// Table holding the profiles
const ROOT_TABLE: &str = "broker";

/// Broker address and credentials for one named connection
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub address: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Read-only lookup over the loaded profile tree
#[derive(Debug, Clone, Default)]
pub struct ConnectionCatalog {
    entries: BTreeMap<String, String>,
}

impl ConnectionCatalog {
    /// Catalog without any profiles
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a catalog from dotted paths, e.g. `("local.address", "tcp://...")`
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse a TOML document; a document without a `[broker]` table is empty
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let mut root: toml::Table = document
            .parse()
            .map_err(|e: toml::de::Error| Error::Config(e.message().to_string()))?;

        let mut entries = BTreeMap::new();
        match root.remove(ROOT_TABLE) {
            None => {}
            Some(toml::Value::Table(table)) => flatten("", &table, &mut entries),
            Some(_) => {
                return Err(Error::Config(format!("'{ROOT_TABLE}' must be a table")));
            }
        }

        Ok(Self { entries })
    }

    /// Load from a file; a missing file yields an empty catalog
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = match std::fs::read_to_string(path) {
            Ok(document) => document,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No configuration file found, loading an empty catalog");
                return Ok(Self::empty());
            }
            Err(e) => {
                return Err(Error::Config(format!("{}: {}", path.display(), e)));
            }
        };

        let catalog = Self::from_toml_str(&document)?;
        info!(
            path = %path.display(),
            connections = catalog.names().len(),
            "Loaded connection profiles"
        );
        Ok(catalog)
    }

    /// Resolve a profile by connection name
    pub fn lookup(&self, name: &str) -> Result<ConnectionProfile> {
        let field = |key: &str| self.entries.get(&format!("{name}.{key}")).cloned();

        match (field("address"), field("username"), field("password")) {
            (Some(address), Some(username), Some(password)) => {
                debug!(connection = %name, address = %address, "Resolved connection profile");
                Ok(ConnectionProfile {
                    address,
                    username,
                    password,
                })
            }
            (None, None, None) => Err(Error::ConnectionProfileNotFound(name.to_string())),
            _ => {
                warn!(connection = %name, "Connection profile is incomplete");
                Err(Error::ConnectionProfileNotFound(name.to_string()))
            }
        }
    }

    /// Distinct connection names in lexicographic order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .keys()
            .filter_map(|path| path.split('.').next())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

fn flatten(prefix: &str, table: &toml::Table, entries: &mut BTreeMap<String, String>) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            toml::Value::Table(nested) => flatten(&path, nested, entries),
            toml::Value::String(s) => {
                entries.insert(path, s.clone());
            }
            other => {
                entries.insert(path, other.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PROFILES: &str = r#"
[broker.local]
address = "tcp://localhost:61616"
username = "admin"
password = "admin"

[broker.staging]
address = "tcp://staging:61616"
username = "app"
password = "secret"
"#;

    #[test]
    fn test_names_are_top_level_segments() {
        let catalog = ConnectionCatalog::from_entries([("a.x", "1"), ("a.y", "2"), ("b.z", "3")]);
        assert_eq!(catalog.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_names_are_sorted_and_distinct() {
        let catalog = ConnectionCatalog::from_entries([
            ("zeta.address", "z"),
            ("alpha.address", "a"),
            ("alpha.username", "u"),
            ("alpha-2.address", "a2"),
        ]);
        assert_eq!(catalog.names(), vec!["alpha", "alpha-2", "zeta"]);
    }

    #[test]
    fn test_lookup_from_toml() {
        let catalog = ConnectionCatalog::from_toml_str(PROFILES).unwrap();

        let profile = catalog.lookup("staging").unwrap();
        assert_eq!(profile.address, "tcp://staging:61616");
        assert_eq!(profile.username, "app");
        assert_eq!(profile.password, "secret");
        assert_eq!(catalog.names(), vec!["local", "staging"]);
    }

    #[test]
    fn test_missing_profile() {
        let catalog = ConnectionCatalog::from_toml_str(PROFILES).unwrap();
        assert!(matches!(
            catalog.lookup("prod"),
            Err(Error::ConnectionProfileNotFound(name)) if name == "prod"
        ));
    }

    #[test]
    fn test_incomplete_profile_is_not_found() {
        let catalog = ConnectionCatalog::from_entries([("half.address", "tcp://x:61616")]);
        assert!(matches!(
            catalog.lookup("half"),
            Err(Error::ConnectionProfileNotFound(_))
        ));
    }

    #[test]
    fn test_document_without_broker_table_is_empty() {
        let catalog = ConnectionCatalog::from_toml_str("[other]\nkey = 1\n").unwrap();
        assert!(catalog.names().is_empty());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            ConnectionCatalog::from_toml_str("[broker.local\naddress ="),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ConnectionCatalog::from_toml_str("broker = 3"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ConnectionCatalog::load(dir.path().join("absent.toml")).unwrap();
        assert!(catalog.names().is_empty());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PROFILES.as_bytes()).unwrap();

        let catalog = ConnectionCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.lookup("local").unwrap().username, "admin");
    }

    #[test]
    fn test_profile_debug_hides_password() {
        let catalog = ConnectionCatalog::from_toml_str(PROFILES).unwrap();
        let rendered = format!("{:?}", catalog.lookup("staging").unwrap());
        assert!(!rendered.contains("secret"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeSet;

        fn key_path() -> impl Strategy<Value = String> {
            "[a-z0-9-]{1,8}(\\.[a-z0-9-]{1,8}){0,2}"
        }

        proptest! {
            #[test]
            fn names_are_sorted_distinct_top_level_segments(
                entries in prop::collection::btree_map(key_path(), "[a-z:/0-9]{0,12}", 0..24),
            ) {
                let expected: BTreeSet<String> = entries
                    .keys()
                    .map(|key| key.split('.').next().unwrap_or_default().to_string())
                    .collect();
                let catalog = ConnectionCatalog::from_entries(entries);

                let names = catalog.names();
                prop_assert!(names.windows(2).all(|pair| pair[0] < pair[1]));
                prop_assert_eq!(names, expected.into_iter().collect::<Vec<_>>());
            }

            #[test]
            fn complete_profile_is_found(
                name in "[a-z][a-z0-9-]{0,8}",
                address in "tcp://[a-z]{1,8}:[0-9]{2,5}",
                username in "[a-z]{1,8}",
                password in "[ -~]{0,12}",
            ) {
                let catalog = ConnectionCatalog::from_entries([
                    (format!("{name}.address"), address.clone()),
                    (format!("{name}.username"), username.clone()),
                    (format!("{name}.password"), password.clone()),
                ]);

                let profile = catalog.lookup(&name).unwrap();
                prop_assert_eq!(profile.address, address);
                prop_assert_eq!(profile.username, username);
                prop_assert_eq!(profile.password, password);
                prop_assert_eq!(catalog.names(), vec![name]);
            }
        }
    }
}
