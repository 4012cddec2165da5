//! Package coordinates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Package type used when a coordinate does not name one.
pub const DEFAULT_PACKAGE_TYPE: &str = "jar";

const SNAPSHOT: &str = "SNAPSHOT";

/// Identity of an extension package.
///
/// Equality covers every field, properties included. Use
/// [`equals_ignoring_properties`](Self::equals_ignoring_properties) when
/// comparing a declared coordinate with one read back from a package or a
/// resolver, which may carry extra provenance properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionCoordinate {
    pub group: String,
    pub name: String,
    pub version: String,
    pub classifier: Option<String>,
    pub package_type: String,
    pub properties: BTreeMap<String, String>,
}

impl ExtensionCoordinate {
    /// Create a coordinate with the default package type and no classifier.
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
            classifier: None,
            package_type: DEFAULT_PACKAGE_TYPE.to_string(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_package_type(mut self, package_type: impl Into<String>) -> Self {
        self.package_type = package_type.into();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Compare every field except the properties.
    pub fn equals_ignoring_properties(&self, other: &ExtensionCoordinate) -> bool {
        self.group == other.group
            && self.name == other.name
            && self.version == other.version
            && self.classifier == other.classifier
            && self.package_type == other.package_type
    }

    /// Whether this coordinate names a snapshot, timestamped or not.
    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with(SNAPSHOT) || timestamp_prefix(&self.version).is_some()
    }

    /// Version with a snapshot timestamp folded back to `-SNAPSHOT`.
    ///
    /// `1.0-20240101.120000-3` becomes `1.0-SNAPSHOT`; every other version is
    /// returned unchanged.
    pub fn base_version(&self) -> String {
        match timestamp_prefix(&self.version) {
            Some(prefix) => format!("{}{}", prefix, SNAPSHOT),
            None => self.version.clone(),
        }
    }

    /// File name stem packages are expected to end with in the extensions
    /// directory: `{group}_{name}_{version}[_{classifier}]`.
    pub fn file_name_stem(&self) -> String {
        let mut stem = format!("{}_{}_{}", self.group, self.name, self.version);
        if let Some(classifier) = &self.classifier {
            stem.push('_');
            stem.push_str(classifier);
        }
        stem
    }

    /// Path of this package inside a Maven 2 layout repository.
    pub fn repository_path(&self) -> String {
        let mut path = format!(
            "{}/{}/{}/{}-{}",
            self.group.replace('.', "/"),
            self.name,
            self.base_version(),
            self.name,
            self.version
        );
        if let Some(classifier) = &self.classifier {
            path.push('-');
            path.push_str(classifier);
        }
        path.push('.');
        path.push_str(&self.package_type);
        path
    }
}

/// Returns the part before `yyyyMMdd.HHmmss-N` when `version` is a
/// timestamped snapshot. The prefix is empty or ends with `-`.
fn timestamp_prefix(version: &str) -> Option<&str> {
    let (rest, build) = version.rsplit_once('-')?;
    if build.is_empty() || !build.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // yyyyMMdd.HHmmss
    const STAMP_LEN: usize = 15;
    if rest.len() < STAMP_LEN || !rest.is_char_boundary(rest.len() - STAMP_LEN) {
        return None;
    }
    let (prefix, stamp) = rest.split_at(rest.len() - STAMP_LEN);
    let stamp_ok = stamp.bytes().enumerate().all(|(i, b)| {
        if i == 8 {
            b == b'.'
        } else {
            b.is_ascii_digit()
        }
    });
    if !stamp_ok || !(prefix.is_empty() || prefix.ends_with('-')) {
        return None;
    }
    Some(prefix)
}

impl fmt::Display for ExtensionCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.package_type)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        write!(f, ":{}", self.version)
    }
}

/// Error returned when a coordinate string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid coordinate '{input}': {reason}")]
pub struct CoordinateParseError {
    pub input: String,
    pub reason: String,
}

impl CoordinateParseError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl FromStr for ExtensionCoordinate {
    type Err = CoordinateParseError;

    /// Parse `group:name[:type[:classifier]]:version`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if let Some(idx) = parts.iter().position(|p| p.trim().is_empty()) {
            return Err(CoordinateParseError::new(
                s,
                format!("segment {} is empty", idx + 1),
            ));
        }
        let parts: Vec<&str> = parts.into_iter().map(str::trim).collect();

        let coordinate = match parts.as_slice() {
            [group, name, version] => ExtensionCoordinate::new(*group, *name, *version),
            [group, name, package_type, version] => {
                ExtensionCoordinate::new(*group, *name, *version).with_package_type(*package_type)
            }
            [group, name, package_type, classifier, version] => {
                ExtensionCoordinate::new(*group, *name, *version)
                    .with_package_type(*package_type)
                    .with_classifier(*classifier)
            }
            _ => {
                return Err(CoordinateParseError::new(
                    s,
                    "expected group:name[:type[:classifier]]:version",
                ))
            }
        };
        Ok(coordinate)
    }
}

impl Serialize for ExtensionCoordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExtensionCoordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_form() {
        let coord: ExtensionCoordinate = "org.example:hello:1.0.0".parse().unwrap();
        assert_eq!(coord.group, "org.example");
        assert_eq!(coord.name, "hello");
        assert_eq!(coord.version, "1.0.0");
        assert_eq!(coord.package_type, "jar");
        assert!(coord.classifier.is_none());
    }

    #[test]
    fn test_parse_full_form_and_display() {
        let coord: ExtensionCoordinate = "org.example:hello:zip:linux:1.0.0".parse().unwrap();
        assert_eq!(coord.package_type, "zip");
        assert_eq!(coord.classifier.as_deref(), Some("linux"));
        assert_eq!(coord.to_string(), "org.example:hello:zip:linux:1.0.0");

        let short: ExtensionCoordinate = "org.example:hello:1.0.0".parse().unwrap();
        assert_eq!(short.to_string(), "org.example:hello:jar:1.0.0");
    }

    #[test]
    fn test_parse_errors() {
        assert!("hello".parse::<ExtensionCoordinate>().is_err());
        assert!("a:b:c:d:e:f".parse::<ExtensionCoordinate>().is_err());
        let err = "org.example::1.0".parse::<ExtensionCoordinate>().unwrap_err();
        assert_eq!(err.reason, "segment 2 is empty");
    }

    #[test]
    fn test_equality_includes_properties() {
        let a = ExtensionCoordinate::new("org.example", "hello", "1.0");
        let b = a.clone().with_property("repository", "central");
        assert_ne!(a, b);
        assert!(a.equals_ignoring_properties(&b));
    }

    #[test]
    fn test_snapshot_and_release_are_distinct() {
        let release = ExtensionCoordinate::new("org.example", "hello", "1.0");
        let snapshot = ExtensionCoordinate::new("org.example", "hello", "1.0-SNAPSHOT");
        assert_ne!(release, snapshot);
        assert!(!release.equals_ignoring_properties(&snapshot));
        assert!(snapshot.is_snapshot());
        assert!(!release.is_snapshot());
    }

    #[test]
    fn test_timestamped_snapshot_base_version() {
        let coord = ExtensionCoordinate::new("org.example", "hello", "1.0-20240101.120000-3");
        assert!(coord.is_snapshot());
        assert_eq!(coord.base_version(), "1.0-SNAPSHOT");

        let plain = ExtensionCoordinate::new("org.example", "hello", "1.0-3");
        assert_eq!(plain.base_version(), "1.0-3");
        assert!(!plain.is_snapshot());
    }

    #[test]
    fn test_file_name_stem() {
        let coord = ExtensionCoordinate::new("org.example", "hello", "1.0");
        assert_eq!(coord.file_name_stem(), "org.example_hello_1.0");
        let coord = coord.with_classifier("linux");
        assert_eq!(coord.file_name_stem(), "org.example_hello_1.0_linux");
    }

    #[test]
    fn test_repository_path() {
        let coord = ExtensionCoordinate::new("org.example.bots", "hello", "1.0-20240101.120000-3")
            .with_classifier("linux");
        assert_eq!(
            coord.repository_path(),
            "org/example/bots/hello/1.0-SNAPSHOT/hello-1.0-20240101.120000-3-linux.jar"
        );
    }

    #[test]
    fn test_serde_as_string() {
        let coord = ExtensionCoordinate::new("org.example", "hello", "1.0");
        let json = serde_json::to_string(&coord).unwrap();
        assert_eq!(json, "\"org.example:hello:jar:1.0\"");
        let back: ExtensionCoordinate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, coord);
        assert!(serde_json::from_str::<ExtensionCoordinate>("\"nope\"").is_err());
    }
}
