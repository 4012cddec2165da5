//! Finder reading the coordinate a package declares about itself.
//!
//! Maven packaging embeds `META-INF/maven/{group}/{name}/pom.xml` and
//! `pom.properties` in every artifact. The first of those files found in a
//! package decides which coordinate the package claims to be.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::extension::coordinate::{ExtensionCoordinate, DEFAULT_PACKAGE_TYPE};
use crate::extension::finder::PackageFinder;
use crate::extension::package::ResolvedPackage;
use crate::extension::{is_package_archive, ExtensionError, Result};

const MAVEN_META_ROOT: &str = "META-INF/maven";
const POM_XML: &str = "pom.xml";
const POM_PROPERTIES: &str = "pom.properties";

/// Finds packages whose embedded Maven metadata names the coordinate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageMetadataFinder;

impl PackageMetadataFinder {
    pub const NAME: &'static str = "package-metadata";
}

impl PackageFinder for PackageMetadataFinder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn find(
        &self,
        coordinate: &ExtensionCoordinate,
        search_path: &Path,
    ) -> Result<Vec<ResolvedPackage>> {
        let entries = match fs::read_dir(search_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();

        let mut packages = Vec::new();
        for path in paths {
            let declared = match read_declared_coordinate(&path) {
                Ok(Some(declared)) => declared,
                Ok(None) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable extension package");
                    continue;
                }
            };
            if coordinate.equals_ignoring_properties(&declared) {
                packages.push(ResolvedPackage::local(coordinate.clone(), path, Self::NAME));
            } else {
                debug!(path = %path.display(), declared = %declared, "Package declares another coordinate");
            }
        }
        Ok(packages)
    }
}

/// Read the coordinate a package declares in its Maven metadata.
///
/// Returns `Ok(None)` for files that are not packages and for packages that
/// carry no usable metadata.
pub fn read_declared_coordinate(path: &Path) -> Result<Option<ExtensionCoordinate>> {
    if path.is_dir() {
        read_from_directory(path)
    } else if path.is_file() && is_package_archive(path) {
        read_from_archive(path)
    } else {
        Ok(None)
    }
}

fn read_from_archive(path: &Path) -> Result<Option<ExtensionCoordinate>> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if !name.starts_with(MAVEN_META_ROOT) {
            continue;
        }
        let is_xml = name.ends_with(POM_XML);
        if !is_xml && !name.ends_with(POM_PROPERTIES) {
            continue;
        }

        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        return if is_xml {
            parse_pom_xml(&content).map_err(|reason| invalid(path, reason))
        } else {
            Ok(parse_pom_properties(&content))
        };
    }
    Ok(None)
}

fn read_from_directory(dir: &Path) -> Result<Option<ExtensionCoordinate>> {
    let meta_root = dir.join(MAVEN_META_ROOT);
    if !meta_root.is_dir() {
        return Ok(None);
    }

    let mut candidates = Vec::new();
    collect_metadata_files(&meta_root, &mut candidates)?;
    candidates.sort();

    let Some(meta_file) = candidates.first() else {
        return Ok(None);
    };
    let content = fs::read_to_string(meta_file)?;
    if meta_file.file_name().and_then(|n| n.to_str()) == Some(POM_XML) {
        parse_pom_xml(&content).map_err(|reason| invalid(meta_file, reason))
    } else {
        Ok(parse_pom_properties(&content))
    }
}

fn collect_metadata_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_metadata_files(&path, out)?;
        } else if matches!(
            path.file_name().and_then(|n| n.to_str()),
            Some(POM_XML) | Some(POM_PROPERTIES)
        ) {
            out.push(path);
        }
    }
    Ok(())
}

fn invalid(path: &Path, reason: String) -> ExtensionError {
    ExtensionError::InvalidPackage {
        path: path.display().to_string(),
        reason,
    }
}

/// Parse `project/{groupId,artifactId,version,packaging}`, falling back to
/// the parent's group and version.
fn parse_pom_xml(content: &str) -> std::result::Result<Option<ExtensionCoordinate>, String> {
    let doc = roxmltree::Document::parse(content).map_err(|e| e.to_string())?;
    let project = doc.root_element();
    if project.tag_name().name() != "project" {
        return Ok(None);
    }
    let parent = child_element(project, "parent");

    let Some(name) = child_text(project, "artifactId") else {
        return Ok(None);
    };
    let Some(group) = child_text(project, "groupId").or_else(|| parent.and_then(|p| child_text(p, "groupId")))
    else {
        return Ok(None);
    };
    let Some(version) = child_text(project, "version").or_else(|| parent.and_then(|p| child_text(p, "version")))
    else {
        return Ok(None);
    };
    let packaging = child_text(project, "packaging").unwrap_or_else(|| DEFAULT_PACKAGE_TYPE.to_string());

    Ok(Some(
        ExtensionCoordinate::new(group, name, version).with_package_type(packaging),
    ))
}

fn child_element<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

pub(crate) fn child_text(node: roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    child_element(node, name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Parse a `pom.properties` file; `groupId`, `artifactId` and `version` must
/// all be present and non-blank.
fn parse_pom_properties(content: &str) -> Option<ExtensionCoordinate> {
    let props = parse_properties(content);
    let get = |key: &str| {
        props
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    };
    Some(ExtensionCoordinate::new(
        get("groupId")?,
        get("artifactId")?,
        get("version")?,
    ))
}

/// Minimal `.properties` reader: `key=value`, `key: value` or `key value`
/// lines, `#` and `!` comments.
fn parse_properties(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim_start)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('!'))
        .map(|line| {
            let split = line
                .find(|c: char| c == '=' || c == ':' || c.is_whitespace())
                .unwrap_or(line.len());
            let key = line[..split].trim_end();
            let rest = line[split..].trim_start();
            let value = rest
                .strip_prefix('=')
                .or_else(|| rest.strip_prefix(':'))
                .unwrap_or(rest)
                .trim_start();
            (key.to_string(), value.trim_end().to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <parent>
    <groupId>org.example</groupId>
    <artifactId>bots-parent</artifactId>
    <version>2.1.0</version>
  </parent>
  <artifactId>hello</artifactId>
  <packaging>zip</packaging>
</project>"#;

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_pom_xml_parent_fallback() {
        let coord = parse_pom_xml(POM).unwrap().unwrap();
        assert_eq!(coord.group, "org.example");
        assert_eq!(coord.name, "hello");
        assert_eq!(coord.version, "2.1.0");
        assert_eq!(coord.package_type, "zip");
    }

    #[test]
    fn test_pom_xml_without_version() {
        let pom = "<project><groupId>g</groupId><artifactId>a</artifactId></project>";
        assert!(parse_pom_xml(pom).unwrap().is_none());
        assert!(parse_pom_xml("<project>").is_err());
    }

    #[test]
    fn test_pom_properties() {
        let props = "#Generated by Maven\ngroupId=org.example\nartifactId: hello\nversion 1.0.0\n";
        let coord = parse_pom_properties(props).unwrap();
        assert_eq!(coord, ExtensionCoordinate::new("org.example", "hello", "1.0.0"));

        assert!(parse_pom_properties("groupId=org.example\nartifactId=hello\nversion=  \n").is_none());
    }

    #[test]
    fn test_finds_archive_by_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(
            &dir.path().join("renamed.jar"),
            &[
                ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"),
                (
                    "META-INF/maven/org.example/hello/pom.properties",
                    "groupId=org.example\nartifactId=hello\nversion=1.0.0\n",
                ),
            ],
        );
        write_archive(
            &dir.path().join("other.jar"),
            &[(
                "META-INF/maven/org.example/other/pom.properties",
                "groupId=org.example\nartifactId=other\nversion=1.0.0\n",
            )],
        );

        let coordinate = ExtensionCoordinate::new("org.example", "hello", "1.0.0");
        let found = PackageMetadataFinder.find(&coordinate, dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].origin.ends_with("renamed.jar"));
    }

    #[test]
    fn test_finds_directory_by_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let meta = dir.path().join("hello-dir/META-INF/maven/org.example/hello");
        fs::create_dir_all(&meta).unwrap();
        fs::write(meta.join("pom.xml"), POM).unwrap();

        let coordinate = ExtensionCoordinate::new("org.example", "hello", "2.1.0").with_package_type("zip");
        let found = PackageMetadataFinder.find(&coordinate, dir.path()).unwrap();
        assert_eq!(found.len(), 1);

        let jar_coordinate = ExtensionCoordinate::new("org.example", "hello", "2.1.0");
        assert!(PackageMetadataFinder.find(&jar_coordinate, dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_archive_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.jar"), b"not a zip").unwrap();
        write_archive(
            &dir.path().join("good.jar"),
            &[(
                "META-INF/maven/org.example/hello/pom.properties",
                "groupId=org.example\nartifactId=hello\nversion=1.0.0\n",
            )],
        );

        let coordinate = ExtensionCoordinate::new("org.example", "hello", "1.0.0");
        let found = PackageMetadataFinder.find(&coordinate, dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(read_declared_coordinate(&dir.path().join("broken.jar")).is_err());
    }
}
