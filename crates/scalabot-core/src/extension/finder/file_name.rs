//! Finder matching packages by file name.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::extension::coordinate::ExtensionCoordinate;
use crate::extension::finder::PackageFinder;
use crate::extension::package::ResolvedPackage;
use crate::extension::{is_package_archive, Result};

/// Finds packages whose name ends with `{group}_{name}_{version}`.
///
/// `(Example) org.example_hello_1.0.0.jar` matches `org.example:hello:1.0.0`.
/// Files must be package archives (`.jar`, `.zip`) and are compared
/// without their extension; directories are compared on their full name.
/// Packages found this way carry all of their dependencies themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileNameFinder;

impl FileNameFinder {
    pub const NAME: &'static str = "file-name";
}

impl PackageFinder for FileNameFinder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn find(
        &self,
        coordinate: &ExtensionCoordinate,
        search_path: &Path,
    ) -> Result<Vec<ResolvedPackage>> {
        let focus = coordinate.file_name_stem();
        debug!(coordinate = %coordinate, pattern = %focus, "Matching extension files by name");

        let entries = match fs::read_dir(search_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut packages = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let matches = if path.is_dir() {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(&focus))
                    .unwrap_or(false)
            } else if is_package_archive(&path) {
                path.file_stem()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(&focus))
                    .unwrap_or(false)
            } else {
                false
            };

            if matches {
                packages.push(ResolvedPackage::local(coordinate.clone(), path, Self::NAME));
            }
        }
        packages.sort_by(|a, b| a.origin.cmp(&b.origin));
        Ok(packages)
    }
}
