//! Command-line tools for scalabot extension packages.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use scalabot_core::config::{env_vars, ExtensionsConfig};
use scalabot_core::extension::conflict::{self, Verdict};
use scalabot_core::extension::finder::metadata::read_declared_coordinate;
use scalabot_core::extension::finder::{FinderRegistry, SearchResult};
use scalabot_core::extension::loader::CodeUnit;
use scalabot_core::extension::{is_native_library, is_package_archive, ExtensionCoordinate};
use scalabot_extension_sdk::{parse_factory_manifest, FACTORY_MANIFEST};

/// scalabot extension tools.
#[derive(Parser, Debug)]
#[command(name = "scalabot-ext")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Extensions config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Show what an extension package declares.
    Inspect {
        /// Package archive or directory.
        #[arg(required = true)]
        package: PathBuf,
        /// Print JSON.
        #[arg(long)]
        json: bool,
    },
    /// Search the extensions directory for a coordinate.
    Search {
        /// Coordinate, `group:name[:type[:classifier]]:version`.
        #[arg(required = true)]
        coordinate: String,
        /// Directory to search instead of the configured one.
        #[arg(long)]
        extensions_dir: Option<PathBuf>,
        /// Print JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Inspect { package, json } => {
            let report = inspect(&package)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_inspect_report(&report);
            }
            Ok(())
        }
        Command::Search {
            coordinate,
            extensions_dir,
            json,
        } => {
            let config = load_config(args.config.as_deref())?;
            let coordinate: ExtensionCoordinate = coordinate.parse()?;
            let search_path = extensions_dir.unwrap_or_else(|| config.extensions_dir());
            let report = search(&coordinate, &search_path);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_search_report(&report);
            }
            match report.status {
                SearchStatus::Unique => Ok(()),
                SearchStatus::NotFound => std::process::exit(1),
                SearchStatus::Conflict => std::process::exit(2),
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directives(verbose)));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

/// Filter used when `RUST_LOG` is unset: this binary and the core crate.
fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("{}={level},scalabot_core={level}", env!("CARGO_CRATE_NAME"))
}

fn load_config(path: Option<&Path>) -> Result<ExtensionsConfig> {
    match path {
        Some(path) => ExtensionsConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(ExtensionsConfig::from_env()),
    }
}

/// What a package declares about itself.
#[derive(Debug, Serialize)]
struct InspectReport {
    path: String,
    declared_coordinate: Option<String>,
    factories: Vec<String>,
    native_libraries: Vec<String>,
}

fn inspect(package: &Path) -> Result<InspectReport> {
    if !package.exists() {
        anyhow::bail!("Package {} does not exist", package.display());
    }
    let declared = read_declared_coordinate(package)
        .with_context(|| format!("Failed to read metadata of {}", package.display()))?;

    let (manifest, native_libraries) = if package.is_dir() {
        let unit = CodeUnit::new(package.display().to_string(), vec![package.to_path_buf()], None);
        let manifest = match unit.find_resources(FACTORY_MANIFEST).first() {
            Some(path) => Some(fs::read_to_string(path)?),
            None => None,
        };
        let libraries = unit
            .native_libraries()
            .iter()
            .map(|p| p.strip_prefix(package).unwrap_or(p).display().to_string())
            .collect();
        (manifest, libraries)
    } else if is_package_archive(package) {
        read_archive(package)?
    } else {
        anyhow::bail!("{} is neither a package archive nor a directory", package.display());
    };

    Ok(InspectReport {
        path: package.display().to_string(),
        declared_coordinate: declared.map(|c| c.to_string()),
        factories: manifest.as_deref().map(parse_factory_manifest).unwrap_or_default(),
        native_libraries,
    })
}

/// Factory manifest and native library entries of a zip package.
fn read_archive(path: &Path) -> Result<(Option<String>, Vec<String>)> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)
        .with_context(|| format!("{} is not a valid archive", path.display()))?;

    let mut manifest = None;
    let mut libraries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if name == FACTORY_MANIFEST {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            manifest = Some(content);
        } else if is_native_library(Path::new(&name)) {
            libraries.push(name);
        }
    }
    libraries.sort();
    Ok((manifest, libraries))
}

fn print_inspect_report(report: &InspectReport) {
    println!("Package:         {}", report.path);
    println!(
        "Coordinate:      {}",
        report.declared_coordinate.as_deref().unwrap_or("(not declared)")
    );
    if report.factories.is_empty() {
        println!("Factories:       (none)");
    } else {
        println!("Factories:");
        for factory in &report.factories {
            println!("  - {}", factory);
        }
    }
    if !report.native_libraries.is_empty() {
        println!("Native libraries:");
        for library in &report.native_libraries {
            println!("  - {}", library);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SearchStatus {
    Unique,
    NotFound,
    Conflict,
}

#[derive(Debug, Serialize)]
struct Candidate {
    finder: String,
    priority: i32,
    origin: String,
}

#[derive(Debug, Serialize)]
struct SearchReport {
    coordinate: String,
    search_path: String,
    status: SearchStatus,
    /// Every package found, including lower priority tiers.
    candidates: Vec<Candidate>,
    #[serde(skip)]
    conflict_message: Option<String>,
}

fn search(coordinate: &ExtensionCoordinate, search_path: &Path) -> SearchReport {
    let finders = FinderRegistry::with_local_finders(search_path);
    let result = finders.search(coordinate);

    let (status, conflict_message) = match conflict::evaluate(&result) {
        Verdict::Unique(_) => (SearchStatus::Unique, None),
        Verdict::NotFound => (SearchStatus::NotFound, None),
        Verdict::Conflict(_) => (
            SearchStatus::Conflict,
            Some(conflict::describe_conflict("scalabot-ext", coordinate, &result)),
        ),
    };

    SearchReport {
        coordinate: coordinate.to_string(),
        search_path: search_path.display().to_string(),
        status,
        candidates: candidates(&result),
        conflict_message,
    }
}

fn candidates(result: &SearchResult) -> Vec<Candidate> {
    result
        .hits
        .iter()
        .flat_map(|hits| {
            hits.packages.iter().map(|package| Candidate {
                finder: hits.finder.clone(),
                priority: hits.priority,
                origin: package.origin.clone(),
            })
        })
        .collect()
}

fn print_search_report(report: &SearchReport) {
    match report.status {
        SearchStatus::Unique => {
            println!("Found {} in {}", report.coordinate, report.search_path);
            for candidate in &report.candidates {
                println!("  {} (finder: {})", candidate.origin, candidate.finder);
            }
        }
        SearchStatus::NotFound => {
            println!("No package matches {} in {}", report.coordinate, report.search_path);
        }
        SearchStatus::Conflict => {
            if let Some(message) = &report.conflict_message {
                println!("{}", message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn coordinate() -> ExtensionCoordinate {
        ExtensionCoordinate::new("org.example", "hello", "1.0")
    }

    fn write_dir_package(root: &Path, name: &str) -> PathBuf {
        let package = root.join(name);
        let manifest = package.join(FACTORY_MANIFEST);
        fs::create_dir_all(manifest.parent().unwrap()).unwrap();
        fs::write(&manifest, "hello_factory\n").unwrap();
        fs::create_dir_all(package.join("lib")).unwrap();
        fs::write(package.join("lib/libhello.so"), b"").unwrap();
        package
    }

    #[test]
    fn test_default_directives_name_crate_targets() {
        assert_eq!(default_directives(false), "scalabot_ext=info,scalabot_core=info");
        assert_eq!(default_directives(true), "scalabot_ext=debug,scalabot_core=debug");
    }

    #[test]
    fn test_inspect_directory() {
        let dir = tempfile::tempdir().unwrap();
        let package = write_dir_package(dir.path(), "hello");

        let report = inspect(&package).unwrap();
        assert_eq!(report.declared_coordinate, None);
        assert_eq!(report.factories, vec!["hello_factory".to_string()]);
        assert_eq!(report.native_libraries, vec!["lib/libhello.so".to_string()]);
    }

    #[test]
    fn test_inspect_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.jar");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        writer.start_file(FACTORY_MANIFEST, SimpleFileOptions::default()).unwrap();
        writer.write_all(b"hello_factory\necho_factory\n").unwrap();
        writer
            .start_file("META-INF/maven/org.example/hello/pom.properties", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"groupId=org.example\nartifactId=hello\nversion=1.0\n").unwrap();
        writer.start_file("lib/libhello.so", SimpleFileOptions::default()).unwrap();
        writer.finish().unwrap();

        let report = inspect(&path).unwrap();
        assert_eq!(report.declared_coordinate.as_deref(), Some("org.example:hello:jar:1.0"));
        assert_eq!(report.factories.len(), 2);
        assert_eq!(report.native_libraries, vec!["lib/libhello.so".to_string()]);
    }

    #[test]
    fn test_inspect_rejects_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "not a package").unwrap();
        assert!(inspect(&path).is_err());
    }

    #[test]
    fn test_search_statuses() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(search(&coordinate(), dir.path()).status, SearchStatus::NotFound);

        write_dir_package(dir.path(), &coordinate().file_name_stem());
        let report = search(&coordinate(), dir.path());
        assert_eq!(report.status, SearchStatus::Unique);
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].finder, "file-name");

        write_dir_package(dir.path(), &format!("copy_{}", coordinate().file_name_stem()));
        let report = search(&coordinate(), dir.path());
        assert_eq!(report.status, SearchStatus::Conflict);
        assert!(report
            .conflict_message
            .unwrap()
            .contains("matches multiple packages"));
    }
}
