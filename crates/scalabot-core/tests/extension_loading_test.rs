//! Extension Loading Tests
//!
//! End-to-end load passes over real package files:
//! - Directory and zip packages found by file name
//! - Missing and ambiguous coordinates
//! - Optional and failing factories
//! - Loader sharing between bots and release

mod common;

use std::sync::Arc;

use common::*;
use scalabot_core::extension::{ExtensionCoordinate, LoadOutcome};

fn example_package_name() -> String {
    example_coordinate().file_name_stem()
}

#[test]
fn test_load_directory_package() {
    init_tracing();
    let host = Host::local();
    write_dir_package(
        host.extensions.path(),
        &example_package_name(),
        scalabot_ext_example::FACTORY_MANIFEST_CONTENT,
        None,
    );

    let loaded = host.loader(bot("demo_bot", 7), vec![example_coordinate()]).load();

    assert_eq!(loaded.outcome(&example_coordinate()), Some(&LoadOutcome::Loaded { extensions: 2 }));
    let names: Vec<&str> = loaded.extensions().map(|e| e.name()).collect();
    assert_eq!(names, vec!["say-hello", "creator-notice"]);
    assert_eq!(loaded.entries()[0].factory_symbol, "say_hello_factory");

    let data_folder = host.data.path().join(EXAMPLE_GROUP).join(EXAMPLE_NAME);
    assert!(data_folder.is_dir());
}

#[test]
fn test_optional_factory_skipped_for_ownerless_bot() {
    let host = Host::local();
    write_dir_package(
        host.extensions.path(),
        &example_package_name(),
        scalabot_ext_example::FACTORY_MANIFEST_CONTENT,
        None,
    );

    let loaded = host.loader(bot("ownerless_bot", 0), vec![example_coordinate()]).load();

    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.entries()[0].extension.name(), "say-hello");
}

#[test]
fn test_load_zip_package() {
    let host = Host::local();
    let archive = host.extensions.path().join(format!("{}.jar", example_package_name()));
    write_zip_package(&archive, "say_hello_factory\n", None);

    let loaded = host.loader(bot("demo_bot", 7), vec![example_coordinate()]).load();

    assert_eq!(loaded.len(), 1);
    let loader = loaded.entries()[0].loader();
    assert_eq!(loader.package().origin, archive.canonicalize().unwrap().display().to_string());
    // Archives are unpacked below the host's unpack directory.
    assert!(loader
        .extension_unit()
        .roots()
        .iter()
        .all(|root| root.starts_with(host.unpack.path())));
}

#[test]
fn test_missing_package_is_not_found() {
    let host = Host::local();
    let coordinate = ExtensionCoordinate::new("org.example", "absent", "1.0");

    let loaded = host.loader(bot("demo_bot", 7), vec![coordinate.clone()]).load();

    assert!(loaded.is_empty());
    assert_eq!(loaded.outcome(&coordinate), Some(&LoadOutcome::NotFound));
    assert!(host.loaders.is_empty());
}

#[test]
fn test_two_packages_declaring_same_coordinate_conflict() {
    init_tracing();
    let host = Host::local();
    let coordinate = ExtensionCoordinate::new("org.example", "hello", "1.0");
    let properties = pom_properties(&coordinate);
    write_zip_package(&host.extensions.path().join("hello-a.jar"), "say_hello_factory\n", Some(&properties));
    write_zip_package(&host.extensions.path().join("hello-b.jar"), "say_hello_factory\n", Some(&properties));

    let loaded = host.loader(bot("demo_bot", 7), vec![coordinate.clone()]).load();

    match loaded.outcome(&coordinate) {
        Some(LoadOutcome::Conflict { candidates }) => {
            assert_eq!(candidates.len(), 2);
            assert!(candidates.iter().any(|c| c.ends_with("hello-a.jar")));
            assert!(candidates.iter().any(|c| c.ends_with("hello-b.jar")));
        }
        other => panic!("expected conflict, got {:?}", other),
    }
    assert!(loaded.is_empty());
    assert!(loaded.acquired().is_empty());
    assert!(host.loaders.is_empty());
}

#[test]
fn test_package_found_by_name_and_metadata_conflicts() {
    let host = Host::local();
    let coordinate = example_coordinate();
    write_dir_package(
        host.extensions.path(),
        &example_package_name(),
        "say_hello_factory\n",
        Some(scalabot_ext_example::POM_PROPERTIES_CONTENT),
    );

    let loaded = host.loader(bot("demo_bot", 7), vec![coordinate.clone()]).load();

    assert!(matches!(
        loaded.outcome(&coordinate),
        Some(LoadOutcome::Conflict { .. })
    ));
}

#[test]
fn test_failing_factories_are_omitted() {
    init_tracing();
    let host = Host::local();
    write_dir_package(
        host.extensions.path(),
        &example_package_name(),
        "failing_factory\npanicking_factory\nunknown_factory\nsay_hello_factory\n",
        None,
    );

    let loaded = host.loader(bot("demo_bot", 7), vec![example_coordinate()]).load();

    assert_eq!(loaded.outcome(&example_coordinate()), Some(&LoadOutcome::Loaded { extensions: 1 }));
    assert_eq!(loaded.entries()[0].extension.name(), "say-hello");
}

#[test]
fn test_bots_share_loader_until_last_release() {
    let host = Host::local();
    write_dir_package(
        host.extensions.path(),
        &example_package_name(),
        scalabot_ext_example::FACTORY_MANIFEST_CONTENT,
        None,
    );
    let coordinate = example_coordinate();

    let first = host.loader(bot("first_bot", 7), vec![coordinate.clone()]).load();
    let second = host.loader(bot("second_bot", 7), vec![coordinate.clone()]).load();

    let loader = first.entries()[0].loader().clone();
    assert!(Arc::ptr_eq(&loader, second.entries()[0].loader()));
    assert_eq!(host.loaders.usage_count(&coordinate), Some(2));

    first.release().unwrap();
    assert_eq!(host.loaders.usage_count(&coordinate), Some(1));
    assert!(!loader.is_closed());

    drop(second);
    assert_eq!(host.loaders.usage_count(&coordinate), None);
    assert!(loader.is_closed());
}

#[test]
fn test_duplicate_coordinates_load_once() {
    let host = Host::local();
    write_dir_package(
        host.extensions.path(),
        &example_package_name(),
        "say_hello_factory\n",
        None,
    );

    let loaded = host
        .loader(bot("demo_bot", 7), vec![example_coordinate(), example_coordinate()])
        .load();

    assert_eq!(loaded.outcomes().len(), 1);
    assert_eq!(loaded.len(), 1);
    assert_eq!(host.loaders.usage_count(&example_coordinate()), Some(1));
}

#[test]
fn test_one_bad_coordinate_does_not_block_others() {
    let host = Host::local();
    write_dir_package(
        host.extensions.path(),
        &example_package_name(),
        "say_hello_factory\n",
        None,
    );
    let absent = ExtensionCoordinate::new("org.example", "absent", "1.0");

    let loaded = host
        .loader(bot("demo_bot", 7), vec![absent.clone(), example_coordinate()])
        .load();

    assert_eq!(loaded.outcome(&absent), Some(&LoadOutcome::NotFound));
    assert_eq!(loaded.outcome(&example_coordinate()), Some(&LoadOutcome::Loaded { extensions: 1 }));
}
