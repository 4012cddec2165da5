//! Configuration Tests
//!
//! Config files on disk and host composition from them.

mod common;

use std::fs;
use std::sync::Arc;

use common::*;
use scalabot_core::config::{env_vars, BotConfig, ConfigError, ExtensionsConfig};
use scalabot_core::extension::finder::FinderRegistry;
use scalabot_core::extension::loader::LoaderRegistry;
use scalabot_core::extension::{ExtensionInstantiator, ExtensionLoader, LoadOutcome};
use scalabot_extension_sdk::ProxyType;

#[test]
fn test_load_missing_file() {
    let result = ExtensionsConfig::load("/nonexistent/scalabot/extensions.toml");
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn test_load_and_env_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extensions.toml");
    fs::write(&path, "data_root = \"/srv/scalabot\"\n").unwrap();

    let config = ExtensionsConfig::load(&path).unwrap();
    assert_eq!(config.extensions_dir(), std::path::Path::new("/srv/scalabot/extensions"));

    std::env::set_var(env_vars::EXTENSIONS_DIR, dir.path());
    let config = ExtensionsConfig::load(&path).unwrap();
    std::env::remove_var(env_vars::EXTENSIONS_DIR);
    assert_eq!(config.extensions_dir(), dir.path());
    assert_eq!(config.data_dir(), std::path::Path::new("/srv/scalabot/data/extensions"));
}

#[test]
fn test_host_composed_from_config_files() {
    let root = tempfile::tempdir().unwrap();
    let config = ExtensionsConfig::from_toml_str(&format!(
        "data_root = {:?}\n\n[proxy]\ntype = \"HTTP\"\nhost = \"10.0.0.1\"\nport = 3128\n",
        root.path().display().to_string()
    ))
    .unwrap();
    write_dir_package(
        &config.extensions_dir(),
        &example_coordinate().file_name_stem(),
        scalabot_ext_example::FACTORY_MANIFEST_CONTENT,
        None,
    );

    let bots_path = root.path().join("bots.toml");
    fs::write(
        &bots_path,
        format!(
            "[[bots]]\nenabled = true\nextensions = [\"{}\"]\n\n[bots.account]\nname = \"demo_bot\"\ntoken = \"1001:secret\"\ncreator_id = 7\n",
            example_coordinate()
        ),
    )
    .unwrap();
    let bots = BotConfig::load_all(&bots_path).unwrap();
    assert_eq!(bots.len(), 1);

    let finders = Arc::new(FinderRegistry::with_local_finders(config.extensions_dir()));
    let loaders = Arc::new(LoaderRegistry::new(Arc::new(linker()), config.unpack_dir()));
    let bot = bots[0].context(&config.proxy).unwrap();
    assert_eq!(bot.proxy.proxy_type, ProxyType::Http);

    let loaded = ExtensionLoader::new(
        bot,
        bots[0].extensions.clone(),
        finders,
        loaders,
        ExtensionInstantiator::new(config.data_dir()),
    )
    .load();

    assert_eq!(
        loaded.outcome(&example_coordinate()),
        Some(&LoadOutcome::Loaded { extensions: 2 })
    );
    assert!(config.data_dir().join(EXAMPLE_GROUP).join(EXAMPLE_NAME).is_dir());
}
