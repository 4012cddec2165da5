//! Turning declared factories into extension instances.

use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use scalabot_extension_sdk::{BotContext, BotExtension, BotExtensionCreateOptions};

use crate::extension::coordinate::ExtensionCoordinate;
use crate::extension::finder::panic_message;
use crate::extension::loader::IsolatedLoader;
use crate::extension::{ExtensionError, Result};

/// An extension created for one bot.
///
/// Field order matters: the extension is dropped before the loader that
/// owns its code.
pub struct LoadedExtensionEntry {
    pub coordinate: ExtensionCoordinate,
    /// Symbol the factory was exported under.
    pub factory_symbol: String,
    /// Type name reported by the factory.
    pub factory_type: String,
    pub extension: Box<dyn BotExtension>,
    pub created_at: DateTime<Utc>,
    loader: Arc<IsolatedLoader>,
}

impl LoadedExtensionEntry {
    pub fn loader(&self) -> &Arc<IsolatedLoader> {
        &self.loader
    }
}

impl fmt::Debug for LoadedExtensionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedExtensionEntry")
            .field("coordinate", &self.coordinate)
            .field("factory_symbol", &self.factory_symbol)
            .field("factory_type", &self.factory_type)
            .field("extension", &self.extension.name())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Creates extensions from the factories a loader declares.
#[derive(Debug, Clone)]
pub struct ExtensionInstantiator {
    data_dir: PathBuf,
}

impl ExtensionInstantiator {
    /// `data_dir` is the root of all extension data folders.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Data folder of a package, `{data_dir}/{group}/{name}`, created on
    /// first use. Shared by every bot using the package.
    pub fn data_folder(&self, coordinate: &ExtensionCoordinate) -> Result<PathBuf> {
        for (part, value) in [("group", &coordinate.group), ("name", &coordinate.name)] {
            if !is_plain_component(value) {
                return Err(ExtensionError::UnsafeCoordinate {
                    coordinate: coordinate.to_string(),
                    reason: format!("{} '{}' is not a plain path component", part, value),
                });
            }
        }
        let folder = self.data_dir.join(&coordinate.group).join(&coordinate.name);
        if !folder.exists() {
            fs::create_dir_all(&folder)?;
        }
        Ok(folder)
    }

    /// Ask every declared factory for an extension for `bot`.
    ///
    /// A factory that returns nothing is skipped; a factory that fails or
    /// panics is logged and skipped, and the remaining factories still run.
    pub fn instantiate(
        &self,
        bot: &BotContext,
        coordinate: &ExtensionCoordinate,
        loader: &Arc<IsolatedLoader>,
    ) -> Result<Vec<LoadedExtensionEntry>> {
        let data_folder = self.data_folder(coordinate)?;
        let options = BotExtensionCreateOptions::for_bot(bot);

        let mut entries = Vec::new();
        for symbol in loader.declared_factories()? {
            let factory = match panic::catch_unwind(AssertUnwindSafe(|| loader.resolve_factory(&symbol))) {
                Ok(Ok(factory)) => factory,
                Ok(Err(e)) => {
                    error!(
                        bot = %bot.username,
                        coordinate = %coordinate,
                        factory = %symbol,
                        error = %e,
                        "Failed to resolve extension factory"
                    );
                    continue;
                }
                Err(payload) => {
                    error!(
                        bot = %bot.username,
                        coordinate = %coordinate,
                        factory = %symbol,
                        panic = panic_message(payload.as_ref()),
                        "Extension factory panicked while being constructed"
                    );
                    continue;
                }
            };
            let factory_type = factory.factory_type().to_string();

            let created = panic::catch_unwind(AssertUnwindSafe(|| {
                factory.create_extension(bot, &data_folder, &options)
            }));
            let extension = match created {
                Ok(Ok(Some(extension))) => extension,
                Ok(Ok(None)) => {
                    debug!(
                        bot = %bot.username,
                        factory = %factory_type,
                        "Factory returned no extension, skipped"
                    );
                    continue;
                }
                Ok(Err(e)) => {
                    error!(
                        bot = %bot.username,
                        coordinate = %coordinate,
                        factory = %factory_type,
                        error = %e,
                        "Failed to create extension"
                    );
                    continue;
                }
                Err(payload) => {
                    error!(
                        bot = %bot.username,
                        coordinate = %coordinate,
                        factory = %factory_type,
                        panic = panic_message(payload.as_ref()),
                        "Extension factory panicked while creating extension"
                    );
                    continue;
                }
            };

            debug!(
                bot = %bot.username,
                coordinate = %coordinate,
                extension = extension.name(),
                "Created extension"
            );
            entries.push(LoadedExtensionEntry {
                coordinate: coordinate.clone(),
                factory_symbol: symbol,
                factory_type,
                extension,
                created_at: Utc::now(),
                loader: loader.clone(),
            });
        }
        Ok(entries)
    }
}

fn is_plain_component(value: &str) -> bool {
    !value.is_empty() && value != "." && value != ".." && !value.contains(['/', '\\', '\0'])
}
