//! Per-bot load pass.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use scalabot_extension_sdk::{BotContext, BotExtension};

use crate::extension::conflict::{self, Verdict};
use crate::extension::coordinate::ExtensionCoordinate;
use crate::extension::finder::FinderRegistry;
use crate::extension::instantiator::{ExtensionInstantiator, LoadedExtensionEntry};
use crate::extension::loader::LoaderRegistry;
use crate::extension::Result;

/// What happened to one requested coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadOutcome {
    Loaded { extensions: usize },
    NotFound,
    /// Several packages claimed the coordinate; origins of all of them.
    Conflict { candidates: Vec<String> },
    Failed { reason: String },
}

/// Loads the extensions one bot asked for.
pub struct ExtensionLoader {
    bot: BotContext,
    coordinates: Vec<ExtensionCoordinate>,
    finders: Arc<FinderRegistry>,
    loaders: Arc<LoaderRegistry>,
    instantiator: ExtensionInstantiator,
}

impl ExtensionLoader {
    pub fn new(
        bot: BotContext,
        coordinates: Vec<ExtensionCoordinate>,
        finders: Arc<FinderRegistry>,
        loaders: Arc<LoaderRegistry>,
        instantiator: ExtensionInstantiator,
    ) -> Self {
        Self {
            bot,
            coordinates,
            finders,
            loaders,
            instantiator,
        }
    }

    pub fn bot(&self) -> &BotContext {
        &self.bot
    }

    /// Run the pass. Never fails: every problem is logged and recorded as
    /// the outcome of its coordinate, and the pass moves on.
    pub fn load(&self) -> BotExtensions {
        let mut loaded = BotExtensions::new(self.bot.username.clone(), self.loaders.clone());

        for coordinate in &self.coordinates {
            if loaded.outcome(coordinate).is_some() {
                debug!(bot = %self.bot.username, coordinate = %coordinate, "Duplicate coordinate skipped");
                continue;
            }
            let outcome = self.load_one(coordinate, &mut loaded);
            loaded.outcomes.push((coordinate.clone(), outcome));
        }

        info!(
            bot = %self.bot.username,
            requested = loaded.outcomes.len(),
            extensions = loaded.entries.len(),
            "Extensions loaded"
        );
        loaded
    }

    fn load_one(&self, coordinate: &ExtensionCoordinate, loaded: &mut BotExtensions) -> LoadOutcome {
        let result = self.finders.search(coordinate);
        let package = match conflict::evaluate(&result) {
            Verdict::Unique(package) => package,
            Verdict::NotFound => {
                warn!(bot = %self.bot.username, coordinate = %coordinate, "No matching extension package found");
                return LoadOutcome::NotFound;
            }
            Verdict::Conflict(top) => {
                error!(
                    "{}",
                    conflict::describe_conflict(&self.bot.username, coordinate, &result)
                );
                return LoadOutcome::Conflict {
                    candidates: top.packages().map(|p| p.origin.clone()).collect(),
                };
            }
        };

        let loader = match self.loaders.acquire(coordinate, &package) {
            Ok(loader) => loader,
            Err(e) => {
                error!(
                    bot = %self.bot.username,
                    coordinate = %coordinate,
                    origin = %package.origin,
                    error = %e,
                    "Failed to create extension loader"
                );
                return LoadOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };
        loaded.acquired.push(coordinate.clone());

        match self.instantiator.instantiate(&self.bot, coordinate, &loader) {
            Ok(entries) => {
                let extensions = entries.len();
                loaded.entries.extend(entries);
                LoadOutcome::Loaded { extensions }
            }
            Err(e) => {
                error!(
                    bot = %self.bot.username,
                    coordinate = %coordinate,
                    error = %e,
                    "Failed to instantiate extensions"
                );
                LoadOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Extensions of one bot and the loader usages backing them.
///
/// Dropping the value releases the usages; [`release`](Self::release)
/// does the same and reports registry errors.
pub struct BotExtensions {
    bot: String,
    entries: Vec<LoadedExtensionEntry>,
    outcomes: Vec<(ExtensionCoordinate, LoadOutcome)>,
    acquired: Vec<ExtensionCoordinate>,
    loaders: Arc<LoaderRegistry>,
}

impl BotExtensions {
    fn new(bot: String, loaders: Arc<LoaderRegistry>) -> Self {
        Self {
            bot,
            entries: Vec::new(),
            outcomes: Vec::new(),
            acquired: Vec::new(),
            loaders,
        }
    }

    pub fn bot(&self) -> &str {
        &self.bot
    }

    pub fn entries(&self) -> &[LoadedExtensionEntry] {
        &self.entries
    }

    pub fn extensions(&self) -> impl Iterator<Item = &dyn BotExtension> {
        self.entries.iter().map(|e| e.extension.as_ref())
    }

    pub fn outcomes(&self) -> &[(ExtensionCoordinate, LoadOutcome)] {
        &self.outcomes
    }

    pub fn outcome(&self, coordinate: &ExtensionCoordinate) -> Option<&LoadOutcome> {
        self.outcomes
            .iter()
            .find(|(c, _)| c == coordinate)
            .map(|(_, o)| o)
    }

    /// Coordinates whose loader usage this value holds.
    pub fn acquired(&self) -> &[ExtensionCoordinate] {
        &self.acquired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every extension, then release the loader usages.
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        self.entries.clear();
        let acquired = std::mem::take(&mut self.acquired);
        if acquired.is_empty() {
            return Ok(());
        }
        debug!(bot = %self.bot, count = acquired.len(), "Releasing extension loaders");
        self.loaders.release(&acquired)
    }
}

impl Drop for BotExtensions {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            error!(bot = %self.bot, error = %e, "Failed to release extension loaders");
        }
    }
}

impl std::fmt::Debug for BotExtensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotExtensions")
            .field("bot", &self.bot)
            .field("entries", &self.entries)
            .field("outcomes", &self.outcomes)
            .field("acquired", &self.acquired)
            .finish()
    }
}
