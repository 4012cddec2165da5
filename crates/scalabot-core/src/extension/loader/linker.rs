//! Linking code units into callable factories.

use std::sync::Arc;

use scalabot_extension_sdk::BotExtensionFactory;

use crate::extension::loader::unit::CodeUnit;
use crate::extension::Result;

/// Code of one unit after linking.
///
/// Whatever keeps the unit's code mapped lives as long as this value.
pub trait LinkedUnit: Send + Sync {
    /// Name of the unit this code was linked from.
    fn unit_name(&self) -> &str;

    /// Construct the factory exported under `symbol` by this unit.
    ///
    /// Only the unit's own code is searched, never its parent's.
    fn resolve_factory(&self, symbol: &str) -> Result<Box<dyn BotExtensionFactory>>;
}

/// Strategy turning code units into [`LinkedUnit`]s.
pub trait FactoryLinker: Send + Sync {
    /// Linker name used in logs.
    fn name(&self) -> &str;

    /// Link `unit`. `parent` is the already linked parent unit, if any.
    fn link(&self, unit: &CodeUnit, parent: Option<&Arc<dyn LinkedUnit>>) -> Result<Arc<dyn LinkedUnit>>;
}
