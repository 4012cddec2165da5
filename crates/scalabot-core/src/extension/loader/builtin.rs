//! Linker for factories compiled into the host.

use std::collections::HashMap;
use std::sync::Arc;

use scalabot_extension_sdk::{BotExtensionFactory, FactoryConstructor};

use crate::extension::loader::linker::{FactoryLinker, LinkedUnit};
use crate::extension::loader::unit::CodeUnit;
use crate::extension::{ExtensionError, Result};

/// Resolves factory symbols against a table of statically linked
/// constructors.
///
/// Packages still decide which factories exist through their manifest; the
/// table only supplies the code.
#[derive(Clone, Default)]
pub struct BuiltinLinker {
    table: Arc<HashMap<String, FactoryConstructor>>,
}

impl BuiltinLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the constructor exported under `symbol`.
    pub fn with_factory(mut self, symbol: impl Into<String>, constructor: FactoryConstructor) -> Self {
        Arc::make_mut(&mut self.table).insert(symbol.into(), constructor);
        self
    }

    /// Add every `(symbol, constructor)` pair, as produced by
    /// `exported_factories()` of a package built with `export_factories!`.
    pub fn with_factories<'a>(
        mut self,
        factories: impl IntoIterator<Item = (&'a str, FactoryConstructor)>,
    ) -> Self {
        let table = Arc::make_mut(&mut self.table);
        for (symbol, constructor) in factories {
            table.insert(symbol.to_string(), constructor);
        }
        self
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.table.contains_key(symbol)
    }
}

struct BuiltinUnit {
    name: String,
    table: Arc<HashMap<String, FactoryConstructor>>,
}

impl FactoryLinker for BuiltinLinker {
    fn name(&self) -> &str {
        "builtin"
    }

    fn link(&self, unit: &CodeUnit, _parent: Option<&Arc<dyn LinkedUnit>>) -> Result<Arc<dyn LinkedUnit>> {
        Ok(Arc::new(BuiltinUnit {
            name: unit.name().to_string(),
            table: self.table.clone(),
        }))
    }
}

impl LinkedUnit for BuiltinUnit {
    fn unit_name(&self) -> &str {
        &self.name
    }

    fn resolve_factory(&self, symbol: &str) -> Result<Box<dyn BotExtensionFactory>> {
        let constructor = self
            .table
            .get(symbol)
            .ok_or_else(|| ExtensionError::SymbolNotFound(symbol.to_string()))?;
        Ok(constructor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalabot_extension_sdk::prelude::*;
    use std::path::Path;

    #[derive(Default)]
    struct NoopFactory;

    impl BotExtensionFactory for NoopFactory {
        fn create_extension(
            &self,
            _bot: &BotContext,
            _data_folder: &Path,
            _options: &BotExtensionCreateOptions,
        ) -> FactoryResult<Option<Box<dyn BotExtension>>> {
            Ok(None)
        }
    }

    fn noop() -> Box<dyn BotExtensionFactory> {
        Box::new(NoopFactory)
    }

    #[test]
    fn test_resolve_registered_symbol() {
        let linker = BuiltinLinker::new().with_factory("noop_factory", noop);
        let unit = CodeUnit::new("ext", Vec::new(), None);
        let linked = linker.link(&unit, None).unwrap();

        let factory = linked.resolve_factory("noop_factory").unwrap();
        assert!(factory.factory_type().ends_with("NoopFactory"));
        assert!(matches!(
            linked.resolve_factory("missing"),
            Err(ExtensionError::SymbolNotFound(_))
        ));
    }

    #[test]
    fn test_table_is_copied_on_write() {
        let base = BuiltinLinker::new().with_factory("a", noop);
        let extended = base.clone().with_factories([("b", noop as FactoryConstructor)]);
        assert!(!base.contains("b"));
        assert!(extended.contains("a"));
        assert!(extended.contains("b"));
    }
}
