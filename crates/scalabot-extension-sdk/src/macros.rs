//! Declarative macros for extension packages.

/// Export the factories of an extension package.
///
/// For every `symbol => Type` pair this generates an unmangled
/// `extern "C" fn symbol() -> *mut Box<dyn BotExtensionFactory>` that the
/// host resolves by name from the package's factory manifest. `Type` must
/// implement [`BotExtensionFactory`](crate::BotExtensionFactory) and
/// `Default`. The macro also exports the ABI version symbol and an
/// `exported_factories()` table for hosts that link the package statically.
///
/// A panic while constructing a factory is caught and reported to the host as
/// a null pointer.
///
/// # Example
///
/// ```rust
/// use scalabot_extension_sdk::prelude::*;
/// use std::path::Path;
///
/// #[derive(Default)]
/// struct EchoFactory;
///
/// impl BotExtensionFactory for EchoFactory {
///     fn create_extension(
///         &self,
///         _bot: &BotContext,
///         _data_folder: &Path,
///         _options: &BotExtensionCreateOptions,
///     ) -> FactoryResult<Option<Box<dyn BotExtension>>> {
///         Ok(None)
///     }
/// }
///
/// export_factories!(echo_factory => EchoFactory);
///
/// let table = exported_factories();
/// assert_eq!(table[0].0, "echo_factory");
/// ```
#[macro_export]
macro_rules! export_factories {
    ($($symbol:ident => $ty:ty),+ $(,)?) => {
        #[no_mangle]
        pub extern "C" fn scalabot_extension_abi_version() -> u32 {
            $crate::EXTENSION_ABI_VERSION
        }

        $(
            #[no_mangle]
            #[allow(improper_ctypes_definitions)]
            pub extern "C" fn $symbol() -> *mut ::std::boxed::Box<dyn $crate::BotExtensionFactory> {
                match ::std::panic::catch_unwind(|| {
                    let factory: ::std::boxed::Box<dyn $crate::BotExtensionFactory> =
                        ::std::boxed::Box::new(<$ty as ::std::default::Default>::default());
                    factory
                }) {
                    Ok(factory) => ::std::boxed::Box::into_raw(::std::boxed::Box::new(factory)),
                    Err(_) => ::std::ptr::null_mut(),
                }
            }
        )+

        /// Factories exported by this package, keyed by symbol name.
        pub fn exported_factories() -> ::std::vec::Vec<(&'static str, $crate::FactoryConstructor)> {
            ::std::vec![
                $(
                    (
                        stringify!($symbol),
                        (|| ::std::boxed::Box::new(<$ty as ::std::default::Default>::default()))
                            as $crate::FactoryConstructor,
                    ),
                )+
            ]
        }
    };
}
