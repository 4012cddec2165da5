//! Example scalabot extension package.
//!
//! Built as a `cdylib`, the library together with the `META-INF` directory
//! of this crate forms a loadable package:
//!
//! ```text
//! net.lamgc.scalabot_scalabot-ext-example_0.1.0/
//! ├── META-INF/scalabot/extension-factories
//! ├── META-INF/maven/net.lamgc.scalabot/scalabot-ext-example/pom.properties
//! └── lib/libscalabot_ext_example.so
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use scalabot_extension_sdk::prelude::*;
use tracing::debug;

/// File in the data folder counting greetings across restarts.
pub const GREETING_COUNTER_FILE: &str = "greetings.count";

/// Answers `/hello` with a greeting.
pub struct SayHelloExtension {
    bot_username: String,
    counter_file: PathBuf,
    greetings: AtomicU64,
}

impl SayHelloExtension {
    fn open(bot: &BotContext, data_folder: &Path) -> FactoryResult<Self> {
        let counter_file = data_folder.join(GREETING_COUNTER_FILE);
        let greetings = match fs::read_to_string(&counter_file) {
            Ok(content) => content.trim().parse().map_err(|_| {
                FactoryError::InvalidConfig(format!(
                    "corrupt greeting counter in {}",
                    counter_file.display()
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            bot_username: bot.username.clone(),
            counter_file,
            greetings: AtomicU64::new(greetings),
        })
    }

    /// Greeting for `who`; the counter is persisted in the data folder.
    pub fn greet(&self, who: &str) -> FactoryResult<String> {
        let count = self.greetings.fetch_add(1, Ordering::SeqCst) + 1;
        fs::write(&self.counter_file, count.to_string())?;
        Ok(format!(
            "Hello {}, this is {} (greeting #{})",
            who, self.bot_username, count
        ))
    }

    pub fn greetings(&self) -> u64 {
        self.greetings.load(Ordering::SeqCst)
    }
}

impl BotExtension for SayHelloExtension {
    fn name(&self) -> &str {
        "say-hello"
    }

    fn commands(&self) -> Vec<CommandDescriptor> {
        vec![CommandDescriptor::new("hello", "Say hello to the bot")]
    }
}

#[derive(Default)]
pub struct SayHelloFactory;

impl BotExtensionFactory for SayHelloFactory {
    fn create_extension(
        &self,
        bot: &BotContext,
        data_folder: &Path,
        _options: &BotExtensionCreateOptions,
    ) -> FactoryResult<Option<Box<dyn BotExtension>>> {
        debug!(bot = %bot.username, "Creating say-hello extension");
        Ok(Some(Box::new(SayHelloExtension::open(bot, data_folder)?)))
    }
}

/// Tells the bot owner which proxy the bot uses.
pub struct CreatorNoticeExtension {
    pub creator_id: i64,
    pub proxy: ProxyConfig,
}

impl BotExtension for CreatorNoticeExtension {
    fn name(&self) -> &str {
        "creator-notice"
    }

    fn commands(&self) -> Vec<CommandDescriptor> {
        vec![CommandDescriptor::new("whoami", "Show bot owner and proxy")]
    }
}

/// Only contributes to bots that have an owner.
#[derive(Default)]
pub struct CreatorNoticeFactory;

impl BotExtensionFactory for CreatorNoticeFactory {
    fn create_extension(
        &self,
        bot: &BotContext,
        _data_folder: &Path,
        options: &BotExtensionCreateOptions,
    ) -> FactoryResult<Option<Box<dyn BotExtension>>> {
        if bot.creator_id <= 0 {
            return Ok(None);
        }
        Ok(Some(Box::new(CreatorNoticeExtension {
            creator_id: bot.creator_id,
            proxy: options.proxy.clone(),
        })))
    }
}

export_factories!(
    say_hello_factory => SayHelloFactory,
    creator_notice_factory => CreatorNoticeFactory,
);

/// Factory manifest shipped with this package.
pub const FACTORY_MANIFEST_CONTENT: &str =
    include_str!("../META-INF/scalabot/extension-factories");

/// Self-description shipped with this package.
pub const POM_PROPERTIES_CONTENT: &str = include_str!(
    "../META-INF/maven/net.lamgc.scalabot/scalabot-ext-example/pom.properties"
);
