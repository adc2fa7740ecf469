//! Configuration for the board runtime

use board_types::{BoardError, Identity};
use serde::{Deserialize, Serialize};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid engine configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Main board configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identities the engine is built from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The engine's own identity; actions targeting it mutate the owner set
    #[serde(default = "default_self_identity")]
    pub self_identity: String,

    /// The only identity allowed to replace the board
    #[serde(default = "default_voting_authority")]
    pub voting_authority: String,

    #[serde(default)]
    pub initial_members: Vec<String>,

    #[serde(default)]
    pub initial_owners: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            self_identity: default_self_identity(),
            voting_authority: default_voting_authority(),
            initial_members: Vec::new(),
            initial_owners: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn self_identity(&self) -> Identity {
        Identity::new(self.self_identity.clone())
    }

    pub fn voting_authority(&self) -> Identity {
        Identity::new(self.voting_authority.clone())
    }

    pub fn members(&self) -> Vec<Identity> {
        self.initial_members.iter().map(Identity::new).collect()
    }

    pub fn owners(&self) -> Vec<Identity> {
        self.initial_owners.iter().map(Identity::new).collect()
    }

    /// Check the identities that the registries do not check themselves
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.self_identity().is_null() {
            return Err(ConfigError::Invalid("self_identity must not be empty".into()));
        }
        if self.voting_authority().is_null() {
            return Err(ConfigError::Invalid(
                "voting_authority must not be empty".into(),
            ));
        }
        if self.self_identity == self.voting_authority {
            return Err(ConfigError::Invalid(format!(
                "self_identity and voting_authority must differ (both are {:?})",
                self.self_identity
            )));
        }
        Ok(())
    }
}

/// Event delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Broadcast channel capacity
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Keep an in-memory journal of every event. It is never pruned.
    #[serde(default)]
    pub journal: bool,

    /// Log every event at debug level
    #[serde(default = "default_true")]
    pub trace: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            journal: false,
            trace: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_self_identity() -> String {
    "board:self".to_string()
}

fn default_voting_authority() -> String {
    "board:voting".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BoardConfig {
    /// Load configuration from defaults, an optional file, then `BOARD_*` env vars.
    ///
    /// Nested keys use a double underscore: `BOARD_ENGINE__SELF_IDENTITY`.
    /// Member and owner lists accept comma-separated values.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&BoardConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("BOARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("engine.initial_members")
                .with_list_parse_key("engine.initial_owners"),
        );

        let config: BoardConfig = builder.build()?.try_deserialize()?;
        config.engine.validate()?;
        Ok(config)
    }
}
