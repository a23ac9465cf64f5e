//! Configuration for SafeKVS
//!
//! Everything `Kvs::open` needs to locate and load one store instance.

use std::path::PathBuf;

use crate::storage::InstanceId;

/// Open configuration for one KVS instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Location
    // -------------------------------------------------------------------------
    /// Root directory. Files live under `{dir}/{process_name}/`:
    ///   ├── kvs_{id}_default.json
    ///   ├── kvs_{id}_{generation}.json
    ///   └── kvs_{id}_{generation}.hash
    pub dir: PathBuf,

    /// Namespace directory below `dir`
    pub process_name: String,

    /// Instance number, part of every filename
    pub instance_id: InstanceId,

    // -------------------------------------------------------------------------
    // Load Policy
    // -------------------------------------------------------------------------
    /// Whether the default file must exist
    pub need_defaults: OpenNeedDefaults,

    /// Whether generation 0 must exist
    pub need_kvs: OpenNeedKvs,
}

/// Load policy for the default file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenNeedDefaults {
    /// Use no defaults if the file is missing
    #[default]
    Optional,

    /// Fail to open if the file is missing
    Required,
}

/// Load policy for generation 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenNeedKvs {
    /// Start with an empty working set if the file is missing
    #[default]
    Optional,

    /// Fail to open if the file is missing
    Required,
}

impl From<bool> for OpenNeedDefaults {
    fn from(required: bool) -> Self {
        if required {
            OpenNeedDefaults::Required
        } else {
            OpenNeedDefaults::Optional
        }
    }
}

impl From<bool> for OpenNeedKvs {
    fn from(required: bool) -> Self {
        if required {
            OpenNeedKvs::Required
        } else {
            OpenNeedKvs::Optional
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            process_name: "default".to_string(),
            instance_id: InstanceId::new(0),
            need_defaults: OpenNeedDefaults::Optional,
            need_kvs: OpenNeedKvs::Optional,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the root directory
    pub fn dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dir = path.into();
        self
    }

    /// Set the process (namespace) name
    pub fn process_name(mut self, name: impl Into<String>) -> Self {
        self.config.process_name = name.into();
        self
    }

    /// Set the instance id
    pub fn instance_id(mut self, id: impl Into<InstanceId>) -> Self {
        self.config.instance_id = id.into();
        self
    }

    /// Set the default-file policy
    pub fn need_defaults(mut self, need: impl Into<OpenNeedDefaults>) -> Self {
        self.config.need_defaults = need.into();
        self
    }

    /// Set the generation-0 policy
    pub fn need_kvs(mut self, need: impl Into<OpenNeedKvs>) -> Self {
        self.config.need_kvs = need.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
