//! Engine configuration.
//!
//! Agents receive their configuration as the option string of
//! `-agentpath:libagent.so=<options>`. [`EngineConfig::from_agent_options`]
//! reads the keys this crate understands from it:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `classpath` | extra root-pool entries, separated by the platform path separator; repeatable |
//! | `root_pool` | diagnostic name of the root pool |
//! | `child_pool` | diagnostic name of the child pool |
//! | `hook_interface` | binary name every constructed hook must implement |
//!
//! ```text
//! -agentpath:./libagent.so=classpath=/opt/agent/lib/*:/opt/agent/boot.jar,hook_interface=com.example.Interceptor
//! ```

use tracing::warn;

pub const DEFAULT_ROOT_POOL_NAME: &str = "rootClassPool";
pub const DEFAULT_CHILD_POOL_NAME: &str = "childClassPool";

#[cfg(windows)]
const PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
const PATH_SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Search path entries attached to the root pool at construction.
    pub extra_paths: Vec<String>,
    pub root_pool_name: String,
    pub child_pool_name: String,
    /// When set, hooks whose class does not implement this interface are
    /// rejected.
    pub hook_interface: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            extra_paths: Vec::new(),
            root_pool_name: DEFAULT_ROOT_POOL_NAME.to_string(),
            child_pool_name: DEFAULT_CHILD_POOL_NAME.to_string(),
            hook_interface: None,
        }
    }
}

impl EngineConfig {
    pub fn with_extra_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_hook_interface(mut self, interface: impl Into<String>) -> Self {
        self.hook_interface = Some(interface.into());
        self
    }

    /// Parses an agent option string (`key=value` pairs separated by `,`).
    ///
    /// Unknown keys and pairs without `=` are logged and ignored, so the same
    /// option string can carry settings for other parts of the agent.
    pub fn from_agent_options(options: &str) -> Self {
        let mut config = EngineConfig::default();
        for pair in options.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                warn!(option = pair, "ignoring agent option without a value");
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "classpath" => config.extra_paths.extend(
                    value.split(PATH_SEPARATOR).map(str::trim).filter(|p| !p.is_empty()).map(str::to_string),
                ),
                "root_pool" if !value.is_empty() => config.root_pool_name = value.to_string(),
                "child_pool" if !value.is_empty() => config.child_pool_name = value.to_string(),
                "hook_interface" if !value.is_empty() => config.hook_interface = Some(value.to_string()),
                other => warn!(option = other, "ignoring unknown agent option"),
            }
        }
        config
    }
}
