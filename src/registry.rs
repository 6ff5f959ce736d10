use std::collections::HashMap;

use crate::config::ToolchainProfile;

/// Built-in language id handled by the embedded evaluator
pub const LANG_EMBEDDED: &str = "rhai";
/// Built-in language id handled by the restricted evaluator
pub const LANG_RESTRICTED: &str = "rhai-restricted";

/// Execution strategy a language identifier resolves to
pub enum Strategy<'a> {
    /// In-process evaluation against an allow-listed set of builtins
    Restricted,
    /// In-process evaluation on a boxed full-featured interpreter
    Embedded,
    /// Compile-and-run pipeline driven by a toolchain profile
    Compiled(&'a ToolchainProfile),
}

/// Maps language identifiers to execution strategies.
///
/// Populated once at startup and read-only afterwards, so it is shared
/// across concurrent executions without synchronization.
pub struct Registry {
    toolchains: HashMap<String, ToolchainProfile>,
}

impl Registry {
    /// Builds the registry from the configured toolchain profiles
    pub fn from_profiles(profiles: Vec<ToolchainProfile>) -> Self {
        let mut toolchains = HashMap::new();
        for profile in profiles {
            if matches!(profile.name.as_str(), LANG_EMBEDDED | LANG_RESTRICTED) {
                log::warn!(
                    "toolchain profile '{}' shadows a built-in language and is ignored",
                    profile.name
                );
                continue;
            }
            if toolchains.contains_key(&profile.name) {
                log::warn!(
                    "duplicate toolchain profile '{}' overrides an earlier entry",
                    profile.name
                );
            }
            toolchains.insert(profile.name.clone(), profile);
        }
        Self { toolchains }
    }

    /// Resolves a language identifier; `None` means the language is
    /// unsupported and no execution must be attempted.
    pub fn resolve(&self, language: &str) -> Option<Strategy<'_>> {
        match language {
            LANG_RESTRICTED => Some(Strategy::Restricted),
            LANG_EMBEDDED => Some(Strategy::Embedded),
            other => self.toolchains.get(other).map(Strategy::Compiled),
        }
    }
}
