//! Explicit configuration injected into resource construction
//!
//! The original node/context lookups (platform attributes, default root
//! group, cache paths) become plain config structs passed in explicitly,
//! never read from ambient global state.

use serde::Deserialize;
use std::path::PathBuf;

/// Homebrew locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HomebrewConfig {
    /// Path to the brew binary
    pub brew_path: PathBuf,
    /// Root of installed tap directories
    pub taps_dir: PathBuf,
}

impl Default for HomebrewConfig {
    fn default() -> Self {
        Self {
            brew_path: PathBuf::from("/usr/local/bin/brew"),
            taps_dir: PathBuf::from("/usr/local/Homebrew/Library/Taps"),
        }
    }
}

/// Where Ohai hint files live
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OhaiConfig {
    pub hints_dir: PathBuf,
}

impl Default for OhaiConfig {
    fn default() -> Self {
        Self {
            hints_dir: PathBuf::from("/etc/chef/ohai/hints"),
        }
    }
}

/// Red Hat Subscription Manager environment
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RhsmConfig {
    /// LANG for subscription-manager invocations, so output matching is
    /// stable across locales
    pub lang: String,
    /// Major platform version; EL6 needs yum-plugin-security for errata
    pub platform_major: Option<u32>,
}

impl Default for RhsmConfig {
    fn default() -> Self {
        Self {
            lang: "en_US".to_string(),
            platform_major: None,
        }
    }
}

/// Default ownership for generated file artifacts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileOwnership {
    pub owner: String,
    pub group: String,
    /// Chef-style octal mode string
    pub mode: String,
}

impl Default for FileOwnership {
    fn default() -> Self {
        Self {
            owner: "root".to_string(),
            group: default_root_group().to_string(),
            mode: "0640".to_string(),
        }
    }
}

/// Platform default for the root group
pub fn default_root_group() -> &'static str {
    if cfg!(any(target_os = "macos", target_os = "freebsd")) {
        "wheel"
    } else {
        "root"
    }
}
