// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Bridge configuration

use crate::batch::{IndexFormat, MeshBatchAssembler};
use crate::params::DecompositionParameters;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File picked up by [`BridgeConfig::load`] from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "vhacd-bridge.toml";

/// Which engine implementation backs a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Parry,
    Components,
    /// Linked native library, requires the `native` feature
    Native,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "parry" => Ok(Self::Parry),
            "components" => Ok(Self::Components),
            "native" => Ok(Self::Native),
            other => bail!("unknown backend '{other}', expected parry, components or native"),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parry => "parry",
            Self::Components => "components",
            Self::Native => "native",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub backend: Backend,
    /// Forces an index width instead of deriving it from the vertex limit
    pub index_format: Option<IndexFormat>,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
    pub parameters: DecompositionParameters,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            index_format: None,
            log_filter: "vhacd_bridge=info".to_string(),
            parameters: DecompositionParameters::default(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: BridgeConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load `vhacd-bridge.toml` if present, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(DEFAULT_CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `VHACD_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("VHACD_MAX_CONVEX_HULLS") {
            self.parameters.max_convex_hulls = parse_var("VHACD_MAX_CONVEX_HULLS", &value)?;
        }
        if let Some(value) = lookup("VHACD_MAX_VERTICES_PER_HULL") {
            self.parameters.max_vertices_per_hull =
                parse_var("VHACD_MAX_VERTICES_PER_HULL", &value)?;
        }
        if let Some(value) = lookup("VHACD_RESOLUTION") {
            self.parameters.max_resolution = parse_var("VHACD_RESOLUTION", &value)?;
        }
        if let Some(value) = lookup("VHACD_BACKEND") {
            self.backend = value.parse()?;
        }
        if let Some(value) = lookup("VHACD_ASYNC") {
            self.parameters.is_async = parse_var("VHACD_ASYNC", &value)?;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Assembler honoring `index_format`, or the vertex-limit policy when unset
    pub fn assembler(&self) -> MeshBatchAssembler {
        let assembler = MeshBatchAssembler::for_parameters(&self.parameters);
        match self.index_format {
            Some(format) => assembler.with_index_format(format),
            None => assembler,
        }
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {key}: '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "backend = \"components\"")?;
        writeln!(file, "[parameters]")?;
        writeln!(file, "max_convex_hulls = 8")?;

        let config = BridgeConfig::from_file(file.path())?;
        assert_eq!(config.backend, Backend::Components);
        assert_eq!(config.parameters.max_convex_hulls, 8);
        assert_eq!(config.parameters.max_vertices_per_hull, 64);
        assert_eq!(config.log_filter, "vhacd_bridge=info");
        Ok(())
    }

    #[test]
    fn test_env_overrides() -> Result<()> {
        let vars: HashMap<&str, &str> = [
            ("VHACD_MAX_CONVEX_HULLS", "12"),
            ("VHACD_MAX_VERTICES_PER_HULL", "128"),
            ("VHACD_BACKEND", "Components"),
            ("VHACD_ASYNC", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = BridgeConfig::default();
        config.apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()))?;
        assert_eq!(config.parameters.max_convex_hulls, 12);
        assert_eq!(config.parameters.max_vertices_per_hull, 128);
        assert_eq!(config.parameters.max_resolution, 400_000);
        assert_eq!(config.backend, Backend::Components);
        assert!(!config.parameters.is_async);
        Ok(())
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = BridgeConfig::default();
        let result = config.apply_env_overrides(|key| {
            (key == "VHACD_RESOLUTION").then(|| "lots".to_string())
        });
        assert!(result.is_err());
        assert!("vulkan".parse::<Backend>().is_err());
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bridge.toml");
        let config = BridgeConfig {
            index_format: Some(IndexFormat::U32),
            ..BridgeConfig::default()
        };
        config.save(&path)?;
        assert_eq!(BridgeConfig::from_file(&path)?, config);
        assert_eq!(config.assembler().index_format(), IndexFormat::U32);
        Ok(())
    }
}
