//! `ilc.toml` project configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diagnostics::CompileError;
use crate::lower::LowerOptions;
use crate::transform::OptLevel;
use crate::vm::{DebugOptions, TraceMode};

pub const CONFIG_FILE: &str = "ilc.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub build: BuildConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct BuildConfig {
    pub optimize: OptLevel,
    /// Re-verify the module after every pass.
    pub verify_each: bool,
    pub bounds_checks: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig { optimize: OptLevel::O0, verify_each: false, bounds_checks: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RunConfig {
    /// 0 means unlimited.
    pub max_steps: u64,
    pub trace: TraceSetting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceSetting {
    #[default]
    Off,
    Il,
    Src,
}

impl TraceSetting {
    pub fn mode(self) -> Option<TraceMode> {
        match self {
            TraceSetting::Off => None,
            TraceSetting::Il => Some(TraceMode::Il),
            TraceSetting::Src => Some(TraceMode::Src),
        }
    }
}

impl Config {
    pub fn parse(text: &str, path: &Path) -> Result<Config, CompileError> {
        toml::from_str(text).map_err(|e| CompileError::config(format!("{CONFIG_FILE}: {e}"), path.to_path_buf()))
    }

    pub fn load(path: &Path) -> Result<Config, CompileError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CompileError::config(format!("{CONFIG_FILE}: could not read file: {e}"), path.to_path_buf()))?;
        let config = Config::parse(&text, path)?;
        tracing::debug!(target: "ilc::config", path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// The configuration for `source`: `explicit` when given (it must exist),
    /// else `ilc.toml` beside the source, else the defaults.
    pub fn discover(source: &Path, explicit: Option<&Path>) -> Result<Config, CompileError> {
        if let Some(path) = explicit {
            return Config::load(path);
        }
        let path = config_beside(source);
        if path.is_file() { Config::load(&path) } else { Ok(Config::default()) }
    }

    pub fn lower_options(&self) -> LowerOptions {
        LowerOptions { bounds_checks: self.build.bounds_checks }
    }

    pub fn debug_options(&self) -> DebugOptions {
        DebugOptions {
            max_steps: (self.run.max_steps > 0).then_some(self.run.max_steps),
            trace: self.run.trace.mode(),
            ..DebugOptions::default()
        }
    }
}

fn config_beside(source: &Path) -> PathBuf {
    let dir = match source.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    dir.join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file_parses() {
        let c = Config::parse(
            r#"
[build]
optimize = "O2"
verify-each = true
bounds-checks = false

[run]
max-steps = 1000
trace = "src"
"#,
            Path::new("ilc.toml"),
        )
        .unwrap();
        assert_eq!(c.build.optimize, OptLevel::O2);
        assert!(c.build.verify_each);
        assert!(!c.lower_options().bounds_checks);
        let d = c.debug_options();
        assert_eq!(d.max_steps, Some(1000));
        assert_eq!(d.trace, Some(TraceMode::Src));
    }

    #[test]
    fn missing_sections_take_defaults() {
        let c = Config::parse("[run]\nmax-steps = 0\n", Path::new("ilc.toml")).unwrap();
        assert_eq!(c.build, BuildConfig::default());
        assert_eq!(c.debug_options().max_steps, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::parse("[build]\noptimise = \"O1\"\n", Path::new("x/ilc.toml")).unwrap_err();
        match err {
            CompileError::Config { msg, path } => {
                assert!(msg.contains("optimise"), "{msg}");
                assert_eq!(path, PathBuf::from("x/ilc.toml"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn discovery_finds_the_file_next_to_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("prog.bas");
        assert_eq!(Config::discover(&src, None).unwrap(), Config::default());
        std::fs::write(dir.path().join(CONFIG_FILE), "[build]\noptimize = \"O1\"\n").unwrap();
        assert_eq!(Config::discover(&src, None).unwrap().build.optimize, OptLevel::O1);
        assert!(Config::discover(&src, Some(&dir.path().join("nope.toml"))).is_err());
    }
}
