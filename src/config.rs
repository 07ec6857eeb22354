use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/rampart.json";

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "SimulationConfig::default_fixed_dt")]
    pub fixed_dt: f32,
    #[serde(default = "SimulationConfig::default_max_frames")]
    pub max_frames: u32,
    #[serde(default = "SimulationConfig::default_max_backlog")]
    pub max_backlog: f32,
    /// Pace frames against the wall clock instead of stepping as fast as possible.
    #[serde(default)]
    pub realtime: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptConfig {
    #[serde(default = "ScriptConfig::default_root")]
    pub root: PathBuf,
    #[serde(default = "ScriptConfig::default_extension")]
    pub extension: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    #[serde(default = "StageConfig::default_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "LogConfig::default_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub scripts: ScriptConfig,
    #[serde(default)]
    pub stage: StageConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub frames: Option<u32>,
    pub fixed_dt: Option<f32>,
    pub stage: Option<PathBuf>,
}

impl SimulationConfig {
    fn default_fixed_dt() -> f32 {
        1.0 / 60.0
    }

    const fn default_max_frames() -> u32 {
        600
    }

    fn default_max_backlog() -> f32 {
        0.25
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fixed_dt: Self::default_fixed_dt(),
            max_frames: Self::default_max_frames(),
            max_backlog: Self::default_max_backlog(),
            realtime: false,
        }
    }
}

impl ScriptConfig {
    fn default_root() -> PathBuf {
        PathBuf::from("assets/scripts")
    }

    fn default_extension() -> String {
        "rhai".to_string()
    }

    /// File backing the behaviour called `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{}", self.extension))
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self { root: Self::default_root(), extension: Self::default_extension() }
    }
}

impl StageConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("assets/stages/stage1.json")
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self { path: Self::default_path() }
    }
}

impl LogConfig {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { filter: Self::default_filter() }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(target: "app", "Config load error: {err:#}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(frames) = overrides.frames {
            self.simulation.max_frames = frames;
        }
        if let Some(dt) = overrides.fixed_dt {
            self.simulation.fixed_dt = dt;
        }
        if let Some(stage) = &overrides.stage {
            self.stage.path = stage.clone();
        }
    }
}

impl AppConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.frames.is_none() && self.fixed_dt.is_none() && self.stage.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.frames.is_some() {
            fields.push("frames");
        }
        if self.fixed_dt.is_some() {
            fields.push("dt");
        }
        if self.stage.is_some() {
            fields.push("stage");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let cfg: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.simulation.max_frames, 600);
        assert_eq!(cfg.scripts.extension, "rhai");
        assert_eq!(cfg.log.filter, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{ "simulation": { "max_frames": 10 }, "scripts": { "root": "data" } }"#)
                .unwrap();
        assert_eq!(cfg.simulation.max_frames, 10);
        assert!((cfg.simulation.fixed_dt - 1.0 / 60.0).abs() < 1e-6);
        assert_eq!(cfg.scripts.path_for("tower"), PathBuf::from("data/tower.rhai"));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut cfg = AppConfig::default();
        let overrides = AppConfigOverrides { frames: Some(5), fixed_dt: None, stage: Some("s.json".into()) };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.simulation.max_frames, 5);
        assert_eq!(cfg.stage.path, PathBuf::from("s.json"));
        assert_eq!(overrides.applied_fields(), vec!["frames", "stage"]);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = AppConfig::load_or_default("definitely/not/here.json");
        assert_eq!(cfg.stage.path, PathBuf::from("assets/stages/stage1.json"));
    }
}
