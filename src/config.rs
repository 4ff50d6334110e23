use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 20.0,
            right: 20.0,
            bottom: 120.0,
            left: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub margin: Margins,
    pub fallback_width: f32,
    pub fallback_height: f32,
    pub sibling_separation: f32,
    pub subtree_separation: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            margin: Margins::default(),
            fallback_width: 600.0,
            fallback_height: 400.0,
            sibling_separation: 1.0,
            subtree_separation: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` keeps polling until the surface is disposed.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(50),
            max_attempts: Some(200),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub retry_delay_ms: u64,
    pub max_retries: Option<u32>,
}

impl RenderConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(self.retry_delay_ms),
            max_attempts: self.max_retries,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            width: 1200.0,
            height: 800.0,
            retry_delay_ms: retry.delay.as_millis() as u64,
            max_retries: retry.max_attempts,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    surface: Option<SurfaceConfigFile>,
    retry: Option<RetryConfigFile>,
    layout: Option<LayoutConfigFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SurfaceConfigFile {
    width: Option<f32>,
    height: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetryConfigFile {
    delay_ms: Option<u64>,
    /// `0` disables the cap.
    max_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    sibling_separation: Option<f32>,
    subtree_separation: Option<f32>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;

    if let Some(surface) = parsed.surface {
        if let Some(v) = surface.width {
            config.render.width = v;
        }
        if let Some(v) = surface.height {
            config.render.height = v;
        }
    }
    if let Some(retry) = parsed.retry {
        if let Some(v) = retry.delay_ms {
            config.render.retry_delay_ms = v;
        }
        if let Some(v) = retry.max_attempts {
            config.render.max_retries = (v > 0).then_some(v);
        }
    }
    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.sibling_separation.filter(|v| *v > 0.0) {
            config.layout.sibling_separation = v;
        }
        if let Some(v) = layout.subtree_separation.filter(|v| *v > 0.0) {
            config.layout.subtree_separation = v;
        }
    }

    Ok(config)
}
