//! Video output enumeration: DRM connectors plus pixel overlay models.

use crate::error::Result;
use crate::options::KeyedOptions;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Connect timeout for the best-effort model lookup.
pub const MODELS_CONNECT_TIMEOUT: Duration = Duration::from_millis(200);

const CONNECTOR_MARKERS: [&str; 3] = ["HDMI", "DSI-", "Composite-"];

/// A pixel overlay model as reported by the player.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OverlayModel {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type", default)]
    pub model_type: String,
    #[serde(rename = "autoCreated", default)]
    pub auto_created: bool,
}

impl OverlayModel {
    /// Auto-created frame buffer models mirror a connector and are hidden.
    pub fn is_selectable(&self) -> bool {
        self.model_type != "FB" || !self.auto_created
    }
}

/// Connector names under the DRM class directory, trimmed to start at the
/// connector kind (`card1-HDMI-A-1` becomes `HDMI-A-1`).
pub fn drm_connectors(drm_dir: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(drm_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();

    Ok(names
        .into_iter()
        .filter_map(|name| {
            CONNECTOR_MARKERS.iter().find_map(|marker| {
                let upper = name.to_uppercase();
                upper
                    .find(&marker.to_uppercase())
                    .map(|pos| name[pos..].to_string())
            })
        })
        .collect())
}

/// Fetch the overlay models, `None` when the player can't be reached.
pub async fn fetch_models(client: &reqwest::Client, url: &str) -> Option<Vec<OverlayModel>> {
    let resp = match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => resp,
        Ok(resp) => {
            debug!("Model lookup returned HTTP {}", resp.status());
            return None;
        }
        Err(e) => {
            debug!("Model lookup failed: {}", e);
            return None;
        }
    };
    match resp.json().await {
        Ok(models) => Some(models),
        Err(e) => {
            debug!("Model list unreadable: {}", e);
            None
        }
    }
}

/// Build the video output choices.
pub fn video_outputs(
    connectors: &[String],
    models: &[OverlayModel],
    playlist: bool,
) -> KeyedOptions {
    let mut outputs = KeyedOptions::default();
    if playlist {
        outputs.insert("--Default--", "--Default--");
    }
    for connector in connectors {
        outputs.insert(connector.clone(), connector.clone());
    }
    outputs.insert("Disabled", "Disabled");
    for model in models.iter().filter(|m| m.is_selectable()) {
        outputs.insert(model.name.clone(), model.name.clone());
    }
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drm_connectors() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["card0", "card0-HDMI-A-1", "card0-HDMI-A-2", "card1-DSI-1", "card0-Composite-1", "version"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }

        let connectors = drm_connectors(dir.path()).unwrap();
        assert_eq!(connectors, vec!["Composite-1", "HDMI-A-1", "HDMI-A-2", "DSI-1"]);
    }

    #[test]
    fn test_video_outputs() {
        let models: Vec<OverlayModel> = serde_json::from_str(
            r#"[
                {"Name": "fb0", "Type": "FB", "autoCreated": true},
                {"Name": "Matrix", "Type": "FB", "autoCreated": false},
                {"Name": "Tree", "Type": "Channel", "autoCreated": true}
            ]"#,
        )
        .unwrap();

        let outputs = video_outputs(&["HDMI-A-1".to_string()], &models, true);
        let labels: Vec<&str> = outputs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(labels, vec!["--Default--", "HDMI-A-1", "Disabled", "Matrix", "Tree"]);

        let outputs = video_outputs(&[], &[], false);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs.get("Disabled"), Some("Disabled"));
    }
}
