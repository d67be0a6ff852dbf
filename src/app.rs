use std::fmt;

use crate::viewer::Viewer;

/// Snapshot of what a viewer currently shows, as printed by the CLI.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewerSummary {
    pub objects: Vec<String>,
    pub lights: Vec<String>,
    pub materials: Vec<String>,
    pub features: Vec<String>,
    pub failed_features: Vec<(String, String)>,
    pub load_errors: usize,
    pub frames: u64,
}

impl ViewerSummary {
    pub fn capture(viewer: &Viewer) -> Self {
        let services = viewer.services();
        Self {
            objects: services
                .scene_graph
                .all_objects()
                .into_iter()
                .map(|node| node.name)
                .collect(),
            lights: services
                .lights
                .lights()
                .latest()
                .map(|lights| lights.keys().cloned().collect())
                .unwrap_or_default(),
            materials: services
                .materials
                .materials()
                .latest()
                .map(|materials| materials.keys().cloned().collect())
                .unwrap_or_default(),
            features: services
                .features
                .active()
                .latest()
                .unwrap_or_default()
                .iter()
                .map(ToString::to_string)
                .collect(),
            failed_features: services
                .features
                .failures()
                .latest()
                .unwrap_or_default()
                .into_iter()
                .map(|failure| (failure.id.to_string(), failure.message))
                .collect(),
            load_errors: services.assets.loading().state().errors,
            frames: services.render.frames_rendered(),
        }
    }
}

impl fmt::Display for ViewerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Loaded {} object(s)", self.objects.len())?;
        for object in &self.objects {
            writeln!(f, " - {object}")?;
        }
        writeln!(f, "Lights: {}", self.lights.join(", "))?;
        writeln!(f, "Materials: {}", self.materials.join(", "))?;
        writeln!(f, "Active features: {}", self.features.join(", "))?;
        for (id, message) in &self.failed_features {
            writeln!(f, "Feature {id} failed: {message}")?;
        }
        if self.load_errors > 0 {
            writeln!(f, "Load errors: {}", self.load_errors)?;
        }
        write!(f, "Frames rendered: {}", self.frames)
    }
}
