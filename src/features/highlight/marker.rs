use glam::{Vec2, Vec3};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::{Color, RenderSize};
use crate::engine::camera::{PerspectiveCamera, Ray};
use crate::features::highlight::navigation::{CameraPose, HighlightSpeed, NavigationTarget};
use crate::scene::SceneNode;

pub const MARKER_RADIUS: f32 = 0.05;
pub const HOVER_SCALE: f32 = 1.25;
pub const DEFAULT_MARKER_COLOR: Color = Color(Vec3::new(1.0, 0.4, 0.1));

fn default_scale() -> f32 {
    1.0
}

/// Point of interest as declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightSetup {
    pub id: String,
    /// Where the marker sits.
    pub position: Vec3,
    /// Where the camera moves to.
    pub camera_target: Vec3,
    /// What the camera looks at once there.
    pub view_target: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_of_view: Option<f32>,
    #[serde(default)]
    pub speed: HighlightSpeed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub labels: IndexMap<String, String>,
}

/// A configured highlight plus its marker state.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub setup: HighlightSetup,
    pub hovered: bool,
}

impl Highlight {
    pub fn new(setup: HighlightSetup) -> Self {
        Self {
            setup,
            hovered: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.setup.id
    }

    pub fn marker_name(&self) -> String {
        format!("highlight:{}", self.setup.id)
    }

    pub fn radius(&self) -> f32 {
        MARKER_RADIUS * self.setup.scale
    }

    pub fn marker_scale(&self) -> Vec3 {
        Vec3::splat(if self.hovered { HOVER_SCALE } else { 1.0 })
    }

    pub fn marker_node(&self) -> SceneNode {
        let mut node = SceneNode::marker(
            self.marker_name(),
            self.setup.color.unwrap_or(DEFAULT_MARKER_COLOR),
            self.radius(),
        )
        .with_position(self.setup.position);
        node.scale = self.marker_scale();
        node
    }

    /// Navigation target; without its own field of view the highlight keeps
    /// the base one.
    pub fn target(&self, base_fov: f32) -> NavigationTarget {
        NavigationTarget {
            id: self.setup.id.clone(),
            pose: CameraPose {
                position: self.setup.camera_target,
                view: self.setup.view_target,
                fov: self.setup.field_of_view.unwrap_or(base_fov),
            },
            speed: self.setup.speed,
        }
    }

    pub fn hit(&self, ray: &Ray) -> Option<f32> {
        let scale = if self.hovered { HOVER_SCALE } else { 1.0 };
        ray.intersect_sphere(self.setup.position, self.radius() * scale)
    }
}

/// Converts a pixel position on the render target to normalized device
/// coordinates.
pub fn to_ndc(position: Vec2, size: RenderSize) -> Vec2 {
    let width = size.width.max(1) as f32;
    let height = size.height.max(1) as f32;
    Vec2::new(position.x / width * 2.0 - 1.0, 1.0 - position.y / height * 2.0)
}

/// Closest highlight under the pointer.
pub fn pick<'a>(
    highlights: impl IntoIterator<Item = &'a Highlight>,
    camera: &PerspectiveCamera,
    ndc: Vec2,
) -> Option<&'a Highlight> {
    let ray = camera.ray_from_ndc(ndc);
    highlights
        .into_iter()
        .filter_map(|highlight| highlight.hit(&ray).map(|distance| (distance, highlight)))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, highlight)| highlight)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(id: &str, position: Vec3) -> HighlightSetup {
        HighlightSetup {
            id: id.into(),
            position,
            camera_target: position + Vec3::Z,
            view_target: position,
            field_of_view: None,
            speed: HighlightSpeed::default(),
            color: None,
            scale: 1.0,
            labels: IndexMap::new(),
        }
    }

    #[test]
    fn parses_camel_case_setup_with_defaults() {
        let parsed: HighlightSetup = serde_json::from_str(
            r#"{"id":"door","position":[1,0,0],"cameraTarget":[2,0,2],
                "viewTarget":[1,0,0],"speed":{"in":0.01}}"#,
        )
        .unwrap();
        assert_eq!(parsed.scale, 1.0);
        assert_eq!(parsed.speed.ease_in, 0.01);
        assert_eq!(parsed.speed.fov, HighlightSpeed::default().fov);
        assert_eq!(Highlight::new(parsed).target(45.0).pose.fov, 45.0);
    }

    #[test]
    fn picks_the_nearest_marker_under_the_pointer() {
        let mut camera = PerspectiveCamera::default();
        camera.position = Vec3::new(0.0, 0.0, 5.0);
        camera.look_at(Vec3::ZERO);
        let near = Highlight::new(setup("near", Vec3::new(0.0, 0.0, 1.0)));
        let far = Highlight::new(setup("far", Vec3::ZERO));
        let aside = Highlight::new(setup("aside", Vec3::new(2.0, 0.0, 0.0)));
        let highlights = [far, near, aside];

        let hit = pick(&highlights, &camera, Vec2::ZERO).unwrap();
        assert_eq!(hit.id(), "near");
        assert!(pick(&highlights, &camera, Vec2::new(0.0, 0.9)).is_none());
    }

    #[test]
    fn pixel_center_maps_to_ndc_origin() {
        let ndc = to_ndc(Vec2::new(50.0, 25.0), RenderSize::new(100, 50));
        assert_eq!(ndc, Vec2::ZERO);
        assert_eq!(
            to_ndc(Vec2::ZERO, RenderSize::new(100, 50)),
            Vec2::new(-1.0, 1.0)
        );
    }
}
