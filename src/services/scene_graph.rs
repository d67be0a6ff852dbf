use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use log::debug;
use parking_lot::RwLock;

use crate::channel::ReplaySubject;
use crate::engine::light::Light;
use crate::engine::texture::EnvironmentMap;
use crate::scene::{Background, Scene, SceneNode};

/// Sole owner of the scene root. Other services request insertions and
/// removals here and observe the results through its channels.
pub struct SceneGraphService {
    scene: RwLock<Scene>,
    generation: AtomicU64,
    objects: ReplaySubject<Vec<SceneNode>>,
    lights: ReplaySubject<IndexMap<String, Light>>,
}

impl Default for SceneGraphService {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraphService {
    pub fn new() -> Self {
        Self {
            scene: RwLock::new(Scene::default()),
            generation: AtomicU64::new(0),
            objects: ReplaySubject::with_value(Vec::new()),
            lights: ReplaySubject::with_value(IndexMap::new()),
        }
    }

    /// Current object list; replays to new subscribers.
    pub fn objects(&self) -> ReplaySubject<Vec<SceneNode>> {
        self.objects.clone()
    }

    /// Current contents of the lights group; replays to new subscribers.
    pub fn lights(&self) -> ReplaySubject<IndexMap<String, Light>> {
        self.lights.clone()
    }

    /// Generation of the objects group. Loads started under an older
    /// generation are stale.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Empties the objects group and starts a new generation.
    pub fn clear_objects(&self) -> u64 {
        let generation = {
            let mut scene = self.scene.write();
            scene.objects.clear();
            self.generation.fetch_add(1, Ordering::AcqRel) + 1
        };
        self.publish_objects();
        generation
    }

    /// Adds a loaded object if it belongs to the current generation.
    pub fn add_object(&self, generation: u64, node: SceneNode) -> bool {
        {
            let mut scene = self.scene.write();
            if generation != self.generation() {
                debug!(
                    "discarding stale object {} (generation {generation}, current {})",
                    node.name,
                    self.generation()
                );
                return false;
            }
            scene.objects.push(node);
        }
        self.publish_objects();
        true
    }

    pub fn remove_object(&self, name: &str) -> Option<SceneNode> {
        let removed = {
            let mut scene = self.scene.write();
            let index = scene.objects.iter().rposition(|node| node.name == name)?;
            scene.objects.remove(index)
        };
        self.publish_objects();
        Some(removed)
    }

    /// Returns a clone of the object; the last added one wins on name
    /// collisions.
    pub fn object(&self, name: &str) -> Option<SceneNode> {
        self.scene
            .read()
            .objects
            .iter()
            .rev()
            .find(|node| node.name == name)
            .cloned()
    }

    pub fn all_objects(&self) -> Vec<SceneNode> {
        self.scene.read().objects.clone()
    }

    /// Mutates an object in place without republishing the object list.
    pub fn update_object<F, R>(&self, name: &str, updater: F) -> Option<R>
    where
        F: FnOnce(&mut SceneNode) -> R,
    {
        let mut scene = self.scene.write();
        let node = scene.objects.iter_mut().rev().find(|node| node.name == name)?;
        Some(updater(node))
    }

    /// Mutates every object in place without republishing the object list.
    pub fn update_objects<F, R>(&self, updater: F) -> R
    where
        F: FnOnce(&mut [SceneNode]) -> R,
    {
        updater(&mut self.scene.write().objects)
    }

    /// Applies a batch of edits to the lights group and publishes once.
    pub fn update_lights<F>(&self, edit: F)
    where
        F: FnOnce(&mut IndexMap<String, Light>),
    {
        let snapshot = {
            let mut scene = self.scene.write();
            edit(&mut scene.lights);
            scene.lights.clone()
        };
        self.lights.publish(snapshot);
    }

    pub fn add_helper(&self, node: SceneNode) {
        let mut scene = self.scene.write();
        scene.helpers.retain(|helper| helper.name != node.name);
        scene.helpers.push(node);
    }

    pub fn remove_helper(&self, name: &str) -> bool {
        let mut scene = self.scene.write();
        let before = scene.helpers.len();
        scene.helpers.retain(|helper| helper.name != name);
        scene.helpers.len() != before
    }

    pub fn update_helper<F, R>(&self, name: &str, updater: F) -> Option<R>
    where
        F: FnOnce(&mut SceneNode) -> R,
    {
        let mut scene = self.scene.write();
        let node = scene.helpers.iter_mut().find(|node| node.name == name)?;
        Some(updater(node))
    }

    pub fn helper(&self, name: &str) -> Option<SceneNode> {
        self.scene
            .read()
            .helpers
            .iter()
            .find(|node| node.name == name)
            .cloned()
    }

    pub fn set_background(&self, background: Option<Background>) {
        self.scene.write().background = background;
    }

    pub fn background(&self) -> Option<Background> {
        self.scene.read().background.clone()
    }

    pub fn set_environment(&self, environment: Option<EnvironmentMap>) {
        self.scene.write().environment = environment;
    }

    pub fn environment(&self) -> Option<EnvironmentMap> {
        self.scene.read().environment.clone()
    }

    /// Read access to the whole scene, used by the renderer.
    pub fn with_scene<F, R>(&self, reader: F) -> R
    where
        F: FnOnce(&Scene) -> R,
    {
        reader(&self.scene.read())
    }

    fn publish_objects(&self) {
        let snapshot = self.all_objects();
        self.objects.publish(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn make_object(name: &str) -> SceneNode {
        SceneNode::group(name)
    }

    #[test]
    fn add_and_get_object() {
        let graph = SceneGraphService::new();
        let generation = graph.clear_objects();
        assert!(graph.add_object(generation, make_object("Cube")));
        assert!(graph.object("Cube").is_some());
        assert!(graph.object("Sphere").is_none());
        assert!(graph.remove_object("Cube").is_some());
        assert!(graph.all_objects().is_empty());
    }

    #[test]
    fn stale_generation_is_rejected() {
        let graph = SceneGraphService::new();
        let old = graph.clear_objects();
        graph.clear_objects();
        assert!(!graph.add_object(old, make_object("Late")));
        assert!(graph.all_objects().is_empty());
    }

    #[test]
    fn last_added_object_wins_lookups() {
        let graph = SceneGraphService::new();
        let generation = graph.generation();
        graph.add_object(generation, make_object("Cube"));
        graph.add_object(
            generation,
            make_object("Cube").with_position(glam::Vec3::X),
        );
        assert_eq!(graph.object("Cube").unwrap().position, glam::Vec3::X);
        graph.update_object("Cube", |node| node.visible = false);
        let objects = graph.all_objects();
        assert!(objects[0].visible);
        assert!(!objects[1].visible);
    }

    #[test]
    fn object_list_is_republished_on_change() {
        let graph = SceneGraphService::new();
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&counts);
        let _sub = graph
            .objects()
            .subscribe(move |objects| sink.lock().push(objects.len()));
        let generation = graph.generation();
        graph.add_object(generation, make_object("A"));
        graph.add_object(generation, make_object("B"));
        graph.clear_objects();
        assert_eq!(*counts.lock(), vec![0, 1, 2, 0]);
    }
}
