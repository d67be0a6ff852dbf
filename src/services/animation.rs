use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use log::debug;
use parking_lot::Mutex;

use crate::channel::{ReplaySubject, Subscription};
use crate::engine::animation::{AnimationAction, AnimationClip, AnimationMixer};
use crate::error::AnimationError;
use crate::scene::SceneNode;
use crate::services::render::{FrameTick, RenderService};
use crate::services::scene_graph::SceneGraphService;

/// Identifies an animation as (object name, clip name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnimationId {
    pub object: String,
    pub clip: String,
}

impl AnimationId {
    pub fn new(object: impl Into<String>, clip: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            clip: clip.into(),
        }
    }
}

#[derive(Default)]
struct AnimationState {
    mixers: IndexMap<String, AnimationMixer>,
    /// Objects sharing each name when the mixers were last synced.
    instances: IndexMap<String, usize>,
    active: Option<AnimationId>,
}

impl AnimationState {
    fn active_action_mut(&mut self) -> Option<&mut AnimationAction> {
        let id = self.active.as_ref()?;
        self.mixers.get_mut(&id.object)?.action_mut(&id.clip)
    }
}

/// One mixer per animated object, advanced once per rendered frame.
pub struct AnimationService {
    state: Mutex<AnimationState>,
    time: ReplaySubject<f32>,
    subscriptions: Mutex<Vec<Subscription>>,
}

fn collect_clips(object: &SceneNode) -> Vec<AnimationClip> {
    let mut clips = Vec::new();
    object.traverse(&mut |node| clips.extend(node.animations.iter().cloned()));
    clips
}

impl AnimationService {
    pub fn new(scene_graph: &SceneGraphService, render: &RenderService) -> Arc<Self> {
        let service = Arc::new(Self {
            state: Mutex::new(AnimationState::default()),
            time: ReplaySubject::new(),
            subscriptions: Mutex::new(Vec::new()),
        });

        let weak: Weak<Self> = Arc::downgrade(&service);
        let objects = scene_graph.objects().subscribe(move |objects| {
            if let Some(service) = weak.upgrade() {
                service.sync_objects(objects);
            }
        });
        let weak: Weak<Self> = Arc::downgrade(&service);
        let frames = render.before_render().subscribe(move |tick: &FrameTick| {
            if let Some(service) = weak.upgrade() {
                service.update(tick.delta_seconds());
            }
        });
        service.subscriptions.lock().extend([objects, frames]);
        service
    }

    /// Playback time of the active action, in seconds.
    pub fn time(&self) -> ReplaySubject<f32> {
        self.time.clone()
    }

    /// Creates a mixer for the object if it has clips and none exists yet.
    pub fn add_mixer_for_object(&self, object: &SceneNode) -> bool {
        let clips = collect_clips(object);
        if clips.is_empty() {
            return false;
        }
        let mut state = self.state.lock();
        if state.mixers.contains_key(&object.name) {
            return false;
        }
        debug!("animation mixer for {} ({} clips)", object.name, clips.len());
        state
            .mixers
            .insert(object.name.clone(), AnimationMixer::new(&object.name, &clips));
        true
    }

    pub fn mixer(&self, object: &str) -> Option<AnimationMixer> {
        self.state.lock().mixers.get(object).cloned()
    }

    pub fn mixer_count(&self) -> usize {
        self.state.lock().mixers.len()
    }

    pub fn active_animation(&self) -> Option<AnimationId> {
        self.state.lock().active.clone()
    }

    /// Stops every other action and starts the requested clip.
    pub fn play_object_animation(
        &self,
        object: &str,
        clip: &str,
    ) -> Result<AnimationAction, AnimationError> {
        self.activate(object, clip, true)
    }

    /// Stops every other action and makes the clip the seek target without
    /// starting it.
    pub fn select_object_animation(
        &self,
        object: &str,
        clip: &str,
    ) -> Result<AnimationAction, AnimationError> {
        self.activate(object, clip, false)
    }

    fn activate(
        &self,
        object: &str,
        clip: &str,
        play: bool,
    ) -> Result<AnimationAction, AnimationError> {
        let action = {
            let mut state = self.state.lock();
            let mixer = state
                .mixers
                .get(object)
                .ok_or_else(|| AnimationError::UnknownObject(object.to_string()))?;
            if mixer.action(clip).is_none() {
                return Err(AnimationError::UnknownClip {
                    object: object.to_string(),
                    clip: clip.to_string(),
                });
            }
            for mixer in state.mixers.values_mut() {
                mixer.stop_all();
            }
            state.active = Some(AnimationId::new(object, clip));
            let action = state
                .active_action_mut()
                .ok_or(AnimationError::NoActiveAction)?;
            if play {
                action.play();
            }
            action.clone()
        };
        self.time.publish(action.time);
        Ok(action)
    }

    pub fn set_paused(&self, paused: bool) -> Result<(), AnimationError> {
        let mut state = self.state.lock();
        let action = state
            .active_action_mut()
            .ok_or(AnimationError::NoActiveAction)?;
        action.paused = paused;
        Ok(())
    }

    /// Seeks the active action; the time is clamped into the clip. An
    /// action that is not running is started and paused at that time.
    pub fn set_animation_time(&self, time: f32) -> Result<f32, AnimationError> {
        let time = {
            let mut state = self.state.lock();
            let action = state
                .active_action_mut()
                .ok_or(AnimationError::NoActiveAction)?;
            if !action.is_active() {
                action.play();
                action.paused = true;
            }
            action.time = time.clamp(0.0, action.clip.duration.max(0.0));
            action.time
        };
        self.time.publish(time);
        Ok(time)
    }

    pub fn update(&self, delta: f32) {
        let time = {
            let mut state = self.state.lock();
            for mixer in state.mixers.values_mut() {
                mixer.update(delta);
            }
            state
                .active_action_mut()
                .filter(|action| action.is_running())
                .map(|action| action.time)
        };
        if let Some(time) = time {
            self.time.publish(time);
        }
    }

    /// Keeps one mixer per name, built from the last object added under it.
    fn sync_objects(&self, objects: &[SceneNode]) {
        let mut latest: IndexMap<&str, (usize, &SceneNode)> = IndexMap::new();
        for object in objects {
            let entry = latest.entry(object.name.as_str()).or_insert((0, object));
            entry.0 += 1;
            entry.1 = object;
        }
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let instances = &state.instances;
            state.mixers.retain(|name, _| {
                latest.get(name.as_str()).map(|(count, _)| count) == instances.get(name)
            });
            state.instances = latest
                .iter()
                .map(|(name, (count, _))| (name.to_string(), *count))
                .collect();
            let active_gone = state
                .active
                .as_ref()
                .is_some_and(|id| !state.mixers.contains_key(&id.object));
            if active_gone {
                state.active = None;
            }
        }
        for (_, object) in latest.values() {
            self.add_mixer_for_object(object);
        }
    }
}
