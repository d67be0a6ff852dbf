use serde::{Deserialize, Serialize};

/// Named keyframe track set attached to a loaded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    /// Length in seconds.
    pub duration: f32,
}

/// Playback state of one clip on one mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationAction {
    pub clip: AnimationClip,
    pub time: f32,
    pub paused: bool,
    running: bool,
}

impl AnimationAction {
    fn new(clip: AnimationClip) -> Self {
        Self {
            clip,
            time: 0.0,
            paused: false,
            running: false,
        }
    }

    pub fn play(&mut self) {
        self.running = true;
        self.paused = false;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.paused = false;
        self.time = 0.0;
    }

    pub fn is_running(&self) -> bool {
        self.running && !self.paused
    }

    pub fn is_active(&self) -> bool {
        self.running
    }

    /// Advances playback, looping at the end of the clip.
    fn advance(&mut self, delta: f32) {
        if !self.is_running() {
            return;
        }
        self.time += delta;
        if self.clip.duration > 0.0 {
            self.time = self.time.rem_euclid(self.clip.duration);
        } else {
            self.time = 0.0;
        }
    }
}

/// Drives every clip of a single object.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationMixer {
    pub object: String,
    actions: Vec<AnimationAction>,
}

impl AnimationMixer {
    pub fn new(object: impl Into<String>, clips: &[AnimationClip]) -> Self {
        Self {
            object: object.into(),
            actions: clips.iter().cloned().map(AnimationAction::new).collect(),
        }
    }

    pub fn action(&self, clip: &str) -> Option<&AnimationAction> {
        self.actions.iter().find(|action| action.clip.name == clip)
    }

    pub fn action_mut(&mut self, clip: &str) -> Option<&mut AnimationAction> {
        self.actions.iter_mut().find(|action| action.clip.name == clip)
    }

    pub fn actions(&self) -> &[AnimationAction] {
        &self.actions
    }

    pub fn stop_all(&mut self) {
        for action in &mut self.actions {
            action.stop();
        }
    }

    pub fn update(&mut self, delta: f32) {
        for action in &mut self.actions {
            action.advance(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_action_loops_over_clip_duration() {
        let clip = AnimationClip {
            name: "Drive".into(),
            duration: 2.0,
        };
        let mut mixer = AnimationMixer::new("Truck", &[clip]);
        mixer.update(1.0);
        assert_eq!(mixer.action("Drive").unwrap().time, 0.0);

        mixer.action_mut("Drive").unwrap().play();
        mixer.update(1.5);
        mixer.update(1.0);
        assert!((mixer.action("Drive").unwrap().time - 0.5).abs() < 1e-6);

        mixer.stop_all();
        assert!(!mixer.action("Drive").unwrap().is_active());
    }
}
