//! Frame lifecycle across the frames in flight.
//!
//! [`FrameScheduler`] owns the ordering of one tick: wait on the slot's
//! fence, pace, simulate, acquire, record, submit, present, and rebuild
//! the swapchain when it goes stale. The GPU work itself sits behind
//! [`FrameBackend`].

use std::time::{Duration, Instant};

use hashbrown::HashSet;
use volchara_core::constants::FRAMES_IN_FLIGHT;
use volchara_gpu::{AcquireOutcome, PresentOutcome};
use volchara_input::{InputState, KeyCode};

use crate::error::Result;
use crate::object::FrameInput;
use crate::scene::{Scene, SceneChanges};

/// How long a paced tick sleeps before returning.
pub const PACING_SLEEP: Duration = Duration::from_millis(1);

/// GPU side of a frame, one call per step of a tick.
pub trait FrameBackend {
    /// Block until `slot`'s previous submission has retired.
    fn wait_for_slot(&mut self, slot: usize) -> Result<()>;

    /// Bring the GPU copies that `changes` marks stale up to date.
    ///
    /// On error the scheduler hands `changes` back to the scene, so the
    /// next tick asks for the same uploads again.
    fn sync_scene(&mut self, scene: &Scene, changes: SceneChanges) -> Result<()>;

    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome>;

    /// Unsignal `slot`'s fence ahead of its next submission.
    fn reset_slot(&mut self, slot: usize) -> Result<()>;

    fn record(&mut self, slot: usize, image_index: u32, scene: &Scene) -> Result<()>;

    fn update_uniforms(&mut self, slot: usize, scene: &Scene) -> Result<()>;

    fn submit(&mut self, slot: usize) -> Result<()>;

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome>;

    fn recreate_swapchain(&mut self) -> Result<()>;
}

/// Frame-rate cap.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl FramePacer {
    /// `None` or zero disables pacing.
    pub fn new(target_fps: Option<u32>) -> Self {
        Self {
            interval: target_fps
                .filter(|&fps| fps > 0)
                .map(|fps| Duration::from_secs(1) / fps),
            last: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Whether a frame may start at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        match (self.interval, self.last) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    /// Start a frame at `now` and return the time since the previous one.
    pub fn accept(&mut self, now: Instant) -> Duration {
        let elapsed = self
            .last
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last = Some(now);
        elapsed
    }
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Too early for the next frame; nothing ran.
    Paced,
    /// A callback asked to stop. Nothing was submitted.
    Exit,
    /// The swapchain was out of date at acquire and has been rebuilt.
    SwapchainRecreated,
    Rendered,
}

/// Drives ticks against a [`FrameBackend`].
#[derive(Debug)]
pub struct FrameScheduler {
    frame_counter: u64,
    pacer: FramePacer,
    resize_pending: bool,
}

impl FrameScheduler {
    pub fn new(target_fps: Option<u32>) -> Self {
        Self {
            frame_counter: 0,
            pacer: FramePacer::new(target_fps),
            resize_pending: false,
        }
    }

    /// Frames submitted so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn current_slot(&self) -> usize {
        (self.frame_counter % FRAMES_IN_FLIGHT as u64) as usize
    }

    /// Rebuild the swapchain after the next present.
    pub fn request_resize(&mut self) {
        self.resize_pending = true;
    }

    pub fn resize_pending(&self) -> bool {
        self.resize_pending
    }

    /// Run one tick now, sleeping briefly if it was paced.
    pub fn tick<B: FrameBackend>(
        &mut self,
        backend: &mut B,
        scene: &mut Scene,
        input: &InputState,
    ) -> Result<FrameOutcome> {
        let outcome = self.tick_at(Instant::now(), backend, scene, input)?;
        if outcome == FrameOutcome::Paced {
            std::thread::sleep(PACING_SLEEP);
        }
        Ok(outcome)
    }

    /// Run one tick as if the current time were `now`.
    pub fn tick_at<B: FrameBackend>(
        &mut self,
        now: Instant,
        backend: &mut B,
        scene: &mut Scene,
        input: &InputState,
    ) -> Result<FrameOutcome> {
        let slot = self.current_slot();
        backend.wait_for_slot(slot)?;

        if !self.pacer.ready(now) {
            return Ok(FrameOutcome::Paced);
        }
        let elapsed = self.pacer.accept(now);

        let pressed_keys: HashSet<KeyCode> = input.pressed_keys().collect();
        let frame = FrameInput {
            elapsed: elapsed.as_secs_f32(),
            pressed_keys: &pressed_keys,
            cursor_delta: input.cursor_delta(),
        };
        if scene.update(&frame).exit {
            tracing::info!("Exit requested");
            return Ok(FrameOutcome::Exit);
        }
        let changes = scene.take_changes();
        if let Err(e) = backend.sync_scene(scene, changes) {
            scene.mark_changed(changes);
            return Err(e);
        }

        let (image_index, suboptimal) = match backend.acquire(slot)? {
            AcquireOutcome::Acquired { index, suboptimal } => (index, suboptimal),
            AcquireOutcome::OutOfDate => {
                tracing::debug!("Swapchain out of date at acquire");
                self.rebuild(backend)?;
                return Ok(FrameOutcome::SwapchainRecreated);
            }
        };

        backend.reset_slot(slot)?;
        backend.record(slot, image_index, scene)?;
        backend.update_uniforms(slot, scene)?;
        backend.submit(slot)?;
        let presented = backend.present(slot, image_index)?;
        self.frame_counter += 1;

        if suboptimal || presented == PresentOutcome::Stale || self.resize_pending {
            self.rebuild(backend)?;
        }
        Ok(FrameOutcome::Rendered)
    }

    fn rebuild<B: FrameBackend>(&mut self, backend: &mut B) -> Result<()> {
        self.resize_pending = false;
        backend.recreate_swapchain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use glam::Vec3;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use volchara_core::primitives;
    use volchara_gpu::GpuError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Sync,
        Acquire(usize),
        Reset(usize),
        Record(usize, u32),
        Uniforms(usize),
        Submit(usize),
        Present(usize, u32),
        Recreate,
    }

    #[derive(Default)]
    struct MockBackend {
        calls: Vec<Call>,
        synced: Vec<SceneChanges>,
        failing_syncs: usize,
        acquires: VecDeque<AcquireOutcome>,
        presents: VecDeque<PresentOutcome>,
        next_image: u32,
    }

    impl MockBackend {
        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|call| pred(call)).count()
        }

        fn submits(&self) -> Vec<usize> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::Submit(slot) => Some(*slot),
                    _ => None,
                })
                .collect()
        }

        fn recreates(&self) -> usize {
            self.count(|call| *call == Call::Recreate)
        }
    }

    impl FrameBackend for MockBackend {
        fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
            self.calls.push(Call::Wait(slot));
            Ok(())
        }

        fn sync_scene(&mut self, _scene: &Scene, changes: SceneChanges) -> Result<()> {
            self.calls.push(Call::Sync);
            self.synced.push(changes);
            if self.failing_syncs > 0 {
                self.failing_syncs -= 1;
                return Err(GpuError::CapacityExceeded {
                    resource: "vertex buffer".to_string(),
                    requested: 2,
                    capacity: 1,
                }
                .into());
            }
            Ok(())
        }

        fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome> {
            self.calls.push(Call::Acquire(slot));
            Ok(self.acquires.pop_front().unwrap_or_else(|| {
                let index = self.next_image;
                self.next_image = (self.next_image + 1) % 3;
                AcquireOutcome::Acquired {
                    index,
                    suboptimal: false,
                }
            }))
        }

        fn reset_slot(&mut self, slot: usize) -> Result<()> {
            self.calls.push(Call::Reset(slot));
            Ok(())
        }

        fn record(&mut self, slot: usize, image_index: u32, _scene: &Scene) -> Result<()> {
            self.calls.push(Call::Record(slot, image_index));
            Ok(())
        }

        fn update_uniforms(&mut self, slot: usize, _scene: &Scene) -> Result<()> {
            self.calls.push(Call::Uniforms(slot));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> Result<()> {
            self.calls.push(Call::Submit(slot));
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
            self.calls.push(Call::Present(slot, image_index));
            Ok(self.presents.pop_front().unwrap_or(PresentOutcome::Presented))
        }

        fn recreate_swapchain(&mut self) -> Result<()> {
            self.calls.push(Call::Recreate);
            Ok(())
        }
    }

    fn unpaced() -> FrameScheduler {
        FrameScheduler::new(None)
    }

    #[test]
    fn slots_alternate() {
        let mut scheduler = unpaced();
        let mut backend = MockBackend::default();
        let mut scene = Scene::new();
        let input = InputState::new();

        for _ in 0..4 {
            let outcome = scheduler.tick(&mut backend, &mut scene, &input).unwrap();
            assert_eq!(outcome, FrameOutcome::Rendered);
        }
        assert_eq!(backend.submits(), vec![0, 1, 0, 1]);
        assert_eq!(scheduler.frame_count(), 4);
    }

    #[test]
    fn fence_wait_precedes_reset_and_record() {
        let mut scheduler = unpaced();
        let mut backend = MockBackend::default();
        backend.acquires.push_back(AcquireOutcome::OutOfDate);
        let mut scene = Scene::new();
        let input = InputState::new();

        for _ in 0..6 {
            scheduler.tick(&mut backend, &mut scene, &input).unwrap();
        }

        // Between two submissions of a slot there must be a wait on it
        // before its reset and its recording.
        for slot in 0..FRAMES_IN_FLIGHT {
            let mut waited = false;
            for call in &backend.calls {
                match *call {
                    Call::Wait(s) if s == slot => waited = true,
                    Call::Reset(s) | Call::Record(s, _) if s == slot => assert!(waited),
                    Call::Submit(s) if s == slot => waited = false,
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn record_follows_reset_and_precedes_submit() {
        let mut scheduler = unpaced();
        let mut backend = MockBackend::default();
        let mut scene = Scene::new();
        let input = InputState::new();
        scheduler.tick(&mut backend, &mut scene, &input).unwrap();

        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Sync,
                Call::Acquire(0),
                Call::Reset(0),
                Call::Record(0, 0),
                Call::Uniforms(0),
                Call::Submit(0),
                Call::Present(0, 0),
            ]
        );
    }

    #[test]
    fn out_of_date_acquires_recreate_without_submitting() {
        let mut scheduler = unpaced();
        let mut backend = MockBackend::default();
        backend.acquires.extend([AcquireOutcome::OutOfDate; 3]);
        let mut scene = Scene::new();
        let input = InputState::new();

        for _ in 0..3 {
            let outcome = scheduler.tick(&mut backend, &mut scene, &input).unwrap();
            assert_eq!(outcome, FrameOutcome::SwapchainRecreated);
        }
        assert_eq!(backend.recreates(), 3);
        assert!(backend.submits().is_empty());
        assert_eq!(backend.count(|call| matches!(call, Call::Reset(_))), 0);
        assert_eq!(scheduler.current_slot(), 0);

        let outcome = scheduler.tick(&mut backend, &mut scene, &input).unwrap();
        assert_eq!(outcome, FrameOutcome::Rendered);
        assert_eq!(backend.submits(), vec![0]);
    }

    #[test]
    fn suboptimal_acquire_renders_then_recreates() {
        let mut scheduler = unpaced();
        let mut backend = MockBackend::default();
        backend.acquires.push_back(AcquireOutcome::Acquired {
            index: 1,
            suboptimal: true,
        });
        let mut scene = Scene::new();
        let input = InputState::new();

        let outcome = scheduler.tick(&mut backend, &mut scene, &input).unwrap();
        assert_eq!(outcome, FrameOutcome::Rendered);
        assert_eq!(
            &backend.calls[backend.calls.len() - 2..],
            &[Call::Present(0, 1), Call::Recreate]
        );
    }

    #[test]
    fn stale_present_and_resize_recreate_once() {
        let mut scheduler = unpaced();
        let mut backend = MockBackend::default();
        backend.presents.push_back(PresentOutcome::Stale);
        let mut scene = Scene::new();
        let input = InputState::new();

        scheduler.tick(&mut backend, &mut scene, &input).unwrap();
        assert_eq!(backend.recreates(), 1);

        scheduler.request_resize();
        scheduler.tick(&mut backend, &mut scene, &input).unwrap();
        assert_eq!(backend.recreates(), 2);
        assert!(!scheduler.resize_pending());

        scheduler.tick(&mut backend, &mut scene, &input).unwrap();
        assert_eq!(backend.recreates(), 2);
    }

    #[test]
    fn exit_key_stops_within_one_tick() {
        let mut scheduler = unpaced();
        let mut backend = MockBackend::default();
        let mut scene = Scene::new();
        scene.add(
            Object::mesh(primitives::plane(1.0, 1.0, Vec3::ONE)).on_frame(|_, input, commands| {
                if input.is_pressed(KeyCode::Escape) {
                    commands.exit();
                }
            }),
        );
        let mut input = InputState::new();

        assert_eq!(
            scheduler.tick(&mut backend, &mut scene, &input).unwrap(),
            FrameOutcome::Rendered
        );

        input.keyboard_mut().press(KeyCode::Escape);
        assert_eq!(
            scheduler.tick(&mut backend, &mut scene, &input).unwrap(),
            FrameOutcome::Exit
        );
        assert_eq!(backend.submits().len(), 1);
        assert_eq!(backend.calls.last(), Some(&Call::Wait(1)));
    }

    #[test]
    fn pacing_skips_early_ticks() {
        let mut scheduler = FrameScheduler::new(Some(60));
        let mut backend = MockBackend::default();
        let mut scene = Scene::new();
        let runs = Rc::new(Cell::new(0));
        let seen = Rc::clone(&runs);
        scene.add(Object::directional_light(Vec3::ONE, 1.0).on_frame(move |_, _, _| {
            seen.set(seen.get() + 1);
        }));
        let input = InputState::new();
        let start = Instant::now();

        let tick = |scheduler: &mut FrameScheduler,
                    backend: &mut MockBackend,
                    scene: &mut Scene,
                    millis: u64| {
            scheduler
                .tick_at(start + Duration::from_millis(millis), backend, scene, &input)
                .unwrap()
        };

        assert_eq!(tick(&mut scheduler, &mut backend, &mut scene, 0), FrameOutcome::Rendered);
        assert_eq!(tick(&mut scheduler, &mut backend, &mut scene, 5), FrameOutcome::Paced);
        assert_eq!(tick(&mut scheduler, &mut backend, &mut scene, 16), FrameOutcome::Paced);
        assert_eq!(tick(&mut scheduler, &mut backend, &mut scene, 17), FrameOutcome::Rendered);

        assert_eq!(runs.get(), 2);
        assert_eq!(backend.submits(), vec![0, 1]);
    }

    #[test]
    fn elapsed_reaches_callbacks() {
        let mut scheduler = unpaced();
        let mut backend = MockBackend::default();
        let mut scene = Scene::new();
        let last_elapsed = Rc::new(Cell::new(-1.0_f32));
        let seen = Rc::clone(&last_elapsed);
        scene.add(Object::directional_light(Vec3::ONE, 1.0).on_frame(move |_, input, _| {
            seen.set(input.elapsed);
        }));
        let input = InputState::new();
        let start = Instant::now();

        scheduler
            .tick_at(start, &mut backend, &mut scene, &input)
            .unwrap();
        assert_eq!(last_elapsed.get(), 0.0);

        scheduler
            .tick_at(start + Duration::from_millis(250), &mut backend, &mut scene, &input)
            .unwrap();
        assert!((last_elapsed.get() - 0.25).abs() < 1e-4);
    }

    #[test]
    fn zero_fps_disables_pacing() {
        assert!(FramePacer::new(Some(0)).interval().is_none());
        assert_eq!(
            FramePacer::new(Some(50)).interval(),
            Some(Duration::from_millis(20))
        );
    }

    #[test]
    fn failed_sync_is_retried_with_every_change() {
        let mut scheduler = unpaced();
        let mut backend = MockBackend {
            failing_syncs: 1,
            ..MockBackend::default()
        };
        let mut scene = Scene::new();
        scene.add(Object::mesh(primitives::plane(1.0, 1.0, Vec3::ONE)));
        scene.add(Object::directional_light(Vec3::ONE, 1.0));
        let input = InputState::new();

        assert!(scheduler.tick(&mut backend, &mut scene, &input).is_err());
        assert!(backend.submits().is_empty());

        assert_eq!(
            scheduler.tick(&mut backend, &mut scene, &input).unwrap(),
            FrameOutcome::Rendered
        );
        let all = SceneChanges::GEOMETRY | SceneChanges::LIGHTING;
        assert_eq!(backend.synced, vec![all, all]);

        scheduler.tick(&mut backend, &mut scene, &input).unwrap();
        assert_eq!(backend.synced[2], SceneChanges::empty());
    }
}
