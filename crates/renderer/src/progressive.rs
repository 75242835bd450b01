use std::sync::Arc;

use crate::backend::{ComputeBackend, DisplayBackend};
use crate::camera::CameraState;
use crate::error::RenderError;
use crate::interop::SharedBufferInterop;
use crate::kernel::{KernelArgs, KernelProgram};
use crate::launch::{LaunchConfig, LaunchPlanner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// An export owns the device; no interactive dispatches are issued.
    Idle,
    Running,
}

/// Counter values a dispatch was issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCounters {
    pub accumulation_frame: u32,
    pub true_frame: u32,
}

/// Issues one accumulation pass into the shared buffer per interactive tick.
///
/// The accumulation frame lives on [`CameraState`] and is reset there by
/// movement; the scheduler only forwards whatever value it holds. The true
/// frame is owned here and never resets.
pub struct ProgressiveRenderScheduler<C: ComputeBackend> {
    program: Arc<KernelProgram<C>>,
    planner: LaunchPlanner,
    launch: LaunchConfig,
    true_frame: u32,
    state: SchedulerState,
}

impl<C: ComputeBackend> ProgressiveRenderScheduler<C> {
    pub fn new(program: Arc<KernelProgram<C>>, planner: LaunchPlanner) -> Self {
        Self {
            program,
            planner,
            launch: planner.plan(0, 0),
            true_frame: 0,
            state: SchedulerState::Running,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.launch = self.planner.plan(width, height);
        tracing::debug!(
            width,
            height,
            global_x = self.launch.global.0,
            global_y = self.launch.global.1,
            "re-planned interactive launch"
        );
    }

    pub fn launch(&self) -> &LaunchConfig {
        &self.launch
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn true_frame(&self) -> u32 {
        self.true_frame
    }

    /// Holds the scheduler idle while `export_busy`, resuming once it clears.
    pub fn sync_with_export(&mut self, export_busy: bool) {
        let next = if export_busy {
            SchedulerState::Idle
        } else {
            SchedulerState::Running
        };
        if next != self.state {
            tracing::debug!(from = ?self.state, to = ?next, "interactive scheduler state change");
            self.state = next;
        }
    }

    /// Runs one pass and presents it.
    ///
    /// Returns the counters the kernels saw, or `None` when idle or when the
    /// shared buffer has not been allocated. Both counters advance by exactly
    /// one per completed pass.
    pub fn tick<D>(
        &mut self,
        interop: &mut SharedBufferInterop<D>,
        camera: &mut CameraState,
    ) -> Result<Option<FrameCounters>, RenderError>
    where
        D: DisplayBackend<Compute = C>,
    {
        if self.state == SchedulerState::Idle {
            return Ok(None);
        }

        let counters = FrameCounters {
            accumulation_frame: camera.frame,
            true_frame: self.true_frame,
        };
        let launch = self.launch;
        let args = KernelArgs::new(
            launch.width,
            launch.height,
            camera,
            counters.accumulation_frame,
            counters.true_frame,
        );
        let program = &self.program;
        let drawn = interop.draw(|compute, queue, buffer| {
            program
                .dispatch_all(compute, queue, buffer, &args, &launch)
                .map(|_| ())
        })?;
        if !drawn {
            return Ok(None);
        }

        camera.frame = camera.frame.saturating_add(1);
        self.true_frame = self.true_frame.wrapping_add(1);
        Ok(Some(counters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraMotion;
    use crate::launch::LocalSize;
    use crate::testing::{Event, FakeCompute, FakeDisplay};

    struct Rig {
        compute: Arc<FakeCompute>,
        interop: SharedBufferInterop<FakeDisplay>,
        scheduler: ProgressiveRenderScheduler<FakeCompute>,
    }

    fn rig(width: u32, height: u32) -> Rig {
        let compute = Arc::new(FakeCompute::new(256));
        let planner = LaunchPlanner::new(compute.max_work_group_size());
        let program = Arc::new(KernelProgram::build(
            compute.as_ref(),
            "kernel trace",
            planner.local(),
        ));
        let mut interop =
            SharedBufferInterop::new(FakeDisplay::new(&compute), Arc::clone(&compute)).unwrap();
        interop.resize(width, height).unwrap();
        let mut scheduler = ProgressiveRenderScheduler::new(program, planner);
        scheduler.resize(width, height);
        compute.clear_events();
        Rig {
            compute,
            interop,
            scheduler,
        }
    }

    #[test]
    fn idle_ticks_advance_accumulation_by_one() {
        let mut rig = rig(64, 48);
        let mut camera = CameraState::default();
        for expected in 0..5u32 {
            let counters = rig
                .scheduler
                .tick(&mut rig.interop, &mut camera)
                .unwrap()
                .unwrap();
            assert_eq!(counters.accumulation_frame, expected);
            assert_eq!(counters.true_frame, expected);
            assert_eq!(camera.frame, expected + 1);
        }
    }

    #[test]
    fn movement_resets_accumulation_but_not_true_frame() {
        let mut rig = rig(64, 48);
        let mut camera = CameraState::default();
        for _ in 0..3 {
            rig.scheduler.tick(&mut rig.interop, &mut camera).unwrap();
        }
        camera.apply_motions([CameraMotion::Forward], 0.1);
        rig.scheduler.tick(&mut rig.interop, &mut camera).unwrap();

        let args = rig.compute.enqueued_args();
        let last = args.last().unwrap();
        assert_eq!(last.accumulation_frame, 0);
        assert_eq!(last.true_frame, 3);
        assert_eq!(rig.scheduler.true_frame(), 4);
    }

    #[test]
    fn idle_scheduler_issues_nothing() {
        let mut rig = rig(64, 48);
        let mut camera = CameraState {
            frame: 9,
            ..CameraState::default()
        };
        rig.scheduler.sync_with_export(true);
        assert_eq!(rig.scheduler.state(), SchedulerState::Idle);
        assert!(rig
            .scheduler
            .tick(&mut rig.interop, &mut camera)
            .unwrap()
            .is_none());
        assert!(rig.compute.events().is_empty());
        assert_eq!(camera.frame, 9);

        rig.scheduler.sync_with_export(false);
        assert!(rig
            .scheduler
            .tick(&mut rig.interop, &mut camera)
            .unwrap()
            .is_some());
    }

    #[test]
    fn resize_replans_dispatch_size() {
        let mut rig = rig(800, 600);
        assert_eq!(rig.scheduler.launch().local, LocalSize::square(16));
        assert_eq!(rig.scheduler.launch().global, (800, 608));

        rig.interop.resize(801, 600).unwrap();
        rig.scheduler.resize(801, 600);
        let mut camera = CameraState::default();
        rig.scheduler.tick(&mut rig.interop, &mut camera).unwrap();

        let launches: Vec<LaunchConfig> = rig
            .compute
            .events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Enqueue { launch, .. } => Some(launch),
                _ => None,
            })
            .collect();
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].global, (816, 608));
        assert_eq!((launches[0].width, launches[0].height), (801, 600));
    }
}
