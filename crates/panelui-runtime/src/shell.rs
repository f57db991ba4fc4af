#![forbid(unsafe_code)]

//! The runtime shell: scene + screen buffer + drivers + built-in tasks.
//!
//! A [`Shell`] owns everything one display needs; a [`Runtime`] wraps
//! it with a [`Scheduler`] and installs the three built-in tasks:
//!
//! | Task | Priority | Period |
//! |------|----------|--------|
//! | poll-input | 0 | input poll interval |
//! | dispatch-events | 5 | input poll interval |
//! | frame (layout, paint, flush) | 10 | `1000 / fps` |
//!
//! Priorities order the tasks within a cycle where they fall due
//! together, giving the fixed input → events → layout → paint → flush
//! sequence.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use panelui_core::event::Event;
use panelui_render::buffer::PixelBuffer;
use panelui_scene::SceneTree;

use crate::compositor::compose;
use crate::drivers::{InputDevice, PanelDriver};
use crate::error::RuntimeError;
use crate::flush::{FlushJob, FlushThread};
use crate::scheduler::{Scheduler, TaskSpec};

/// Tuning knobs for the runtime loop.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Frame task rate; the period is `1000 / fps` ms. Default: 30.
    pub fps: u16,
    /// Input poll and event dispatch period in ms. Default: 10.
    pub input_poll_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            input_poll_ms: 10,
        }
    }
}

enum FlushMode {
    /// Refresh the panel from the compute thread; blocks the cycle for
    /// the duration of the bus write.
    Inline(Box<dyn PanelDriver>),
    /// Hand bytes to the writer thread and keep computing.
    Threaded(FlushThread),
}

/// Everything one display's runtime owns.
pub struct Shell {
    /// The widget tree. Tasks mutate it freely between frames.
    pub scene: SceneTree,
    screen: PixelBuffer,
    events: VecDeque<Event>,
    inputs: Vec<Box<dyn InputDevice>>,
    flush: FlushMode,
    /// Stale area displaced from the flush mailbox, folded back into
    /// the next frame.
    carry: Option<panelui_core::geometry::Rect>,
    stopping: bool,
}

impl Shell {
    /// A shell that flushes inline on the compute thread.
    #[must_use]
    pub fn new(scene: SceneTree, panel: Box<dyn PanelDriver>) -> Self {
        let size = scene.screen_size();
        Self {
            scene,
            screen: PixelBuffer::new(size.width, size.height),
            events: VecDeque::new(),
            inputs: Vec::new(),
            flush: FlushMode::Inline(panel),
            carry: None,
            stopping: false,
        }
    }

    /// A shell that flushes through a dedicated panel-writer thread.
    #[must_use]
    pub fn threaded(scene: SceneTree, panel: impl PanelDriver + Send + 'static) -> Self {
        let size = scene.screen_size();
        Self {
            scene,
            screen: PixelBuffer::new(size.width, size.height),
            events: VecDeque::new(),
            inputs: Vec::new(),
            flush: FlushMode::Threaded(FlushThread::spawn(panel)),
            carry: None,
            stopping: false,
        }
    }

    /// Register an input device, polled once per cycle.
    pub fn add_input(&mut self, device: Box<dyn InputDevice>) {
        self.inputs.push(device);
    }

    /// Queue an event as if a device had produced it.
    pub fn push_event(&mut self, event: Event) {
        self.events.push_back(event);
    }

    /// Ask the loop to exit after the current task completes.
    pub fn request_stop(&mut self) {
        self.stopping = true;
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    /// The composited screen buffer (for tests and host preview).
    #[must_use]
    pub fn screen(&self) -> &PixelBuffer {
        &self.screen
    }

    /// Poll every input device once. A failing device is logged and
    /// skipped; one flaky sensor must not halt the loop.
    pub fn poll_inputs(&mut self) {
        for device in &mut self.inputs {
            match device.poll() {
                Ok(Some(event)) => self.events.push_back(event),
                Ok(None) => {}
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(device = device.name(), error = %_err, "input poll failed");
                }
            }
        }
    }

    /// Drain the event queue through the router. Events aimed at
    /// despawned nodes are dropped, not fatal; input devices race node
    /// removal by design.
    pub fn drain_events(&mut self) {
        while let Some(mut event) = self.events.pop_front() {
            match self.scene.dispatch(&mut event) {
                Ok(_) => {}
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(error = %_err, "dropping event for stale target");
                }
            }
        }
    }

    /// One frame: relayout if flagged, composite stale regions, flush
    /// the stale window, clear the trackers.
    pub fn frame(&mut self) -> Result<(), RuntimeError> {
        if self.scene.layout_needed() {
            self.scene.layout()?;
        }
        if let Some(rect) = self.carry.take() {
            self.scene.mark_screen_dirty(rect);
        }
        if !self.scene.screen_tracker().is_dirty() {
            return Ok(());
        }
        compose(&mut self.scene, &mut self.screen)?;
        if let Some(window) = self.scene.screen_tracker().bounding() {
            if let Some((rect, bytes)) = self.screen.region_bytes(window) {
                match &mut self.flush {
                    FlushMode::Inline(panel) => panel.refresh(rect, &bytes)?,
                    FlushMode::Threaded(thread) => {
                        if let Some(displaced) = thread.submit(FlushJob { rect, bytes }) {
                            self.carry = Some(displaced.rect);
                        }
                        if let Some(_err) = thread.take_error() {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(error = %_err, "panel refresh failed");
                        }
                    }
                }
            }
        }
        self.scene.clear_dirty();
        Ok(())
    }
}

/// The scheduler-driven runtime loop around a [`Shell`].
pub struct Runtime {
    scheduler: Scheduler<Shell>,
    shell: Shell,
}

impl Runtime {
    /// Create a runtime on the wall clock.
    #[must_use]
    pub fn new(shell: Shell, config: RuntimeConfig) -> Self {
        let start = Instant::now();
        Self::with_clock(shell, config, move || start.elapsed().as_millis() as u64)
    }

    /// Create a runtime with an injected monotonic millisecond clock.
    #[must_use]
    pub fn with_clock(
        shell: Shell,
        config: RuntimeConfig,
        clock: impl Fn() -> u64 + 'static,
    ) -> Self {
        let mut scheduler = Scheduler::new(clock);
        let frame_period = 1000 / u64::from(config.fps.max(1));
        scheduler.spawn(
            TaskSpec::callback("poll-input", |shell: &mut Shell| {
                shell.poll_inputs();
                Ok(())
            })
            .with_priority(0)
            .with_period(config.input_poll_ms),
        );
        scheduler.spawn(
            TaskSpec::callback("dispatch-events", |shell: &mut Shell| {
                shell.drain_events();
                Ok(())
            })
            .with_priority(5)
            .with_period(config.input_poll_ms),
        );
        scheduler.spawn(
            TaskSpec::callback("frame", Shell::frame)
                .with_priority(10)
                .with_period(frame_period),
        );
        Self { scheduler, shell }
    }

    /// The shell, for wiring widgets and devices.
    #[must_use]
    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    /// Mutable shell access.
    pub fn shell_mut(&mut self) -> &mut Shell {
        &mut self.shell
    }

    /// Queue an application task.
    pub fn spawn(&mut self, task: TaskSpec<Shell>) {
        self.scheduler.spawn(task);
    }

    /// Run all currently due tasks once; returns how many steps ran.
    pub fn run_cycle(&mut self) -> Result<u32, RuntimeError> {
        self.scheduler.run_due(&mut self.shell)
    }

    /// Run until a task or listener requests a stop.
    ///
    /// Between cycles the thread sleeps until the next task is due;
    /// nothing in the compute path busy-waits.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while !self.shell.is_stopping() {
            self.run_cycle()?;
            if self.shell.is_stopping() {
                break;
            }
            let Some(due) = self.scheduler.next_due() else {
                break;
            };
            let wait = due.saturating_sub(self.scheduler.now());
            if wait > 0 {
                std::thread::sleep(Duration::from_millis(wait));
            }
        }
        Ok(())
    }
}
