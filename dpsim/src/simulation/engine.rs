//! Shared run state for a pipeline run
//!
//! `RunContext` is created by the driver and handed to the catalog, the
//! integrator runner and the aggregator as an `Arc`. It carries:
//! - the run state (`Idle`, `Running`, `Cancelling`) polled at task boundaries,
//! - a monotonic step counter against a total step count,
//! - the current task description and the progress range it maps onto,
//! - an optional listener told about every counted step.
//!
//! Cancellation is cooperative: `cancel()` only flips the state, work already
//! in flight runs to completion.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Cancelling,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RunState::Running,
            2 => RunState::Cancelling,
            _ => RunState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RunState::Idle => 0,
            RunState::Running => 1,
            RunState::Cancelling => 2,
        }
    }
}

/// Description of the task currently running and the progress range it covers
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInfo {
    pub description: String,
    pub range_start: f64, // percent
    pub range_end: f64,   // percent
}

impl Default for TaskInfo {
    fn default() -> Self {
        Self {
            description: "Idle".to_string(),
            range_start: 0.0,
            range_end: 0.0,
        }
    }
}

/// Called after every counted step, from whichever thread reported it
pub type ProgressListener = Box<dyn Fn(&RunContext) + Send + Sync>;

pub struct RunContext {
    state: AtomicU8,
    step: AtomicUsize,
    total_steps: AtomicUsize,
    task: Mutex<TaskInfo>,
    listener: Option<ProgressListener>,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("state", &self.state())
            .field("step", &self.steps())
            .field("total_steps", &self.total_steps())
            .field("task", &*self.task.lock())
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RunState::Idle.as_u8()),
            step: AtomicUsize::new(0),
            total_steps: AtomicUsize::new(0),
            task: Mutex::new(TaskInfo::default()),
            listener: None,
        }
    }

    /// Context that notifies `listener` of every counted step
    pub fn with_listener(listener: ProgressListener) -> Self {
        Self {
            listener: Some(listener),
            ..Self::new()
        }
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Idle -> Running
    pub fn start(&self) {
        self.state.store(RunState::Running.as_u8(), Ordering::SeqCst);
        debug!("run started");
    }

    /// Running -> Cancelling. No effect on an idle context.
    pub fn cancel(&self) {
        let moved = self
            .state
            .compare_exchange(
                RunState::Running.as_u8(),
                RunState::Cancelling.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if moved {
            info!("cancellation requested");
        }
    }

    /// Back to Idle once the driver has unwound
    pub fn finish(&self) {
        self.state.store(RunState::Idle.as_u8(), Ordering::SeqCst);
        *self.task.lock() = TaskInfo::default();
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Start a new task: resets the step counter
    pub fn set_task(&self, description: &str, range_start: f64, range_end: f64, total_steps: usize) {
        *self.task.lock() = TaskInfo {
            description: description.to_string(),
            range_start,
            range_end,
        };
        self.step.store(0, Ordering::SeqCst);
        self.total_steps.store(total_steps, Ordering::SeqCst);
        info!("{description}");
    }

    pub fn task(&self) -> TaskInfo {
        self.task.lock().clone()
    }

    /// Count one finished unit of work. Ignored unless running.
    pub fn report_step(&self) {
        if !self.is_running() {
            return;
        }
        self.step.fetch_add(1, Ordering::SeqCst);
        if let Some(listener) = &self.listener {
            listener(self);
        }
    }

    pub fn steps(&self) -> usize {
        self.step.load(Ordering::SeqCst)
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps.load(Ordering::SeqCst)
    }

    /// Overall progress in percent, mapped into the task's range
    pub fn progress(&self) -> f64 {
        let task = self.task.lock();
        let total = self.total_steps();
        if total == 0 {
            return task.range_start;
        }
        let fraction = self.steps() as f64 / total as f64;
        task.range_start + (task.range_end - task.range_start) * fraction
    }
}
