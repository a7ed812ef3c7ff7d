/*!
Cooperative execution scheduler.

Drives a `VmHandle` in real time without threads. While running, every
animation-frame callback (and, as a fallback, a coarse catch-up interval)
advances the VM by the wall-clock time elapsed since the previous tick,
converted to CPU cycles:

```text
cycles = min(elapsed, max_skip) * clock_hz / 1s      (rounded down)
```

States:
- Idle: never run, no timestamp reference.
- Running: a frame request and the catch-up interval are outstanding.
- Paused: explicit `pause()`, a breakpoint hit during a tick, or a failed tick.

Invariants:
- After `pause()` returns, no already-requested callback advances the VM: its
  handle no longer matches and the callback is ignored.
- Ticks only auto-pause on the breakpoint while Running. Manual `step` and
  `step_frame` never change the mode.
- A tick that fails pauses before returning the error, so nothing is ever
  scheduled against a VM that trapped.
- `run` refuses a VM without a cartridge, and a tick that finds the cartridge
  gone (a failed reload while running) pauses with `NotLoaded`.
- The passive change listener is detached from the VM while running and
  invoked once after each tick instead; pausing re-attaches it.
*/

pub mod clock;
pub mod driver;


use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::module::VmModule;
use crate::signal::{Listener, ListenerId};
use crate::vm::{CLOCK_HZ, VmHandle};

pub use clock::{FakeHostClock, HostClock, StdHostClock};
pub use driver::{FrameHandle, ManualDriver, TickDriver, TimerHandle};

pub const DEFAULT_MAX_SKIP: Duration = Duration::from_millis(1000);
pub const DEFAULT_CATCH_UP_PERIOD: Duration = Duration::from_millis(1000);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Longest wall-clock gap a single tick will catch up on.
    pub max_skip: Duration,
    /// Period of the fallback catch-up interval.
    pub catch_up_period: Duration,
    pub clock_hz: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_skip: DEFAULT_MAX_SKIP,
            catch_up_period: DEFAULT_CATCH_UP_PERIOD,
            clock_hz: CLOCK_HZ,
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_skip(mut self, max_skip: Duration) -> Self {
        self.max_skip = max_skip;
        self
    }

    pub fn with_catch_up_period(mut self, period: Duration) -> Self {
        self.catch_up_period = period;
        self
    }

    pub fn with_clock_hz(mut self, clock_hz: u32) -> Self {
        self.clock_hz = clock_hz;
        self
    }

    /// CPU cycles owed for `elapsed` wall-clock time, after clamping.
    pub fn cycles_for(&self, elapsed: Duration) -> u32 {
        let clamped = elapsed.min(self.max_skip);
        let cycles = clamped.as_nanos() * self.clock_hz as u128 / 1_000_000_000;
        u32::try_from(cycles).unwrap_or(u32::MAX)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Running,
    Paused,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The callback was stale or arrived while not running.
    Ignored,
    Advanced { cycles: u32 },
    /// The VM stopped on the breakpoint and the scheduler paused.
    Breakpoint { pc: u16, cycles: u32 },
}

enum Passive {
    None,
    Attached(ListenerId),
    Detached(Listener),
}

impl std::fmt::Debug for Passive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Passive::None => f.write_str("None"),
            Passive::Attached(id) => f.debug_tuple("Attached").field(id).finish(),
            Passive::Detached(_) => f.write_str("Detached"),
        }
    }
}

#[derive(Debug)]
pub struct Scheduler<M: VmModule, C: HostClock, D: TickDriver> {
    vm: VmHandle<M>,
    clock: C,
    driver: D,
    config: SchedulerConfig,
    mode: Mode,
    last_tick: Option<Duration>,
    frame: Option<FrameHandle>,
    catch_up: Option<TimerHandle>,
    passive: Passive,
}

impl<M, C, D> Scheduler<M, C, D>
where
    M: VmModule,
    C: HostClock,
    D: TickDriver,
{
    pub fn new(vm: VmHandle<M>, clock: C, driver: D, config: SchedulerConfig) -> Self {
        Self {
            vm,
            clock,
            driver,
            config,
            mode: Mode::Idle,
            last_tick: None,
            frame: None,
            catch_up: None,
            passive: Passive::None,
        }
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.mode == Mode::Running
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[inline]
    pub fn vm(&self) -> &VmHandle<M> {
        &self.vm
    }

    #[inline]
    pub fn vm_mut(&mut self) -> &mut VmHandle<M> {
        &mut self.vm
    }

    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    #[inline]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Pause and hand the VM back.
    pub fn into_vm(mut self) -> VmHandle<M> {
        self.pause();
        self.vm
    }

    // ---------------------------------------------------------------------
    // Passive listener
    // ---------------------------------------------------------------------

    /// Install the listener that re-renders on VM changes while not running.
    /// Replaces any previous one.
    pub fn set_passive_listener(&mut self, listener: Listener) {
        self.clear_passive_listener();
        self.passive = if self.is_running() {
            Passive::Detached(listener)
        } else {
            Passive::Attached(self.vm.changed_mut().add(listener))
        };
    }

    pub fn clear_passive_listener(&mut self) -> Option<Listener> {
        match std::mem::replace(&mut self.passive, Passive::None) {
            Passive::None => None,
            Passive::Attached(id) => self.vm.changed_mut().remove(id),
            Passive::Detached(listener) => Some(listener),
        }
    }

    fn detach_passive(&mut self) {
        if let Passive::Attached(id) = self.passive {
            self.passive = match self.vm.changed_mut().remove(id) {
                Some(listener) => Passive::Detached(listener),
                None => Passive::None,
            };
        }
    }

    fn attach_passive(&mut self) {
        if let Passive::Detached(listener) = std::mem::replace(&mut self.passive, Passive::None) {
            self.passive = Passive::Attached(self.vm.changed_mut().add(listener));
        }
    }

    fn notify_passive(&mut self) {
        if let Passive::Detached(listener) = &mut self.passive {
            listener();
        }
    }

    // ---------------------------------------------------------------------
    // Run / pause
    // ---------------------------------------------------------------------

    /// Start ticking. Fails with `NotLoaded` and stays put if the VM has no cartridge.
    pub fn run(&mut self) -> Result<()> {
        if self.mode == Mode::Running {
            return Ok(());
        }
        if !self.vm.is_loaded() {
            return Err(BridgeError::NotLoaded);
        }
        self.detach_passive();
        self.last_tick = Some(self.clock.now());
        self.mode = Mode::Running;
        self.frame = Some(self.driver.request_frame());
        self.catch_up = Some(self.driver.start_interval(self.config.catch_up_period));
        tracing::debug!(instance = self.vm.instance(), "scheduler running");
        Ok(())
    }

    /// Stop ticking. Every outstanding callback is cancelled before this returns.
    pub fn pause(&mut self) {
        if self.mode == Mode::Paused {
            return;
        }
        if let Some(frame) = self.frame.take() {
            self.driver.cancel_frame(frame);
        }
        if let Some(timer) = self.catch_up.take() {
            self.driver.cancel_interval(timer);
        }
        self.last_tick = None;
        self.mode = Mode::Paused;
        self.attach_passive();
        tracing::debug!(instance = self.vm.instance(), "scheduler paused");
    }

    // ---------------------------------------------------------------------
    // Manual stepping
    // ---------------------------------------------------------------------

    /// Execute one instruction. Does not pause on the breakpoint.
    pub fn step(&mut self) -> Result<u32> {
        self.vm.step()
    }

    /// Run `frames` display refreshes. Does not pause on the breakpoint.
    pub fn step_frame(&mut self, frames: u16) -> Result<u32> {
        self.vm.step_frames(frames)
    }

    // ---------------------------------------------------------------------
    // Callbacks
    // ---------------------------------------------------------------------

    pub fn on_animation_frame(&mut self, handle: FrameHandle) -> Result<TickOutcome> {
        if self.mode != Mode::Running || self.frame != Some(handle) {
            tracing::trace!(?handle, "ignoring stale frame callback");
            return Ok(TickOutcome::Ignored);
        }
        self.frame = None;
        let outcome = self.tick()?;
        if self.mode == Mode::Running {
            self.frame = Some(self.driver.request_frame());
        }
        Ok(outcome)
    }

    pub fn on_catch_up(&mut self, handle: TimerHandle) -> Result<TickOutcome> {
        if self.mode != Mode::Running || self.catch_up != Some(handle) {
            tracing::trace!(?handle, "ignoring stale catch-up callback");
            return Ok(TickOutcome::Ignored);
        }
        self.tick()
    }

    fn tick(&mut self) -> Result<TickOutcome> {
        if !self.vm.is_loaded() {
            tracing::error!("cartridge went away while running, pausing");
            self.pause();
            return Err(BridgeError::NotLoaded);
        }
        let now = self.clock.now();
        let elapsed = now.saturating_sub(self.last_tick.unwrap_or(now));
        self.last_tick = Some(now);

        if elapsed > self.config.max_skip {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                max_skip_ms = self.config.max_skip.as_millis() as u64,
                "clamping catch-up"
            );
        }
        let cycles = self.config.cycles_for(elapsed);
        if cycles == 0 {
            return Ok(TickOutcome::Advanced { cycles: 0 });
        }

        match self.advance(cycles) {
            Ok((consumed, None)) => {
                self.notify_passive();
                Ok(TickOutcome::Advanced { cycles: consumed })
            }
            Ok((consumed, Some(pc))) => {
                tracing::debug!(pc, "breakpoint hit");
                self.notify_passive();
                self.pause();
                Ok(TickOutcome::Breakpoint {
                    pc,
                    cycles: consumed,
                })
            }
            Err(err) => {
                tracing::error!(error = %err, "tick failed, pausing");
                self.pause();
                Err(err)
            }
        }
    }

    /// Step the VM; reports the PC if it stopped on the breakpoint.
    fn advance(&mut self, cycles: u32) -> Result<(u32, Option<u16>)> {
        let consumed = self.vm.step_cycles(cycles)?;
        let pc = match self.vm.breakpoint() {
            Some(addr) => {
                let pc = self.vm.cpu()?.pc();
                (pc == addr).then_some(pc)
            }
            None => None,
        };
        Ok((consumed, pc))
    }
}
