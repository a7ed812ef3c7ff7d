/*!
Tick sources: animation-frame callbacks and the coarse catch-up interval.

The scheduler never waits or spawns anything. It asks a `TickDriver` to call
it back later and is handed the request's handle when the callback fires
(`Scheduler::on_animation_frame`, `Scheduler::on_catch_up`). Handles let the
scheduler recognize callbacks it has already cancelled.

`ManualDriver` records requests without firing them; whoever holds a clone
decides when each callback runs.
*/

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

pub trait TickDriver {
    /// Request one callback on the next animation frame.
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);

    /// Start a repeating callback every `period`.
    fn start_interval(&mut self, period: Duration) -> TimerHandle;
    fn cancel_interval(&mut self, handle: TimerHandle);
}

#[derive(Debug, Default)]
struct ManualState {
    next_id: u64,
    frames: Vec<FrameHandle>,
    timers: Vec<(TimerHandle, Duration)>,
}

impl ManualState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Driver that only records requests. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct ManualDriver {
    state: Rc<RefCell<ManualState>>,
}

impl ManualDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame requests not yet fired or cancelled, oldest first.
    pub fn pending_frames(&self) -> Vec<FrameHandle> {
        self.state.borrow().frames.clone()
    }

    /// Fire the oldest pending frame request: remove it and return its handle.
    pub fn next_frame(&self) -> Option<FrameHandle> {
        let mut state = self.state.borrow_mut();
        if state.frames.is_empty() {
            None
        } else {
            Some(state.frames.remove(0))
        }
    }

    pub fn active_timers(&self) -> Vec<TimerHandle> {
        self.state.borrow().timers.iter().map(|(h, _)| *h).collect()
    }

    pub fn timer_period(&self, handle: TimerHandle) -> Option<Duration> {
        self.state
            .borrow()
            .timers
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, period)| *period)
    }
}

impl TickDriver for ManualDriver {
    fn request_frame(&mut self) -> FrameHandle {
        let mut state = self.state.borrow_mut();
        let handle = FrameHandle(state.next_id());
        state.frames.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.state.borrow_mut().frames.retain(|h| *h != handle);
    }

    fn start_interval(&mut self, period: Duration) -> TimerHandle {
        let mut state = self.state.borrow_mut();
        let handle = TimerHandle(state.next_id());
        state.timers.push((handle, period));
        handle
    }

    fn cancel_interval(&mut self, handle: TimerHandle) {
        self.state.borrow_mut().timers.retain(|(h, _)| *h != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_fire_once_in_request_order() {
        let mut driver = ManualDriver::new();
        let observer = driver.clone();
        let a = driver.request_frame();
        let b = driver.request_frame();
        assert_ne!(a, b);
        assert_eq!(observer.pending_frames(), vec![a, b]);
        assert_eq!(observer.next_frame(), Some(a));
        driver.cancel_frame(b);
        assert_eq!(observer.next_frame(), None);
    }

    #[test]
    fn intervals_until_cancelled() {
        let mut driver = ManualDriver::new();
        let t = driver.start_interval(Duration::from_secs(1));
        assert_eq!(driver.active_timers(), vec![t]);
        assert_eq!(driver.timer_period(t), Some(Duration::from_secs(1)));
        driver.cancel_interval(t);
        assert!(driver.active_timers().is_empty());
        assert_eq!(driver.timer_period(t), None);
    }
}
