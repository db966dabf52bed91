//! Window and message loop.
//!
//! The Win32 side lives in `win32`; the helpers here carry no platform
//! types so they can be exercised anywhere.

use std::time::{Duration, Instant};

#[cfg(windows)]
mod win32;
#[cfg(windows)]
pub use win32::*;

/// Input the window procedure queues for the frame loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowEvent {
    KeyDown(u8),
    KeyUp(u8),
    Resized(u32, u32),
}

/// Top-left corner that centers a window on the screen, kept on screen.
pub fn centered_origin(screen_size: (i32, i32), window_size: (i32, i32)) -> (i32, i32) {
    (
        (screen_size.0 / 2 - window_size.0 / 2).max(0),
        (screen_size.1 / 2 - window_size.1 / 2).max(0),
    )
}

/// Splits an `LPARAM` into its low and high words.
pub fn split_lparam(lparam: isize) -> (u32, u32) {
    ((lparam & 0xffff) as u32, ((lparam >> 16) & 0xffff) as u32)
}

/// New back-buffer size, or `None` when a resize would be pointless
/// (minimized window or unchanged client area).
pub fn resize_target(current: (u32, u32), requested: (u32, u32)) -> Option<(u32, u32)> {
    if requested.0 == 0 || requested.1 == 0 || requested == current {
        None
    } else {
        Some(requested)
    }
}

/// Wall-clock time between frames.
#[derive(Debug)]
pub struct FrameTimer {
    last: Instant,
    total: Duration,
    frame_count: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            last: start,
            total: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Seconds since the previous tick.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last);
        self.last = now;
        self.total += delta;
        self.frame_count += 1;
        delta.as_secs_f32()
    }

    pub fn total_seconds(&self) -> f32 {
        self.total.as_secs_f32()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
