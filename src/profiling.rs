//! Optional per-tick timing.
//!
//! Disabled by default; `set_profiling_enabled(true)` turns on timing around
//! scene ticks (`console.time` in the browser, `Instant` natively) and a
//! periodic frame-count log line.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};

static PROFILING_ENABLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    // Frame loops are single-threaded, so each thread keeps its own cadence.
    static FRAME_COUNTER: Cell<u64> = const { Cell::new(0) };
}

/// How often to log frame stats (every N frames).
const STATS_LOG_INTERVAL: u64 = 300; // ~5 seconds at 60fps

pub fn is_profiling_enabled() -> bool {
    PROFILING_ENABLED.load(Ordering::Relaxed)
}

pub fn set_profiling_enabled(enabled: bool) {
    PROFILING_ENABLED.store(enabled, Ordering::Relaxed);
    if enabled {
        log::info!("Performance profiling ENABLED");
    } else {
        log::info!("Performance profiling DISABLED");
    }
}

/// Count a frame and return true if stats should be logged for it.
pub fn should_log_stats() -> bool {
    let frame = FRAME_COUNTER.with(|c| {
        let frame = c.get();
        c.set(frame + 1);
        frame
    });
    is_profiling_enabled() && frame % STATS_LOG_INTERVAL == 0
}

/// Frames counted on this thread since the last reset.
pub fn frames_counted() -> u64 {
    FRAME_COUNTER.with(Cell::get)
}

/// Restart the stats cadence, so the next counted frame logs.
pub fn reset_frame_counter() {
    FRAME_COUNTER.with(|c| c.set(0));
}

#[cfg(target_arch = "wasm32")]
mod timing {
    use super::is_profiling_enabled;
    use web_sys::console;

    pub fn timed<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
        if is_profiling_enabled() {
            console::time_with_label(label);
            let result = f();
            console::time_end_with_label(label);
            result
        } else {
            f()
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod timing {
    use super::is_profiling_enabled;
    use std::time::Instant;

    pub fn timed<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
        if is_profiling_enabled() {
            let start = Instant::now();
            let result = f();
            log::info!("[PERF] {}: {:.2}ms", label, start.elapsed().as_secs_f64() * 1000.0);
            result
        } else {
            f()
        }
    }
}

/// Run `f`, timing it under `label` when profiling is enabled.
pub use timing::timed;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_returns_result_either_way() {
        assert_eq!(timed("noop", || 7), 7);
        set_profiling_enabled(true);
        assert_eq!(timed("noop", || 8), 8);
        set_profiling_enabled(false);
        assert!(!should_log_stats());
    }

    #[test]
    fn test_counter_resets_and_counts_per_thread() {
        reset_frame_counter();
        for _ in 0..3 {
            should_log_stats();
        }
        assert_eq!(frames_counted(), 3);
        std::thread::spawn(|| assert_eq!(frames_counted(), 0)).join().unwrap();
        reset_frame_counter();
        assert_eq!(frames_counted(), 0);
    }
}
