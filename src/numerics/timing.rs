use std::time::Duration;

#[cfg(feature = "timing")]
use std::cell::RefCell;

#[derive(Default, Clone, Debug)]
pub struct TimingStats {
    /// `(phase name, wall time)` in execution order.
    pub phases: Vec<(&'static str, Duration)>,
    pub total_time: Duration,
}

impl TimingStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(feature = "timing")]
    pub fn print_summary(&self) {
        if self.phases.is_empty() {
            return;
        }

        let accounted: Duration = self.phases.iter().map(|(_, d)| *d).sum();
        let overhead = self.total_time.saturating_sub(accounted);

        println!("\n{}", "=".repeat(60));
        println!("{:^60}", "SETUP TIMING SUMMARY");
        println!("{}", "=".repeat(60));
        println!(
            "Total setup time:              {:.3}s",
            self.total_time.as_secs_f64()
        );
        println!("{}", "-".repeat(60));
        println!("Phase breakdown:");
        for (name, d) in &self.phases {
            println!("  {:<26} {:>9.3}ms", name, d.as_secs_f64() * 1000.0);
        }
        println!("{}", "=".repeat(60));
        println!(
            "Overhead/Other:                {:>9.3}ms\n",
            overhead.as_secs_f64() * 1000.0
        );
    }

    #[cfg(not(feature = "timing"))]
    pub fn print_summary(&self) {}
}

#[cfg(feature = "timing")]
thread_local! {
    static TIMING_STATS: RefCell<TimingStats> = RefCell::new(TimingStats::new());
}

#[cfg(feature = "timing")]
pub fn reset_timing() {
    TIMING_STATS.with(|stats| {
        *stats.borrow_mut() = TimingStats::new();
    });
}

#[cfg(not(feature = "timing"))]
pub fn reset_timing() {}

/// Runs `f` and records its wall time under `name`.
#[cfg(feature = "timing")]
pub fn record_phase<F, R>(name: &'static str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = std::time::Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    log::debug!("{name} took {:.3}ms", elapsed.as_secs_f64() * 1000.0);
    TIMING_STATS.with(|stats| {
        stats.borrow_mut().phases.push((name, elapsed));
    });
    result
}

#[cfg(not(feature = "timing"))]
pub fn record_phase<F, R>(_name: &'static str, f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

#[cfg(feature = "timing")]
pub fn finalize_timing(total_time: Duration) -> TimingStats {
    TIMING_STATS.with(|stats| {
        let mut s = stats.borrow_mut();
        s.total_time = total_time;
        s.clone()
    })
}

#[cfg(not(feature = "timing"))]
pub fn finalize_timing(total_time: Duration) -> TimingStats {
    TimingStats {
        total_time,
        ..TimingStats::new()
    }
}
