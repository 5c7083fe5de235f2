//! Debounced usage accounting.

/// Converts elapsed media time readings into whole-second usage charges.
///
/// A charge is only due once at least `threshold_secs` of media time has
/// passed since the last accounted mark. Fractions are carried over to the
/// next charge. A reading that goes backwards rebases the mark without
/// charging.
#[derive(Debug, Clone)]
pub struct UsageMeter {
    threshold_secs: u64,
    mark: f64,
    charged_secs: u64,
}

impl UsageMeter {
    pub fn new(threshold_secs: u64) -> Self {
        Self {
            threshold_secs: threshold_secs.max(1),
            mark: 0.0,
            charged_secs: 0,
        }
    }

    /// Whole seconds to charge for a reading, if the threshold is crossed.
    ///
    /// Does not advance the mark; call [`UsageMeter::commit`] once the
    /// charge has been recorded.
    pub fn due(&mut self, elapsed_secs: f64) -> Option<u64> {
        if !elapsed_secs.is_finite() {
            return None;
        }
        if elapsed_secs < self.mark {
            self.mark = elapsed_secs.max(0.0);
            return None;
        }

        let delta = (elapsed_secs - self.mark).floor() as u64;
        (delta >= self.threshold_secs).then_some(delta)
    }

    /// Advance the mark by a recorded charge.
    pub fn commit(&mut self, charged_secs: u64) {
        self.mark += charged_secs as f64;
        self.charged_secs += charged_secs;
    }

    /// Media seconds charged so far.
    pub fn charged_secs(&self) -> u64 {
        self.charged_secs
    }

    pub fn threshold_secs(&self) -> u64 {
        self.threshold_secs
    }
}
