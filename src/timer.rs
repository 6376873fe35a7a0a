/// Elapsed-time tracker over a free-running millisecond clock.
///
/// The clock is a wrapping `u32`, so elapsed times stay correct across the
/// ~49 day rollover as long as a single interval is shorter than that.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stopwatch {
    started_ms: u32,
}

impl Stopwatch {
    pub const fn started_at(now_ms: u32) -> Self {
        Self { started_ms: now_ms }
    }

    pub fn reset(&mut self, now_ms: u32) {
        self.started_ms = now_ms;
    }

    pub fn elapsed_ms(&self, now_ms: u32) -> u32 {
        now_ms.wrapping_sub(self.started_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_survives_clock_wraparound() {
        let sw = Stopwatch::started_at(u32::MAX - 10);
        assert_eq!(sw.elapsed_ms(20), 31);
    }

    #[test]
    fn reset_restarts_the_interval() {
        let mut sw = Stopwatch::started_at(0);
        assert_eq!(sw.elapsed_ms(500), 500);
        sw.reset(400);
        assert_eq!(sw.elapsed_ms(500), 100);
    }
}
