// Indicator patterns selected by the supervisor. Each pattern is a looping
// sequence of alternating on/off segments, starting with an on segment.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicatorPattern {
    /// `*___________________`
    Off,
    /// `*************_*_*_*_`
    Charging,
    /// `********************`
    Steady,
    /// `*******************_`
    WatchdogEnabled,
    /// `*_*_*_*_____________`
    Depleting,
    /// `****____`
    Shutdown,
    /// `*_`
    Fault,
    Sleep,
}

const OFF: &[u16] = &[50, 950];
const CHARGING: &[u16] = &[650, 50, 50, 50, 50, 50, 50, 50];
const STEADY: &[u16] = &[1000, 0];
const WATCHDOG_ENABLED: &[u16] = &[950, 50];
const DEPLETING: &[u16] = &[50, 50, 50, 50, 50, 50, 50, 650];
const SHUTDOWN: &[u16] = &[200, 200];
const FAULT: &[u16] = &[50, 50];

impl IndicatorPattern {
    /// On/off segment durations in milliseconds.
    pub fn segments(self) -> &'static [u16] {
        match self {
            IndicatorPattern::Off | IndicatorPattern::Sleep => OFF,
            IndicatorPattern::Charging => CHARGING,
            IndicatorPattern::Steady => STEADY,
            IndicatorPattern::WatchdogEnabled => WATCHDOG_ENABLED,
            IndicatorPattern::Depleting => DEPLETING,
            IndicatorPattern::Shutdown => SHUTDOWN,
            IndicatorPattern::Fault => FAULT,
        }
    }

    pub fn period_ms(self) -> u32 {
        self.segments().iter().map(|&s| u32::from(s)).sum()
    }

    /// Whether the indicator is lit `t_ms` after the pattern was selected.
    pub fn is_lit_at(self, t_ms: u32) -> bool {
        let period = self.period_ms();
        if period == 0 {
            return false;
        }
        let mut t = t_ms % period;
        for (i, &segment) in self.segments().iter().enumerate() {
            let segment = u32::from(segment);
            if t < segment {
                return i % 2 == 0;
            }
            t -= segment;
        }
        false
    }
}
