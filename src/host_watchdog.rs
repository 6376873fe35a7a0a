use crate::shared::SharedState;
use crate::timer::Stopwatch;

// Host heartbeat watchdog. Any bus transaction counts as a ping; if the
// limit is nonzero and no ping arrives within it, the supervisor takes the
// reboot path.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HostWatchdog {
    limit_ms: u16,
    since_ping: Stopwatch,
    limit_changed: bool,
}

impl HostWatchdog {
    pub const fn new(now_ms: u32) -> Self {
        Self {
            limit_ms: 0,
            since_ping: Stopwatch::started_at(now_ms),
            limit_changed: false,
        }
    }

    pub fn limit_ms(&self) -> u16 {
        self.limit_ms
    }

    pub fn is_armed(&self) -> bool {
        self.limit_ms > 0
    }

    pub fn elapsed_ms(&self, now_ms: u32) -> u32 {
        self.since_ping.elapsed_ms(now_ms)
    }

    pub fn is_expired(&self, now_ms: u32) -> bool {
        self.is_armed() && self.elapsed_ms(now_ms) > u32::from(self.limit_ms)
    }

    pub fn feed(&mut self, now_ms: u32) {
        self.since_ping.reset(now_ms);
    }

    /// Apply a limit requested by the host. Flags the change so the
    /// indicator pattern can follow it.
    pub fn set_limit(&mut self, limit_ms: u16) {
        self.limit_ms = limit_ms;
        self.limit_changed = true;
    }

    /// Disarm without notifying; used on entry to the shutdown and reboot
    /// paths.
    pub fn disable(&mut self) {
        self.limit_ms = 0;
    }

    pub fn limit_changed(&self) -> bool {
        self.limit_changed
    }

    pub fn clear_limit_changed(&mut self) {
        self.limit_changed = false;
    }

    /// Consume the heartbeat left by the bus handler. A pending limit is
    /// only applied together with a heartbeat, since every write that posts
    /// one also raises it.
    pub fn service(&mut self, shared: &SharedState, now_ms: u32) {
        if !shared.watchdog_reset.take() {
            return;
        }
        if let Some(limit) = shared.pending_watchdog_limit.take() {
            debug!("Host watchdog limit set to {} ms", limit);
            self.set_limit(limit);
        }
        self.feed(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarmed_watchdog_never_expires() {
        let wd = HostWatchdog::new(0);
        assert!(!wd.is_expired(1_000_000));
    }

    #[test]
    fn expiry_is_strictly_after_the_limit() {
        let mut wd = HostWatchdog::new(0);
        wd.set_limit(500);
        assert!(!wd.is_expired(500));
        assert!(wd.is_expired(501));
    }

    #[test]
    fn heartbeat_feeds_and_applies_pending_limit() {
        let shared = SharedState::new();
        let mut wd = HostWatchdog::new(0);

        shared.pending_watchdog_limit.post(2000);
        wd.service(&shared, 100);
        // no heartbeat yet, nothing applied
        assert_eq!(wd.limit_ms(), 0);

        shared.watchdog_reset.raise();
        wd.service(&shared, 150);
        assert_eq!(wd.limit_ms(), 2000);
        assert!(wd.limit_changed());
        assert_eq!(wd.elapsed_ms(150), 0);
        assert!(!shared.pending_watchdog_limit.is_pending());
    }

    #[test]
    fn disable_does_not_flag_a_change() {
        let mut wd = HostWatchdog::new(0);
        wd.set_limit(100);
        wd.clear_limit_changed();
        wd.disable();
        assert!(!wd.is_armed());
        assert!(!wd.limit_changed());
    }
}
