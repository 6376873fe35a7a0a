use shrpi_supervisor::config::{VSCAP_MAX_VALUE, volts_to_code};
use shrpi_supervisor::led_patterns::IndicatorPattern;
use smart_leds::RGB8;
use smart_leds::colors::*;

use crate::config::{BAR_EMPTY_VOLTAGE, BAR_FULL_VOLTAGE, NUM_LEDS};

const BAR_EMPTY_CODE: u16 = volts_to_code(BAR_EMPTY_VOLTAGE, VSCAP_MAX_VALUE);
const BAR_FULL_CODE: u16 = volts_to_code(BAR_FULL_VOLTAGE, VSCAP_MAX_VALUE);

// Provide colors for the indicator patterns

fn pattern_color(pattern: IndicatorPattern) -> RGB8 {
    match pattern {
        IndicatorPattern::Off => RED,
        IndicatorPattern::Charging => ORANGE,
        IndicatorPattern::Steady => GREEN,
        IndicatorPattern::WatchdogEnabled => CYAN,
        IndicatorPattern::Depleting => YELLOW,
        IndicatorPattern::Shutdown => PURPLE,
        IndicatorPattern::Fault => RED,
        IndicatorPattern::Sleep => BLUE,
    }
}

fn scale(color: RGB8, num: u32, den: u32) -> RGB8 {
    RGB8 {
        r: (u32::from(color.r) * num / den) as u8,
        g: (u32::from(color.g) * num / den) as u8,
        b: (u32::from(color.b) * num / den) as u8,
    }
}

/// Fill `leds` with a supercap charge bar in the pattern's color. The last
/// lit LED is dimmed in proportion to its partial charge.
pub fn supercap_bar(color: RGB8, supercap: u16, leds: &mut [RGB8; NUM_LEDS]) {
    let span = u32::from(BAR_FULL_CODE - BAR_EMPTY_CODE);
    let level = u32::from(supercap.clamp(BAR_EMPTY_CODE, BAR_FULL_CODE) - BAR_EMPTY_CODE);
    let filled = level * NUM_LEDS as u32;

    for (i, led) in leds.iter_mut().enumerate() {
        let low = i as u32 * span;
        let high = low + span;
        *led = if filled >= high {
            color
        } else if filled > low {
            scale(color, filled - low, span)
        } else {
            RGB8::default()
        };
    }
}

/// Render one frame of `pattern`, `t_ms` after it was selected.
pub fn render(pattern: IndicatorPattern, t_ms: u32, supercap: u16, leds: &mut [RGB8; NUM_LEDS]) {
    if !pattern.is_lit_at(t_ms) {
        leds.fill(RGB8::default());
        return;
    }

    match pattern {
        // Off and sleep flash a single LED, leaving the bar dark.
        IndicatorPattern::Off | IndicatorPattern::Sleep => {
            leds.fill(RGB8::default());
            leds[NUM_LEDS - 1] = pattern_color(pattern);
        }
        IndicatorPattern::Fault => leds.fill(pattern_color(pattern)),
        _ => supercap_bar(pattern_color(pattern), supercap, leds),
    }
}
