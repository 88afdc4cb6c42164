//! Module: led
//!
//! Purpose: Triangle-wave LED brightness ramp, dithered by the sample loop.
//!
//! While a clip plays the LED breathes: a step counter climbs from 0 to
//! `steps` and back down, advancing once every `step_time` samples. Within
//! each sample the LED is switched on when `samples_remaining % steps` is
//! below the current step; the sample loop itself acts as a crude software
//! PWM carrier, so brightness tracks the step counter without a second
//! hardware timer.
//!
//! Pure logic, no I/O: the playback engine applies the returned level to the
//! physical pin.

/// Triangle-wave brightness ramp state.
///
/// `step` stays in `0..=steps`; direction flips at both extremes, giving a
/// full period of `2 * steps * step_time` samples.
#[derive(Clone, Copy, Debug)]
pub struct LedRamp {
    steps: u16,
    step_time: u32,
    step: u16,
    falling: bool,
}

impl LedRamp {
    /// New ramp starting dark and rising.
    pub const fn new(steps: u16, step_time: u32) -> Self {
        Self {
            steps,
            step_time,
            step: 0,
            falling: false,
        }
    }

    /// Current step counter value.
    pub fn step(&self) -> u16 {
        self.step
    }

    /// True while the ramp is on its falling half.
    pub fn is_falling(&self) -> bool {
        self.falling
    }

    /// Advance for one sample and return the LED level for that sample.
    ///
    /// `samples_remaining` is the playback cursor *before* it is
    /// decremented for this sample; the step counter advances whenever it
    /// hits a multiple of `step_time`.
    pub fn tick(&mut self, samples_remaining: u32) -> bool {
        if samples_remaining % self.step_time == 0 {
            self.advance();
        }
        (samples_remaining % self.steps as u32) < self.step as u32
    }

    fn advance(&mut self) {
        if self.falling {
            self.step -= 1;
            if self.step == 0 {
                self.falling = false;
            }
        } else {
            self.step += 1;
            if self.step == self.steps {
                self.falling = true;
            }
        }
    }
}
