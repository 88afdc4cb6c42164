//! Module: hal
//!
//! Purpose: Peripheral capability traits for the parts of the board that
//! `embedded-hal` does not model.
//!
//! The shared SPI bus, chip-select and LED pins, the UART and the settle
//! delay all go through the standard `embedded-hal` / `embedded-io` traits.
//! What remains is chip-specific timer plumbing: the PWM carrier whose duty
//! compare register takes the raw sample byte, the free-running sample timer
//! whose overflow flag paces the playback loop, and the deep-sleep/button
//! wake primitive. Business logic stays in the core modules; implementations
//! of these traits are just register I/O (or the simulated board in tests).
//!
//! All three traits are infallible: they model direct register access, which
//! cannot fail by construction.

/// PWM carrier timer driving the speaker pin.
///
/// The carrier free-runs with a rollover of [`crate::config::PWM_ROLLOVER`]
/// counts; the compare register holds the current 8-bit sample, so duty
/// cycle tracks the sample value directly. While stopped (period zero) the
/// counter halts and the output is quiet.
pub trait PwmCarrier {
    /// Clear and start the carrier counter.
    fn start(&mut self);

    /// Halt the carrier counter (period to zero). No output while stopped.
    fn stop(&mut self);

    /// Write one sample to the duty compare register. Takes effect on the
    /// next carrier rollover; never blocks.
    fn set_sample(&mut self, sample: u8);
}

/// Free-running sample-rate timer.
///
/// Rolls over once per sample period ([`crate::config::SAMPLE_CYCLES`]
/// clock cycles) and latches an overflow flag. The playback loop performs a
/// busy-wait rendezvous on that flag once per sample.
pub trait SampleTimer {
    /// Clear and start the timer. The first tick completes one full period
    /// after this call.
    fn start(&mut self);

    /// Halt the timer and clear any pending overflow.
    fn stop(&mut self);

    /// Block until the overflow flag sets, then clear it. Bounded by one
    /// sample period when the timer is running.
    fn wait_tick(&mut self);
}

/// Deep-sleep idle with button-edge wake.
///
/// Implementations park the processor in its lowest-power state with the
/// button interrupt enabled. The interrupt handler does nothing except
/// cancel the sleep on return (it must not touch shared data or perform
/// I/O), so returning from this call *is* the wake signal.
pub trait WakeButton {
    /// Sleep until the button edge fires. Unbounded: the device sits idle
    /// until pressed.
    fn sleep_until_pressed(&mut self);
}
