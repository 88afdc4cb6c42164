//! Module: player
//!
//! Purpose: The playback engine: trigger wait, sample streaming, track
//! advance.
//!
//! One hardware thread, two free-running timers. The sample timer rolls
//! over at 8 kHz and its overflow flag is the per-sample rendezvous; the
//! PWM carrier rolls over every 256 counts and its compare register carries
//! the current sample. Each loop iteration fetches exactly one byte from
//! the EEPROM stream, writes the duty register, updates the LED, then
//! blocks on the tick, so the byte for tick k is always EEPROM position k
//! of the track, and the duty register is never stale across a tick
//! boundary.
//!
//! There is no cancellation: once streaming starts it runs to the end of
//! the track. The button only matters while idle, where the processor
//! deep-sleeps until the edge interrupt cancels the sleep.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::config::{LED_STEPS, LED_STEP_TIME, SETTLE_MS, STARTUP_DELAY_MS};
use crate::eeprom::{Eeprom, EepromError};
use crate::hal::{PwmCarrier, SampleTimer, WakeButton};
use crate::led::LedRamp;
use crate::track::Track;

/// Where the engine is in its cycle. Observable for diagnostics and tests;
/// transitions happen only inside [`Player::play_next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    /// Deep sleep, waiting for the button edge.
    Idle,
    /// Woken; about to position the EEPROM read cursor and start timers.
    Armed,
    /// One sample per tick is flowing to the duty register.
    Streaming,
    /// Track finished; counters stopped, index advanced, settling.
    Done,
}

/// Playback failures. The streaming path has no error conditions of its
/// own; these only surface a failed bus or pin access underneath.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerError<SpiE, PinE, LedE> {
    /// EEPROM access failed.
    Eeprom(EepromError<SpiE, PinE>),
    /// LED pin write failed.
    Led(LedE),
}

impl<SpiE, PinE, LedE> From<EepromError<SpiE, PinE>> for PlayerError<SpiE, PinE, LedE> {
    fn from(e: EepromError<SpiE, PinE>) -> Self {
        PlayerError::Eeprom(e)
    }
}

/// Every peripheral the engine touches, owned in one place.
///
/// No singletons: whoever builds the board decides whether these are real
/// registers or the simulated set, and the engine cannot reach hardware any
/// other way.
pub struct Board<SPI, CS, PWM, TMR, LED, BTN, DLY> {
    /// Sample storage on the shared SPI bus.
    pub eeprom: Eeprom<SPI, CS>,
    /// PWM carrier driving the speaker.
    pub pwm: PWM,
    /// 8 kHz sample timer.
    pub timer: TMR,
    /// Status LED pin.
    pub led: LED,
    /// Deep-sleep / button-edge wake.
    pub wake: BTN,
    /// Millisecond delay source (settle interval, EEPROM busy polls).
    pub delay: DLY,
}

impl<SPI, CS, PWM, TMR, LED, BTN, DLY> Board<SPI, CS, PWM, TMR, LED, BTN, DLY>
where
    LED: OutputPin,
    DLY: DelayNs,
{
    /// Power-up sequence: light the LED, then hold through the startup
    /// settle delay before anything touches the bus.
    pub fn power_on(&mut self) -> Result<(), LED::Error> {
        self.led.set_high()?;
        self.delay.delay_ms(STARTUP_DELAY_MS);
        Ok(())
    }
}

/// The playback engine.
pub struct Player<'t, SPI, CS, PWM, TMR, LED, BTN, DLY> {
    board: Board<SPI, CS, PWM, TMR, LED, BTN, DLY>,
    tracks: &'t [Track],
    index: usize,
    state: PlayerState,
}

impl<'t, SPI, CS, PWM, TMR, LED, BTN, DLY> Player<'t, SPI, CS, PWM, TMR, LED, BTN, DLY>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    PWM: PwmCarrier,
    TMR: SampleTimer,
    LED: OutputPin,
    BTN: WakeButton,
    DLY: DelayNs,
{
    /// New engine starting at track 0.
    ///
    /// Panics on an empty track table: the index wrap has no sensible
    /// meaning with nothing to play.
    pub fn new(board: Board<SPI, CS, PWM, TMR, LED, BTN, DLY>, tracks: &'t [Track]) -> Self {
        assert!(!tracks.is_empty(), "track table must not be empty");
        Self {
            board,
            tracks,
            index: 0,
            state: PlayerState::Idle,
        }
    }

    /// Track index the next play will use.
    pub fn track_index(&self) -> usize {
        self.index
    }

    /// Current engine state.
    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Tear down and hand the peripherals back.
    pub fn release(self) -> Board<SPI, CS, PWM, TMR, LED, BTN, DLY> {
        self.board
    }

    /// One full cycle: sleep until the button fires, stream the current
    /// track, advance the index (wrapping), settle.
    pub fn play_next(
        &mut self,
    ) -> Result<(), PlayerError<SPI::Error, CS::Error, LED::Error>> {
        let Self {
            board,
            tracks,
            index,
            state,
        } = self;
        let Board {
            eeprom,
            pwm,
            timer,
            led,
            wake,
            delay,
        } = board;

        *state = PlayerState::Idle;
        wake.sleep_until_pressed();
        *state = PlayerState::Armed;

        let track = tracks[*index];
        let mut remaining = track.samples;
        let mut ramp = LedRamp::new(LED_STEPS, LED_STEP_TIME);

        // Position the device's read pointer once; it auto-increments for
        // the rest of the track under a single chip-select bracket.
        let mut stream = eeprom.begin_read(track.start)?;
        timer.start();
        pwm.start();
        *state = PlayerState::Streaming;

        while remaining > 0 {
            let sample = stream.next().map_err(PlayerError::Eeprom)?;
            pwm.set_sample(sample);

            if ramp.tick(remaining) {
                led.set_high().map_err(PlayerError::Led)?;
            } else {
                led.set_low().map_err(PlayerError::Led)?;
            }

            timer.wait_tick();
            remaining -= 1;
        }

        pwm.stop();
        timer.stop();
        drop(stream); // deassert chip select
        led.set_high().map_err(PlayerError::Led)?;
        *state = PlayerState::Done;

        *index = (*index + 1) % tracks.len();
        delay.delay_ms(SETTLE_MS);
        Ok(())
    }

    /// The forever loop. Only a failed bus or pin access ever returns.
    pub fn run(
        &mut self,
    ) -> Result<core::convert::Infallible, PlayerError<SPI::Error, CS::Error, LED::Error>> {
        loop {
            self.play_next()?;
        }
    }
}
