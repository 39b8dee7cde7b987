//! Oscillators (OSC0, OSC1, OSC32)
// See Chapter 10 (Power Manager) in the AT32UC3A datasheet for more details

use core::convert::Infallible;
use core::marker::PhantomData;

use nb::Error::WouldBlock;

use crate::pm::{self, RegisterBlock};
use crate::typelevel::Sealed;

/// State of an oscillator (typestate trait)
pub trait State: Sealed {}

/// Oscillator is disabled (typestate)
pub struct Disabled;

/// Oscillator is enabled and counting down its startup time (typestate)
pub struct Enabled;

/// Oscillator is stable (typestate)
pub struct Stable;

impl State for Disabled {}
impl Sealed for Disabled {}
impl State for Enabled {}
impl Sealed for Enabled {}
impl State for Stable {}
impl Sealed for Stable {}

/// The physical oscillator slots of the UC3A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OscillatorId {
    /// Main oscillator 0, the usual reference for PLL0
    Osc0,
    /// Main oscillator 1
    Osc1,
    /// 32 kHz oscillator on the dedicated low-frequency pads
    Osc32,
}

/// Oscillator operating mode.
///
/// The crystal gain steps cover increasing crystal frequency ranges; the
/// 32 kHz slot has its own crystal mode and rejects the gain steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OscillatorMode {
    /// External clock signal on XIN, crystal pads bypassed
    ExternalClock,
    /// Crystal, gain G0 (0.4 .. 0.9 MHz)
    CrystalG0,
    /// Crystal, gain G1 (0.9 .. 3.0 MHz)
    CrystalG1,
    /// Crystal, gain G2 (3.0 .. 8.0 MHz)
    CrystalG2,
    /// Crystal, gain G3 (above 8.0 MHz)
    CrystalG3,
    /// 32 kHz crystal, only valid on [`OscillatorId::Osc32`]
    Crystal32,
}

impl OscillatorMode {
    fn bits(self) -> u32 {
        match self {
            OscillatorMode::ExternalClock => 0,
            OscillatorMode::CrystalG0 => 1,
            OscillatorMode::CrystalG1 => 2,
            OscillatorMode::CrystalG2 => 3,
            OscillatorMode::CrystalG3 => 4,
            // The 32 kHz control register encodes its crystal mode as 1.
            OscillatorMode::Crystal32 => 1,
        }
    }
}

/// Startup time before the ready flag rises, in slow-clock (RCSYS) cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartupTime {
    /// No startup wait
    Cycles0,
    /// 64 cycles, roughly 0.56 ms
    Cycles64,
    /// 128 cycles, roughly 1.1 ms
    Cycles128,
    /// 2048 cycles, roughly 18 ms
    Cycles2048,
    /// 4096 cycles, roughly 36 ms
    Cycles4096,
    /// 8192 cycles, roughly 71 ms
    Cycles8192,
    /// 16384 cycles, roughly 142 ms
    Cycles16384,
}

/// Possible errors when starting an oscillator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The oscillator is already running. A running oscillator cannot be
    /// reconfigured in place; disable it first.
    AlreadyEnabled,

    /// The requested mode is not supported on this oscillator slot.
    InvalidMode,
}

/// Blocking helper method to start an oscillator without going through all
/// the typestate steps.
pub fn setup_osc_blocking(
    osc: Oscillator<'_, Disabled>,
    mode: OscillatorMode,
    startup: StartupTime,
) -> Result<Oscillator<'_, Stable>, Error> {
    let enabled = osc.start(mode, startup)?;
    let token = nb::block!(enabled.await_stabilization()).unwrap();
    Ok(enabled.get_stable(token))
}

/// One of the chip's oscillators.
pub struct Oscillator<'a, S: State> {
    regs: &'a RegisterBlock,
    id: OscillatorId,
    state: PhantomData<S>,
}

impl<'a, S: State> Oscillator<'a, S> {
    /// Transitions the oscillator to another state.
    fn transition<To: State>(self) -> Oscillator<'a, To> {
        Oscillator {
            regs: self.regs,
            id: self.id,
            state: PhantomData,
        }
    }

    /// Which physical slot this handle controls.
    pub fn id(&self) -> OscillatorId {
        self.id
    }

    fn is_enabled(&self) -> bool {
        match self.id {
            OscillatorId::Osc0 => self.regs.mcctrl.get() & pm::mcctrl::OSC0EN != 0,
            OscillatorId::Osc1 => self.regs.mcctrl.get() & pm::mcctrl::OSC1EN != 0,
            OscillatorId::Osc32 => self.regs.oscctrl32.get() & pm::oscctrl32::OSC32EN != 0,
        }
    }
}

impl<'a> Oscillator<'a, Disabled> {
    pub(crate) fn new(regs: &'a RegisterBlock, id: OscillatorId) -> Self {
        Oscillator {
            regs,
            id,
            state: PhantomData,
        }
    }

    /// Programs mode and startup time, then sets the enable flag.
    ///
    /// Does not wait for the oscillator to become stable; follow up with
    /// [`Oscillator::await_stabilization`]. Fails with
    /// [`Error::AlreadyEnabled`] if the hardware enable flag is already set,
    /// and with [`Error::InvalidMode`] if the slot does not support the
    /// requested mode.
    pub fn start(
        self,
        mode: OscillatorMode,
        startup: StartupTime,
    ) -> Result<Oscillator<'a, Enabled>, Error> {
        if self.is_enabled() {
            return Err(Error::AlreadyEnabled);
        }
        if !mode_supported(self.id, mode) {
            return Err(Error::InvalidMode);
        }

        match self.id {
            OscillatorId::Osc0 => {
                self.regs
                    .oscctrl0
                    .set(mode.bits() | ((startup as u32) << pm::oscctrl::STARTUP_OFFSET));
                self.regs
                    .mcctrl
                    .set(self.regs.mcctrl.get() | pm::mcctrl::OSC0EN);
            }
            OscillatorId::Osc1 => {
                self.regs
                    .oscctrl1
                    .set(mode.bits() | ((startup as u32) << pm::oscctrl::STARTUP_OFFSET));
                self.regs
                    .mcctrl
                    .set(self.regs.mcctrl.get() | pm::mcctrl::OSC1EN);
            }
            OscillatorId::Osc32 => {
                self.regs.oscctrl32.set(
                    (mode.bits() << pm::oscctrl32::MODE_OFFSET)
                        | ((startup as u32) << pm::oscctrl32::STARTUP_OFFSET),
                );
                self.regs
                    .oscctrl32
                    .set(self.regs.oscctrl32.get() | pm::oscctrl32::OSC32EN);
            }
        }

        Ok(self.transition())
    }
}

fn mode_supported(id: OscillatorId, mode: OscillatorMode) -> bool {
    match id {
        OscillatorId::Osc0 | OscillatorId::Osc1 => mode != OscillatorMode::Crystal32,
        // The low-frequency slot only takes its dedicated crystal mode or an
        // external clock signal.
        OscillatorId::Osc32 => matches!(
            mode,
            OscillatorMode::Crystal32 | OscillatorMode::ExternalClock
        ),
    }
}

/// A token that's given when the oscillator is stable, and can be exchanged
/// to proceed to the next state.
pub struct StableOscillatorToken {
    _private: (),
}

impl<'a> Oscillator<'a, Enabled> {
    /// Polls the slot's ready flag. There is no timeout in hardware; a
    /// crystal that never starts leaves this returning `WouldBlock` forever,
    /// so pair `nb::block!` with an external watchdog where that matters.
    pub fn await_stabilization(&self) -> nb::Result<StableOscillatorToken, Infallible> {
        let ready = match self.id {
            OscillatorId::Osc0 => pm::isr::OSC0RDY,
            OscillatorId::Osc1 => pm::isr::OSC1RDY,
            OscillatorId::Osc32 => pm::isr::OSC32RDY,
        };
        if self.regs.isr.get() & ready == 0 {
            return Err(WouldBlock);
        }

        Ok(StableOscillatorToken { _private: () })
    }

    /// Returns the stabilized oscillator
    pub fn get_stable(self, _token: StableOscillatorToken) -> Oscillator<'a, Stable> {
        self.transition()
    }
}

impl<'a> Oscillator<'a, Stable> {
    /// Disables the oscillator by clearing its enable flag.
    pub fn disable(self) -> Oscillator<'a, Disabled> {
        match self.id {
            OscillatorId::Osc0 => self
                .regs
                .mcctrl
                .set(self.regs.mcctrl.get() & !pm::mcctrl::OSC0EN),
            OscillatorId::Osc1 => self
                .regs
                .mcctrl
                .set(self.regs.mcctrl.get() & !pm::mcctrl::OSC1EN),
            OscillatorId::Osc32 => self
                .regs
                .oscctrl32
                .set(self.regs.oscctrl32.get() & !pm::oscctrl32::OSC32EN),
        }

        self.transition()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pm::RegisterBlock;

    #[test]
    fn start_programs_mode_startup_and_enable() {
        let regs = RegisterBlock::new();
        let osc = Oscillator::new(&regs, OscillatorId::Osc0);

        osc.start(OscillatorMode::CrystalG3, StartupTime::Cycles2048)
            .unwrap();

        assert_eq!(regs.oscctrl0.get(), 4 | (3 << 8));
        assert_ne!(regs.mcctrl.get() & pm::mcctrl::OSC0EN, 0);
    }

    #[test]
    fn second_start_fails_while_enabled() {
        let regs = RegisterBlock::new();
        Oscillator::new(&regs, OscillatorId::Osc0)
            .start(OscillatorMode::ExternalClock, StartupTime::Cycles8192)
            .unwrap();

        let err = Oscillator::new(&regs, OscillatorId::Osc0)
            .start(OscillatorMode::ExternalClock, StartupTime::Cycles0)
            .err();
        assert_eq!(err, Some(Error::AlreadyEnabled));
    }

    #[test]
    fn main_slots_reject_the_32k_crystal_mode() {
        let regs = RegisterBlock::new();
        for id in [OscillatorId::Osc0, OscillatorId::Osc1] {
            let err = Oscillator::new(&regs, id)
                .start(OscillatorMode::Crystal32, StartupTime::Cycles0)
                .err();
            assert_eq!(err, Some(Error::InvalidMode));
        }
        assert_eq!(regs.mcctrl.get(), 0);
    }

    #[test]
    fn gain_modes_rejected_on_the_32k_slot() {
        let regs = RegisterBlock::new();
        let err = Oscillator::new(&regs, OscillatorId::Osc32)
            .start(OscillatorMode::CrystalG1, StartupTime::Cycles0)
            .err();
        assert_eq!(err, Some(Error::InvalidMode));
        assert_eq!(regs.oscctrl32.get(), 0);
    }

    #[test]
    fn await_stabilization_blocks_until_the_ready_flag() {
        let regs = RegisterBlock::new();
        let osc = Oscillator::new(&regs, OscillatorId::Osc1)
            .start(OscillatorMode::CrystalG2, StartupTime::Cycles64)
            .unwrap();

        assert!(osc.await_stabilization().is_err());

        regs.isr.set(pm::isr::OSC1RDY);
        assert!(osc.await_stabilization().is_ok());
    }

    #[test]
    fn osc32_lifecycle_round_trip() {
        let regs = RegisterBlock::new();
        regs.isr.set(pm::isr::OSC32RDY);

        let osc = setup_osc_blocking(
            Oscillator::new(&regs, OscillatorId::Osc32),
            OscillatorMode::Crystal32,
            StartupTime::Cycles128,
        )
        .unwrap();
        assert_ne!(regs.oscctrl32.get() & pm::oscctrl32::OSC32EN, 0);
        assert_eq!(
            regs.oscctrl32.get() & pm::oscctrl32::MODE_MASK,
            1 << pm::oscctrl32::MODE_OFFSET
        );
        assert_eq!(
            regs.oscctrl32.get() & pm::oscctrl32::STARTUP_MASK,
            2 << pm::oscctrl32::STARTUP_OFFSET
        );

        osc.disable();
        assert_eq!(regs.oscctrl32.get() & pm::oscctrl32::OSC32EN, 0);
    }
}
