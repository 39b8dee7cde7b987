//! Phase-Locked Loops (PLL0, PLL1)
// See Chapter 10 (Power Manager) in the AT32UC3A datasheet for more details

use core::convert::Infallible;
use core::marker::PhantomData;

use nb::Error::WouldBlock;
use vcell::VolatileCell;

use crate::pm::{self, RegisterBlock};
use crate::typelevel::Sealed;

/// Value programmed into PLLCOUNT: lock-detection wait in slow-clock cycles.
const PLLCOUNT_DEFAULT: u32 = 63;

/// State of a PLL (typestate trait)
pub trait State: Sealed {}

/// PLL is disabled (typestate)
pub struct Disabled;

/// PLL is configured but not yet enabled (typestate)
pub struct Configured;

/// PLL is enabled and locking onto its target frequency (typestate)
pub struct Locking;

/// PLL is locked: it delivers a steady multiplied frequency (typestate)
pub struct Locked;

impl State for Disabled {}
impl Sealed for Disabled {}
impl State for Configured {}
impl Sealed for Configured {}
impl State for Locking {}
impl Sealed for Locking {}
impl State for Locked {}
impl Sealed for Locked {}

/// The two PLL instances of the UC3A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllId {
    /// PLL0, the instance the master clock can be sourced from
    Pll0,
    /// PLL1, typically used for the USB generic clock
    Pll1,
}

/// Reference oscillator feeding a PLL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllSource {
    /// Main oscillator 0
    Osc0,
    /// Main oscillator 1
    Osc1,
}

/// Parameters for a PLL.
///
/// With a nonzero divider the output is `f_src * multiplier / divider`;
/// with a zero divider the VCO runs undivided and the output is
/// `f_src * 2 * multiplier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllConfig {
    /// Reference oscillator
    pub source: PllSource,

    /// Frequency multiplier, valid range 3..=16
    pub multiplier: u8,

    /// Frequency divider. Only the low 4 bits reach the hardware; higher
    /// bits are masked off, not rejected.
    pub divider: u8,

    /// Selects the high-frequency VCO range option bits
    pub high_frequency: bool,
}

/// Common configs for a 12 MHz crystal on OSC0, the arrangement the UC3A
/// evaluation boards use.
pub mod common_configs {
    use super::{PllConfig, PllSource};

    /// 96 MHz. A generic clock dividing this by 2 gives the 48 MHz that the
    /// USBB interface wants.
    pub const PLL_OSC0_96MHZ: PllConfig = PllConfig {
        source: PllSource::Osc0,
        multiplier: 8,
        divider: 1,
        high_frequency: false,
    };

    /// 66 MHz, the maximum rated CPU clock of the UC3A.
    pub const PLL_OSC0_66MHZ: PllConfig = PllConfig {
        source: PllSource::Osc0,
        multiplier: 11,
        divider: 2,
        high_frequency: false,
    };
}

/// Possible errors when configuring a PLL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Multiplier is outside 3..=16. The datasheet's frequency equation
    /// carries a `(PLLMUL + 1)` term; the multiplier here includes that
    /// `+ 1`, so the effective minimum of 2 maps to an argument of 3.
    InvalidMultiplier,
}

/// Blocking helper method to setup a PLL without going through all the
/// typestate steps.
pub fn setup_pll_blocking(
    pll: PhaseLockedLoop<'_, Disabled>,
    config: PllConfig,
    divide_by_2: bool,
) -> Result<PhaseLockedLoop<'_, Locked>, Error> {
    let locking = pll.configure(config)?.enable(divide_by_2);
    let token = nb::block!(locking.await_lock()).unwrap();
    Ok(locking.get_locked(token))
}

/// A PLL.
pub struct PhaseLockedLoop<'a, S: State> {
    regs: &'a RegisterBlock,
    id: PllId,
    state: PhantomData<S>,
}

impl<'a, S: State> PhaseLockedLoop<'a, S> {
    /// Transitions the PLL to another state.
    fn transition<To: State>(self) -> PhaseLockedLoop<'a, To> {
        PhaseLockedLoop {
            regs: self.regs,
            id: self.id,
            state: PhantomData,
        }
    }

    /// Which PLL instance this handle controls.
    pub fn id(&self) -> PllId {
        self.id
    }

    fn reg(&self) -> &VolatileCell<u32> {
        match self.id {
            PllId::Pll0 => &self.regs.pll[0],
            PllId::Pll1 => &self.regs.pll[1],
        }
    }
}

impl<'a> PhaseLockedLoop<'a, Disabled> {
    pub(crate) fn new(regs: &'a RegisterBlock, id: PllId) -> Self {
        PhaseLockedLoop {
            regs,
            id,
            state: PhantomData,
        }
    }

    /// Programs multiplier, divider, source and option bits. The test and
    /// bias fields are written to their disabled defaults and the lock
    /// counter to a fixed constant. The PLL is left disabled.
    pub fn configure(self, config: PllConfig) -> Result<PhaseLockedLoop<'a, Configured>, Error> {
        if !(3..=16).contains(&config.multiplier) {
            return Err(Error::InvalidMultiplier);
        }

        let opt: u32 = if config.high_frequency { 0b001 } else { 0b101 };
        let source = match config.source {
            PllSource::Osc0 => 0,
            PllSource::Osc1 => pm::pll::PLLOSC,
        };

        // Single full-register write: PLLEN and the test bits end up zero,
        // PLLMUL takes multiplier - 1 to match the frequency equation.
        self.reg().set(
            (PLLCOUNT_DEFAULT << pm::pll::PLLCOUNT_OFFSET)
                | (u32::from(config.multiplier - 1) << pm::pll::PLLMUL_OFFSET)
                | ((u32::from(config.divider) & 0xf) << pm::pll::PLLDIV_OFFSET)
                | (opt << pm::pll::PLLOPT_OFFSET)
                | source,
        );

        Ok(self.transition())
    }
}

impl<'a> PhaseLockedLoop<'a, Configured> {
    /// Sets or clears the output divide-by-2 option, then enables the PLL.
    /// The PLL starts locking; follow up with
    /// [`PhaseLockedLoop::await_lock`].
    pub fn enable(self, divide_by_2: bool) -> PhaseLockedLoop<'a, Locking> {
        let reg = self.reg();
        let mut value = reg.get();
        if divide_by_2 {
            value |= pm::pll::PLLOPT_DIV2;
        } else {
            value &= !pm::pll::PLLOPT_DIV2;
        }
        reg.set(value);
        reg.set(value | pm::pll::PLLEN);

        self.transition()
    }
}

/// A token that's given when the PLL is properly locked, so we can safely
/// transition to the next state.
pub struct LockedPllToken {
    _private: (),
}

impl<'a> PhaseLockedLoop<'a, Locking> {
    /// Polls the instance's lock flag. No timeout in hardware; a PLL that
    /// never locks leaves this returning `WouldBlock` forever.
    pub fn await_lock(&self) -> nb::Result<LockedPllToken, Infallible> {
        let lock = match self.id {
            PllId::Pll0 => pm::isr::LOCK0,
            PllId::Pll1 => pm::isr::LOCK1,
        };
        if self.regs.isr.get() & lock == 0 {
            return Err(WouldBlock);
        }

        Ok(LockedPllToken { _private: () })
    }

    /// Exchanges a token for a locked PLL.
    pub fn get_locked(self, _token: LockedPllToken) -> PhaseLockedLoop<'a, Locked> {
        self.transition()
    }
}

impl<'a> PhaseLockedLoop<'a, Locked> {
    /// Disables the PLL by clearing its enable bit.
    pub fn disable(self) -> PhaseLockedLoop<'a, Disabled> {
        let reg = self.reg();
        reg.set(reg.get() & !pm::pll::PLLEN);

        self.transition()
    }
}
