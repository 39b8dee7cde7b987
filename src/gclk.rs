//! Generic clocks (GCLK)
//!
//! Each generic clock channel derives a peripheral-facing clock from an
//! oscillator or PLL output, with an optional integer divider. With the
//! divider enabled the output is `f_src / (2 * divider)`; the original
//! board routed PLL1 at 96 MHz through a divide-by-1 channel to clock the
//! USBB interface at 48 MHz.
// See Chapter 10 (Power Manager) in the AT32UC3A datasheet for more details

use vcell::VolatileCell;

use crate::pm::{self, RegisterBlock};

/// The generic clock channels of the UC3A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GenericClockId {
    /// Channel 0, routed to the GCLK0 pin
    Gclk0,
    /// Channel 1, routed to the GCLK1 pin
    Gclk1,
    /// Channel 2, routed to the GCLK2 pin
    Gclk2,
    /// Channel 3, routed to the GCLK3 pin
    Gclk3,
    /// Channel 4
    Gclk4,
    /// Channel 5, feeding the USBB interface
    Gclk5,
}

/// Source selection for a generic clock channel: bit 0 picks the instance,
/// bit 1 picks PLL over oscillator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GenericClockSource {
    /// Main oscillator 0
    Osc0,
    /// Main oscillator 1
    Osc1,
    /// PLL0 output
    Pll0,
    /// PLL1 output
    Pll1,
}

impl GenericClockSource {
    fn bits(self) -> u32 {
        match self {
            GenericClockSource::Osc0 => 0,
            GenericClockSource::Osc1 => pm::gcctrl::OSCSEL,
            GenericClockSource::Pll0 => pm::gcctrl::PLLSEL,
            GenericClockSource::Pll1 => pm::gcctrl::PLLSEL | pm::gcctrl::OSCSEL,
        }
    }
}

/// Possible errors when configuring a generic clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Divider is greater than 256
    InvalidDivider,
}

/// A generic clock channel.
pub struct GenericClock<'a> {
    regs: &'a RegisterBlock,
    id: GenericClockId,
}

impl<'a> GenericClock<'a> {
    pub(crate) fn new(regs: &'a RegisterBlock, id: GenericClockId) -> Self {
        GenericClock { regs, id }
    }

    /// Which channel this handle controls.
    pub fn id(&self) -> GenericClockId {
        self.id
    }

    fn reg(&self) -> &VolatileCell<u32> {
        &self.regs.gcctrl[self.id as usize]
    }

    /// Selects the channel's source and divider.
    ///
    /// A divider of 0 bypasses the divider entirely; 1..=256 enables it
    /// with the hardware field holding `divider - 1`. The channel is taken
    /// through a confirmed-disabled phase first so a running clock cannot
    /// glitch while the source changes, and it is left disabled; call
    /// [`GenericClock::enable`] afterwards.
    pub fn configure(&mut self, source: GenericClockSource, divider: u16) -> Result<(), Error> {
        if divider > 256 {
            return Err(Error::InvalidDivider);
        }

        let reg = self.reg();
        reg.set(reg.get() & !pm::gcctrl::CEN);
        while reg.get() & pm::gcctrl::CEN != 0 {
            core::hint::spin_loop();
        }

        let mut value = reg.get()
            & !(pm::gcctrl::OSCSEL | pm::gcctrl::PLLSEL | pm::gcctrl::DIVEN | pm::gcctrl::DIV_MASK);
        value |= source.bits();
        if divider > 0 {
            value |= pm::gcctrl::DIVEN | ((u32::from(divider) - 1) << pm::gcctrl::DIV_OFFSET);
        }
        reg.set(value);

        Ok(())
    }

    /// Enables the channel. No readiness handshake exists; the clock
    /// becomes active on the next source edge.
    pub fn enable(&mut self) {
        let reg = self.reg();
        reg.set(reg.get() | pm::gcctrl::CEN);
    }

    /// Disables the channel and waits until the hardware confirms it, so a
    /// following reconfiguration cannot glitch the output.
    pub fn disable(&mut self) {
        let reg = self.reg();
        reg.set(reg.get() & !pm::gcctrl::CEN);
        while reg.get() & pm::gcctrl::CEN != 0 {
            core::hint::spin_loop();
        }
    }

    /// Whether the channel's enable bit is currently set.
    pub fn is_enabled(&self) -> bool {
        self.reg().get() & pm::gcctrl::CEN != 0
    }
}
