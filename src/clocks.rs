//! Clocks (PM clock tree)
//!
//! The [`ClocksManager`] owns the PM register block and hands out handles
//! to the individual clock resources. The usual bring-up order is:
//! oscillator start → stable, PLL configure → locked, clock-domain
//! prescalers, master clock switch, and finally any generic clocks.
//!
//! ## Usage
//! ```no_run
//! use fugit::RateExtU32;
//! use uc3a_hal::clocks::{ClockInputs, ClocksManager};
//! use uc3a_hal::osc::{OscillatorMode, StartupTime};
//! use uc3a_hal::pll::common_configs::PLL_OSC0_96MHZ;
//! use uc3a_hal::pm::Pm;
//!
//! let pm = unsafe { Pm::steal() };
//! let clocks = ClocksManager::new(pm, ClockInputs::with_osc0(12.MHz()));
//!
//! uc3a_hal::clocks::init_system_clocks(
//!     &clocks,
//!     OscillatorMode::CrystalG3,
//!     StartupTime::Cycles2048,
//!     PLL_OSC0_96MHZ,
//!     false,
//! )
//! .unwrap();
//! ```
// See Chapter 10 (Power Manager) in the AT32UC3A datasheet for more details

use core::ops::BitOr;

use fugit::HertzU32;
use nb::Error::WouldBlock;

use crate::gclk::{GenericClock, GenericClockId};
use crate::osc::{self, Oscillator, OscillatorId, OscillatorMode, StartupTime};
use crate::pll::{self, PhaseLockedLoop, PllConfig, PllId};
use crate::pm::{self, PmDevice, RegisterBlock};

/// Frequency of the internal system RC oscillator (RCSYS), the reset-time
/// slow clock.
pub const RCSYS_FREQUENCY: HertzU32 = HertzU32::Hz(115_000);

/// Board-given input rates of the clock tree. The PM cannot measure what
/// is soldered to the oscillator pads, so the master-clock frequency query
/// scales these by the live register state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockInputs {
    /// Slow clock (RCSYS) rate
    pub slow_clock: HertzU32,
    /// Crystal or clock rate on the OSC0 pads
    pub osc0: HertzU32,
    /// Crystal or clock rate on the OSC1 pads
    pub osc1: HertzU32,
}

impl ClockInputs {
    /// Inputs for a board with a single crystal on OSC0 and nothing on
    /// OSC1.
    pub const fn with_osc0(osc0: HertzU32) -> Self {
        ClockInputs {
            slow_clock: RCSYS_FREQUENCY,
            osc0,
            osc1: HertzU32::from_raw(0),
        }
    }
}

/// Source selection for the master clock feeding the synchronous tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterClockSource {
    /// Slow clock (RCSYS)
    SlowClock,
    /// Main oscillator 0
    Osc0,
    /// PLL0 output
    Pll0,
}

impl MasterClockSource {
    fn bits(self) -> u32 {
        match self {
            MasterClockSource::SlowClock => 0,
            MasterClockSource::Osc0 => 1,
            MasterClockSource::Pll0 => 2,
        }
    }
}

/// Bit-set of synchronous clock domains for a prescaler update.
///
/// The HSB domain is not listed: it always follows the CPU domain, as the
/// two share a bus fabric that cannot run at differing rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockDomains {
    /// CPU (and HSB) domain
    pub cpu: bool,
    /// Peripheral bus A domain
    pub pba: bool,
    /// Peripheral bus B domain
    pub pbb: bool,
}

impl ClockDomains {
    /// Only the CPU domain
    pub const CPU: Self = ClockDomains {
        cpu: true,
        pba: false,
        pbb: false,
    };
    /// Only the PBA domain
    pub const PBA: Self = ClockDomains {
        cpu: false,
        pba: true,
        pbb: false,
    };
    /// Only the PBB domain
    pub const PBB: Self = ClockDomains {
        cpu: false,
        pba: false,
        pbb: true,
    };
    /// All three domains
    pub const ALL: Self = ClockDomains {
        cpu: true,
        pba: true,
        pbb: true,
    };
}

impl BitOr for ClockDomains {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        ClockDomains {
            cpu: self.cpu | rhs.cpu,
            pba: self.pba | rhs.pba,
            pbb: self.pbb | rhs.pbb,
        }
    }
}

/// Possible errors when updating the clock-domain prescalers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Prescaler is nonzero and greater than 8
    InvalidPrescaler,

    /// The update would leave a peripheral bus clock faster than the CPU
    /// clock. The register is left unchanged.
    InvalidDomainOrdering,
}

/// Errors from the one-call system clock bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// Starting the reference oscillator failed
    OscError(osc::Error),
    /// Configuring the PLL failed
    PllError(pll::Error),
}

/// Abstraction layer providing Clock Management.
pub struct ClocksManager<D: PmDevice> {
    device: D,
    inputs: ClockInputs,
}

impl<D: PmDevice> ClocksManager<D> {
    /// Exchanges the PM block and the board's input rates against Self.
    pub fn new(device: D, inputs: ClockInputs) -> Self {
        ClocksManager { device, inputs }
    }

    /// Releases the PM block.
    pub fn free(self) -> D {
        self.device
    }

    fn regs(&self) -> &RegisterBlock {
        &self.device
    }

    /// Getter for an oscillator handle in its not-yet-started state.
    pub fn oscillator(&self, id: OscillatorId) -> Oscillator<'_, osc::Disabled> {
        Oscillator::new(self.regs(), id)
    }

    /// Getter for a PLL handle in its disabled state.
    pub fn pll(&self, id: PllId) -> PhaseLockedLoop<'_, pll::Disabled> {
        PhaseLockedLoop::new(self.regs(), id)
    }

    /// Getter for a generic clock channel handle.
    pub fn generic_clock(&self, id: GenericClockId) -> GenericClock<'_> {
        GenericClock::new(self.regs(), id)
    }

    /// Applies `prescaler` to every domain in `domains`.
    ///
    /// A prescaler of 0 reverts the domain to undivided; 1..=8 divides it,
    /// with the hardware SEL field holding `prescaler - 1`. The CPU edit is
    /// mirrored into the HSB fields.
    ///
    /// The whole update is one read-edit-validate-write of the shared
    /// CKSEL register. If the resulting composite would let a peripheral
    /// bus outrun the CPU domain, nothing is written and
    /// [`Error::InvalidDomainOrdering`] is returned. Returns `WouldBlock`
    /// while the hardware still reports a pending clock-select change; the
    /// old value keeps driving the tree until the single final write, so a
    /// torn prescaler update can never reach the clocks.
    pub fn set_domain_prescaler(
        &self,
        prescaler: u8,
        domains: ClockDomains,
    ) -> nb::Result<(), Error> {
        use crate::pm::cksel::*;

        if prescaler != 0 && prescaler > 8 {
            return Err(nb::Error::Other(Error::InvalidPrescaler));
        }
        let sel = u32::from(prescaler.saturating_sub(1));

        critical_section::with(|_| {
            let regs = self.regs();
            let mut value = regs.cksel.get();

            if domains.cpu {
                value &= !(CPUSEL_MASK | CPUDIV | HSBSEL_MASK | HSBDIV);
                if prescaler != 0 {
                    value |= (sel << CPUSEL_OFFSET) | CPUDIV;
                    value |= (sel << HSBSEL_OFFSET) | HSBDIV;
                }
            }
            if domains.pba {
                value &= !(PBASEL_MASK | PBADIV);
                if prescaler != 0 {
                    value |= (sel << PBASEL_OFFSET) | PBADIV;
                }
            }
            if domains.pbb {
                value &= !(PBBSEL_MASK | PBBDIV);
                if prescaler != 0 {
                    value |= (sel << PBBSEL_OFFSET) | PBBDIV;
                }
            }

            // A divided CPU demands divided buses, each at least as slow.
            if value & CPUDIV != 0 {
                if value & PBADIV == 0 || value & PBBDIV == 0 {
                    return Err(nb::Error::Other(Error::InvalidDomainOrdering));
                }
                let cpu = (value & CPUSEL_MASK) >> CPUSEL_OFFSET;
                let pba = (value & PBASEL_MASK) >> PBASEL_OFFSET;
                let pbb = (value & PBBSEL_MASK) >> PBBSEL_OFFSET;
                if cpu > pba || cpu > pbb {
                    return Err(nb::Error::Other(Error::InvalidDomainOrdering));
                }
            }

            // CKSEL must not be re-written while a previous change is still
            // propagating.
            if regs.isr.get() & pm::isr::CKRDY == 0 {
                return Err(WouldBlock);
            }
            regs.cksel.set(value);

            Ok(())
        })
    }

    /// Blocking variant of [`ClocksManager::set_domain_prescaler`].
    pub fn set_domain_prescaler_blocking(
        &self,
        prescaler: u8,
        domains: ClockDomains,
    ) -> Result<(), Error> {
        nb::block!(self.set_domain_prescaler(prescaler, domains))
    }

    /// Switches the master clock onto `source`. The mux is glitch-free in
    /// hardware and needs no readiness wait.
    pub fn select_master_clock(&self, source: MasterClockSource) {
        let regs = self.regs();
        let value = regs.mcctrl.get() & !pm::mcctrl::MCSEL_MASK;
        regs.mcctrl.set(value | source.bits());
    }

    /// Current master clock frequency, reverse-derived from live register
    /// state rather than cached configuration.
    ///
    /// For the PLL0 case: pick the oscillator feeding PLL0, scale by
    /// `PLLMUL + 1`, divide by `PLLDIV` when nonzero (otherwise the VCO
    /// runs undivided, doubling the output), and halve when the output
    /// divide-by-2 option is set. An unrecognized selector yields 0 Hz;
    /// there is no error path.
    pub fn master_clock_frequency(&self) -> HertzU32 {
        let regs = self.regs();
        match regs.mcctrl.get() & pm::mcctrl::MCSEL_MASK {
            0 => self.inputs.slow_clock,
            1 => self.inputs.osc0,
            2 => {
                let pll0 = regs.pll[0].get();
                let reference = if pll0 & pm::pll::PLLOSC == 0 {
                    self.inputs.osc0
                } else {
                    self.inputs.osc1
                };
                let mul = ((pll0 & pm::pll::PLLMUL_MASK) >> pm::pll::PLLMUL_OFFSET) + 1;
                let div = (pll0 & pm::pll::PLLDIV_MASK) >> pm::pll::PLLDIV_OFFSET;

                let mut mck = reference.to_Hz() * mul;
                if div > 0 {
                    mck /= div;
                } else {
                    mck *= 2;
                }
                if pll0 & pm::pll::PLLOPT_DIV2 != 0 {
                    mck /= 2;
                }
                HertzU32::from_raw(mck)
            }
            _ => HertzU32::from_raw(0),
        }
    }
}

/// One-call system clock bring-up: starts OSC0, locks PLL0 onto it and
/// switches the master clock over. Blocks on the oscillator-ready and
/// PLL-lock flags; clock-domain prescalers and generic clocks are left to
/// the caller.
pub fn init_system_clocks<D: PmDevice>(
    clocks: &ClocksManager<D>,
    mode: OscillatorMode,
    startup: StartupTime,
    config: PllConfig,
    divide_by_2: bool,
) -> Result<(), InitError> {
    osc::setup_osc_blocking(clocks.oscillator(OscillatorId::Osc0), mode, startup)
        .map_err(InitError::OscError)?;

    pll::setup_pll_blocking(clocks.pll(PllId::Pll0), config, divide_by_2)
        .map_err(InitError::PllError)?;

    clocks.select_master_clock(MasterClockSource::Pll0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pll::{PllConfig, PllSource};
    use crate::pm::RegisterBlock;
    use fugit::RateExtU32;

    fn inputs() -> ClockInputs {
        ClockInputs {
            slow_clock: 115.kHz(),
            osc0: 12.MHz(),
            osc1: 16.MHz(),
        }
    }

    fn manager(regs: &RegisterBlock) -> ClocksManager<&RegisterBlock> {
        ClocksManager::new(regs, inputs())
    }

    fn expected_cksel(sel: u32) -> u32 {
        use crate::pm::cksel::*;
        (sel << CPUSEL_OFFSET)
            | CPUDIV
            | (sel << HSBSEL_OFFSET)
            | HSBDIV
            | (sel << PBASEL_OFFSET)
            | PBADIV
            | (sel << PBBSEL_OFFSET)
            | PBBDIV
    }

    #[test]
    fn prescaler_above_8_is_rejected() {
        let regs = RegisterBlock::new();
        regs.isr.set(pm::isr::CKRDY);
        let clocks = manager(&regs);

        let err = clocks.set_domain_prescaler_blocking(9, ClockDomains::ALL);
        assert_eq!(err, Err(Error::InvalidPrescaler));
        assert_eq!(regs.cksel.get(), 0);
    }

    #[test]
    fn dividing_all_domains_writes_the_composite_once() {
        let regs = RegisterBlock::new();
        regs.isr.set(pm::isr::CKRDY);
        let clocks = manager(&regs);

        clocks
            .set_domain_prescaler_blocking(4, ClockDomains::ALL)
            .unwrap();
        assert_eq!(regs.cksel.get(), expected_cksel(3));
    }

    #[test]
    fn prescaler_zero_reverts_domains_to_passthrough() {
        let regs = RegisterBlock::new();
        regs.isr.set(pm::isr::CKRDY);
        let clocks = manager(&regs);

        clocks
            .set_domain_prescaler_blocking(2, ClockDomains::ALL)
            .unwrap();
        clocks
            .set_domain_prescaler_blocking(0, ClockDomains::ALL)
            .unwrap();
        assert_eq!(regs.cksel.get(), 0);
    }

    #[test]
    fn dividing_only_the_cpu_violates_domain_ordering() {
        let regs = RegisterBlock::new();
        regs.isr.set(pm::isr::CKRDY);
        let clocks = manager(&regs);

        let err = clocks.set_domain_prescaler_blocking(4, ClockDomains::CPU);
        assert_eq!(err, Err(Error::InvalidDomainOrdering));
        assert_eq!(regs.cksel.get(), 0);
    }

    #[test]
    fn cpu_faster_than_a_bus_violates_domain_ordering() {
        let regs = RegisterBlock::new();
        regs.isr.set(pm::isr::CKRDY);
        let clocks = manager(&regs);

        clocks
            .set_domain_prescaler_blocking(4, ClockDomains::ALL)
            .unwrap();
        let before = regs.cksel.get();

        // Relax only the CPU domain: CPU would outrun both buses.
        let err = clocks.set_domain_prescaler_blocking(2, ClockDomains::CPU);
        assert_eq!(err, Ok(()));
        // A *stricter* CPU divider than the buses is the violation.
        let err = clocks.set_domain_prescaler_blocking(8, ClockDomains::CPU);
        assert_eq!(err, Err(Error::InvalidDomainOrdering));

        // Failed edits leave the last accepted composite in place.
        let relaxed = (before & !(pm::cksel::CPUSEL_MASK | pm::cksel::HSBSEL_MASK))
            | (1 << pm::cksel::CPUSEL_OFFSET)
            | (1 << pm::cksel::HSBSEL_OFFSET);
        assert_eq!(regs.cksel.get(), relaxed);
    }

    #[test]
    fn cksel_write_waits_for_the_ready_flag() {
        let regs = RegisterBlock::new();
        let clocks = manager(&regs);

        let res = clocks.set_domain_prescaler(2, ClockDomains::ALL);
        assert_eq!(res, Err(nb::Error::WouldBlock));
        assert_eq!(regs.cksel.get(), 0);

        regs.isr.set(pm::isr::CKRDY);
        clocks.set_domain_prescaler(2, ClockDomains::ALL).unwrap();
        assert_eq!(regs.cksel.get(), expected_cksel(1));
    }

    #[test]
    fn master_clock_defaults_to_the_slow_clock() {
        let regs = RegisterBlock::new();
        let clocks = manager(&regs);
        assert_eq!(clocks.master_clock_frequency(), 115.kHz::<1, 1>());
    }

    #[test]
    fn master_clock_follows_osc0_selection() {
        let regs = RegisterBlock::new();
        let clocks = manager(&regs);

        clocks.select_master_clock(MasterClockSource::Osc0);
        assert_eq!(clocks.master_clock_frequency(), 12.MHz::<1, 1>());
    }

    #[test]
    fn pll_master_clock_with_zero_divider_doubles_the_vco() {
        let regs = RegisterBlock::new();
        let clocks = manager(&regs);

        // multiplier 8 (encoded 7), divider 0, no output halving:
        // 12 MHz * 2 * 8 = 192 MHz.
        clocks
            .pll(PllId::Pll0)
            .configure(PllConfig {
                source: PllSource::Osc0,
                multiplier: 8,
                divider: 0,
                high_frequency: false,
            })
            .unwrap()
            .enable(false);
        clocks.select_master_clock(MasterClockSource::Pll0);

        assert_eq!(clocks.master_clock_frequency(), 192.MHz::<1, 1>());
    }

    #[test]
    fn pll_master_clock_divides_and_halves() {
        let regs = RegisterBlock::new();
        let clocks = manager(&regs);

        // From OSC1: 16 MHz * 8 / 2 = 64 MHz, halved to 32 MHz.
        clocks
            .pll(PllId::Pll0)
            .configure(PllConfig {
                source: PllSource::Osc1,
                multiplier: 8,
                divider: 2,
                high_frequency: false,
            })
            .unwrap()
            .enable(true);
        clocks.select_master_clock(MasterClockSource::Pll0);

        assert_eq!(clocks.master_clock_frequency(), 32.MHz::<1, 1>());
    }

    #[test]
    fn unrecognized_selector_reads_as_zero_hertz() {
        let regs = RegisterBlock::new();
        regs.mcctrl.set(3);
        let clocks = manager(&regs);

        assert_eq!(clocks.master_clock_frequency(), HertzU32::from_raw(0));
    }

    #[test]
    fn init_system_clocks_brings_the_tree_onto_pll0() {
        let regs = RegisterBlock::new();
        regs.isr.set(pm::isr::OSC0RDY | pm::isr::LOCK0);
        let clocks = manager(&regs);

        init_system_clocks(
            &clocks,
            OscillatorMode::CrystalG3,
            StartupTime::Cycles2048,
            pll::common_configs::PLL_OSC0_96MHZ,
            false,
        )
        .unwrap();

        assert_eq!(regs.mcctrl.get() & pm::mcctrl::MCSEL_MASK, 2);
        assert_eq!(clocks.master_clock_frequency(), 96.MHz::<1, 1>());
    }

    #[test]
    fn domain_sets_compose_with_bitor() {
        assert_eq!(
            ClockDomains::CPU | ClockDomains::PBA | ClockDomains::PBB,
            ClockDomains::ALL
        );
    }
}
