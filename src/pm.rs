//! Power Manager (PM) register block
//!
//! See Chapter 10 (Power Manager) in the AT32UC3A datasheet for more details.
//!
//! No svd2rust PAC is published for the AVR32 devices, so the PM block is
//! declared here by hand on top of [`vcell::VolatileCell`], the same
//! primitive generated PACs use underneath. Driver modules reach the block
//! through the [`PmDevice`] seam, which lets tests run the exact same
//! register sequences against an in-memory [`RegisterBlock`].

use core::ops::Deref;

use vcell::VolatileCell;

/// The PM peripheral's registers.
///
/// On hardware this lives at [`Pm::PTR`]. [`RegisterBlock::new`] builds a
/// detached block with every register at its reset value, which is what the
/// unit tests (or an emulator) drive the clock code against.
#[repr(C)]
pub struct RegisterBlock {
    /// Main Clock Control
    pub mcctrl: VolatileCell<u32>,
    /// Clock Select (CPU/HSB/PBA/PBB prescalers, one shared shadow register)
    pub cksel: VolatileCell<u32>,
    /// CPU clock mask
    pub cpumask: VolatileCell<u32>,
    /// HSB clock mask
    pub hsbmask: VolatileCell<u32>,
    /// PBA clock mask
    pub pbamask: VolatileCell<u32>,
    /// PBB clock mask
    pub pbbmask: VolatileCell<u32>,
    _reserved0: [u32; 2],
    /// PLL0 and PLL1 control
    pub pll: [VolatileCell<u32>; 2],
    /// Oscillator 0 control
    pub oscctrl0: VolatileCell<u32>,
    /// Oscillator 1 control
    pub oscctrl1: VolatileCell<u32>,
    /// 32 kHz oscillator control
    pub oscctrl32: VolatileCell<u32>,
    _reserved1: [u32; 3],
    /// Interrupt enable
    pub ier: VolatileCell<u32>,
    /// Interrupt disable
    pub idr: VolatileCell<u32>,
    /// Interrupt mask
    pub imr: VolatileCell<u32>,
    /// Interrupt status (ready/lock flags)
    pub isr: VolatileCell<u32>,
    /// Interrupt clear
    pub icr: VolatileCell<u32>,
    _reserved2: [u32; 3],
    /// Generic clock control, one register per channel
    pub gcctrl: [VolatileCell<u32>; 6],
}

impl RegisterBlock {
    /// Creates a detached register block with all registers at zero.
    ///
    /// Useful as a simulated backing store: `&RegisterBlock` implements
    /// [`PmDevice`], so the whole clock driver can be exercised without
    /// the real peripheral.
    pub const fn new() -> Self {
        RegisterBlock {
            mcctrl: VolatileCell::new(0),
            cksel: VolatileCell::new(0),
            cpumask: VolatileCell::new(0),
            hsbmask: VolatileCell::new(0),
            pbamask: VolatileCell::new(0),
            pbbmask: VolatileCell::new(0),
            _reserved0: [0; 2],
            pll: [VolatileCell::new(0), VolatileCell::new(0)],
            oscctrl0: VolatileCell::new(0),
            oscctrl1: VolatileCell::new(0),
            oscctrl32: VolatileCell::new(0),
            _reserved1: [0; 3],
            ier: VolatileCell::new(0),
            idr: VolatileCell::new(0),
            imr: VolatileCell::new(0),
            isr: VolatileCell::new(0),
            icr: VolatileCell::new(0),
            _reserved2: [0; 3],
            gcctrl: [
                VolatileCell::new(0),
                VolatileCell::new(0),
                VolatileCell::new(0),
                VolatileCell::new(0),
                VolatileCell::new(0),
                VolatileCell::new(0),
            ],
        }
    }
}

impl Default for RegisterBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the PM registers.
///
/// Implemented by the memory-mapped [`Pm`] singleton and by
/// `&RegisterBlock` for simulated blocks.
pub trait PmDevice: Deref<Target = RegisterBlock> {}

/// The memory-mapped PM peripheral.
pub struct Pm {
    _private: (),
}

impl Pm {
    /// Base address of the PM peripheral on the UC3A.
    pub const PTR: *const RegisterBlock = 0xFFFF_0C00 as *const RegisterBlock;

    /// Creates a handle to the memory-mapped PM block.
    ///
    /// # Safety
    ///
    /// The caller must ensure no other `Pm` handle is alive; the PM owns
    /// shared shadow registers (CKSEL in particular) whose read-modify-write
    /// sequences must have a single logical owner.
    pub unsafe fn steal() -> Self {
        Pm { _private: () }
    }
}

impl Deref for Pm {
    type Target = RegisterBlock;

    fn deref(&self) -> &RegisterBlock {
        unsafe { &*Self::PTR }
    }
}

impl PmDevice for Pm {}
impl<'a> PmDevice for &'a RegisterBlock {}

/// MCCTRL fields.
pub mod mcctrl {
    /// Master clock source selection
    pub const MCSEL_MASK: u32 = 0x3;
    /// Oscillator 0 enable
    pub const OSC0EN: u32 = 1 << 2;
    /// Oscillator 1 enable
    pub const OSC1EN: u32 = 1 << 3;
}

/// CKSEL fields. The SEL fields hold `prescaler - 1`; the DIV bits gate
/// whether the domain is divided at all.
pub mod cksel {
    /// CPU prescaler selection offset
    pub const CPUSEL_OFFSET: u32 = 0;
    /// CPU prescaler selection
    pub const CPUSEL_MASK: u32 = 0x7 << CPUSEL_OFFSET;
    /// CPU divider enable
    pub const CPUDIV: u32 = 1 << 7;
    /// HSB prescaler selection offset
    pub const HSBSEL_OFFSET: u32 = 8;
    /// HSB prescaler selection
    pub const HSBSEL_MASK: u32 = 0x7 << HSBSEL_OFFSET;
    /// HSB divider enable
    pub const HSBDIV: u32 = 1 << 15;
    /// PBA prescaler selection offset
    pub const PBASEL_OFFSET: u32 = 16;
    /// PBA prescaler selection
    pub const PBASEL_MASK: u32 = 0x7 << PBASEL_OFFSET;
    /// PBA divider enable
    pub const PBADIV: u32 = 1 << 23;
    /// PBB prescaler selection offset
    pub const PBBSEL_OFFSET: u32 = 24;
    /// PBB prescaler selection
    pub const PBBSEL_MASK: u32 = 0x7 << PBBSEL_OFFSET;
    /// PBB divider enable
    pub const PBBDIV: u32 = 1 << 31;
}

/// PLL0/PLL1 fields.
pub mod pll {
    /// PLL enable
    pub const PLLEN: u32 = 1 << 0;
    /// Reference oscillator selection (0 = OSC0, 1 = OSC1)
    pub const PLLOSC: u32 = 1 << 1;
    /// Option bits offset
    pub const PLLOPT_OFFSET: u32 = 2;
    /// Option bits (VCO range, output halving, bandwidth)
    pub const PLLOPT_MASK: u32 = 0x7 << PLLOPT_OFFSET;
    /// Output divide-by-2 option, bit 1 of the PLLOPT field
    pub const PLLOPT_DIV2: u32 = 1 << (PLLOPT_OFFSET + 1);
    /// Divider offset
    pub const PLLDIV_OFFSET: u32 = 8;
    /// Divider
    pub const PLLDIV_MASK: u32 = 0xf << PLLDIV_OFFSET;
    /// Multiplier offset
    pub const PLLMUL_OFFSET: u32 = 16;
    /// Multiplier, encoded as `multiplier - 1`
    pub const PLLMUL_MASK: u32 = 0xf << PLLMUL_OFFSET;
    /// Lock count offset
    pub const PLLCOUNT_OFFSET: u32 = 24;
    /// Lock count, in slow-clock cycles
    pub const PLLCOUNT_MASK: u32 = 0x3f << PLLCOUNT_OFFSET;
}

/// OSCCTRL0/OSCCTRL1 fields.
pub mod oscctrl {
    /// Oscillator mode
    pub const MODE_MASK: u32 = 0x7;
    /// Startup time offset
    pub const STARTUP_OFFSET: u32 = 8;
    /// Startup time
    pub const STARTUP_MASK: u32 = 0x7 << STARTUP_OFFSET;
}

/// OSCCTRL32 fields.
pub mod oscctrl32 {
    /// 32 kHz oscillator enable
    pub const OSC32EN: u32 = 1 << 0;
    /// Oscillator mode offset
    pub const MODE_OFFSET: u32 = 8;
    /// Oscillator mode
    pub const MODE_MASK: u32 = 0x7 << MODE_OFFSET;
    /// Startup time offset
    pub const STARTUP_OFFSET: u32 = 16;
    /// Startup time
    pub const STARTUP_MASK: u32 = 0x7 << STARTUP_OFFSET;
}

/// ISR status flags.
pub mod isr {
    /// PLL0 locked
    pub const LOCK0: u32 = 1 << 0;
    /// PLL1 locked
    pub const LOCK1: u32 = 1 << 1;
    /// Clock-select change has propagated; CKSEL may be written
    pub const CKRDY: u32 = 1 << 5;
    /// Oscillator 0 stable
    pub const OSC0RDY: u32 = 1 << 7;
    /// Oscillator 1 stable
    pub const OSC1RDY: u32 = 1 << 8;
    /// 32 kHz oscillator stable
    pub const OSC32RDY: u32 = 1 << 9;
}

/// GCCTRL fields.
pub mod gcctrl {
    /// Oscillator instance selection
    pub const OSCSEL: u32 = 1 << 0;
    /// PLL-over-oscillator selection
    pub const PLLSEL: u32 = 1 << 1;
    /// Channel enable
    pub const CEN: u32 = 1 << 2;
    /// Divider enable
    pub const DIVEN: u32 = 1 << 4;
    /// Divider offset
    pub const DIV_OFFSET: u32 = 8;
    /// Divider, encoded as `divider - 1`
    pub const DIV_MASK: u32 = 0xff << DIV_OFFSET;
}
