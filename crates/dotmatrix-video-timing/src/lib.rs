//! Display-controller line-compare interrupt timing.
//!
//! This crate models *when* and *whether* the LYC=LY ("line-compare")
//! interrupt of the handheld's LCD controller fires, to single-cycle
//! accuracy. It provides:
//! - [`LineCounter`]: the scan-line counter, including the wraparound
//!   resolver that maps an in-frame cycle offset to its next absolute
//!   occurrence.
//! - [`LineCompareIrq`]: the comparator model. It keeps two copies of the
//!   STAT/LYC registers — the values last *written* by the program and the
//!   values currently *latched* by the comparator — because a write landing
//!   within a few cycles of a pending match is latched too late to affect
//!   that firing.
//! - [`SaveState`]: the persisted slice of controller state, encoded through
//!   `dotmatrix-io-snapshot`.
//!
//! The owning machine drives everything from its cycle-accurate event loop:
//! it forwards STAT/LYC writes as they happen, invokes
//! [`LineCompareIrq::handle_event`] exactly when
//! [`LineCompareIrq::scheduled_time`] is reached, and calls
//! [`LineCompareIrq::reschedule`] after anything that redefines "now"
//! (speed switch, state load).

#![forbid(unsafe_code)]

mod interrupt;
mod line_counter;
mod lyc_irq;
mod state;

pub use interrupt::{InterruptSink, IF_LCD_STAT, IF_VBLANK};
pub use line_counter::LineCounter;
pub use lyc_irq::{
    match_blocked, match_frame_cycle, next_match_cycle, HardwareVariant, LineCompareIrq,
    STAT_HBLANK_IRQ_EN, STAT_LYC_IRQ_EN, STAT_OAM_IRQ_EN, STAT_VBLANK_IRQ_EN,
};
pub use state::{SaveState, IO_LEN, IO_LYC, IO_STAT};

/// Cycles per scan line at single speed.
pub const CYCLES_PER_LINE: u32 = 456;
/// Scan lines per frame, visible and blanking included.
pub const LINES_PER_FRAME: u32 = 154;
/// Scan lines carrying visible pixels.
pub const VISIBLE_LINES: u32 = 144;
/// Cycles per frame at single speed.
pub const FRAME_CYCLES: u32 = LINES_PER_FRAME * CYCLES_PER_LINE;
/// Sentinel meaning "no event scheduled".
pub const DISABLED_TIME: u32 = u32::MAX;
