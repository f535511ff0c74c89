use crate::interrupt::{InterruptSink, IF_LCD_STAT};
use crate::line_counter::LineCounter;
use crate::state::{SaveState, IO_LYC, IO_STAT};
use crate::{CYCLES_PER_LINE, DISABLED_TIME, LINES_PER_FRAME, VISIBLE_LINES};

/// STAT interrupt-enable bits. All four sources drive the same IF bit
/// through one shared, edge-triggered line.
pub const STAT_HBLANK_IRQ_EN: u8 = 1 << 3;
pub const STAT_VBLANK_IRQ_EN: u8 = 1 << 4;
pub const STAT_OAM_IRQ_EN: u8 = 1 << 5;
pub const STAT_LYC_IRQ_EN: u8 = 1 << 6;

// Measured hardware latencies, in single-speed cycles. Tests pin the exact
// cycle values, so these must not be folded into the surrounding arithmetic.

/// A match on `lyc > 0` asserts this many cycles before the counter
/// increments to the matching line.
const MATCH_LEAD: u32 = 2;
/// A compare value of 0 matches this many cycles into the final line of the
/// previous frame, which runs long on this hardware.
const LINE0_MATCH_LAG: u32 = 6;
/// Both match points move this many cycles later in double-speed mode.
const DOUBLE_SPEED_MATCH_LAG: u32 = 2;
/// The visible line index updates this many cycles after the line-counter
/// increment; a match scheduled inside that lag compares against the next
/// line.
const LINE_INCREMENT_LAG: u32 = 4;

// Race windows: a register write landing inside the window of a pending
// match reaches the comparator after it has already latched its operands,
// so the latched value stays stale until the match is evaluated.

const DMG_WRITE_WINDOW: u32 = 4;
const CGB_LYC_WRITE_WINDOW: u32 = 8;
const CGB_STAT_WRITE_WINDOW: u32 = 4;
/// In double-speed mode the Cgb status window collapses to zero.
const CGB_STAT_WINDOW_DS_CREDIT: u32 = 4;

/// Hardware revision being modeled. Selects the race-window thresholds;
/// fixed for the lifetime of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareVariant {
    /// The original monochrome unit.
    Dmg,
    /// The color unit, with its double-speed mode.
    Cgb,
}

/// In-frame cycle offset (single-speed units) at which the comparator can
/// match `lyc`.
pub fn match_frame_cycle(lyc: u8, double_speed: bool) -> u32 {
    let ds_lag = DOUBLE_SPEED_MATCH_LAG * double_speed as u32;
    if lyc == 0 {
        (LINES_PER_FRAME - 1) * CYCLES_PER_LINE + LINE0_MATCH_LAG + ds_lag
    } else {
        lyc as u32 * CYCLES_PER_LINE - MATCH_LEAD + ds_lag
    }
}

/// Absolute cycle of the next possible match for the given register values,
/// or [`DISABLED_TIME`] when the source cannot fire (enable bit clear, or
/// compare value beyond the last line).
pub fn next_match_cycle(stat: u8, lyc: u8, counter: &LineCounter, cc: u32) -> u32 {
    if stat & STAT_LYC_IRQ_EN == 0 || lyc as u32 >= LINES_PER_FRAME {
        return DISABLED_TIME;
    }
    counter.next_frame_cycle(match_frame_cycle(lyc, counter.is_double_speed()), cc)
}

/// Whether a match on `line` is suppressed because another enabled STAT
/// source is already holding the shared IRQ line asserted.
///
/// During visible lines the OAM-search source owns the line; at the line-0
/// boundary and throughout vertical blank the vblank source does.
pub fn match_blocked(line: u8, stat: u8) -> bool {
    if line > 0 && (line as u32) < VISIBLE_LINES {
        stat & STAT_OAM_IRQ_EN != 0
    } else {
        stat & STAT_VBLANK_IRQ_EN != 0
    }
}

/// The line-compare comparator.
///
/// Keeps the STAT/LYC values last written by the program (`*_written`) next
/// to the values the comparator is currently operating on (`*_latched`).
/// The pairs diverge only when a write lands inside the race window of a
/// pending match; [`handle_event`](Self::handle_event) re-unifies them.
#[derive(Debug)]
pub struct LineCompareIrq {
    variant: HardwareVariant,
    next_time: u32,
    stat_written: u8,
    lyc_written: u8,
    stat_latched: u8,
    lyc_latched: u8,
}

impl LineCompareIrq {
    pub fn new(variant: HardwareVariant) -> Self {
        Self {
            variant,
            next_time: DISABLED_TIME,
            stat_written: 0,
            lyc_written: 0,
            stat_latched: 0,
            lyc_latched: 0,
        }
    }

    /// Absolute cycle of the next scheduled comparison, or
    /// [`DISABLED_TIME`]. The owning loop feeds this into its next-event
    /// selection.
    pub fn scheduled_time(&self) -> u32 {
        self.next_time
    }

    /// A program write to STAT or LYC at cycle `cc`. `stat` and `lyc` are
    /// the complete new register values.
    ///
    /// The scheduled time only ever moves earlier here: a write can make a
    /// pending match more imminent, never postpone it (the stale schedule
    /// is re-derived at the next event evaluation instead).
    pub fn on_register_write(&mut self, stat: u8, lyc: u8, counter: &LineCounter, cc: u32) {
        let time_src = next_match_cycle(stat, lyc, counter, cc);
        self.stat_written = stat;
        self.lyc_written = lyc;
        self.next_time = self.next_time.min(time_src);

        let remaining = self.next_time.wrapping_sub(cc);
        match self.variant {
            HardwareVariant::Cgb => {
                let ds = counter.is_double_speed() as u32;
                let stat_window = CGB_STAT_WRITE_WINDOW - CGB_STAT_WINDOW_DS_CREDIT * ds;
                if remaining > CGB_LYC_WRITE_WINDOW
                    || (time_src != self.next_time && remaining > stat_window)
                {
                    self.lyc_latched = lyc;
                }
                if remaining > stat_window {
                    self.stat_latched = stat;
                }
            }
            HardwareVariant::Dmg => {
                if remaining > DMG_WRITE_WINDOW || time_src != self.next_time {
                    self.lyc_latched = lyc;
                }
                if remaining > DMG_WRITE_WINDOW || self.lyc_latched != 0 {
                    self.stat_latched = stat;
                }
                // Asymmetric on this revision: the non-enable bits reach the
                // comparator immediately even when the enable bit is held
                // back by the window.
                self.stat_latched =
                    (self.stat_latched & STAT_LYC_IRQ_EN) | (stat & !STAT_LYC_IRQ_EN);
            }
        }
    }

    /// Evaluates the comparison. The owning loop must call this exactly when
    /// [`scheduled_time`](Self::scheduled_time) is reached.
    pub fn handle_event(&mut self, sink: &mut impl InterruptSink, counter: &LineCounter) {
        if (self.stat_latched | self.stat_written) & STAT_LYC_IRQ_EN != 0 {
            let until_line_end = counter.time().wrapping_sub(self.next_time);
            let cmp_line = if counter.ly() as u32 == LINES_PER_FRAME - 1
                && until_line_end < counter.line_time()
            {
                // Mid-way through the final line the comparator already sees
                // the wrapped line 0.
                0
            } else {
                counter.ly() + (until_line_end < LINE_INCREMENT_LAG) as u8
            };
            if self.lyc_latched == cmp_line && !match_blocked(self.lyc_latched, self.stat_latched)
            {
                sink.request(IF_LCD_STAT);
            }
        }

        self.lyc_latched = self.lyc_written;
        self.stat_latched = self.stat_written;
        self.next_time =
            next_match_cycle(self.stat_latched, self.lyc_latched, counter, self.next_time);
    }

    /// Recomputes the schedule at an arbitrary cycle, after a timing
    /// discontinuity (speed switch, state load) invalidated the stored one.
    pub fn reschedule(&mut self, counter: &LineCounter, cc: u32) {
        self.next_time = next_match_cycle(self.stat_latched, self.lyc_latched, counter, cc)
            .min(next_match_cycle(self.stat_written, self.lyc_written, counter, cc));
    }

    /// Collapses any in-flight deferred write, as when the controller is
    /// switched off and back on.
    pub fn reset(&mut self) {
        self.stat_latched = self.stat_written;
        self.lyc_latched = self.lyc_written;
    }

    /// Restores the written pair from the raw register block and the latched
    /// compare value from its dedicated field. No race survives a load: the
    /// latched status is the written status. The schedule is not persisted;
    /// callers follow up with [`reschedule`](Self::reschedule).
    pub fn load_state(&mut self, state: &SaveState) {
        self.stat_written = state.io[IO_STAT];
        self.lyc_written = state.io[IO_LYC];
        self.lyc_latched = state.lyc;
        self.stat_latched = self.stat_written;
    }

    /// Persists the latched compare value. Everything else is either owned
    /// by the memory collaborator (the raw register block) or reconstructed
    /// on load.
    pub fn save_state(&self, state: &mut SaveState) {
        state.lyc = self.lyc_latched;
    }
}
