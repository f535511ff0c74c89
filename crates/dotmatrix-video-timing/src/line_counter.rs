use crate::{CYCLES_PER_LINE, FRAME_CYCLES, LINES_PER_FRAME};

/// The controller's scan-line counter.
///
/// `time` is the absolute cycle at which the current line ends; the owning
/// event loop calls [`advance_line`](Self::advance_line) when that cycle is
/// reached. In double-speed mode every line (and therefore the frame) takes
/// twice as many cycles.
#[derive(Debug, Clone)]
pub struct LineCounter {
    time: u32,
    line_time: u32,
    ly: u8,
    double_speed: bool,
}

impl LineCounter {
    pub fn new() -> Self {
        Self {
            time: CYCLES_PER_LINE,
            line_time: CYCLES_PER_LINE,
            ly: 0,
            double_speed: false,
        }
    }

    /// Current line index, `0..LINES_PER_FRAME`.
    pub fn ly(&self) -> u8 {
        self.ly
    }

    /// Absolute cycle at which the current line ends.
    pub fn time(&self) -> u32 {
        self.time
    }

    /// Cycles per line at the current speed.
    pub fn line_time(&self) -> u32 {
        self.line_time
    }

    pub fn is_double_speed(&self) -> bool {
        self.double_speed
    }

    /// Cycles elapsed within the current line as of `cc`.
    pub fn line_cycles(&self, cc: u32) -> u32 {
        self.line_time - self.time.wrapping_sub(cc)
    }

    /// Line-increment event: the line that ends at [`time`](Self::time) is
    /// over.
    pub fn advance_line(&mut self) {
        self.ly += 1;
        if self.ly as u32 == LINES_PER_FRAME {
            self.ly = 0;
        }
        self.time = self.time.wrapping_add(self.line_time);
    }

    /// Catches the counter up to `cc`, processing any overdue line
    /// increments.
    pub fn update(&mut self, cc: u32) {
        while self.time <= cc {
            self.advance_line();
        }
    }

    /// Switches the per-line duration. The caller owns the accompanying
    /// timing discontinuity: reposition with [`reset`](Self::reset), then
    /// reschedule anything derived from the old speed.
    pub fn set_double_speed(&mut self, double_speed: bool) {
        self.double_speed = double_speed;
        self.line_time = CYCLES_PER_LINE << double_speed as u32;
    }

    /// Repositions the counter at `frame_cycles` into the frame (in
    /// current-speed cycles), with `now` as the current absolute cycle.
    pub fn reset(&mut self, frame_cycles: u32, now: u32) {
        self.ly = (frame_cycles / self.line_time) as u8;
        self.time = now.wrapping_add(self.line_time - frame_cycles % self.line_time);
    }

    /// Resolves an in-frame cycle offset to its next absolute occurrence
    /// after `cc`, in `(cc, cc + frame length]`.
    ///
    /// `frame_cycle` is expressed in single-speed cycles; in double-speed
    /// mode the frame positions stretch by two, and the offset stretches
    /// with them.
    pub fn next_frame_cycle(&self, frame_cycle: u32, cc: u32) -> u32 {
        let shift = self.double_speed as u32;
        let frame_len = FRAME_CYCLES << shift;
        let to_target =
            ((LINES_PER_FRAME - 1 - self.ly as u32) * CYCLES_PER_LINE + frame_cycle) << shift;
        let mut target = self.time.wrapping_add(to_target);
        if target.wrapping_sub(cc) > frame_len {
            target = target.wrapping_sub(frame_len);
        }
        target
    }
}

impl Default for LineCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_wraps_to_line_zero() {
        let mut counter = LineCounter::new();
        for _ in 0..LINES_PER_FRAME {
            counter.advance_line();
        }
        assert_eq!(counter.ly(), 0);
        assert_eq!(counter.time(), CYCLES_PER_LINE + FRAME_CYCLES);
    }

    #[test]
    fn update_processes_overdue_lines() {
        let mut counter = LineCounter::new();
        counter.update(3 * CYCLES_PER_LINE + 10);
        assert_eq!(counter.ly(), 3);
        assert_eq!(counter.time(), 4 * CYCLES_PER_LINE);
        assert_eq!(counter.line_cycles(3 * CYCLES_PER_LINE + 10), 10);
    }

    #[test]
    fn reset_repositions_within_frame() {
        let mut counter = LineCounter::new();
        counter.reset(2 * CYCLES_PER_LINE + 100, 5_000);
        assert_eq!(counter.ly(), 2);
        assert_eq!(counter.time(), 5_000 + CYCLES_PER_LINE - 100);
    }

    #[test]
    fn next_frame_cycle_resolves_forward_and_wraps() {
        let mut counter = LineCounter::new();
        counter.update(10 * CYCLES_PER_LINE);
        // ly = 10, current line ends at 11 * 456.
        assert_eq!(counter.ly(), 10);

        let cc = 10 * CYCLES_PER_LINE + 1;
        // An offset later in this frame resolves within it.
        assert_eq!(counter.next_frame_cycle(20 * CYCLES_PER_LINE, cc), 20 * CYCLES_PER_LINE);
        // An offset already passed resolves into the next frame.
        assert_eq!(
            counter.next_frame_cycle(5 * CYCLES_PER_LINE, cc),
            FRAME_CYCLES + 5 * CYCLES_PER_LINE
        );
    }

    #[test]
    fn next_frame_cycle_result_is_within_one_frame() {
        let mut counter = LineCounter::new();
        counter.update(40 * CYCLES_PER_LINE + 123);
        let cc = 40 * CYCLES_PER_LINE + 123;
        for frame_cycle in [0, 453, 454, 69786, FRAME_CYCLES - 1] {
            let target = counter.next_frame_cycle(frame_cycle, cc);
            let ahead = target.wrapping_sub(cc);
            assert!(ahead > 0 && ahead <= FRAME_CYCLES, "offset {frame_cycle}");
        }
    }

    #[test]
    fn double_speed_stretches_lines_and_offsets() {
        let mut counter = LineCounter::new();
        counter.set_double_speed(true);
        assert_eq!(counter.line_time(), 2 * CYCLES_PER_LINE);

        counter.reset(0, 0);
        assert_eq!(counter.ly(), 0);
        // Line 1 starts at 912 absolute cycles; the single-speed offset 456
        // stretches to match.
        assert_eq!(counter.next_frame_cycle(CYCLES_PER_LINE, 1), 2 * CYCLES_PER_LINE);
    }
}
