use super::util::flush_denormal;

/*
Fractional Delay Line
=====================

A ring buffer of past samples. The write cursor advances exactly one slot per
sample and wraps at the active length; reads look back a (possibly
fractional) number of samples from the cursor.

    storage:  [ . . . . . . . . . . . . . . . . ]
                        ↑ read (write - delay)
                                    ↑ write

Storage is allocated once, at construction, for the longest delay the line
will ever need. The *active* length can be shortened at runtime (for example
when a pooled buffer is reassigned to a shorter delay) without touching the
allocation, which keeps clearing cheap and the realtime path allocation-free.

Reads happen before the write for the same sample, so a delay of 1.0 returns
the previous input. Delays are clamped to at least 1.0 so a read can never
land on or ahead of the write cursor; the upper clamp leaves GUARD_SAMPLES
of headroom for the interpolator.

Linear interpolation between the two neighbouring samples handles the
fractional part.
*/

/// Extra samples kept beyond the longest delay.
pub const GUARD_SAMPLES: usize = 4;

pub struct DelayLine {
    buffer: Vec<f32>,
    len: usize,
    write_pos: usize,
}

impl DelayLine {
    /// Allocate a line able to hold `max_delay_samples` of history.
    pub fn new(max_delay_samples: usize) -> Self {
        let capacity = max_delay_samples.max(1) + GUARD_SAMPLES;
        Self {
            buffer: vec![0.0; capacity],
            len: capacity,
            write_pos: 0,
        }
    }

    /// Longest delay the allocation supports.
    pub fn capacity(&self) -> usize {
        self.buffer.len() - GUARD_SAMPLES
    }

    /// Longest delay the current active length supports.
    pub fn max_delay(&self) -> f32 {
        (self.len - GUARD_SAMPLES) as f32
    }

    /// Shrink or grow the active region (within the allocation) and clear it.
    pub fn set_active_len(&mut self, max_delay_samples: usize) {
        let len = (max_delay_samples.max(1) + GUARD_SAMPLES).min(self.buffer.len());
        self.len = len;
        self.clear();
    }

    pub fn active_len(&self) -> usize {
        self.len
    }

    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Read `delay` samples behind the write cursor with linear interpolation.
    #[inline]
    pub fn read_interpolated(&self, delay: f32) -> f32 {
        let delay = if delay.is_finite() {
            delay.clamp(1.0, self.max_delay())
        } else {
            1.0
        };

        let whole = delay.floor();
        let frac = delay - whole;
        let whole = whole as usize;

        let a = self.buffer[(self.write_pos + self.len - whole) % self.len];
        let b = self.buffer[(self.write_pos + self.len - whole - 1) % self.len];
        a + (b - a) * frac
    }

    /// Read an integer number of samples behind the write cursor.
    #[inline]
    pub fn read(&self, delay_samples: usize) -> f32 {
        let delay = delay_samples.clamp(1, self.len - GUARD_SAMPLES);
        self.buffer[(self.write_pos + self.len - delay) % self.len]
    }

    /// Store a sample and advance the cursor by exactly one slot.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = if sample.is_finite() {
            flush_denormal(sample)
        } else {
            0.0
        };
        self.write_pos += 1;
        if self.write_pos >= self.len {
            self.write_pos = 0;
        }
    }

    pub fn next_sample(&mut self, sample: f32, delay_samples: usize) -> f32 {
        let delayed = self.read(delay_samples);
        self.write(sample);
        delayed
    }

    pub fn render(&mut self, buffer: &mut [f32], delay_samples: usize) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample(*sample, delay_samples);
        }
    }

    /// Zero the active region and rewind the cursor.
    pub fn clear(&mut self) {
        self.buffer[..self.len].fill(0.0);
        self.write_pos = 0;
    }

    pub fn reset(&mut self) {
        self.len = self.buffer.len();
        self.clear();
    }
}
