#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Musical note duration represented as a rational fraction of a whole note.
/// Dots and tuplets stay exact, so tick counts never drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    /// Numerator: how many parts
    pub numerator: u32,
    /// Denominator: of what size (4 = quarter, 8 = eighth, etc.)
    pub denominator: u32,
}

impl Duration {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Duration {
            numerator,
            denominator,
        }
    }

    // Standard note values
    pub const TWO_BARS: Duration = Duration::new(2, 1);
    pub const WHOLE: Duration = Duration::new(1, 1);
    pub const HALF: Duration = Duration::new(1, 2);
    pub const QUARTER: Duration = Duration::new(1, 4);
    pub const EIGHTH: Duration = Duration::new(1, 8);
    pub const SIXTEENTH: Duration = Duration::new(1, 16);
    pub const THIRTY_SECOND: Duration = Duration::new(1, 32);

    /// Apply a dot: multiply duration by 3/2 (increases by 50%)
    pub const fn dotted(self) -> Self {
        Duration {
            numerator: self.numerator * 3,
            denominator: self.denominator * 2,
        }
    }

    /// Create a triplet: multiply duration by 2/3
    /// (three notes in the time of two)
    pub const fn triplet(self) -> Self {
        self.tuplet(2, 3)
    }

    /// General tuplet: `played` notes in the time of `in_time_of` notes
    /// E.g., `.tuplet(2, 3)` = triplet (3 in time of 2)
    pub const fn tuplet(self, in_time_of: u32, played: u32) -> Self {
        Duration {
            numerator: self.numerator * in_time_of,
            denominator: self.denominator * played,
        }
    }

    /// Reduce the fraction to lowest terms using GCD
    pub const fn reduce(self) -> Self {
        let gcd = const_gcd(self.numerator, self.denominator);
        if gcd == 0 {
            return self;
        }
        Duration {
            numerator: self.numerator / gcd,
            denominator: self.denominator / gcd,
        }
    }

    /// Convert this duration to integer clock ticks.
    /// ppq = pulses per quarter note.
    /// Formula: ticks = (numerator * 4 * ppq) / denominator
    pub const fn to_ticks(&self, ppq: u32) -> u32 {
        (self.numerator * 4 * ppq) / self.denominator
    }

    /// Length in quarter notes.
    pub fn quarters(&self) -> f32 {
        (self.numerator * 4) as f32 / self.denominator as f32
    }

    /// Length in seconds at `bpm` quarter notes per minute.
    pub fn seconds(&self, bpm: f32) -> f32 {
        self.quarters() * 60.0 / bpm.max(f32::EPSILON)
    }
}

/// Compute greatest common divisor (Euclidean algorithm)
/// Used to reduce fractions to lowest terms
const fn const_gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let temp = b;
        b = a % b;
        a = temp;
    }
    a
}

/*
| index | NoteDivision     | quarters | ticks @48 |
| ----- | ---------------- | -------- | --------- |
| 0     | 1/32             | 0.125    | 6         |
| 1     | 1/16 triplet     | 0.1667   | 8         |
| 2     | 1/16             | 0.25     | 12        |
| 3     | 1/8 triplet      | 0.3333   | 16        |
| 4     | 1/16 dotted      | 0.375    | 18        |
| 5     | 1/8              | 0.5      | 24        |
| 6     | 1/4 triplet      | 0.6667   | 32        |
| 7     | 1/8 dotted       | 0.75     | 36        |
| 8     | 1/4              | 1        | 48        |
| 9     | 1/2 triplet      | 1.3333   | 64        |
| 10    | 1/4 dotted       | 1.5      | 72        |
| 11    | 1/2              | 2        | 96        |
| 12    | whole triplet    | 2.6667   | 128       |
| 13    | 1/2 dotted       | 3        | 144       |
| 14    | whole            | 4        | 192       |
| 15    | two bars         | 8        | 384       |
*/

/// The sixteen note values a synced delay can lock to, shortest first.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteDivision {
    ThirtySecond,
    SixteenthTriplet,
    Sixteenth,
    EighthTriplet,
    DottedSixteenth,
    Eighth,
    QuarterTriplet,
    DottedEighth,
    Quarter,
    HalfTriplet,
    DottedQuarter,
    Half,
    WholeTriplet,
    DottedHalf,
    Whole,
    TwoBars,
}

impl NoteDivision {
    pub const ALL: [NoteDivision; 16] = [
        NoteDivision::ThirtySecond,
        NoteDivision::SixteenthTriplet,
        NoteDivision::Sixteenth,
        NoteDivision::EighthTriplet,
        NoteDivision::DottedSixteenth,
        NoteDivision::Eighth,
        NoteDivision::QuarterTriplet,
        NoteDivision::DottedEighth,
        NoteDivision::Quarter,
        NoteDivision::HalfTriplet,
        NoteDivision::DottedQuarter,
        NoteDivision::Half,
        NoteDivision::WholeTriplet,
        NoteDivision::DottedHalf,
        NoteDivision::Whole,
        NoteDivision::TwoBars,
    ];

    /// Out-of-range indices clamp to the nearest end of the table.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub const fn duration(self) -> Duration {
        match self {
            NoteDivision::ThirtySecond => Duration::THIRTY_SECOND,
            NoteDivision::SixteenthTriplet => Duration::SIXTEENTH.triplet(),
            NoteDivision::Sixteenth => Duration::SIXTEENTH,
            NoteDivision::EighthTriplet => Duration::EIGHTH.triplet(),
            NoteDivision::DottedSixteenth => Duration::SIXTEENTH.dotted(),
            NoteDivision::Eighth => Duration::EIGHTH,
            NoteDivision::QuarterTriplet => Duration::QUARTER.triplet(),
            NoteDivision::DottedEighth => Duration::EIGHTH.dotted(),
            NoteDivision::Quarter => Duration::QUARTER,
            NoteDivision::HalfTriplet => Duration::HALF.triplet(),
            NoteDivision::DottedQuarter => Duration::QUARTER.dotted(),
            NoteDivision::Half => Duration::HALF,
            NoteDivision::WholeTriplet => Duration::WHOLE.triplet(),
            NoteDivision::DottedHalf => Duration::HALF.dotted(),
            NoteDivision::Whole => Duration::WHOLE,
            NoteDivision::TwoBars => Duration::TWO_BARS,
        }
    }

    pub fn quarters(self) -> f32 {
        self.duration().quarters()
    }
}

/// Musical-grid ratios available on the master clock's divided outputs.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDivision {
    TwoBars,
    Whole,
    Half,
    Quarter,
    Eighth,
    EighthTriplet,
    Sixteenth,
    SixteenthTriplet,
    ThirtySecond,
}

impl ClockDivision {
    pub const ALL: [ClockDivision; 9] = [
        ClockDivision::TwoBars,
        ClockDivision::Whole,
        ClockDivision::Half,
        ClockDivision::Quarter,
        ClockDivision::Eighth,
        ClockDivision::EighthTriplet,
        ClockDivision::Sixteenth,
        ClockDivision::SixteenthTriplet,
        ClockDivision::ThirtySecond,
    ];

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub const fn duration(self) -> Duration {
        match self {
            ClockDivision::TwoBars => Duration::TWO_BARS,
            ClockDivision::Whole => Duration::WHOLE,
            ClockDivision::Half => Duration::HALF,
            ClockDivision::Quarter => Duration::QUARTER,
            ClockDivision::Eighth => Duration::EIGHTH,
            ClockDivision::EighthTriplet => Duration::EIGHTH.triplet(),
            ClockDivision::Sixteenth => Duration::SIXTEENTH,
            ClockDivision::SixteenthTriplet => Duration::SIXTEENTH.triplet(),
            ClockDivision::ThirtySecond => Duration::THIRTY_SECOND,
        }
    }

    /// Master-clock ticks between pulses of this division.
    pub fn ticks(self, ppq: u32) -> u32 {
        self.duration().to_ticks(ppq).max(1)
    }
}
