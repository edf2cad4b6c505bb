/*
Euclidean Rhythms
=================

Spread `k` onsets as evenly as possible over `n` steps. Many traditional
rhythms fall out of this: E(3, 8) is the Cuban tresillo, E(5, 8) the
cinquillo, E(7, 16) a samba pattern.

    E(3, 8)   x . . x . . x .
    E(5, 8)   x . x x . x x .

Bjorklund's Construction
------------------------

The same repeated-division idea as Euclid's GCD algorithm. Start with `k`
one-element "pulse" groups and `n − k` "rest" groups, then keep dealing the
smaller pile onto the bigger one:

    divisor = n − k
    remainders[0] = k
    repeat:
        counts[i]         = divisor / remainders[i]
        remainders[i + 1] = divisor % remainders[i]
        divisor           = remainders[i]
    until remainders[i + 1] ≤ 1

`counts` and `remainders` then describe a tree that flattens recursively:
level −1 emits a rest, level −2 a pulse, and level i emits `counts[i]`
copies of level i − 1 followed by level i − 2 when `remainders[i]` is
non-zero.

The flattened pattern is rotated so its first pulse sits on step 0 (the
canonical form), then rotated right by the user's rotation.

Storage
-------

Patterns live in a fixed `[bool; 64]`, so building one never allocates. It
is still more than O(1) work, so the generator only rebuilds when length,
pulses or rotation actually change.
*/

pub const MAX_STEPS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    steps: [bool; MAX_STEPS],
    len: usize,
    pulses: usize,
    rotation: usize,
}

/// Clamp user-facing inputs into a valid (len, pulses, rotation) triple.
fn normalize(len: usize, pulses: usize, rotation: usize) -> (usize, usize, usize) {
    let len = len.clamp(1, MAX_STEPS);
    (len, pulses.min(len), rotation % len)
}

struct Builder {
    counts: [usize; MAX_STEPS + 1],
    remainders: [usize; MAX_STEPS + 1],
    out: [bool; MAX_STEPS],
    cursor: usize,
}

impl Builder {
    fn emit(&mut self, value: bool) {
        if self.cursor < MAX_STEPS {
            self.out[self.cursor] = value;
            self.cursor += 1;
        }
    }

    fn build(&mut self, level: isize) {
        match level {
            -1 => self.emit(false),
            -2 => self.emit(true),
            _ => {
                let l = level as usize;
                for _ in 0..self.counts[l] {
                    self.build(level - 1);
                }
                if self.remainders[l] != 0 {
                    self.build(level - 2);
                }
            }
        }
    }
}

/// Evenly distribute `pulses` onsets over `len` steps, unrotated.
fn bjorklund(len: usize, pulses: usize) -> [bool; MAX_STEPS] {
    let mut steps = [false; MAX_STEPS];
    if pulses == 0 {
        return steps;
    }
    if pulses >= len {
        steps[..len].fill(true);
        return steps;
    }

    let mut b = Builder {
        counts: [0; MAX_STEPS + 1],
        remainders: [0; MAX_STEPS + 1],
        out: [false; MAX_STEPS],
        cursor: 0,
    };

    let mut divisor = len - pulses;
    b.remainders[0] = pulses;
    let mut level = 0;
    loop {
        b.counts[level] = divisor / b.remainders[level];
        b.remainders[level + 1] = divisor % b.remainders[level];
        divisor = b.remainders[level];
        level += 1;
        if b.remainders[level] <= 1 {
            break;
        }
    }
    b.counts[level] = divisor;
    b.build(level as isize);

    b.out
}

impl Pattern {
    pub fn new(len: usize, pulses: usize, rotation: usize) -> Self {
        let (len, pulses, rotation) = normalize(len, pulses, rotation);
        let raw = bjorklund(len, pulses);

        let first = raw[..len].iter().position(|&s| s).unwrap_or(0);
        let mut steps = [false; MAX_STEPS];
        for i in 0..len {
            let canonical = raw[(i + first) % len];
            steps[(i + rotation) % len] = canonical;
        }

        Self {
            steps,
            len,
            pulses,
            rotation,
        }
    }

    /// Rebuild only if the (normalized) inputs differ. Returns true on rebuild.
    pub fn update(&mut self, len: usize, pulses: usize, rotation: usize) -> bool {
        if normalize(len, pulses, rotation) == (self.len, self.pulses, self.rotation) {
            return false;
        }
        *self = Self::new(len, pulses, rotation);
        true
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn pulses(&self) -> usize {
        self.pulses
    }

    pub fn rotation(&self) -> usize {
        self.rotation
    }

    /// Step value; the index wraps at the pattern length.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        self.steps[index % self.len]
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.steps[..self.len]
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new(16, 4, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(s: &str) -> Vec<bool> {
        s.chars().map(|c| c == 'x').collect()
    }

    #[test]
    fn tresillo() {
        assert_eq!(
            Pattern::new(8, 3, 0).as_slice(),
            &[true, false, false, true, false, false, true, false]
        );
    }

    #[test]
    fn known_rhythms() {
        assert_eq!(Pattern::new(8, 5, 0).as_slice(), pattern("x.xx.xx.").as_slice());
        assert_eq!(Pattern::new(4, 1, 0).as_slice(), pattern("x...").as_slice());
        assert_eq!(Pattern::new(16, 4, 0).as_slice(), pattern("x...x...x...x...").as_slice());
    }

    #[test]
    fn rotation_shifts_right() {
        let base = Pattern::new(8, 3, 0);
        let rotated = Pattern::new(8, 3, 1);
        for i in 0..8 {
            assert_eq!(rotated.get(i + 1), base.get(i));
        }
        assert_eq!(Pattern::new(8, 3, 9), rotated, "rotation is taken modulo length");
    }

    #[test]
    fn zero_pulses_is_silent() {
        for n in 1..=MAX_STEPS {
            for r in [0, 1, n / 2, n + 3] {
                assert!(Pattern::new(n, 0, r).as_slice().iter().all(|&s| !s));
            }
        }
    }

    #[test]
    fn full_pulses_fire_every_step() {
        for n in 1..=MAX_STEPS {
            for r in [0, 1, n / 2, n + 3] {
                assert!(Pattern::new(n, n, r).as_slice().iter().all(|&s| s));
            }
        }
        assert!(Pattern::new(8, 20, 0).as_slice().iter().all(|&s| s));
    }

    #[test]
    fn pulse_count_is_preserved() {
        for n in 1..=MAX_STEPS {
            for k in 0..=n {
                let p = Pattern::new(n, k, 3);
                assert_eq!(p.len(), n);
                assert_eq!(p.as_slice().iter().filter(|&&s| s).count(), k, "E({k},{n})");
            }
        }
    }

    #[test]
    fn generation_is_pure() {
        for (n, k, r) in [(8, 3, 0), (13, 5, 7), (64, 27, 11)] {
            assert_eq!(Pattern::new(n, k, r), Pattern::new(n, k, r));
        }
    }

    #[test]
    fn update_only_rebuilds_on_change() {
        let mut p = Pattern::new(8, 3, 0);
        assert!(!p.update(8, 3, 0));
        assert!(!p.update(8, 3, 8));
        assert!(p.update(8, 5, 0));
        assert_eq!(p.pulses(), 5);
    }
}
