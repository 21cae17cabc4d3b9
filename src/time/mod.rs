//! Rational time arithmetic and time ranges (spec §3 "Rational time" /
//! "Time range").

use crate::foundation::error::{ToucanError, ToucanResult};

/// A precise time expressed as `value` frames at `rate` frames-per-second.
///
/// A time is *invalid* iff `rate <= 0`; invalid times act as identity in
/// offsets (see [`RationalTime::is_invalid`] and its use in
/// `image_node::exec`'s time-offset subtraction).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RationalTime {
    /// Time value in frames at `rate`.
    pub value: f64,
    /// Frames-per-second this value is expressed in.
    pub rate: f64,
}

impl RationalTime {
    /// Construct a rational time. Does not validate; invalidity is defined
    /// purely by `rate <= 0` and checked by [`RationalTime::is_invalid`].
    pub fn new(value: f64, rate: f64) -> Self {
        Self { value, rate }
    }

    /// `true` iff `rate <= 0`.
    pub fn is_invalid(self) -> bool {
        self.rate <= 0.0
    }

    /// Rescale to a new rate, preserving the time in seconds.
    pub fn rescaled_to(self, rate: f64) -> Self {
        if self.rate == rate {
            return Self { value: self.value, rate };
        }
        Self {
            value: self.value * rate / self.rate,
            rate,
        }
    }

    /// `floor(value)` as the integer frame index.
    pub fn to_frames(self) -> i64 {
        self.value.floor() as i64
    }

    /// Floor this time in place (rate unchanged).
    pub fn floor(self) -> Self {
        Self {
            value: self.value.floor(),
            rate: self.rate,
        }
    }

    /// Round this time in place (rate unchanged).
    pub fn round(self) -> Self {
        Self {
            value: self.value.round(),
            rate: self.rate,
        }
    }

    /// Add two times. When rates differ the right-hand side is rescaled to
    /// the left-hand side's rate first.
    pub fn add(self, rhs: Self) -> Self {
        let rhs = rhs.rescaled_to(self.rate);
        Self {
            value: self.value + rhs.value,
            rate: self.rate,
        }
    }

    /// Subtract two times, rescaling `rhs` to `self`'s rate first.
    ///
    /// An invalid `rhs` (§3: "invalid times act as identity in offsets")
    /// leaves `self` unchanged rather than rescaling a non-positive rate.
    pub fn sub(self, rhs: Self) -> Self {
        if rhs.is_invalid() {
            return self;
        }
        let rhs = rhs.rescaled_to(self.rate);
        Self {
            value: self.value - rhs.value,
            rate: self.rate,
        }
    }
}

impl std::ops::Add for RationalTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        RationalTime::add(self, rhs)
    }
}

impl std::ops::Sub for RationalTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        RationalTime::sub(self, rhs)
    }
}

/// A half-open time range `[start, start + duration)`, both rational at
/// equal rate (spec §3).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
    /// Range start (inclusive).
    pub start: RationalTime,
    /// Range duration in the same rate as `start`.
    pub duration: RationalTime,
}

impl TimeRange {
    /// Construct a time range. `start` and `duration` must share a rate;
    /// mismatched rates are an [`ToucanError::InvalidArgument`].
    pub fn new(start: RationalTime, duration: RationalTime) -> ToucanResult<Self> {
        if (start.rate - duration.rate).abs() > f64::EPSILON {
            return Err(ToucanError::invalid_argument(
                "TimeRange start and duration must share a rate",
            ));
        }
        Ok(Self { start, duration })
    }

    /// `start + duration - (1, rate)`, i.e. the last instant inside the
    /// range (spec §3).
    pub fn end_time_inclusive(self) -> RationalTime {
        self.start.add(self.duration).sub(RationalTime::new(1.0, self.start.rate))
    }

    /// `start <= t < start + duration` (half-open containment, spec §3).
    pub fn contains(self, t: RationalTime) -> bool {
        let t = t.rescaled_to(self.start.rate);
        let end = self.start.add(self.duration);
        t.value >= self.start.value && t.value < end.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt(v: f64, r: f64) -> RationalTime {
        RationalTime::new(v, r)
    }

    #[test]
    fn invalid_rate() {
        assert!(rt(1.0, 0.0).is_invalid());
        assert!(rt(1.0, -1.0).is_invalid());
        assert!(!rt(1.0, 24.0).is_invalid());
    }

    #[test]
    fn to_frames_floors() {
        assert_eq!(rt(3.9, 24.0).to_frames(), 3);
        assert_eq!(rt(-0.1, 24.0).to_frames(), -1);
    }

    #[test]
    fn sub_with_invalid_rhs_is_identity() {
        let t = rt(10.0, 24.0);
        let offset = rt(0.0, -1.0);
        assert_eq!(t.sub(offset).value, t.value);
    }

    #[test]
    fn rescale_preserves_seconds() {
        let t = rt(24.0, 24.0); // 1 second
        let r = t.rescaled_to(48.0);
        assert_eq!(r.value, 48.0);
    }

    #[test]
    fn range_contains_is_half_open() {
        let r = TimeRange::new(rt(10.0, 24.0), rt(5.0, 24.0)).unwrap();
        assert!(r.contains(rt(10.0, 24.0)));
        assert!(r.contains(rt(14.0, 24.0)));
        assert!(!r.contains(rt(15.0, 24.0)));
        assert!(!r.contains(rt(9.0, 24.0)));
    }

    #[test]
    fn end_time_inclusive_is_last_frame() {
        let r = TimeRange::new(rt(0.0, 24.0), rt(24.0, 24.0)).unwrap();
        assert_eq!(r.end_time_inclusive().value, 23.0);
    }

    #[test]
    fn mismatched_rate_is_invalid_argument() {
        let err = TimeRange::new(rt(0.0, 24.0), rt(1.0, 30.0)).unwrap_err();
        assert!(matches!(err, ToucanError::InvalidArgument(_)));
    }
}
