//! Q16.16 fixed-point arithmetic for the control loops
//!
//! Gains like `ki = 0.0127` sit well below the resolution of the ×100
//! scaled integers used for process values, so gain storage and loop math
//! run in Q16.16 instead. No FPU required.

use core::ops::{Add, Neg, Sub};

/// Q16.16 fixed-point number.
///
/// Range roughly ±32768 with a resolution of about 0.000015 — wide enough
/// for every gain, output and intermediate term in this crate, fine enough
/// for an integral gain clamped down to 0.01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fixed32(pub i32);

impl Fixed32 {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1 << 16);
    /// 0.5, the PWM-style activation threshold on controller output.
    pub const HALF: Self = Self(1 << 15);
    /// 3.14159 in Q16.16.
    pub const PI: Self = Self(205_887);

    /// Fractional bits.
    pub const FRAC_BITS: u32 = 16;

    /// Build from a whole number.
    #[inline]
    pub const fn from_int(n: i16) -> Self {
        Self((n as i32) << Self::FRAC_BITS)
    }

    /// Build from a value scaled by 100 (e.g. 37.50 stored as 3750).
    ///
    /// Only valid for |n| ≤ 32767·100; process values and gains stay far
    /// inside that.
    #[inline]
    pub const fn from_scaled_100(n: i32) -> Self {
        Self(((n as i64 * (1 << Self::FRAC_BITS)) / 100) as i32)
    }

    /// Build from a value scaled by 1000, for small coefficients like 0.075.
    #[inline]
    pub const fn from_scaled_1000(n: i32) -> Self {
        Self(((n as i64 * (1 << Self::FRAC_BITS)) / 1000) as i32)
    }

    /// Whole part, truncated toward negative infinity.
    #[inline]
    pub const fn to_int(self) -> i16 {
        (self.0 >> Self::FRAC_BITS) as i16
    }

    /// Value scaled by 100.
    #[inline]
    pub const fn to_scaled_100(self) -> i32 {
        ((self.0 as i64 * 100) >> Self::FRAC_BITS) as i32
    }

    /// Value scaled by 1000, rounded to nearest. Gains persist at this
    /// resolution; rounding keeps an integral gain at its 0.01 floor stable
    /// across save/load cycles.
    #[inline]
    pub const fn to_scaled_1000(self) -> i32 {
        ((self.0 as i64 * 1000 + (1 << (Self::FRAC_BITS - 1))) >> Self::FRAC_BITS) as i32
    }

    /// Fixed × fixed, saturating at the representation limits.
    #[inline]
    pub fn mul(self, rhs: Self) -> Self {
        let wide = ((self.0 as i64) * (rhs.0 as i64)) >> Self::FRAC_BITS;
        Self(clamp_to_i32(wide))
    }

    /// Fixed ÷ fixed, saturating. A zero divisor yields zero; callers that
    /// care guard the divisor themselves.
    #[inline]
    pub fn div(self, rhs: Self) -> Self {
        if rhs.0 == 0 {
            return Self::ZERO;
        }
        let wide = ((self.0 as i64) << Self::FRAC_BITS) / (rhs.0 as i64);
        Self(clamp_to_i32(wide))
    }

    /// Fixed × small integer, saturating.
    #[inline]
    pub fn mul_int(self, n: i32) -> Self {
        Self(self.0.saturating_mul(n))
    }

    #[inline]
    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    #[inline]
    pub fn clamp(self, min: Self, max: Self) -> Self {
        Self(self.0.clamp(min.0, max.0))
    }

    #[inline]
    pub fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }
}

impl Add for Fixed32 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Fixed32 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Fixed32 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

#[inline]
fn clamp_to_i32(wide: i64) -> i32 {
    wide.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_number_round_trip() {
        assert_eq!(Fixed32::from_int(0).to_int(), 0);
        assert_eq!(Fixed32::from_int(37).to_int(), 37);
        assert_eq!(Fixed32::from_int(-5).to_int(), -5);
    }

    #[test]
    fn scaled_conversions() {
        // 37.50 °C as stored by the sensors
        assert_eq!(Fixed32::from_scaled_100(3750).to_scaled_100(), 3750);
        // 0.075, the smallest Ziegler-Nichols constant
        assert_eq!(Fixed32::from_scaled_1000(75).to_scaled_1000(), 75);
        assert_eq!(Fixed32::from_int(2).to_scaled_100(), 200);
        // ki at its clamp floor survives ×1000 persistence
        assert_eq!(Fixed32::from_scaled_100(1).to_scaled_1000(), 10);
    }

    #[test]
    fn negative_truncation_floors() {
        // arithmetic shift truncates toward negative infinity
        assert_eq!(Fixed32::from_scaled_100(-150).to_int(), -2);
        assert_eq!(Fixed32::from_scaled_100(150).to_int(), 1);
    }

    #[test]
    fn multiply() {
        let kp = Fixed32::from_scaled_100(60); // 0.6
        let ku = Fixed32::from_scaled_1000(1273); // ~4/pi
        let got = kp.mul(ku).to_scaled_1000();
        assert!((763..=764).contains(&got), "0.6 * 1.273 ~= 0.764, got {got}");

        assert_eq!(Fixed32::from_int(3).mul(Fixed32::from_int(4)).to_int(), 12);
        assert_eq!(Fixed32::from_int(2).mul(Fixed32::HALF).to_int(), 1);
    }

    #[test]
    fn divide() {
        let six = Fixed32::from_int(6);
        assert_eq!(six.div(Fixed32::from_int(2)).to_int(), 3);
        // ki = 1.2 * Ku / Tu with a two-minute period
        let ki = Fixed32::from_scaled_100(120)
            .mul(Fixed32::from_scaled_1000(1273))
            .div(Fixed32::from_int(120));
        assert_eq!(ki.to_scaled_1000(), 13); // 0.0127 rounds to 0.013
    }

    #[test]
    fn divide_by_zero_is_zero() {
        assert_eq!(Fixed32::ONE.div(Fixed32::ZERO), Fixed32::ZERO);
    }

    #[test]
    fn saturation_instead_of_wrap() {
        let big = Fixed32::from_int(32000);
        assert!(!big.mul(big).is_negative());
        assert!(!big.saturating_add(big).is_negative());
        let tiny = Fixed32::from_raw(1);
        assert!(!Fixed32::from_int(30000).div(tiny).is_negative());
    }

    #[test]
    fn clamp_and_abs() {
        let lo = Fixed32::from_scaled_100(10);
        let hi = Fixed32::from_int(100);
        assert_eq!(Fixed32::from_int(200).clamp(lo, hi), hi);
        assert_eq!(Fixed32::from_int(-1).clamp(lo, hi), lo);
        assert_eq!(Fixed32::from_int(-7).abs().to_int(), 7);
    }

    #[test]
    fn ordering_matches_value() {
        assert!(Fixed32::HALF < Fixed32::ONE);
        assert!(Fixed32::from_scaled_100(51) > Fixed32::HALF);
        assert!(Fixed32::from_int(-1) < Fixed32::ZERO);
    }

    #[test]
    fn pi_constant() {
        assert_eq!(Fixed32::PI.to_scaled_1000(), 3141);
    }
}
