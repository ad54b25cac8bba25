//! crypto/constant_time.rs
//! Branchless comparison primitives.
//!
//! Every function here is constant time: results are masks (all ones for
//! true, zero for false) computed with wrapping arithmetic and bitwise ops
//! only. No data-dependent branch, table lookup or early exit. The padding
//! check of the record codec relies on this; do not rewrite any of these
//! with `if`, `match`, `==` or `<`.

use std::hint::black_box;

/// Spread the top bit of `a` over the whole word.
#[inline]
pub fn msb(a: u32) -> u32 {
    0u32.wrapping_sub(black_box(a) >> 31)
}

/// Mask of `a < b`.
#[inline]
pub fn lt(a: u32, b: u32) -> u32 {
    msb(a ^ ((a ^ b) | (a.wrapping_sub(b) ^ b)))
}

/// Mask of `a >= b`.
#[inline]
pub fn ge(a: u32, b: u32) -> u32 {
    !lt(a, b)
}

/// `ge` truncated to a byte mask.
#[inline]
pub fn ge_8(a: u32, b: u32) -> u8 {
    ge(a, b) as u8
}

/// Mask of `a == 0`.
#[inline]
pub fn is_zero(a: u32) -> u32 {
    msb(!a & a.wrapping_sub(1))
}

/// Mask of `a == b`.
#[inline]
pub fn eq(a: u32, b: u32) -> u32 {
    is_zero(a ^ b)
}

/// `eq` truncated to a byte mask.
#[inline]
pub fn eq_8(a: u32, b: u32) -> u8 {
    eq(a, b) as u8
}

/// `a` where `mask` is all ones, `b` where it is zero.
#[inline]
pub fn select(mask: u32, a: u32, b: u32) -> u32 {
    (mask & a) | (!mask & b)
}

/// Collapse a mask to 1 / 0.
#[inline]
pub fn mask_to_bit(mask: u32) -> u32 {
    mask & 1
}
