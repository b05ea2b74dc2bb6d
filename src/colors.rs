//! Packed RGB color helpers.
//!
//! Colors are `0x00RRGGBB`. Every combining operation saturates each channel
//! at `0xFF` independently; nothing wraps.

/// Packed 24-bit color, R in bits 16-23, G in 8-15, B in 0-7.
pub type Rgb = u32;

pub const BLACK: Rgb = 0x000000;
pub const WHITE: Rgb = 0xFFFFFF;

const CHANNEL_MAX: u32 = 0xFF;

/// Splits a packed color into its (r, g, b) channels.
#[inline]
pub fn split(color: Rgb) -> (u32, u32, u32) {
    ((color >> 16) & 0xFF, (color >> 8) & 0xFF, color & 0xFF)
}

/// Packs channels, clamping each to `0xFF`.
#[inline]
pub fn combine(r: u32, g: u32, b: u32) -> Rgb {
    (r.min(CHANNEL_MAX) << 16) | (g.min(CHANNEL_MAX) << 8) | b.min(CHANNEL_MAX)
}

#[inline]
pub fn add(c1: Rgb, c2: Rgb) -> Rgb {
    let (r1, g1, b1) = split(c1);
    let (r2, g2, b2) = split(c2);
    combine(r1 + r2, g1 + g2, b1 + b2)
}

#[inline]
pub fn add3(c1: Rgb, c2: Rgb, c3: Rgb) -> Rgb {
    add(add(c1, c2), c3)
}

/// Multiplies every channel by `factor` (negative factors give black).
#[inline]
pub fn scale(color: Rgb, factor: f64) -> Rgb {
    let (r, g, b) = split(color);
    let f = factor.max(0.0);
    let channel = |c: u32| (c as f64 * f).min(CHANNEL_MAX as f64) as u32;
    combine(channel(r), channel(g), channel(b))
}

/// Color of `light` after reflecting off a surface of color `surface`.
#[inline]
pub fn reflect(light: Rgb, surface: Rgb) -> Rgb {
    let (lr, lg, lb) = split(light);
    let (sr, sg, sb) = split(surface);
    combine(lr * sr / CHANNEL_MAX, lg * sg / CHANNEL_MAX, lb * sb / CHANNEL_MAX)
}

/// Converts to an `[r, g, b]` byte triple.
#[inline]
pub fn to_bytes(color: Rgb) -> [u8; 3] {
    let (r, g, b) = split(color);
    [r as u8, g as u8, b as u8]
}
