//! Composite proxy score.

use adlib_core::MediaMix;

pub const DURATION_WEIGHT: f64 = 0.5;
pub const TEXT_WEIGHT: f64 = 0.3;
/// Hours at which the duration term is ~76% saturated.
pub const DURATION_SATURATION_HOURS: f64 = 72.0;
pub const TEXT_SATURATION_CHARS: f64 = 400.0;
pub const USA_BONUS: f64 = 0.15;

pub fn media_bonus(mix: MediaMix) -> f64 {
    match mix {
        MediaMix::Both => 0.10,
        MediaMix::VideoOnly => 0.07,
        MediaMix::ImageOnly => 0.05,
        MediaMix::None => 0.0,
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Rounded to four decimals and bounded to `[0, 1]`.
pub fn proxy_score(duration_hours: Option<f64>, body_chars: usize, is_usa: bool, mix: MediaMix) -> f64 {
    let duration = duration_hours.filter(|h| h.is_finite()).unwrap_or(0.0).max(0.0);
    let duration_norm = (duration / DURATION_SATURATION_HOURS).tanh();
    let text_norm = (body_chars as f64 / TEXT_SATURATION_CHARS).tanh();
    let usa_bonus = if is_usa { USA_BONUS } else { 0.0 };

    let raw = DURATION_WEIGHT * duration_norm + TEXT_WEIGHT * text_norm + usa_bonus + media_bonus(mix);
    round4(raw).clamp(0.0, 1.0)
}
