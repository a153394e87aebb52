//! Mapping of remaining-time percentages onto discrete timer images.

/// Default number of images in a timer or progress-bar strip.
pub const DEFAULT_TIMER_FRAMES: usize = 17;

/// Index of the image to show for `remaining_pct` in a strip of `frames`
/// images: 0 when full, `frames - 1` when empty.
pub fn timer_frame(remaining_pct: f64, frames: usize) -> usize {
    if frames < 2 {
        return 0;
    }
    let last = frames - 1;
    let slice = 100.0 / last as f64;
    let pct = if remaining_pct.is_finite() {
        remaining_pct.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let filled = ((pct / slice).ceil() as usize).min(last);
    last - filled
}
