//! Discard level control.
//!
//! Maps footprint estimates to desired discard levels and decides which of
//! the two estimates (biased or unbiased) a resource must obey. Also owns
//! the decay policy that lets idle footprints fall back to zero under
//! memory pressure.

use texture_streamer_cache::{PriorityClass, StreamerConfig, TextureResource};
use texture_streamer_scheduler::SchedulerContext;

use crate::importance::ImportanceVerdict;

/// Levels below full resolution within which a resource is considered
/// close enough to sharp that bias should not push it coarser.
const NEAR_FULL_LEVELS: u8 = 2;

/// Desired discard level for a footprint of `vsize` screen pixels on a
/// texture of `full_area` source pixels.
///
/// Each discard level quarters the pixel count, so the level is the
/// base-4 log of the oversupply ratio, floored. Larger footprints always
/// map to the same or a finer (smaller) level.
pub fn desired_level_for(vsize: f32, full_area: u64, max_level: u8) -> u8 {
    if vsize <= 0.0 || full_area == 0 {
        return max_level;
    }
    // largest level whose quartered area still covers the footprint
    let mut level = 0u8;
    while level < max_level {
        let area_at_next = (full_area >> (2 * (level as u32 + 1))) as f32;
        if area_at_next >= vsize {
            level += 1;
        } else {
            break;
        }
    }
    level
}

/// Recompute a resource's desired level from the estimates the importance
/// pass just produced.
///
/// The unbiased estimate is authoritative for bias-exempt classes, for
/// near-camera resources, and whenever it already asks for a level close to
/// full resolution; everything else obeys the biased estimate.
pub fn update_desired_level(
    res: &mut TextureResource,
    verdict: &ImportanceVerdict,
    _cfg: &StreamerConfig,
) {
    let max_level = res.max_level();
    let full_area = res.full_pixel_area();

    let unbiased = desired_level_for(res.unbiased_vsize, full_area, max_level);

    let use_unbiased = res.priority_class.is_bias_exempt()
        || verdict.near_camera
        || unbiased < NEAR_FULL_LEVELS;

    res.desired_level = if use_unbiased {
        unbiased
    } else {
        desired_level_for(res.biased_vsize, full_area, max_level)
    };
}

/// Let footprint accumulators decay under memory pressure.
///
/// Only lowest-class resources forget their accumulated footprint: when the
/// bias is well past neutral, or when any elevated bias coincides with the
/// resource being off screen. Without this, a texture seen big once would
/// hold its fine level forever; any boosted class is trusted to matter.
pub fn maybe_decay(res: &mut TextureResource, cfg: &StreamerConfig, ctx: &SchedulerContext) {
    if res.priority_class != PriorityClass::None {
        return;
    }
    let bias = ctx.bias();
    if bias > cfg.decay_bias_threshold || (!res.on_screen && ctx.bias_elevated()) {
        res.reset_texture_stats();
    }
}
