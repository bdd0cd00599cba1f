//! Importance estimation.
//!
//! Folds every consumer's visibility sample into a single footprint estimate
//! per resource: how many screen pixels the texture is likely to cover,
//! weighted toward the camera's view direction. The footprint drives the
//! desired discard level, so all streaming policy flows from here.
//!
//! Two values are maintained side by side: the raw maximum across consumers
//! (`unbiased_vsize`) and the same value divided down under memory pressure
//! (`biased_vsize`). Which one the discard controller obeys depends on the
//! resource's class and proximity.

use texture_streamer_cache::{
    PriorityClass, StreamerConfig, TextureResource, VisibilitySample, MAX_VIRTUAL_SIZE,
};
use texture_streamer_scheduler::SchedulerContext;

/// What the estimator learned about a resource this sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportanceVerdict {
    /// Any fresh sample was inside the view frustum
    pub on_screen: bool,

    /// Any fresh sample was within the near-camera threshold
    pub near_camera: bool,

    /// Largest camera-direction importance across fresh samples
    pub max_importance: f32,
}

/// Footprint divisor for a given bias: one extra discard level per whole
/// bias step (4x pixels per level).
pub fn bias_divisor(bias: f32) -> f32 {
    4f32.powf(bias - 1.0).round().max(1.0)
}

/// Whether the bias divisor applies to a resource with the given verdict.
///
/// Off-screen resources are always biased. On-screen resources start being
/// biased too once the bias climbs past neutral by more than half their
/// camera importance, so centered textures hold out longest.
fn bias_applies(verdict: &ImportanceVerdict, bias: f32) -> bool {
    !verdict.on_screen || bias > 1.0 + verdict.max_importance * 0.5
}

/// Fold one consumer sample into a footprint estimate.
///
/// Centered consumers are boosted in proportion to their camera importance;
/// near-camera consumers get the full boost regardless of direction.
fn sample_footprint(sample: &VisibilitySample, cfg: &StreamerConfig) -> f32 {
    let scale = sample
        .texture_scale
        .clamp(cfg.texture_scale_min, cfg.texture_scale_max);
    let mut vsize = sample.pixel_area / (scale * scale);
    if sample.camera_importance > 0.0 {
        vsize += vsize * sample.camera_importance * cfg.camera_boost;
    }
    if sample.near_camera {
        vsize += vsize * cfg.camera_boost;
    }
    vsize.min(MAX_VIRTUAL_SIZE)
}

/// Re-estimate a resource's footprint from its consumer samples.
///
/// Updates `unbiased_vsize`, `biased_vsize`, the `virtual_size` accumulator
/// and the `on_screen` flag in place, and returns the per-sweep verdict the
/// discard controller needs.
pub fn update_importance(
    res: &mut TextureResource,
    cfg: &StreamerConfig,
    ctx: &SchedulerContext,
) -> ImportanceVerdict {
    // Heavily shared textures: scanning every consumer would dominate the
    // sweep, and anything referenced that widely is worth keeping sharp.
    if res.consumer_count() > cfg.fan_out_threshold {
        if res.priority_class < PriorityClass::High {
            res.priority_class = PriorityClass::High;
        }
        let full = res.full_pixel_area() as f32;
        res.unbiased_vsize = full.min(MAX_VIRTUAL_SIZE);
        res.biased_vsize = res.unbiased_vsize;
        res.add_texture_stats(res.unbiased_vsize);
        res.on_screen = true;
        return ImportanceVerdict {
            on_screen: true,
            near_camera: true,
            max_importance: 1.0,
        };
    }

    let mut verdict = ImportanceVerdict::default();
    let mut max_vsize = 0.0f32;

    for sample in res.consumers.values() {
        let fresh = ctx.tick().saturating_sub(sample.tick) <= cfg.sample_staleness_ticks;
        if fresh && sample.on_screen {
            verdict.on_screen = true;
            verdict.max_importance = verdict.max_importance.max(sample.camera_importance);
            if sample.near_camera {
                verdict.near_camera = true;
            }
        }

        max_vsize = max_vsize.max(sample_footprint(sample, cfg));
    }

    // the accumulator is the authority: it persists across ticks (seeded by
    // the prefetch manifest, reset only by decay), so a texture seen big
    // keeps its estimate while briefly unsampled
    res.add_texture_stats(max_vsize);
    let basis = res.virtual_size;

    res.unbiased_vsize = basis;
    res.on_screen = verdict.on_screen;

    let bias = ctx.bias();
    res.biased_vsize = if res.priority_class.is_bias_exempt() || !bias_applies(&verdict, bias) {
        basis
    } else {
        basis / bias_divisor(bias)
    };

    verdict
}
