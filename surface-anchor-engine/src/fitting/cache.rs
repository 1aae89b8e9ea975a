//! Short-lived reuse of the last successful fit.
//!
//! Confirmation races the detection loop: the frame the user confirms on may
//! produce a miss even though the previous frame found a surface at the same
//! spot. A hit is kept for a brief window and handed out when a confirmation
//! lands close enough to where it was found.

use std::time::{Duration, Instant};

use bevy::math::Vec3;
use bevy::prelude::Resource;

use constants::detection::{RESULT_CACHE_DISTANCE_SQ, RESULT_CACHE_WINDOW_MS};

use crate::fitting::FitResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: FitResult,
    location: Vec3,
    stored_at: Instant,
}

/// Holds at most the latest successful fit. Time is passed in explicitly so
/// callers control the clock.
#[derive(Resource, Debug, Default)]
pub struct ResultCache {
    entry: Option<CacheEntry>,
}

impl ResultCache {
    /// Remembers a successful fit found at `location`. Misses are ignored.
    pub fn store(&mut self, result: &FitResult, location: Vec3, now: Instant) {
        if result.is_none() {
            return;
        }
        self.entry = Some(CacheEntry {
            result: result.clone(),
            location,
            stored_at: now,
        });
    }

    /// Consumes the cached fit if it is fresh and was found close to
    /// `location`.
    pub fn take_near(&mut self, location: Vec3, now: Instant) -> Option<FitResult> {
        let entry = self.entry.as_ref()?;
        if now.duration_since(entry.stored_at) >= Duration::from_millis(RESULT_CACHE_WINDOW_MS) {
            return None;
        }
        if entry.location.distance_squared(location) > RESULT_CACHE_DISTANCE_SQ {
            return None;
        }
        self.entry.take().map(|entry| entry.result)
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::geometry::Plane;
    use bevy::math::Mat4;

    fn plane_result() -> FitResult {
        FitResult::Plane {
            plane: Plane {
                extrinsics: Mat4::IDENTITY,
                width: 1.0,
                height: 1.0,
            },
            inliers: Vec::new(),
            rms_error: 0.001,
        }
    }

    #[test]
    fn fresh_nearby_result_is_reused_once() {
        let mut cache = ResultCache::default();
        let stored = Instant::now();
        cache.store(&plane_result(), Vec3::ZERO, stored);

        let shortly_after = stored + Duration::from_millis(100);
        let nearby = Vec3::new(0.1, 0.0, 0.0);
        assert!(cache.take_near(nearby, shortly_after).is_some());
        // Consumed on reuse.
        assert!(cache.take_near(nearby, shortly_after).is_none());
    }

    #[test]
    fn stale_or_distant_results_are_not_reused() {
        let mut cache = ResultCache::default();
        let stored = Instant::now();
        cache.store(&plane_result(), Vec3::ZERO, stored);
        assert!(
            cache
                .take_near(Vec3::ZERO, stored + Duration::from_millis(250))
                .is_none()
        );

        cache.store(&plane_result(), Vec3::ZERO, stored);
        let far = Vec3::new(1.0, 0.0, 0.0);
        assert!(
            cache
                .take_near(far, stored + Duration::from_millis(50))
                .is_none()
        );
    }

    #[test]
    fn misses_never_enter_the_cache() {
        let mut cache = ResultCache::default();
        cache.store(&FitResult::None, Vec3::ZERO, Instant::now());
        assert!(cache.take_near(Vec3::ZERO, Instant::now()).is_none());
    }
}
