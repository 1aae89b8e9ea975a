use std::f32::consts::PI;

/// Planes within this angle of world up/down classify as floor/ceiling.
pub const HORIZONTAL_PLANE_ANGLE: f32 = PI / 18.0;

/// Device gaze within this angle of a plane normal counts as parallel,
/// which forces the fallback forward axis (the device's own up axis).
pub const PARALLEL_GAZE_ANGLE: f32 = PI / 180.0;

/// Cylinder/cone/torus axes whose angle against world up falls inside this
/// open interval (degrees) classify as horizontal.
pub const HORIZONTAL_AXIS_MIN_DEGREES: f32 = 60.0;
pub const HORIZONTAL_AXIS_MAX_DEGREES: f32 = 120.0;

/// Quadrant boundaries for the torus gesture world direction.
pub const QUADRANT_NEAR_DEGREES: f32 = 45.0;
pub const QUADRANT_FAR_DEGREES: f32 = 135.0;

/// A cone foot closer than this to the apex is degenerate and gets rebuilt
/// from the foot ratio heuristic.
pub const APEX_DEGENERACY_DISTANCE: f32 = 0.001;

/// Lower clamp for the cone foot ratio heuristic.
pub const CONE_FOOT_RATIO_MIN: f32 = 0.2;

/// Screens wrap this fraction of the full circumference at the foot radius.
pub const SCREEN_ARC_FRACTION: f32 = 2.0 / 3.0;

/// Cones whose top/bottom radius ratio is at most this are extended to a
/// full cone (apex radius zero) before placement.
pub const FULL_CONE_RADII_RATIO: f32 = 0.10;

/// Mean projected inlier directions shorter than this treat the torus as a
/// full ring.
pub const FULL_RING_MIN_PROJECTION: f32 = 0.1;

/// Arc spans beyond this collapse to a full ring.
pub const FULL_RING_DELTA_ANGLE: f32 = 1.5 * PI;

/// Padding added to sphere/cylinder screen radii so the screen clears the
/// fitted surface.
pub const SCREEN_RADIUS_PADDING: f32 = 0.01;

/// Staleness window for reusing the last successful fit, in milliseconds.
pub const RESULT_CACHE_WINDOW_MS: u64 = 200;

/// Squared-distance window for reusing the last successful fit.
pub const RESULT_CACHE_DISTANCE_SQ: f32 = 0.1;

/// Number of found/not-found samples kept for the detection hit rate.
pub const FOUND_TIMER_CAPACITY: usize = 180;

/// Distance ahead of the device at which the picking indicator parks when
/// the ray misses the mesh.
pub const PICKING_MISS_DISTANCE: f32 = 1.0;
