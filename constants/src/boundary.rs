/// Default operational volume: a vertical cylinder around the session origin.
pub const DEFAULT_BOUNDARY_RADIUS: f32 = 5.0;
pub const DEFAULT_BOUNDARY_HEIGHT: f32 = 3.0;

/// Points slightly below the floor still count as inside the boundary so
/// reconstruction noise at floor level is not culled.
pub const BOUNDARY_FLOOR_MARGIN: f32 = -0.1;
