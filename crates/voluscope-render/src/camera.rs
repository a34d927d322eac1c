//! Camera and view management.

use glam::{Mat4, Vec3};

/// An exact camera pose, captured before entering an immersive session and
/// restored when it ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

/// A 3D perspective camera orbiting a target point.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space.
    pub position: Vec3,
    /// Orbit target the camera is looking at.
    pub target: Vec3,
    /// Up vector.
    pub up: Vec3,
    /// Field of view in radians.
    pub fov: f32,
    /// Aspect ratio (width / height).
    pub aspect_ratio: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
}

impl Camera {
    /// Creates a new camera with default settings.
    #[must_use]
    pub fn new(aspect_ratio: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: std::f32::consts::FRAC_PI_4,
            aspect_ratio,
            near: 0.01,
            far: 10_000.0,
        }
    }

    /// Sets the aspect ratio (called on every surface resize).
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Returns the view matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Returns the projection matrix.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
    }

    /// Returns the combined view-projection matrix.
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Returns the camera's forward direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// Returns the camera's right direction.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize()
    }

    /// Distance from the camera to its orbit target; interaction speeds are
    /// scaled by this so movement feels the same at any zoom.
    #[must_use]
    pub fn distance_to_target(&self) -> f32 {
        self.position.distance(self.target)
    }

    /// Orbits the camera around the target (turntable style).
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        let radius = self.distance_to_target();
        let mut theta = (self.position.x - self.target.x).atan2(self.position.z - self.target.z);
        let mut phi = ((self.position.y - self.target.y) / radius).acos();

        theta -= delta_x;
        phi = (phi - delta_y).clamp(0.01, std::f32::consts::PI - 0.01);

        self.position = self.target
            + Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );
    }

    /// Pans the camera and target together in the view plane.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let offset = self.right() * delta_x + self.up * delta_y;
        self.position += offset;
        self.target += offset;
    }

    /// Dollies along the view direction by `delta` (positive moves toward
    /// the target), keeping the target fixed and never crossing it.
    pub fn dolly(&mut self, delta: f32) {
        let direction = self.forward();
        let new_distance = (self.distance_to_target() - delta).max(0.1);
        self.position = self.target - direction * new_distance;
    }

    /// Free-fly movement: translates both the position and the orbit target
    /// so subsequent orbiting stays centered where the user flew to.
    pub fn fly(&mut self, delta: Vec3) {
        let forward = self.forward();
        let right = self.right();
        let offset = right * delta.x + self.up * delta.y + forward * delta.z;
        self.position += offset;
        self.target += offset;
    }

    /// Captures the current pose for exact restoration later.
    #[must_use]
    pub fn snapshot(&self) -> CameraPose {
        CameraPose {
            position: self.position,
            target: self.target,
            up: self.up,
        }
    }

    /// Restores a previously captured pose exactly.
    pub fn restore(&mut self, pose: &CameraPose) {
        self.position = pose.position;
        self.target = pose.target;
        self.up = pose.up;
    }

    /// Frames the camera on the given bounding box.
    pub fn look_at_box(&mut self, min: Vec3, max: Vec3) {
        let center = (min + max) * 0.5;
        let size = (max - min).length().max(1e-3);

        self.target = center;
        self.position = center + Vec3::new(0.0, 0.0, size * 1.5);
        self.near = size * 0.001;
        self.far = size * 100.0;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dolly_moves_toward_target() {
        let mut camera = Camera::new(1.0);
        camera.position = Vec3::new(0.0, 0.0, 5.0);
        camera.target = Vec3::ZERO;

        camera.dolly(1.0);
        assert!((camera.distance_to_target() - 4.0).abs() < 1e-5);
        // Never crosses the target
        camera.dolly(100.0);
        assert!(camera.distance_to_target() >= 0.1);
    }

    #[test]
    fn test_fly_moves_target_with_position() {
        let mut camera = Camera::new(1.0);
        let before = camera.target;
        camera.fly(Vec3::new(0.0, 0.0, 1.0));
        assert_ne!(camera.target, before);
        assert!((camera.distance_to_target() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_snapshot_restore_exact() {
        let mut camera = Camera::new(1.0);
        let pose = camera.snapshot();

        camera.orbit(0.7, 0.3);
        camera.pan(2.0, -1.0);
        camera.dolly(0.5);
        assert_ne!(camera.position, pose.position);

        camera.restore(&pose);
        assert_eq!(camera.position, pose.position);
        assert_eq!(camera.target, pose.target);
        assert_eq!(camera.up, pose.up);
    }

    #[test]
    fn test_orbit_preserves_radius() {
        let mut camera = Camera::new(1.0);
        camera.position = Vec3::new(0.0, 0.0, 7.0);
        let before = camera.distance_to_target();
        camera.orbit(0.5, 0.2);
        assert!((camera.distance_to_target() - before).abs() < 1e-4);
    }

    #[test]
    fn test_look_at_box_centers_target() {
        let mut camera = Camera::new(1.0);
        camera.look_at_box(Vec3::ZERO, Vec3::splat(10.0));
        assert!((camera.target - Vec3::splat(5.0)).length() < 1e-5);
        assert!(camera.position.z > 5.0);
    }
}
