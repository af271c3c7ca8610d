use glam::Mat4;

/// Camera state for exactly one frame. `frame_id` increments every tick;
/// `changed` marks ticks whose view differs from the previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderCamera {
    pub frame_id: u64,
    pub changed: bool,
    pub perspective: Mat4,
}

impl RenderCamera {
    pub fn advance(&self, changed: bool, perspective: Mat4) -> Self {
        Self {
            frame_id: self.frame_id + 1,
            changed,
            perspective,
        }
    }
}

impl Default for RenderCamera {
    fn default() -> Self {
        Self {
            frame_id: 0,
            changed: true,
            perspective: Mat4::IDENTITY,
        }
    }
}
