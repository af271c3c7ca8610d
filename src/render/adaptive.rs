/// How imagery maps onto the element when aspect ratios disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Crop so the image covers the whole element.
    #[default]
    Fill,
    /// Inset so the whole image stays visible.
    Letterbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

/// Pixel insets of the adaptively mapped region relative to the element
/// edges. Letterboxing yields non-negative insets, fill non-positive ones
/// (the region overflows the element).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderOffset {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

/// Pure mapping from element size, image aspect ratio and render mode to the
/// region insets. Degenerate inputs collapse to zero offsets.
pub fn render_offset(size: ViewportSize, image_aspect: f32, mode: RenderMode) -> RenderOffset {
    if size.width == 0 || size.height == 0 || !image_aspect.is_finite() || image_aspect <= 0.0 {
        return RenderOffset::default();
    }

    let width = size.width as f32;
    let height = size.height as f32;
    let element_aspect = width / height;

    // contain insets the long axis, cover overflows the short one
    let fit_width = match mode {
        RenderMode::Letterbox => image_aspect >= element_aspect,
        RenderMode::Fill => image_aspect < element_aspect,
    };

    let (horizontal, vertical) = if fit_width {
        (0.0, (height - width / image_aspect) / 2.0)
    } else {
        ((width - height * image_aspect) / 2.0, 0.0)
    };

    RenderOffset {
        top: vertical,
        bottom: vertical,
        left: horizontal,
        right: horizontal,
    }
}
