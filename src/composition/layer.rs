/// A square grid of scalar values laid over a region, sampled in meters.
#[derive(Debug, Clone)]
pub struct ViewerLayer {
    width: u32,
    scale: f32,
    scale_inv: f32,
    values: Vec<f32>,
}

impl ViewerLayer {
    /// `scale` is the number of meters covered by one texel.
    pub fn new(width: u32, scale: f32) -> Self {
        let width = width.max(1);
        let scale = if scale > 0.0 { scale } else { 1.0 };
        Self {
            width,
            scale,
            scale_inv: 1.0 / scale,
            values: vec![0.0; (width * width) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn scale_inv(&self) -> f32 {
        self.scale_inv
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    fn index(&self, i: u32, j: u32) -> usize {
        (i.min(self.width - 1) + j.min(self.width - 1) * self.width) as usize
    }

    /// Texel lookup; out-of-range indices clamp to the border.
    pub fn get_value(&self, i: u32, j: u32) -> f32 {
        self.values[self.index(i, j)]
    }

    pub fn set_value(&mut self, i: u32, j: u32, value: f32) {
        let idx = self.index(i, j);
        self.values[idx] = value;
    }

    /// Bilinear sample at a position in meters, clamped to the layer.
    pub fn get_value_scaled(&self, x: f32, y: f32) -> f32 {
        let max = (self.width - 1) as f32;
        let fx = (x * self.scale_inv).clamp(0.0, max);
        let fy = (y * self.scale_inv).clamp(0.0, max);

        let x1 = fx.floor() as u32;
        let y1 = fy.floor() as u32;
        let x2 = (x1 + 1).min(self.width - 1);
        let y2 = (y1 + 1).min(self.width - 1);
        let dx = fx - x1 as f32;
        let dy = fy - y1 as f32;

        let s00 = self.get_value(x1, y1);
        let s10 = self.get_value(x2, y1);
        let s01 = self.get_value(x1, y2);
        let s11 = self.get_value(x2, y2);

        (1.0 - dx) * (1.0 - dy) * s00 + dx * (1.0 - dy) * s10 + (1.0 - dx) * dy * s01 + dx * dy * s11
    }
}
