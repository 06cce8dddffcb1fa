/// Maps a candidate render stride to a power-of-two render level and back.
///
/// Built once per surface from the patch width. Every candidate in
/// `0..=2*patch_width` resolves to the largest power of two not exceeding it,
/// capped at the patch width, so each level accepts a band twice as wide as
/// the previous one.
#[derive(Debug, Clone)]
pub struct RenderLevelTable {
    patch_order: u32,
    levels: Vec<u32>,
    strides: Vec<u32>,
}

impl RenderLevelTable {
    /// `patch_width` must be a power of two.
    pub fn new(patch_width: u32) -> Self {
        let patch_order = patch_width.max(1).trailing_zeros();
        let strides = (0..=patch_order).map(|level| 1u32 << level).collect();

        let max_candidate = 2 * patch_width as usize;
        let mut levels = Vec::with_capacity(max_candidate + 1);
        let mut level = 0u32;
        for candidate in 0..=max_candidate as u32 {
            while level < patch_order && (1u32 << (level + 1)) <= candidate {
                level += 1;
            }
            levels.push(level);
        }

        Self {
            patch_order,
            levels,
            strides,
        }
    }

    pub fn patch_order(&self) -> u32 {
        self.patch_order
    }

    /// Candidates past the end of the table resolve to the coarsest level.
    pub fn render_level(&self, candidate_stride: u32) -> u32 {
        self.levels
            .get(candidate_stride as usize)
            .copied()
            .unwrap_or(self.patch_order)
    }

    pub fn render_stride(&self, level: u32) -> u32 {
        let level = level.min(self.patch_order) as usize;
        self.strides[level]
    }

    pub fn max_candidate(&self) -> u32 {
        (self.levels.len() - 1) as u32
    }
}
