use tracing::debug;

use super::assets::{
    AssetFetcher, AssetHandle, AssetId, AssetPriority, MaterialDefinition, MaterialOverride,
    MaterialTexture, MATERIAL_TEXTURE_COUNT,
};

/// Number of detail assets blended across a region.
pub const ASSET_COUNT: usize = 4;
/// Side of the rasters the minimap blends, and the minimum useful texture size.
pub const BASE_SIZE: u32 = 128;
pub const MAX_DISCARD_LEVEL: i32 = 5;
/// Fetch priority asked for while the terrain waits on detail assets.
pub const TERRAIN_DECODE_PRIORITY: f32 = 2048.0 * 2048.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainMaterialType {
    Texture,
    Pbr,
}

#[derive(Debug, Clone, Default)]
struct MaterialSlot {
    handle: Option<AssetHandle>,
    /// Fetched definition with the region override applied.
    render: Option<MaterialDefinition>,
    textures: Option<[Option<AssetHandle>; MATERIAL_TEXTURE_COUNT]>,
}

/// Discard level whose smaller side first drops to [`BASE_SIZE`] or below.
pub fn desired_discard(full_width: u32, full_height: u32) -> i32 {
    let mut min_dim = full_width.min(full_height);
    let mut discard = 0;
    while min_dim > BASE_SIZE && discard < MAX_DISCARD_LEVEL {
        discard += 1;
        min_dim /= 2;
    }
    discard
}

fn boost_texture(fetcher: &mut impl AssetFetcher, handle: AssetHandle, virtual_size: f32, min_discard: Option<i32>) {
    fetcher.request_priority(
        handle,
        AssetPriority::Boosted {
            virtual_size,
            min_discard,
        },
    );
}

/// True once the texture is loaded at a resolution the minimap can use.
/// With `boost` set, a texture that is not there yet is asked to hurry.
pub fn make_texture_ready(fetcher: &mut impl AssetFetcher, handle: AssetHandle, boost: bool) -> bool {
    let info = fetcher.texture_info(handle);
    let virtual_size = (BASE_SIZE * BASE_SIZE) as f32;

    if info.discard_level < 0 {
        if boost {
            boost_texture(fetcher, handle, virtual_size, None);
        }
        return false;
    }

    if info.discard_level != 0 && (info.width < BASE_SIZE || info.height < BASE_SIZE) {
        if boost {
            let discard = desired_discard(info.full_width, info.full_height);
            boost_texture(fetcher, handle, virtual_size, Some(discard));
        }
        return false;
    }

    info.components != 0
}

fn all_or_any(ready: &[bool], strict: bool) -> bool {
    if strict {
        ready.iter().all(|r| *r)
    } else {
        ready.iter().any(|r| *r)
    }
}

/// The four detail assets of a region and their load tracking.
///
/// Every id is fetched both as a flat texture and as a PBR material; whichever
/// path becomes fully ready first is used.
#[derive(Debug, Clone)]
pub struct DetailAssets {
    ids: [AssetId; ASSET_COUNT],
    textures: [Option<AssetHandle>; ASSET_COUNT],
    materials: [MaterialSlot; ASSET_COUNT],
    overrides: [Option<MaterialOverride>; ASSET_COUNT],
    fetched: bool,
    pbr_enabled: bool,
    pbr_force: bool,
}

impl DetailAssets {
    pub fn new(ids: [AssetId; ASSET_COUNT]) -> Self {
        Self {
            ids,
            textures: [None; ASSET_COUNT],
            materials: Default::default(),
            overrides: Default::default(),
            fetched: false,
            pbr_enabled: false,
            pbr_force: false,
        }
    }

    pub fn set_pbr_flags(&mut self, enabled: bool, force: bool) {
        self.pbr_enabled = enabled;
        self.pbr_force = force;
    }

    pub fn asset_id(&self, asset: usize) -> AssetId {
        self.ids.get(asset).copied().unwrap_or(AssetId::NULL)
    }

    pub fn texture_handle(&self, asset: usize) -> Option<AssetHandle> {
        self.textures.get(asset).copied().flatten()
    }

    /// Null ids are ignored.
    pub fn set_asset_id(&mut self, asset: usize, id: AssetId) -> bool {
        if id.is_null() || asset >= ASSET_COUNT {
            return false;
        }
        self.ids[asset] = id;
        self.textures[asset] = None;
        self.materials[asset] = MaterialSlot::default();
        self.fetched = false;
        true
    }

    pub fn material_override(&self, asset: usize) -> Option<&MaterialOverride> {
        self.overrides.get(asset).and_then(|o| o.as_ref())
    }

    pub fn set_material_override(&mut self, asset: usize, over: Option<MaterialOverride>) {
        if asset >= ASSET_COUNT {
            return;
        }
        self.overrides[asset] = over;
        self.materials[asset].render = None;
        self.materials[asset].textures = None;
    }

    /// Fetches not yet issued go out now.
    fn ensure_fetched(&mut self, fetcher: &mut impl AssetFetcher) {
        if self.fetched {
            return;
        }
        for asset in 0..ASSET_COUNT {
            let id = self.ids[asset];
            if id.is_null() {
                continue;
            }
            if self.textures[asset].is_none() {
                self.textures[asset] = Some(fetcher.fetch_texture(id));
            }
            if self.materials[asset].handle.is_none() {
                self.materials[asset].handle = Some(fetcher.fetch_material(id));
            }
        }
        self.fetched = true;
        debug!("Requested terrain detail assets {:?}", self.ids);
    }

    pub fn textures_ready(&mut self, fetcher: &mut impl AssetFetcher, boost: bool, strict: bool) -> bool {
        self.ensure_fetched(fetcher);

        let mut ready = [false; ASSET_COUNT];
        for (asset, slot) in ready.iter_mut().enumerate() {
            if let Some(handle) = self.textures[asset] {
                *slot = make_texture_ready(fetcher, handle, boost);
            }
        }
        all_or_any(&ready, strict)
    }

    pub fn materials_ready(&mut self, fetcher: &mut impl AssetFetcher, boost: bool, strict: bool) -> bool {
        self.ensure_fetched(fetcher);

        let mut ready = [false; ASSET_COUNT];
        for (asset, slot) in ready.iter_mut().enumerate() {
            *slot = self.make_material_ready(fetcher, asset, boost, strict);
        }

        if self.pbr_enabled && self.pbr_force && self.materials.iter().all(|m| m.handle.is_some()) {
            return true;
        }

        all_or_any(&ready, strict)
    }

    fn make_material_ready(
        &mut self,
        fetcher: &mut impl AssetFetcher,
        asset: usize,
        boost: bool,
        strict: bool,
    ) -> bool {
        let slot = &mut self.materials[asset];
        let Some(handle) = slot.handle else {
            return false;
        };

        if slot.render.is_none() {
            let Some(mut definition) = fetcher.material(handle) else {
                return false;
            };
            if let Some(over) = &self.overrides[asset] {
                definition.apply_override(over);
            }
            slot.render = Some(definition);
        }
        let Some(render) = slot.render.as_ref() else {
            return false;
        };

        let textures = match slot.textures {
            Some(textures) => textures,
            None => {
                let mut textures = [None; MATERIAL_TEXTURE_COUNT];
                for kind in MaterialTexture::ALL {
                    let id = render.texture(kind);
                    if !id.is_null() {
                        textures[kind as usize] = Some(fetcher.fetch_texture(id));
                    }
                }
                slot.textures = Some(textures);
                textures
            }
        };

        // Every sub-texture is polled so boosting reaches all of them.
        let mut ready = [true; MATERIAL_TEXTURE_COUNT];
        for (kind, handle) in textures.iter().enumerate() {
            if let Some(handle) = handle {
                ready[kind] = make_texture_ready(fetcher, *handle, boost);
            }
        }

        !strict || ready.iter().all(|r| *r)
    }

    pub fn generate_materials(&mut self, fetcher: &mut impl AssetFetcher) -> bool {
        if self.textures_ready(fetcher, true, true) {
            return true;
        }
        self.materials_ready(fetcher, true, true)
    }

    pub fn material_type(&mut self, fetcher: &mut impl AssetFetcher) -> TerrainMaterialType {
        let use_textures =
            self.textures_ready(fetcher, false, false) || !self.materials_ready(fetcher, false, false);
        if use_textures {
            TerrainMaterialType::Texture
        } else {
            TerrainMaterialType::Pbr
        }
    }

    /// Material with overrides applied, once its definition has loaded.
    pub fn render_material(&self, asset: usize) -> Option<&MaterialDefinition> {
        self.materials.get(asset).and_then(|m| m.render.as_ref())
    }

    pub fn material_texture(&self, asset: usize, kind: MaterialTexture) -> Option<AssetHandle> {
        self.materials
            .get(asset)
            .and_then(|m| m.textures)
            .and_then(|t| t[kind as usize])
    }

    fn all_texture_handles(&self) -> Vec<AssetHandle> {
        let mut handles: Vec<AssetHandle> = self.textures.iter().flatten().copied().collect();
        for slot in &self.materials {
            if let Some(textures) = slot.textures {
                handles.extend(textures.iter().flatten().copied());
            }
        }
        handles
    }

    pub fn boost(&mut self, fetcher: &mut impl AssetFetcher) {
        self.ensure_fetched(fetcher);
        for handle in self.all_texture_handles() {
            boost_texture(fetcher, handle, TERRAIN_DECODE_PRIORITY, None);
        }
    }

    pub fn unboost(&self, fetcher: &mut impl AssetFetcher) {
        for handle in self.all_texture_handles() {
            fetcher.request_priority(handle, AssetPriority::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::assets::MemoryAssetStore;
    use image::{DynamicImage, RgbImage};

    fn ids() -> [AssetId; ASSET_COUNT] {
        [1, 2, 3, 4].map(AssetId::from_u128)
    }

    #[test]
    fn discard_for_large_textures() {
        assert_eq!(desired_discard(128, 128), 0);
        assert_eq!(desired_discard(512, 1024), 2);
        assert_eq!(desired_discard(1 << 20, 1 << 20), MAX_DISCARD_LEVEL);
    }

    #[test]
    fn low_resolution_texture_is_boosted_with_min_discard() {
        let mut store = MemoryAssetStore::new();
        let id = AssetId::from_u128(1);
        store.publish_texture_at(id, DynamicImage::ImageRgb8(RgbImage::new(1024, 1024)), 4);
        let handle = store.fetch_texture(id);

        assert!(!make_texture_ready(&mut store, handle, true));
        assert_eq!(
            store.texture_priority(id),
            Some(AssetPriority::Boosted {
                virtual_size: (BASE_SIZE * BASE_SIZE) as f32,
                min_discard: Some(3),
            })
        );
    }

    #[test]
    fn strictness_selects_all_or_any() {
        let mut store = MemoryAssetStore::new();
        let mut assets = DetailAssets::new(ids());
        assert!(!assets.textures_ready(&mut store, false, false));

        store.publish_texture(ids()[0], DynamicImage::ImageRgb8(RgbImage::new(128, 128)));
        assert!(assets.textures_ready(&mut store, false, false));
        assert!(!assets.textures_ready(&mut store, false, true));

        for id in &ids()[1..] {
            store.publish_texture(*id, DynamicImage::ImageRgb8(RgbImage::new(128, 128)));
        }
        assert!(assets.textures_ready(&mut store, false, true));
    }

    #[test]
    fn material_waits_for_declared_sub_textures() {
        let mut store = MemoryAssetStore::new();
        let mut assets = DetailAssets::new(ids());
        let base = AssetId::from_u128(50);
        let mut def = MaterialDefinition::default();
        def.textures[MaterialTexture::BaseColor as usize] = base;
        for id in ids() {
            store.publish_material(id, def.clone());
        }

        assert!(assets.materials_ready(&mut store, false, false));
        assert!(!assets.materials_ready(&mut store, false, true));
        store.publish_texture(base, DynamicImage::ImageRgb8(RgbImage::new(128, 128)));
        assert!(assets.materials_ready(&mut store, false, true));
        assert_eq!(assets.material_type(&mut store), TerrainMaterialType::Pbr);
    }

    #[test]
    fn forced_pbr_needs_only_definitions_requested() {
        let mut store = MemoryAssetStore::new();
        let mut assets = DetailAssets::new(ids());
        assets.set_pbr_flags(true, true);
        assert!(assets.materials_ready(&mut store, false, true));
    }
}
