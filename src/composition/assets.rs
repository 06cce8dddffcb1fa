use std::collections::HashMap;
use std::fmt;

use image::{imageops::FilterType, DynamicImage};
use serde::{Deserialize, Serialize};

/// 128-bit asset identifier, written as the usual 8-4-4-4-12 hex form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(u128);

impl AssetId {
    pub const NULL: AssetId = AssetId(0);

    pub fn from_u128(value: u128) -> Self {
        AssetId(value)
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Accepts 32 hex digits, with or without dashes.
    pub fn parse(text: &str) -> Option<AssetId> {
        let mut value: u128 = 0;
        let mut digits = 0;
        for c in text.trim().chars() {
            if c == '-' {
                continue;
            }
            let nibble = c.to_digit(16)?;
            digits += 1;
            if digits > 32 {
                return None;
            }
            value = (value << 4) | nibble as u128;
        }

        if digits != 32 {
            return None;
        }
        Some(AssetId(value))
    }

    /// For compile-time constants. Malformed text yields [`AssetId::NULL`].
    pub fn from_static(text: &'static str) -> AssetId {
        Self::parse(text).unwrap_or(AssetId::NULL)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = format!("{:032x}", self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self)
    }
}

impl TryFrom<String> for AssetId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AssetId::parse(&value).ok_or_else(|| format!("'{}' is not a valid asset id", value))
    }
}

impl From<AssetId> for String {
    fn from(value: AssetId) -> Self {
        value.to_string()
    }
}

pub type AssetHandle = u32;

/// Load state of a fetched texture, as last reported by the fetcher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureInfo {
    /// Negative until any resolution has been decoded.
    pub discard_level: i32,
    pub width: u32,
    pub height: u32,
    pub full_width: u32,
    pub full_height: u32,
    pub components: u8,
}

impl TextureInfo {
    pub fn pending() -> Self {
        Self {
            discard_level: -1,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AssetPriority {
    Idle,
    Boosted {
        virtual_size: f32,
        min_discard: Option<i32>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Blend,
    Mask,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterialTexture {
    BaseColor = 0,
    Normal = 1,
    MetallicRoughness = 2,
    Emissive = 3,
}

pub const MATERIAL_TEXTURE_COUNT: usize = 4;

impl MaterialTexture {
    pub const ALL: [MaterialTexture; MATERIAL_TEXTURE_COUNT] = [
        MaterialTexture::BaseColor,
        MaterialTexture::Normal,
        MaterialTexture::MetallicRoughness,
        MaterialTexture::Emissive,
    ];
}

/// The parts of a PBR material the terrain cares about.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialDefinition {
    pub base_color_factor: [f32; 4],
    pub emissive_factor: [f32; 3],
    pub alpha_mode: AlphaMode,
    /// Indexed by [`MaterialTexture`].
    pub textures: [AssetId; MATERIAL_TEXTURE_COUNT],
}

impl Default for MaterialDefinition {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0; 4],
            emissive_factor: [0.0; 3],
            alpha_mode: AlphaMode::Opaque,
            textures: [AssetId::NULL; MATERIAL_TEXTURE_COUNT],
        }
    }
}

/// Region-supplied adjustments layered over a fetched material.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialOverride {
    pub base_color_factor: Option<[f32; 4]>,
    pub emissive_factor: Option<[f32; 3]>,
    pub alpha_mode: Option<AlphaMode>,
    pub textures: [Option<AssetId>; MATERIAL_TEXTURE_COUNT],
}

impl MaterialDefinition {
    pub fn texture(&self, slot: MaterialTexture) -> AssetId {
        self.textures[slot as usize]
    }

    pub fn apply_override(&mut self, over: &MaterialOverride) {
        if let Some(factor) = over.base_color_factor {
            self.base_color_factor = factor;
        }
        if let Some(factor) = over.emissive_factor {
            self.emissive_factor = factor;
        }
        if let Some(mode) = over.alpha_mode {
            self.alpha_mode = mode;
        }
        for (slot, id) in over.textures.iter().enumerate() {
            if let Some(id) = id {
                self.textures[slot] = *id;
            }
        }
    }
}

/// Result of asking for a CPU copy of a texture at a given discard level.
#[derive(Clone, Debug)]
pub enum RasterReadback {
    Pending,
    Ready(DynamicImage),
    Failed,
}

/// The asset-fetch subsystem as seen by the terrain. Requests are
/// fire-and-forget; readiness is polled every frame.
pub trait AssetFetcher {
    fn fetch_texture(&mut self, id: AssetId) -> AssetHandle;
    fn fetch_material(&mut self, id: AssetId) -> AssetHandle;
    fn texture_info(&self, handle: AssetHandle) -> TextureInfo;
    /// `None` while the definition is still loading.
    fn material(&self, handle: AssetHandle) -> Option<MaterialDefinition>;
    fn request_priority(&mut self, handle: AssetHandle, priority: AssetPriority);
    fn read_texture(&mut self, handle: AssetHandle, discard_level: i32) -> RasterReadback;
}

#[derive(Debug)]
struct StoredTexture {
    id: AssetId,
    image: Option<DynamicImage>,
    info: TextureInfo,
    failed: bool,
}

#[derive(Debug)]
struct StoredMaterial {
    id: AssetId,
    definition: Option<MaterialDefinition>,
}

/// In-memory [`AssetFetcher`] whose contents are scripted by the caller.
///
/// Assets may be requested before they are published; publishing later fills
/// the existing handle, which mirrors how network fetches trickle in.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    next_handle: AssetHandle,
    texture_handles: HashMap<AssetId, AssetHandle>,
    material_handles: HashMap<AssetId, AssetHandle>,
    textures: HashMap<AssetHandle, StoredTexture>,
    materials: HashMap<AssetHandle, StoredMaterial>,
    priorities: HashMap<AssetHandle, AssetPriority>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn texture_entry(&mut self, id: AssetId) -> &mut StoredTexture {
        let handle = self.fetch_texture(id);
        self.textures
            .entry(handle)
            .or_insert_with(|| StoredTexture {
                id,
                image: None,
                info: TextureInfo::pending(),
                failed: false,
            })
    }

    /// Publish a fully decoded texture.
    pub fn publish_texture(&mut self, id: AssetId, image: DynamicImage) {
        self.publish_texture_at(id, image, 0);
    }

    /// Publish a texture decoded only down to `discard_level`.
    pub fn publish_texture_at(&mut self, id: AssetId, image: DynamicImage, discard_level: i32) {
        let full_width = image.width();
        let full_height = image.height();
        let components = image.color().channel_count();
        let level = discard_level.max(0) as u32;
        let entry = self.texture_entry(id);
        entry.info = TextureInfo {
            discard_level: discard_level.max(0),
            width: (full_width >> level).max(1),
            height: (full_height >> level).max(1),
            full_width,
            full_height,
            components,
        };
        entry.image = Some(image);
        entry.failed = false;
    }

    pub fn fail_texture(&mut self, id: AssetId) {
        let entry = self.texture_entry(id);
        entry.failed = true;
    }

    pub fn publish_material(&mut self, id: AssetId, definition: MaterialDefinition) {
        let handle = self.fetch_material(id);
        self.materials.insert(
            handle,
            StoredMaterial {
                id,
                definition: Some(definition),
            },
        );
    }

    pub fn is_texture_requested(&self, id: AssetId) -> bool {
        self.texture_handles.contains_key(&id)
    }

    pub fn texture_priority(&self, id: AssetId) -> Option<AssetPriority> {
        let handle = self.texture_handles.get(&id)?;
        self.priorities.get(handle).copied()
    }

    pub fn texture_id(&self, handle: AssetHandle) -> Option<AssetId> {
        self.textures.get(&handle).map(|t| t.id)
    }

    pub fn material_id(&self, handle: AssetHandle) -> Option<AssetId> {
        self.materials.get(&handle).map(|m| m.id)
    }

    fn allocate(&mut self) -> AssetHandle {
        self.next_handle += 1;
        self.next_handle
    }
}

impl AssetFetcher for MemoryAssetStore {
    fn fetch_texture(&mut self, id: AssetId) -> AssetHandle {
        if let Some(handle) = self.texture_handles.get(&id) {
            return *handle;
        }

        let handle = self.allocate();
        self.texture_handles.insert(id, handle);
        self.textures.insert(
            handle,
            StoredTexture {
                id,
                image: None,
                info: TextureInfo::pending(),
                failed: false,
            },
        );
        handle
    }

    fn fetch_material(&mut self, id: AssetId) -> AssetHandle {
        if let Some(handle) = self.material_handles.get(&id) {
            return *handle;
        }

        let handle = self.allocate();
        self.material_handles.insert(id, handle);
        self.materials.insert(
            handle,
            StoredMaterial {
                id,
                definition: None,
            },
        );
        handle
    }

    fn texture_info(&self, handle: AssetHandle) -> TextureInfo {
        self.textures
            .get(&handle)
            .map(|t| t.info)
            .unwrap_or_else(TextureInfo::pending)
    }

    fn material(&self, handle: AssetHandle) -> Option<MaterialDefinition> {
        self.materials
            .get(&handle)
            .and_then(|m| m.definition.clone())
    }

    fn request_priority(&mut self, handle: AssetHandle, priority: AssetPriority) {
        self.priorities.insert(handle, priority);
    }

    fn read_texture(&mut self, handle: AssetHandle, discard_level: i32) -> RasterReadback {
        let Some(texture) = self.textures.get(&handle) else {
            return RasterReadback::Failed;
        };
        if texture.failed {
            return RasterReadback::Failed;
        }
        let Some(image) = texture.image.as_ref() else {
            return RasterReadback::Pending;
        };

        let level = discard_level.clamp(0, 31) as u32;
        let width = (image.width() >> level).max(1);
        let height = (image.height() >> level).max(1);
        if width == image.width() && height == image.height() {
            return RasterReadback::Ready(image.clone());
        }
        RasterReadback::Ready(image.resize_exact(width, height, FilterType::Triangle))
    }
}
