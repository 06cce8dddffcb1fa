//! Terrain surfaces for a streaming world viewer: per-region heightfields
//! split into patches, decoded from DCT compressed layer data, shaded by a
//! height driven composition of detail assets and tessellated per patch at a
//! distance based level of detail.

pub mod camera;
pub mod codec;
pub mod composition;
pub mod config;
pub mod error;
pub mod geometry;
pub mod surface;
pub mod utils;
mod world;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub use camera::{Frustum, TerrainCamera};
pub use codec::{GroupHeader, LayerType, PatchDecoder, PatchEncoder};
pub use composition::assets::{AssetFetcher, AssetId, MemoryAssetStore};
pub use config::TerrainSettings;
pub use error::{Error, ErrorKind, Result};
pub use geometry::{PatchGeometry, TerrainVertex};
pub use surface::direction::Direction;
pub use surface::patch::{Patch, PatchRef};
pub use surface::{HeightGrid, Surface, SurfaceId};
pub use world::{IdleStats, PatchView, Terrain};

/// Installs a formatting subscriber at `level`. Does nothing if the process
/// already has a global subscriber.
pub fn init_logging(level: Level) {
    // a builder for `FmtSubscriber`.
    let subscriber = FmtSubscriber::builder()
        // events at `level` and above are written to stdout.
        .with_max_level(level)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        info!("--INITIALIZING TERRAIN LOGGING--");
    }
}
