//! Texture handles, metadata and GPU objects.
//!
//! Callers only ever see [`TextureHandle`]s. The [`TextureStore`] keeps the
//! record table, the GPU texture pool, the handle allocator and the queue of
//! deferred uploads together behind one lock.

mod handle;
mod ids;
pub mod loader;
mod record;
mod store;
mod upload;

pub use handle::TextureHandle;
pub use ids::IdAllocator;
pub use record::{padded_extent, TextureRecord};
pub use store::{TextureSample, TextureStore, MAX_UPLOAD_ATTEMPTS};
pub use upload::{PendingUpload, UploadQueue};
