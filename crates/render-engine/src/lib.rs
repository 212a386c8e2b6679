//! captionburn render engine
//!
//! Offline pipeline that burns word-animated captions into a video.
//!
//! # Pipeline Architecture
//!
//! ```text
//! source.mp4 ──► ffmpeg extract ──► frames/frame_%06d.png ──────────┐
//!                                                                   │
//! payload.json ──► visibility + layout ──► FrameRasterizer ×N       │
//!                  (per worker, per range)        │                 │
//!                                                 ▼                 │
//!                                   overlays/overlay_%06d.png ──────┤
//!                                                                   ▼
//! source audio ─────────────────────────────────────► overlay by index
//!                                                           │
//!                                                           ▼
//!                                                   Encode (H.264/AAC)
//!                                                           │
//!                                                           ▼
//!                                                      output.mp4
//! ```
//!
//! Every stage reports into a [`progress::ProgressStore`] keyed by job id.

pub mod compositor;
pub mod export;
pub mod ffmpeg;
pub mod pool;
pub mod progress;
pub mod raster;
pub mod workspace;

pub use export::*;
pub use ffmpeg::{FfmpegTool, MediaInfo};
pub use pool::{render_overlays, PoolConfig, RasterizerFactory};
pub use progress::{JobProgress, ProgressStore, Subscription};
pub use raster::fonts::FontBook;
pub use raster::{create_rasterizer, FrameRasterizer, RenderSettings};
pub use workspace::JobWorkspace;
