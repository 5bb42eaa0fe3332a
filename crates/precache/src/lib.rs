//! Pre-caching of map tiles ahead of broadcast animations.
//!
//! The [`planner`] turns an animation cue into the set of tiles the camera
//! will need, the [`preloader`] pushes that set through the tile proxy in
//! small batches, and [`session`] ties both to the operator's current map
//! state.

pub mod client;
pub mod planner;
pub mod preloader;
pub mod session;
pub mod warm;

pub use client::{HttpProxyClient, ProxyClient};
pub use planner::{AnimationPlan, LatLng, PlannerConfig, Viewport};
pub use preloader::{PreloadConfig, PreloadProgress, PreloadReport, Preloader, SkipReason};
pub use session::{CueSession, MapStyle};
pub use warm::{warm_areas, BroadcastArea, WarmReport};

/// Default base URL of the tile proxy.
pub const DEFAULT_PROXY_URL: &str = "http://localhost:8001";

/// Source requested when the caller does not name one.
pub const DEFAULT_SOURCE: &str = "esri-satellite";
