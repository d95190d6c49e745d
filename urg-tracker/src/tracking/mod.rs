//! Cross-frame object tracking
//!
//! Each frame's raw objects are matched to tracked objects by nearest
//! position. Frame counters drive the lifecycle:
//!
//! ```text
//!          keeping > press_delay               missing > release_delay
//!   Added ───────────────────────► Pressed ─────────────────────────► Released
//!                                    │  every (update_delay + 1) frames       │
//!                                    └──► Updated         missing > release_delay
//!                                                            + remove_delay
//!                                                                 ▼
//!                                                              Removed
//! ```
//!
//! Objects first seen during the denoise window are noise: they are tracked
//! (so they keep masking their spot) but never produce events.

mod object;
mod smoothing;
mod tracker;

pub use object::{ObjectEvent, TrackedObject};
pub use smoothing::{smooth_damp, smooth_damp_point};
pub use tracker::{ObjectTracker, TrackingConfig};
