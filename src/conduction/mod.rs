//! Conduction Module
//!
//! Models the two non-air paths sound takes to the inner ear:
//! - Bone: strongly band-limited, heavier mid boost, soft clipped
//! - Cartilage: brighter, lighter boost, shorter response
//!
//! Each path is the same layer processor fed different settings and a
//! different impulse response.

mod impulse;
mod layer;

pub use impulse::{load_from_file, read_wav, synthesize, ImpulseResponse, SyntheticIrParams};
pub use layer::{process, LAYER_LOWPASS_ORDER, MID_BOOST_Q};
