pub mod image;
pub mod preset;
pub mod token;

pub use image::{ExtractResponse, ExtractedData, ExtractedStats};
pub use preset::{Preset, PresetItem};
pub use token::{decode_claims, TokenClaims, TokenError};
