pub mod images;
pub mod presets;

pub use images::ImageApi;
pub use presets::PresetApi;
