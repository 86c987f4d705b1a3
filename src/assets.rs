pub mod raster;
pub mod text;
pub mod view;

pub use raster::{PreparedImage, decode_image, load_image};
pub use text::{ResolvedFont, resolve_font};
pub use view::{SvgView, ViewSnapshot};
