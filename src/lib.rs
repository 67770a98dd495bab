pub mod error;
pub mod config;
pub mod field;
pub mod version;
pub mod camera;
pub mod position;
pub mod io_stream;
pub mod index;
pub mod reader;
pub mod scan;
pub mod sidecar;
pub mod export;

pub use error::{Kw6Error, Result};
pub use config::ReaderOptions;
pub use field::{FieldKind, FieldSpec, FieldValue};
pub use version::VersionTag;
pub use camera::{CameraHeader, CameraRecord};
pub use position::{PositionHeader, PositionRecord};
pub use io_stream::Kw6Stream;
pub use index::{IndexCache, IndexSnapshot, StepConfidence};
pub use reader::{Positions, Reader};
pub use scan::ScanReport;
