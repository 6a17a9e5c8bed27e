#![forbid(unsafe_code)]

pub mod convert;
pub mod decode;
pub mod encode;
pub mod error;
pub mod formats;
pub mod frame;
pub mod gate;
pub mod ladder;
pub mod lottie;
pub mod options;
pub mod presets;
pub mod probe;
pub mod quant;
pub mod report;
pub mod scratch;
pub mod transform;
pub mod yuv;

pub use convert::{convert, ConversionResult, Input, OutputPayload};
pub use error::{ConvertError, ConvertResult};
pub use formats::{ContainerFamily, ContainerFormat};
pub use frame::{Fps, Frame};
pub use options::{CompressionOptions, QuantizeMethod, ScaleFilter};
pub use presets::Preset;
pub use report::{ChannelReporter, LogReporter, NullReporter, ReportMsg, Reporter};
