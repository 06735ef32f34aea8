#![forbid(unsafe_code)]

pub mod archive;
pub mod assets;
pub mod composite_cpu;
pub mod compose;
pub mod config;
pub mod encode_pdf;
pub mod foundation;
pub mod layout;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod signature;
pub mod template;
pub mod text;

pub use archive::{ArchiveWriter, CertificateArchive, archive_file_name, certificate_file_name};
pub use compose::{CertificateComposer, ComposedPage, RenderedCertificate};
pub use config::{BatchConfig, FontSizes, LayoutStyle, SignerConfig};
pub use foundation::core::{Canvas, Rgba8, TextExtent};
pub use foundation::error::{CertError, CertResult, SignatureDecodeError};
pub use layout::{Anchor, BlockSpec, LayoutBlock, LayoutCursor, center_x, layout_blocks};
pub use model::{
    CertificateKind, CertificateRequest, EventInfo, PrizeRank, SignatureSource, Signer,
    SignerInput, SpeakerInfo,
};
pub use pipeline::{
    BatchJob, BatchOptions, BatchPipeline, BatchReport, BatchState, BatchThreading, CancelToken,
    CollisionPolicy, DocumentEntry, FailureEntry, Manifest, PrizeAssignments, Progress,
    ProgressSink, RowOutcome, SkipEntry, SkipReason,
};
pub use render::cpu::OverlaySurface;
pub use signature::{SignatureBlockRenderer, SignatureMark, SignerBlock, fit_to_width};
pub use template::{FontFace, FontRole, FontSet, Template};
pub use text::{BoxTypesetter, ParleyTypesetter, Typesetter};
