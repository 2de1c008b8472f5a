mod assembler;
mod chunker;
mod normalizer;
mod pipeline;
mod report;
mod resolver;
mod response;
mod validator;

pub use assembler::{attributes, AssemblyOutput, GraphAssembler};
pub use chunker::{chunk_document, chunk_text, SourceDocument};
pub use normalizer::{display_name, simplify, NormalizedKey, NormalizedMention, Normalizer};
pub use pipeline::{
    ExtractionError, ExtractionResult, Extractor, IngestPipeline, PipelineStats,
    RecordedExtractor,
};
pub use report::{
    Diagnostic, DiagnosticKind, DocumentStats, ExtractionReport, Rejection, RunSummary,
    TripleStage,
};
pub use resolver::{EntityResolver, IdentityStore, Resolution, ResolvedNode, Staged};
pub use response::{ParsedResponse, ResponseError, ResponseParser, ResponseResult};
pub use validator::{Endpoint, RelationValidator, ValidatedTriple, ValidationResult};
