#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::option_if_let_else)]

pub mod candidate;
pub mod config;
pub mod edge;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod node;
pub mod schema;

pub use candidate::{CandidateNode, CandidateTriple, Extraction};
pub use config::{EngineConfig, PipelineConfig, ResolverConfig, SignatureScheme, SimilarityMetric};
pub use edge::{Edge, EdgeKey};
pub use error::{Error, ErrorKind, Result};
pub use graph::{EdgeRecord, Graph, GraphExport, NodeRecord};
pub use node::{Attributes, Node, NodeId};
pub use schema::{NodeKind, NodeType, RelationType, SchemaRegistry, SchemaRule};
