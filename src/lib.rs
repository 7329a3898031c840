#![forbid(unsafe_code)]

pub mod config;
pub mod encode_gif;
pub mod error;
pub mod gallery;
pub mod ledger;
pub mod pipeline;
pub mod remote;
pub mod render;
pub mod scenario;
pub mod simplify;
pub mod tfrecord;

pub use config::{ConfigFile, DataLayout, DEFAULT_BUCKET, DEFAULT_PREFIX};
pub use error::{MotionvizError, MotionvizResult};
pub use pipeline::{
    ItemContext, PipelineOptions, Processor, RunSummary, VideoRenderProcessor, run_pipeline,
};
pub use remote::{GcsStore, RemoteItem, RemoteStore};
pub use scenario::{ScenarioDecoder, ScenarioSnapshot, TfRecordScenarioDecoder};
pub use simplify::{SimplifiedScenario, simplify_scenario};
