//! hublink Harness
//!
//! Scriptable stand-in for the transport pipeline, used by client tests to
//! drive callback completion, inject failures and publish inbound traffic.

pub mod mock_pipeline;

pub use mock_pipeline::{
    CompletionMode, MockPipeline, MockPipelineConfig, MockPipelineStats, OperationKind,
    PipelineCall,
};
