//! # FactShield Core
//!
//! Core library for the FactShield credibility client.
//! Provides input validation, the analysis orchestrator, the analysis
//! service boundary, score categorization and animation, factor grouping,
//! configuration, and fundamental types.

pub mod config;
pub mod error;
pub mod factors;
pub mod orchestrator;
pub mod score;
pub mod service;
pub mod types;
pub mod validation;

mod sync;

// Re-export commonly used types at the crate root.
pub use config::{ConfigOverrides, FactShieldConfig, ServiceProvider, config_exists, load_config};
pub use error::{AnalysisError, AnalysisErrorKind, FactShieldError, Result, ValidationError};
pub use factors::{FactorGroups, FactorSection, group_factors};
pub use orchestrator::{AnalysisOrchestrator, OrchestratorOptions, StateSubscription};
pub use score::{Categorization, ScoreCategory, ScoreDisplay, categorize, next_tick};
pub use service::{AnalysisService, HttpAnalysisService, MockAnalysisService, build_service};
pub use types::{
    AnalysisRequest, AnalysisResult, FactorItem, FactorKind, InputKind, RequestId, RequestState,
    RequestStatus,
};
pub use validation::{MIN_TEXT_CHARS, validate};
