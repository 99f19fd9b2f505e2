//! Error types of the motion correction pipeline.

use std::fmt;

use dmoco_core::CoreError;
use dmoco_registration::RegistrationError;
use thiserror::Error;

/// Gradient records that cannot be classified.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    /// No acquisition qualifies as b=0, so there is nothing to register to.
    #[error("no b=0 volume found among {total} acquisitions")]
    NoReferenceVolumes { total: usize },

    /// The direction record is ragged or has no dimension of 3.
    #[error("malformed gradient directions: {0}")]
    MalformedGradients(String),

    /// b-values and directions disagree in count.
    #[error("{bvals} b-values for {directions} gradient directions")]
    LengthMismatch { directions: usize, bvals: usize },
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Classify,
    GroupAndAverage,
    EstimateB0,
    EstimateDwiGroups,
    ExpandTransforms,
    Smooth,
    CombineSecondary,
    Apply,
    AssembleOutputs,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Classify => "CLASSIFY",
            Self::GroupAndAverage => "GROUP_AND_AVERAGE",
            Self::EstimateB0 => "ESTIMATE_B0",
            Self::EstimateDwiGroups => "ESTIMATE_DWI_GROUPS",
            Self::ExpandTransforms => "EXPAND_TRANSFORMS",
            Self::Smooth => "SMOOTH",
            Self::CombineSecondary => "COMBINE_WITH_SECONDARY_CORRECTION",
            Self::Apply => "APPLY",
            Self::AssembleOutputs => "ASSEMBLE_OUTPUTS",
        };
        f.write_str(name)
    }
}

/// What a failing engine call was working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Acquisition(usize),
    Group(usize),
    GroupMeans,
    Series,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acquisition(i) => write!(f, "acquisition {}", i),
            Self::Group(g) => write!(f, "group {}", g),
            Self::GroupMeans => f.write_str("group means"),
            Self::Series => f.write_str("full series"),
        }
    }
}

#[derive(Error, Debug)]
pub enum MocoError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error("registration failed in {stage} for {subject}: {source}")]
    Registration {
        stage: Stage,
        subject: Subject,
        #[source]
        source: RegistrationError,
    },

    #[error("cannot combine with secondary correction: {0}")]
    Composition(#[source] RegistrationError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("input mismatch: {0}")]
    InputMismatch(String),

    #[error("incomplete transform table: {0}")]
    IncompleteTable(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, MocoError>;

impl MocoError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn input_mismatch(msg: impl Into<String>) -> Self {
        Self::InputMismatch(msg.into())
    }

    pub fn incomplete_table(msg: impl Into<String>) -> Self {
        Self::IncompleteTable(msg.into())
    }

    pub fn registration(stage: Stage, subject: Subject, source: RegistrationError) -> Self {
        Self::Registration {
            stage,
            subject,
            source,
        }
    }

    /// Stage a failure belongs to, when it is tied to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Classification(_) => Some(Stage::Classify),
            Self::Registration { stage, .. } => Some(*stage),
            Self::Composition(_) => Some(Stage::CombineSecondary),
            Self::IncompleteTable(_) => Some(Stage::ExpandTransforms),
            _ => None,
        }
    }
}
