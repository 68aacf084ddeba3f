use ferroform_provider::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("step {step}: {source}")]
    Step {
        step: usize,
        #[source]
        source: Box<HarnessError>,
    },

    #[error("check failed: {0}")]
    Check(String),

    #[error("{0} not found in state")]
    NotInState(String),

    #[error("unknown provider alias: {0}")]
    UnknownProvider(String),

    #[error("after applying this step, the plan was not empty: {0}")]
    NonEmptyPlan(String),

    #[error("expected a non-empty plan, but got an empty plan")]
    EmptyPlan,

    #[error("import of {address} differs from state: {diffs}")]
    ImportMismatch { address: String, diffs: String },

    #[error("{0} still exists after destroy")]
    StillExists(String),

    #[error("precheck: {0}")]
    PreCheck(String),
}

impl HarnessError {
    pub fn in_step(self, step: usize) -> Self {
        HarnessError::Step {
            step,
            source: Box::new(self),
        }
    }
}
