pub mod error;
pub mod simulation;
pub mod catalog;
pub mod analysis;
pub mod configuration;
pub mod pipeline;

pub use error::{DpsError, Result};

pub use simulation::states::{Body, BodyRole, NVec3};
pub use simulation::engine::{ProgressListener, RunContext, RunState, TaskInfo};
pub use simulation::params::{HeaderParams, HeaderSource};
pub use simulation::scenario::{AngleConvention, Orientation, Scenario};
pub use simulation::integrator::ExternalIntegrator;

pub use catalog::record::{AggregationKey, ConfigurationRecord, PlanetDistances};
pub use catalog::sweep::{Catalog, Sweep};

pub use analysis::classifier::{classify, BoundTo, Outcome};
pub use analysis::accumulator::{Accumulator, ResultSet};
pub use analysis::aggregator::{Aggregator, AnalysisReport, OutFiles, TrajectorySource};

pub use configuration::config::{AnalysisConfig, HeaderConfig, IntegratorConfig, RunConfig, SweepConfig};

pub use pipeline::Pipeline;
