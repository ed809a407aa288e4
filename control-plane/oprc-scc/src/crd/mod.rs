pub mod cluster_claim;
pub mod feature;
pub mod helm_release;

pub use cluster_claim::{ClusterClaim, ClusterClaimSpec};
pub use feature::{ChartInfo, Feature, FeatureSpec};
pub use helm_release::{HelmRelease, HelmReleaseSpec};
