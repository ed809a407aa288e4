use kube::core::CustomResourceExt;
use oprc_scc::crd::{ClusterClaim, Feature, HelmRelease};

fn main() {
    let crds = [Feature::crd(), HelmRelease::crd(), ClusterClaim::crd()];
    for crd in crds {
        let yaml = serde_yaml::to_string(&crd).expect("serialize CRD to YAML");
        println!("---\n{}", yaml);
    }
}
