//! CRD YAML Generator
//!
//! This binary generates the Kubernetes CRD manifest for the ClusterManager
//! resource reconciled by the crd-lifecycle-operator.
//!
//! Usage: cargo run --bin crdgen > deploy/crds/clustermanager.yaml

use crd_lifecycle_operator::crd::generate_crds;

fn main() -> anyhow::Result<()> {
    for crd in generate_crds()? {
        println!("---");
        print!("{}", crd);
    }
    Ok(())
}
