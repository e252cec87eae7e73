// SPDX-License-Identifier: Apache-2.0

//! CRD YAML Generator
//!
//! Generates Kubernetes CRD YAML files from the Rust types defined in `src/crd/`. This
//! ensures the manifests under `deploy/crds/` are always in sync with the Rust code.
//!
//! Usage:
//!   cargo run --bin crdgen

use kube::CustomResourceExt;
use machine_controller::crd::{Machine, MachineDeployment, MachineSet};
use std::fs;
use std::path::Path;

const HEADER: &str = "# SPDX-License-Identifier: Apache-2.0
#
# This file is AUTO-GENERATED from src/crd/. Run `cargo run --bin crdgen` to regenerate.
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");
    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files from src/crd/...");

    generate_crd::<Machine>("machines.crd.yaml", output_dir)?;
    generate_crd::<MachineSet>("machinesets.crd.yaml", output_dir)?;
    generate_crd::<MachineDeployment>("machinedeployments.crd.yaml", output_dir)?;

    println!("Successfully generated CRD YAML files in deploy/crds/");
    println!("Apply with: kubectl apply -f deploy/crds/");

    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let crd = T::crd();
    let yaml = serde_yaml::to_string(&crd)?;
    let content = format!("{HEADER}{yaml}");

    let output_path = output_dir.join(filename);
    fs::write(&output_path, content)?;

    println!("  generated {filename}");
    Ok(())
}
