//! Assets command - print what is compiled into the binary

use clap::{Args, ValueEnum};

use awslbc_infra::{crds, iam, rbac};

use crate::Result;

/// Print an embedded asset
#[derive(Args, Debug)]
pub struct AssetsArgs {
    /// Which asset to print
    #[arg(value_enum)]
    pub asset: Asset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Asset {
    /// Controller IAM policy (JSON)
    IamPolicy,
    /// ClusterRole and Role rules (YAML)
    Rbac,
    /// TargetGroupBinding and IngressClassParams CRDs (YAML)
    Crds,
}

/// Contents of `asset`
pub fn content(asset: Asset) -> String {
    match asset {
        Asset::IamPolicy => iam::controller_policy_json().to_string(),
        Asset::Rbac => rbac::rules_yaml().to_string(),
        Asset::Crds => crds::all_crds_yaml(),
    }
}

pub fn run(args: AssetsArgs) -> Result<()> {
    let content = content(args.asset);
    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}
