//! Physical names for resources declared without one
//!
//! The suffix is derived from the URN, so composing the same stack twice
//! names the same objects.

use awslbc_common::kube_utils::deterministic_hash;

use crate::urn::Urn;

/// Length of the hex suffix appended to logical names
pub const SUFFIX_LEN: usize = 7;

/// Longest name accepted by Kubernetes for most object kinds
pub const KUBERNETES_NAME_MAX: usize = 253;

/// Longest DNS label, the limit for kinds whose names must be labels
pub const DNS_LABEL_NAME_MAX: usize = 63;

/// Longest IAM role name
pub const IAM_ROLE_NAME_MAX: usize = 64;

/// Longest IAM policy name
pub const IAM_POLICY_NAME_MAX: usize = 128;

/// Name length limit for a Kubernetes kind.
///
/// Services (DNS-1035) and Namespaces (DNS-1123) must be single labels.
pub fn kubernetes_name_max(kind: &str) -> usize {
    match kind {
        "Service" | "Namespace" => DNS_LABEL_NAME_MAX,
        _ => KUBERNETES_NAME_MAX,
    }
}

/// `<logical>-<suffix>`, with the logical part truncated so the result fits `max_len`
pub fn auto_name(urn: &Urn, max_len: usize) -> String {
    let suffix = &deterministic_hash(urn.as_str())[..SUFFIX_LEN];
    let room = max_len.saturating_sub(SUFFIX_LEN + 1);
    let logical: String = urn.name().chars().take(room).collect();
    let logical = logical.trim_end_matches('-');
    format!("{logical}-{suffix}")
}
