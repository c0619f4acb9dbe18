//! RBAC rules granted to the controller
//!
//! The tables live in `assets/rbac.yaml` so permission changes are reviewed
//! as data rather than code.

use std::sync::LazyLock;

use k8s_openapi::api::rbac::v1::PolicyRule;
use serde::Deserialize;

use awslbc_common::yaml::parse_yaml_as;

const RBAC_YAML: &str = include_str!("../assets/rbac.yaml");

/// Rule tables for the controller's ClusterRole and namespaced Role
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RbacRules {
    /// Rules of the ClusterRole
    pub cluster_rules: Vec<PolicyRule>,
    /// Rules of the Role in the controller namespace
    pub namespaced_rules: Vec<PolicyRule>,
}

static RULES: LazyLock<RbacRules> = LazyLock::new(|| {
    parse_yaml_as(RBAC_YAML).unwrap_or_else(|e| panic!("embedded rbac.yaml is invalid: {e}"))
});

/// The embedded rule tables
pub fn rules() -> &'static RbacRules {
    &RULES
}

/// The raw embedded asset
pub fn rules_yaml() -> &'static str {
    RBAC_YAML
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cluster_rules_cover_controller_resources() {
        let rules = &rules().cluster_rules;
        assert_eq!(rules.len(), 6);

        let tgb = &rules[0];
        assert_eq!(tgb.api_groups, Some(strings(&["elbv2.k8s.aws"])));
        assert_eq!(tgb.resources, Some(strings(&["targetgroupbindings"])));
        assert_eq!(
            tgb.verbs,
            strings(&["create", "delete", "get", "list", "patch", "update", "watch"])
        );

        let status = &rules[5];
        assert_eq!(
            status.api_groups,
            Some(strings(&["", "elbv2.k8s.aws", "extensions", "networking.k8s.io"]))
        );
        assert_eq!(status.verbs, strings(&["update", "patch"]));
    }

    #[test]
    fn secrets_are_read_only() {
        let rule = rules()
            .cluster_rules
            .iter()
            .find(|r| {
                r.resources
                    .as_ref()
                    .is_some_and(|res| res.iter().any(|x| x == "secrets"))
            })
            .unwrap();
        assert_eq!(rule.verbs, strings(&["get", "list", "watch"]));
    }

    #[test]
    fn leader_lock_is_scoped_by_name() {
        let rules = rules();
        assert_eq!(rules.namespaced_rules.len(), 2);
        assert_eq!(rules.namespaced_rules[0].verbs, strings(&["create"]));
        assert_eq!(
            rules.namespaced_rules[1].resource_names,
            Some(strings(&["aws-load-balancer-controller-leader"]))
        );
        assert_eq!(
            rules.namespaced_rules[1].verbs,
            strings(&["get", "patch", "update"])
        );
    }
}
