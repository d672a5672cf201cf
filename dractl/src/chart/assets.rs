//! Default chart bundled into the binary.

pub const CHART_YAML: &str = include_str!("../../assets/chart/Chart.yaml");
pub const VALUES_YAML: &str = include_str!("../../assets/chart/values.yaml");

pub const TEMPLATES: &[(&str, &str)] = &[
    (
        "templates/NOTES.txt",
        include_str!("../../assets/chart/templates/NOTES.txt"),
    ),
    (
        "templates/clusterrole.yaml",
        include_str!("../../assets/chart/templates/clusterrole.yaml"),
    ),
    (
        "templates/clusterrolebinding.yaml",
        include_str!("../../assets/chart/templates/clusterrolebinding.yaml"),
    ),
    (
        "templates/daemonset.yaml",
        include_str!("../../assets/chart/templates/daemonset.yaml"),
    ),
    (
        "templates/deviceclass.yaml",
        include_str!("../../assets/chart/templates/deviceclass.yaml"),
    ),
    (
        "templates/securitycontextconstraints.yaml",
        include_str!(
            "../../assets/chart/templates/securitycontextconstraints.yaml"
        ),
    ),
    (
        "templates/serviceaccount.yaml",
        include_str!("../../assets/chart/templates/serviceaccount.yaml"),
    ),
    (
        "templates/validatingadmissionpolicy.yaml",
        include_str!(
            "../../assets/chart/templates/validatingadmissionpolicy.yaml"
        ),
    ),
    (
        "templates/validatingadmissionpolicybinding.yaml",
        include_str!(
            "../../assets/chart/templates/validatingadmissionpolicybinding.yaml"
        ),
    ),
];
