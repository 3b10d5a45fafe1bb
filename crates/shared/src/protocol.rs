use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

macro_rules! config_object {
    ($name:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub metadata: ObjectMeta,
            #[serde(default)]
            pub spec: serde_json::Value,
        }
    };
}

config_object!(Gateway);
config_object!(K8sGateway);
config_object!(PeerAuthentication);
config_object!(VirtualService);
config_object!(DestinationRule);
config_object!(K8sHttpRoute);
config_object!(ServiceEntry);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IstioConfigList {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub gateways: Vec<Gateway>,
    #[serde(default)]
    pub k8s_gateways: Vec<K8sGateway>,
    #[serde(default)]
    pub peer_authentications: Vec<PeerAuthentication>,
    #[serde(default)]
    pub virtual_services: Vec<VirtualService>,
    #[serde(default)]
    pub destination_rules: Vec<DestinationRule>,
}

/// Response of the istio config listing endpoint, keyed by namespace.
pub type IstioConfigsMap = BTreeMap<String, IstioConfigList>;

/// Flattens the gateway families of every namespace in the response.
pub fn collect_gateways(configs: &IstioConfigsMap) -> (Vec<Gateway>, Vec<K8sGateway>) {
    let mut gateways = Vec::new();
    let mut k8s_gateways = Vec::new();
    for list in configs.values() {
        gateways.extend(list.gateways.iter().cloned());
        k8s_gateways.extend(list.k8s_gateways.iter().cloned());
    }
    (gateways, k8s_gateways)
}

pub fn peer_authentications_in(
    configs: &IstioConfigsMap,
    namespace: &str,
) -> Vec<PeerAuthentication> {
    configs
        .get(namespace)
        .map(|list| list.peer_authentications.clone())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub message: String,
    pub severity: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectValidation {
    pub name: String,
    pub object_type: String,
    pub valid: bool,
    #[serde(default)]
    pub checks: Vec<ValidationMessage>,
}

/// Object type -> `name.namespace` -> validation.
pub type Validations = BTreeMap<String, BTreeMap<String, ObjectValidation>>;

pub fn validation_key(name: &str, namespace: &str) -> String {
    format!("{name}.{namespace}")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOverview {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadOverview {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsStatus {
    pub status: String,
    #[serde(default)]
    pub auto_mtls_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePermissions {
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub delete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDetailsInfo {
    pub service: ServiceOverview,
    #[serde(default)]
    pub workloads: Vec<WorkloadOverview>,
    #[serde(default)]
    pub sub_services: Vec<ServiceOverview>,
    #[serde(default)]
    pub virtual_services: Vec<VirtualService>,
    #[serde(default)]
    pub destination_rules: Vec<DestinationRule>,
    #[serde(default, rename = "k8sHTTPRoutes")]
    pub k8s_http_routes: Vec<K8sHttpRoute>,
    #[serde(default)]
    pub service_entries: Vec<ServiceEntry>,
    #[serde(default)]
    pub validations: Validations,
    #[serde(default, rename = "namespaceMTLS")]
    pub namespace_mtls: Option<TlsStatus>,
    #[serde(default)]
    pub istio_permissions: ResourcePermissions,
}

impl ServiceDetailsInfo {
    pub fn has_traffic_routing(&self) -> bool {
        !self.virtual_services.is_empty()
            || !self.destination_rules.is_empty()
            || !self.k8s_http_routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_listing_flattens_gateways_across_namespaces() {
        let raw = r#"{
            "bookinfo": {"gateways": [{"metadata": {"name": "gw-a"}}], "k8sGateways": []},
            "istio-system": {"gateways": [{"metadata": {"name": "gw-b"}}],
                             "k8sGateways": [{"metadata": {"name": "k8s-gw"}}]}
        }"#;
        let configs: IstioConfigsMap = serde_json::from_str(raw).expect("decode");
        let (gateways, k8s) = collect_gateways(&configs);
        let names: Vec<_> = gateways.iter().map(|g| g.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["gw-a", "gw-b"]);
        assert_eq!(k8s.len(), 1);
    }

    #[test]
    fn missing_namespace_yields_no_peer_authentications() {
        let configs = IstioConfigsMap::new();
        assert!(peer_authentications_in(&configs, "bookinfo").is_empty());
    }

    #[test]
    fn service_details_decode_with_sparse_payload() {
        let raw = r#"{"service": {"name": "reviews", "namespace": "bookinfo"},
                      "k8sHTTPRoutes": [{"metadata": {"name": "r1"}}]}"#;
        let details: ServiceDetailsInfo = serde_json::from_str(raw).expect("decode");
        assert_eq!(details.service.name, "reviews");
        assert!(details.has_traffic_routing());
        assert!(details.namespace_mtls.is_none());
    }
}
