use serde::{Deserialize, Serialize};

macro_rules! unit_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);
    };
}

unit_newtype!(DurationInSeconds);
unit_newtype!(TimeInMilliseconds);

impl DurationInSeconds {
    /// Prometheus-style rate interval, e.g. `600s`.
    pub fn as_rate_interval(self) -> String {
        format!("{}s", self.0)
    }
}

/// A service addressed by namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId {
    pub namespace: String,
    pub service: String,
}

impl ServiceId {
    pub fn new(namespace: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            service: service.into(),
        }
    }
}

/// Mesh config kinds accepted by the istio config listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IstioObjectType {
    Gateways,
    K8sGateways,
    PeerAuthentications,
    VirtualServices,
    DestinationRules,
    K8sHttpRoutes,
}

impl IstioObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gateways => "gateways",
            Self::K8sGateways => "k8sgateways",
            Self::PeerAuthentications => "peerauthentications",
            Self::VirtualServices => "virtualservices",
            Self::DestinationRules => "destinationrules",
            Self::K8sHttpRoutes => "k8shttproutes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardMode {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardAction {
    RequestRouting,
    FaultInjection,
    TrafficShifting,
    TcpTrafficShifting,
    RequestTimeouts,
}
