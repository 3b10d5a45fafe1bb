use shared::{
    domain::{TimeInMilliseconds, WizardAction},
    error::ErrorMsg,
    protocol::{
        validation_key, Gateway, K8sGateway, ObjectValidation, PeerAuthentication,
        ServiceDetailsInfo, Validations,
    },
};

use crate::context::Tab;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PagePhase {
    #[default]
    Idle,
    Fetching,
    Settled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardState {
    pub show: bool,
    pub action: Option<WizardAction>,
    pub update_mode: bool,
}

/// Everything the rendering layer reads for a service details page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageState {
    pub phase: PagePhase,
    pub current_tab: Tab,
    pub cluster: Option<String>,
    pub service_details: Option<ServiceDetailsInfo>,
    pub validations: Validations,
    pub gateways: Vec<Gateway>,
    pub k8s_gateways: Vec<K8sGateway>,
    pub peer_authentications: Vec<PeerAuthentication>,
    pub error: Option<ErrorMsg>,
    pub wizard: WizardState,
    pub confirm_delete_traffic_routing: bool,
    pub last_refresh_at: TimeInMilliseconds,
}

impl PageState {
    /// The error banner replaces the tabs.
    pub fn shows_tabs(&self) -> bool {
        self.error.is_none()
    }

    pub fn uses_custom_time(&self) -> bool {
        self.current_tab.uses_custom_time()
    }

    pub fn service_validation(&self) -> Option<&ObjectValidation> {
        let details = self.service_details.as_ref()?;
        self.validations
            .get("service")?
            .get(&validation_key(&details.service.name, &details.service.namespace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::ServiceOverview;
    use std::collections::BTreeMap;

    fn reviews() -> ServiceDetailsInfo {
        ServiceDetailsInfo {
            service: ServiceOverview {
                name: "reviews".to_string(),
                namespace: "bookinfo".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn service_validation_is_looked_up_by_name_and_namespace() {
        let validation = ObjectValidation {
            name: "reviews".to_string(),
            object_type: "service".to_string(),
            valid: false,
            checks: Vec::new(),
        };
        let mut state = PageState {
            validations: Validations::from([(
                "service".to_string(),
                BTreeMap::from([(validation_key("reviews", "bookinfo"), validation.clone())]),
            )]),
            ..Default::default()
        };
        assert_eq!(state.service_validation(), None);

        state.service_details = Some(reviews());
        assert_eq!(state.service_validation(), Some(&validation));

        state.validations.clear();
        assert_eq!(state.service_validation(), None);
    }

    #[test]
    fn error_banner_hides_tabs() {
        let mut state = PageState::default();
        assert!(state.shows_tabs());
        assert!(!state.uses_custom_time());

        state.error = Some(ErrorMsg {
            title: "No Service is selected".to_string(),
            description: "reviews is not found in the mesh".to_string(),
        });
        state.current_tab = Tab::Traces;
        assert!(!state.shows_tabs());
        assert!(state.uses_custom_time());
    }
}
