//! Navigation context of a service details page and change classification.

use shared::domain::{DurationInSeconds, ServiceId, TimeInMilliseconds};

pub const TAB_PARAM: &str = "tab";
pub const CLUSTER_PARAM: &str = "clusterName";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tab {
    #[default]
    Info,
    Traffic,
    Metrics,
    Traces,
}

impl Tab {
    /// Unknown or missing values select the default tab.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("traffic") => Self::Traffic,
            Some("metrics") => Self::Metrics,
            Some("traces") => Self::Traces,
            _ => Self::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Traffic => "traffic",
            Self::Metrics => "metrics",
            Self::Traces => "traces",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Info => 0,
            Self::Traffic => 1,
            Self::Metrics => 2,
            Self::Traces => 3,
        }
    }

    /// Whether the page itself fetches data for this tab. The other tabs are
    /// rendered by components that load their own data.
    pub fn is_server_backed(self) -> bool {
        matches!(self, Self::Info)
    }

    pub fn uses_custom_time(self) -> bool {
        matches!(self, Self::Metrics | Self::Traces)
    }
}

/// Inputs the page receives from routing and the surrounding shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDetailsProps {
    pub service_id: ServiceId,
    /// Raw `clusterName` query value.
    pub cluster: Option<String>,
    /// Raw `tab` query value.
    pub tab: Option<String>,
    pub duration: DurationInSeconds,
    pub last_refresh_at: TimeInMilliseconds,
    pub tracing_enabled: bool,
}

impl ServiceDetailsProps {
    pub fn new(
        service_id: ServiceId,
        duration: DurationInSeconds,
        last_refresh_at: TimeInMilliseconds,
    ) -> Self {
        Self {
            service_id,
            cluster: None,
            tab: None,
            duration,
            last_refresh_at,
            tracing_enabled: false,
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    pub fn with_tab(mut self, tab: Tab) -> Self {
        self.tab = Some(tab.as_str().to_string());
        self
    }

    /// Reads `tab` and `clusterName` from a URL query string.
    pub fn with_query(mut self, query: &str) -> Self {
        let query = query.trim_start_matches('?');
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                TAB_PARAM => self.tab = Some(value.into_owned()),
                CLUSTER_PARAM => self.cluster = Some(value.into_owned()),
                _ => {}
            }
        }
        self
    }

    pub fn active_tab(&self) -> Tab {
        Tab::from_param(self.tab.as_deref())
    }

    /// An empty cluster parameter means "no cluster filter".
    pub fn cluster_filter(&self) -> Option<String> {
        self.cluster.clone().filter(|cluster| !cluster.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub namespace: String,
    pub service: String,
    pub cluster: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationContext {
    pub entity: EntityRef,
    pub tab: Tab,
    pub duration: DurationInSeconds,
    pub last_refresh_at: TimeInMilliseconds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextChange {
    Unchanged,
    /// Only the active tab differs.
    TabOnly,
    /// Entity or time window differs, or the refresh tick moved forward.
    Full,
}

impl NavigationContext {
    pub fn from_props(props: &ServiceDetailsProps) -> Self {
        Self {
            entity: EntityRef {
                namespace: props.service_id.namespace.clone(),
                service: props.service_id.service.clone(),
                cluster: props.cluster_filter(),
            },
            tab: props.active_tab(),
            duration: props.duration,
            last_refresh_at: props.last_refresh_at,
        }
    }

    /// A refresh timestamp only counts as a change when it moves forward.
    pub fn diff(&self, next: &NavigationContext) -> ContextChange {
        if self.entity != next.entity
            || self.duration != next.duration
            || next.last_refresh_at > self.last_refresh_at
        {
            ContextChange::Full
        } else if self.tab != next.tab {
            ContextChange::TabOnly
        } else {
            ContextChange::Unchanged
        }
    }
}
