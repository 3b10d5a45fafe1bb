use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize};
use shared::{
    domain::{DurationInSeconds, IstioObjectType},
    error::{ApiError, ErrorCode},
    protocol::{IstioConfigsMap, ServiceDetailsInfo},
};
use tracing::{debug, warn};

pub mod alerts;
pub mod config;

pub use alerts::{Alert, AlertChannel, AlertSink};
pub use config::Settings;

/// REST surface consumed by the detail pages.
#[async_trait]
pub trait MeshApi: Send + Sync {
    async fn get_service_detail(
        &self,
        namespace: &str,
        service: &str,
        validate: bool,
        cluster: Option<&str>,
        rate_interval: Option<DurationInSeconds>,
    ) -> Result<ServiceDetailsInfo, ApiError>;

    #[allow(clippy::too_many_arguments)]
    async fn get_all_istio_configs(
        &self,
        namespaces: &[String],
        objects: &[IstioObjectType],
        validate: bool,
        label_selector: &str,
        workload_selector: &str,
        cluster: Option<&str>,
    ) -> Result<IstioConfigsMap, ApiError>;

    /// Deletes the virtual services, destination rules and k8s HTTP routes
    /// attached to the service.
    async fn delete_service_traffic_routing(
        &self,
        details: &ServiceDetailsInfo,
    ) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct HttpMeshApi {
    http: Client,
    server_url: String,
}

impl HttpMeshApi {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: config::normalize_server_url(&server_url.into()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("failed to build dashboard http client")?;
        Ok(Self {
            http,
            server_url: config::normalize_server_url(&settings.server_url),
        })
    }

    async fn delete_istio_object(
        &self,
        namespace: &str,
        kind: IstioObjectType,
        name: &str,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/api/namespaces/{namespace}/istio/{}/{name}",
            self.server_url,
            kind.as_str()
        );
        debug!(namespace, kind = kind.as_str(), name, "deleting istio object");
        let response = self.http.delete(url).send().await;
        checked(response).await.map(|_| ())
    }
}

#[async_trait]
impl MeshApi for HttpMeshApi {
    async fn get_service_detail(
        &self,
        namespace: &str,
        service: &str,
        validate: bool,
        cluster: Option<&str>,
        rate_interval: Option<DurationInSeconds>,
    ) -> Result<ServiceDetailsInfo, ApiError> {
        let mut query = vec![("validate", validate.to_string())];
        if let Some(rate_interval) = rate_interval {
            query.push(("rateInterval", rate_interval.as_rate_interval()));
        }
        if let Some(cluster) = cluster {
            query.push(("clusterName", cluster.to_string()));
        }

        let response = self
            .http
            .get(format!(
                "{}/api/namespaces/{namespace}/services/{service}",
                self.server_url
            ))
            .query(&query)
            .send()
            .await;
        read_json(response).await
    }

    async fn get_all_istio_configs(
        &self,
        namespaces: &[String],
        objects: &[IstioObjectType],
        validate: bool,
        label_selector: &str,
        workload_selector: &str,
        cluster: Option<&str>,
    ) -> Result<IstioConfigsMap, ApiError> {
        let objects = objects
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let mut query = vec![
            ("namespaces", namespaces.join(",")),
            ("objects", objects),
            ("validate", validate.to_string()),
            ("labelSelector", label_selector.to_string()),
            ("workloadSelector", workload_selector.to_string()),
        ];
        if let Some(cluster) = cluster {
            query.push(("clusterName", cluster.to_string()));
        }

        let response = self
            .http
            .get(format!("{}/api/istio/config", self.server_url))
            .query(&query)
            .send()
            .await;
        read_json(response).await
    }

    async fn delete_service_traffic_routing(
        &self,
        details: &ServiceDetailsInfo,
    ) -> Result<(), ApiError> {
        let service_namespace = details.service.namespace.as_str();
        let namespace_of = |meta_namespace: &str| -> String {
            if meta_namespace.is_empty() {
                service_namespace.to_string()
            } else {
                meta_namespace.to_string()
            }
        };

        let mut targets = Vec::new();
        for vs in &details.virtual_services {
            targets.push((
                namespace_of(&vs.metadata.namespace),
                IstioObjectType::VirtualServices,
                vs.metadata.name.clone(),
            ));
        }
        for dr in &details.destination_rules {
            targets.push((
                namespace_of(&dr.metadata.namespace),
                IstioObjectType::DestinationRules,
                dr.metadata.name.clone(),
            ));
        }
        for route in &details.k8s_http_routes {
            targets.push((
                namespace_of(&route.metadata.namespace),
                IstioObjectType::K8sHttpRoutes,
                route.metadata.name.clone(),
            ));
        }

        let results = join_all(
            targets
                .iter()
                .map(|(namespace, kind, name)| self.delete_istio_object(namespace, *kind, name)),
        )
        .await;
        results.into_iter().collect()
    }
}

async fn checked(response: reqwest::Result<Response>) -> Result<Response, ApiError> {
    let response = response.map_err(|err| ApiError::transport(err.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|body| body.error)
        .unwrap_or_else(|_| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body
            }
        });
    warn!(status = status.as_u16(), %message, "dashboard api request failed");
    Err(ApiError::new(ErrorCode::from_status(status.as_u16()), message))
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Result<Response>,
) -> Result<T, ApiError> {
    checked(response)
        .await?
        .json::<T>()
        .await
        .map_err(|err| ApiError::new(ErrorCode::Internal, format!("malformed response: {err}")))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
