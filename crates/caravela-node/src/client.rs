//! The HTTP implementation of the node-to-node client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use caravela_core::{ClientError, ClientResult, NodeClient};
use caravela_proto::{
    ContainerConfig, ContainerStatus, CreateOfferRequest, ErrorResponse, GetOffersRequest,
    GetOffersResponse, LaunchContainersRequest, NeighbourOffersRequest, NodeRef, Offer,
    RefreshOfferRequest, RefreshOfferResponse, RemoveOfferRequest, StopLocalContainerRequest,
    UpdateOfferRequest,
};

use crate::api::routes;
use crate::config::NodeConfig;
use crate::error::Result;

/// Sends typed JSON requests to other nodes' RPC surfaces.
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    client: reqwest::Client,
    api_port: u16,
}

impl HttpNodeClient {
    /// Creates a client; every request is bounded by `request_timeout`.
    pub fn new(api_port: u16, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client, api_port })
    }

    /// Creates a client from node configuration.
    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        Self::new(config.api_port, config.request_timeout)
    }

    fn url(&self, ip: &str, path: &str) -> String {
        format!("http://{ip}:{port}{path}", port = self.api_port)
    }

    async fn post<Req, Resp>(&self, ip: &str, path: &str, body: &Req) -> ClientResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(ip, path))
            .json(body)
            .send()
            .await
            .map_err(to_client_error)?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ClientError::Protocol(e.to_string()));
        }

        match response.json::<ErrorResponse>().await {
            Ok(error) => Err(ClientError::Rejected(error.code)),
            Err(_) => Err(ClientError::Protocol(format!("HTTP {status}"))),
        }
    }

    /// POST where only the status code matters.
    async fn post_ack<Req>(&self, ip: &str, path: &str, body: &Req) -> ClientResult<()>
    where
        Req: Serialize + Sync,
    {
        let response = self
            .client
            .post(self.url(ip, path))
            .json(body)
            .send()
            .await
            .map_err(to_client_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match response.json::<ErrorResponse>().await {
            Ok(error) => Err(ClientError::Rejected(error.code)),
            Err(_) => Err(ClientError::Protocol(format!("HTTP {status}"))),
        }
    }
}

fn to_client_error(error: reqwest::Error) -> ClientError {
    if error.is_timeout() {
        ClientError::Timeout
    } else if error.is_connect() {
        ClientError::Unreachable(error.to_string())
    } else {
        ClientError::Protocol(error.to_string())
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn create_offer(
        &self,
        from_supplier: &NodeRef,
        to_trader: &NodeRef,
        offer: &Offer,
    ) -> ClientResult<()> {
        let request = CreateOfferRequest {
            from_supplier: from_supplier.clone(),
            to_trader: to_trader.clone(),
            offer: offer.clone(),
        };
        self.post_ack(&to_trader.ip, routes::CREATE_OFFER, &request)
            .await
    }

    async fn refresh_offer(
        &self,
        from_trader: &NodeRef,
        to_supplier: &NodeRef,
        offer: &Offer,
    ) -> ClientResult<bool> {
        let request = RefreshOfferRequest {
            from_trader: from_trader.clone(),
            offer: offer.clone(),
        };
        let response: RefreshOfferResponse = self
            .post(&to_supplier.ip, routes::REFRESH_OFFER, &request)
            .await?;
        Ok(response.refreshed)
    }

    async fn update_offer(
        &self,
        from_supplier: &NodeRef,
        to_trader: &NodeRef,
        offer: &Offer,
    ) -> ClientResult<()> {
        let request = UpdateOfferRequest {
            from_supplier: from_supplier.clone(),
            to_trader: to_trader.clone(),
            offer: offer.clone(),
        };
        self.post_ack(&to_trader.ip, routes::UPDATE_OFFER, &request)
            .await
    }

    async fn remove_offer(
        &self,
        from_supplier: &NodeRef,
        to_trader: &NodeRef,
        offer: &Offer,
    ) -> ClientResult<()> {
        let request = RemoveOfferRequest {
            from_supplier: from_supplier.clone(),
            to_trader: to_trader.clone(),
            offer: offer.clone(),
        };
        self.post_ack(&to_trader.ip, routes::REMOVE_OFFER, &request)
            .await
    }

    async fn get_offers(
        &self,
        from_node: &NodeRef,
        to_trader: &NodeRef,
        relay: bool,
    ) -> ClientResult<GetOffersResponse> {
        let request = GetOffersRequest {
            from_node: from_node.clone(),
            to_trader: to_trader.clone(),
            relay,
        };
        self.post(&to_trader.ip, routes::GET_OFFERS, &request).await
    }

    async fn advertise_offers_neighbour(
        &self,
        from_trader: &NodeRef,
        to_neighbour: &NodeRef,
        offering: &NodeRef,
    ) -> ClientResult<()> {
        let request = NeighbourOffersRequest {
            from_trader: from_trader.clone(),
            to_neighbour: to_neighbour.clone(),
            offering: offering.clone(),
        };
        self.post_ack(&to_neighbour.ip, routes::NEIGHBOUR_OFFERS, &request)
            .await
    }

    async fn launch_containers(
        &self,
        from_buyer: &NodeRef,
        to_supplier: &NodeRef,
        offer: &Offer,
        configs: &[ContainerConfig],
    ) -> ClientResult<Vec<ContainerStatus>> {
        let request = LaunchContainersRequest {
            from_buyer: from_buyer.clone(),
            offer: offer.clone(),
            configs: configs.to_vec(),
        };
        self.post(&to_supplier.ip, routes::LAUNCH, &request).await
    }

    async fn stop_local_container(
        &self,
        to_supplier: &NodeRef,
        container_id: &str,
    ) -> ClientResult<()> {
        let request = StopLocalContainerRequest {
            container_id: container_id.to_owned(),
        };
        self.post_ack(&to_supplier.ip, routes::STOP_LOCAL, &request)
            .await
    }
}

/// Client for the user-facing surface of a (usually local) daemon.
///
/// This is what the CLI links against; it talks to `/containers` and
/// `/exit` rather than the node-to-node surface.
#[derive(Debug, Clone)]
pub struct UserClient {
    client: reqwest::Client,
    base_url: String,
}

impl UserClient {
    /// Creates a client for the daemon at `ip:port`.
    pub fn new(ip: &str, api_port: u16, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: format!("http://{ip}:{api_port}"),
        })
    }

    /// Submits containers for deployment somewhere in the system.
    pub async fn submit_containers(
        &self,
        configs: &[ContainerConfig],
    ) -> ClientResult<Vec<ContainerStatus>> {
        let response = self
            .client
            .post(format!("{}/containers", self.base_url))
            .json(configs)
            .send()
            .await
            .map_err(to_client_error)?;
        decode(response).await
    }

    /// Stops containers previously deployed through this daemon.
    pub async fn stop_containers(&self, container_ids: &[String]) -> ClientResult<()> {
        let response = self
            .client
            .delete(format!("{}/containers", self.base_url))
            .json(container_ids)
            .send()
            .await
            .map_err(to_client_error)?;
        ack(response).await
    }

    /// Lists containers running on this daemon.
    pub async fn list_containers(&self) -> ClientResult<Vec<ContainerStatus>> {
        let response = self
            .client
            .get(format!("{}/containers", self.base_url))
            .send()
            .await
            .map_err(to_client_error)?;
        decode(response).await
    }

    /// Asks the daemon to leave the system and shut down.
    pub async fn exit(&self) -> ClientResult<()> {
        let response = self
            .client
            .get(format!("{}/exit", self.base_url))
            .send()
            .await
            .map_err(to_client_error)?;
        ack(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(e.to_string()));
    }
    reject(response, status).await
}

async fn ack(response: reqwest::Response) -> ClientResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    reject(response, status).await
}

async fn reject<T>(response: reqwest::Response, status: StatusCode) -> ClientResult<T> {
    match response.json::<ErrorResponse>().await {
        Ok(error) => Err(ClientError::Rejected(error.code)),
        Err(_) => Err(ClientError::Protocol(format!("HTTP {status}"))),
    }
}
