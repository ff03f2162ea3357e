//! HTTP access to the two services
//!
//! The stores talk to the services only through [`ActivitiesApi`] and
//! [`AccountApi`], so tests can swap in in-memory fakes.

use std::future::Future;

use common::{
    PaginationHeader,
    filter::ActivityParams,
    models::{ActivityDto, ActivityInput, LoginRequest, RegisterRequest, UserDto},
};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    common_store::CommonStore,
    config::ClientConfig,
    error::{ClientError, ClientResult},
};

/// One page of results with the metadata from the `Pagination` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Option<PaginationHeader>,
}

pub trait ActivitiesApi: Send + Sync {
    fn list(
        &self,
        params: &ActivityParams,
    ) -> impl Future<Output = ClientResult<Page<ActivityDto>>> + Send;

    fn details(&self, id: Uuid) -> impl Future<Output = ClientResult<ActivityDto>> + Send;

    fn create(&self, activity: &ActivityInput) -> impl Future<Output = ClientResult<()>> + Send;

    fn update(
        &self,
        id: Uuid,
        activity: &ActivityInput,
    ) -> impl Future<Output = ClientResult<()>> + Send;

    fn delete(&self, id: Uuid) -> impl Future<Output = ClientResult<()>> + Send;

    fn attend(&self, id: Uuid) -> impl Future<Output = ClientResult<()>> + Send;
}

pub trait AccountApi: Send + Sync {
    fn login(&self, credentials: &LoginRequest) -> impl Future<Output = ClientResult<UserDto>> + Send;

    fn register(
        &self,
        registration: &RegisterRequest,
    ) -> impl Future<Output = ClientResult<UserDto>> + Send;

    fn current(&self) -> impl Future<Output = ClientResult<UserDto>> + Send;

    fn refresh_token(&self) -> impl Future<Output = ClientResult<UserDto>> + Send;
}

/// reqwest-backed implementation of both agent traits
///
/// The bearer token is read from the [`CommonStore`] on every request. The
/// cookie store keeps the refresh cookie between calls.
#[derive(Debug, Clone)]
pub struct HttpAgent {
    http: Client,
    config: ClientConfig,
    common: CommonStore,
}

impl HttpAgent {
    pub fn new(config: ClientConfig, common: CommonStore) -> ClientResult<Self> {
        let http = Client::builder().cookie_store(true).build()?;

        Ok(Self {
            http,
            config,
            common,
        })
    }

    fn activities_url(&self, path: &str) -> String {
        format!("{}/activities{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn account_url(&self, path: &str) -> String {
        format!("{}{}", self.config.account_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match self.common.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = ClientError::from_response(status, &body);
        match &error {
            ClientError::Server(server) => {
                warn!("Server error {}: {}", server.status_code, server.message);
                self.common.set_server_error(server.clone());
            }
            other => debug!("Request failed: {}", other),
        }

        Err(error)
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        Ok(self.send(builder).await?.json().await?)
    }
}

/// Parse the `Pagination` header, if the response carries one
fn pagination(response: &Response) -> Option<PaginationHeader> {
    let value = response.headers().get(PaginationHeader::NAME)?.to_str().ok()?;
    match PaginationHeader::from_header_value(value) {
        Ok(header) => Some(header),
        Err(e) => {
            warn!("Ignoring malformed pagination header: {}", e);
            None
        }
    }
}

impl ActivitiesApi for HttpAgent {
    async fn list(&self, params: &ActivityParams) -> ClientResult<Page<ActivityDto>> {
        let response = self
            .send(self.request(Method::GET, self.activities_url("")).query(params))
            .await?;
        let pagination = pagination(&response);
        let items = response.json().await?;

        Ok(Page { items, pagination })
    }

    async fn details(&self, id: Uuid) -> ClientResult<ActivityDto> {
        self.json(self.request(Method::GET, self.activities_url(&format!("/{id}"))))
            .await
    }

    async fn create(&self, activity: &ActivityInput) -> ClientResult<()> {
        self.send(self.request(Method::POST, self.activities_url("")).json(activity))
            .await?;
        Ok(())
    }

    async fn update(&self, id: Uuid, activity: &ActivityInput) -> ClientResult<()> {
        self.send(
            self.request(Method::PUT, self.activities_url(&format!("/{id}")))
                .json(activity),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> ClientResult<()> {
        self.send(self.request(Method::DELETE, self.activities_url(&format!("/{id}"))))
            .await?;
        Ok(())
    }

    async fn attend(&self, id: Uuid) -> ClientResult<()> {
        self.send(self.request(Method::POST, self.activities_url(&format!("/{id}/attend"))))
            .await?;
        Ok(())
    }
}

impl AccountApi for HttpAgent {
    async fn login(&self, credentials: &LoginRequest) -> ClientResult<UserDto> {
        self.json(self.request(Method::POST, self.account_url("/login")).json(credentials))
            .await
    }

    async fn register(&self, registration: &RegisterRequest) -> ClientResult<UserDto> {
        self.json(
            self.request(Method::POST, self.account_url("/register"))
                .json(registration),
        )
        .await
    }

    async fn current(&self) -> ClientResult<UserDto> {
        self.json(self.request(Method::GET, self.account_url(""))).await
    }

    async fn refresh_token(&self) -> ClientResult<UserDto> {
        self.json(self.request(Method::POST, self.account_url("/refreshToken")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> HttpAgent {
        HttpAgent::new(ClientConfig::default(), CommonStore::new()).unwrap()
    }

    #[test]
    fn urls_follow_the_service_layout() {
        let agent = agent();
        let id = Uuid::nil();

        assert_eq!(
            agent.activities_url(&format!("/{id}/attend")),
            format!("http://localhost:5000/api/activities/{id}/attend")
        );
        assert_eq!(
            agent.account_url("/refreshToken"),
            "http://localhost:5001/api/account/refreshToken"
        );
        assert_eq!(agent.account_url(""), "http://localhost:5001/api/account");
    }

    #[test]
    fn requests_carry_the_stored_token() {
        let agent = agent();
        agent.common.set_token(Some("jwt".to_string()));

        let request = agent
            .request(Method::GET, agent.account_url(""))
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer jwt"
        );
    }

    #[test]
    fn list_query_uses_wire_names() {
        let agent = agent();
        let params = ActivityParams {
            page_number: Some(2),
            page_size: Some(10),
            start_date: None,
            is_going: true,
            is_host: false,
        };

        let request = agent
            .request(Method::GET, agent.activities_url(""))
            .query(&params)
            .build()
            .unwrap();
        let query = request.url().query().unwrap();
        assert!(query.contains("pageNumber=2"));
        assert!(query.contains("isGoing=true"));
        assert!(!query.contains("startDate"));
    }
}
