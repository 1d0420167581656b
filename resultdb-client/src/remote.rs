// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP backend for the results database.
//!
//! Speaks the REST protocol of the hosted results database: JSON bodies, an
//! `X-Access-Token` header on every call, and presigned upload URLs for
//! figures and data files.

use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use resultdb_core::wire::{
    AnalysisResultsEnvelope, BulkUpdateEnvelope, DeviceComponentsEnvelope, DevicesEnvelope,
    ExperimentsEnvelope, FilesEnvelope, UploadUrl,
};
use resultdb_core::{
    AnalysisResultQuery, DeviceComponentEntry, ExperimentBackend, ExperimentQuery, FileEntry, Page,
    RemoteSettings, Result, ResultDbError, WireAnalysisResult, WireExperiment,
};

const ACCESS_TOKEN_HEADER: &str = "X-Access-Token";
const LOGIN_PATH: &str = "/users/loginWithToken";
const USER_INFO_PATH: &str = "/users/me";

/// Connection settings of a remote results database.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the results database
    pub db_url: String,
    /// Session access token
    pub access_token: String,
    /// Request timeout (default: 100 seconds)
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(db_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            db_url: db_url.into(),
            access_token: access_token.into(),
            timeout: Duration::from_secs(100),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Exchange an API token for an access token and discover the database URL.
    pub fn authenticate(auth_url: &str, api_token: &str, timeout: Duration) -> Result<Self> {
        let http = build_http(timeout)?;
        let access_token = login(&http, auth_url, api_token)?;
        let db_url = discover_db_url(&http, auth_url, &access_token)?;
        Ok(Self {
            db_url,
            access_token,
            timeout,
        })
    }

    /// Resolve whatever `settings` leave open through the auth service.
    pub fn from_settings(settings: &RemoteSettings, timeout: Duration) -> Result<Self> {
        if let (Some(db_url), Some(access_token)) = (&settings.db_url, &settings.access_token) {
            return Ok(Self::new(db_url.clone(), access_token.clone()).with_timeout(timeout));
        }
        let http = build_http(timeout)?;
        let access_token = match &settings.access_token {
            Some(token) => token.clone(),
            None => {
                let api_token = settings.api_token.as_deref().ok_or_else(|| {
                    ResultDbError::InvalidArgument(
                        "either an access token or an API token is required".to_string(),
                    )
                })?;
                login(&http, settings.auth_url(), api_token)?
            }
        };
        let db_url = match &settings.db_url {
            Some(url) => url.clone(),
            None => discover_db_url(&http, settings.auth_url(), &access_token)?,
        };
        Ok(Self {
            db_url,
            access_token,
            timeout,
        })
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "apiToken")]
    api_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    urls: UserUrls,
}

#[derive(Debug, Deserialize)]
struct UserUrls {
    services: ServiceUrls,
}

#[derive(Debug, Deserialize)]
struct ServiceUrls {
    #[serde(rename = "resultsDB")]
    results_db: String,
}

fn build_http(timeout: Duration) -> Result<HttpClient> {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .map_err(transport_error)
}

fn login(http: &HttpClient, auth_url: &str, api_token: &str) -> Result<String> {
    let url = join_url(auth_url, LOGIN_PATH);
    debug!(url = %url, "Requesting access token");
    let response = check_status(
        http.post(&url)
            .json(&LoginRequest { api_token })
            .send()
            .map_err(transport_error)?,
    )?;
    let login: LoginResponse = response.json().map_err(transport_error)?;
    Ok(login.id)
}

fn discover_db_url(http: &HttpClient, auth_url: &str, access_token: &str) -> Result<String> {
    let url = join_url(auth_url, USER_INFO_PATH);
    debug!(url = %url, "Requesting user info");
    let response = check_status(
        http.get(&url)
            .header(ACCESS_TOKEN_HEADER, access_token)
            .send()
            .map_err(transport_error)?,
    )?;
    let info: UserInfo = response.json().map_err(transport_error)?;
    info!(db_url = %info.urls.services.results_db, "Discovered results database");
    Ok(info.urls.services.results_db)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn transport_error(err: reqwest::Error) -> ResultDbError {
    match err.status() {
        Some(status) => ResultDbError::from_status(status.as_u16(), err.to_string()),
        None => ResultDbError::request_failed(err.to_string()),
    }
}

/// Map a non-success status onto the error taxonomy.
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().unwrap_or_default();
    Err(ResultDbError::from_status(status.as_u16(), message))
}

/// [`ExperimentBackend`] over HTTP.
pub struct RemoteBackend {
    config: RemoteConfig,
    http_client: HttpClient,
}

impl RemoteBackend {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let http_client = build_http(config.timeout)?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Resolve `settings` and connect.
    pub fn connect(settings: &RemoteSettings, timeout: Duration) -> Result<Self> {
        Self::new(RemoteConfig::from_settings(settings, timeout)?)
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.config.db_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(method = %method, url = %url, "Sending request");
        self.http_client
            .request(method, &url)
            .header(ACCESS_TOKEN_HEADER, &self.config.access_token)
            .header("Content-Type", "application/json")
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        check_status(request.send().map_err(transport_error)?)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let response = self.send(self.request(Method::GET, path).query(params))?;
        decode_body(response)
    }

    fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(self.request(method, path).json(body))?;
        decode_body(response)
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, path))?;
        Ok(())
    }

    /// Ask `request_path` for a presigned URL and PUT `body` there.
    ///
    /// The presigned URL is used bare, without the access token.
    fn upload_presigned(&self, request_path: &str, body: Vec<u8>) -> Result<()> {
        let target: UploadUrl = self.get_json(request_path, &[])?;
        debug!(url = %target.url, size = body.len(), "Uploading to presigned URL");
        let request = self
            .http_client
            .put(&target.url)
            .header("Content-Type", "application/json")
            .body(body);
        self.send(request)?;
        Ok(())
    }
}

fn decode_body<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().map_err(transport_error)?;
    Ok(serde_json::from_str(&text)?)
}

impl ExperimentBackend for RemoteBackend {
    fn devices(&self) -> Result<Vec<Value>> {
        let envelope: DevicesEnvelope = self.get_json("/devices", &[])?;
        Ok(envelope.devices)
    }

    fn device_components(&self, backend_name: Option<&str>) -> Result<Vec<DeviceComponentEntry>> {
        let params: Vec<(&str, String)> = backend_name
            .map(|name| vec![("device_name", name.to_string())])
            .unwrap_or_default();
        let envelope: DeviceComponentsEnvelope = self.get_json("/device_components", &params)?;
        Ok(envelope.device_components)
    }

    fn experiments(
        &self,
        query: &ExperimentQuery,
        limit: Option<usize>,
        marker: Option<&str>,
    ) -> Result<Page<WireExperiment>> {
        let envelope: ExperimentsEnvelope =
            self.get_json("/experiments", &query.to_params(limit, marker))?;
        Ok(Page::new(envelope.experiments, envelope.marker))
    }

    fn experiment_get(&self, experiment_id: &str) -> Result<WireExperiment> {
        self.get_json(&format!("/experiments/{}", experiment_id), &[])
    }

    fn experiment_upload(&self, experiment: &WireExperiment) -> Result<WireExperiment> {
        self.send_json(Method::POST, "/experiments", experiment)
    }

    fn experiment_update(
        &self,
        experiment_id: &str,
        experiment: &WireExperiment,
    ) -> Result<WireExperiment> {
        self.send_json(Method::PUT, &format!("/experiments/{}", experiment_id), experiment)
    }

    fn experiment_delete(&self, experiment_id: &str) -> Result<()> {
        self.delete(&format!("/experiments/{}", experiment_id))
    }

    fn figure_upload(&self, experiment_id: &str, figure_name: &str, figure: &[u8]) -> Result<()> {
        self.upload_presigned(
            &format!("/experiments/{}/plots/upload/{}", experiment_id, figure_name),
            figure.to_vec(),
        )
    }

    fn figure_update(&self, experiment_id: &str, figure_name: &str, figure: &[u8]) -> Result<()> {
        // Same endpoint as upload; the server overwrites.
        self.figure_upload(experiment_id, figure_name, figure)
    }

    fn figure_get(&self, experiment_id: &str, figure_name: &str) -> Result<Vec<u8>> {
        let response = self.send(self.request(
            Method::GET,
            &format!("/experiments/{}/plots/{}", experiment_id, figure_name),
        ))?;
        Ok(response.bytes().map_err(transport_error)?.to_vec())
    }

    fn figure_delete(&self, experiment_id: &str, figure_name: &str) -> Result<()> {
        self.delete(&format!("/experiments/{}/plots/{}", experiment_id, figure_name))
    }

    fn analysis_results(
        &self,
        query: &AnalysisResultQuery,
        limit: Option<usize>,
        marker: Option<&str>,
    ) -> Result<Page<WireAnalysisResult>> {
        let envelope: AnalysisResultsEnvelope =
            self.get_json("/analysis_results", &query.to_params(limit, marker))?;
        Ok(Page::new(envelope.analysis_results, envelope.marker))
    }

    fn analysis_result_get(&self, result_id: &str) -> Result<WireAnalysisResult> {
        self.get_json(&format!("/analysis_results/{}", result_id), &[])
    }

    fn analysis_result_create(&self, result: &WireAnalysisResult) -> Result<WireAnalysisResult> {
        self.send_json(Method::POST, "/analysis_results", result)
    }

    fn analysis_result_update(
        &self,
        result_id: &str,
        result: &WireAnalysisResult,
    ) -> Result<WireAnalysisResult> {
        self.send_json(Method::PUT, &format!("/analysis_results/{}", result_id), result)
    }

    fn bulk_analysis_result_update(
        &self,
        results: &[WireAnalysisResult],
    ) -> Result<Vec<WireAnalysisResult>> {
        let body = BulkUpdateEnvelope {
            analysis_results: results.to_vec(),
        };
        let envelope: BulkUpdateEnvelope =
            self.send_json(Method::PUT, "/analysis_results/bulkupdate", &body)?;
        Ok(envelope.analysis_results)
    }

    fn analysis_result_delete(&self, result_id: &str) -> Result<()> {
        self.delete(&format!("/analysis_results/{}", result_id))
    }

    fn files(&self, experiment_id: &str) -> Result<Vec<FileEntry>> {
        let envelope: FilesEnvelope =
            self.get_json(&format!("/experiments/{}/files", experiment_id), &[])?;
        Ok(envelope.files)
    }

    fn file_upload(&self, experiment_id: &str, file_name: &str, contents: &str) -> Result<()> {
        self.upload_presigned(
            &format!("/experiments/{}/files/upload/{}", experiment_id, file_name),
            contents.as_bytes().to_vec(),
        )
    }

    fn file_download(&self, experiment_id: &str, file_name: &str) -> Result<Value> {
        self.get_json(&format!("/experiments/{}/files/{}", experiment_id, file_name), &[])
    }
}
