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

//! HTTP backend against a mock results database.

use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use resultdb_client::{ExperimentService, RemoteBackend, RemoteConfig};
use resultdb_core::{
    AnalysisResultRecord, ExperimentBackend, ExperimentFilter, ExperimentQuery, ExperimentRecord,
    ResultDbError, ServiceOptions, WireAnalysisResult, WireExperiment,
};

const TOKEN: &str = "test-token";

fn backend_for(server: &Server) -> RemoteBackend {
    RemoteBackend::new(RemoteConfig::new(server.url(), TOKEN).with_timeout(Duration::from_secs(5)))
        .unwrap()
}

fn experiments(ids: &[&str]) -> Vec<serde_json::Value> {
    ids.iter()
        .map(|id| json!({"uuid": id, "device_name": "B1"}))
        .collect()
}

fn service_for(server: &Server) -> ExperimentService {
    ExperimentService::with_backend(Arc::new(backend_for(server)), false, ServiceOptions::unattended())
}

#[test]
fn test_experiment_get_sends_token_and_decodes() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/experiments/e1")
        .match_header("X-Access-Token", TOKEN)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "uuid": "e1",
                "type": "T1",
                "device_name": "B1",
                "tags": ["cal"],
                "visibility": "project",
                "start_time": "2024-03-01T10:00:00Z"
            })
            .to_string(),
        )
        .create();

    let record = service_for(&server).experiment("e1").unwrap();
    mock.assert();
    assert_eq!(record.experiment_id, "e1");
    assert_eq!(record.experiment_type, "T1");
    assert_eq!(record.backend, "B1");
    assert_eq!(record.tags, vec!["cal"]);
    assert!(record.start_datetime.is_some());
}

#[test]
fn test_status_codes_map_to_error_kinds() {
    let mut server = Server::new();
    let _missing = server
        .mock("GET", "/experiments/gone")
        .with_status(404)
        .with_body("no such experiment")
        .create();
    let _conflict = server
        .mock("POST", "/experiments")
        .with_status(409)
        .with_body("duplicate uuid")
        .create();
    let _broken = server
        .mock("GET", "/analysis_results/r1")
        .with_status(500)
        .with_body("database offline")
        .create();
    let backend = backend_for(&server);

    let err = backend.experiment_get("gone").unwrap_err();
    assert_eq!(err, ResultDbError::EntryNotFound("no such experiment".into()));

    let err = backend
        .experiment_upload(&WireExperiment {
            uuid: Some("e1".into()),
            ..Default::default()
        })
        .unwrap_err();
    assert!(err.is_entry_exists());

    let err = backend.analysis_result_get("r1").unwrap_err();
    assert_eq!(err.status(), Some(500));
    match err {
        ResultDbError::RequestFailed { message, .. } => assert_eq!(message, "database offline"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_service_context_wraps_remote_errors() {
    let mut server = Server::new();
    let _missing = server
        .mock("GET", "/experiments/gone")
        .with_status(404)
        .with_body("not here")
        .create();

    let err = service_for(&server).experiment("gone").unwrap_err();
    assert!(err.is_entry_not_found());
    assert!(err
        .to_string()
        .contains("Experiment gone not found. The server responded with not here"));
}

#[test]
fn test_list_query_parameters() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/experiments")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("device_name".into(), "B1".into()),
            Matcher::UrlEncoded("type".into(), "like:rabi".into()),
            Matcher::UrlEncoded("tags".into(), "any:a,b".into()),
            Matcher::UrlEncoded("visibility".into(), "!public".into()),
            Matcher::UrlEncoded("limit".into(), "10".into()),
            Matcher::UrlEncoded("marker".into(), "m7".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"experiments": [{"uuid": "e1"}]}).to_string())
        .create();

    let query: ExperimentQuery = ExperimentFilter::new()
        .backend_name("B1")
        .experiment_type("rabi")
        .experiment_type_operator("like")
        .tags(["a", "b"], "OR")
        .exclude_public()
        .to_query()
        .unwrap();
    let page = backend_for(&server)
        .experiments(&query, Some(10), Some("m7"))
        .unwrap();
    mock.assert();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.marker, None);
}

#[test]
fn test_service_follows_markers_until_limit() {
    let mut server = Server::new();
    let first = server
        .mock("GET", "/experiments")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("device_name".into(), "B1".into()),
            Matcher::UrlEncoded("limit".into(), "5".into()),
        ]))
        .with_status(200)
        .with_body(json!({"experiments": experiments(&["e1", "e2", "e3"]), "marker": "m1"}).to_string())
        .expect(1)
        .create();
    let second = server
        .mock("GET", "/experiments")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".into(), "2".into()),
            Matcher::UrlEncoded("marker".into(), "m1".into()),
        ]))
        .with_status(200)
        .with_body(json!({"experiments": experiments(&["e4", "e5"]), "marker": "m2"}).to_string())
        .expect(1)
        .create();

    let found = service_for(&server)
        .experiments(&ExperimentFilter::new().backend_name("B1"), Some(5))
        .unwrap();
    first.assert();
    second.assert();
    let ids: Vec<_> = found.iter().map(|e| e.experiment_id.as_str()).collect();
    assert_eq!(ids, vec!["e1", "e2", "e3", "e4", "e5"]);
}

#[test]
fn test_create_experiment_body() {
    let mut server = Server::new();
    let record = ExperimentRecord::new("T1", "B1")
        .with_id("e9")
        .with_tags(["t"]);
    let mock = server
        .mock("POST", "/experiments")
        .match_header("content-type", Matcher::Regex("application/json".into()))
        .match_body(Matcher::PartialJson(json!({
            "uuid": "e9",
            "type": "T1",
            "device_name": "B1",
            "tags": ["t"]
        })))
        .with_status(200)
        .with_body(json!({"uuid": "e9", "type": "T1", "device_name": "B1", "owner": "me"}).to_string())
        .create();

    let created = service_for(&server).create_experiment(&record).unwrap();
    mock.assert();
    assert_eq!(created.owner.as_deref(), Some("me"));
}

#[test]
fn test_figure_upload_goes_through_presigned_url() {
    let mut server = Server::new();
    let presigned = format!("{}/bucket/fig-123", server.url());
    let ask = server
        .mock("GET", "/experiments/e1/plots/upload/fit.svg")
        .match_header("X-Access-Token", TOKEN)
        .with_status(200)
        .with_body(json!({ "url": presigned }).to_string())
        .create();
    let put = server
        .mock("PUT", "/bucket/fig-123")
        .match_header("X-Access-Token", Matcher::Missing)
        .match_body("<svg/>")
        .with_status(200)
        .create();

    let (name, size) = service_for(&server)
        .create_figure("e1", b"<svg/>".to_vec(), Some("fit"))
        .unwrap();
    ask.assert();
    put.assert();
    assert_eq!((name.as_str(), size), ("fit.svg", 6));
}

#[test]
fn test_file_upload_and_download() {
    let mut server = Server::new();
    let presigned = format!("{}/bucket/params", server.url());
    let ask = server
        .mock("GET", "/experiments/e1/files/upload/params.json")
        .with_status(200)
        .with_body(json!({ "url": presigned }).to_string())
        .create();
    let put = server
        .mock("PUT", "/bucket/params")
        .match_body(Matcher::Json(json!({"shots": 100})))
        .with_status(200)
        .create();
    let get = server
        .mock("GET", "/experiments/e1/files/params.json")
        .with_status(200)
        .with_body(json!({"shots": 100}).to_string())
        .create();
    let list = server
        .mock("GET", "/experiments/e1/files")
        .with_status(200)
        .with_body(
            json!({"files": [{"Key": "params.json", "Size": 13, "LastModified": "2024-03-01T10:00:00Z"}]})
                .to_string(),
        )
        .create();

    let service = service_for(&server);
    service.file_upload("e1", "params", json!({"shots": 100})).unwrap();
    assert_eq!(service.file_download("e1", "params").unwrap()["shots"], 100);
    assert!(service.experiment_has_file("e1", "params.json").unwrap());
    ask.assert();
    put.assert();
    get.assert();
    list.assert();
}

#[test]
fn test_bulk_update_envelope() {
    let mut server = Server::new();
    let mock = server
        .mock("PUT", "/analysis_results/bulkupdate")
        .match_body(Matcher::PartialJson(json!({
            "analysis_results": [{"uuid": "r1", "verified": true}]
        })))
        .with_status(200)
        .with_body(json!({"analysis_results": [{"uuid": "r1"}]}).to_string())
        .create();

    let mut record = AnalysisResultRecord::new("e1", "T1").with_id("r1");
    record.verified = true;
    service_for(&server)
        .bulk_update_analysis_results(&[record])
        .unwrap();
    mock.assert();
}

#[test]
fn test_create_or_update_result_retries_as_update() {
    let mut server = Server::new();
    let create = server
        .mock("POST", "/analysis_results")
        .with_status(409)
        .with_body("exists")
        .expect(1)
        .create();
    let update = server
        .mock("PUT", "/analysis_results/r1")
        .with_status(200)
        .with_body(json!({"uuid": "r1", "experiment_uuid": "e1"}).to_string())
        .expect(1)
        .create();

    let record = AnalysisResultRecord::new("e1", "T1").with_id("r1");
    let id = service_for(&server)
        .create_or_update_analysis_result(&record, true)
        .unwrap();
    create.assert();
    update.assert();
    assert_eq!(id, "r1");
}

#[test]
fn test_device_components_query() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/device_components")
        .match_query(Matcher::UrlEncoded("device_name".into(), "dev_a".into()))
        .with_status(200)
        .with_body(
            json!({"device_components": [
                {"device_name": "dev_a", "type": "Q0"},
                {"device_name": "dev_a", "type": "Q1"}
            ]})
            .to_string(),
        )
        .create();

    let components = service_for(&server).device_components("dev_a").unwrap();
    mock.assert();
    assert_eq!(components, vec!["Q0", "Q1"]);
}

#[test]
fn test_authenticate_discovers_database() {
    let mut server = Server::new();
    let login = server
        .mock("POST", "/users/loginWithToken")
        .match_body(Matcher::Json(json!({"apiToken": "api-key"})))
        .with_status(200)
        .with_body(json!({"id": "session-1", "ttl": 1209600}).to_string())
        .create();
    let me = server
        .mock("GET", "/users/me")
        .match_header("X-Access-Token", "session-1")
        .with_status(200)
        .with_body(json!({"urls": {"services": {"resultsDB": "https://db.example"}}}).to_string())
        .create();

    let config = RemoteConfig::authenticate(&server.url(), "api-key", Duration::from_secs(5)).unwrap();
    login.assert();
    me.assert();
    assert_eq!(config.access_token, "session-1");
    assert_eq!(config.db_url, "https://db.example");
}

#[test]
fn test_rejected_login() {
    let mut server = Server::new();
    let _login = server
        .mock("POST", "/users/loginWithToken")
        .with_status(401)
        .with_body("bad token")
        .create();

    let err = RemoteConfig::authenticate(&server.url(), "nope", Duration::from_secs(5)).unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[test]
fn test_result_payload_without_uuid_is_rejected() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", "/analysis_results/r1")
        .with_status(200)
        .with_body(json!({"type": "T1"}).to_string())
        .create();

    let raw: WireAnalysisResult = backend_for(&server).analysis_result_get("r1").unwrap();
    assert_eq!(raw.result_type.as_deref(), Some("T1"));
    let err = service_for(&server).analysis_result("r1").unwrap_err();
    assert!(matches!(err, ResultDbError::Serialization(_)));
}
