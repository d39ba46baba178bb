//! HTTP API tests against the `docket` binary.
//!
//! The server runs with the embedding provider disabled, so document
//! ingestion stores vectorless documents and search reports the provider
//! as unavailable.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tempfile::TempDir;

fn docket_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docket");
    path
}

/// Find an available port for the test server.
fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn setup_server_env(port: u16) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/docket.sqlite"

[embedding]
provider = "disabled"

[server]
bind = "127.0.0.1:{}"
"#,
        root.display(),
        port
    );

    let config_path = config_dir.join("docket.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn start_server(config_path: &Path) -> Child {
    Command::new(docket_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("serve")
        .env_remove("HTTP_PORT")
        .env_remove("PORT")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap_or_else(|e| panic!("Failed to start server: {}", e))
}

/// Wait for the server to be ready by polling the health endpoint.
fn wait_for_server(port: u16) {
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        std::thread::sleep(std::time::Duration::from_millis(100));
        if let Ok(resp) = reqwest::blocking::get(&url) {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

struct TestServer {
    _tmp: TempDir,
    child: Child,
    base: String,
    http: reqwest::blocking::Client,
}

impl TestServer {
    fn start() -> Self {
        let port = find_free_port();
        let (tmp, config_path) = setup_server_env(port);
        let child = start_server(&config_path);
        wait_for_server(port);
        TestServer {
            _tmp: tmp,
            child,
            base: format!("http://127.0.0.1:{}", port),
            http: reqwest::blocking::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn create_client(&self, body: serde_json::Value) -> reqwest::blocking::Response {
        self.http
            .post(self.url("/api/v1/clients"))
            .json(&body)
            .send()
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.child.kill().ok();
        self.child.wait().ok();
    }
}

fn chandler() -> serde_json::Value {
    serde_json::json!({
        "first_name": "Chandler",
        "last_name": "Bing",
        "email": "chandler.bing@neviswealth.com",
        "description": "Statistical analysis and data reconfiguration"
    })
}

#[test]
fn test_server_health() {
    let server = TestServer::start();

    let resp = reqwest::blocking::get(server.url("/health")).unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[test]
fn test_create_and_get_client() {
    let server = TestServer::start();

    let resp = server.create_client(chandler());
    assert_eq!(resp.status(), 201);
    let location = resp
        .headers()
        .get("location")
        .expect("Location header")
        .to_str()
        .unwrap()
        .to_string();
    let created: serde_json::Value = resp.json().unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(location, format!("/api/v1/clients/{}", id));
    assert!(created["created_at"].is_string());

    let resp = server.http.get(server.url(&location)).send().unwrap();
    assert_eq!(resp.status(), 200);
    let fetched: serde_json::Value = resp.json().unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched["email"], "chandler.bing@neviswealth.com");
}

#[test]
fn test_duplicate_email_is_conflict() {
    let server = TestServer::start();

    assert_eq!(server.create_client(chandler()).status(), 201);
    let resp = server.create_client(chandler());
    assert_eq!(resp.status(), 409);

    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["error"]["code"], "conflict");
}

#[test]
fn test_invalid_client_payloads_are_rejected() {
    let server = TestServer::start();

    let mut bad_email = chandler();
    bad_email["email"] = serde_json::json!("not-an-email");
    let resp = server.create_client(bad_email);
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = server.create_client(serde_json::json!({
        "first_name": "",
        "last_name": "Bing",
        "email": "c@neviswealth.com"
    }));
    assert_eq!(resp.status(), 400);

    let resp = server
        .http
        .post(server.url("/api/v1/clients"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[test]
fn test_client_lookup_errors() {
    let server = TestServer::start();

    let resp = server
        .http
        .get(server.url("/api/v1/clients/not-a-uuid"))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = server
        .http
        .get(server.url(&format!("/api/v1/clients/{}", uuid::Uuid::new_v4())))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[test]
fn test_create_document_without_embeddings() {
    let server = TestServer::start();

    let created: serde_json::Value = server.create_client(chandler()).json().unwrap();
    let id = created["id"].as_str().unwrap();

    let resp = server
        .http
        .post(server.url(&format!("/api/v1/clients/{}/documents", id)))
        .json(&serde_json::json!({ "title": "Utility Bill", "content": "March electricity" }))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 201);
    let doc: serde_json::Value = resp.json().unwrap();
    assert_eq!(doc["client_id"], id);
    assert_eq!(doc["title"], "Utility Bill");
    assert!(doc.get("embedding").is_none());

    let resp = server
        .http
        .post(server.url(&format!(
            "/api/v1/clients/{}/documents",
            uuid::Uuid::new_v4()
        )))
        .json(&serde_json::json!({ "title": "Orphan", "content": "No owner" }))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = server
        .http
        .post(server.url(&format!("/api/v1/clients/{}/documents", id)))
        .json(&serde_json::json!({ "title": "No content" }))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[test]
fn test_unknown_client_reported_before_bad_document_body() {
    let server = TestServer::start();
    let path = format!("/api/v1/clients/{}/documents", uuid::Uuid::new_v4());

    let resp = server
        .http
        .post(server.url(&path))
        .json(&serde_json::json!({ "title": "" }))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = server
        .http
        .post(server.url(&path))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[test]
fn test_search_errors() {
    let server = TestServer::start();

    let resp = server.http.get(server.url("/api/v1/search")).send().unwrap();
    assert_eq!(resp.status(), 400);

    let resp = server
        .http
        .get(server.url("/api/v1/search?q=%20%20"))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = server
        .http
        .get(server.url("/api/v1/search?q=utility%20bill"))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["error"]["code"], "embedding_unavailable");
}
