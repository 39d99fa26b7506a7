//! End-to-end runs against a local stub serving both Artifactory and PyPI.

use clap::Parser;
use depclaim::{Commands, Config, DepclaimError, ScanSummary, Scanner};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const EMAIL: &str = "security@acme.example";
const TOKEN: &str = "pypi-secret";
/// base64("__token__:pypi-secret")
const EXPECTED_AUTH: &str = "Basic X190b2tlbl9fOnB5cGktc2VjcmV0";

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Recorded {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or_default()
    }
}

type Handler = Arc<dyn Fn(&Recorded) -> (u16, String) + Send + Sync>;

struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    async fn spawn(handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let handler = handler.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let Some(request) = read_request(&mut socket).await else {
                        return;
                    };
                    let (status, body) = handler(&request);
                    recorded.lock().unwrap().push(request);

                    let response = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(Recorded {
        method,
        path,
        headers,
        body,
    })
}

const LISTING: &str = r#"<!DOCTYPE html>
<html><head><title>Simple Index</title></head><body>
<a href="alpha/">alpha</a><br/>
<a href="beta/" data-requires-python="&gt;=3.7">beta</a><br/>
<a href="gamma/">gamma</a><br/>
<a href="beta/" data-requires-python="&gt;=3.7">beta&gt;=3.7</a><br/>
</body></html>"#;

/// Two repositories; `pypi-broken` fails with HTTP 500.
fn registry_and_index(upload_status: u16) -> Handler {
    Arc::new(move |req: &Recorded| {
        let host = req.header("host").unwrap_or("127.0.0.1").to_string();
        match (req.method.as_str(), req.route()) {
            ("GET", "/artifactory/api/repositories") => (
                200,
                format!(
                    r#"[{{"key": "pypi-local", "type": "LOCAL", "url": "http://{host}/artifactory/pypi-local"}},
                        {{"key": "pypi-broken", "type": "LOCAL", "url": "http://{host}/artifactory/pypi-broken"}}]"#
                ),
            ),
            ("GET", "/artifactory/pypi-local/.pypi/simple.html") => (200, LISTING.to_string()),
            ("GET", "/artifactory/pypi-broken/.pypi/simple.html") => {
                (500, "internal error".to_string())
            }
            ("GET", "/pypi/alpha/json") => (
                200,
                format!(r#"{{"info": {{"author_email": "{}"}}}}"#, EMAIL.to_uppercase()),
            ),
            ("GET", "/pypi/gamma/json") => (
                200,
                r#"{"info": {"author_email": "mallory@evil.example"}}"#.to_string(),
            ),
            ("GET", _) => (404, "Not Found".to_string()),
            ("POST", "/legacy/") => (upload_status, "Forbidden: invalid token".to_string()),
            _ => (405, String::new()),
        }
    })
}

/// Adds `pypi-empty`, whose listing holds only a corrupted anchor.
fn with_empty_repository(inner: Handler) -> Handler {
    Arc::new(move |req: &Recorded| {
        let host = req.header("host").unwrap_or("127.0.0.1").to_string();
        match (req.method.as_str(), req.route()) {
            ("GET", "/artifactory/api/repositories") => (
                200,
                format!(
                    r#"[{{"key": "pypi-local", "type": "LOCAL", "url": "http://{host}/artifactory/pypi-local"}},
                        {{"key": "pypi-empty", "type": "LOCAL", "url": "http://{host}/artifactory/pypi-empty"}}]"#
                ),
            ),
            ("GET", "/artifactory/pypi-empty/.pypi/simple.html") => (
                200,
                r#"<html><body><a href="delta/" data-requires-python=">=3.9">delta&gt;=3.9</a></body></html>"#
                    .to_string(),
            ),
            _ => inner(req),
        }
    })
}

fn scan_args(server: &StubServer) -> Vec<String> {
    let base = server.base();
    vec![
        "scan".to_string(),
        "--registry-url".to_string(),
        format!("{}/artifactory", base),
        "--pypi-url".to_string(),
        base.clone(),
        "--upload-url".to_string(),
        base,
        "--email".to_string(),
        EMAIL.to_string(),
        "--token".to_string(),
        TOKEN.to_string(),
        "--timeout".to_string(),
        "5".to_string(),
    ]
}

async fn run_against(server: &StubServer, extra: &[&str]) -> depclaim::Result<ScanSummary> {
    let mut argv = vec!["depclaim".to_string()];
    argv.extend(scan_args(server));
    argv.extend(extra.iter().map(|arg| arg.to_string()));

    let scan = match Config::try_parse_from(argv).unwrap().command {
        Commands::Scan(scan) => scan,
        other => panic!("Expected scan command, got {:?}", other),
    };
    Scanner::new(&scan.settings()?)?.run().await
}

fn find<'a>(summary: &'a ScanSummary, suffix: &str) -> &'a depclaim::RepositoryResult {
    summary
        .repositories
        .iter()
        .find(|r| r.url.ends_with(suffix))
        .unwrap()
}

#[tokio::test]
async fn test_full_run_claims_missing_names() {
    let server = StubServer::spawn(registry_and_index(200)).await;

    let summary = run_against(&server, &[]).await.unwrap();

    assert_eq!(summary.repositories.len(), 2);
    assert_eq!(summary.total_packages, 3);
    assert_eq!(summary.placeholders, 2);
    assert_eq!(summary.ignored_packages, 1);

    let broken = find(&summary, "pypi-broken");
    assert!(broken.error.as_deref().unwrap().contains("500"));
    assert!(broken.packages.is_empty());

    let local = find(&summary, "pypi-local");
    let get = |name: &str| local.packages.iter().find(|p| p.name == name).unwrap();
    assert!(get("alpha").is_ours && !get("alpha").created);
    assert!(get("beta").is_ours && get("beta").created);
    assert!(!get("gamma").is_ours && !get("gamma").created);

    let uploads: Vec<Recorded> = server
        .requests()
        .into_iter()
        .filter(|r| r.method == "POST")
        .collect();
    assert_eq!(uploads.len(), 1);

    let upload = &uploads[0];
    assert_eq!(upload.route(), "/legacy/");
    assert_eq!(upload.header("authorization"), Some(EXPECTED_AUTH));
    assert!(upload
        .header("content-type")
        .unwrap()
        .starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(&upload.body);
    assert!(body.contains("name=\":action\"\r\n\r\nfile_upload"));
    assert!(body.contains("name=\"filetype\"\r\n\r\nsdist"));
    assert!(body.contains("name=\"name\"\r\n\r\nbeta"));
    assert!(body.contains("name=\"version\"\r\n\r\n0.0.0"));
    assert!(body.contains("name=\"md5_digest\""));
    assert!(body.contains("filename=\"beta-0.0.0.tar.gz\""));
}

#[tokio::test]
async fn test_rejected_upload_is_reported() {
    let server = StubServer::spawn(registry_and_index(403)).await;

    let summary = run_against(&server, &[]).await.unwrap();

    let beta = find(&summary, "pypi-local")
        .packages
        .iter()
        .find(|p| p.name == "beta")
        .unwrap();
    assert!(!beta.created && !beta.is_ours);
    let error = beta.error.as_deref().unwrap();
    assert!(error.contains("403"));
    assert!(error.contains("Forbidden: invalid token"));
    assert_eq!(summary.placeholders, 1);
}

#[tokio::test]
async fn test_dry_run_never_uploads() {
    let server = StubServer::spawn(registry_and_index(200)).await;

    let summary = run_against(&server, &["--dry-run"]).await.unwrap();

    assert_eq!(summary.total_packages, 3);
    assert!(server.requests().iter().all(|r| r.method == "GET"));
}

#[tokio::test]
async fn test_discovery_failure_aborts() {
    let server = StubServer::spawn(Arc::new(|_: &Recorded| (500, "down".to_string()))).await;

    let result = run_against(&server, &[]).await;

    assert!(matches!(result, Err(DepclaimError::DiscoveryError(_))));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_listing_without_usable_names_fails_only_that_repository() {
    let server = StubServer::spawn(with_empty_repository(registry_and_index(200))).await;

    let summary = run_against(&server, &[]).await.unwrap();

    let empty = find(&summary, "pypi-empty");
    assert!(empty.packages.is_empty());
    assert!(empty
        .error
        .as_deref()
        .unwrap()
        .contains("No package found at"));

    let local = find(&summary, "pypi-local");
    assert!(local.error.is_none());
    assert_eq!(local.packages.len(), 3);
    assert_eq!(summary.total_packages, 3);
    assert_eq!(summary.error.as_deref(), Some("1 of 2 repositories failed"));
}

#[tokio::test]
async fn test_binary_exits_zero_when_one_repository_fails() {
    let server = StubServer::spawn(registry_and_index(200)).await;

    let output = tokio::process::Command::new(env!("CARGO_BIN_EXE_depclaim"))
        .args(scan_args(&server))
        .env_remove("RUST_LOG")
        .output()
        .await
        .unwrap();

    assert!(output.status.success(), "exit status: {:?}", output.status);

    let summary: ScanSummary = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary.repositories.len(), 2);
    assert_eq!(summary.placeholders, 2);
    assert!(find(&summary, "pypi-broken").error.is_some());
    assert_eq!(summary.error.as_deref(), Some("1 of 2 repositories failed"));
}

#[tokio::test]
async fn test_binary_exits_nonzero_when_discovery_fails() {
    let server = StubServer::spawn(Arc::new(|_: &Recorded| (500, "down".to_string()))).await;

    let output = tokio::process::Command::new(env!("CARGO_BIN_EXE_depclaim"))
        .args(scan_args(&server))
        .output()
        .await
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
