//! A fake GitLab instance served through the public transport trait.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use glean::{HttpError, HttpRequest, HttpResponse, HttpTransport};

pub const API: &str = "https://gitlab.com/api/v4";

/// Routes keyed by full URL. The last registered response for a URL is
/// replayed for every request.
#[derive(Clone, Default)]
pub struct FakeGitLab {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    routes: HashMap<String, HttpResponse>,
    requests: Vec<HttpRequest>,
}

impl FakeGitLab {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::new(self.clone())
    }

    pub fn route(&self, url: impl Into<String>, response: HttpResponse) {
        self.inner
            .lock()
            .unwrap()
            .routes
            .insert(url.into(), response);
    }

    pub fn json(&self, url: impl Into<String>, body: serde_json::Value) {
        self.route(url, ok(body.to_string().into_bytes(), "application/json"));
    }

    pub fn status(&self, url: impl Into<String>, status: u16) {
        self.route(
            url,
            HttpResponse {
                status,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );
    }

    /// `GET /projects/:path` and `GET /projects/:id` for one project.
    pub fn project(&self, api: &str, path: &str, id: u64, default_branch: &str) {
        let body = serde_json::json!({
            "id": id,
            "default_branch": default_branch,
            "path_with_namespace": path,
        });
        self.json(
            format!("{}/projects/{}", api, urlencoding::encode(path)),
            body.clone(),
        );
        self.json(format!("{}/projects/{}", api, id), body);
    }

    pub fn latest_commit(&self, api: &str, id: u64, git_ref: &str, path: Option<&str>, sha: &str) {
        self.json(
            glean::client::commits_url(api, id, git_ref, path),
            serde_json::json!([{ "id": sha, "committed_date": "2024-03-01T12:00:00Z" }]),
        );
    }

    pub fn archive(&self, api: &str, id: u64, git_ref: &str, path: Option<&str>, bytes: Vec<u8>) {
        self.route(
            glean::client::archive_url(api, id, git_ref, path),
            ok(bytes, "application/octet-stream"),
        );
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn count(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.contains(needle))
            .count()
    }
}

#[async_trait]
impl HttpTransport for FakeGitLab {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut inner = self.inner.lock().unwrap();
        let url = request.url.clone();
        inner.requests.push(request);
        inner
            .routes
            .get(&url)
            .cloned()
            .ok_or(HttpError::NoMockResponse { url })
    }
}

pub fn ok(body: Vec<u8>, content_type: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        headers: vec![("Content-Type".to_string(), content_type.to_string())],
        body,
    }
}

/// A gzipped tarball with the given members.
pub fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, data.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// A zip archive with the given members.
pub fn zip_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (path, data) in files {
        writer
            .start_file(*path, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
