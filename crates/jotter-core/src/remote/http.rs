use anyhow::{Context, anyhow};
use async_trait::async_trait;
use jotter_shared::{Note, NoteBody, NoteId, NotesQuery};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::{NotesRemote, RemoteError};
use crate::config::Config;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5002/api";

#[derive(Debug, Clone)]
pub struct HttpNotesRemote {
    base_url: Url,
    client: Client,
}

impl HttpNotesRemote {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid api.base_url: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("api.base_url cannot be used as a base: {base_url}"));
        }
        let client = Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { base_url, client })
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let base = cfg
            .get("api.base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(&base)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/notes`, or `{base}/notes/{id}` with the id encoded as one path segment.
    pub fn notes_url(&self, id: Option<&NoteId>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("notes");
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        url
    }

    pub fn list_url(&self, query: Option<&NotesQuery>) -> Url {
        let mut url = self.notes_url(None);
        if let Some(query) = query {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.to_pairs() {
                pairs.append_pair(key, &value);
            }
        }
        url
    }
}

#[async_trait]
impl NotesRemote for HttpNotesRemote {
    #[instrument(skip(self, token))]
    async fn list(&self, token: &str, query: Option<&NotesQuery>) -> Result<Vec<Note>, RemoteError> {
        let url = self.list_url(query);
        debug!(%url, "GET notes");
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;
        decode(resp).await
    }

    #[instrument(skip(self, token, body), fields(title_len = body.title.len()))]
    async fn create(&self, token: &str, body: &NoteBody) -> Result<Note, RemoteError> {
        let url = self.notes_url(None);
        debug!(%url, "POST note");
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        decode(resp).await
    }

    #[instrument(skip(self, token, body), fields(id = %id))]
    async fn update(&self, token: &str, id: &NoteId, body: &NoteBody) -> Result<Note, RemoteError> {
        let url = self.notes_url(Some(id));
        debug!(%url, "PUT note");
        let resp = self
            .client
            .put(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        decode(resp).await
    }

    #[instrument(skip(self, token), fields(id = %id))]
    async fn delete(&self, token: &str, id: &NoteId) -> Result<(), RemoteError> {
        let url = self.notes_url(Some(id));
        debug!(%url, "DELETE note");
        let resp = self
            .client
            .delete(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;
        check_status(resp).await.map(|_| ())
    }
}

fn transport(err: reqwest::Error) -> RemoteError {
    RemoteError::Transport(err.to_string())
}

async fn check_status(resp: Response) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RemoteError::from_status(status.as_u16(), body))
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, RemoteError> {
    let resp = check_status(resp).await?;
    resp.json::<T>()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use jotter_shared::{NoteBody, NoteId, NotesQuery};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::HttpNotesRemote;
    use crate::remote::{NotesRemote, RemoteError};

    async fn remote_for(server: &MockServer) -> HttpNotesRemote {
        HttpNotesRemote::new(&format!("{}/api", server.uri())).expect("remote")
    }

    fn body(title: &str, description: &str) -> NoteBody {
        NoteBody {
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn builds_collection_and_identity_urls() {
        let remote = HttpNotesRemote::new("http://localhost:5002/api/").expect("remote");
        assert_eq!(
            remote.notes_url(None).as_str(),
            "http://localhost:5002/api/notes"
        );
        assert_eq!(
            remote.notes_url(Some(&NoteId::new("a/b c"))).as_str(),
            "http://localhost:5002/api/notes/a%2Fb%20c"
        );
    }

    #[test]
    fn list_url_omits_empty_date_bounds() {
        let remote = HttpNotesRemote::new("http://localhost:5002/api").expect("remote");

        assert_eq!(
            remote.list_url(None).as_str(),
            "http://localhost:5002/api/notes"
        );
        assert_eq!(
            remote.list_url(Some(&NotesQuery::default())).as_str(),
            "http://localhost:5002/api/notes?title="
        );

        let query = NotesQuery {
            title: "road trip".to_string(),
            from_date: "2025-01-01".to_string(),
            end_date: "2025-01-31".to_string(),
        };
        assert_eq!(
            remote.list_url(Some(&query)).as_str(),
            "http://localhost:5002/api/notes?title=road+trip&fromDate=2025-01-01&endDate=2025-01-31"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(HttpNotesRemote::new("not a url").is_err());
        assert!(HttpNotesRemote::new("mailto:someone@example.com").is_err());
    }

    #[tokio::test]
    async fn list_sends_bearer_token_and_decodes_notes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/notes"))
            .and(header("authorization", "Bearer tok"))
            .and(query_param("title", "trip"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "n1",
                "title": "Trip",
                "description": "bags",
                "createdAt": "2025-03-01T10:00:00.000Z",
                "owner": "u1"
            }])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/notes"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        let remote = remote_for(&server).await;

        let query = NotesQuery {
            title: "trip".to_string(),
            ..NotesQuery::default()
        };
        let notes = remote.list("tok", Some(&query)).await.expect("list");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, NoteId::new("n1"));
        assert_eq!(notes[0].created_at.as_deref(), Some("2025-03-01T10:00:00.000Z"));
        assert_eq!(notes[0].extra.get("owner"), Some(&json!("u1")));

        assert!(remote.list("tok", None).await.expect("list all").is_empty());
        let requests = server.received_requests().await.expect("recorded requests");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url.query(), None);
    }

    #[tokio::test]
    async fn auth_statuses_become_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/notes"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/notes/n1"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;
        let remote = remote_for(&server).await;

        assert_eq!(
            remote.list("stale", None).await.expect_err("401"),
            RemoteError::Unauthorized { status: 401 }
        );
        assert_eq!(
            remote.delete("stale", &NoteId::new("n1")).await.expect_err("403"),
            RemoteError::Unauthorized { status: 403 }
        );
    }

    #[tokio::test]
    async fn server_errors_and_bad_json_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/notes"))
            .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/notes/n1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        let remote = remote_for(&server).await;

        assert_eq!(
            remote.create("tok", &body("t", "d")).await.expect_err("500"),
            RemoteError::Status {
                status: 500,
                body: "db down".to_string(),
            }
        );
        let err = remote
            .update("tok", &NoteId::new("n1"), &body("t", "d"))
            .await
            .expect_err("bad json");
        assert!(matches!(err, RemoteError::Decode(_)));
        assert!(!err.is_auth());
    }

    #[tokio::test]
    async fn mutations_target_note_paths_with_title_and_description() {
        let server = MockServer::start().await;
        let stored = json!({
            "id": "n 1",
            "title": "T",
            "description": "D",
            "createdAt": "2025-03-01T10:00:00.000Z"
        });
        Mock::given(method("POST"))
            .and(path("/api/notes"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({"title": "T", "description": "D"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(stored.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/notes/n%201"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({"title": "T2", "description": "D2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/notes/n%201"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let remote = remote_for(&server).await;
        let id = NoteId::new("n 1");

        let created = remote.create("tok", &body("T", "D")).await.expect("create");
        assert_eq!(created.id, id);
        remote
            .update("tok", &id, &body("T2", "D2"))
            .await
            .expect("update");
        remote.delete("tok", &id).await.expect("delete");
    }
}
