//! Stateless HTTP request builder and response parser for the catalog API.
//!
//! # Design
//! `CatalogClient` holds the `base_url` and a `Session` handle and carries no
//! other state between calls. Each operation is split into a `build_*`
//! method that produces an `HttpRequest` and a `parse_*` method that consumes
//! an `HttpResponse`; a `Transport` executes the round-trip in between.
//! Every request carries the session's bearer token when one is present.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CatalogError, Result};
use crate::form::{build_submission, FormPayload, Submission};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::id::Kind;
use crate::session::Session;
use crate::types::{AnimalForm, AnimalRecord, PlantRecord, TreeForm};

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "senha")]
    pub password: String,
}

#[derive(Serialize)]
struct AdminPassword<'a> {
    senha: &'a str,
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    base_url: String,
    session: Session,
}

impl CatalogClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_session(base_url, Session::new())
    }

    pub fn with_session(base_url: &str, session: Session) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    pub fn build_list_plants(&self) -> HttpRequest {
        self.request(HttpMethod::Get, Kind::Tree.collection().to_string())
    }

    pub fn build_list_animals(&self) -> HttpRequest {
        self.request(HttpMethod::Get, Kind::Animal.collection().to_string())
    }

    pub fn build_create_tree(&self, form: &TreeForm) -> HttpRequest {
        self.submission(form, None)
    }

    pub fn build_create_animal(&self, form: &AnimalForm) -> HttpRequest {
        self.submission(form, None)
    }

    pub fn build_update_tree(&self, backend_id: &str, form: &TreeForm) -> HttpRequest {
        self.submission(form, Some(backend_id))
    }

    pub fn build_update_animal(&self, backend_id: &str, form: &AnimalForm) -> HttpRequest {
        self.submission(form, Some(backend_id))
    }

    pub fn build_delete(&self, kind: Kind, backend_id: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, item_path(kind, backend_id))
    }

    pub fn build_register(&self, registration: &Registration) -> Result<HttpRequest> {
        self.json_request("/auth/register", registration)
    }

    pub fn build_validate_admin(&self, password: &str) -> Result<HttpRequest> {
        self.json_request("/auth/validate-admin", &AdminPassword { senha: password })
    }

    // -----------------------------------------------------------------------
    // Parsers
    // -----------------------------------------------------------------------

    pub fn parse_list_plants(&self, response: HttpResponse) -> Result<Vec<PlantRecord>> {
        parse_json(response)
    }

    pub fn parse_list_animals(&self, response: HttpResponse) -> Result<Vec<AnimalRecord>> {
        parse_json(response)
    }

    /// Parses a create or update response for a plant. A 2xx body that does
    /// not hold a full record yields `ReconciliationMismatch`.
    pub fn parse_plant(&self, response: HttpResponse) -> Result<PlantRecord> {
        parse_json(response)
    }

    pub fn parse_animal(&self, response: HttpResponse) -> Result<AnimalRecord> {
        parse_json(response)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> Result<()> {
        check_status(&response)
    }

    pub fn parse_register(&self, response: HttpResponse) -> Result<()> {
        check_status(&response)
    }

    /// `Ok(false)` when the backend rejects the password (401/403).
    pub fn parse_validate_admin(&self, response: HttpResponse) -> Result<bool> {
        match response.status {
            401 | 403 => Ok(false),
            _ => check_status(&response).map(|()| true),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn request(&self, method: HttpMethod, path: String) -> HttpRequest {
        let mut headers = Vec::new();
        if let Some(bearer) = self.session.bearer() {
            headers.push(("authorization".to_string(), bearer));
        }
        HttpRequest {
            method,
            url: format!("{}{path}", self.base_url),
            path,
            headers,
            body: None,
        }
    }

    fn submission<P: FormPayload>(&self, payload: &P, backend_id: Option<&str>) -> HttpRequest {
        let (path, kind_of_submission) = match backend_id {
            Some(id) => (item_path(P::KIND, id), Submission::Update),
            None => (P::KIND.collection().to_string(), Submission::Create),
        };
        let form = build_submission(payload, kind_of_submission);
        let mut request = self.request(HttpMethod::Post, path);
        request
            .headers
            .push(("content-type".to_string(), form.content_type()));
        request.body = Some(form.encode());
        request
    }

    fn json_request<T: Serialize>(&self, path: &str, payload: &T) -> Result<HttpRequest> {
        let body = serde_json::to_vec(payload).map_err(|e| CatalogError::Serialization(e.to_string()))?;
        let mut request = self.request(HttpMethod::Post, path.to_string());
        request
            .headers
            .push(("content-type".to_string(), "application/json".to_string()));
        request.body = Some(body);
        Ok(request)
    }
}

fn item_path(kind: Kind, backend_id: &str) -> String {
    format!("{}/{backend_id}", kind.collection())
}

/// Map non-2xx status codes to `RequestFailed`.
fn check_status(response: &HttpResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    Err(CatalogError::RequestFailed {
        status: Some(response.status),
        path: response.path.clone(),
    })
}

fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(|e| CatalogError::ReconciliationMismatch {
        path: response.path,
        reason: e.to_string(),
    })
}
