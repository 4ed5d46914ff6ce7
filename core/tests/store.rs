//! Store behaviour against a scripted in-memory transport.
//!
//! Each test scripts responses keyed by `METHOD path` and inspects the
//! requests the store actually sent.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use species_core::auth::{self, MAX_ADMIN_ATTEMPTS};
use species_core::{
    AdminGate, AnimalForm, AnimalType, CatalogClient, CatalogError, CatalogIssue, CatalogQuery,
    GateOutcome, HttpMethod, HttpRequest, HttpResponse, ImageResolver, Kind, KindCounts,
    PlantType, Registration, Result, SpeciesDetails, SpeciesStore, Transport, TreeForm,
};

const BASE_URL: &str = "http://api.test";

#[derive(Default)]
struct FakeTransport {
    scripted: Mutex<HashMap<String, VecDeque<Result<(u16, String)>>>>,
    sent: Mutex<Vec<HttpRequest>>,
    /// Times a request yields to the scheduler before answering, by method.
    yields: HashMap<&'static str, usize>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeTransport {
    /// Requests with `method` stay pending across `yields` polls, so
    /// concurrently issued requests overlap.
    fn yielding(mut self, method: &'static str, yields: usize) -> Self {
        self.yields.insert(method, yields);
        self
    }

    fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn reset_peak(&self) {
        self.peak_in_flight.store(0, Ordering::SeqCst);
    }

    fn respond(&self, method: &str, path: &str, status: u16, body: &str) -> &Self {
        self.scripted
            .lock()
            .entry(format!("{method} {path}"))
            .or_default()
            .push_back(Ok((status, body.to_string())));
        self
    }

    fn fail(&self, method: &str, path: &str) -> &Self {
        self.scripted
            .lock()
            .entry(format!("{method} {path}"))
            .or_default()
            .push_back(Err(CatalogError::RequestFailed {
                status: None,
                path: path.to_string(),
            }));
        self
    }

    fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().clone()
    }
}

impl Transport for FakeTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let key = format!("{} {}", request.method.as_str(), request.path);
        self.sent.lock().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        for _ in 0..self.yields.get(request.method.as_str()).copied().unwrap_or(0) {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.scripted.lock().get_mut(&key).and_then(VecDeque::pop_front);
        let (status, body) = match scripted {
            Some(outcome) => outcome?,
            None => (404, String::new()),
        };
        Ok(HttpResponse {
            status,
            path: request.path,
            headers: Vec::new(),
            body,
        })
    }
}

const IPE_AMARELO: &str = r#"{"id":1,"nomePopular":"Ipê Amarelo","nomeCientifico":"Handroanthus albus",
    "familia":"Bignoniaceae","origem":"Cerrado","utilidade":"Paisagismo","formaPropagacao":"Sementes",
    "tiposPlanta":["ORNAMENTAL"],"imagemUrl":"/uploads/ipe.png"}"#;

const BEM_TE_VI: &str = r#"{"id":7,"nomePopular":"Bem-te-vi","nomeCientifico":"Pitangus sulphuratus",
    "tipoAnimal":"AVE","alimentacao":"Insetos","habitos":"Diurno","imagemUrl":"https://cdn.test/bentevi.jpg"}"#;

fn store(transport: FakeTransport) -> SpeciesStore<FakeTransport> {
    SpeciesStore::new(
        CatalogClient::new(BASE_URL),
        ImageResolver::new(BASE_URL, "/placeholder.svg"),
        transport,
    )
}

async fn seeded_store() -> SpeciesStore<FakeTransport> {
    seeded_store_over(FakeTransport::default()).await
}

async fn seeded_store_over(transport: FakeTransport) -> SpeciesStore<FakeTransport> {
    transport
        .respond("GET", "/plantas", 200, &format!("[{IPE_AMARELO}]"))
        .respond("GET", "/animais", 200, &format!("[{BEM_TE_VI}]"));
    let store = store(transport);
    store.load_all().await;
    store
}

fn ipe_form(name: &str) -> TreeForm {
    TreeForm {
        common_name: name.into(),
        scientific_name: "Handroanthus albus".into(),
        family: "Bignoniaceae".into(),
        origin: "Cerrado".into(),
        propagation: "Sementes".into(),
        utility: "Paisagismo".into(),
        plant_types: [PlantType::Ornamental].into_iter().collect(),
        description: None,
        image: None,
    }
}

fn onca_form() -> AnimalForm {
    AnimalForm {
        common_name: "Onça-pintada".into(),
        scientific_name: "Panthera onca".into(),
        animal_type: AnimalType::Mammal,
        diet: "Carnívora".into(),
        habits: "Noturno".into(),
        image: None,
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_starts_loading_and_settles_once() {
    let transport = FakeTransport::default();
    transport
        .respond("GET", "/plantas", 200, "[]")
        .respond("GET", "/animais", 200, "[]");
    let store = store(transport);
    assert!(store.is_loading());

    let summary = store.load_all().await;
    assert!(!store.is_loading());
    assert_eq!(summary.trees + summary.animals, 0);
    assert!(store.issue().is_none());
}

#[tokio::test]
async fn load_normalizes_both_collections() {
    let store = seeded_store().await;
    let snapshot = store.snapshot();
    assert_eq!(snapshot.species.len(), 2);
    assert!(!snapshot.is_loading);

    let tree = store.get_by_id("tree_1").unwrap();
    assert_eq!(tree.image_url, "http://api.test/uploads/ipe.png");
    assert!(matches!(tree.details, SpeciesDetails::Tree(_)));

    let animal = store.get_by_id("animal_7").unwrap();
    assert_eq!(animal.image_url, "https://cdn.test/bentevi.jpg");
    assert_eq!(animal.as_animal().unwrap().animal_type, AnimalType::Bird);
}

#[tokio::test]
async fn every_entity_has_only_its_kind_fields() {
    let store = seeded_store().await;
    for species in store.species() {
        match species.kind() {
            Kind::Tree => assert!(species.as_animal().is_none()),
            Kind::Animal => assert!(species.as_tree().is_none()),
        }
        assert!(species.id.starts_with(species.kind().tag()));
    }
}

#[tokio::test]
async fn one_failed_collection_keeps_the_other() {
    let transport = FakeTransport::default();
    transport
        .respond("GET", "/plantas", 200, &format!("[{IPE_AMARELO}]"))
        .respond("GET", "/animais", 500, "boom");
    let store = store(transport);

    let summary = store.load_all().await;
    assert_eq!(summary.trees, 1);
    assert_eq!(summary.failed, vec![Kind::Animal]);
    assert_eq!(store.len(), 1);
    assert!(store.get_by_id("tree_1").is_some());

    let issue = store.issue().unwrap();
    assert!(matches!(issue, CatalogIssue::Partial { failed: Kind::Animal, .. }));
    assert!(!issue.is_fatal());
}

#[tokio::test]
async fn network_failure_counts_as_failed_collection() {
    let transport = FakeTransport::default();
    transport
        .fail("GET", "/plantas")
        .respond("GET", "/animais", 200, &format!("[{BEM_TE_VI}]"));
    let store = store(transport);

    store.load_all().await;
    assert_eq!(store.len(), 1);
    assert!(matches!(
        store.issue(),
        Some(CatalogIssue::Partial { failed: Kind::Tree, .. })
    ));
}

#[tokio::test]
async fn both_failing_is_fatal_and_retry_recovers() {
    let transport = FakeTransport::default();
    transport
        .respond("GET", "/plantas", 500, "")
        .respond("GET", "/animais", 200, "not json")
        .respond("GET", "/plantas", 200, &format!("[{IPE_AMARELO}]"))
        .respond("GET", "/animais", 200, "[]");
    let store = store(transport);

    store.load_all().await;
    assert!(store.is_empty());
    assert!(store.issue().unwrap().is_fatal());
    assert!(!store.is_loading());

    store.load_all().await;
    assert_eq!(store.len(), 1);
    assert!(store.issue().is_none());
}

#[tokio::test]
async fn duplicate_ids_in_listing_are_dropped() {
    let transport = FakeTransport::default();
    transport
        .respond("GET", "/plantas", 200, &format!("[{IPE_AMARELO},{IPE_AMARELO}]"))
        .respond("GET", "/animais", 200, "[]");
    let store = store(transport);
    store.load_all().await;
    assert_eq!(store.len(), 1);
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_appends_entity_with_server_id() {
    let store = seeded_store().await;
    store.transport().respond(
        "POST",
        "/animais",
        201,
        r#"{"id":12,"nomePopular":"Onça-pintada","nomeCientifico":"Panthera onca",
            "tipoAnimal":"MAMIFERO","alimentacao":"Carnívora","habitos":"Noturno","imagemUrl":null}"#,
    );

    let before = store.len();
    let created = store.add_animal(&onca_form()).await.unwrap();
    assert_eq!(created.id, "animal_12");
    assert_eq!(created.image_url, "/placeholder.svg");
    assert_eq!(store.len(), before + 1);
    assert_eq!(store.get_by_id("animal_12"), Some(created));

    let sent = store.transport().sent();
    let post = sent.last().unwrap();
    assert_eq!(post.method, HttpMethod::Post);
    assert_eq!(post.path, "/animais");
}

#[tokio::test]
async fn failed_create_leaves_collection_untouched() {
    let store = seeded_store().await;
    store.transport().respond("POST", "/plantas", 422, "invalid");

    let before = store.snapshot();
    let err = store.add_tree(&ipe_form("Ipê Roxo")).await.unwrap_err();
    assert!(matches!(err, CatalogError::RequestFailed { status: Some(422), .. }));
    assert_eq!(store.snapshot(), before);
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_replaces_matching_entity() {
    let store = seeded_store().await;
    store.transport().respond(
        "POST",
        "/plantas/1",
        200,
        r#"{"id":1,"nomePopular":"Ipê Branco","nomeCientifico":"Tabebuia roseoalba",
            "tiposPlanta":["ORNAMENTAL","MEDICINAL"],"imagemUrl":"/uploads/ipe-branco.png"}"#,
    );

    let updated = store.update_tree("tree_1", &ipe_form("Ipê Branco")).await.unwrap();
    assert_eq!(updated.common_name, "Ipê Branco");
    assert_eq!(updated.image_url, "http://api.test/uploads/ipe-branco.png");
    assert_eq!(store.len(), 2);
    assert_eq!(store.get_by_id("tree_1").unwrap(), updated);
    assert_eq!(store.get_by_id("animal_7").unwrap().common_name, "Bem-te-vi");

    let sent = store.transport().sent();
    let body = String::from_utf8(sent.last().unwrap().body.clone().unwrap()).unwrap();
    assert!(body.contains("name=\"_method\"\r\n\r\nPUT\r\n"));
}

#[tokio::test]
async fn update_without_id_in_response_merges_locally() {
    let store = seeded_store().await;
    store.transport().respond(
        "POST",
        "/plantas/1",
        200,
        r#"{"nomePopular":"Ipê Amarelo","nomeCientifico":"Handroanthus albus"}"#,
    );

    let previous = store.get_by_id("tree_1").unwrap();
    let updated = store.update_tree("tree_1", &ipe_form("Ipê Branco")).await.unwrap();

    assert_eq!(updated.id, "tree_1");
    assert_eq!(updated.common_name, "Ipê Branco");
    assert_eq!(updated.image_url, previous.image_url);
    assert_eq!(store.get_by_id("tree_1").unwrap(), updated);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn update_with_empty_body_merges_locally() {
    let store = seeded_store().await;
    store.transport().respond("POST", "/animais/7", 204, "");

    let mut form = onca_form();
    form.common_name = "Bem-te-vi-rajado".into();
    let updated = store.update_animal("animal_7", &form).await.unwrap();
    assert_eq!(updated.common_name, "Bem-te-vi-rajado");
    assert_eq!(updated.as_animal().unwrap().animal_type, AnimalType::Mammal);
    assert_eq!(updated.image_url, "https://cdn.test/bentevi.jpg");
}

#[tokio::test]
async fn update_response_for_another_id_merges_locally() {
    let store = seeded_store().await;
    let other = IPE_AMARELO.replace(r#""id":1"#, r#""id":2"#);
    store.transport().respond("POST", "/plantas/1", 200, &other);

    let updated = store.update_tree("tree_1", &ipe_form("Ipê Branco")).await.unwrap();
    assert_eq!(updated.id, "tree_1");
    assert_eq!(updated.common_name, "Ipê Branco");
    assert!(store.get_by_id("tree_2").is_none());
}

#[tokio::test]
async fn sparse_update_of_unknown_entity_is_mismatch() {
    let store = seeded_store().await;
    store.transport().respond("POST", "/plantas/9", 200, "{}");

    let before = store.snapshot();
    let err = store.update_tree("tree_9", &ipe_form("Nova")).await.unwrap_err();
    assert!(matches!(err, CatalogError::ReconciliationMismatch { .. }));
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn failed_update_leaves_collection_untouched() {
    let store = seeded_store().await;
    store.transport().fail("POST", "/plantas/1");

    let before = store.snapshot();
    let err = store.update_tree("tree_1", &ipe_form("Ipê Branco")).await.unwrap_err();
    assert!(matches!(err, CatalogError::RequestFailed { status: None, .. }));
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn update_with_wrong_kind_id_sends_nothing() {
    let store = seeded_store().await;
    let sent_before = store.transport().sent().len();

    let err = store.update_tree("animal_7", &ipe_form("X")).await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidIdentifier(_)));
    let err = store.update_animal("animal7", &onca_form()).await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidIdentifier(_)));
    assert_eq!(store.transport().sent().len(), sent_before);
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_decodes_id_before_building_url() {
    let store = seeded_store().await;
    store.transport().respond("DELETE", "/animais/7", 204, "");

    store.delete(Kind::Animal, "animal_7").await.unwrap();
    assert!(store.get_by_id("animal_7").is_none());
    assert!(store.get_by_id("tree_1").is_some());

    let sent = store.transport().sent();
    let request = sent.last().unwrap();
    assert_eq!(request.method, HttpMethod::Delete);
    assert_eq!(request.url, "http://api.test/animais/7");
}

#[tokio::test]
async fn failed_delete_leaves_collection_untouched() {
    let store = seeded_store().await;
    store.transport().respond("DELETE", "/plantas/1", 403, "");

    let before = store.snapshot();
    let err = store.delete(Kind::Tree, "tree_1").await.unwrap_err();
    assert!(matches!(err, CatalogError::RequestFailed { status: Some(403), .. }));
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn delete_with_mismatched_kind_is_invalid() {
    let store = seeded_store().await;
    let err = store.delete(Kind::Tree, "animal_7").await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidIdentifier(_)));
    assert!(store.get_by_id("animal_7").is_some());
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lookup_of_missing_id_is_none() {
    let store = seeded_store().await;
    assert!(store.get_by_id("tree_404").is_none());
    assert!(store.get_by_id("garbage").is_none());
}

#[tokio::test]
async fn browsing_a_loaded_snapshot() {
    let store = seeded_store().await;
    let species = store.species();

    let counts = KindCounts::of(&species);
    assert_eq!((counts.trees, counts.animals), (1, 1));

    let page = CatalogQuery {
        search: "pitangus".into(),
        ..CatalogQuery::default()
    }
    .apply(&species);
    assert_eq!(page.total_items, 1);
    assert_eq!(page.items[0].id, "animal_7");
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_gate_counts_only_rejections() {
    let transport = FakeTransport::default();
    transport
        .fail("POST", "/auth/validate-admin")
        .respond("POST", "/auth/validate-admin", 401, "")
        .respond("POST", "/auth/validate-admin", 403, "")
        .respond("POST", "/auth/validate-admin", 401, "");
    let client = CatalogClient::new(BASE_URL);
    let gate = AdminGate::new(&client, &transport);

    assert!(gate.validate("eco").await.is_err());
    assert_eq!(gate.remaining(), MAX_ADMIN_ATTEMPTS);

    for remaining in [2, 1, 0] {
        assert_eq!(
            gate.validate("eco").await.unwrap(),
            GateOutcome::Denied { remaining }
        );
    }
    assert_eq!(gate.validate("eco2024").await.unwrap(), GateOutcome::Locked);
    assert_eq!(transport.sent().len(), 4, "a locked gate sends nothing");

    gate.reset();
    transport.respond("POST", "/auth/validate-admin", 200, r#"{"valid":true}"#);
    assert_eq!(gate.validate("eco2024").await.unwrap(), GateOutcome::Granted);
}

#[tokio::test]
async fn register_posts_json_account() {
    let transport = FakeTransport::default();
    transport.respond("POST", "/auth/register", 201, "");
    let client = CatalogClient::new(BASE_URL);
    let registration = Registration {
        name: "Geruza".into(),
        email: "geruza@example.org".into(),
        password: "s3nha".into(),
    };

    auth::register(&client, &transport, &registration).await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent[0].header("content-type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_slice(sent[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"nome": "Geruza", "email": "geruza@example.org", "senha": "s3nha"})
    );

    transport.respond("POST", "/auth/register", 409, "");
    let err = auth::register(&client, &transport, &registration).await.unwrap_err();
    assert!(matches!(err, CatalogError::RequestFailed { status: Some(409), .. }));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn both_collections_are_fetched_concurrently() {
    let transport = FakeTransport::default().yielding("GET", 3);
    transport
        .respond("GET", "/plantas", 200, &format!("[{IPE_AMARELO}]"))
        .respond("GET", "/animais", 200, &format!("[{BEM_TE_VI}]"));
    let store = store(transport);

    store.load_all().await;
    assert_eq!(store.transport().peak_in_flight(), 2);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn create_during_load_survives_the_listing() {
    let transport = FakeTransport::default().yielding("GET", 5);
    transport
        .respond("GET", "/plantas", 200, &format!("[{IPE_AMARELO}]"))
        .respond("GET", "/animais", 200, &format!("[{BEM_TE_VI}]"))
        .respond(
            "POST",
            "/plantas",
            201,
            r#"{"id":5,"nomePopular":"Ipê Roxo","nomeCientifico":"Handroanthus impetiginosus"}"#,
        );
    let store = store(transport);

    let roxo = ipe_form("Ipê Roxo");
    let (summary, created) = tokio::join!(store.load_all(), store.add_tree(&roxo));
    assert_eq!((summary.trees, summary.animals), (1, 1));
    assert_eq!(created.unwrap().id, "tree_5");
    assert_eq!(store.len(), 3);
    assert!(store.get_by_id("tree_5").is_some());
}

#[tokio::test]
async fn delete_during_load_is_not_undone() {
    let transport = FakeTransport::default().yielding("GET", 5);
    transport
        .respond("GET", "/plantas", 200, &format!("[{IPE_AMARELO}]"))
        .respond("GET", "/animais", 200, &format!("[{BEM_TE_VI}]"))
        .respond("DELETE", "/plantas/1", 204, "");
    let store = store(transport);

    let (_, deleted) = tokio::join!(store.load_all(), store.delete(Kind::Tree, "tree_1"));
    deleted.unwrap();
    assert!(store.get_by_id("tree_1").is_none());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn updates_on_one_id_do_not_overlap() {
    let store = seeded_store_over(FakeTransport::default().yielding("POST", 3)).await;
    for name in ["Ipê Branco", "Ipê Rosa"] {
        store.transport().respond(
            "POST",
            "/plantas/1",
            200,
            &format!(r#"{{"id":1,"nomePopular":"{name}","nomeCientifico":"Handroanthus albus"}}"#),
        );
    }
    store.transport().reset_peak();

    let branco = ipe_form("Ipê Branco");
    let rosa = ipe_form("Ipê Rosa");
    let (first, second) = tokio::join!(
        store.update_tree("tree_1", &branco),
        store.update_tree("tree_1", &rosa),
    );
    assert_eq!(first.unwrap().common_name, "Ipê Branco");
    assert_eq!(second.unwrap().common_name, "Ipê Rosa");
    assert_eq!(store.transport().peak_in_flight(), 1);
    assert_eq!(store.get_by_id("tree_1").unwrap().common_name, "Ipê Rosa");
}

#[tokio::test]
async fn updates_on_different_ids_run_together() {
    let store = seeded_store_over(FakeTransport::default().yielding("POST", 3)).await;
    store.transport().respond("POST", "/plantas/1", 200, IPE_AMARELO);
    store.transport().respond("POST", "/animais/7", 200, BEM_TE_VI);
    store.transport().reset_peak();

    let amarelo = ipe_form("Ipê Amarelo");
    let onca = onca_form();
    let (tree, animal) = tokio::join!(
        store.update_tree("tree_1", &amarelo),
        store.update_animal("animal_7", &onca),
    );
    tree.unwrap();
    animal.unwrap();
    assert_eq!(store.transport().peak_in_flight(), 2);
}

#[tokio::test]
async fn create_echoing_a_held_id_does_not_duplicate() {
    let store = seeded_store().await;
    store.transport().respond(
        "POST",
        "/plantas",
        201,
        r#"{"id":1,"nomePopular":"Ipê Roxo","nomeCientifico":"Handroanthus impetiginosus"}"#,
    );

    let created = store.add_tree(&ipe_form("Ipê Roxo")).await.unwrap();
    assert_eq!(created.id, "tree_1");
    assert_eq!(store.len(), 2);
    assert_eq!(store.get_by_id("tree_1").unwrap().common_name, "Ipê Roxo");
}

#[tokio::test]
async fn concurrent_admin_attempts_never_exceed_the_limit() {
    let transport = FakeTransport::default().yielding("POST", 3);
    for _ in 0..4 {
        transport.respond("POST", "/auth/validate-admin", 401, "");
    }
    let client = CatalogClient::new(BASE_URL);
    let gate = AdminGate::new(&client, &transport);

    let (a, b, c, d) = tokio::join!(
        gate.validate("x"),
        gate.validate("x"),
        gate.validate("x"),
        gate.validate("x"),
    );
    assert_eq!(a.unwrap(), GateOutcome::Denied { remaining: 2 });
    assert_eq!(b.unwrap(), GateOutcome::Denied { remaining: 1 });
    assert_eq!(c.unwrap(), GateOutcome::Denied { remaining: 0 });
    assert_eq!(d.unwrap(), GateOutcome::Locked);
    assert_eq!(transport.sent().len(), MAX_ADMIN_ATTEMPTS as usize);
}
