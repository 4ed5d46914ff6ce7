use std::{collections::BTreeMap, collections::HashMap, sync::Arc};

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    pub id: u64,
    pub nome_popular: String,
    pub nome_cientifico: String,
    pub familia: String,
    pub origem: String,
    pub utilidade: String,
    pub forma_propagacao: String,
    pub tipos_planta: Vec<String>,
    pub imagem_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Animal {
    pub id: u64,
    pub nome_popular: String,
    pub nome_cientifico: String,
    pub tipo_animal: String,
    pub alimentacao: String,
    pub habitos: String,
    pub imagem_url: Option<String>,
}

#[derive(Deserialize)]
pub struct Registration {
    pub nome: String,
    pub email: String,
    pub senha: String,
}

#[derive(Deserialize)]
pub struct AdminPassword {
    pub senha: String,
}

/// Which backend collection a route serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collection {
    Plants,
    Animals,
}

/// Behaviour switches for exercising client edge cases.
#[derive(Clone, Debug)]
pub struct MockOptions {
    /// When set, mutating routes require `Authorization: Bearer <token>`.
    pub token: Option<String>,
    pub admin_password: String,
    /// Listing these collections answers 500.
    pub unavailable: Vec<Collection>,
    /// Update responses carry only a message instead of the record.
    pub sparse_updates: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            token: None,
            admin_password: "eco2024".to_string(),
            unavailable: Vec::new(),
            sparse_updates: false,
        }
    }
}

#[derive(Default)]
pub struct Catalog {
    pub plants: BTreeMap<u64, Plant>,
    pub animals: BTreeMap<u64, Animal>,
    pub users: Vec<String>,
}

/// Ids are scoped per collection, like the real backend's tables.
fn next_id<V>(table: &BTreeMap<u64, V>) -> u64 {
    table.keys().next_back().map_or(1, |last| last + 1)
}

impl Catalog {
    pub fn insert_plant(&mut self, mut plant: Plant) -> Plant {
        plant.id = next_id(&self.plants);
        self.plants.insert(plant.id, plant.clone());
        plant
    }

    pub fn insert_animal(&mut self, mut animal: Animal) -> Animal {
        animal.id = next_id(&self.animals);
        self.animals.insert(animal.id, animal.clone());
        animal
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<RwLock<Catalog>>,
    pub options: Arc<MockOptions>,
}

pub fn app() -> Router {
    app_with(MockOptions::default(), Catalog::default())
}

pub fn app_with(options: MockOptions, catalog: Catalog) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(catalog)),
        options: Arc::new(options),
    };
    Router::new()
        .route("/plantas", get(list_plants).post(create_plant))
        .route("/plantas/{id}", post(override_plant).delete(delete_plant))
        .route("/animais", get(list_animals).post(create_animal))
        .route("/animais/{id}", post(override_animal).delete(delete_animal))
        .route("/auth/register", post(register))
        .route("/auth/validate-admin", post(validate_admin))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(
    listener: TcpListener,
    options: MockOptions,
    catalog: Catalog,
) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(options, catalog)).await
}

// ---------------------------------------------------------------------------
// Form handling
// ---------------------------------------------------------------------------

/// Text fields (repeatable) plus the uploaded image name, if any.
#[derive(Default, Debug)]
pub struct FormFields {
    pub text: HashMap<String, Vec<String>>,
    pub image: Option<String>,
}

impl FormFields {
    fn first(&self, name: &str) -> Option<&str> {
        self.text.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    fn required(&self, name: &str) -> Result<String, StatusCode> {
        self.first(name)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or(StatusCode::UNPROCESSABLE_ENTITY)
    }

    fn optional(&self, name: &str) -> String {
        self.first(name).unwrap_or_default().to_string()
    }

    fn all(&self, name: &str) -> Vec<String> {
        self.text.get(name).cloned().unwrap_or_default()
    }
}

async fn read_form(mut multipart: Multipart) -> Result<FormFields, StatusCode> {
    let mut fields = FormFields::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            fields.image = Some(format!("/uploads/{}-{file_name}", Uuid::new_v4().simple()));
        } else {
            let value = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            fields.text.entry(name).or_default().push(value);
        }
    }
    Ok(fields)
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let Some(token) = &state.options.token else {
        return Ok(());
    };
    let expected = format!("Bearer {token}");
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

fn plant_from_form(fields: &FormFields, id: u64, previous_image: Option<String>) -> Result<Plant, StatusCode> {
    Ok(Plant {
        id,
        nome_popular: fields.required("nomePopular")?,
        nome_cientifico: fields.required("nomeCientifico")?,
        familia: fields.optional("familia"),
        origem: fields.optional("origem"),
        utilidade: fields.optional("utilidade"),
        forma_propagacao: fields.optional("formaPropagacao"),
        tipos_planta: fields.all("tiposPlanta"),
        imagem_url: fields.image.clone().or(previous_image),
        descricao: fields.first("descricao").map(str::to_string),
    })
}

fn animal_from_form(fields: &FormFields, id: u64, previous_image: Option<String>) -> Result<Animal, StatusCode> {
    Ok(Animal {
        id,
        nome_popular: fields.required("nomePopular")?,
        nome_cientifico: fields.required("nomeCientifico")?,
        tipo_animal: fields.required("tipoAnimal")?,
        alimentacao: fields.optional("alimentacao"),
        habitos: fields.optional("habitos"),
        imagem_url: fields.image.clone().or(previous_image),
    })
}

enum Override {
    Update,
    Delete,
}

fn method_override(fields: &FormFields) -> Result<Override, StatusCode> {
    match fields.first("_method").map(str::to_ascii_uppercase).as_deref() {
        Some("PUT") | Some("PATCH") => Ok(Override::Update),
        Some("DELETE") => Ok(Override::Delete),
        _ => Err(StatusCode::METHOD_NOT_ALLOWED),
    }
}

// ---------------------------------------------------------------------------
// Plants
// ---------------------------------------------------------------------------

async fn list_plants(State(state): State<AppState>) -> Result<Json<Vec<Plant>>, StatusCode> {
    if state.options.unavailable.contains(&Collection::Plants) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let db = state.db.read().await;
    Ok(Json(db.plants.values().cloned().collect()))
}

async fn create_plant(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Plant>), StatusCode> {
    authorize(&state, &headers)?;
    let fields = read_form(multipart).await?;
    let plant = plant_from_form(&fields, 0, None)?;
    let plant = state.db.write().await.insert_plant(plant);
    info!(id = plant.id, "plant created");
    Ok((StatusCode::CREATED, Json(plant)))
}

async fn override_plant(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    authorize(&state, &headers)?;
    let fields = read_form(multipart).await?;
    let mut db = state.db.write().await;
    match method_override(&fields)? {
        Override::Delete => {
            db.plants.remove(&id).ok_or(StatusCode::NOT_FOUND)?;
            Ok((StatusCode::OK, Json(json!({ "message": "Planta removida" }))))
        }
        Override::Update => {
            let previous = db.plants.get(&id).ok_or(StatusCode::NOT_FOUND)?;
            let plant = plant_from_form(&fields, id, previous.imagem_url.clone())?;
            db.plants.insert(id, plant.clone());
            info!(id, "plant updated");
            if state.options.sparse_updates {
                return Ok((StatusCode::OK, Json(json!({ "message": "Planta atualizada" }))));
            }
            Ok((StatusCode::OK, Json(json!(plant))))
        }
    }
}

async fn delete_plant(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    authorize(&state, &headers)?;
    let mut db = state.db.write().await;
    db.plants.remove(&id).map(|_| StatusCode::NO_CONTENT).ok_or(StatusCode::NOT_FOUND)
}

// ---------------------------------------------------------------------------
// Animals
// ---------------------------------------------------------------------------

async fn list_animals(State(state): State<AppState>) -> Result<Json<Vec<Animal>>, StatusCode> {
    if state.options.unavailable.contains(&Collection::Animals) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let db = state.db.read().await;
    Ok(Json(db.animals.values().cloned().collect()))
}

async fn create_animal(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Animal>), StatusCode> {
    authorize(&state, &headers)?;
    let fields = read_form(multipart).await?;
    let animal = animal_from_form(&fields, 0, None)?;
    let animal = state.db.write().await.insert_animal(animal);
    info!(id = animal.id, "animal created");
    Ok((StatusCode::CREATED, Json(animal)))
}

async fn override_animal(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    authorize(&state, &headers)?;
    let fields = read_form(multipart).await?;
    let mut db = state.db.write().await;
    match method_override(&fields)? {
        Override::Delete => {
            db.animals.remove(&id).ok_or(StatusCode::NOT_FOUND)?;
            Ok((StatusCode::OK, Json(json!({ "message": "Animal removido" }))))
        }
        Override::Update => {
            let previous = db.animals.get(&id).ok_or(StatusCode::NOT_FOUND)?;
            let animal = animal_from_form(&fields, id, previous.imagem_url.clone())?;
            db.animals.insert(id, animal.clone());
            info!(id, "animal updated");
            if state.options.sparse_updates {
                return Ok((StatusCode::OK, Json(json!({ "message": "Animal atualizado" }))));
            }
            Ok((StatusCode::OK, Json(json!(animal))))
        }
    }
}

async fn delete_animal(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    authorize(&state, &headers)?;
    let mut db = state.db.write().await;
    db.animals.remove(&id).map(|_| StatusCode::NO_CONTENT).ok_or(StatusCode::NOT_FOUND)
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

async fn register(
    State(state): State<AppState>,
    Json(input): Json<Registration>,
) -> Result<StatusCode, StatusCode> {
    if input.nome.is_empty() || input.senha.is_empty() || !input.email.contains('@') {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut db = state.db.write().await;
    if db.users.contains(&input.email) {
        return Err(StatusCode::CONFLICT);
    }
    db.users.push(input.email);
    Ok(StatusCode::CREATED)
}

async fn validate_admin(
    State(state): State<AppState>,
    Json(input): Json<AdminPassword>,
) -> StatusCode {
    if input.senha == state.options.admin_password {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    }
}
