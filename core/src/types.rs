//! Wire records, the unified species model, and submission payloads.
//!
//! # Design
//! `PlantRecord` and `AnimalRecord` mirror the backend JSON (Portuguese field
//! names) and are parsed at the client boundary. The store only ever holds
//! `Species`, whose kind-specific fields live in `SpeciesDetails` so a tree
//! cannot carry animal fields or the other way round. `TreeForm` and
//! `AnimalForm` are the transient payloads consumers submit.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::{self, Kind};
use crate::image::ImageResolver;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Plant-type tag. Unknown backend values are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlantType {
    Ornamental,
    FruitBearing,
    Medicinal,
    Other(String),
}

impl PlantType {
    pub fn wire_name(&self) -> &str {
        match self {
            PlantType::Ornamental => "ORNAMENTAL",
            PlantType::FruitBearing => "FRUTIFERA",
            PlantType::Medicinal => "MEDICINAL",
            PlantType::Other(name) => name,
        }
    }
}

impl From<String> for PlantType {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "ORNAMENTAL" => PlantType::Ornamental,
            "FRUTIFERA" => PlantType::FruitBearing,
            "MEDICINAL" => PlantType::Medicinal,
            _ => PlantType::Other(value),
        }
    }
}

impl From<PlantType> for String {
    fn from(value: PlantType) -> Self {
        value.wire_name().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimalType {
    #[serde(rename = "MAMIFERO")]
    Mammal,
    #[serde(rename = "ARTROPODE")]
    Arthropod,
    #[serde(rename = "REPTIL")]
    Reptile,
    #[serde(rename = "PEIXE")]
    Fish,
    #[serde(rename = "FUNGO")]
    Fungus,
    #[serde(rename = "AVE")]
    Bird,
}

impl AnimalType {
    pub fn wire_name(&self) -> &'static str {
        match self {
            AnimalType::Mammal => "MAMIFERO",
            AnimalType::Arthropod => "ARTROPODE",
            AnimalType::Reptile => "REPTIL",
            AnimalType::Fish => "PEIXE",
            AnimalType::Fungus => "FUNGO",
            AnimalType::Bird => "AVE",
        }
    }
}

// ---------------------------------------------------------------------------
// Wire records
// ---------------------------------------------------------------------------

/// A record from `GET /plantas` (and create/update responses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantRecord {
    #[serde(deserialize_with = "id::deserialize_backend_id")]
    pub id: String,
    pub nome_popular: String,
    pub nome_cientifico: String,
    #[serde(default)]
    pub familia: String,
    #[serde(default)]
    pub origem: String,
    #[serde(default)]
    pub utilidade: String,
    #[serde(default)]
    pub forma_propagacao: String,
    #[serde(default)]
    pub tipos_planta: Vec<PlantType>,
    #[serde(default)]
    pub imagem_url: Option<String>,
    #[serde(default)]
    pub descricao: Option<String>,
}

impl PlantRecord {
    pub fn into_species(self, images: &ImageResolver) -> Species {
        Species {
            id: id::encode(Kind::Tree, &self.id),
            common_name: self.nome_popular,
            scientific_name: self.nome_cientifico,
            image_url: images.resolve(self.imagem_url.as_deref()),
            details: SpeciesDetails::Tree(TreeDetails {
                family: self.familia,
                origin: self.origem,
                propagation: self.forma_propagacao,
                utility: self.utilidade,
                plant_types: self.tipos_planta.into_iter().collect(),
                description: self.descricao,
            }),
        }
    }
}

/// A record from `GET /animais` (and create/update responses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimalRecord {
    #[serde(deserialize_with = "id::deserialize_backend_id")]
    pub id: String,
    pub nome_popular: String,
    pub nome_cientifico: String,
    pub tipo_animal: AnimalType,
    #[serde(default)]
    pub alimentacao: String,
    #[serde(default)]
    pub habitos: String,
    #[serde(default)]
    pub imagem_url: Option<String>,
}

impl AnimalRecord {
    pub fn into_species(self, images: &ImageResolver) -> Species {
        Species {
            id: id::encode(Kind::Animal, &self.id),
            common_name: self.nome_popular,
            scientific_name: self.nome_cientifico,
            image_url: images.resolve(self.imagem_url.as_deref()),
            details: SpeciesDetails::Animal(AnimalDetails {
                animal_type: self.tipo_animal,
                diet: self.alimentacao,
                habits: self.habitos,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain model
// ---------------------------------------------------------------------------

/// A catalog entry, either a tree or an animal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Species {
    /// Composite identifier, see `id::encode`.
    pub id: String,
    pub common_name: String,
    pub scientific_name: String,
    /// Always absolute, root-relative, or the placeholder.
    pub image_url: String,
    #[serde(flatten)]
    pub details: SpeciesDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SpeciesDetails {
    Tree(TreeDetails),
    Animal(AnimalDetails),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDetails {
    pub family: String,
    pub origin: String,
    pub propagation: String,
    pub utility: String,
    pub plant_types: BTreeSet<PlantType>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimalDetails {
    pub animal_type: AnimalType,
    pub diet: String,
    pub habits: String,
}

impl Species {
    pub fn kind(&self) -> Kind {
        match self.details {
            SpeciesDetails::Tree(_) => Kind::Tree,
            SpeciesDetails::Animal(_) => Kind::Animal,
        }
    }

    pub fn as_tree(&self) -> Option<&TreeDetails> {
        match &self.details {
            SpeciesDetails::Tree(details) => Some(details),
            SpeciesDetails::Animal(_) => None,
        }
    }

    pub fn as_animal(&self) -> Option<&AnimalDetails> {
        match &self.details {
            SpeciesDetails::Animal(details) => Some(details),
            SpeciesDetails::Tree(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Submission payloads
// ---------------------------------------------------------------------------

/// A new image attached to a create or update submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Payload for creating or updating a tree.
#[derive(Debug, Clone, Default)]
pub struct TreeForm {
    pub common_name: String,
    pub scientific_name: String,
    pub family: String,
    pub origin: String,
    pub propagation: String,
    pub utility: String,
    pub plant_types: BTreeSet<PlantType>,
    pub description: Option<String>,
    pub image: Option<ImageUpload>,
}

/// Payload for creating or updating an animal.
#[derive(Debug, Clone)]
pub struct AnimalForm {
    pub common_name: String,
    pub scientific_name: String,
    pub animal_type: AnimalType,
    pub diet: String,
    pub habits: String,
    pub image: Option<ImageUpload>,
}

impl TreeForm {
    /// Applies the submitted fields onto `previous`, keeping its id and image.
    pub fn merge_onto(&self, previous: &Species) -> Species {
        Species {
            id: previous.id.clone(),
            common_name: self.common_name.clone(),
            scientific_name: self.scientific_name.clone(),
            image_url: previous.image_url.clone(),
            details: SpeciesDetails::Tree(TreeDetails {
                family: self.family.clone(),
                origin: self.origin.clone(),
                propagation: self.propagation.clone(),
                utility: self.utility.clone(),
                plant_types: self.plant_types.clone(),
                description: self.description.clone(),
            }),
        }
    }
}

impl AnimalForm {
    /// Applies the submitted fields onto `previous`, keeping its id and image.
    pub fn merge_onto(&self, previous: &Species) -> Species {
        Species {
            id: previous.id.clone(),
            common_name: self.common_name.clone(),
            scientific_name: self.scientific_name.clone(),
            image_url: previous.image_url.clone(),
            details: SpeciesDetails::Animal(AnimalDetails {
                animal_type: self.animal_type,
                diet: self.diet.clone(),
                habits: self.habits.clone(),
            }),
        }
    }
}
