//! Multipart submissions for create and update.
//!
//! # Design
//! One builder serves both kinds and both operations: each payload type
//! writes its own text parts through `FormPayload`, and `build_submission`
//! appends the image part and, for updates, the method-override marker. The
//! backend only accepts POST from browsers, so updates are POSTs carrying
//! `_method=PUT`; nothing above this module knows about that.

use uuid::Uuid;

use crate::id::Kind;
use crate::types::{AnimalForm, ImageUpload, TreeForm};

pub const METHOD_OVERRIDE_FIELD: &str = "_method";
pub const METHOD_OVERRIDE_UPDATE: &str = "PUT";
pub const IMAGE_FIELD: &str = "imagem";
pub const PLANT_TYPE_FIELD: &str = "tiposPlanta";

/// Which logical operation a submission performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Create,
    Update,
}

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Part {
    /// The part's payload as text, for text parts.
    pub fn text(&self) -> Option<&str> {
        match self.file_name {
            None => std::str::from_utf8(&self.data).ok(),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: format!("----species-form-{}", Uuid::new_v4().simple()),
            parts: Vec::new(),
        }
    }

    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.parts.push(Part {
            name: name.to_string(),
            file_name: None,
            content_type: None,
            data: value.as_bytes().to_vec(),
        });
        self
    }

    pub fn file(&mut self, name: &str, upload: &ImageUpload) -> &mut Self {
        self.parts.push(Part {
            name: name.to_string(),
            file_name: Some(upload.file_name.clone()),
            content_type: Some(upload.content_type.clone()),
            data: upload.bytes.clone(),
        });
        self
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// All text values submitted under `name`, in order.
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.parts
            .iter()
            .filter(|part| part.name == name)
            .filter_map(Part::text)
            .collect()
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encodes the wire body.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            let disposition = match &part.file_name {
                Some(file_name) => format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    escape_quoted(&part.name),
                    escape_quoted(file_name)
                ),
                None => format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n",
                    escape_quoted(&part.name)
                ),
            };
            body.extend_from_slice(disposition.as_bytes());
            if let Some(content_type) = &part.content_type {
                body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(&part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// A typed create/update payload for one species kind.
pub trait FormPayload {
    const KIND: Kind;

    fn write_fields(&self, form: &mut MultipartForm);

    fn image(&self) -> Option<&ImageUpload>;
}

impl FormPayload for TreeForm {
    const KIND: Kind = Kind::Tree;

    fn write_fields(&self, form: &mut MultipartForm) {
        form.text("nomePopular", &self.common_name)
            .text("nomeCientifico", &self.scientific_name)
            .text("familia", &self.family)
            .text("origem", &self.origin)
            .text("utilidade", &self.utility)
            .text("formaPropagacao", &self.propagation);
        for tag in &self.plant_types {
            form.text(PLANT_TYPE_FIELD, tag.wire_name());
        }
        if let Some(description) = &self.description {
            form.text("descricao", description);
        }
    }

    fn image(&self) -> Option<&ImageUpload> {
        self.image.as_ref()
    }
}

impl FormPayload for AnimalForm {
    const KIND: Kind = Kind::Animal;

    fn write_fields(&self, form: &mut MultipartForm) {
        form.text("nomePopular", &self.common_name)
            .text("nomeCientifico", &self.scientific_name)
            .text("tipoAnimal", self.animal_type.wire_name())
            .text("alimentacao", &self.diet)
            .text("habitos", &self.habits);
    }

    fn image(&self) -> Option<&ImageUpload> {
        self.image.as_ref()
    }
}

pub fn build_submission<P: FormPayload>(payload: &P, submission: Submission) -> MultipartForm {
    let mut form = MultipartForm::new();
    if submission == Submission::Update {
        form.text(METHOD_OVERRIDE_FIELD, METHOD_OVERRIDE_UPDATE);
    }
    payload.write_fields(&mut form);
    if let Some(upload) = payload.image() {
        form.file(IMAGE_FIELD, upload);
    }
    form
}
