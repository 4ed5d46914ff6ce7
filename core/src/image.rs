//! Maps backend image paths to URLs a rendering layer can use directly.

const SCHEMES: [&str; 5] = ["http://", "https://", "data:", "blob:", "//"];

pub const DEFAULT_PLACEHOLDER: &str = "/placeholder.svg";

#[derive(Debug, Clone)]
pub struct ImageResolver {
    base_url: String,
    placeholder: String,
}

impl ImageResolver {
    pub fn new(base_url: &str, placeholder: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            placeholder: placeholder.to_string(),
        }
    }

    /// Absent or blank paths resolve to the placeholder. Paths that already
    /// carry a scheme, or are protocol-relative (`//host/..`), are returned
    /// unchanged. Anything else is joined onto the backend base URL.
    pub fn resolve(&self, raw: Option<&str>) -> String {
        let raw = match raw.map(str::trim) {
            Some(path) if !path.is_empty() => path,
            _ => return self.placeholder.clone(),
        };
        let lowered = raw.to_ascii_lowercase();
        if SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
            return raw.to_string();
        }
        format!("{}/{}", self.base_url, raw.trim_start_matches('/'))
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }
}
