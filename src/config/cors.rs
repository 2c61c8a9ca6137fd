use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-origin headers sent with every response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .map(String::from)
                .to_vec(),
            allow_headers: ["Content-Type", "Authorization"].map(String::from).to_vec(),
            allow_credentials: false,
        }
    }
}

impl CorsConfig {
    /// Envelope headers, including the JSON content type
    pub fn headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Access-Control-Allow-Origin".to_string(), self.allow_origin.clone());
        if !self.allow_methods.is_empty() {
            headers.insert(
                "Access-Control-Allow-Methods".to_string(),
                self.allow_methods.join(","),
            );
        }
        if !self.allow_headers.is_empty() {
            headers.insert(
                "Access-Control-Allow-Headers".to_string(),
                self.allow_headers.join(","),
            );
        }
        if self.allow_credentials {
            headers.insert(
                "Access-Control-Allow-Credentials".to_string(),
                "true".to_string(),
            );
        }
        headers
    }
}
