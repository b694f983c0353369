use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};

/// How uploaded files are attached to the vector store.
#[derive(Clone, Copy, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    /// Upload every file first, then attach them with a single file batch.
    #[default]
    Batch,
    /// Attach each file right after it is uploaded.
    PerFile,
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_model")]
    pub openai_model: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub admin_token: Option<String>,
    #[serde(default)]
    pub vector_store_id: Option<String>,
    #[serde(default = "default_course")]
    pub default_course: String,
    #[serde(default = "default_course")]
    pub vector_store_name: String,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "std::env::temp_dir")]
    pub upload_dir: PathBuf,
    #[serde(default)]
    pub upload_mode: UploadMode,
    #[serde(
        default = "default_allowed_extensions",
        deserialize_with = "deserialize_extension_list"
    )]
    pub upload_allowed_extensions: Vec<String>,
    #[serde(default = "default_upload_max_file_bytes")]
    pub upload_max_file_bytes: u64,
    #[serde(default = "default_upload_poll_interval_ms")]
    pub upload_poll_interval_ms: u64,
    #[serde(default = "default_upload_poll_max_attempts")]
    pub upload_poll_max_attempts: u32,
    #[serde(default = "default_json_body_limit_bytes")]
    pub json_body_limit_bytes: usize,
    #[serde(default = "default_upload_body_limit_bytes")]
    pub upload_body_limit_bytes: usize,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_origin() -> String {
    "https://apollo235298.github.io".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_course() -> String {
    "ENGAGING-CULTURE".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from("config.json")
}

fn default_allowed_extensions() -> Vec<String> {
    ["pdf", "txt", "md", "docx"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Accepts `"pdf,txt"` from the environment or a list from a settings file.
fn deserialize_extension_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ExtensionList {
        Csv(String),
        List(Vec<String>),
    }

    let raw = match ExtensionList::deserialize(deserializer)? {
        ExtensionList::Csv(csv) => csv.split(',').map(String::from).collect(),
        ExtensionList::List(list) => list,
    };

    Ok(raw
        .into_iter()
        .map(|ext| ext.trim().to_string())
        .filter(|ext| !ext.is_empty())
        .collect())
}

fn default_upload_max_file_bytes() -> u64 {
    25 * 1024 * 1024
}

fn default_upload_poll_interval_ms() -> u64 {
    1_000
}

fn default_upload_poll_max_attempts() -> u32 {
    300
}

fn default_json_body_limit_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_upload_body_limit_bytes() -> usize {
    100 * 1024 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            openai_model: default_model(),
            origin: default_origin(),
            port: default_port(),
            admin_token: None,
            vector_store_id: None,
            default_course: default_course(),
            vector_store_name: default_course(),
            state_file: default_state_file(),
            upload_dir: std::env::temp_dir(),
            upload_mode: UploadMode::default(),
            upload_allowed_extensions: default_allowed_extensions(),
            upload_max_file_bytes: default_upload_max_file_bytes(),
            upload_poll_interval_ms: default_upload_poll_interval_ms(),
            upload_poll_max_attempts: default_upload_poll_max_attempts(),
            json_body_limit_bytes: default_json_body_limit_bytes(),
            upload_body_limit_bytes: default_upload_body_limit_bytes(),
        }
    }
}

impl AppConfig {
    /// The shared admin secret, treating an empty value as unset.
    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref().filter(|token| !token.is_empty())
    }

    /// The environment-level vector store override, treating an empty value as unset.
    pub fn vector_store_override(&self) -> Option<&str> {
        self.vector_store_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Case-insensitive extension check against the upload allow-list.
    pub fn extension_allowed(&self, file_name: &str) -> bool {
        let Some((_, extension)) = file_name.rsplit_once('.') else {
            return false;
        };

        self.upload_allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    load_config(Environment::default())
}

/// Environment values stay strings until serde asks for a number, so secrets
/// such as `ADMIN_TOKEN=007` keep their exact spelling.
fn load_config(environment: Environment) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("settings").required(false))
        .add_source(environment)
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_admin_token_counts_as_unset() {
        let config = AppConfig {
            admin_token: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(config.admin_token(), None);

        let config = AppConfig {
            admin_token: Some("s3cret".into()),
            ..Default::default()
        };
        assert_eq!(config.admin_token(), Some("s3cret"));
    }

    #[test]
    fn blank_vector_store_override_is_ignored() {
        let config = AppConfig {
            vector_store_id: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(config.vector_store_override(), None);
    }

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        let config = AppConfig::default();

        assert!(config.extension_allowed("Week1.PDF"));
        assert!(config.extension_allowed("notes.md"));
        assert!(!config.extension_allowed("payload.exe"));
        assert!(!config.extension_allowed("README"));
    }

    #[test]
    fn allow_list_entries_may_carry_a_dot() {
        let config = AppConfig {
            upload_allowed_extensions: vec![".pdf".into()],
            ..Default::default()
        };

        assert!(config.extension_allowed("reading.pdf"));
        assert!(!config.extension_allowed("reading.txt"));
    }

    fn environment(vars: &[(&str, &str)]) -> Environment {
        Environment::default().source(Some(
            vars.iter()
                .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
                .collect::<config::Map<String, String>>(),
        ))
    }

    #[test]
    fn numeric_looking_secrets_keep_their_spelling() {
        let config = load_config(environment(&[
            ("ADMIN_TOKEN", "007"),
            ("DEFAULT_COURSE", "0101"),
            ("VECTOR_STORE_ID", "12345678901234567890123"),
            ("PORT", "8080"),
            ("UPLOAD_MAX_FILE_BYTES", "1024"),
        ]))
        .expect("config loads");

        assert_eq!(config.admin_token(), Some("007"));
        assert_eq!(config.default_course, "0101");
        assert_eq!(config.vector_store_override(), Some("12345678901234567890123"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.upload_max_file_bytes, 1024);
    }

    #[test]
    fn allowed_extensions_parse_from_a_comma_list() {
        let config = load_config(environment(&[
            ("UPLOAD_ALLOWED_EXTENSIONS", "pdf, epub,,TXT"),
            ("UPLOAD_MODE", "per_file"),
        ]))
        .expect("config loads");

        assert_eq!(config.upload_allowed_extensions, vec!["pdf", "epub", "TXT"]);
        assert_eq!(config.upload_mode, UploadMode::PerFile);
        assert!(config.extension_allowed("book.epub"));
    }

    #[test]
    fn allowed_extensions_accept_a_sequence() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(deserialize_with = "deserialize_extension_list")]
            exts: Vec<String>,
        }

        let holder: Holder =
            serde_json::from_str(r#"{"exts":["pdf"," md "]}"#).expect("valid list");
        assert_eq!(holder.exts, vec!["pdf", "md"]);
    }

    #[test]
    fn upload_mode_deserializes_from_snake_case() {
        let mode: UploadMode = serde_json::from_str("\"per_file\"").expect("valid mode");
        assert_eq!(mode, UploadMode::PerFile);
    }
}
