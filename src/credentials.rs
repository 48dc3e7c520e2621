//! API keys, model name and prompt template
//!
//! Two sources feed a run:
//! - a managed secret store (key/value pairs, e.g. the process environment)
//! - a local `config.txt` with a header of `KEY = value` lines, a `KEYS:`
//!   section (one API key per line) and a `PROMPT:` section holding the rest
//!   of the file as the prompt template
//!
//! Secret-store values win over the local file for the same setting.

use crate::config::DEFAULT_MODEL_NAME;
use crate::error::Result;
use crate::pool::Credential;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Secret holding a list of API keys
pub const SECRET_KEYS: &str = "GEMINI_KEYS";
/// Secret holding a single API key
pub const SECRET_KEY: &str = "GEMINI_KEY";
/// Setting naming the model
pub const MODEL_NAME: &str = "MODEL_NAME";
/// Secret holding a prompt template
pub const SECRET_PROMPT: &str = "PROMPT";

const KEYS_MARKER: &str = "KEYS:";
const PROMPT_MARKER: &str = "PROMPT:";

/// Prompt used when no template is configured
pub const DEFAULT_PROMPT: &str = "Determine which classifier entry (ID) best matches the problem description.\n\
Return exactly one line in the format:\n\
ID=<id>";

/// Example written when `config.txt` does not exist yet
pub const EXAMPLE_CONFIG: &str = "# config.txt: model, API keys and prompt template\n\
MODEL_NAME = gemini-2.5-flash-lite\n\
\n\
# One API key per line\n\
KEYS:\n\
\n\
# Prompt (everything below is the template)\n\
PROMPT:\n\
Determine which classifier entry (ID) best matches the problem description.\n\
Return exactly one line in the format:\n\
ID=<id>\n";

/// Managed secret store: flat key/value settings, possibly list-valued
#[derive(Clone, Debug, Default)]
pub struct SecretStore {
    values: HashMap<String, String>,
}

impl SecretStore {
    /// Build from arbitrary pairs; keys and values are trimmed, empty values dropped
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().trim().to_string(), v.as_ref().trim().to_string()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();
        Self { values }
    }

    /// Read the recognized settings from the process environment
    pub fn from_env() -> Self {
        let recognized = [SECRET_KEYS, SECRET_KEY, MODEL_NAME, SECRET_PROMPT];
        Self::from_pairs(std::env::vars().filter(|(k, _)| recognized.contains(&k.as_str())))
    }

    /// Raw value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value of `key` parsed as a list
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(parse_list).filter(|l| !l.is_empty())
    }

    /// Whether no settings are present
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parse `['a', 'b']`, `["a","b"]`, `a,b` or one item per line
fn parse_list(raw: &str) -> Vec<String> {
    let inner = raw
        .trim()
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .unwrap_or(raw);

    inner
        .split([',', '\n'])
        .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parsed local `config.txt`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalConfig {
    /// `KEY = value` settings from the header (before any section marker)
    pub settings: HashMap<String, String>,
    /// Lines of the `KEYS:` section
    pub keys: Vec<String>,
    /// Content of the `PROMPT:` section, trimmed
    pub prompt: Option<String>,
}

impl LocalConfig {
    /// Parse the file content; never fails, unknown lines are ignored
    pub fn parse(content: &str) -> Self {
        enum Section {
            Header,
            Keys,
        }

        let mut config = LocalConfig::default();
        let mut section = Section::Header;
        let mut lines = content.lines();

        while let Some(line) = lines.next() {
            let trimmed = line.trim();

            if let Some(rest) = trimmed.strip_prefix(PROMPT_MARKER) {
                let mut prompt = rest.trim().to_string();
                for remaining in lines.by_ref() {
                    prompt.push('\n');
                    prompt.push_str(remaining);
                }
                let prompt = prompt.trim().to_string();
                if !prompt.is_empty() {
                    config.prompt = Some(prompt);
                }
                break;
            }

            if let Some(rest) = trimmed.strip_prefix(KEYS_MARKER) {
                section = Section::Keys;
                let rest = rest.trim();
                if !rest.is_empty() {
                    config.keys.push(rest.to_string());
                }
                continue;
            }

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            match section {
                Section::Header => {
                    if let Some((k, v)) = trimmed.split_once('=') {
                        config
                            .settings
                            .insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
                Section::Keys => config.keys.push(trimmed.to_string()),
            }
        }

        config
    }

    /// Load `path`; `None` when the file does not exist
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(Self::parse(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load `path`, writing [`EXAMPLE_CONFIG`] there first when it is missing
    pub async fn load_or_create(path: &Path) -> Result<Self> {
        if let Some(config) = Self::load(path).await? {
            return Ok(config);
        }
        tokio::fs::write(path, EXAMPLE_CONFIG).await?;
        info!(path = %path.display(), "wrote example configuration");
        Ok(Self::parse(EXAMPLE_CONFIG))
    }
}

/// Where the API keys of a run came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySource {
    /// `GEMINI_KEYS` secret
    SecretList,
    /// `GEMINI_KEY` secret
    SecretSingle,
    /// `KEYS:` section of the local file
    LocalFile,
    /// No keys anywhere
    None,
}

/// Model name, API keys and prompt template of a run
#[derive(Clone, Debug)]
pub struct ResolvedCredentials {
    /// Model identifier
    pub model_name: String,
    /// API keys in pool order (may be empty; the pool rejects that)
    pub keys: Vec<Credential>,
    /// Where `keys` came from
    pub key_source: KeySource,
    /// Prompt template
    pub prompt_template: String,
}

impl ResolvedCredentials {
    /// Merge both sources, secret store first
    ///
    /// Keys: `GEMINI_KEYS` list, else `GEMINI_KEY`, else the local `KEYS:`
    /// section. Model and prompt: secret value, else local value, else default.
    pub fn resolve(secrets: &SecretStore, local: Option<&LocalConfig>) -> Self {
        let (keys, key_source) = if let Some(list) = secrets.get_list(SECRET_KEYS) {
            (list, KeySource::SecretList)
        } else if let Some(key) = secrets.get(SECRET_KEY) {
            (vec![key.to_string()], KeySource::SecretSingle)
        } else if let Some(local) = local.filter(|l| !l.keys.is_empty()) {
            (local.keys.clone(), KeySource::LocalFile)
        } else {
            (Vec::new(), KeySource::None)
        };

        let model_name = secrets
            .get(MODEL_NAME)
            .or_else(|| {
                local
                    .and_then(|l| l.settings.get(MODEL_NAME))
                    .map(String::as_str)
                    .filter(|v| !v.is_empty())
            })
            .unwrap_or(DEFAULT_MODEL_NAME)
            .to_string();

        let prompt_template = secrets
            .get(SECRET_PROMPT)
            .or_else(|| local.and_then(|l| l.prompt.as_deref()))
            .unwrap_or(DEFAULT_PROMPT)
            .trim()
            .to_string();

        debug!(
            keys = keys.len(),
            ?key_source,
            model = %model_name,
            "resolved credentials"
        );

        Self {
            model_name,
            keys: keys.into_iter().map(Credential::from).collect(),
            key_source,
            prompt_template,
        }
    }
}
