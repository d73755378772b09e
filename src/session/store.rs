//! Persistent client-side key/value store scoped by gateway origin.
//!
//! Plays the role browser local storage plays for a web client: one JSON
//! file holding `origin → { key → value }`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::gate::SessionError;
use super::token::Token;

/// Storage key the bearer token is kept under
pub const TOKEN_KEY: &str = "jwt";

type StoreContents = BTreeMap<String, BTreeMap<String, String>>;

/// File-backed token store
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a value for an origin
    pub fn get(&self, origin: &str, key: &str) -> Result<Option<String>, SessionError> {
        let contents = self.read()?;
        Ok(contents.get(origin).and_then(|entries| entries.get(key)).cloned())
    }

    /// Write a value for an origin
    pub fn set(&self, origin: &str, key: &str, value: &str) -> Result<(), SessionError> {
        let mut contents = self.read()?;
        contents
            .entry(origin.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.write(&contents)
    }

    /// Remove a value for an origin. Removing a missing key is not an error.
    pub fn remove(&self, origin: &str, key: &str) -> Result<(), SessionError> {
        let mut contents = self.read()?;
        let removed = match contents.get_mut(origin) {
            Some(entries) => {
                let removed = entries.remove(key).is_some();
                if entries.is_empty() {
                    contents.remove(origin);
                }
                removed
            }
            None => false,
        };

        if removed {
            self.write(&contents)?;
        }
        Ok(())
    }

    /// Load the persisted token for an origin
    pub fn load_token(&self, origin: &str) -> Result<Option<Token>, SessionError> {
        Ok(self.get(origin, TOKEN_KEY)?.map(Token::new))
    }

    /// Persist the token for an origin
    pub fn save_token(&self, origin: &str, token: &Token) -> Result<(), SessionError> {
        self.set(origin, TOKEN_KEY, token.as_str())
    }

    /// Forget the token for an origin
    pub fn clear_token(&self, origin: &str) -> Result<(), SessionError> {
        self.remove(origin, TOKEN_KEY)
    }

    fn read(&self) -> Result<StoreContents, SessionError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoreContents::new()),
            Err(e) => {
                return Err(SessionError::Store {
                    path: self.path.clone(),
                    error: e.to_string(),
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(StoreContents::new());
        }

        serde_json::from_str(&content).map_err(|e| SessionError::Store {
            path: self.path.clone(),
            error: format!("corrupt token store: {}", e),
        })
    }

    fn write(&self, contents: &StoreContents) -> Result<(), SessionError> {
        let store_err = |e: std::io::Error| SessionError::Store {
            path: self.path.clone(),
            error: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(store_err)?;
            }
        }

        let json = serde_json::to_string_pretty(contents).map_err(|e| SessionError::Store {
            path: self.path.clone(),
            error: e.to_string(),
        })?;
        std::fs::write(&self.path, json).map_err(store_err)
    }
}
