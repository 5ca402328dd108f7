#![allow(dead_code)]

use firecoll_core::schema::validate::{require_non_empty, validate_email};
use firecoll_core::{OwnerMeta, Schema, SchemaMeta, SecretString, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub meta: SchemaMeta,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl User {
    pub fn new(email: &str) -> Self {
        Self {
            meta: SchemaMeta::default(),
            email: email.to_string(),
            full_name: None,
            password: None,
            age: None,
            tags: Vec::new(),
        }
    }

    pub fn aged(email: &str, age: i64) -> Self {
        Self {
            age: Some(age),
            ..Self::new(email)
        }
    }

    pub fn id(&self) -> &str {
        self.meta
            .id
            .as_ref()
            .map(|id| id.as_str())
            .expect("stored user should have an id")
    }
}

impl Schema for User {
    const COLLECTION_NAME: &'static str = "users";
    const UNIQUE_KEYS: &'static [&'static str] = &["email"];

    fn meta(&self) -> &SchemaMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut SchemaMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_email("email", &self.email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    #[serde(flatten)]
    pub meta: SchemaMeta,
    #[serde(flatten)]
    pub owner: OwnerMeta,
    pub title: String,
}

impl Note {
    pub fn new(title: &str) -> Self {
        Self {
            meta: SchemaMeta::default(),
            owner: OwnerMeta::default(),
            title: title.to_string(),
        }
    }
}

impl Schema for Note {
    const COLLECTION_NAME: &'static str = "notes";
    const IS_OWNED: bool = true;

    fn meta(&self) -> &SchemaMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut SchemaMeta {
        &mut self.meta
    }

    fn owner_meta_mut(&mut self) -> Option<&mut OwnerMeta> {
        Some(&mut self.owner)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("title", &self.title)
    }
}
