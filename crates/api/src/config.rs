use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::gql::{EntityType, FieldDef, ScalarType, SchemaConfig};

const DEFAULT_ORIGINS: &str = "http://localhost:3000,http://localhost:3001";

/// Process configuration, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Without a database URL documents are kept in memory.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub skip_migrations: bool,
    pub entities_path: PathBuf,
    pub allowed_origins: Vec<String>,
    pub schema: SchemaConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let flag = |key: &str| lookup(key).is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let defaults = SchemaConfig::default();

        Ok(Self {
            port: parse_or(&lookup, "PORT", 8080)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 30)?,
            skip_migrations: flag("SKIP_MIGRATIONS"),
            entities_path: lookup("ENTITIES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("entities.json")),
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .unwrap_or_else(|| DEFAULT_ORIGINS.to_string())
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            schema: SchemaConfig {
                depth_limit: parse_or(&lookup, "GQL_DEPTH_LIMIT", defaults.depth_limit)?,
                complexity_limit: parse_or(&lookup, "GQL_COMPLEXITY_LIMIT", defaults.complexity_limit)?,
                introspection: flag("GQL_INTROSPECTION"),
            },
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.parse().with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

/// One entity as written in the entities file.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    pub collection: String,
    pub fields: Vec<FieldConfig>,
}

/// Exactly one of `type` (a scalar attribute) or `entity` (a nested
/// collection) must be given.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Option<ScalarType>,
    #[serde(default)]
    pub required: bool,
    pub entity: Option<String>,
}

impl FieldConfig {
    fn into_def(self, owner: &str) -> anyhow::Result<FieldDef> {
        match (self.ty, self.entity) {
            (Some(ty), None) if self.required => Ok(FieldDef::required(self.name, ty)),
            (Some(ty), None) => Ok(FieldDef::scalar(self.name, ty)),
            (None, Some(entity)) => Ok(FieldDef::collection(self.name, entity)),
            (Some(_), Some(_)) => bail!("{owner}.{}: `type` and `entity` are mutually exclusive", self.name),
            (None, None) => bail!("{owner}.{}: one of `type` or `entity` is required", self.name),
        }
    }
}

impl TryFrom<EntityConfig> for EntityType {
    type Error = anyhow::Error;

    fn try_from(config: EntityConfig) -> anyhow::Result<Self> {
        let fields = config
            .fields
            .into_iter()
            .map(|field| field.into_def(&config.name))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(EntityType::new(config.name, config.collection, fields))
    }
}

pub fn parse_entities(json: &str) -> anyhow::Result<Vec<EntityType>> {
    let configs: Vec<EntityConfig> = serde_json::from_str(json).context("invalid entity definitions")?;
    configs.into_iter().map(EntityType::try_from).collect()
}

pub fn load_entities(path: &Path) -> anyhow::Result<Vec<EntityType>> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let entities = parse_entities(&json)?;
    tracing::info!(path = %path.display(), count = entities.len(), "entity definitions loaded");
    Ok(entities)
}
