use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend tenant a user signs in to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    #[default]
    Fo1,
    Fo2,
}

impl Site {
    pub const ALL: [Site; 2] = [Site::Fo1, Site::Fo2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Site::Fo1 => "fo1",
            Site::Fo2 => "fo2",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Site::Fo1 => "FO1 Website",
            Site::Fo2 => "FO2 Website",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Site {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fo1" => Ok(Site::Fo1),
            "fo2" => Ok(Site::Fo2),
            other => bail!("Unsupported website '{}'. Must be one of: fo1, fo2", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: i64,
    pub title: String,
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub firm: String,
    #[serde(default = "default_asset_class", deserialize_with = "asset_class_or_default")]
    pub asset_class: String,
    #[serde(default = "default_deal_status", deserialize_with = "deal_status_or_default")]
    pub deal_status: String,
    #[serde(default = "default_currency", deserialize_with = "currency_or_default")]
    pub currency: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub deal_capital_seeker_email: String,
}

// The backend declares these fields optional and may send `null` for them.
fn null_as_default<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

fn asset_class_or_default<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(default_asset_class))
}

fn deal_status_or_default<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(default_deal_status))
}

fn currency_or_default<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(default_currency))
}

fn default_asset_class() -> String {
    "General".to_string()
}

fn default_deal_status() -> String {
    "Unknown".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Deal {
    pub fn status(&self) -> DealStatus {
        DealStatus::parse(&self.deal_status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DealStatus {
    New,
    Active,
    Closed,
    Pending,
    InProgress,
    Other(String),
}

impl DealStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "new" => DealStatus::New,
            "active" => DealStatus::Active,
            "closed" => DealStatus::Closed,
            "pending" => DealStatus::Pending,
            "in progress" | "in-progress" => DealStatus::InProgress,
            _ => DealStatus::Other(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileId {
    Number(i64),
    Text(String),
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileId::Number(n) => write!(f, "{}", n),
            FileId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub url: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub file_type: String,
    pub download_url: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub website: Site,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    /// Older backends omit the echoed site.
    #[serde(default)]
    pub website: Option<Site>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DealsResponse {
    #[serde(default)]
    pub deals: Vec<Deal>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilesResponse {
    #[serde(default)]
    pub files: Vec<FileInfo>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub error: Option<String>,
}

/// Last successfully fetched deal list, as kept in local storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealsSnapshot {
    pub site: Site,
    pub fetched_at: DateTime<Utc>,
    pub deals: Vec<Deal>,
}
