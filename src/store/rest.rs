//! PostgREST backend using a service key

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::records::{AccountRecord, CharacterRecord, WorldFile};
use super::StoreError;
use crate::game::character::Character;
use crate::game::CharacterId;

/// Thin REST client for server-side table access
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestClient {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Make an authenticated GET request expecting a single row
    pub async fn get_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Option<T>, StoreError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", "application/json")
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await
            .map_err(StoreError::Request)?;

        if response.status() == reqwest::StatusCode::NOT_ACCEPTABLE {
            // No rows found
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status: status.as_u16(), body });
        }

        response.json().await.map(Some).map_err(StoreError::Parse)
    }

    /// Insert a row; `Ok(false)` when it collides with an existing key
    pub async fn insert_new<T: Serialize>(&self, table: &str, data: &T) -> Result<bool, StoreError> {
        let url = self.rest_url(table);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(data)
            .send()
            .await
            .map_err(StoreError::Request)?;

        if response.status() == reqwest::StatusCode::CONFLICT {
            return Ok(false);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status: status.as_u16(), body });
        }

        Ok(true)
    }

    /// Make an authenticated PATCH request (update)
    pub async fn update<T: Serialize>(
        &self,
        table: &str,
        query: &str,
        data: &T,
    ) -> Result<(), StoreError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .client
            .patch(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", "application/json")
            .json(data)
            .send()
            .await
            .map_err(StoreError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status: status.as_u16(), body });
        }

        Ok(())
    }

    /// Upsert (insert or update on conflict)
    pub async fn upsert<T: Serialize>(
        &self,
        table: &str,
        data: &T,
        on_conflict: &str,
    ) -> Result<(), StoreError> {
        let url = format!("{}?on_conflict={}", self.rest_url(table), on_conflict);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(data)
            .send()
            .await
            .map_err(StoreError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status: status.as_u16(), body });
        }

        Ok(())
    }

    /// Exact row count of a table
    pub async fn count(&self, table: &str) -> Result<usize, StoreError> {
        let url = format!("{}?select=username&limit=1", self.rest_url(table));

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(StoreError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api { status: status.as_u16(), body });
        }

        // Content-Range: 0-0/42 or */0
        response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(|range| range.rsplit('/').next())
            .and_then(|total| total.parse().ok())
            .ok_or_else(|| StoreError::Unavailable("missing content-range count".to_string()))
    }
}

/// Character row: the document is kept as one JSON column
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CharacterRow {
    id: CharacterId,
    account: String,
    data: Character,
    updated_at: DateTime<Utc>,
}

/// World row, a single document keyed by `id = 1`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorldRow {
    id: u32,
    data: WorldFile,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
struct AccountLink {
    character_id: CharacterId,
}

/// Accounts, characters and the world over PostgREST
#[derive(Clone)]
pub struct RestStore {
    client: RestClient,
}

impl RestStore {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            client: RestClient::new(base_url, service_key),
        }
    }

    pub async fn load_world(&self) -> Result<WorldFile, StoreError> {
        self.client
            .get_one::<WorldRow>("world", "id=eq.1")
            .await?
            .map(|row| row.data)
            .ok_or(StoreError::WorldMissing)
    }

    pub async fn save_world(&self, world: &WorldFile) -> Result<(), StoreError> {
        let row = WorldRow {
            id: 1,
            data: world.clone(),
            updated_at: Utc::now(),
        };
        self.client.upsert("world", &row, "id").await
    }

    pub async fn load_account(&self, username: &str) -> Result<Option<AccountRecord>, StoreError> {
        let query = format!("username=eq.{}", username);
        self.client.get_one("accounts", &query).await
    }

    pub async fn create_account(&self, account: &AccountRecord) -> Result<bool, StoreError> {
        self.client.insert_new("accounts", account).await
    }

    pub async fn count_accounts(&self) -> Result<usize, StoreError> {
        self.client.count("accounts").await
    }

    pub async fn link_character(
        &self,
        username: &str,
        character_id: CharacterId,
    ) -> Result<(), StoreError> {
        let query = format!("username=eq.{}", username);
        self.client
            .update("accounts", &query, &AccountLink { character_id })
            .await
    }

    pub async fn load_character(&self, id: CharacterId) -> Result<Option<CharacterRecord>, StoreError> {
        let query = format!("id=eq.{}", id);
        Ok(self
            .client
            .get_one::<CharacterRow>("characters", &query)
            .await?
            .map(|row| CharacterRecord {
                character: row.data,
                updated_at: row.updated_at,
            }))
    }

    pub async fn save_character(&self, record: &CharacterRecord) -> Result<(), StoreError> {
        let row = CharacterRow {
            id: record.character.id,
            account: record.character.account.clone(),
            data: record.character.clone(),
            updated_at: record.updated_at,
        };
        self.client.upsert("characters", &row, "id").await
    }
}
