//! Multi-key identity resolution.
//!
//! A user is addressed by up to three keys: the durable platform id, a
//! possibly-unstable alias, and legacy top-level keys from the old data
//! layout. Resolution follows one documented priority order so the three
//! paths can never produce a second record for the same person.

use super::Store;
use forma_core::error::FormaError;

/// One end user across all their aliases.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Identity {
    /// Durable platform id.
    pub id: String,
    pub alias: Option<String>,
    /// Paid-acquisition source, set once when the lead is detected.
    pub lead_source: Option<String>,
    /// Funnel scenario tag set alongside the lead source.
    pub funnel_scenario: Option<String>,
}

impl Store {
    /// Resolve an identity from whatever keys the event carried.
    ///
    /// Lookup order: (1) exact durable-id match, (2) alias match,
    /// (3) legacy key equal to the alias. If nothing matches, a new record
    /// is created keyed by the durable id — an alias-only event that
    /// matches nothing cannot create a record and is an error the ingress
    /// boundary must surface.
    pub async fn resolve_identity(
        &self,
        durable_id: Option<&str>,
        alias: Option<&str>,
    ) -> Result<Identity, FormaError> {
        let durable_id = durable_id.filter(|d| !d.is_empty());
        let alias = alias.filter(|a| !a.is_empty());

        if let Some(id) = durable_id {
            if let Some(identity) = self.find_by_id(id).await? {
                return self.maybe_update_alias(identity, alias).await;
            }
        }

        if let Some(name) = alias {
            let row: Option<Identity> = sqlx::query_as(
                "SELECT id, alias, lead_source, funnel_scenario FROM identities WHERE alias = ?",
            )
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FormaError::Memory(format!("alias lookup failed: {e}")))?;

            if let Some(identity) = row {
                return Ok(identity);
            }

            // Legacy top-level keys from the old data layout.
            let row: Option<Identity> = sqlx::query_as(
                "SELECT i.id, i.alias, i.lead_source, i.funnel_scenario \
                 FROM legacy_keys k JOIN identities i ON i.id = k.identity_id \
                 WHERE k.key = ?",
            )
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FormaError::Memory(format!("legacy key lookup failed: {e}")))?;

            if let Some(identity) = row {
                return Ok(identity);
            }
        }

        // No match anywhere — creation requires a durable id.
        let Some(id) = durable_id else {
            return Err(FormaError::Identity(format!(
                "no record matches alias {alias:?} and the event carries no durable id"
            )));
        };

        sqlx::query("INSERT INTO identities (id, alias) VALUES (?, ?)")
            .bind(id)
            .bind(alias)
            .execute(&self.pool)
            .await
            .map_err(|e| FormaError::Memory(format!("identity insert failed: {e}")))?;

        Ok(Identity {
            id: id.to_string(),
            alias: alias.map(str::to_string),
            lead_source: None,
            funnel_scenario: None,
        })
    }

    /// Exact durable-id lookup.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, FormaError> {
        sqlx::query_as(
            "SELECT id, alias, lead_source, funnel_scenario FROM identities WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FormaError::Memory(format!("identity lookup failed: {e}")))
    }

    /// Store a better alias if one was observed. A placeholder-shaped alias
    /// never replaces a known-good one.
    async fn maybe_update_alias(
        &self,
        mut identity: Identity,
        observed: Option<&str>,
    ) -> Result<Identity, FormaError> {
        let Some(observed) = observed else {
            return Ok(identity);
        };
        if identity.alias.as_deref() == Some(observed) {
            return Ok(identity);
        }
        if identity.alias.is_some() && is_placeholder_alias(observed) {
            return Ok(identity);
        }

        sqlx::query(
            "UPDATE identities SET alias = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(observed)
        .bind(&identity.id)
        .execute(&self.pool)
        .await
        .map_err(|e| FormaError::Memory(format!("alias update failed: {e}")))?;

        identity.alias = Some(observed.to_string());
        Ok(identity)
    }

    /// Map a legacy top-level key onto an identity.
    pub async fn link_legacy_key(&self, key: &str, identity_id: &str) -> Result<(), FormaError> {
        sqlx::query("INSERT OR IGNORE INTO legacy_keys (key, identity_id) VALUES (?, ?)")
            .bind(key)
            .bind(identity_id)
            .execute(&self.pool)
            .await
            .map_err(|e| FormaError::Memory(format!("legacy key insert failed: {e}")))?;

        Ok(())
    }

    /// Permanently tag an identity as a paid-acquisition lead.
    pub async fn tag_lead(
        &self,
        identity_id: &str,
        source: &str,
        scenario: Option<&str>,
    ) -> Result<(), FormaError> {
        sqlx::query(
            "UPDATE identities SET lead_source = ?, funnel_scenario = ?, \
             updated_at = datetime('now') WHERE id = ? AND lead_source IS NULL",
        )
        .bind(source)
        .bind(scenario)
        .bind(identity_id)
        .execute(&self.pool)
        .await
        .map_err(|e| FormaError::Memory(format!("lead tag failed: {e}")))?;

        Ok(())
    }
}

/// Whether an alias looks machine-generated rather than user-chosen.
///
/// The platform hands out `user<digits>` handles (and variants with a long
/// trailing digit run) before the real username is known.
pub fn is_placeholder_alias(alias: &str) -> bool {
    if let Some(rest) = alias.strip_prefix("user") {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
            return true;
        }
    }
    let trailing_digits = alias
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count();
    trailing_digits >= 5
}
