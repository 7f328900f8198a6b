//! Index store: row validation, Turtle generation, and submission
//! to the triple store, plus namespace bootstrap and entity deletion.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;
use serde::Serialize;
use tracing::{error, warn};

use crate::domain::errors::{RemoteError, RowValidationError};
use crate::domain::models::namespace::turtle_prefixes;
use crate::domain::models::IdentifierRecord;
use crate::domain::ports::TripleStoreClient;

static ENTITY_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{1,64}$").expect("valid regex"));

/// Matches a percent-encoded hub-key id-type segment: alphanumeric,
/// underscore, percent-escapes, hyphen, and dot.
static ID_TYPE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_%\-.]{1,64}$").expect("valid regex"));

/// Matches a percent-encoded hub-key entity-id segment.
static SOURCE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_%\-.~:/]{1,512}$").expect("valid regex"));

/// Outcome of submitting one batch of identifier rows.
#[derive(Debug, Default, Serialize)]
pub struct SubmitOutcome {
    pub records: usize,
    pub errors: Vec<String>,
}

pub struct IndexStore<T: TripleStoreClient> {
    client: Arc<T>,
}

impl<T: TripleStoreClient> IndexStore<T> {
    pub fn new(client: Arc<T>) -> Self {
        Self { client }
    }

    /// Ensure the store's namespace exists. A 409 is treated as success.
    pub async fn create_namespace(&self) -> Result<(), RemoteError> {
        match self.client.create_namespace().await {
            Ok(()) => Ok(()),
            Err(RemoteError::Status { status: 409, .. }) => Ok(()),
            Err(err) => {
                error!(error = %err, "failed to create namespace");
                Err(err)
            }
        }
    }

    /// Validate and submit a batch of identifier rows for `entity_type`
    /// originating from `repo_id`. Invalid rows are skipped and reported,
    /// never abort the batch.
    pub async fn add_entities(
        &self,
        entity_type: &str,
        rows: &[IdentifierRecord],
        repo_id: &str,
    ) -> SubmitOutcome {
        let mut outcome = SubmitOutcome::default();
        let mut turtle = String::new();
        write_prefixes(&mut turtle);

        for row in rows {
            match validate_row(row) {
                Ok(()) => {
                    write_row(&mut turtle, entity_type, row, repo_id);
                    outcome.records += 1;
                }
                Err(err) => {
                    warn!(entity_id = %row.entity_id, error = %err, "dropping invalid row");
                    outcome.errors.push(err.to_string());
                }
            }
        }

        if outcome.records > 0 {
            if let Err(err) = self.client.store_turtle(&turtle).await {
                error!(error = %err, "failed to submit turtle batch");
                outcome.errors.push(err.to_string());
            }
        }

        outcome
    }

    /// Delete the entity whose identifier set exactly matches `ids` within
    /// `repository_id`, provided no other entity shares those identifiers.
    ///
    /// Three-step algorithm: find candidate entities, fetch each one's full
    /// identifier set, and only delete when the sets match exactly and are
    /// unique to that entity.
    pub async fn delete_entity_by_ids(
        &self,
        entity_type: &str,
        ids: &[(String, String)],
        repository_id: &str,
    ) -> Result<bool, RemoteError> {
        let candidates = self.find_matching_entities(entity_type, ids, repository_id).await?;

        let wanted: BTreeSet<(String, String)> = ids.iter().cloned().collect();

        for entity_uri in candidates {
            let entity_ids = self.entity_identifier_set(&entity_uri).await?;
            if entity_ids != wanted {
                continue;
            }

            let shared = self.count_entities_sharing(&entity_uri, &wanted).await?;
            if shared > 1 {
                continue;
            }

            self.delete_id_triples(&wanted).await?;
            self.delete_entity_triples(&entity_uri).await?;
            return Ok(true);
        }

        Ok(false)
    }

    async fn find_matching_entities(
        &self,
        entity_type: &str,
        ids: &[(String, String)],
        repository_id: &str,
    ) -> Result<Vec<String>, RemoteError> {
        let xid_filters: Vec<String> = ids
            .iter()
            .map(|(id_type, value)| format!("<xid/{}/{}>", encode(id_type), encode(value)))
            .collect();
        let values = xid_filters.join(" ");
        let sparql = format!(
            "SELECT DISTINCT ?entity_uri WHERE {{ \
             VALUES ?xid {{ {values} }} \
             ?xid ^op:alsoIdentifiedBy ?entity_uri . \
             ?entity_uri chubindex:repo {repo:?} ; chubindex:type {etype:?} . }}",
            values = values,
            repo = repository_id,
            etype = entity_type,
        );
        let rows = self.client.run_query(&sparql).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.get("entity_uri").cloned())
            .collect())
    }

    async fn entity_identifier_set(
        &self,
        entity_uri: &str,
    ) -> Result<BTreeSet<(String, String)>, RemoteError> {
        let sparql = format!(
            "SELECT ?id_type ?value WHERE {{ <{entity_uri}> op:alsoIdentifiedBy ?xid . \
             ?xid chubindex:id_type ?id_type ; chubindex:id ?value . }}"
        );
        let rows = self.client.run_query(&sparql).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| Some((row.get("id_type")?.clone(), row.get("value")?.clone())))
            .collect())
    }

    async fn count_entities_sharing(
        &self,
        entity_uri: &str,
        ids: &BTreeSet<(String, String)>,
    ) -> Result<usize, RemoteError> {
        let xid_filters: Vec<String> = ids
            .iter()
            .map(|(id_type, value)| format!("<xid/{}/{}>", encode(id_type), encode(value)))
            .collect();
        let values = xid_filters.join(" ");
        let sparql = format!(
            "SELECT (COUNT(DISTINCT ?other) AS ?count) WHERE {{ \
             VALUES ?xid {{ {values} }} \
             ?xid ^op:alsoIdentifiedBy ?other . FILTER(?other != <{entity_uri}>) }}"
        );
        let rows = self.client.run_query(&sparql).await?;
        let count = rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        // +1 for entity_uri itself, matching the original's inclusive count.
        Ok(count + 1)
    }

    async fn delete_id_triples(&self, ids: &BTreeSet<(String, String)>) -> Result<(), RemoteError> {
        for (id_type, value) in ids {
            let sparql = format!(
                "DELETE WHERE {{ <xid/{}/{}> ?p ?o }}",
                encode(id_type),
                encode(value)
            );
            self.client.run_update(&sparql).await?;
        }
        Ok(())
    }

    async fn delete_entity_triples(&self, entity_uri: &str) -> Result<(), RemoteError> {
        let sparql = format!("DELETE WHERE {{ <{entity_uri}> ?p ?o }}");
        self.client.run_update(&sparql).await
    }
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

fn validate_row(row: &IdentifierRecord) -> Result<(), RowValidationError> {
    if row.entity_id.is_empty() {
        return Err(RowValidationError::MissingField("entity_id"));
    }
    if row.source_id.is_empty() {
        return Err(RowValidationError::MissingField("source_id"));
    }
    if row.source_id_type.is_empty() {
        return Err(RowValidationError::MissingField("source_id_type"));
    }

    if !ENTITY_ID_PATTERN.is_match(&row.entity_id) {
        return Err(RowValidationError::InvalidEntityId(row.entity_id.clone()));
    }

    let encoded_type = encode(&row.source_id_type);
    if !ID_TYPE_PATTERN.is_match(&encoded_type) {
        return Err(RowValidationError::InvalidSourceIdType(
            row.source_id_type.clone(),
        ));
    }

    let encoded_id = encode(&row.source_id);
    if !SOURCE_ID_PATTERN.is_match(&encoded_id) {
        return Err(RowValidationError::InvalidSourceId(row.source_id.clone()));
    }

    Ok(())
}

fn write_prefixes(out: &mut String) {
    out.push_str(&turtle_prefixes());
}

// `chubindex:id`/`chubindex:id_type` are stored percent-encoded, matching
// the original's stored form; `query_planner::decode` undoes this on read
// so data written here interoperates with data written by the original.
fn write_row(out: &mut String, entity_type: &str, row: &IdentifierRecord, repo_id: &str) {
    let encoded_type = encode(&row.source_id_type);
    let encoded_value = encode(&row.source_id);

    let _ = writeln!(
        out,
        "<xid/{encoded_type}/{encoded_value}> chubindex:id \"{value}\" ; chubindex:id_type \"{id_type}\" .",
        value = escape_literal(&encoded_value),
        id_type = escape_literal(&encoded_type),
    );
    let _ = writeln!(
        out,
        "id:{entity_id} op:alsoIdentifiedBy <xid/{encoded_type}/{encoded_value}> ; chubindex:repo \"{repo_id}\" ; chubindex:type \"{entity_type}\" .\n",
        entity_id = row.entity_id,
    );
}

fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::domain::ports::ResultRow;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubStore {
        turtle_submissions: Mutex<Vec<String>>,
        fail_store: bool,
    }

    #[async_trait]
    impl TripleStoreClient for StubStore {
        async fn run_query(&self, _sparql: &str) -> Result<Vec<ResultRow>, RemoteError> {
            Ok(Vec::new())
        }

        async fn run_update(&self, _sparql: &str) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn store_turtle(&self, turtle: &str) -> Result<(), RemoteError> {
            if self.fail_store {
                return Err(RemoteError::Decode("boom".to_string()));
            }
            self.turtle_submissions.lock().unwrap().push(turtle.to_string());
            Ok(())
        }

        async fn create_namespace(&self) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    fn valid_row() -> IdentifierRecord {
        IdentifierRecord {
            entity_id: "abc123".to_string(),
            source_id: "doi:10.1000/xyz".to_string(),
            source_id_type: "doi".to_string(),
        }
    }

    #[tokio::test]
    async fn valid_row_is_submitted() {
        let store = Arc::new(StubStore::default());
        let index = IndexStore::new(store.clone());
        let outcome = index.add_entities("asset", &[valid_row()], "repo-a").await;
        assert_eq!(outcome.records, 1);
        assert!(outcome.errors.is_empty());
        assert_eq!(store.turtle_submissions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn chubindex_id_literals_are_stored_percent_encoded() {
        let store = Arc::new(StubStore::default());
        let index = IndexStore::new(store.clone());
        index.add_entities("asset", &[valid_row()], "repo-a").await;
        let turtle = store.turtle_submissions.lock().unwrap()[0].clone();
        // "doi:10.1000/xyz" percent-encoded, not the raw literal.
        assert!(turtle.contains("chubindex:id \"doi%3A10%2E1000%2Fxyz\""));
        assert!(!turtle.contains("chubindex:id \"doi:10.1000/xyz\""));
    }

    #[tokio::test]
    async fn invalid_entity_id_is_dropped_but_batch_continues() {
        let store = Arc::new(StubStore::default());
        let index = IndexStore::new(store.clone());
        let mut bad = valid_row();
        bad.entity_id = "NOT-HEX!".to_string();
        let outcome = index
            .add_entities("asset", &[bad, valid_row()], "repo-a")
            .await;
        assert_eq!(outcome.records, 1);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_never_calls_store_turtle() {
        let store = Arc::new(StubStore::default());
        let index = IndexStore::new(store.clone());
        let mut bad = valid_row();
        bad.entity_id = String::new();
        let outcome = index.add_entities("asset", &[bad], "repo-a").await;
        assert_eq!(outcome.records, 0);
        assert!(store.turtle_submissions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn namespace_create_conflict_is_success() {
        struct ConflictStore;
        #[async_trait]
        impl TripleStoreClient for ConflictStore {
            async fn run_query(&self, _: &str) -> Result<Vec<ResultRow>, RemoteError> {
                Ok(Vec::new())
            }
            async fn run_update(&self, _: &str) -> Result<(), RemoteError> {
                Ok(())
            }
            async fn store_turtle(&self, _: &str) -> Result<(), RemoteError> {
                Ok(())
            }
            async fn create_namespace(&self) -> Result<(), RemoteError> {
                Err(RemoteError::Status {
                    status: 409,
                    body: "already exists".to_string(),
                })
            }
        }
        let index = IndexStore::new(Arc::new(ConflictStore));
        assert!(index.create_namespace().await.is_ok());
    }
}
