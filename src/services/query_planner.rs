//! Query planner: builds the recursive SPARQL used to answer bulk
//! repository/relation lookups and decodes its JSON-aggregate result
//! columns back into domain types.
//!
//! The relation cycle guard accumulates a `NOT IN` clause per recursion
//! depth, since the triple store has no bounded-length property path
//! operator.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;

use crate::domain::errors::QueryError;
use crate::domain::models::namespace::ID_NS;
use crate::domain::models::query::{
    InvalidQueryInput, QueryInput, QueryResult, Relation, RepositoryRef, HUB_KEY_TYPE,
};
use crate::domain::ports::{ResultRow, TripleStoreClient};

use tracing::debug;
use uuid::Uuid;

static HUB_KEY_SEGMENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{1,64}$").expect("valid regex"));

enum EntityBind {
    HubKey { entity_id: String },
    Xid { id_type: String, value: String },
}

struct NormalizedInput {
    entity_bind: EntityBind,
}

pub struct QueryPlanner<T: TripleStoreClient> {
    client: Arc<T>,
    max_related_depth: u32,
}

impl<T: TripleStoreClient> QueryPlanner<T> {
    pub fn new(client: Arc<T>, max_related_depth: u32) -> Self {
        Self {
            client,
            max_related_depth,
        }
    }

    /// Resolve `inputs` to their repositories and, if `related_depth > 0`,
    /// the entities reachable by following shared identifiers out to that
    /// many hops. Invalid inputs are collected across the whole batch
    /// before failing — a single bad hub key does not short-circuit the
    /// others.
    pub async fn query(
        &self,
        inputs: Vec<QueryInput>,
        related_depth: u32,
    ) -> Result<Vec<QueryResult>, QueryError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        // Correlation id for tying this batch's log lines together; not
        // part of the domain model, purely an observability aid.
        let query_id = Uuid::new_v4();
        debug!(%query_id, inputs = inputs.len(), related_depth, "running bulk query");

        let related_depth = related_depth.min(self.max_related_depth);

        let mut normalized = Vec::with_capacity(inputs.len());
        let mut errors = Vec::new();
        for input in &inputs {
            match normalize(input) {
                Ok(n) => normalized.push(n),
                Err(reason) => errors.push(InvalidQueryInput {
                    source_id: Some(input.source_id.clone()),
                    source_id_type: Some(input.source_id_type.clone()),
                    reason,
                }),
            }
        }

        if !errors.is_empty() {
            return Err(QueryError::BadRequest(errors));
        }

        let arms: Vec<String> = normalized
            .iter()
            .map(|n| format_subquery(n, related_depth))
            .collect();

        let mut sparql = String::from(
            "SELECT DISTINCT ?source_id ?source_id_type ?repositories ?relations WHERE { ",
        );
        sparql.push_str(&arms.join(" UNION "));
        sparql.push_str(" } ORDER BY ?source_id ?source_id_type");

        let rows = self.client.run_query(&sparql).await?;
        Ok(assemble_results(&inputs, &normalized, rows))
    }
}

fn normalize(input: &QueryInput) -> Result<NormalizedInput, String> {
    if input.source_id.is_empty() {
        return Err("source_id must not be empty".to_string());
    }
    if input.source_id_type.is_empty() {
        return Err("source_id_type must not be empty".to_string());
    }

    let entity_bind = if input.source_id_type == HUB_KEY_TYPE {
        let entity_id = parse_hub_key(&input.source_id)
            .ok_or_else(|| format!("{:?} is not a valid hub key", input.source_id))?;
        EntityBind::HubKey { entity_id }
    } else {
        EntityBind::Xid {
            id_type: encode(&input.source_id_type),
            value: encode(&input.source_id),
        }
    };

    Ok(NormalizedInput { entity_bind })
}

/// Extracts the bare entity id from `{scheme}://{host}/s{version}/{hub}/{repo_id}/{kind}/{entity_id}`.
///
/// The hub-key grammar itself isn't part of this pack; this is inferred
/// from fixtures in `original_source/tests/unit/models/test_db.py`, which
/// treat non-hex repo/entity segments as invalid.
fn parse_hub_key(source_id: &str) -> Option<String> {
    let url = url::Url::parse(source_id).ok()?;
    let mut segments = url.path_segments()?;
    let version_segment = segments.next()?;
    let _hub = segments.next()?;
    let repo_id = segments.next()?;
    let _kind = segments.next()?;
    let entity_id = segments.next()?;
    if segments.next().is_some() {
        return None;
    }
    if !version_segment.starts_with('s') {
        return None;
    }
    if !HUB_KEY_SEGMENT_PATTERN.is_match(repo_id) || !HUB_KEY_SEGMENT_PATTERN.is_match(entity_id) {
        return None;
    }
    Some(entity_id.to_string())
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().to_string()
}

/// One UNION arm: repositories aggregate, relations aggregate, and the two
/// `BIND`s that echo the input back in the result row.
fn format_subquery(norm: &NormalizedInput, related_depth: u32) -> String {
    let (initial_query, source_id_bind, source_id_type_lit) = match &norm.entity_bind {
        EntityBind::HubKey { entity_id } => (
            format!("BIND ( id:{entity_id} AS ?entity_uri ) ."),
            format!("id:{entity_id}"),
            format!("{HUB_KEY_TYPE:?}"),
        ),
        EntityBind::Xid { id_type, value } => (
            format!("<xid/{id_type}/{value}> ^op:alsoIdentifiedBy ?entity_uri ."),
            format!("{value:?}"),
            format!("{id_type:?}"),
        ),
    };

    let mut arm = String::from("{ ");
    arm.push_str(&repositories_aggregate(&initial_query));
    arm.push(' ');
    arm.push_str(&format_relation_subquery(&initial_query, related_depth));
    arm.push_str(" BIND ( ");
    arm.push_str(&source_id_bind);
    arm.push_str(" AS ?source_id ) . BIND ( ");
    arm.push_str(&source_id_type_lit);
    arm.push_str(" AS ?source_id_type ) . }");
    arm
}

fn repositories_aggregate(initial_query: &str) -> String {
    let mut s = String::from(
        "{ SELECT ?group (CONCAT(\"[\", GROUP_CONCAT(?json;separator=\",\"), \"]\") AS ?repositories) { \
         BIND (\"constant\" AS ?group) . ",
    );
    s.push_str(initial_query);
    s.push_str(
        " ?entity_uri chubindex:repo ?repo_id . \
         BIND (CONCAT(\"{\\\"repository_id\\\":\\\"\", ?repo_id, \"\\\",\\\"entity_id\\\":\\\"\", \
         STRAFTER(STR(?entity_uri), STR(id:)), \"\\\"}\") AS ?json) . \
         } GROUP BY ?group }",
    );
    s
}

/// Builds the union of depth-1..=`max_depth` relation paths, each arm
/// excluding every entity node already visited on that path so the walk
/// can't loop back through a shared identifier.
fn format_relation_subquery(initial_query: &str, max_depth: u32) -> String {
    if max_depth == 0 {
        return "BIND (\"[]\" AS ?relations) .".to_string();
    }

    let mut arms = vec![level_one_arm(initial_query)];
    for hops in 1..max_depth {
        arms.push(level_n_arm(initial_query, hops));
    }

    let mut relquery = String::from("{ ");
    relquery.push_str(&arms.join(" UNION "));
    relquery.push_str(" }");

    outer_relation_aggregate(&relquery)
}

fn level_one_arm(initial_query: &str) -> String {
    let mut s = String::from("{ SELECT ?via_hk ?via_id ?to_hk WHERE { ");
    s.push_str(initial_query);
    s.push_str(
        " BIND (?entity_uri AS ?via_hk) . \
         ?via_hk op:alsoIdentifiedBy ?via_id . \
         ?via_id ^op:alsoIdentifiedBy? ?to_hk . \
         FILTER (?to_hk != ?via_hk) . \
         } }",
    );
    s
}

/// `hops` intermediate entity-to-entity steps before the final hop whose
/// target becomes `?to_hk`. `hops == 1` is the first arm built on top of
/// the direct-neighbor case handled by [`level_one_arm`].
fn level_n_arm(initial_query: &str, hops: u32) -> String {
    let mut body = String::from(initial_query);
    body.push_str(" BIND (?entity_uri AS ?via_hk0) . ");

    for step in 0..hops {
        let next = step + 1;
        let forbidden: Vec<String> = (0..=step).map(|n| format!("?via_hk{n}")).collect();
        body.push_str(&format!(
            "?via_hk{step} op:alsoIdentifiedBy ?via_id{next} . \
             ?via_id{next} ^op:alsoIdentifiedBy ?via_hk{next} . \
             FILTER (?via_hk{next} NOT IN ({forbidden})) . ",
            forbidden = forbidden.join(", "),
        ));
    }

    let forbidden_final: Vec<String> = (0..=hops).map(|n| format!("?via_hk{n}")).collect();
    body.push_str(&format!("BIND (?via_hk{hops} AS ?via_hk) . "));
    body.push_str(&format!(
        "?via_hk op:alsoIdentifiedBy ?via_id . \
         ?via_id ^op:alsoIdentifiedBy ?to_hk . \
         FILTER (?to_hk NOT IN ({forbidden})) . ",
        forbidden = forbidden_final.join(", "),
    ));

    format!("{{ SELECT ?via_hk ?via_id ?to_hk WHERE {{ {body} }} }}")
}

fn outer_relation_aggregate(relquery: &str) -> String {
    let mut s = String::from(
        "{ SELECT ?group (CONCAT(\"[\", GROUP_CONCAT(?json;separator=\",\"), \"]\") AS ?relations) WHERE { \
         BIND (\"constant\" AS ?group) . \
         { SELECT DISTINCT ?to_hk ?to_repo ?via_id ?via_id_id_value ?via_id_id_type ?via_hk WHERE { ",
    );
    s.push_str(relquery);
    s.push_str(
        " OPTIONAL { ?via_id chubindex:id ?via_id_id_value . } \
         OPTIONAL { ?via_id chubindex:id_type ?via_id_id_type . } \
         OPTIONAL { ?to_hk chubindex:repo ?to_repo . } \
         } } \
         BIND (CONCAT(\"{\\\"to\\\": {\\\"entity_id\\\": \\\"\", STRAFTER(STR(?to_hk), STR(id:)), \
         \"\\\", \\\"repository_id\\\": \\\"\", ?to_repo, \
         \"\\\" }, \\\"via\\\": {\\\"source_id\\\" : \\\"\", ?via_id_id_value, \
         \"\\\", \\\"source_id_type\\\": \\\"\", ?via_id_id_type, \
         \"\\\", \\\"entity_id\\\" : \\\"\", STRAFTER(STR(?via_hk), STR(id:)), \"\\\" } }\") AS ?json) \
         } GROUP BY ?group }",
    );
    s
}

/// Decodes result rows and fills in empty entries for inputs the query
/// matched nothing for, preserving the original input order.
fn assemble_results(
    inputs: &[QueryInput],
    normalized: &[NormalizedInput],
    rows: Vec<ResultRow>,
) -> Vec<QueryResult> {
    let mut results = Vec::with_capacity(inputs.len());
    let mut found: BTreeMap<(String, String), ()> = BTreeMap::new();

    for row in rows {
        let raw_source_id = row.get("source_id").cloned().unwrap_or_default();
        let raw_source_id_type = row.get("source_id_type").cloned().unwrap_or_default();

        let (source_id, source_id_type) = if raw_source_id_type == HUB_KEY_TYPE {
            let bare = raw_source_id
                .strip_prefix(ID_NS)
                .unwrap_or(&raw_source_id)
                .to_string();
            (bare, HUB_KEY_TYPE.to_string())
        } else {
            (decode(&raw_source_id), decode(&raw_source_id_type))
        };

        let repositories: Vec<RepositoryRef> = row
            .get("repositories")
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();
        let relations: Vec<Relation> = row
            .get("relations")
            .and_then(|s| serde_json::from_str::<Vec<Relation>>(s).ok())
            .map(|rels| {
                rels.into_iter()
                    .map(|mut rel| {
                        // via.source_id/source_id_type are stored percent-encoded
                        // (see index_store::write_row); reverse that here.
                        rel.via.source_id = decode(&rel.via.source_id);
                        rel.via.source_id_type = decode(&rel.via.source_id_type);
                        rel
                    })
                    .collect()
            })
            .unwrap_or_default();

        found.insert((source_id.clone(), source_id_type.clone()), ());
        results.push(QueryResult {
            source_id,
            source_id_type,
            repositories,
            relations,
        });
    }

    for (input, norm) in inputs.iter().zip(normalized.iter()) {
        let (source_id, source_id_type) = match &norm.entity_bind {
            EntityBind::HubKey { entity_id } => (entity_id.clone(), HUB_KEY_TYPE.to_string()),
            EntityBind::Xid { .. } => (input.source_id.clone(), input.source_id_type.clone()),
        };
        if found.contains_key(&(source_id.clone(), source_id_type.clone())) {
            continue;
        }
        results.push(QueryResult {
            source_id,
            source_id_type,
            repositories: Vec::new(),
            relations: Vec::new(),
        });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::RemoteError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubStore {
        queries: Mutex<Vec<String>>,
        rows: Vec<ResultRow>,
    }

    #[async_trait]
    impl TripleStoreClient for StubStore {
        async fn run_query(&self, sparql: &str) -> Result<Vec<ResultRow>, RemoteError> {
            self.queries.lock().unwrap().push(sparql.to_string());
            Ok(self.rows.clone())
        }
        async fn run_update(&self, _: &str) -> Result<(), RemoteError> {
            Ok(())
        }
        async fn store_turtle(&self, _: &str) -> Result<(), RemoteError> {
            Ok(())
        }
        async fn create_namespace(&self) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    fn row(pairs: &[(&str, &str)]) -> ResultRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn hub_key_input_strips_namespace_prefix_in_result() {
        let store = Arc::new(StubStore {
            rows: vec![row(&[
                ("source_id", &format!("{ID_NS}37cd1397e0814e989fa22da6b15fec60")),
                ("source_id_type", "hub_key"),
                ("repositories", "[]"),
                ("relations", "[]"),
            ])],
            ..Default::default()
        });
        let planner = QueryPlanner::new(store, 5);
        let input = QueryInput {
            source_id: "https://opp.org/s1/hub1/37cd1397e0814e989fa22da6b15fec50/asset/37cd1397e0814e989fa22da6b15fec60".to_string(),
            source_id_type: "hub_key".to_string(),
        };
        let results = planner.query(vec![input], 0).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_id, "37cd1397e0814e989fa22da6b15fec60");
        assert_eq!(results[0].source_id_type, "hub_key");
    }

    #[tokio::test]
    async fn invalid_hub_key_is_rejected_without_querying_store() {
        let store = Arc::new(StubStore::default());
        let planner = QueryPlanner::new(store.clone(), 5);
        let input = QueryInput {
            source_id: "https://opp.org/s1/hub1/invalidrepo/asset/invalidentityid".to_string(),
            source_id_type: "hub_key".to_string(),
        };
        let err = planner.query(vec![input], 0).await.unwrap_err();
        match err {
            QueryError::BadRequest(errs) => assert_eq!(errs.len(), 1),
            other => panic!("expected BadRequest, got {other:?}"),
        }
        assert!(store.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_inputs_are_collected_across_the_whole_batch() {
        let store = Arc::new(StubStore::default());
        let planner = QueryPlanner::new(store, 5);
        let inputs = vec![
            QueryInput {
                source_id: String::new(),
                source_id_type: "doi".to_string(),
            },
            QueryInput {
                source_id: "x".to_string(),
                source_id_type: String::new(),
            },
        ];
        let err = planner.query(inputs, 0).await.unwrap_err();
        match err {
            QueryError::BadRequest(errs) => assert_eq!(errs.len(), 2),
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn general_input_round_trips_through_percent_encoding() {
        let encoded_id = encode("doi:10.1/ab cd");
        let encoded_type = encode("doi type");
        let store = Arc::new(StubStore {
            rows: vec![row(&[
                ("source_id", &encoded_id),
                ("source_id_type", &encoded_type),
                ("repositories", "[]"),
                ("relations", "[]"),
            ])],
            ..Default::default()
        });
        let planner = QueryPlanner::new(store, 5);
        let input = QueryInput {
            source_id: "doi:10.1/ab cd".to_string(),
            source_id_type: "doi type".to_string(),
        };
        let results = planner.query(vec![input], 0).await.unwrap();
        assert_eq!(results[0].source_id, "doi:10.1/ab cd");
        assert_eq!(results[0].source_id_type, "doi type");
    }

    #[tokio::test]
    async fn relation_via_fields_are_percent_decoded() {
        let relations_json = format!(
            r#"[{{"to":{{"entity_id":"ab12","repository_id":"repo-a"}},"via":{{"source_id":"{}","source_id_type":"{}","entity_id":"cd34"}}}}]"#,
            encode("doi:10.1/ab cd"),
            encode("doi type"),
        );
        let store = Arc::new(StubStore {
            rows: vec![row(&[
                ("source_id", "10.1"),
                ("source_id_type", "doi"),
                ("repositories", "[]"),
                ("relations", &relations_json),
            ])],
            ..Default::default()
        });
        let planner = QueryPlanner::new(store, 5);
        let input = QueryInput {
            source_id: "10.1".to_string(),
            source_id_type: "doi".to_string(),
        };
        let results = planner.query(vec![input], 1).await.unwrap();
        assert_eq!(results[0].relations.len(), 1);
        assert_eq!(results[0].relations[0].via.source_id, "doi:10.1/ab cd");
        assert_eq!(results[0].relations[0].via.source_id_type, "doi type");
    }

    #[tokio::test]
    async fn unmatched_inputs_are_synthesized_as_empty_results() {
        let store = Arc::new(StubStore::default());
        let planner = QueryPlanner::new(store, 5);
        let inputs = vec![QueryInput {
            source_id: "doi:10.1".to_string(),
            source_id_type: "doi".to_string(),
        }];
        let results = planner.query(inputs, 0).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].repositories.is_empty());
        assert!(results[0].relations.is_empty());
    }

    #[tokio::test]
    async fn related_depth_is_clamped_to_configured_maximum() {
        let store = Arc::new(StubStore::default());
        let planner = QueryPlanner::new(store.clone(), 2);
        let input = QueryInput {
            source_id: "doi:10.1".to_string(),
            source_id_type: "doi".to_string(),
        };
        planner.query(vec![input], 100).await.unwrap();
        let queries = store.queries.lock().unwrap();
        let sparql = &queries[0];
        // one direct-neighbor arm plus one extra hop for max depth 2, never more.
        assert_eq!(sparql.matches("?via_hk2").count(), 0);
        assert!(sparql.contains("?via_hk1"));
    }

    #[tokio::test]
    async fn depth_zero_skips_relation_traversal_entirely() {
        let store = Arc::new(StubStore::default());
        let planner = QueryPlanner::new(store.clone(), 5);
        let input = QueryInput {
            source_id: "doi:10.1".to_string(),
            source_id_type: "doi".to_string(),
        };
        planner.query(vec![input], 0).await.unwrap();
        let queries = store.queries.lock().unwrap();
        assert!(queries[0].contains("BIND (\"[]\" AS ?relations)"));
    }
}
