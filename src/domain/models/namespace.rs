//! RDF namespace constants shared by the index store (Turtle writes)
//! and the query planner (SPARQL reads).
//!
//! The `id:` mapping is pinned to `http://openpermissions.org/ns/id/`
//! because the query planner's hub-key post-processing strips this exact
//! string from `STRAFTER` results.

pub const CHUBINDEX_NS: &str = "http://chubindex.org/ns/chubindex/1.0/";
pub const OP_NS: &str = "http://chubindex.org/ns/op/1.0/";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";
pub const ID_NS: &str = "http://openpermissions.org/ns/id/";

/// `PREFIX` declarations prepended to every SPARQL query/update sent to the
/// triple store (mirrors the original's `SPARQL_PREFIXES`).
pub fn sparql_prefixes() -> String {
    format!(
        "PREFIX chubindex: <{CHUBINDEX_NS}>\nPREFIX op: <{OP_NS}>\nPREFIX xsd: <{XSD_NS}>\nPREFIX id: <{ID_NS}>\n"
    )
}

/// `@prefix` declarations prepended to every Turtle document submitted for
/// ingest (mirrors the original's `TURTLE_PREFIXES`).
pub fn turtle_prefixes() -> String {
    format!(
        "@prefix chubindex: <{CHUBINDEX_NS}> .\n@prefix op: <{OP_NS}> .\n@prefix xsd: <{XSD_NS}> .\n@prefix id: <{ID_NS}> .\n\n"
    )
}
