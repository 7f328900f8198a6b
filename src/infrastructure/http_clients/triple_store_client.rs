//! Triple store HTTP client: SPARQL SELECT/UPDATE against the store's query
//! endpoint (`Accept: text/csv` per the backend's CSV result contract),
//! Turtle ingest, and namespace bootstrap.

use async_trait::async_trait;
use reqwest::Client;

use crate::domain::errors::RemoteError;
use crate::domain::models::namespace::sparql_prefixes;
use crate::domain::ports::{ResultRow, TripleStoreClient};

pub struct HttpTripleStoreClient {
    client: Client,
    db_url: String,
    namespace_admin_url: String,
    namespace: String,
}

impl HttpTripleStoreClient {
    pub fn new(
        client: Client,
        db_url: impl Into<String>,
        namespace_admin_url: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            client,
            db_url: db_url.into(),
            namespace_admin_url: namespace_admin_url.into(),
            namespace: namespace.into(),
        }
    }

    fn namespace_properties_xml(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n\
             <properties>\n\
             <entry key=\"com.bigdata.rdf.sail.namespace\">{}</entry>\n\
             <entry key=\"com.bigdata.rdf.store.AbstractTripleStore.quads\">false</entry>\n\
             <entry key=\"com.bigdata.rdf.store.AbstractTripleStore.statementIdentifiers\">false</entry>\n\
             </properties>\n",
            self.namespace,
        )
    }
}

#[async_trait]
impl TripleStoreClient for HttpTripleStoreClient {
    async fn run_query(&self, sparql: &str) -> Result<Vec<ResultRow>, RemoteError> {
        let query = format!("{}{sparql}", sparql_prefixes());
        let response = self
            .client
            .post(&self.db_url)
            .header("Accept", "text/csv")
            .form(&[("query", &query)])
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        parse_csv(&body)
    }

    async fn run_update(&self, sparql: &str) -> Result<(), RemoteError> {
        let update = format!("{}{sparql}", sparql_prefixes());
        let response = self
            .client
            .post(&self.db_url)
            .form(&[("update", &update)])
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn store_turtle(&self, turtle: &str) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(&self.db_url)
            .header("Content-Type", "text/turtle")
            .body(turtle.to_string())
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn create_namespace(&self) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(&self.namespace_admin_url)
            .header("Content-Type", "application/xml")
            .body(self.namespace_properties_xml())
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status { status, body })
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<ResultRow>, RemoteError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|e| RemoteError::Decode(e.to_string()))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| RemoteError::Decode(e.to_string()))?;
        let row: ResultRow = headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}
