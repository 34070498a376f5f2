//! Livy Execution Engine
//!
//! Spark is reached through the Apache Livy REST API: one PySpark session per
//! process, one statement per sheet read. The statement prints the table as a
//! single JSON line which is turned into a `TabularResult`.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::execution::engine::ComputeEngine;
use crate::execution::sheet::SheetSelector;
use crate::table::{CellValue, TabularResult};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EXCEL_READER: &str = "spark.read.format(\"com.crealytics.spark.excel\")\
.option(\"header\", \"true\")\
.option(\"inferSchema\", \"true\")";

// Livy REST API:
//   POST   /sessions                      {kind, name, conf}
//   GET    /sessions/{id}                 -> {id, state}
//   POST   /sessions/{id}/statements      {code, kind}
//   GET    /sessions/{id}/statements/{s}  -> {id, state, output}
//   DELETE /sessions/{id}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    kind: &'a str,
    name: String,
    conf: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: u64,
    state: String,
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    code: &'a str,
    kind: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    id: u64,
    state: String,
    output: Option<StatementOutput>,
}

#[derive(Debug, Deserialize)]
struct StatementOutput {
    status: String,
    data: Option<serde_json::Map<String, Value>>,
    ename: Option<String>,
    evalue: Option<String>,
}

/// What the read statement prints
#[derive(Debug, Deserialize)]
struct ReadPayload {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// An open PySpark session on a Livy server
pub struct LivySession {
    client: Client,
    base_url: String,
    session_id: u64,
    poll_interval: Duration,
    closed: bool,
}

impl LivySession {
    /// Create a session and wait until it can accept statements.
    pub async fn open(config: &PipelineConfig) -> Result<Self> {
        let engine = &config.engine;
        let mut builder = Client::builder();
        if let Some(secs) = engine.http_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;
        let base_url = engine.livy_url.trim_end_matches('/').to_string();

        let mut conf = engine.spark_conf.clone();
        conf.insert("spark.jars.packages".to_string(), engine.excel_package.clone());
        conf.insert("spark.hadoop.fs.defaultFS".to_string(), config.filesystem_uri.clone());

        let request = CreateSessionRequest {
            kind: "pyspark",
            name: format!("{}-{}", engine.app_name, Uuid::new_v4().simple()),
            conf,
        };

        info!("Opening Spark session on {}", base_url);
        let response = client
            .post(format!("{}/sessions", base_url))
            .json(&request)
            .send()
            .await?;
        let created: SessionResponse = ensure_success(response).await?.json().await?;

        let session = Self {
            client,
            base_url,
            session_id: created.id,
            poll_interval: engine.poll_interval(),
            closed: false,
        };
        session.wait_until_idle().await?;
        info!("✅ Spark session {} is ready", session.session_id);
        Ok(session)
    }

    /// Delete the session. Dropping without closing spawns a best-effort delete.
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        let response = self.client.delete(self.session_url()).send().await?;
        if response.status() != StatusCode::NOT_FOUND {
            ensure_success(response).await?;
        }
        info!("Spark session {} closed", self.session_id);
        Ok(())
    }

    fn session_url(&self) -> String {
        format!("{}/sessions/{}", self.base_url, self.session_id)
    }

    async fn wait_until_idle(&self) -> Result<()> {
        loop {
            let response = self.client.get(self.session_url()).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(PipelineError::EngineUnavailable(format!(
                    "Livy session {} no longer exists",
                    self.session_id
                )));
            }
            let session: SessionResponse = ensure_success(response).await?.json().await?;
            match session.state.as_str() {
                "idle" => return Ok(()),
                "not_started" | "starting" | "busy" => {
                    debug!("Session {} is {}", session.id, session.state);
                    tokio::time::sleep(self.poll_interval).await;
                }
                other => {
                    return Err(PipelineError::EngineUnavailable(format!(
                        "Livy session {} is {}",
                        session.id, other
                    )))
                }
            }
        }
    }

    async fn run_statement(&self, code: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/statements", self.session_url()))
            .json(&StatementRequest { code, kind: "pyspark" })
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(PipelineError::EngineUnavailable(format!(
                "Livy session {} no longer exists",
                self.session_id
            )));
        }
        let mut statement: StatementResponse = ensure_success(response).await?.json().await?;
        let statement_url = format!("{}/statements/{}", self.session_url(), statement.id);

        loop {
            match statement.state.as_str() {
                "available" => break,
                "waiting" | "running" => {
                    tokio::time::sleep(self.poll_interval).await;
                    let response = self.client.get(&statement_url).send().await?;
                    statement = ensure_success(response).await?.json().await?;
                }
                other => {
                    return Err(PipelineError::Engine(format!(
                        "statement {} ended in state {}",
                        statement.id, other
                    )))
                }
            }
        }

        let output = statement.output.ok_or_else(|| {
            PipelineError::Engine(format!("statement {} returned no output", statement.id))
        })?;
        if output.status != "ok" {
            return Err(PipelineError::Engine(format!(
                "{}: {}",
                output.ename.unwrap_or_else(|| "Error".to_string()),
                output.evalue.unwrap_or_default()
            )));
        }

        output
            .data
            .as_ref()
            .and_then(|data| data.get("text/plain"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::Engine("statement printed no text".to_string()))
    }
}

#[async_trait]
impl ComputeEngine for LivySession {
    fn name(&self) -> &'static str {
        "livy"
    }

    async fn submit_read(&self, uri: &str, selector: &SheetSelector) -> Result<TabularResult> {
        let code = read_statement(uri, selector);
        debug!("Submitting statement:\n{}", code);
        let text = self.run_statement(&code).await?;
        table_from_payload(&text)
    }
}

impl Drop for LivySession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!("Spark session {} dropped without close, deleting it", self.session_id);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let client = self.client.clone();
            let url = self.session_url();
            handle.spawn(async move {
                if let Err(e) = client.delete(&url).send().await {
                    warn!("Failed to delete {}: {}", url, e);
                }
            });
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(PipelineError::EngineUnavailable(format!("Livy returned {}: {}", status, body)))
    } else {
        Err(PipelineError::Http(format!("Livy returned {}: {}", status, body)))
    }
}

/// PySpark code that reads one sheet and prints `{columns, rows}` as one JSON line.
pub fn read_statement(uri: &str, selector: &SheetSelector) -> String {
    let load = match selector {
        SheetSelector::ByName(name) => format!(
            "df = {}.option(\"dataAddress\", {}).load({})",
            EXCEL_READER,
            py_str(&format!("'{}'!A1", name.replace('\'', "''"))),
            py_str(uri)
        ),
        SheetSelector::ByIndex(index) => format!(
            "import pyspark.pandas as ps\ndf = ps.read_excel({}, sheet_name={}).to_spark()",
            py_str(uri),
            index
        ),
        SheetSelector::Default => format!("df = {}.load({})", EXCEL_READER, py_str(uri)),
    };

    format!(
        "import json\n\
         {}\n\
         rows = [[None if isinstance(v, float) and v != v else v for v in r] for r in df.collect()]\n\
         print(json.dumps({{\"columns\": df.columns, \"rows\": rows}}, default=str, ensure_ascii=False))",
        load
    )
}

/// JSON string literal, which Python also accepts
fn py_str(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Parse the line printed by `read_statement`.
pub fn table_from_payload(text: &str) -> Result<TabularResult> {
    let line = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or_else(|| PipelineError::Engine("empty statement output".to_string()))?;
    let payload: ReadPayload = serde_json::from_str(line)?;

    let rows = payload
        .rows
        .into_iter()
        .map(|row| row.into_iter().map(json_cell).collect())
        .collect();
    TabularResult::from_rows(payload.columns, rows)
}

fn json_cell(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Bool(b) => CellValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) if !n.is_f64() => CellValue::Int(i),
            _ => n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Empty),
        },
        Value::String(s) if s.trim().is_empty() => CellValue::Empty,
        Value::String(s) => CellValue::Text(s),
        other => CellValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_per_selector() {
        let uri = "hdfs://localhost:9000/manufacture_data/分省年度数据-GDP.xls";

        let named = read_statement(uri, &SheetSelector::ByName("Sheet 1".to_string()));
        assert!(named.contains(r#".option("dataAddress", "'Sheet 1'!A1")"#));
        assert!(named.contains(r#".load("hdfs://localhost:9000/manufacture_data/分省年度数据-GDP.xls")"#));

        let quoted = read_statement(uri, &SheetSelector::ByName("Bob's \"data\"".to_string()));
        assert!(quoted.contains(r#""'Bob''s \"data\"'!A1""#));

        let indexed = read_statement(uri, &SheetSelector::ByIndex(2));
        assert!(indexed.contains("sheet_name=2"));
        assert!(!indexed.contains("dataAddress"));

        let default = read_statement(uri, &SheetSelector::Default);
        assert!(!default.contains("dataAddress"));
        assert!(default.trim_end().ends_with("ensure_ascii=False))"));
    }

    #[test]
    fn test_payload_to_table() {
        let text = "WARN some spark noise\n\
                    {\"columns\": [\"地区\", \"2021年\"], \"rows\": [[\"北京\", 40269.6], [\"上海\", null]]}\n";
        let table = table_from_payload(text).unwrap();
        assert_eq!(table.columns(), &["地区", "2021年"]);
        assert_eq!(table.row_count(), 2);
        let values = table.frame().column("2021年").unwrap().f64().unwrap().clone();
        assert_eq!(values.get(0), Some(40269.6));
        assert_eq!(values.get(1), None);
    }

    #[test]
    fn test_json_numbers_keep_integer_kind() {
        assert_eq!(json_cell(serde_json::json!(3)), CellValue::Int(3));
        assert_eq!(json_cell(serde_json::json!(3.0)), CellValue::Float(3.0));
        assert_eq!(json_cell(serde_json::json!("")), CellValue::Empty);
    }

    #[test]
    fn test_bad_payload_is_an_error() {
        assert!(table_from_payload("").is_err());
        assert!(table_from_payload("Traceback (most recent call last):").is_err());
    }
}
