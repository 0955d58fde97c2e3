//! The remote table store behind a trait seam.
//!
//! [`RemoteStore`] is the seam the sync services and response operations are
//! generic over; [`HttpRemote`] is the production implementation against a
//! PostgREST-style REST API with row-level access control and two privileged
//! RPC functions for template projects.

use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};
use url::Url;

use crate::config::RemoteConfig;

use super::types::{ResponseAddress, ResponseRow};

/// Remote structured-record store.
///
/// All methods except the auth probe are fallible; callers absorb errors into
/// defaults or a `false` save outcome, so implementations should not retry.
#[allow(async_fn_in_trait)]
pub trait RemoteStore: Send + Sync {
  /// Whether a caller is currently signed in. Not an error when false;
  /// remote traffic is simply skipped.
  fn is_authenticated(&self) -> bool;

  /// Most recent record at an address, scoped to the signed-in user's rows.
  async fn fetch_latest(&self, addr: &ResponseAddress) -> Result<Option<ResponseRow>>;

  /// Upsert keyed on the 4-tuple address.
  async fn upsert_response(&self, addr: &ResponseAddress, response: &Value) -> Result<()>;

  /// Whether any record exists at an address. Fallback path when upsert is
  /// unsupported by the deployment.
  async fn response_exists(&self, addr: &ResponseAddress) -> Result<bool>;

  async fn insert_response(&self, addr: &ResponseAddress, response: &Value) -> Result<()>;

  async fn update_response(&self, addr: &ResponseAddress, response: &Value) -> Result<()>;

  /// Privileged read across user boundaries, for template projects.
  async fn rpc_fetch(&self, addr: &ResponseAddress) -> Result<Option<Value>>;

  /// Privileged write across user boundaries, for template projects.
  async fn rpc_insert(&self, addr: &ResponseAddress, response: &Value) -> Result<()>;
}

const TABLE: &str = "activity_responses";
const RPC_FETCH: &str = "fetch_activity_response";
const RPC_INSERT: &str = "insert_activity_response";

/// REST client for the hosted table store.
#[derive(Clone)]
pub struct HttpRemote {
  http: reqwest::Client,
  base: Url,
  api_key: String,
  access_token: Option<String>,
}

impl HttpRemote {
  /// Build a client from config; the access token comes from the
  /// environment and may be absent (anonymous session).
  pub fn new(config: &RemoteConfig, access_token: Option<String>) -> Result<Self> {
    let base = Url::parse(&config.url)
      .map_err(|e| eyre!("Invalid remote URL {}: {e}", config.url))?;

    Ok(Self {
      http: reqwest::Client::new(),
      base,
      api_key: config.api_key.clone(),
      access_token,
    })
  }

  fn table_url(&self) -> Result<Url> {
    self
      .base
      .join(&format!("rest/v1/{TABLE}"))
      .map_err(|e| eyre!("Failed to build table URL: {e}"))
  }

  fn rpc_url(&self, function: &str) -> Result<Url> {
    self
      .base
      .join(&format!("rest/v1/rpc/{function}"))
      .map_err(|e| eyre!("Failed to build RPC URL: {e}"))
  }

  fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    let req = req.header("apikey", &self.api_key);
    match &self.access_token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  fn eq_filters(addr: &ResponseAddress) -> [(&'static str, String); 4] {
    [
      ("project_id", format!("eq.{}", addr.project_id)),
      ("phase_id", format!("eq.{}", addr.phase_id)),
      ("step_id", format!("eq.{}", addr.step_id)),
      ("activity_id", format!("eq.{}", addr.activity_id)),
    ]
  }

  fn record_body(addr: &ResponseAddress, response: &Value) -> Value {
    json!({
      "project_id": addr.project_id,
      "phase_id": addr.phase_id,
      "step_id": addr.step_id,
      "activity_id": addr.activity_id,
      "response": response,
    })
  }

  fn rpc_args(addr: &ResponseAddress) -> Value {
    json!({
      "p_project_id": addr.project_id,
      "p_phase_id": addr.phase_id,
      "p_step_id": addr.step_id,
      "p_activity_id": addr.activity_id,
    })
  }
}

impl RemoteStore for HttpRemote {
  fn is_authenticated(&self) -> bool {
    self.access_token.is_some()
  }

  async fn fetch_latest(&self, addr: &ResponseAddress) -> Result<Option<ResponseRow>> {
    let req = self
      .http
      .get(self.table_url()?)
      .query(&Self::eq_filters(addr))
      .query(&[
        ("select", "response,updated_at"),
        ("order", "updated_at.desc"),
        ("limit", "1"),
      ]);

    let rows: Vec<ResponseRow> = self
      .authorize(req)
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch response: {e}"))?
      .error_for_status()
      .map_err(|e| eyre!("Fetch rejected: {e}"))?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse response rows: {e}"))?;

    Ok(rows.into_iter().next())
  }

  async fn upsert_response(&self, addr: &ResponseAddress, response: &Value) -> Result<()> {
    let req = self
      .http
      .post(self.table_url()?)
      .query(&[("on_conflict", "project_id,phase_id,step_id,activity_id")])
      .header("Prefer", "resolution=merge-duplicates,return=minimal")
      .json(&Self::record_body(addr, response));

    self
      .authorize(req)
      .send()
      .await
      .map_err(|e| eyre!("Failed to upsert response: {e}"))?
      .error_for_status()
      .map_err(|e| eyre!("Upsert rejected: {e}"))?;

    Ok(())
  }

  async fn response_exists(&self, addr: &ResponseAddress) -> Result<bool> {
    let req = self
      .http
      .get(self.table_url()?)
      .query(&Self::eq_filters(addr))
      .query(&[("select", "project_id"), ("limit", "1")]);

    let rows: Vec<Value> = self
      .authorize(req)
      .send()
      .await
      .map_err(|e| eyre!("Failed to check existence: {e}"))?
      .error_for_status()
      .map_err(|e| eyre!("Existence check rejected: {e}"))?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse existence rows: {e}"))?;

    Ok(!rows.is_empty())
  }

  async fn insert_response(&self, addr: &ResponseAddress, response: &Value) -> Result<()> {
    let req = self
      .http
      .post(self.table_url()?)
      .header("Prefer", "return=minimal")
      .json(&Self::record_body(addr, response));

    self
      .authorize(req)
      .send()
      .await
      .map_err(|e| eyre!("Failed to insert response: {e}"))?
      .error_for_status()
      .map_err(|e| eyre!("Insert rejected: {e}"))?;

    Ok(())
  }

  async fn update_response(&self, addr: &ResponseAddress, response: &Value) -> Result<()> {
    let req = self
      .http
      .patch(self.table_url()?)
      .query(&Self::eq_filters(addr))
      .header("Prefer", "return=minimal")
      .json(&json!({ "response": response }));

    self
      .authorize(req)
      .send()
      .await
      .map_err(|e| eyre!("Failed to update response: {e}"))?
      .error_for_status()
      .map_err(|e| eyre!("Update rejected: {e}"))?;

    Ok(())
  }

  async fn rpc_fetch(&self, addr: &ResponseAddress) -> Result<Option<Value>> {
    let req = self
      .http
      .post(self.rpc_url(RPC_FETCH)?)
      .json(&Self::rpc_args(addr));

    let value: Value = self
      .authorize(req)
      .send()
      .await
      .map_err(|e| eyre!("RPC fetch failed: {e}"))?
      .error_for_status()
      .map_err(|e| eyre!("RPC fetch rejected: {e}"))?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse RPC result: {e}"))?;

    Ok(match value {
      Value::Null => None,
      other => Some(other),
    })
  }

  async fn rpc_insert(&self, addr: &ResponseAddress, response: &Value) -> Result<()> {
    let mut args = Self::rpc_args(addr);
    if let Some(map) = args.as_object_mut() {
      map.insert("p_response".to_string(), response.clone());
    }

    let req = self.http.post(self.rpc_url(RPC_INSERT)?).json(&args);

    self
      .authorize(req)
      .send()
      .await
      .map_err(|e| eyre!("RPC insert failed: {e}"))?
      .error_for_status()
      .map_err(|e| eyre!("RPC insert rejected: {e}"))?;

    Ok(())
  }
}
