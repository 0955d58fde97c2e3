//! In-memory [`RemoteStore`] for tests: a keyed record map plus switches for
//! auth state and failure injection, and a log of fetched addresses so tests
//! can assert which locations were queried.

use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::client::RemoteStore;
use super::types::{ResponseAddress, ResponseRow};

#[derive(Default)]
pub struct FakeRemote {
  authenticated: AtomicBool,
  fail_fetches: AtomicBool,
  fail_saves: AtomicBool,
  upsert_unsupported: AtomicBool,
  records: Mutex<HashMap<ResponseAddress, Value>>,
  fetch_log: Mutex<Vec<ResponseAddress>>,
  rpc_log: Mutex<Vec<ResponseAddress>>,
  save_log: Mutex<Vec<ResponseAddress>>,
}

impl FakeRemote {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn signed_in() -> Self {
    let fake = Self::default();
    fake.set_authenticated(true);
    fake
  }

  pub fn set_authenticated(&self, yes: bool) {
    self.authenticated.store(yes, Ordering::SeqCst);
  }

  pub fn set_fail_fetches(&self, yes: bool) {
    self.fail_fetches.store(yes, Ordering::SeqCst);
  }

  pub fn set_fail_saves(&self, yes: bool) {
    self.fail_saves.store(yes, Ordering::SeqCst);
  }

  pub fn set_upsert_unsupported(&self, yes: bool) {
    self.upsert_unsupported.store(yes, Ordering::SeqCst);
  }

  pub fn put(&self, addr: ResponseAddress, value: Value) {
    self.records.lock().unwrap().insert(addr, value);
  }

  fn record_save(&self, addr: &ResponseAddress, value: &Value) {
    self.save_log.lock().unwrap().push(addr.clone());
    self.put(addr.clone(), value.clone());
  }

  pub fn saves_of(&self, addr: &ResponseAddress) -> usize {
    self
      .save_log
      .lock()
      .unwrap()
      .iter()
      .filter(|a| *a == addr)
      .count()
  }

  pub fn get(&self, addr: &ResponseAddress) -> Option<Value> {
    self.records.lock().unwrap().get(addr).cloned()
  }

  pub fn fetches_of(&self, addr: &ResponseAddress) -> usize {
    self
      .fetch_log
      .lock()
      .unwrap()
      .iter()
      .filter(|a| *a == addr)
      .count()
  }

  pub fn rpc_fetches_of(&self, addr: &ResponseAddress) -> usize {
    self
      .rpc_log
      .lock()
      .unwrap()
      .iter()
      .filter(|a| *a == addr)
      .count()
  }

  fn check_saves(&self) -> Result<()> {
    if self.fail_saves.load(Ordering::SeqCst) {
      Err(eyre!("save failure injected"))
    } else {
      Ok(())
    }
  }
}

impl RemoteStore for FakeRemote {
  fn is_authenticated(&self) -> bool {
    self.authenticated.load(Ordering::SeqCst)
  }

  async fn fetch_latest(&self, addr: &ResponseAddress) -> Result<Option<ResponseRow>> {
    self.fetch_log.lock().unwrap().push(addr.clone());
    if self.fail_fetches.load(Ordering::SeqCst) {
      return Err(eyre!("fetch failure injected"));
    }
    Ok(self.get(addr).map(|response| ResponseRow {
      response,
      updated_at: None,
    }))
  }

  async fn upsert_response(&self, addr: &ResponseAddress, response: &Value) -> Result<()> {
    self.check_saves()?;
    if self.upsert_unsupported.load(Ordering::SeqCst) {
      return Err(eyre!("upsert unsupported"));
    }
    self.record_save(addr, response);
    Ok(())
  }

  async fn response_exists(&self, addr: &ResponseAddress) -> Result<bool> {
    Ok(self.records.lock().unwrap().contains_key(addr))
  }

  async fn insert_response(&self, addr: &ResponseAddress, response: &Value) -> Result<()> {
    self.check_saves()?;
    self.record_save(addr, response);
    Ok(())
  }

  async fn update_response(&self, addr: &ResponseAddress, response: &Value) -> Result<()> {
    self.check_saves()?;
    self.record_save(addr, response);
    Ok(())
  }

  async fn rpc_fetch(&self, addr: &ResponseAddress) -> Result<Option<Value>> {
    self.rpc_log.lock().unwrap().push(addr.clone());
    Ok(self.get(addr))
  }

  async fn rpc_insert(&self, addr: &ResponseAddress, response: &Value) -> Result<()> {
    self.check_saves()?;
    self.record_save(addr, response);
    Ok(())
  }
}
