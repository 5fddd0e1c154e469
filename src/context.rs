//! Registry of requests with a current-request selector.
//!
//! A `Context` is passed explicitly to whatever builds specifications, so
//! several independent registries can coexist in one process. It provides no
//! locking; share it across threads behind your own synchronisation.

use crate::blocks::{BlockOptions, NodeId};
use crate::config::EngineConfig;
use crate::error::SpecError;
use crate::request::Request;
use crate::value::Value;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct Context {
    requests: HashMap<String, Request>,
    current: Option<String>,
    config: EngineConfig,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Context {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a request and make it current.
    pub fn init(&mut self, name: &str) -> Result<&mut Request, SpecError> {
        if self.requests.contains_key(name) {
            return Err(SpecError::DuplicateName(name.to_string()));
        }
        let req = Request::with_config(name, self.config.clone());
        self.current = Some(name.to_string());
        Ok(self.requests.entry(name.to_string()).or_insert(req))
    }

    /// Make an existing request current.
    pub fn switch(&mut self, name: &str) -> Result<&mut Request, SpecError> {
        let req = self
            .requests
            .get_mut(name)
            .ok_or_else(|| SpecError::NotFound(name.to_string()))?;
        debug!(request = name, "switched current request");
        self.current = Some(name.to_string());
        Ok(req)
    }

    pub fn get(&self, name: &str) -> Option<&Request> {
        self.requests.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Request> {
        self.requests.get_mut(name)
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Result<&Request, SpecError> {
        self.current
            .as_ref()
            .and_then(|name| self.requests.get(name))
            .ok_or(SpecError::NoCurrentRequest)
    }

    pub fn current_mut(&mut self) -> Result<&mut Request, SpecError> {
        match &self.current {
            Some(name) => self.requests.get_mut(name).ok_or(SpecError::NoCurrentRequest),
            None => Err(SpecError::NoCurrentRequest),
        }
    }

    /// Request names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.requests.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn open_block(&mut self, name: &str, opts: BlockOptions) -> Result<NodeId, SpecError> {
        self.current_mut()?.open_block(name, opts)
    }

    pub fn close_block(&mut self) -> Result<NodeId, SpecError> {
        self.current_mut()?.close_block()
    }

    pub fn mutate(&mut self) -> Result<bool, SpecError> {
        Ok(self.current_mut()?.mutate())
    }

    pub fn num_mutations(&self) -> Result<u64, SpecError> {
        Ok(self.current()?.num_mutations())
    }

    pub fn render(&self) -> Result<Vec<u8>, SpecError> {
        Ok(self.current()?.render())
    }

    pub fn update(&mut self, name: &str, value: Value) -> Result<(), SpecError> {
        self.current_mut()?.update(name, value)
    }
}
