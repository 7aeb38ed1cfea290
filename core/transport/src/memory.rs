//! In-memory transport for testing.
//!
//! Emulates the server side of the sync protocol: transport-hash
//! authentication, hash-based skip on fetch, tombstone application on
//! push, and atomic password rotation. Supports one-shot failure
//! injection for exercising the engine's failure semantics.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::transport::SyncTransport;
use crate::wire::{
    CredentialsPush, FetchRequest, FetchResponse, PushRequest, RemoteStatus, RotateRequest,
    WireAnnotation, WireDocument,
};
use inkvault_common::{Error, Result};

/// A failure the next call will report.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Network outage: `TransportUnavailable`.
    Outage,
    /// Server backoff: `RateLimited` with the given delay.
    RateLimited(u64),
}

#[derive(Default)]
struct Account {
    transport_hash: String,
    transport_salt: Option<String>,
    encryption_salt: Option<String>,
    documents: BTreeMap<String, WireDocument>,
    documents_hash: Option<String>,
    annotations: BTreeMap<String, WireAnnotation>,
    annotations_hash: Option<String>,
    credentials: Option<CredentialsPush>,
    profile: Option<String>,
}

/// In-memory transport emulating a sync server.
///
/// All state is stored in memory and lost on drop.
#[derive(Default)]
pub struct MemoryTransport {
    account: Mutex<Option<Account>>,
    fault: Mutex<Option<Fault>>,
    pushes: Mutex<Vec<PushRequest>>,
}

impl MemoryTransport {
    /// Create a transport with no account.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call fail with a network outage.
    pub fn inject_outage(&self) {
        *self.fault.lock().unwrap() = Some(Fault::Outage);
    }

    /// Make the next call fail with a rate limit.
    pub fn inject_rate_limit(&self, retry_after_secs: u64) {
        *self.fault.lock().unwrap() = Some(Fault::RateLimited(retry_after_secs));
    }

    /// Every push request received, in order. For test assertions.
    pub fn pushes(&self) -> Vec<PushRequest> {
        self.pushes.lock().unwrap().clone()
    }

    /// Replace a stored document envelope with arbitrary bytes. For
    /// tests exercising per-item decryption failures.
    pub fn tamper_document(&self, id: &str, envelope: &str) {
        let mut account = self.account.lock().unwrap();
        if let Some(account) = account.as_mut() {
            if let Some(doc) = account.documents.get_mut(id) {
                doc.envelope = Some(envelope.to_string());
                doc.plain = None;
            }
        }
    }

    /// The transport hash the server currently accepts. For test
    /// assertions around rotation.
    pub fn registered_transport_hash(&self) -> Option<String> {
        self.account
            .lock()
            .unwrap()
            .as_ref()
            .map(|a| a.transport_hash.clone())
    }

    /// Number of documents the server holds.
    pub fn document_count(&self) -> usize {
        self.account
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0, |a| a.documents.len())
    }

    fn take_fault(&self) -> Result<()> {
        match self.fault.lock().unwrap().take() {
            Some(Fault::Outage) => Err(Error::TransportUnavailable(
                "injected outage".to_string(),
            )),
            Some(Fault::RateLimited(retry_after_secs)) => {
                Err(Error::RateLimited { retry_after_secs })
            }
            None => Ok(()),
        }
    }
}

fn authenticate(account: &Account, transport_hash: &str) -> Result<()> {
    if account.transport_hash != transport_hash {
        return Err(Error::AuthRejected);
    }
    Ok(())
}

#[async_trait]
impl SyncTransport for MemoryTransport {
    async fn status(&self) -> Result<RemoteStatus> {
        self.take_fault()?;
        let account = self.account.lock().unwrap();

        Ok(match account.as_ref() {
            Some(account) => RemoteStatus {
                exists: true,
                documents_hash: account.documents_hash.clone(),
                annotations_hash: account.annotations_hash.clone(),
                credentials_hash: account.credentials.as_ref().map(|c| c.content_hash.clone()),
                encryption_salt: account.encryption_salt.clone(),
                transport_salt: account.transport_salt.clone(),
            },
            None => RemoteStatus {
                exists: false,
                documents_hash: None,
                annotations_hash: None,
                credentials_hash: None,
                encryption_salt: None,
                transport_salt: None,
            },
        })
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        self.take_fault()?;
        let account = self.account.lock().unwrap();
        let account = account.as_ref().ok_or(Error::AuthRejected)?;
        authenticate(account, &request.transport_hash)?;

        let mut response = FetchResponse::default();

        if request.documents_hash == account.documents_hash {
            response.documents_skipped = true;
        } else {
            response.documents = account.documents.values().cloned().collect();
        }

        if request.annotations_hash == account.annotations_hash {
            response.annotations_skipped = true;
        } else {
            response.annotations = account.annotations.values().cloned().collect();
        }

        let credentials_hash = account.credentials.as_ref().map(|c| c.content_hash.clone());
        if request.credentials_hash == credentials_hash {
            response.credentials_skipped = true;
        } else {
            response.credentials = account.credentials.as_ref().map(|c| c.envelope.clone());
        }

        Ok(response)
    }

    async fn push(&self, request: PushRequest) -> Result<()> {
        self.take_fault()?;
        self.pushes.lock().unwrap().push(request.clone());

        let mut guard = self.account.lock().unwrap();
        match guard.as_ref() {
            Some(account) => authenticate(account, &request.transport_hash)?,
            None => {
                // First contact creates the account.
                *guard = Some(Account {
                    transport_hash: request.transport_hash.clone(),
                    transport_salt: request.transport_salt.clone(),
                    encryption_salt: request.encryption_salt.clone(),
                    ..Account::default()
                });
            }
        }
        let account = guard.as_mut().unwrap();

        if let Some(documents) = request.documents {
            if documents.full {
                account.documents =
                    documents.items.into_iter().map(|d| (d.id.clone(), d)).collect();
            } else {
                for doc in documents.items {
                    account.documents.insert(doc.id.clone(), doc);
                }
            }
            for id in &documents.deleted {
                account.documents.remove(id);
            }
            account.documents_hash = Some(documents.content_hash);
        }

        if let Some(annotations) = request.annotations {
            if annotations.full {
                account.annotations = annotations
                    .items
                    .into_iter()
                    .map(|a| (a.id.clone(), a))
                    .collect();
            } else {
                for ann in annotations.items {
                    account.annotations.insert(ann.id.clone(), ann);
                }
            }
            for id in &annotations.deleted {
                account.annotations.remove(id);
            }
            account.annotations_hash = Some(annotations.content_hash);
        }

        if let Some(credentials) = request.credentials {
            account.credentials = Some(credentials);
        }

        if let Some(profile) = request.profile {
            account.profile = Some(profile);
        }

        Ok(())
    }

    async fn rotate_password(&self, request: RotateRequest) -> Result<()> {
        self.take_fault()?;
        let mut guard = self.account.lock().unwrap();
        let account = guard.as_mut().ok_or(Error::AuthRejected)?;
        authenticate(account, &request.old_transport_hash)?;

        account.transport_hash = request.new_transport_hash;
        account.transport_salt = Some(request.new_transport_salt);
        account.encryption_salt = Some(request.new_encryption_salt);
        account.documents = request
            .documents
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();
        account.documents_hash = Some(request.documents_hash);
        account.annotations = request
            .annotations
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();
        account.annotations_hash = Some(request.annotations_hash);
        account.credentials = request.credentials;
        if request.profile.is_some() {
            account.profile = request.profile;
        }

        Ok(())
    }
}
