//! DHT record validation.
//!
//! The DHT consults a [`RecordValidator`] before storing a record and when it
//! has to choose between conflicting values for the same key. Nodes use
//! [`default_validator`]: public-key records under the `pk` namespace, wrapped
//! in a [`LoggingValidator`].

use std::collections::HashMap;

use auto_impl::auto_impl;
use libp2p::PeerId;
use libp2p::identity::PublicKey;
use thiserror::Error;
use tracing::debug;

/// Why a record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record key is not namespaced")]
    MissingNamespace,
    #[error("no validator for namespace {0:?}")]
    UnknownNamespace(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("no values to select from")]
    NoValues,
}

/// Validates and selects DHT records.
#[auto_impl(&, Arc, Box)]
pub trait RecordValidator: Send + Sync {
    fn validate(&self, key: &[u8], value: &[u8]) -> Result<(), ValidationError>;

    /// Index of the best value among `values`.
    fn select(&self, key: &[u8], values: &[Vec<u8>]) -> Result<usize, ValidationError>;
}

/// Split `/<namespace>/<rest>` into its parts.
fn split_namespace(key: &[u8]) -> Result<(&str, &[u8]), ValidationError> {
    let rest = key.strip_prefix(b"/").ok_or(ValidationError::MissingNamespace)?;
    let end = rest
        .iter()
        .position(|b| *b == b'/')
        .ok_or(ValidationError::MissingNamespace)?;
    let (namespace, tail) = rest.split_at(end);
    let namespace = std::str::from_utf8(namespace).map_err(|_| ValidationError::MissingNamespace)?;
    Ok((namespace, tail.get(1..).unwrap_or_default()))
}

/// Dispatches to a validator by key namespace.
#[derive(Default)]
pub struct NamespacedValidator {
    validators: HashMap<String, Box<dyn RecordValidator>>,
}

impl NamespacedValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, namespace: impl Into<String>, validator: impl RecordValidator + 'static) -> Self {
        self.validators.insert(namespace.into(), Box::new(validator));
        self
    }

    fn validator_for(&self, key: &[u8]) -> Result<&dyn RecordValidator, ValidationError> {
        let (namespace, _) = split_namespace(key)?;
        self.validators
            .get(namespace)
            .map(|v| v.as_ref())
            .ok_or_else(|| ValidationError::UnknownNamespace(namespace.to_string()))
    }
}

impl RecordValidator for NamespacedValidator {
    fn validate(&self, key: &[u8], value: &[u8]) -> Result<(), ValidationError> {
        self.validator_for(key)?.validate(key, value)
    }

    fn select(&self, key: &[u8], values: &[Vec<u8>]) -> Result<usize, ValidationError> {
        self.validator_for(key)?.select(key, values)
    }
}

/// Records mapping `/pk/<peer id bytes>` to the protobuf-encoded public key of that peer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicKeyValidator;

impl RecordValidator for PublicKeyValidator {
    fn validate(&self, key: &[u8], value: &[u8]) -> Result<(), ValidationError> {
        let (namespace, peer_bytes) = split_namespace(key)?;
        if namespace != "pk" {
            return Err(ValidationError::InvalidRecord(format!(
                "namespace {namespace:?} is not pk"
            )));
        }
        let peer_id = PeerId::from_bytes(peer_bytes)
            .map_err(|e| ValidationError::InvalidRecord(format!("bad peer id in key: {e}")))?;
        let public_key = PublicKey::try_decode_protobuf(value)
            .map_err(|e| ValidationError::InvalidRecord(format!("bad public key: {e}")))?;
        if public_key.to_peer_id() != peer_id {
            return Err(ValidationError::InvalidRecord(
                "public key does not match peer id".to_string(),
            ));
        }
        Ok(())
    }

    fn select(&self, _key: &[u8], values: &[Vec<u8>]) -> Result<usize, ValidationError> {
        // Valid public key records for the same key are identical.
        if values.is_empty() {
            return Err(ValidationError::NoValues);
        }
        Ok(0)
    }
}

/// Logs every call at debug level, then delegates.
#[derive(Debug, Clone)]
pub struct LoggingValidator<V> {
    inner: V,
}

impl<V: RecordValidator> LoggingValidator<V> {
    pub fn new(inner: V) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &V {
        &self.inner
    }
}

impl<V: RecordValidator> RecordValidator for LoggingValidator<V> {
    fn validate(&self, key: &[u8], value: &[u8]) -> Result<(), ValidationError> {
        debug!(
            key = %String::from_utf8_lossy(key),
            value = %String::from_utf8_lossy(value),
            "DHT validating"
        );
        self.inner.validate(key, value)
    }

    fn select(&self, key: &[u8], values: &[Vec<u8>]) -> Result<usize, ValidationError> {
        let joined = values.join(&b"; "[..]);
        debug!(
            key = %String::from_utf8_lossy(key),
            values = %String::from_utf8_lossy(&joined),
            "DHT selecting among"
        );
        self.inner.select(key, values)
    }
}

/// The validator nodes install: public keys under `pk`, with logging.
pub fn default_validator() -> LoggingValidator<NamespacedValidator> {
    LoggingValidator::new(NamespacedValidator::new().with("pk", PublicKeyValidator))
}

/// Key under which a peer's public key is published.
pub fn public_key_record_key(peer_id: &PeerId) -> Vec<u8> {
    let mut key = b"/pk/".to_vec();
    key.extend_from_slice(&peer_id.to_bytes());
    key
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use libp2p::identity::Keypair;

    use super::*;

    #[derive(Default)]
    struct CountingValidator {
        validated: AtomicUsize,
        selected: AtomicUsize,
    }

    impl RecordValidator for CountingValidator {
        fn validate(&self, _key: &[u8], _value: &[u8]) -> Result<(), ValidationError> {
            self.validated.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn select(&self, _key: &[u8], values: &[Vec<u8>]) -> Result<usize, ValidationError> {
            self.selected.fetch_add(1, Ordering::SeqCst);
            Ok(values.len().saturating_sub(1))
        }
    }

    #[test]
    fn test_logging_validator_delegates() {
        let validator = LoggingValidator::new(CountingValidator::default());
        validator.validate(b"/x/key", b"\xff\xfe binary").unwrap();
        assert_eq!(
            validator
                .select(b"/x/key", &[b"a".to_vec(), b"b".to_vec()])
                .unwrap(),
            1
        );
        assert_eq!(validator.inner().validated.load(Ordering::SeqCst), 1);
        assert_eq!(validator.inner().selected.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_public_key_record() {
        let keypair = Keypair::generate_ed25519();
        let peer_id = keypair.public().to_peer_id();
        let key = public_key_record_key(&peer_id);
        let value = keypair.public().encode_protobuf();

        let validator = default_validator();
        assert!(validator.validate(&key, &value).is_ok());
        assert_eq!(validator.select(&key, &[value.clone()]), Ok(0));

        // Someone else's key
        let other = Keypair::generate_ed25519().public().encode_protobuf();
        assert!(matches!(
            validator.validate(&key, &other),
            Err(ValidationError::InvalidRecord(_))
        ));
        assert!(matches!(
            validator.validate(&key, b"junk"),
            Err(ValidationError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_namespace_dispatch() {
        let validator = default_validator();
        assert_eq!(
            validator.validate(b"/ipns/abc", b"v"),
            Err(ValidationError::UnknownNamespace("ipns".to_string()))
        );
        assert_eq!(
            validator.validate(b"no-namespace", b"v"),
            Err(ValidationError::MissingNamespace)
        );
        assert_eq!(
            validator.select(&public_key_record_key(&PeerId::random()), &[]),
            Err(ValidationError::NoValues)
        );
    }
}
