//! Blob metadata: the JSON-encoded descriptor stored next to each payload.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use sha1::{Digest, Sha1};
use uuid::Uuid;

/// Length in bytes of a blob checksum (a SHA-1 digest).
pub const CHECKSUM_LEN: usize = 20;

/// Hard cap on the serialized size of one metadata document.
///
/// Also reserved per blob by [`crate::BlobStore::has_enough_space_for`].
pub const MAX_SERIALIZED_LEN: usize = 1024;

/// SHA-1 digest of a payload.
pub fn checksum(data: &[u8]) -> Vec<u8> {
    Sha1::digest(data).to_vec()
}

/// Metadata validation and codec errors.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("missing metadata field `{0}`")]
    MissingField(&'static str),

    #[error("checksum must not be empty")]
    EmptyChecksum,

    #[error("expiration date is not after the creation date")]
    ExpiresBeforeCreated,

    #[error("modification date is before the creation date")]
    ModifiedBeforeCreated,

    #[error("serialized metadata is {0} bytes, above the {MAX_SERIALIZED_LEN} byte cap")]
    TooLarge(usize),

    #[error("malformed metadata document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload is {data} bytes but metadata declares {metadata}")]
    LengthMismatch { data: u64, metadata: u64 },
}

/// Descriptor stored alongside each blob payload.
///
/// Serialized as a self-describing JSON document with the checksum in
/// base64; the encoded form must fit in [`MAX_SERIALIZED_LEN`] bytes.
/// Instances only exist validated, via [`BlobMetadata::builder`] or
/// [`BlobMetadata::from_bytes`].
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    id: Uuid,
    data_length: u64,
    #[serde_as(as = "Base64")]
    checksum: Vec<u8>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl BlobMetadata {
    pub fn builder() -> MetadataBuilder {
        MetadataBuilder::default()
    }

    /// Builder pre-filled with this metadata, for appends that preserve the
    /// identity and creation date.
    pub fn to_builder(&self) -> MetadataBuilder {
        MetadataBuilder {
            id: Some(self.id),
            data_length: Some(self.data_length),
            checksum: Some(self.checksum.clone()),
            created_at: Some(self.created_at),
            modified_at: Some(self.modified_at),
            expires_at: Some(self.expires_at),
        }
    }

    /// Decode and validate a stored metadata document.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MetadataError> {
        if bytes.len() > MAX_SERIALIZED_LEN {
            return Err(MetadataError::TooLarge(bytes.len()));
        }
        let metadata: BlobMetadata = serde_json::from_slice(bytes)?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Encode for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MetadataError> {
        Ok(serde_json::to_vec(self)?)
    }

    fn validate(&self) -> Result<(), MetadataError> {
        if self.checksum.is_empty() {
            return Err(MetadataError::EmptyChecksum);
        }
        if self.expires_at <= self.created_at {
            return Err(MetadataError::ExpiresBeforeCreated);
        }
        if self.modified_at < self.created_at {
            return Err(MetadataError::ModifiedBeforeCreated);
        }
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn data_length(&self) -> u64 {
        self.data_length
    }

    /// Copy of the payload checksum.
    pub fn checksum(&self) -> Vec<u8> {
        self.checksum.clone()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the blob is strictly past its expiration date at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Builder for [`BlobMetadata`]; every field is required.
#[derive(Debug, Clone, Default)]
pub struct MetadataBuilder {
    id: Option<Uuid>,
    data_length: Option<u64>,
    checksum: Option<Vec<u8>>,
    created_at: Option<DateTime<Utc>>,
    modified_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

impl MetadataBuilder {
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn data_length(mut self, data_length: u64) -> Self {
        self.data_length = Some(data_length);
        self
    }

    pub fn checksum(mut self, checksum: Vec<u8>) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn modified_at(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = Some(modified_at);
        self
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Validate the fields and the encoded size, producing the metadata.
    pub fn build(self) -> Result<BlobMetadata, MetadataError> {
        let metadata = BlobMetadata {
            id: self.id.ok_or(MetadataError::MissingField("id"))?,
            data_length: self
                .data_length
                .ok_or(MetadataError::MissingField("data_length"))?,
            checksum: self.checksum.ok_or(MetadataError::MissingField("checksum"))?,
            created_at: self
                .created_at
                .ok_or(MetadataError::MissingField("created_at"))?,
            modified_at: self
                .modified_at
                .ok_or(MetadataError::MissingField("modified_at"))?,
            expires_at: self
                .expires_at
                .ok_or(MetadataError::MissingField("expires_at"))?,
        };
        metadata.validate()?;
        let encoded_len = metadata.to_bytes()?.len();
        if encoded_len > MAX_SERIALIZED_LEN {
            return Err(MetadataError::TooLarge(encoded_len));
        }
        Ok(metadata)
    }
}

/// A blob's payload together with its metadata, length-checked on
/// construction.
#[derive(Debug, Clone)]
pub struct BlobRecord {
    metadata: BlobMetadata,
    data: Bytes,
}

impl BlobRecord {
    pub fn new(metadata: BlobMetadata, data: Bytes) -> Result<Self, MetadataError> {
        if data.len() as u64 != metadata.data_length() {
            return Err(MetadataError::LengthMismatch {
                data: data.len() as u64,
                metadata: metadata.data_length(),
            });
        }
        Ok(Self { metadata, data })
    }

    pub fn metadata(&self) -> &BlobMetadata {
        &self.metadata
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_parts(self) -> (BlobMetadata, Bytes) {
        (self.metadata, self.data)
    }
}
