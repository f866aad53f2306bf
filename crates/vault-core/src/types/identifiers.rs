//! Core identifier types used by the blob pipeline
//!
//! A `BlobId` is an opaque correlation token. The pipeline reads only the
//! account and container it embeds (to resolve a master key); everything else
//! is carried through to callbacks untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::VaultError;

/// Account that owns a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub u16);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for AccountId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Container within an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(pub u16);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for ContainerId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Reference to the partition a blob was placed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub u64);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PartitionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Blob identifier
///
/// Embeds the owning account and container, the partition reference, and a
/// uuid that makes the id unique. Renders as `account:container:partition:uuid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobId {
    account_id: AccountId,
    container_id: ContainerId,
    partition_id: PartitionId,
    uuid: Uuid,
}

impl BlobId {
    /// Create a new blob id with a random uuid
    pub fn new(
        account_id: impl Into<AccountId>,
        container_id: impl Into<ContainerId>,
        partition_id: impl Into<PartitionId>,
    ) -> Self {
        Self::from_parts(account_id, container_id, partition_id, Uuid::new_v4())
    }

    /// Assemble a blob id from all of its parts
    pub fn from_parts(
        account_id: impl Into<AccountId>,
        container_id: impl Into<ContainerId>,
        partition_id: impl Into<PartitionId>,
        uuid: Uuid,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            container_id: container_id.into(),
            partition_id: partition_id.into(),
            uuid,
        }
    }

    /// Account that owns the blob
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Container the blob belongs to
    pub fn container_id(&self) -> ContainerId {
        self.container_id
    }

    /// Partition the blob was placed on
    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    /// Unique part of the id
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.account_id, self.container_id, self.partition_id, self.uuid
        )
    }
}

impl FromStr for BlobId {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 4 {
            return Err(VaultError::invalid(format!(
                "Blob id must have 4 ':'-separated parts, got {}",
                parts.len()
            )));
        }

        let account: u16 = parts[0]
            .parse()
            .map_err(|e| VaultError::invalid(format!("Invalid account id '{}': {e}", parts[0])))?;
        let container: u16 = parts[1].parse().map_err(|e| {
            VaultError::invalid(format!("Invalid container id '{}': {e}", parts[1]))
        })?;
        let partition: u64 = parts[2].parse().map_err(|e| {
            VaultError::invalid(format!("Invalid partition id '{}': {e}", parts[2]))
        })?;
        let uuid = Uuid::parse_str(parts[3])
            .map_err(|e| VaultError::invalid(format!("Invalid blob uuid '{}': {e}", parts[3])))?;

        Ok(Self::from_parts(account, container, partition, uuid))
    }
}
