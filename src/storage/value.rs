//! Node value: the serialized record stored for every path

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Permanent,
    Temp,
}

/// On-disk record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// None for auto-created intermediate nodes
    pub value: Option<Vec<u8>>,
    pub node_type: NodeType,
    /// Owning session, present iff the node is temp
    pub owner: Option<String>,
    /// Milliseconds since epoch
    pub last_modified: u64,
}

impl NodeRecord {
    pub fn from_info(info: &ValueInfo, now: u64) -> Self {
        let (node_type, owner) = if info.temp {
            (NodeType::Temp, Some(info.owner.clone().unwrap_or_default()))
        } else {
            (NodeType::Permanent, None)
        };
        Self {
            value: Some(info.value.clone()),
            node_type,
            owner,
            last_modified: now,
        }
    }

    /// Intermediate ancestor carrying the type and owner of `child`
    pub fn intermediate_of(child: &NodeRecord) -> Self {
        Self {
            value: None,
            ..child.clone()
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Invalid(format!("Serialize error: {}", e)))
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        bincode::deserialize(raw).map_err(|e| Error::Invalid(format!("Corrupted node value: {}", e)))
    }

    pub fn into_info(self) -> ValueInfo {
        ValueInfo {
            temp: self.node_type == NodeType::Temp,
            intermediate: self.value.is_none(),
            value: self.value.unwrap_or_default(),
            owner: self.owner,
            last_modified: self.last_modified,
        }
    }
}

/// Decoded view of a node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueInfo {
    pub temp: bool,
    /// Created implicitly as an ancestor; ignored on put
    pub intermediate: bool,
    /// Empty for intermediate nodes
    pub value: Vec<u8>,
    /// Owning session of a temp node
    pub owner: Option<String>,
    /// Ignored on put
    pub last_modified: u64,
}

impl ValueInfo {
    pub fn permanent(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn temp(value: impl Into<Vec<u8>>, owner: impl Into<String>) -> Self {
        Self {
            temp: true,
            value: value.into(),
            owner: Some(owner.into()),
            ..Default::default()
        }
    }
}
