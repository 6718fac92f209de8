use std::collections::BTreeMap;

use prost::Message;

use crate::{
    Model,
    error::{Error, StoreError},
    value::{AttributeValue, Value},
};

/// Field name to value. Ordered, so encoding an item is deterministic.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A persisted record as the store sees it.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Item {
    #[prost(string, tag = "1")]
    pub model_name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub primary_key: ::prost::alloc::string::String,
    /// Field name to derived secondary index key.
    #[prost(btree_map = "string, string", tag = "3")]
    pub index_keys: BTreeMap<String, String>,
    #[prost(btree_map = "string, message", tag = "4")]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Item {
    pub fn get(&self, field_name: &str) -> Option<&Value> {
        self.attributes.get(field_name).and_then(|a| a.value.as_ref())
    }

    pub fn to_model<T: Model>(&self) -> Result<T, Error> {
        let expected = T::schema().model_name();
        if self.model_name != expected {
            return Err(Error::ModelMismatch {
                key: self.primary_key.clone(),
                expected: expected.to_string(),
                found: self.model_name.clone(),
            });
        }
        T::from_attributes(&self.attributes)
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub(crate) fn from_bytes(key: &str, data: &[u8]) -> Result<Self, StoreError> {
        <Item as Message>::decode(data).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })
    }
}
