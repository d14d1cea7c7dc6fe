use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    DbError(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

/// sled 键值数据库，按名称缓存打开的树
#[derive(Clone)]
pub struct Database {
    db: Arc<Db>,
    trees: Arc<Mutex<HashMap<String, Tree>>>,
}

impl Database {
    /// 打开或创建数据库
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let db = sled::open(path)?;

        Ok(Self {
            db: Arc::new(db),
            trees: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn trees(&self) -> MutexGuard<'_, HashMap<String, Tree>> {
        self.trees.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 获取树
    pub fn get_tree(&self, name: &str) -> Result<Tree, DatabaseError> {
        if let Some(tree) = self.trees().get(name) {
            return Ok(tree.clone());
        }

        let tree = self.db.open_tree(name)?;
        self.trees().insert(name.to_string(), tree.clone());
        Ok(tree)
    }

    pub fn get(&self, tree: &str, key: &[u8]) -> Result<Option<Vec<u8>>, DatabaseError> {
        let tree = self.get_tree(tree)?;
        Ok(tree.get(key)?.map(|value| value.to_vec()))
    }

    pub fn put(&self, tree: &str, key: &[u8], value: &[u8]) -> Result<(), DatabaseError> {
        self.get_tree(tree)?.insert(key, value)?;
        Ok(())
    }

    /// Drops every entry of a tree
    pub fn clear_tree(&self, tree: &str) -> Result<(), DatabaseError> {
        self.get_tree(tree)?.clear()?;
        Ok(())
    }

    /// All values of a tree in key order, deserialized
    pub fn values<T: DeserializeOwned>(&self, tree: &str) -> Result<Vec<T>, DatabaseError> {
        self.get_tree(tree)?
            .iter()
            .map(|entry| {
                let (_, value) = entry?;
                bincode::deserialize(&value).map_err(|e| DatabaseError::DeserializationError(e.to_string()))
            })
            .collect()
    }

    /// 获取反序列化的值
    pub fn get_serialized<T: DeserializeOwned>(&self, tree: &str, key: &[u8]) -> Result<Option<T>, DatabaseError> {
        match self.get(tree, key)? {
            Some(value) => bincode::deserialize(&value)
                .map(Some)
                .map_err(|e| DatabaseError::DeserializationError(e.to_string())),
            None => Ok(None),
        }
    }

    /// 序列化后写入
    pub fn put_serialized<T: Serialize>(&self, tree: &str, key: &[u8], value: &T) -> Result<(), DatabaseError> {
        let data = bincode::serialize(value).map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
        self.put(tree, key, &data)
    }

    /// 刷新到磁盘
    pub fn flush(&self) -> Result<(), DatabaseError> {
        self.db.flush()?;
        Ok(())
    }
}
