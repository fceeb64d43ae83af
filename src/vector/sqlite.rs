//! SQLite-backed vector store
//!
//! Persists embeddings in a single `embeds` table (publication key →
//! f32-little-endian blob). Uses its own connection in WAL mode so reads
//! stay concurrent with the writer; thread-safe via a mutex on the
//! connection.

use super::traits::{VectorError, VectorResult, VectorStore};
use crate::graph::PubKey;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Persistent publication-key → vector map backed by SQLite.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    dimension: usize,
}

impl SqliteVectorStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> VectorResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn, dimension)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory(dimension: usize) -> VectorResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn, dimension)
    }

    fn init_connection(conn: Connection, dimension: usize) -> VectorResult<Self> {
        // WAL mode for concurrent reads
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS embeds (
                pkey TEXT PRIMARY KEY,
                embed BLOB NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            dimension,
        })
    }

    fn decode(&self, key: &PubKey, bytes: &[u8]) -> VectorResult<Vec<f32>> {
        if bytes.len() != self.dimension * 4 {
            return Err(VectorError::Corrupt(key.clone()));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}

fn encode(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

impl VectorStore for SqliteVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn upsert(&self, key: &PubKey, vector: &[f32]) -> VectorResult<()> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                key: key.clone(),
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO embeds (pkey, embed) VALUES (?1, ?2) \
             ON CONFLICT (pkey) DO UPDATE SET embed = excluded.embed",
            params![key.as_str(), encode(vector)],
        )?;
        Ok(())
    }

    fn get(&self, keys: &[PubKey]) -> VectorResult<HashMap<PubKey, Vec<f32>>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached("SELECT embed FROM embeds WHERE pkey = ?1")?;
        let mut out = HashMap::new();
        for key in keys {
            let row: Option<Vec<u8>> = stmt
                .query_row(params![key.as_str()], |row| row.get(0))
                .optional()?;
            if let Some(bytes) = row {
                out.insert(key.clone(), self.decode(key, &bytes)?);
            }
        }
        Ok(out)
    }

    fn contains(&self, key: &PubKey) -> VectorResult<bool> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached("SELECT 1 FROM embeds WHERE pkey = ?1")?;
        let found: Option<i64> = stmt
            .query_row(params![key.as_str()], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn len(&self) -> VectorResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM embeds", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn round_trip_exact_values() {
        let store = SqliteVectorStore::open_in_memory(4).unwrap();
        let key = PubKey::from("conf/a");
        let mut rng = StdRng::seed_from_u64(7);
        let vector: Vec<f32> = (0..4).map(|_| rng.gen_range(-1.0..1.0)).collect();

        store.upsert(&key, &vector).unwrap();
        assert_eq!(store.get_one(&key).unwrap().unwrap(), vector);
    }

    #[test]
    fn upsert_replaces_on_conflict() {
        let store = SqliteVectorStore::open_in_memory(2).unwrap();
        let key = PubKey::from("conf/a");
        store.upsert(&key, &[1.0, 0.0]).unwrap();
        store.upsert(&key, &[0.0, 1.0]).unwrap();

        assert_eq!(store.get_one(&key).unwrap().unwrap(), vec![0.0, 1.0]);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn dimension_is_enforced() {
        let store = SqliteVectorStore::open_in_memory(3).unwrap();
        let err = store
            .upsert(&PubKey::from("conf/a"), &[1.0, 2.0])
            .unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { .. }));
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn batch_of_five_round_trips_regardless_of_order() {
        let store = SqliteVectorStore::open_in_memory(2).unwrap();
        let pairs: Vec<(PubKey, Vec<f32>)> = ["e", "c", "a", "d", "b"]
            .iter()
            .enumerate()
            .map(|(i, k)| (PubKey::from(*k), vec![i as f32, 1.0]))
            .collect();
        store.batch_upsert(&pairs).unwrap();

        let keys: Vec<PubKey> = pairs.iter().map(|(k, _)| k.clone()).collect();
        let got = store.get(&keys).unwrap();
        assert_eq!(got.len(), 5);
        for (key, vector) in &pairs {
            assert_eq!(&got[key], vector);
        }
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeds.db");
        let key = PubKey::from("conf/a");
        {
            let store = SqliteVectorStore::open(&path, 2).unwrap();
            store.upsert(&key, &[0.5, -0.5]).unwrap();
        }
        let store = SqliteVectorStore::open(&path, 2).unwrap();
        assert_eq!(store.get_one(&key).unwrap().unwrap(), vec![0.5, -0.5]);
    }
}
