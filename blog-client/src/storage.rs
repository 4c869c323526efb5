//! Постоянное key-value хранилище для токена сессии.
//!
//! Аналог `localStorage`: строковые ключи и значения. Токен лежит под ключом
//! [`TOKEN_KEY`]; отсутствие ключа означает, что пользователь не вошёл.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::error::{BlogClientError, BlogClientResult};

/// Ключ, под которым хранится токен сессии.
pub const TOKEN_KEY: &str = "TOKEN";

/// Синхронное строковое key-value хранилище.
pub trait TokenStorage: Send + Sync {
    /// Значение по ключу или `None`, если ключа нет.
    fn get(&self, key: &str) -> BlogClientResult<Option<String>>;
    /// Записывает значение.
    fn set(&self, key: &str, value: &str) -> BlogClientResult<()>;
    /// Удаляет ключ (без ошибки, если его не было).
    fn remove(&self, key: &str) -> BlogClientResult<()>;
}

fn parse_token(raw: &str) -> Option<String> {
    let token = raw.trim().to_string();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// Читает токен сессии; пустое значение считается отсутствующим.
pub fn load_token(storage: &dyn TokenStorage) -> BlogClientResult<Option<String>> {
    Ok(storage.get(TOKEN_KEY)?.as_deref().and_then(parse_token))
}

#[derive(Debug, Default)]
/// Хранилище в памяти процесса.
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Пустое хранилище.
    pub fn new() -> Self {
        Self::default()
    }

    /// Хранилище с уже сохранённым токеном.
    pub fn with_token(token: &str) -> Self {
        let storage = Self::new();
        storage
            .entries
            .write()
            .insert(TOKEN_KEY.to_string(), token.to_string());
        storage
    }
}

impl TokenStorage for MemoryStorage {
    fn get(&self, key: &str) -> BlogClientResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> BlogClientResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> BlogClientResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[derive(Debug)]
/// Хранилище в JSON-файле (`{"TOKEN": "..."}`).
///
/// Файл перечитывается на каждый `get`, чтобы видеть изменения других процессов.
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Хранилище по указанному пути. Файл создаётся при первой записи.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Путь к файлу хранилища.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> BlogClientResult<BTreeMap<String, String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(storage_error(&self.path, err)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|err| storage_error(&self.path, err))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> BlogClientResult<()> {
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|err| storage_error(&self.path, err))?;
        fs::write(&self.path, raw).map_err(|err| storage_error(&self.path, err))
    }
}

fn storage_error(path: &Path, err: impl std::fmt::Display) -> BlogClientError {
    BlogClientError::Storage(format!("{}: {err}", path.display()))
}

impl TokenStorage for FileStorage {
    fn get(&self, key: &str) -> BlogClientResult<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> BlogClientResult<()> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> BlogClientResult<()> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}
