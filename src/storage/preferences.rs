use std::{
    collections::HashMap,
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, error, warn};

use crate::settings::{EyeCareSettings, Preference, SettingsError, SoundSettings, TimerSettings};

/// Key-value persistence of settings records. Implementors only move raw strings around, the
/// typed [PreferencesStore::get] and [PreferencesStore::set] handle parsing and validation.
pub trait PreferencesStore {
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>>>;

    fn write(&self, key: &str, value: String) -> impl Future<Output = Result<()>>;

    /// Reads a record, falling back to its default when it is absent, unreadable, malformed or
    /// fails validation. Never fails.
    fn get<T: Preference>(&self) -> impl Future<Output = T> {
        async move {
            let raw = match self.read(T::KEY).await {
                Ok(Some(raw)) => raw,
                Ok(None) => return T::default(),
                Err(e) => {
                    error!("Failed to load {}: {e:?}", T::KEY);
                    return T::default();
                }
            };
            match serde_json::from_str::<T>(&raw) {
                Ok(value) => match value.validate() {
                    Ok(()) => value,
                    Err(e) => {
                        warn!("Stored {} is invalid, using defaults: {e}", T::KEY);
                        T::default()
                    }
                },
                Err(e) => {
                    warn!("Stored {} is corrupted, using defaults: {e}", T::KEY);
                    T::default()
                }
            }
        }
    }

    /// Replaces the stored record. Invalid records are rejected before anything is written.
    fn set<T: Preference>(&self, value: &T) -> impl Future<Output = Result<()>> {
        async move {
            value.validate()?;
            let raw = serde_json::to_string_pretty(value)?;
            self.write(T::KEY, raw).await
        }
    }
}

impl<T: Deref> PreferencesStore for T
where
    T::Target: PreferencesStore,
{
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>>> {
        self.deref().read(key)
    }

    fn write(&self, key: &str, value: String) -> impl Future<Output = Result<()>> {
        self.deref().write(key, value)
    }
}

/// Stores every record as `<key>.json` inside a directory.
pub struct FilePreferences {
    dir: PathBuf,
}

impl FilePreferences {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl PreferencesStore for FilePreferences {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => Err(e)?,
        };
        file.lock_shared()?;
        let mut raw = String::new();
        let result = file.read_to_string(&mut raw).await;
        file.unlock_async().await?;
        result?;
        debug!("Loaded {key} from {path:?}");
        Ok(Some(raw))
    }

    async fn write(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key);
        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;
        file.lock_exclusive()?;
        let result = async {
            file.set_len(0).await?;
            file.rewind().await?;
            file.write_all(value.as_bytes()).await?;
            file.flush().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        file.unlock_async().await?;
        result?;
        debug!("Saved {key} to {path:?}");
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPreferences {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferencesStore for MemoryPreferences {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(key).cloned())
    }

    async fn write(&self, key: &str, value: String) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Configuration service handed to the components that need settings. Each record is loaded on
/// first access and cached; saving replaces the cached copy even when writing to the store
/// fails, so the process keeps working with what the user chose.
pub struct Preferences<S> {
    store: S,
    timer: Mutex<Option<TimerSettings>>,
    eye_care: Mutex<Option<EyeCareSettings>>,
    sound: Mutex<Option<SoundSettings>>,
}

impl<S: PreferencesStore> Preferences<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            timer: Mutex::new(None),
            eye_care: Mutex::new(None),
            sound: Mutex::new(None),
        }
    }

    pub async fn timer(&self) -> TimerSettings {
        self.cached(&self.timer).await
    }

    pub async fn eye_care(&self) -> EyeCareSettings {
        self.cached(&self.eye_care).await
    }

    pub async fn sound(&self) -> SoundSettings {
        self.cached(&self.sound).await
    }

    /// Drops every cached record so the next access reads the store again, picking up what
    /// another process saved. Values that only lived in the cache are lost.
    pub fn invalidate(&self) {
        *self.timer.lock().unwrap_or_else(PoisonError::into_inner) = None;
        *self.eye_care.lock().unwrap_or_else(PoisonError::into_inner) = None;
        *self.sound.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub async fn save_timer(&self, settings: TimerSettings) -> Result<(), SettingsError> {
        self.persist(&self.timer, settings).await
    }

    pub async fn save_eye_care(&self, settings: EyeCareSettings) -> Result<(), SettingsError> {
        self.persist(&self.eye_care, settings).await
    }

    pub async fn save_sound(&self, settings: SoundSettings) -> Result<(), SettingsError> {
        self.persist(&self.sound, settings).await
    }

    async fn cached<T: Preference>(&self, slot: &Mutex<Option<T>>) -> T {
        if let Some(value) = slot.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            return value;
        }
        let value = self.store.get::<T>().await;
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.clone());
        value
    }

    async fn persist<T: Preference>(
        &self,
        slot: &Mutex<Option<T>>,
        value: T,
    ) -> Result<(), SettingsError> {
        value.validate()?;
        if let Err(e) = self.store.set(&value).await {
            error!("Failed to save {}, keeping it for this run only: {e:?}", T::KEY);
        }
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Result};
    use tempfile::tempdir;

    use crate::settings::{EyeCareSettings, Preference, SettingsError, SoundSettings, TimerSettings};

    use super::{FilePreferences, MemoryPreferences, Preferences, PreferencesStore};

    struct BrokenStore;

    impl PreferencesStore for BrokenStore {
        async fn read(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow!("disk on fire"))
        }

        async fn write(&self, _key: &str, _value: String) -> Result<()> {
            Err(anyhow!("quota exceeded"))
        }
    }

    #[tokio::test]
    async fn test_missing_records_use_defaults() -> Result<()> {
        let dir = tempdir()?;
        let store = FilePreferences::new(dir.path().to_owned())?;
        assert_eq!(store.get::<TimerSettings>().await, TimerSettings::default());
        assert_eq!(store.get::<SoundSettings>().await, SoundSettings::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_file_round_trip_overwrites() -> Result<()> {
        let dir = tempdir()?;
        let store = FilePreferences::new(dir.path().to_owned())?;
        let settings = TimerSettings {
            focus_time: 50,
            break_time: 10,
        };
        store.set(&settings).await?;
        store
            .set(&TimerSettings {
                focus_time: 5,
                break_time: 1,
            })
            .await?;

        let stored = store.get::<TimerSettings>().await;
        assert_eq!(stored.focus_time, 5);
        assert_eq!(stored.break_time, 1);
        assert!(dir.path().join("timer-settings.json").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_or_invalid_records_use_defaults() -> Result<()> {
        let store = MemoryPreferences::new();
        store
            .write(EyeCareSettings::KEY, "{ not json".into())
            .await?;
        store
            .write(TimerSettings::KEY, r#"{"focusTime": 0, "breakTime": 5}"#.into())
            .await?;

        assert_eq!(store.get::<EyeCareSettings>().await, EyeCareSettings::default());
        assert_eq!(store.get::<TimerSettings>().await, TimerSettings::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_set_rejects_invalid_record() {
        let store = MemoryPreferences::new();
        let result = store
            .set(&TimerSettings {
                focus_time: 25,
                break_time: 0,
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.read(TimerSettings::KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_service_keeps_saved_value_when_store_fails() {
        let preferences = Preferences::new(BrokenStore);
        assert_eq!(preferences.timer().await, TimerSettings::default());

        let settings = TimerSettings {
            focus_time: 45,
            break_time: 15,
        };
        preferences.save_timer(settings).await.unwrap();
        assert_eq!(preferences.timer().await, settings);

        let invalid = SoundSettings {
            volume: -0.1,
            ..Default::default()
        };
        assert_eq!(
            preferences.save_sound(invalid).await,
            Err(SettingsError::Volume(-0.1))
        );
        assert_eq!(preferences.sound().await, SoundSettings::default());
    }

    #[tokio::test]
    async fn test_service_loads_lazily_once() -> Result<()> {
        let store = MemoryPreferences::new();
        store
            .set(&TimerSettings {
                focus_time: 30,
                break_time: 5,
            })
            .await?;
        let preferences = Preferences::new(&store);
        assert_eq!(preferences.timer().await.focus_time, 30);

        // Later writes that bypass the service are not picked up, the cached copy is used.
        store
            .set(&TimerSettings {
                focus_time: 40,
                break_time: 5,
            })
            .await?;
        assert_eq!(preferences.timer().await.focus_time, 30);
        Ok(())
    }
}
