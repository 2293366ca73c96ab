//! SQLite implementation of the library store

use crate::error::{LibraryError, Result};
use crate::locator::LocatorRegistry;
use crate::models::{Playlist, Song};
use crate::repositories::{hydrate, LibraryStore};
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::{query, query_as, FromRow, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(FromRow)]
struct SongRecord {
    id: String,
    title: String,
    artist: String,
    album: String,
    duration: f64,
    audio: Vec<u8>,
    cover: Option<Vec<u8>>,
    lyrics: Option<String>,
    liked: bool,
    created_at: i64,
}

impl From<SongRecord> for Song {
    fn from(record: SongRecord) -> Self {
        Song {
            id: record.id,
            title: record.title,
            artist: record.artist,
            album: record.album,
            duration: record.duration,
            audio: Bytes::from(record.audio),
            cover: record.cover.map(Bytes::from),
            lyrics: record.lyrics,
            liked: record.liked,
            created_at: record.created_at,
            locator: None,
        }
    }
}

#[derive(FromRow)]
struct PlaylistRecord {
    id: String,
    name: String,
    description: Option<String>,
    cover: Option<Vec<u8>>,
    use_first_song_cover: bool,
    created_at: i64,
}

/// SQLite implementation of [`LibraryStore`]
pub struct SqliteLibraryStore {
    pool: SqlitePool,
    locators: Arc<LocatorRegistry>,
}

impl SqliteLibraryStore {
    /// Create a new store over a migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locators: Arc::new(LocatorRegistry::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn invalid(field: &str, message: String) -> LibraryError {
    LibraryError::InvalidInput {
        field: field.to_string(),
        message,
    }
}

#[async_trait]
impl LibraryStore for SqliteLibraryStore {
    #[instrument(skip(self, song), fields(song_id = %song.id))]
    async fn put_song(&self, song: &Song) -> Result<()> {
        song.validate().map_err(|e| invalid("Song", e))?;

        query(
            r#"
            INSERT INTO songs (
                id, title, artist, album, duration, audio, cover, lyrics, liked, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                album = excluded.album,
                duration = excluded.duration,
                audio = excluded.audio,
                cover = excluded.cover,
                lyrics = excluded.lyrics,
                liked = excluded.liked
            "#,
        )
        .bind(&song.id)
        .bind(&song.title)
        .bind(&song.artist)
        .bind(&song.album)
        .bind(song.duration)
        .bind(&song.audio[..])
        .bind(song.cover.as_deref())
        .bind(&song.lyrics)
        .bind(song.liked)
        .bind(song.created_at)
        .execute(&self.pool)
        .await?;

        debug!("Song persisted");
        Ok(())
    }

    async fn get_all_songs(&self) -> Result<Vec<Song>> {
        let records = query_as::<_, SongRecord>(
            r#"
            SELECT id, title, artist, album, duration, audio, cover, lyrics, liked, created_at
            FROM songs
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut songs: Vec<Song> = records.into_iter().map(Song::from).collect();
        hydrate(&self.locators, &mut songs);

        debug!(count = songs.len(), "Loaded songs");
        Ok(songs)
    }

    async fn delete_song(&self, id: &str) -> Result<()> {
        query("DELETE FROM songs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.locators.release(id);
        Ok(())
    }

    #[instrument(skip(self, playlist), fields(playlist_id = %playlist.id))]
    async fn put_playlist(&self, playlist: &Playlist) -> Result<()> {
        playlist.validate().map_err(|e| invalid("Playlist", e))?;

        let mut tx = self.pool.begin().await?;

        query(
            r#"
            INSERT INTO playlists (id, name, description, cover, use_first_song_cover, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                cover = excluded.cover,
                use_first_song_cover = excluded.use_first_song_cover
            "#,
        )
        .bind(&playlist.id)
        .bind(&playlist.name)
        .bind(&playlist.description)
        .bind(playlist.cover.as_deref())
        .bind(playlist.use_first_song_cover)
        .bind(playlist.created_at)
        .execute(&mut *tx)
        .await?;

        query("DELETE FROM playlist_songs WHERE playlist_id = ?")
            .bind(&playlist.id)
            .execute(&mut *tx)
            .await?;

        for (position, song_id) in playlist.song_ids.iter().enumerate() {
            query("INSERT INTO playlist_songs (playlist_id, song_id, position) VALUES (?, ?, ?)")
                .bind(&playlist.id)
                .bind(song_id)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(songs = playlist.song_ids.len(), "Playlist persisted");
        Ok(())
    }

    async fn get_all_playlists(&self) -> Result<Vec<Playlist>> {
        let records = query_as::<_, PlaylistRecord>(
            r#"
            SELECT id, name, description, cover, use_first_song_cover, created_at
            FROM playlists
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let rows = query_as::<_, (String, String)>(
            "SELECT playlist_id, song_id FROM playlist_songs ORDER BY playlist_id, position ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut references: HashMap<String, Vec<String>> = HashMap::new();
        for (playlist_id, song_id) in rows {
            references.entry(playlist_id).or_default().push(song_id);
        }

        let playlists = records
            .into_iter()
            .map(|record| Playlist {
                song_ids: references.remove(&record.id).unwrap_or_default(),
                id: record.id,
                name: record.name,
                description: record.description,
                cover: record.cover.map(Bytes::from),
                use_first_song_cover: record.use_first_song_cover,
                created_at: record.created_at,
            })
            .collect();

        Ok(playlists)
    }

    async fn delete_playlist(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        query("DELETE FROM playlist_songs WHERE playlist_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        query("DELETE FROM playlists WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    fn locators(&self) -> Arc<LocatorRegistry> {
        Arc::clone(&self.locators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::NewSong;

    async fn setup_store() -> SqliteLibraryStore {
        SqliteLibraryStore::new(create_test_pool().await.unwrap())
    }

    fn sample_song(title: &str, created_at: i64) -> Song {
        let mut song = NewSong::new(title, vec![0xFF, 0xFB, 0x90])
            .with_artist("Artist")
            .with_album("Album")
            .with_duration(123.5)
            .into_song();
        song.created_at = created_at;
        song
    }

    #[tokio::test]
    async fn test_put_and_get_song() {
        let store = setup_store().await;
        let mut song = sample_song("First", 10);
        song.cover = Some(Bytes::from_static(b"png"));
        song.lyrics = Some("[00:01.00]Hi".to_string());
        song.liked = true;

        store.put_song(&song).await.unwrap();

        let songs = store.get_all_songs().await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].without_locator(), song);
        assert!(songs[0].locator.is_some());
    }

    #[tokio::test]
    async fn test_put_song_is_upsert() {
        let store = setup_store().await;
        let mut song = sample_song("Before", 10);
        store.put_song(&song).await.unwrap();

        song.title = "After".to_string();
        song.duration = 200.0;
        store.put_song(&song).await.unwrap();

        let songs = store.get_all_songs().await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "After");
        assert_eq!(songs[0].duration, 200.0);
    }

    #[tokio::test]
    async fn test_songs_ordered_by_creation() {
        let store = setup_store().await;
        store.put_song(&sample_song("Late", 30)).await.unwrap();
        store.put_song(&sample_song("Early", 10)).await.unwrap();
        store.put_song(&sample_song("Middle", 20)).await.unwrap();

        let titles: Vec<_> = store
            .get_all_songs()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Early", "Middle", "Late"]);
    }

    #[tokio::test]
    async fn test_each_load_issues_fresh_locators() {
        let store = setup_store().await;
        store.put_song(&sample_song("Song", 1)).await.unwrap();

        let first = store.get_all_songs().await.unwrap().remove(0).locator.unwrap();
        let second = store.get_all_songs().await.unwrap().remove(0).locator.unwrap();

        assert_ne!(first, second);
        assert!(!store.locators().is_live(&first));
        assert!(store.locators().is_live(&second));
    }

    #[tokio::test]
    async fn test_delete_song_releases_locator() {
        let store = setup_store().await;
        let song = sample_song("Song", 1);
        store.put_song(&song).await.unwrap();
        let locator = store.get_all_songs().await.unwrap().remove(0).locator.unwrap();

        store.delete_song(&song.id).await.unwrap();

        assert!(store.get_all_songs().await.unwrap().is_empty());
        assert!(!store.locators().is_live(&locator));
        // Missing ids are fine
        store.delete_song(&song.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_song_rejected() {
        let store = setup_store().await;
        let mut song = sample_song("Song", 1);
        song.duration = f64::INFINITY;

        let result = store.put_song(&song).await;
        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_playlist_round_trip_keeps_order() {
        let store = setup_store().await;
        let mut playlist = Playlist::new("Mix");
        playlist.description = Some("Evening".to_string());
        playlist.song_ids = vec!["c".into(), "a".into(), "b".into()];

        store.put_playlist(&playlist).await.unwrap();

        let playlists = store.get_all_playlists().await.unwrap();
        assert_eq!(playlists, vec![playlist.clone()]);

        playlist.song_ids = vec!["b".into(), "dangling".into()];
        playlist.use_first_song_cover = false;
        playlist.cover = Some(Bytes::from_static(b"jpg"));
        store.put_playlist(&playlist).await.unwrap();

        let playlists = store.get_all_playlists().await.unwrap();
        assert_eq!(playlists, vec![playlist]);
    }

    #[tokio::test]
    async fn test_delete_playlist() {
        let store = setup_store().await;
        let mut playlist = Playlist::new("Mix");
        playlist.song_ids = vec!["a".into()];
        store.put_playlist(&playlist).await.unwrap();

        store.delete_playlist(&playlist.id).await.unwrap();

        assert!(store.get_all_playlists().await.unwrap().is_empty());
        let (rows,): (i64,) = query_as("SELECT COUNT(*) FROM playlist_songs")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_closed_pool_is_storage_failure() {
        let store = setup_store().await;
        store.pool().close().await;

        let err = store.get_all_songs().await.unwrap_err();
        assert!(err.is_storage_failure());
    }
}
