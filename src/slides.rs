use std::collections::HashSet;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

use crate::client::ClassroomClient;
use crate::error::Result;

/// The course session whose slides are being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub course_id: i64,
    /// `id` of the scheduled course, a.k.a. the sub id.
    pub course_real_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSlide {
    pub index: usize,
    pub url: String,
    pub path: PathBuf,
}

/// Remembers which slide URLs were already downloaded during this run.
#[derive(Debug)]
pub struct SlideStore {
    dir: PathBuf,
    seen: HashSet<String>,
}

impl SlideStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seen: HashSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_new(&self, url: &str) -> bool {
        !url.is_empty() && !self.seen.contains(url)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Writes a downloaded slide and marks its URL as seen.
    pub async fn save(&mut self, index: usize, url: &str, data: &[u8]) -> Result<SavedSlide> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name(index, url));
        tokio::fs::write(&path, data).await?;
        self.seen.insert(url.to_string());

        tracing::info!(path = %path.display(), "New image saved");
        Ok(SavedSlide {
            index,
            url: url.to_string(),
            path,
        })
    }

    /// Downloads `url` unless it was seen before.
    pub async fn fetch(
        &mut self,
        client: &ClassroomClient,
        index: usize,
        url: &str,
    ) -> Result<Option<SavedSlide>> {
        if !self.is_new(url) {
            tracing::debug!(url, "Image URL already exists");
            return Ok(None);
        }
        let data = client.download(url).await?;
        self.save(index, url, &data).await.map(Some)
    }
}

/// `<index>_<md5 of url>.jpg`
pub fn file_name(index: usize, url: &str) -> String {
    format!("{index}_{}.jpg", hex::encode(Md5::digest(url.as_bytes())))
}

/// Runs one slide search and downloads every slide not seen yet.
///
/// A slide that fails to download is left unseen so the next round retries it.
pub async fn poll_once(
    client: &ClassroomClient,
    store: &mut SlideStore,
    session: Session,
    per_page: u32,
) -> Result<Vec<SavedSlide>> {
    let contents = client
        .search_ppt(session.course_id, session.course_real_id, 1, per_page)
        .await?;
    tracing::debug!(count = contents.len(), "PPT list fetched");

    let mut saved = Vec::new();
    for (i, content) in contents.iter().enumerate() {
        let Some(url) = content.image_url() else {
            continue;
        };
        match store.fetch(client, i + 1, url).await {
            Ok(Some(slide)) => saved.push(slide),
            Ok(None) => {}
            Err(e) => tracing::warn!(url, "Failed to download slide: {e}"),
        }
    }

    if saved.is_empty() {
        tracing::debug!("No new PPT detected");
    } else {
        tracing::info!(count = saved.len(), "Found and saved new PPT");
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::config::Config;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_name_uses_index_and_url_hash() {
        assert_eq!(
            file_name(3, "https://example.com/a.jpg"),
            format!("3_{}.jpg", hex::encode(Md5::digest(b"https://example.com/a.jpg")))
        );
        assert_eq!(file_name(1, ""), "1_d41d8cd98f00b204e9800998ecf8427e.jpg");
    }

    #[tokio::test]
    async fn save_creates_directory_and_marks_seen() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SlideStore::new(dir.path().join("ppt_images"));
        assert!(store.is_new("https://cdn/a.jpg"));
        assert!(!store.is_new(""));

        let slide = store.save(1, "https://cdn/a.jpg", b"jpeg").await.unwrap();
        assert_eq!(slide.path, store.dir().join(file_name(1, "https://cdn/a.jpg")));
        assert_eq!(std::fs::read(&slide.path).unwrap(), b"jpeg");
        assert!(!store.is_new("https://cdn/a.jpg"));
        assert_eq!(store.seen_count(), 1);
    }

    #[tokio::test]
    async fn poll_downloads_only_new_slides() {
        let mut server = mockito::Server::new_async().await;
        let url_a = format!("{}/img/a.jpg", server.url());
        let url_b = format!("{}/img/b.jpg", server.url());
        let list = |urls: &[&str]| {
            let list: Vec<_> = urls
                .iter()
                .map(|url| serde_json::json!({ "content": serde_json::json!({ "pptimgurl": url }).to_string() }))
                .collect();
            serde_json::json!({ "list": list }).to_string()
        };

        let first = server
            .mock("GET", "/pptnote/v1/schedule/search-ppt")
            .match_query(Matcher::Any)
            .with_body(list(&[url_a.as_str(), ""]))
            .expect(1)
            .create_async()
            .await;
        let image_a = server
            .mock("GET", "/img/a.jpg")
            .with_body("A")
            .expect(1)
            .create_async()
            .await;

        let config = Config {
            base_url: server.url(),
            ..Config::default()
        };
        let credentials = Credentials {
            token: "tok".into(),
            tenant_code: "1".into(),
            cookie_header: "a=b".into(),
        };
        let client = ClassroomClient::new(&config, credentials).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut store = SlideStore::new(dir.path());
        let session = Session {
            course_id: 77,
            course_real_id: 9001,
        };

        let saved = poll_once(&client, &mut store, session, 100).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].index, 1);
        first.assert_async().await;
        first.remove_async().await;

        server
            .mock("GET", "/pptnote/v1/schedule/search-ppt")
            .match_query(Matcher::Any)
            .with_body(list(&[url_a.as_str(), url_b.as_str()]))
            .create_async()
            .await;
        let image_b = server
            .mock("GET", "/img/b.jpg")
            .with_body("B")
            .expect(1)
            .create_async()
            .await;

        let saved = poll_once(&client, &mut store, session, 100).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].index, 2);
        assert_eq!(saved[0].url, url_b);
        assert_eq!(std::fs::read(&saved[0].path).unwrap(), b"B");

        let saved = poll_once(&client, &mut store, session, 100).await.unwrap();
        assert!(saved.is_empty());
        image_a.assert_async().await;
        image_b.assert_async().await;
    }

    #[tokio::test]
    async fn failed_download_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let url = format!("{}/img/c.jpg", server.url());
        let body = serde_json::json!({
            "list": [{ "content": serde_json::json!({ "pptimgurl": url }).to_string() }]
        })
        .to_string();
        server
            .mock("GET", "/pptnote/v1/schedule/search-ppt")
            .match_query(Matcher::Any)
            .with_body(body)
            .create_async()
            .await;
        let broken = server
            .mock("GET", "/img/c.jpg")
            .with_status(500)
            .create_async()
            .await;

        let config = Config {
            base_url: server.url(),
            ..Config::default()
        };
        let credentials = Credentials {
            token: "tok".into(),
            tenant_code: "1".into(),
            cookie_header: "a=b".into(),
        };
        let client = ClassroomClient::new(&config, credentials).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut store = SlideStore::new(dir.path());
        let session = Session {
            course_id: 1,
            course_real_id: 2,
        };

        assert!(poll_once(&client, &mut store, session, 100).await.unwrap().is_empty());
        assert!(store.is_new(&url));
        broken.remove_async().await;

        server
            .mock("GET", "/img/c.jpg")
            .with_body("C")
            .create_async()
            .await;
        let saved = poll_once(&client, &mut store, session, 100).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert!(!store.is_new(&url));
    }
}
