//! Where model bytes come from.
//!
//! Native builds read files below an asset root, the web build fetches over
//! HTTP relative to the page. Both report progress as (loaded, total) bytes.

use std::future::Future;

use anyhow::Context;

pub trait AssetSource {
    /// Fetch the bytes at `path`. `progress` receives (loaded, total) byte
    /// counts; `total` is `None` when the size is unknown up front.
    fn fetch(
        &self,
        path: &str,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> impl Future<Output = anyhow::Result<Vec<u8>>>;
}

/**
 * Resolves a URI found inside a model (external buffer or image) against the
 * model's own path. Absolute paths and URLs with a scheme pass through.
 */
pub fn resolve_relative(model_path: &str, uri: &str) -> anyhow::Result<String> {
    if uri.starts_with("data:") {
        let head: String = uri.chars().take(32).collect();
        anyhow::bail!("embedded data URIs are not supported ({}...)", head);
    }
    if uri.starts_with('/') || uri.contains("://") {
        return Ok(uri.to_string());
    }
    Ok(match model_path.rfind('/') {
        Some(idx) => format!("{}{}", &model_path[..=idx], uri),
        None => uri.to_string(),
    })
}

#[cfg(not(target_arch = "wasm32"))]
const CHUNK_SIZE: usize = 64 * 1024;

/// Reads assets from the local file system.
///
/// Candidate paths are taken relative to `root`, including absolute ones
/// (`/images/a.glb` is `<root>/images/a.glb`), mirroring how a web server maps
/// them onto its public directory.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Debug)]
pub struct FileSource {
    root: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileSource {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, path: &str) -> std::path::PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl AssetSource for FileSource {
    async fn fetch(
        &self,
        path: &str,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> anyhow::Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;

        let full_path = self.resolve(path);
        let mut file = tokio::fs::File::open(&full_path)
            .await
            .with_context(|| format!("cannot open {}", full_path.display()))?;
        let total = file.metadata().await.ok().map(|meta| meta.len());
        let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; CHUNK_SIZE];
        loop {
            let read = file
                .read(&mut chunk)
                .await
                .with_context(|| format!("cannot read {}", full_path.display()))?;
            if read == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..read]);
            progress(data.len() as u64, total);
        }
        Ok(data)
    }
}

/// Fetches assets relative to the page the viewer is embedded in.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Debug)]
pub struct HttpSource {
    base: reqwest::Url,
}

#[cfg(target_arch = "wasm32")]
impl HttpSource {
    pub fn new(base: reqwest::Url) -> Self {
        Self { base }
    }

    pub fn from_location() -> anyhow::Result<Self> {
        let window = web_sys::window().context("no global window")?;
        let href = window
            .location()
            .href()
            .map_err(|e| anyhow::anyhow!("cannot read page location: {:?}", e))?;
        let base = reqwest::Url::parse(&href).context("page location is not a valid URL")?;
        Ok(Self::new(base))
    }

    fn url(&self, path: &str) -> anyhow::Result<reqwest::Url> {
        self.base
            .join(path)
            .with_context(|| format!("cannot resolve {} against {}", path, self.base))
    }
}

#[cfg(target_arch = "wasm32")]
impl AssetSource for HttpSource {
    async fn fetch(
        &self,
        path: &str,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> anyhow::Result<Vec<u8>> {
        let url = self.url(path)?;
        let response = reqwest::get(url.clone())
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()?;
        let total = response.content_length();
        let bytes = response.bytes().await?;
        progress(bytes.len() as u64, total);
        Ok(bytes.to_vec())
    }
}
