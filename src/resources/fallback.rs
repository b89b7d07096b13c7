//! Ordered path fallback.
//!
//! A model may live at one of several candidate locations. [`load_first`]
//! walks the candidates left to right, fetching and decoding each one in turn,
//! and stops at the first success. Every failure (missing file, HTTP error,
//! broken bytes) is treated the same way: log it and move on. A failed path is
//! never retried, and once a candidate succeeds the remaining ones are never
//! touched.

use std::future::Future;

use crate::resources::source::AssetSource;

/// Progress of a single attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadProgress {
    /// Index of the candidate being fetched.
    pub attempt: usize,
    pub path: String,
    pub loaded: u64,
    pub total: Option<u64>,
}

impl LoadProgress {
    /// Completed fraction in `0.0..=1.0`, if the total size is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.loaded as f64 / total as f64).min(1.0)),
            None => None,
        }
    }

    pub fn percent(&self) -> Option<u32> {
        self.fraction().map(|f| (f * 100.0).round() as u32)
    }
}

#[derive(Debug)]
pub enum Fallback<T> {
    Loaded {
        index: usize,
        path: String,
        asset: T,
    },
    Exhausted {
        /// One entry per candidate, in the order they were tried.
        failures: Vec<(String, anyhow::Error)>,
    },
}

impl<T> Fallback<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Fallback::Loaded { .. })
    }

    pub fn asset(self) -> Option<T> {
        match self {
            Fallback::Loaded { asset, .. } => Some(asset),
            Fallback::Exhausted { .. } => None,
        }
    }
}

/**
 * Tries `candidates` in order. Each attempt fetches the bytes through
 * `source` and hands them to `decode` together with the candidate path.
 *
 * Progress of every attempt is reported through `on_progress`.
 */
pub async fn load_first<S, T, D, Fut>(
    source: &S,
    candidates: &[String],
    on_progress: &mut dyn FnMut(&LoadProgress),
    mut decode: D,
) -> Fallback<T>
where
    S: AssetSource,
    D: FnMut(String, Vec<u8>) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut failures = Vec::new();
    for (index, path) in candidates.iter().enumerate() {
        if index > 0 {
            log::info!("Trying alternate path: {}", path);
        }
        let mut report = |loaded: u64, total: Option<u64>| {
            on_progress(&LoadProgress {
                attempt: index,
                path: path.clone(),
                loaded,
                total,
            })
        };
        let attempt = match source.fetch(path, &mut report).await {
            Ok(bytes) => decode(path.clone(), bytes).await,
            Err(e) => Err(e),
        };
        match attempt {
            Ok(asset) => {
                return Fallback::Loaded {
                    index,
                    path: path.clone(),
                    asset,
                };
            }
            Err(e) => {
                log::error!("Error loading model from {}: {:#}", path, e);
                failures.push((path.clone(), e));
            }
        }
    }
    Fallback::Exhausted { failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Serves a fixed payload for the listed paths, fails everything else.
    struct Scripted {
        ok: Vec<&'static str>,
        fetched: RefCell<Vec<String>>,
    }

    impl AssetSource for Scripted {
        async fn fetch(
            &self,
            path: &str,
            progress: &mut dyn FnMut(u64, Option<u64>),
        ) -> anyhow::Result<Vec<u8>> {
            self.fetched.borrow_mut().push(path.to_string());
            if self.ok.iter().any(|ok| *ok == path) {
                progress(2, Some(4));
                progress(4, Some(4));
                Ok(path.as_bytes().to_vec())
            } else {
                anyhow::bail!("404 for {}", path)
            }
        }
    }

    fn candidates(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn first_success_stops_the_walk() {
        let source = Scripted {
            ok: vec!["/b.glb", "/c.glb"],
            fetched: RefCell::new(vec![]),
        };
        let result = load_first(
            &source,
            &candidates(&["/a.glb", "/b.glb", "/c.glb"]),
            &mut |_| {},
            |_, bytes| async move { Ok::<_, anyhow::Error>(String::from_utf8(bytes)?) },
        )
        .await;
        match result {
            Fallback::Loaded { index, path, asset } => {
                assert_eq!(index, 1);
                assert_eq!(path, "/b.glb");
                assert_eq!(asset, "/b.glb");
            }
            Fallback::Exhausted { .. } => panic!("expected a loaded asset"),
        }
        assert_eq!(*source.fetched.borrow(), vec!["/a.glb", "/b.glb"]);
    }

    #[tokio::test]
    async fn decode_failures_advance_like_fetch_failures() {
        let source = Scripted {
            ok: vec!["/a.glb", "/b.glb"],
            fetched: RefCell::new(vec![]),
        };
        let result = load_first(
            &source,
            &candidates(&["/a.glb", "/b.glb"]),
            &mut |_| {},
            |path, _| async move {
                if path == "/a.glb" {
                    anyhow::bail!("not a glb")
                }
                Ok::<_, anyhow::Error>(path)
            },
        )
        .await;
        assert_eq!(result.asset().as_deref(), Some("/b.glb"));
    }

    #[tokio::test]
    async fn exhaustion_keeps_every_failure_in_order() {
        let source = Scripted {
            ok: vec![],
            fetched: RefCell::new(vec![]),
        };
        let result: Fallback<()> = load_first(
            &source,
            &candidates(&["/a.glb", "/b.glb", "/c.glb"]),
            &mut |_| {},
            |_, _| async { Ok::<_, anyhow::Error>(()) },
        )
        .await;
        let Fallback::Exhausted { failures } = result else {
            panic!("expected exhaustion");
        };
        let paths: Vec<_> = failures.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["/a.glb", "/b.glb", "/c.glb"]);
        assert_eq!(source.fetched.borrow().len(), 3);
    }

    #[tokio::test]
    async fn progress_is_tagged_with_the_attempt() {
        let source = Scripted {
            ok: vec!["/b.glb"],
            fetched: RefCell::new(vec![]),
        };
        let mut reports = Vec::new();
        let result = load_first(
            &source,
            &candidates(&["/a.glb", "/b.glb"]),
            &mut |p| reports.push(p.clone()),
            |_, _| async { Ok::<_, anyhow::Error>(()) },
        )
        .await;
        assert!(result.is_loaded());
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|p| p.attempt == 1 && p.path == "/b.glb"));
        assert_eq!(reports[0].percent(), Some(50));
        assert_eq!(reports[1].fraction(), Some(1.0));
    }

    #[test]
    fn unknown_total_has_no_fraction() {
        let progress = LoadProgress {
            attempt: 0,
            path: "/a.glb".into(),
            loaded: 10,
            total: None,
        };
        assert_eq!(progress.fraction(), None);
    }
}
