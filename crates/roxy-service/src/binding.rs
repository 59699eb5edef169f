//! Binds a single, changing key to the [`Loader`].
//!
//! A [`LoadBinding`] is what a consumer holds for one slot that displays a remote
//! payload. It tracks the state of the most recent load and avoids requesting a payload it
//! already holds.

use bytes::Bytes;
use url::Url;

use crate::loader::Loader;
use crate::types::LoadError;

/// The state of a [`LoadBinding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing was loaded yet, or a load is in progress.
    Loading,
    /// The load finished.
    ///
    /// `payload` is `None` if there was no key to load, or if the load produced no
    /// usable payload.
    Loaded {
        key: Option<Url>,
        payload: Option<Bytes>,
    },
    /// The load failed or was cancelled.
    Failed(LoadError),
}

/// Holds the [`LoadState`] for the key it was last loaded with.
#[derive(Debug, Clone)]
pub struct LoadBinding {
    key: Option<Url>,
    state: LoadState,
}

impl Default for LoadBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBinding {
    pub fn new() -> Self {
        Self {
            key: None,
            state: LoadState::Loading,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// The key of the most recent [`load`](Self::load).
    pub fn key(&self) -> Option<&Url> {
        self.key.as_ref()
    }

    /// Loads the payload for `key` and returns the new state.
    ///
    /// If the binding already holds a payload for the same key, no request is made. Without
    /// a key, the binding is immediately [`Loaded`](LoadState::Loaded) with nothing.
    pub async fn load(&mut self, loader: &Loader, key: Option<Url>) -> &LoadState {
        if let LoadState::Loaded {
            key: Some(loaded),
            payload: Some(_),
        } = &self.state
            && key.as_ref() == Some(loaded)
        {
            tracing::trace!("Already loaded `{}`", loaded);
            return &self.state;
        }

        self.key = key.clone();
        let Some(key) = key else {
            self.state = LoadState::Loaded {
                key: None,
                payload: None,
            };
            return &self.state;
        };

        self.state = LoadState::Loading;
        self.state = match loader.request(&key).await.into_result() {
            Ok(payload) => LoadState::Loaded {
                key: Some(key),
                payload,
            },
            Err(err) => LoadState::Failed(err),
        };
        &self.state
    }

    /// Cancels the in-flight load of the bound key, if there is one.
    ///
    /// This cancels the load for every caller attached to it, not only for this binding.
    pub fn detach(&self, loader: &Loader) {
        if let Some(key) = &self.key {
            loader.cancel(key);
        }
    }
}
