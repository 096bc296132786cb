//! Resource provider for the server-under-test.
//!
//! `LocalFs` serves the provisioned directory but has no dead-property
//! storage, so PROPPATCH would be refused. [`DeadPropFs`] delegates every
//! resource operation to `LocalFs` and keeps dead properties in memory,
//! keyed by resource path and `(namespace, name)`.
//!
//! Properties follow their resource: MOVE relocates them, COPY duplicates
//! them and DELETE drops them. They live as long as the server instance.

use dashmap::DashMap;
use dav_server::davpath::DavPath;
use dav_server::fs::{
    DavDirEntry, DavFile, DavFileSystem, DavMetaData, DavProp, FsError, FsFuture, FsStream,
    OpenOptions, ReadDirMeta,
};
use dav_server::localfs::LocalFs;
use hyper::StatusCode;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Property identity: (namespace, local name).
type PropKey = (Option<String>, String);

/// Resource path -> dead properties on that resource.
type PropTable = DashMap<String, BTreeMap<PropKey, DavProp>>;

/// Filesystem provider with in-memory dead properties.
#[derive(Clone)]
pub struct DeadPropFs {
    inner: Box<LocalFs>,
    props: Arc<PropTable>,
}

impl DeadPropFs {
    /// Serve `root` from the local filesystem.
    pub fn new(root: &Path) -> Self {
        Self {
            inner: LocalFs::new(root, false, false, false),
            props: Arc::new(DashMap::new()),
        }
    }

    /// Normalize a WebDAV path into a property table key.
    ///
    /// Collections and plain resources share one key space, so the
    /// trailing slash is dropped and the root maps to the empty string.
    fn resource_key(path: &DavPath) -> String {
        let path_str = path.as_url_string();
        let normalized = path_str.trim_start_matches('/').trim_end_matches('/');
        if normalized.is_empty() {
            String::new()
        } else {
            format!("/{normalized}")
        }
    }

    fn is_within(key: &str, base: &str) -> bool {
        key == base || (key.starts_with(base) && key[base.len()..].starts_with('/'))
    }

    /// Copy (or move) the properties of `from` and its descendants to `to`.
    fn relocate(&self, from: &str, to: &str, keep_source: bool) {
        let affected: Vec<String> = self
            .props
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| Self::is_within(key, from))
            .collect();

        for key in affected {
            let target = format!("{to}{}", &key[from.len()..]);
            let props = if keep_source {
                self.props.get(&key).map(|entry| entry.value().clone())
            } else {
                self.props.remove(&key).map(|(_, props)| props)
            };
            if let Some(props) = props {
                trace!(from = %key, to = %target, count = props.len(), "Relocating dead properties");
                self.props.insert(target, props);
            }
        }
    }

    /// Drop the properties of `base` and its descendants.
    fn forget(&self, base: &str) {
        self.props.retain(|key, _| !Self::is_within(key, base));
    }

    fn strip_content(prop: &DavProp) -> DavProp {
        DavProp {
            xml: None,
            ..prop.clone()
        }
    }
}

impl DavFileSystem for DeadPropFs {
    fn open<'a>(&'a self, path: &'a DavPath, options: OpenOptions) -> FsFuture<'a, Box<dyn DavFile>> {
        self.inner.open(path, options)
    }

    fn read_dir<'a>(
        &'a self,
        path: &'a DavPath,
        meta: ReadDirMeta,
    ) -> FsFuture<'a, FsStream<Box<dyn DavDirEntry>>> {
        self.inner.read_dir(path, meta)
    }

    fn metadata<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Box<dyn DavMetaData>> {
        self.inner.metadata(path)
    }

    fn create_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        self.inner.create_dir(path)
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn remove_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            self.inner.remove_dir(path).await?;
            self.forget(&Self::resource_key(path));
            Ok(())
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn remove_file<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            self.inner.remove_file(path).await?;
            self.forget(&Self::resource_key(path));
            Ok(())
        })
    }

    #[instrument(level = "debug", skip(self), fields(from = %from.as_url_string(), to = %to.as_url_string()))]
    fn rename<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            self.inner.rename(from, to).await?;
            let (from_key, to_key) = (Self::resource_key(from), Self::resource_key(to));
            self.forget(&to_key);
            self.relocate(&from_key, &to_key, false);
            Ok(())
        })
    }

    #[instrument(level = "debug", skip(self), fields(from = %from.as_url_string(), to = %to.as_url_string()))]
    fn copy<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            // LocalFs refuses to copy onto an existing file; the handler
            // has already applied Overwrite, so replace it here.
            if let Ok(meta) = self.inner.metadata(to).await
                && !meta.is_dir()
            {
                debug!(path = %to.as_url_string(), "Replacing existing copy destination");
                self.inner.remove_file(to).await?;
            }
            self.inner.copy(from, to).await?;
            let (from_key, to_key) = (Self::resource_key(from), Self::resource_key(to));
            self.forget(&to_key);
            self.relocate(&from_key, &to_key, true);
            Ok(())
        })
    }

    fn have_props<'a>(
        &'a self,
        _path: &'a DavPath,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async { true })
    }

    #[instrument(level = "debug", skip(self, patch), fields(path = %path.as_url_string(), count = patch.len()))]
    fn patch_props<'a>(
        &'a self,
        path: &'a DavPath,
        patch: Vec<(bool, DavProp)>,
    ) -> FsFuture<'a, Vec<(StatusCode, DavProp)>> {
        Box::pin(async move {
            // Patching a missing resource fails the whole request with 404.
            self.inner.metadata(path).await?;

            let key = Self::resource_key(path);
            let mut stored = self.props.entry(key).or_default();
            let mut results = Vec::with_capacity(patch.len());
            for (set, prop) in patch {
                let prop_key = (prop.namespace.clone(), prop.name.clone());
                if set {
                    debug!(name = %prop.name, namespace = ?prop.namespace, "Setting dead property");
                    stored.insert(prop_key, prop.clone());
                } else {
                    debug!(name = %prop.name, namespace = ?prop.namespace, "Removing dead property");
                    stored.remove(&prop_key);
                }
                results.push((StatusCode::OK, Self::strip_content(&prop)));
            }
            Ok(results)
        })
    }

    fn get_props<'a>(&'a self, path: &'a DavPath, do_content: bool) -> FsFuture<'a, Vec<DavProp>> {
        Box::pin(async move {
            let key = Self::resource_key(path);
            let props = self
                .props
                .get(&key)
                .map(|stored| {
                    stored
                        .values()
                        .map(|prop| {
                            if do_content {
                                prop.clone()
                            } else {
                                Self::strip_content(prop)
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(props)
        })
    }

    fn get_prop<'a>(&'a self, path: &'a DavPath, prop: DavProp) -> FsFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let key = Self::resource_key(path);
            let prop_key = (prop.namespace, prop.name);
            self.props
                .get(&key)
                .and_then(|stored| stored.get(&prop_key).and_then(|p| p.xml.clone()))
                .ok_or(FsError::NotFound)
        })
    }
}
