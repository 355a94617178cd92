// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The reference-counted, observer-bearing handle for one loaded resource.

use crate::access::AccessLevel;
use crate::error::ResourceError;
use crate::kind::ResourceKind;
use crate::observer::{ObserverTag, ResourceObserver};
use crate::path::VirtualPath;
use crate::resource::ResourceValue;
use std::sync::{Arc, Mutex, Weak};

struct ObserverEntry {
    observer: Weak<dyn ResourceObserver>,
    required_access: AccessLevel,
    tag: ObserverTag,
}

struct HandleState {
    access_level: AccessLevel,
    payload: Option<ResourceValue>,
    ref_count: u64,
    observers: Vec<ObserverEntry>,
}

/// One reference-counted, observer-bearing entry, keyed by virtual path.
///
/// `virtual_path` and `kind` are immutable for the handle's lifetime (H2);
/// every other field lives behind `state`, a mutex the caller must never
/// hold while invoking an observer callback.
pub struct ResourceHandle {
    virtual_path: VirtualPath,
    kind: ResourceKind,
    state: Mutex<HandleState>,
}

impl std::fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.lock().unwrap();
        f.debug_struct("ResourceHandle")
            .field("virtual_path", &self.virtual_path)
            .field("kind", &self.kind)
            .field("access_level", &st.access_level)
            .field("ref_count", &st.ref_count)
            .finish()
    }
}

impl ResourceHandle {
    /// Creates a fresh `Unloaded` handle. Only `Database::get_or_create`
    /// should call this, so handle identity stays stable per H2.
    pub(crate) fn new(virtual_path: VirtualPath, kind: ResourceKind) -> Arc<Self> {
        Arc::new(Self {
            virtual_path,
            kind,
            state: Mutex::new(HandleState {
                access_level: AccessLevel::Unloaded,
                payload: None,
                ref_count: 0,
                observers: Vec::new(),
            }),
        })
    }

    /// The canonical virtual path this handle was created under.
    pub fn virtual_path(&self) -> &VirtualPath {
        &self.virtual_path
    }

    /// The resource kind this handle was created under.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// A snapshot of the current access level.
    pub fn access_level(&self) -> AccessLevel {
        self.state.lock().unwrap().access_level
    }

    /// A snapshot of whether a payload is currently resident (H1).
    pub fn is_loaded(&self) -> bool {
        self.state.lock().unwrap().payload.is_some()
    }

    /// A snapshot of the current reference count.
    pub fn ref_count(&self) -> u64 {
        self.state.lock().unwrap().ref_count
    }

    /// Registers a weak observer. If the handle is already loaded at an
    /// access level satisfying `required_access`, `on_loaded` is delivered
    /// immediately to this observer only.
    pub fn observe(
        self: &Arc<Self>,
        observer: Weak<dyn ResourceObserver>,
        required_access: AccessLevel,
        tag: ObserverTag,
    ) {
        let deliver_now = {
            let mut st = self.state.lock().unwrap();
            st.observers.push(ObserverEntry {
                observer: observer.clone(),
                required_access,
                tag,
            });
            st.access_level.satisfies(required_access)
        };
        if deliver_now {
            if let Some(obs) = observer.upgrade() {
                obs.on_loaded(self, tag);
            }
        }
    }

    /// Increments the reference count.
    pub fn acquire(&self) {
        self.state.lock().unwrap().ref_count += 1;
    }

    /// Decrements the reference count.
    ///
    /// Returns `Ok(true)` if this release brought the count to zero on a
    /// still-loaded handle, meaning the caller should schedule a
    /// conditional unload. Returns `Err` if the count was already zero.
    pub fn release(&self) -> Result<bool, ResourceError> {
        let mut st = self.state.lock().unwrap();
        if st.ref_count == 0 {
            return Err(ResourceError::RefCountUnderflow {
                path: self.virtual_path.clone(),
            });
        }
        st.ref_count -= 1;
        Ok(st.ref_count == 0 && st.payload.is_some())
    }

    /// Installs a freshly decoded resource at `access`.
    ///
    /// If the handle was already loaded, first runs the unload path: every
    /// live observer (regardless of its own `required_access`, since
    /// losing the resource is relevant to anyone watching it) receives
    /// `on_unloaded` before the new payload is adopted, per H4.
    pub fn install(self: &Arc<Self>, resource: ResourceValue, access: AccessLevel) {
        self.unload_if_loaded();

        let to_notify = {
            let mut st = self.state.lock().unwrap();
            st.payload = Some(resource);
            st.access_level = access;
            Self::collect_live(&mut st.observers, |req| access.satisfies(req))
        };
        for (obs, tag) in to_notify {
            obs.on_loaded(self, tag);
        }
    }

    /// Releases the payload and notifies every live observer of the
    /// unload, regardless of that observer's `required_access`.
    pub fn unload(self: &Arc<Self>) {
        self.unload_if_loaded();
    }

    fn unload_if_loaded(self: &Arc<Self>) {
        let to_notify = {
            let mut st = self.state.lock().unwrap();
            if st.payload.is_none() {
                return;
            }
            st.payload = None;
            st.access_level = AccessLevel::Unloaded;
            Self::collect_live(&mut st.observers, |_| true)
        };
        for (obs, tag) in to_notify {
            obs.on_unloaded(self, tag);
        }
    }

    /// Purges dead weak observers and collects the still-live ones whose
    /// `required_access` passes `predicate`, without holding `state` while
    /// the caller invokes their callbacks.
    fn collect_live(
        observers: &mut Vec<ObserverEntry>,
        predicate: impl Fn(AccessLevel) -> bool,
    ) -> Vec<(Arc<dyn ResourceObserver>, ObserverTag)> {
        let mut notify = Vec::new();
        observers.retain(|entry| match entry.observer.upgrade() {
            Some(obs) => {
                if predicate(entry.required_access) {
                    notify.push((obs, entry.tag));
                }
                true
            }
            None => false,
        });
        notify
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::FlverPayload;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingObserver {
        loaded: AtomicUsize,
        unloaded: AtomicUsize,
    }

    impl CountingObserver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                loaded: AtomicUsize::new(0),
                unloaded: AtomicUsize::new(0),
            })
        }
    }

    impl ResourceObserver for CountingObserver {
        fn on_loaded(&self, _handle: &Arc<ResourceHandle>, _tag: ObserverTag) {
            self.loaded.fetch_add(1, Ordering::SeqCst);
        }
        fn on_unloaded(&self, _handle: &Arc<ResourceHandle>, _tag: ObserverTag) {
            self.unloaded.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn flver(bytes: &[u8]) -> ResourceValue {
        ResourceValue::Flver(FlverPayload {
            bytes: bytes.to_vec(),
        })
    }

    #[test]
    fn h1_payload_presence_matches_access_level() {
        let h = ResourceHandle::new(VirtualPath::new("a"), ResourceKind::Flver);
        assert_eq!(h.access_level(), AccessLevel::Unloaded);
        assert!(!h.is_loaded());
        h.install(flver(b"x"), AccessLevel::Full);
        assert!(h.is_loaded());
        h.unload();
        assert!(!h.is_loaded());
        assert_eq!(h.access_level(), AccessLevel::Unloaded);
    }

    #[test]
    fn observe_after_load_delivers_immediately_when_satisfied() {
        let h = ResourceHandle::new(VirtualPath::new("a"), ResourceKind::Flver);
        h.install(flver(b"x"), AccessLevel::Full);
        let obs = CountingObserver::new();
        h.observe(Arc::downgrade(&obs) as Weak<dyn ResourceObserver>, AccessLevel::EditOnly, ObserverTag(1));
        assert_eq!(obs.loaded.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observe_after_load_skips_when_unsatisfied() {
        let h = ResourceHandle::new(VirtualPath::new("a"), ResourceKind::Flver);
        h.install(flver(b"x"), AccessLevel::EditOnly);
        let obs = CountingObserver::new();
        h.observe(
            Arc::downgrade(&obs) as Weak<dyn ResourceObserver>,
            AccessLevel::GpuOptimizedOnly,
            ObserverTag(1),
        );
        assert_eq!(obs.loaded.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn p5_reload_unloads_before_loading_again() {
        let h = ResourceHandle::new(VirtualPath::new("a"), ResourceKind::Flver);
        let obs = CountingObserver::new();
        h.observe(Arc::downgrade(&obs) as Weak<dyn ResourceObserver>, AccessLevel::Full, ObserverTag(7));

        h.install(flver(b"first"), AccessLevel::EditOnly);
        assert_eq!(obs.loaded.load(Ordering::SeqCst), 1);
        assert_eq!(obs.unloaded.load(Ordering::SeqCst), 0);

        h.install(flver(b"second"), AccessLevel::Full);
        assert_eq!(obs.unloaded.load(Ordering::SeqCst), 1, "must unload before reloading");
        assert_eq!(obs.loaded.load(Ordering::SeqCst), 2);
        assert_eq!(h.access_level(), AccessLevel::Full);
    }

    #[test]
    fn dead_weak_observer_is_silently_skipped() {
        let h = ResourceHandle::new(VirtualPath::new("a"), ResourceKind::Flver);
        {
            let obs = CountingObserver::new();
            h.observe(Arc::downgrade(&obs) as Weak<dyn ResourceObserver>, AccessLevel::Full, ObserverTag(1));
            // obs dropped here
        }
        // Should not panic, and the dead entry is purged on the next walk.
        h.install(flver(b"x"), AccessLevel::Full);
    }

    #[test]
    fn release_below_zero_is_ref_count_underflow() {
        let h = ResourceHandle::new(VirtualPath::new("a"), ResourceKind::Flver);
        let err = h.release().unwrap_err();
        assert!(matches!(err, ResourceError::RefCountUnderflow { .. }));
    }

    #[test]
    fn release_to_zero_on_loaded_handle_signals_conditional_unload() {
        let h = ResourceHandle::new(VirtualPath::new("a"), ResourceKind::Flver);
        h.install(flver(b"x"), AccessLevel::Full);
        h.acquire();
        h.acquire();
        assert!(!h.release().unwrap(), "still one ref outstanding");
        assert!(h.release().unwrap(), "last release on a loaded handle should signal unload");
    }

    #[test]
    fn release_to_zero_on_unloaded_handle_does_not_signal_unload() {
        let h = ResourceHandle::new(VirtualPath::new("a"), ResourceKind::Flver);
        h.acquire();
        assert!(!h.release().unwrap());
    }
}
