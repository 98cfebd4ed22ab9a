//! Handle registry for closures that cross a C callback boundary.
//!
//! A C traversal API takes a plain function pointer plus an opaque
//! client-data word. Closures are registered here under a small integer
//! handle, the handle travels as the client data, and the `extern "C"`
//! trampoline looks the closure up again on every invocation.

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::front::ChildVisit;

/// Handle of a registered closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(usize);

impl Handle {
    /// Client-data word carrying this handle through the native call.
    pub fn as_client_data(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    pub fn from_client_data(data: *mut c_void) -> Self {
        Self(data as usize)
    }
}

type Callback<A> = dyn FnMut(A, A) -> ChildVisit;

/// Lifetime-erased pointer to a closure owned by an active [`CallbackRegistry::scope`].
struct Entry<A: 'static>(*mut Callback<A>);

// SAFETY: an entry is only dereferenced by `dispatch`, whose contract
// restricts it to the thread running the registering scope.
unsafe impl<A: 'static> Send for Entry<A> {}

struct Table<A: 'static> {
    last: usize,
    entries: HashMap<usize, Entry<A>>,
}

/// Mutex-guarded table of active closures.
pub struct CallbackRegistry<A: 'static> {
    table: Mutex<Table<A>>,
}

impl<A: 'static> Default for CallbackRegistry<A> {
    fn default() -> Self {
        Self {
            table: Mutex::new(Table {
                last: 0,
                entries: HashMap::new(),
            }),
        }
    }
}

impl<A: 'static> std::fmt::Debug for CallbackRegistry<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("active", &self.len())
            .finish()
    }
}

impl<A: 'static> CallbackRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table<A>> {
        // A panicking visitor never leaves the table half-updated.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of closures currently registered.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register `callback` for the duration of `body`.
    ///
    /// `body` receives the handle to pass as client data. The closure is
    /// unregistered when `body` returns, including by unwinding.
    pub fn scope<R>(
        &self,
        callback: &mut (dyn FnMut(A, A) -> ChildVisit + '_),
        body: impl FnOnce(Handle) -> R,
    ) -> R {
        let handle = self.register(callback);
        let _guard = Unregister {
            registry: self,
            handle,
        };
        body(handle)
    }

    fn register(&self, callback: &mut (dyn FnMut(A, A) -> ChildVisit + '_)) -> Handle {
        let short: *mut (dyn FnMut(A, A) -> ChildVisit + '_) = callback;
        // SAFETY: only the trait-object lifetime changes. The entry is
        // removed by `Unregister` before `scope` returns, so it never
        // outlives the borrow it was made from.
        let erased: *mut Callback<A> = unsafe { std::mem::transmute(short) };

        let mut table = self.lock();
        // Nested traversals stay registered while their parent runs, so
        // always move on to the next unused handle.
        let mut next = table.last;
        loop {
            next = next.wrapping_add(1);
            if next != 0 && !table.entries.contains_key(&next) {
                break;
            }
        }
        table.last = next;
        table.entries.insert(next, Entry(erased));
        trace!(handle = next, active = table.entries.len(), "registered callback");
        Handle(next)
    }

    fn unregister(&self, handle: Handle) {
        let mut table = self.lock();
        table.entries.remove(&handle.0);
        trace!(handle = handle.0, active = table.entries.len(), "unregistered callback");
    }

    /// Invoke the closure registered under `handle`. Returns `None` for an
    /// unknown handle.
    ///
    /// The table lock is released before the closure runs, so the closure may
    /// register nested traversals.
    ///
    /// # Safety
    ///
    /// Must be called on the thread running the [`scope`](Self::scope) that
    /// registered `handle`, while that scope is active, and not re-entrantly
    /// for the same handle.
    pub unsafe fn dispatch(&self, handle: Handle, node: A, parent: A) -> Option<ChildVisit> {
        let callback = self.lock().entries.get(&handle.0).map(|e| e.0)?;
        // SAFETY: the caller guarantees the registering scope is alive on
        // this thread, so the closure behind the pointer is too.
        let callback = unsafe { &mut *callback };
        Some(callback(node, parent))
    }
}

struct Unregister<'r, A: 'static> {
    registry: &'r CallbackRegistry<A>,
    handle: Handle,
}

impl<A: 'static> Drop for Unregister<'_, A> {
    fn drop(&mut self) {
        self.registry.unregister(self.handle);
    }
}
