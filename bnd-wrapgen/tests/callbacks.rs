//! Closures crossing the native traversal boundary: handles are unique
//! while live and the registry empties once every traversal ends.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};

use bnd_wrapgen::callback::{CallbackRegistry, Handle};
use bnd_wrapgen::front::tree::Tree;
use bnd_wrapgen::front::{ChildVisit, Cursor, DeclKind, TypeKind};

const N: usize = 64;

fn fixture() -> Tree {
    let mut t = Tree::new("/virtual/include/shapes.h");
    let root = t.root();
    let int = t.builtin(TypeKind::Int);
    for name in ["CXPoint", "CXSize", "CXRect"] {
        let (node, _) = t.add_struct(root, name);
        t.add_field(node, "a", int);
        t.add_field(node, "b", int);
    }
    t
}

#[test]
fn sequential_scopes_leave_registry_empty() {
    let registry: CallbackRegistry<usize> = CallbackRegistry::new();
    let calls = Cell::new(0);
    for i in 0..N {
        let mut callback = |node: usize, _parent: usize| {
            assert_eq!(node, i);
            calls.set(calls.get() + 1);
            ChildVisit::Continue
        };
        let visit = registry.scope(&mut callback, |handle| {
            assert_eq!(registry.len(), 1);
            // SAFETY: dispatched on this thread while the scope is active.
            unsafe { registry.dispatch(handle, i, 0) }
        });
        assert_eq!(visit, Some(ChildVisit::Continue));
    }
    assert_eq!(calls.get(), N, "each closure runs exactly once");
    assert!(registry.is_empty());
}

fn nest(registry: &CallbackRegistry<usize>, depth: usize, calls: &Cell<usize>, handles: &RefCell<HashSet<Handle>>) {
    if depth == 0 {
        return;
    }
    let mut callback = |node: usize, _parent: usize| {
        assert_eq!(node, depth);
        calls.set(calls.get() + 1);
        ChildVisit::Recurse
    };
    registry.scope(&mut callback, |handle| {
        assert!(handles.borrow_mut().insert(handle), "live handles must be unique");
        assert_eq!(registry.len(), N - depth + 1);
        // SAFETY: dispatched on this thread while the scope is active.
        let visit = unsafe { registry.dispatch(handle, depth, 0) };
        assert_eq!(visit, Some(ChildVisit::Recurse));
        nest(registry, depth - 1, calls, handles);
    });
}

#[test]
fn nested_scopes_unwind_to_empty() {
    let registry: CallbackRegistry<usize> = CallbackRegistry::new();
    let calls = Cell::new(0);
    let handles = RefCell::new(HashSet::new());
    nest(&registry, N, &calls, &handles);
    assert_eq!(calls.get(), N);
    assert_eq!(handles.borrow().len(), N);
    assert!(registry.is_empty());
}

#[test]
fn unknown_handle_is_not_dispatched() {
    let registry: CallbackRegistry<usize> = CallbackRegistry::new();
    let handle = Handle::from_client_data(7usize as *mut c_void);
    // SAFETY: nothing is registered, so no closure is touched.
    assert_eq!(unsafe { registry.dispatch(handle, 0, 0) }, None);
    assert_eq!(handle.as_client_data() as usize, 7);
}

#[test]
fn tree_traversal_visits_depth_first() {
    let tree = fixture();
    let mut seen = Vec::new();
    let stopped = tree.root_cursor().visit(&mut |cursor, parent| {
        seen.push((cursor.spelling(), parent.kind()));
        ChildVisit::Recurse
    });
    assert!(!stopped);
    assert_eq!(seen.len(), 9);
    assert_eq!(seen[0], ("CXPoint".to_string(), DeclKind::TranslationUnit));
    assert_eq!(seen[1], ("a".to_string(), DeclKind::Struct));
    assert!(tree.callbacks().is_empty());
}

#[test]
fn nested_tree_traversals_are_reentrant() {
    let tree = fixture();
    let mut fields = 0;
    tree.root_cursor().visit(&mut |cursor, _| {
        if cursor.kind() == DeclKind::Struct {
            cursor.visit(&mut |field, parent| {
                assert_eq!(field.kind(), DeclKind::Field);
                assert_eq!(parent.spelling(), cursor.spelling());
                assert_eq!(tree.callbacks().len(), 2, "outer and inner visitor are live");
                fields += 1;
                ChildVisit::Continue
            });
        }
        ChildVisit::Continue
    });
    assert_eq!(fields, 6);
    assert!(tree.callbacks().is_empty());
}

#[test]
fn early_break_releases_the_closure() {
    let tree = fixture();
    let mut visited = 0;
    let stopped = tree.root_cursor().visit(&mut |_, _| {
        visited += 1;
        ChildVisit::Break
    });
    assert!(stopped);
    assert_eq!(visited, 1);
    assert!(tree.callbacks().is_empty());
}

#[test]
fn panicking_visitor_releases_the_closure() {
    let tree = fixture();
    let result = catch_unwind(AssertUnwindSafe(|| {
        tree.root_cursor().visit(&mut |cursor, _| {
            if cursor.spelling() == "CXSize" {
                panic!("visitor failed");
            }
            ChildVisit::Recurse
        })
    }));
    assert!(result.is_err());
    assert!(tree.callbacks().is_empty());
}
