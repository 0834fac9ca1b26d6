//! Stable type identities.
//!
//! A [`TypeKey`] pairs a [`TypeId`] with the compiler-provided type name. Only
//! the `TypeId` takes part in equality and hashing; the name is kept for logs
//! and error messages.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Comparable, hashable handle for a Rust type.
///
/// Works for unsized types too, so trait objects such as
/// `dyn Subscriber<DiscordClient, MessageCreated>` can serve as interface
/// identities.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The underlying [`TypeId`].
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The fully qualified type name as reported by the compiler.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The type name with every module path stripped, generics included.
    ///
    /// `alloc::vec::Vec<alloc::string::String>` becomes `Vec<String>`.
    pub fn short_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut path = String::new();

        for c in self.name.chars() {
            if c.is_alphanumeric() || c == '_' || c == ':' {
                path.push(c);
            } else {
                flush_path(&mut out, &mut path);
                out.push(c);
            }
        }
        flush_path(&mut out, &mut path);

        out
    }

    /// Returns `true` if this key identifies `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

fn flush_path(out: &mut String, path: &mut String) {
    if let Some(last) = path.rsplit("::").next() {
        out.push_str(last);
    }
    path.clear();
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.short_name())
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}
