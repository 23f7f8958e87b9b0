//! Extension registry: binds Rust types to MessagePack ext codes.
//!
//! The registry is process-wide and indexed two ways: type → (code,
//! pack fn) for the pack path and code → unpack fn for the unpack path.
//! Registrations belong in startup code, before concurrent use; after that
//! the registry is read-only and lookups are cheap. A duplicate code or
//! type replaces the earlier binding (last wins) with a warning;
//! re-registering an identical (type, code) pair is idempotent and silent.
//!
//! Generic decoding leaves registered ext values opaque ([`Value::Ext`]);
//! typed conversion happens at the API edge with [`to_value`] /
//! [`from_value`] (or [`dumps_ext`](crate::dumps_ext) /
//! [`loads_ext`](crate::loads_ext) for whole documents), since a foreign
//! typed value cannot inhabit the static taxonomy.

pub mod complex;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Error;
use crate::options::{PackOptions, UnpackOptions};
use crate::value::Value;

/// Ext codes used by the extensions shipped with this crate.
pub mod code {
    /// Complex number: two big-endian IEEE-754 binary32, real part first.
    pub const COMPLEX: i8 = 0x50;
}

type PackFn = Arc<dyn Fn(&dyn Any, &PackOptions) -> Result<Vec<u8>, Error> + Send + Sync>;
type UnpackFn =
    Arc<dyn Fn(&[u8], &UnpackOptions) -> Result<Box<dyn Any + Send>, Error> + Send + Sync>;

struct PackEntry {
    code: i8,
    pack: PackFn,
}

struct UnpackEntry {
    type_id: TypeId,
    unpack: UnpackFn,
}

#[derive(Default)]
struct Registry {
    by_type: HashMap<TypeId, PackEntry>,
    by_code: HashMap<i8, UnpackEntry>,
}

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(Registry::default()));

fn read_lock() -> RwLockReadGuard<'static, Registry> {
    REGISTRY.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock() -> RwLockWriteGuard<'static, Registry> {
    REGISTRY.write().unwrap_or_else(PoisonError::into_inner)
}

/// Registers an extension for a type shipped with this crate.
///
/// `code` must be in the application range [0, 127]; the negative range is
/// reserved by the MessagePack spec and cannot be registered.
pub fn register_builtin<T, P, U>(code: i8, pack: P, unpack: U)
where
    T: Any + Send,
    P: Fn(&T, &PackOptions) -> Result<Vec<u8>, Error> + Send + Sync + 'static,
    U: Fn(&[u8], &UnpackOptions) -> Result<T, Error> + Send + Sync + 'static,
{
    register::<T, P, U>(code, pack, unpack);
}

/// Registers an extension for an application type. Same mechanism as
/// [`register_builtin`]; both are keyed by the type's `TypeId`.
pub fn register_user<T, P, U>(code: i8, pack: P, unpack: U)
where
    T: Any + Send,
    P: Fn(&T, &PackOptions) -> Result<Vec<u8>, Error> + Send + Sync + 'static,
    U: Fn(&[u8], &UnpackOptions) -> Result<T, Error> + Send + Sync + 'static,
{
    register::<T, P, U>(code, pack, unpack);
}

fn register<T, P, U>(code: i8, pack: P, unpack: U)
where
    T: Any + Send,
    P: Fn(&T, &PackOptions) -> Result<Vec<u8>, Error> + Send + Sync + 'static,
    U: Fn(&[u8], &UnpackOptions) -> Result<T, Error> + Send + Sync + 'static,
{
    assert!(
        code >= 0,
        "ext code {code} is in the range reserved by the MessagePack spec"
    );
    let type_id = TypeId::of::<T>();

    let erased_pack: PackFn = Arc::new(move |value, options| match value.downcast_ref::<T>() {
        Some(v) => pack(v, options),
        None => Err(Error::UnsupportedType(format!(
            "ext code {code} is bound to a different type"
        ))),
    });
    let erased_unpack: UnpackFn =
        Arc::new(move |data, options| Ok(Box::new(unpack(data, options)?) as Box<dyn Any + Send>));

    let mut registry = write_lock();
    // Last registration wins; evict any binding the new one displaces so
    // the two indices stay consistent.
    if let Some(prev) = registry.by_code.remove(&code) {
        if prev.type_id != type_id {
            tracing::warn!(code, "ext code rebound to a different type");
            registry.by_type.remove(&prev.type_id);
        }
    }
    if let Some(prev) = registry.by_type.remove(&type_id) {
        if prev.code != code {
            tracing::warn!(
                old_code = prev.code,
                new_code = code,
                "type rebound to a different ext code"
            );
            registry.by_code.remove(&prev.code);
        }
    }
    registry.by_type.insert(
        type_id,
        PackEntry {
            code,
            pack: erased_pack,
        },
    );
    registry.by_code.insert(
        code,
        UnpackEntry {
            type_id,
            unpack: erased_unpack,
        },
    );
}

/// Returns the ext code registered for `T`, if any.
pub fn lookup_by_type<T: Any>() -> Option<i8> {
    read_lock().by_type.get(&TypeId::of::<T>()).map(|e| e.code)
}

/// Returns whether an unpack function is registered for `code`.
pub fn lookup_by_code(code: i8) -> bool {
    read_lock().by_code.contains_key(&code)
}

/// Packs a registered type into its [`Value::Ext`] envelope.
pub fn to_value<T: Any>(value: &T, options: &PackOptions) -> Result<Value, Error> {
    let entry = {
        let registry = read_lock();
        match registry.by_type.get(&TypeId::of::<T>()) {
            Some(entry) => (entry.code, entry.pack.clone()),
            None => {
                return Err(Error::UnsupportedType(format!(
                    "no ext registration for {}",
                    std::any::type_name::<T>()
                )));
            }
        }
    };
    let (code, pack) = entry;
    Ok(Value::Ext(code, pack(value, options)?))
}

/// Unpacks a [`Value::Ext`] through the registration for its code.
pub fn from_value<T: Any>(value: &Value, options: &UnpackOptions) -> Result<T, Error> {
    let Value::Ext(code, data) = value else {
        return Err(Error::UnsupportedType(format!(
            "expected an ext value, got {value}"
        )));
    };
    let unpack = {
        let registry = read_lock();
        match registry.by_code.get(code) {
            Some(entry) => entry.unpack.clone(),
            None => {
                return Err(Error::UnsupportedType(format!(
                    "no ext registration for code {code}"
                )));
            }
        }
    };
    match unpack(data, options)?.downcast::<T>() {
        Ok(v) => Ok(*v),
        Err(_) => Err(Error::UnsupportedType(format!(
            "ext code {code} is not registered to {}",
            std::any::type_name::<T>()
        ))),
    }
}
