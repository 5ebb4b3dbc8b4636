//! Per-parse customization: category hooks and extension tables.
//!
//! Every extensible object category has a [`CategoryHooks`] (or
//! [`AsyncHooks`] for categories that load bytes) with three optional
//! functions and an ordered table of extension callbacks:
//!
//! 1. `preprocess` edits the raw definition before anything is built.
//! 2. `process` may return a replacement for the default construction.
//! 3. Extension callbacks run, in table order, for each extension key
//!    present on the definition.
//! 4. `postprocess` sees the definition and the finished object.
//!
//! ```ignore
//! let mut options = LoadOptions::default();
//! options.hooks.node.extensions.register("EXT_my_tag", |value, node| {
//!     node.tags.push(value.to_string());
//!     Ok(())
//! });
//! options.hooks.node.postprocess = Some(Box::new(|def: &NodeDef, node: &mut Node| {
//!     if def.mesh.is_none() { node.name.push_str("_empty"); }
//! }));
//! ```

use std::future::Future;

use futures::future::BoxFuture;
use gltf_core::buffer::{BufferSlice, ResolvedView};
use gltf_core::error::Result;
use serde_json::Value;

use crate::animation::AnimTrack;
use crate::document::{
    AnimationDef, BufferDef, BufferViewDef, CameraDef, Document, Extensions, HasExtensions,
    ImageDef, LightDef, MaterialDef, NodeDef, SceneDef, TextureDef,
};
use crate::graph::{Camera, Light, Node, Scene};
use crate::loader::GltfBundle;
use crate::material::Material;
use crate::texture::{Image, Texture};

pub type PreprocessFn<D> = Box<dyn Fn(&mut D) + Send + Sync>;
pub type ProcessFn<D, T> = Box<dyn Fn(&D) -> Option<T> + Send + Sync>;
pub type AsyncProcessFn<D, T> =
    Box<dyn Fn(&D) -> BoxFuture<'static, Result<Option<T>>> + Send + Sync>;
pub type PostprocessFn<D, T> = Box<dyn Fn(&D, &mut T) + Send + Sync>;
pub type ExtensionFn<T> = Box<dyn Fn(&Value, &mut T) -> Result<()> + Send + Sync>;

// ============================================================================
// ExtensionTable
// ============================================================================

/// Ordered extension-name to callback table for one object category.
pub struct ExtensionTable<T> {
    entries: Vec<(String, ExtensionFn<T>)>,
}

impl<T> Default for ExtensionTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> ExtensionTable<T> {
    /// Add a callback. Re-registering a name replaces the callback in place.
    pub fn register<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(&Value, &mut T) -> Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = Box::new(callback),
            None => self.entries.push((name, Box::new(callback))),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| n != name);
        self.entries.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold every registered callback whose extension is present over `target`.
    pub fn apply(&self, extensions: Option<&Extensions>, target: &mut T) -> Result<()> {
        let Some(extensions) = extensions else {
            return Ok(());
        };
        for (name, callback) in &self.entries {
            if let Some(value) = extensions.get(name) {
                callback(value, target)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Category hooks
// ============================================================================

/// Hooks for a category built synchronously.
pub struct CategoryHooks<D, T> {
    pub preprocess: Option<PreprocessFn<D>>,
    pub process: Option<ProcessFn<D, T>>,
    pub postprocess: Option<PostprocessFn<D, T>>,
    pub extensions: ExtensionTable<T>,
}

impl<D, T> Default for CategoryHooks<D, T> {
    fn default() -> Self {
        Self {
            preprocess: None,
            process: None,
            postprocess: None,
            extensions: ExtensionTable::default(),
        }
    }
}

impl<D: HasExtensions, T> CategoryHooks<D, T> {
    pub fn preprocess_all(&self, defs: &mut [D]) {
        if let Some(pre) = &self.preprocess {
            defs.iter_mut().for_each(|d| pre(d));
        }
    }

    /// Build one object, letting `process` substitute the default `build`.
    pub fn construct(&self, def: &D, build: impl FnOnce(&D) -> Result<T>) -> Result<T> {
        let mut value = match self.process.as_ref().and_then(|p| p(def)) {
            Some(v) => v,
            None => build(def)?,
        };
        self.extensions.apply(def.extensions(), &mut value)?;
        if let Some(post) = &self.postprocess {
            post(def, &mut value);
        }
        Ok(value)
    }
}

/// Hooks for a category whose construction loads bytes.
pub struct AsyncHooks<D, T> {
    pub preprocess: Option<PreprocessFn<D>>,
    pub process: Option<AsyncProcessFn<D, T>>,
    pub postprocess: Option<PostprocessFn<D, T>>,
    pub extensions: ExtensionTable<T>,
}

impl<D, T> Default for AsyncHooks<D, T> {
    fn default() -> Self {
        Self {
            preprocess: None,
            process: None,
            postprocess: None,
            extensions: ExtensionTable::default(),
        }
    }
}

impl<D: HasExtensions, T> AsyncHooks<D, T> {
    pub fn preprocess_all(&self, defs: &mut [D]) {
        if let Some(pre) = &self.preprocess {
            defs.iter_mut().for_each(|d| pre(d));
        }
    }

    /// Async counterpart of [`CategoryHooks::construct`].
    pub async fn construct<F, Fut>(&self, def: &D, build: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let substituted = match &self.process {
            Some(process) => process(def).await?,
            None => None,
        };
        let mut value = match substituted {
            Some(v) => v,
            None => build().await?,
        };
        self.extensions.apply(def.extensions(), &mut value)?;
        if let Some(post) = &self.postprocess {
            post(def, &mut value);
        }
        Ok(value)
    }
}

/// Hooks run once at the very start and very end of a parse.
#[derive(Default)]
pub struct GlobalHooks {
    pub preprocess: Option<Box<dyn Fn(&mut Document) + Send + Sync>>,
    pub postprocess: Option<Box<dyn Fn(&Document, &mut GltfBundle) + Send + Sync>>,
}

/// The complete hook table for one parse.
#[derive(Default)]
pub struct Hooks {
    pub global: GlobalHooks,
    pub node: CategoryHooks<NodeDef, Node>,
    pub scene: CategoryHooks<SceneDef, Scene>,
    pub camera: CategoryHooks<CameraDef, Camera>,
    pub light: CategoryHooks<LightDef, Light>,
    pub animation: CategoryHooks<AnimationDef, AnimTrack>,
    pub material: CategoryHooks<MaterialDef, Material>,
    pub texture: CategoryHooks<TextureDef, Texture>,
    pub image: AsyncHooks<ImageDef, Image>,
    pub buffer: AsyncHooks<BufferDef, BufferSlice>,
    pub buffer_view: AsyncHooks<BufferViewDef, ResolvedView>,
}

impl Hooks {
    /// Run the global preprocess hook, then every category preprocess hook.
    pub fn preprocess_document(&self, doc: &mut Document) {
        if let Some(pre) = &self.global.preprocess {
            pre(doc);
        }
        self.node.preprocess_all(&mut doc.nodes);
        self.scene.preprocess_all(&mut doc.scenes);
        self.camera.preprocess_all(&mut doc.cameras);
        self.animation.preprocess_all(&mut doc.animations);
        self.material.preprocess_all(&mut doc.materials);
        self.texture.preprocess_all(&mut doc.textures);
        self.image.preprocess_all(&mut doc.images);
        self.buffer.preprocess_all(&mut doc.buffers);
        self.buffer_view.preprocess_all(&mut doc.buffer_views);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gltf_core::error::GltfError;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct Tagged {
        tags: Vec<String>,
    }

    struct Def {
        extensions: Option<Extensions>,
    }

    impl HasExtensions for Def {
        fn extensions(&self) -> Option<&Extensions> {
            self.extensions.as_ref()
        }
    }

    fn def_with(exts: Value) -> Def {
        Def {
            extensions: exts.as_object().cloned(),
        }
    }

    #[test]
    fn test_extension_fold_order() {
        let mut table: ExtensionTable<Tagged> = ExtensionTable::default();
        table.register("B", |_, t: &mut Tagged| {
            t.tags.push("b".into());
            Ok(())
        });
        table.register("A", |v, t: &mut Tagged| {
            t.tags.push(format!("a{}", v["n"]));
            Ok(())
        });
        table.register("C", |_, t: &mut Tagged| {
            t.tags.push("c".into());
            Ok(())
        });

        let def = def_with(json!({"A": {"n": 1}, "B": {}}));
        let mut target = Tagged::default();
        table.apply(def.extensions(), &mut target).unwrap();
        // Table order, not document order; absent extensions skipped.
        assert_eq!(target.tags, vec!["b", "a1"]);
    }

    #[test]
    fn test_extension_replace_and_remove() {
        let mut table: ExtensionTable<Tagged> = ExtensionTable::default();
        table.register("A", |_, t: &mut Tagged| {
            t.tags.push("old".into());
            Ok(())
        });
        table.register("A", |_, t: &mut Tagged| {
            t.tags.push("new".into());
            Ok(())
        });
        assert_eq!(table.names().count(), 1);

        let mut target = Tagged::default();
        table
            .apply(def_with(json!({"A": {}})).extensions(), &mut target)
            .unwrap();
        assert_eq!(target.tags, vec!["new"]);

        assert!(table.remove("A"));
        assert!(!table.contains("A"));
    }

    #[test]
    fn test_construct_pipeline() {
        let mut hooks: CategoryHooks<Def, Tagged> = CategoryHooks::default();
        hooks.extensions.register("X", |_, t: &mut Tagged| {
            t.tags.push("ext".into());
            Ok(())
        });
        hooks.postprocess = Some(Box::new(|_: &Def, t: &mut Tagged| t.tags.push("post".into())));

        let def = def_with(json!({"X": true}));
        let built = hooks
            .construct(&def, |_| {
                Ok(Tagged {
                    tags: vec!["default".into()],
                })
            })
            .unwrap();
        assert_eq!(built.tags, vec!["default", "ext", "post"]);

        hooks.process = Some(Box::new(|_: &Def| {
            Some(Tagged {
                tags: vec!["custom".into()],
            })
        }));
        let built = hooks
            .construct(&def, |_| Err(GltfError::format("default must not run")))
            .unwrap();
        assert_eq!(built.tags, vec!["custom", "ext", "post"]);
    }

    #[test]
    fn test_extension_error_propagates() {
        let mut hooks: CategoryHooks<Def, Tagged> = CategoryHooks::default();
        hooks
            .extensions
            .register("X", |_, _| Err(GltfError::format("rejected")));
        let err = hooks
            .construct(&def_with(json!({"X": 1})), |_| Ok(Tagged::default()))
            .unwrap_err();
        assert!(err.to_string().contains("rejected"));
    }

    #[test]
    fn test_async_construct_substitution() {
        let mut hooks: AsyncHooks<Def, Vec<u8>> = AsyncHooks::default();
        hooks.process = Some(Box::new(|_: &Def| -> BoxFuture<'static, Result<Option<Vec<u8>>>> {
            Box::pin(async { Ok(Some(vec![7u8])) })
        }));
        let def = def_with(json!({}));
        let out = futures::executor::block_on(hooks.construct(&def, || async { Ok(vec![1u8]) }))
            .unwrap();
        assert_eq!(out, vec![7]);

        hooks.process = Some(Box::new(|_: &Def| -> BoxFuture<'static, Result<Option<Vec<u8>>>> {
            Box::pin(async { Ok(None) })
        }));
        let out = futures::executor::block_on(hooks.construct(&def, || async { Ok(vec![1u8]) }))
            .unwrap();
        assert_eq!(out, vec![1]);
    }
}
