//! Buffer and buffer-view resolution.
//!
//! Every document buffer is materialized before any accessor is read. Each
//! buffer comes from exactly one source, in priority order:
//!
//! 1. the `buffer` hook's `process` function,
//! 2. an inline `data:` URI,
//! 3. an external URI loaded through the [`Fetcher`],
//! 4. the GLB binary chunk (buffers without a URI).
//!
//! All buffers resolve concurrently; the first failure aborts the batch.

use std::io;

use futures::future::try_join_all;
use gltf_core::buffer::{BufferSlice, ResolvedView};
use gltf_core::error::{GltfError, Result};

use crate::document::{BufferDef, BufferViewDef, Document};
use crate::options::LoadOptions;
use crate::traits::Fetcher;
use crate::uri::{decode_data_uri, is_data_uri, resolve_url};

/// How external URIs are handled.
#[derive(Clone, Copy)]
pub(crate) enum ExternalSource<'a> {
    Fetch(&'a dyn Fetcher),
    /// No fetcher configured: external resources are an error.
    Unavailable,
    /// Offline parse: external buffers resolve to empty.
    Skip,
}

pub(crate) struct BufferResolver<'a> {
    pub options: &'a LoadOptions,
    pub external: ExternalSource<'a>,
    pub bin: Option<BufferSlice>,
}

impl<'a> BufferResolver<'a> {
    /// Resolve every document buffer.
    pub async fn resolve_buffers(&self, doc: &Document) -> Result<Vec<BufferSlice>> {
        try_join_all(
            doc.buffers
                .iter()
                .enumerate()
                .map(|(index, def)| self.resolve_buffer(index, def)),
        )
        .await
    }

    async fn resolve_buffer(&self, index: usize, def: &BufferDef) -> Result<BufferSlice> {
        self.options
            .hooks
            .buffer
            .construct(def, || self.load_buffer(index, def))
            .await
    }

    async fn load_buffer(&self, index: usize, def: &BufferDef) -> Result<BufferSlice> {
        match def.uri.as_deref() {
            Some(uri) if is_data_uri(uri) => Ok(decode_data_uri(uri)?.data.into()),
            Some(uri) => Ok(self.fetch_external(uri).await?.into()),
            None => self.bin.clone().ok_or_else(|| {
                GltfError::format(format!(
                    "Buffer {} has no uri and the container has no binary chunk",
                    index
                ))
            }),
        }
    }

    /// Load an external resource relative to the document base path.
    pub async fn fetch_external(&self, uri: &str) -> Result<Vec<u8>> {
        let url = resolve_url(
            &self.options.base_path,
            uri,
            self.options.registry_prefix.as_deref(),
        );
        match self.external {
            ExternalSource::Fetch(fetcher) => {
                log::debug!("fetching {}", url);
                Ok(fetcher.fetch(&url, &self.options.fetch).await?)
            }
            ExternalSource::Skip => {
                log::debug!("skipping external resource {}", url);
                Ok(Vec::new())
            }
            ExternalSource::Unavailable => Err(GltfError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("No fetcher configured to load {}", url),
            ))),
        }
    }

    /// Compute buffer-view byte ranges over the resolved buffers.
    pub async fn resolve_views(
        &self,
        doc: &Document,
        buffers: &[BufferSlice],
    ) -> Result<Vec<ResolvedView>> {
        try_join_all(
            doc.buffer_views
                .iter()
                .map(|def| self.resolve_view(def, buffers)),
        )
        .await
    }

    async fn resolve_view(
        &self,
        def: &BufferViewDef,
        buffers: &[BufferSlice],
    ) -> Result<ResolvedView> {
        self.options
            .hooks
            .buffer_view
            .construct(def, || async move { view_range(def, buffers) })
            .await
    }
}

fn view_range(def: &BufferViewDef, buffers: &[BufferSlice]) -> Result<ResolvedView> {
    let buffer = buffers.get(def.buffer).ok_or_else(|| {
        GltfError::format(format!("Invalid buffer index: {}", def.buffer))
    })?;
    ResolvedView::new(
        def.buffer,
        buffer,
        def.byte_offset,
        def.byte_length,
        def.byte_stride,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_metadata;
    use futures::executor::block_on;
    use futures::future::BoxFuture;
    use crate::traits::FetchOptions;

    struct MapFetcher(Vec<(String, Vec<u8>)>);

    impl Fetcher for MapFetcher {
        fn fetch<'a>(
            &'a self,
            url: &'a str,
            _options: &FetchOptions,
        ) -> BoxFuture<'a, io::Result<Vec<u8>>> {
            let found = self.0.iter().find(|(u, _)| u == url).map(|(_, d)| d.clone());
            Box::pin(async move {
                found.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, url.to_string()))
            })
        }
    }

    fn resolver<'a>(
        options: &'a LoadOptions,
        external: ExternalSource<'a>,
        bin: Option<Vec<u8>>,
    ) -> BufferResolver<'a> {
        BufferResolver {
            options,
            external,
            bin: bin.map(BufferSlice::from_vec),
        }
    }

    #[test]
    fn test_sources_in_priority_order() {
        let doc = parse_metadata(
            br#"{"buffers": [
                {"byteLength": 2, "uri": "data:application/octet-stream;base64,AQI="},
                {"byteLength": 3, "uri": "ext.bin"},
                {"byteLength": 4}
            ]}"#,
        )
        .unwrap();
        let options = LoadOptions::default().with_base_path("assets/");
        let fetcher = MapFetcher(vec![("assets/ext.bin".into(), vec![7, 8, 9])]);
        let resolver = resolver(&options, ExternalSource::Fetch(&fetcher), Some(vec![1, 2, 3, 4]));

        let buffers = block_on(resolver.resolve_buffers(&doc)).unwrap();
        assert_eq!(buffers[0].bytes(), &[1, 2]);
        assert_eq!(buffers[1].bytes(), &[7, 8, 9]);
        assert_eq!(buffers[2].bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_missing_bin_chunk() {
        let doc = parse_metadata(br#"{"buffers": [{"byteLength": 4}]}"#).unwrap();
        let options = LoadOptions::default();
        let resolver = resolver(&options, ExternalSource::Skip, None);
        let err = block_on(resolver.resolve_buffers(&doc)).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_fetch_error_surfaces_verbatim() {
        let doc =
            parse_metadata(br#"{"buffers": [{"byteLength": 4, "uri": "gone.bin"}]}"#).unwrap();
        let options = LoadOptions::default();
        let fetcher = MapFetcher(Vec::new());
        let resolver = resolver(&options, ExternalSource::Fetch(&fetcher), None);
        let err = block_on(resolver.resolve_buffers(&doc)).unwrap_err();
        match err {
            GltfError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_skip_external() {
        let doc = parse_metadata(br#"{"buffers": [{"byteLength": 4, "uri": "a.bin"}]}"#).unwrap();
        let options = LoadOptions::default();
        let resolver = resolver(&options, ExternalSource::Skip, None);
        let buffers = block_on(resolver.resolve_buffers(&doc)).unwrap();
        assert!(buffers[0].is_empty());
    }

    #[test]
    fn test_buffer_hook_overrides() {
        let doc = parse_metadata(br#"{"buffers": [{"byteLength": 1, "uri": "a.bin"}]}"#).unwrap();
        let mut options = LoadOptions::default();
        options.hooks.buffer.process = Some(Box::new(
            |_: &BufferDef| -> BoxFuture<'static, Result<Option<BufferSlice>>> {
                Box::pin(async { Ok(Some(BufferSlice::from_vec(vec![42]))) })
            },
        ));
        let resolver = resolver(&options, ExternalSource::Unavailable, None);
        let buffers = block_on(resolver.resolve_buffers(&doc)).unwrap();
        assert_eq!(buffers[0].bytes(), &[42]);
    }

    #[test]
    fn test_views_share_buffer_storage() {
        let doc = parse_metadata(
            br#"{"bufferViews": [
                {"buffer": 0, "byteOffset": 2, "byteLength": 4, "byteStride": 8},
                {"buffer": 0, "byteLength": 12}
            ]}"#,
        )
        .unwrap();
        let options = LoadOptions::default();
        let buffers = vec![BufferSlice::from_vec((0u8..8).collect())];
        let resolver = resolver(&options, ExternalSource::Skip, None);

        let err = block_on(resolver.resolve_views(&doc, &buffers)).unwrap_err();
        assert!(err.is_format_error());

        let doc =
            parse_metadata(br#"{"bufferViews": [{"buffer": 0, "byteOffset": 2, "byteLength": 4}]}"#)
                .unwrap();
        let views = block_on(resolver.resolve_views(&doc, &buffers)).unwrap();
        assert_eq!(views[0].bytes(), &[2, 3, 4, 5]);
        assert!(views[0].data.shares_storage(&buffers[0]));
    }
}
