//! Animation tracks.
//!
//! Each channel's target is encoded as a property locator relative to the
//! hierarchy root of the animated node, for example
//! `Armature/Hips/Spine/graph/localRotation`. The engine attaches the track to
//! every root listed in [`AnimTrack::roots`].

use std::collections::HashMap;

use glam::Vec4;
use gltf_core::accessor::read_accessor;
use gltf_core::buffer::ResolvedView;
use gltf_core::error::{GltfError, Result};

use crate::document::{AnimationDef, Document};
use crate::graph::{path_to_root, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Step,
    #[default]
    Linear,
    CubicSpline,
}

impl Interpolation {
    pub fn from_name(name: Option<&str>) -> Result<Self> {
        match name {
            None | Some("LINEAR") => Ok(Interpolation::Linear),
            Some("STEP") => Ok(Interpolation::Step),
            Some("CUBICSPLINE") => Ok(Interpolation::CubicSpline),
            Some(other) => Err(GltfError::format(format!("Unknown interpolation: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetProperty {
    LocalPosition,
    LocalRotation,
    LocalScale,
    Weights,
}

impl TargetProperty {
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "translation" => Some(TargetProperty::LocalPosition),
            "rotation" => Some(TargetProperty::LocalRotation),
            "scale" => Some(TargetProperty::LocalScale),
            "weights" => Some(TargetProperty::Weights),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TargetProperty::LocalPosition => "localPosition",
            TargetProperty::LocalRotation => "localRotation",
            TargetProperty::LocalScale => "localScale",
            TargetProperty::Weights => "weights",
        }
    }
}

/// A flat keyframe series.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimData {
    pub components: usize,
    pub data: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimCurve {
    /// Index into [`AnimTrack::inputs`].
    pub input: usize,
    /// Index into [`AnimTrack::outputs`].
    pub output: usize,
    pub interpolation: Interpolation,
    pub property: TargetProperty,
    /// Property locator relative to the target's hierarchy root.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimTrack {
    pub name: String,
    /// Largest final keyframe time across the input series.
    pub duration: f32,
    pub inputs: Vec<AnimData>,
    pub outputs: Vec<AnimData>,
    pub curves: Vec<AnimCurve>,
    /// Distinct hierarchy roots the curve paths are relative to.
    pub roots: Vec<usize>,
}

/// Property locator for `property` on `node`.
pub fn property_locator(nodes: &[Node], node: usize, property: TargetProperty) -> String {
    let mut names: Vec<&str> = path_to_root(nodes, node)
        .into_iter()
        .map(|i| nodes[i].name.as_str())
        .collect();
    names.reverse();
    format!("{}/graph/{}", names.join("/"), property.name())
}

struct SeriesCache<'a> {
    doc: &'a Document,
    views: &'a [ResolvedView],
    slots: HashMap<usize, usize>,
    series: Vec<AnimData>,
}

impl<'a> SeriesCache<'a> {
    fn new(doc: &'a Document, views: &'a [ResolvedView]) -> Self {
        Self {
            doc,
            views,
            slots: HashMap::new(),
            series: Vec::new(),
        }
    }

    /// Slot for `accessor`, reading it on first use.
    fn slot(&mut self, accessor: usize) -> Result<usize> {
        if let Some(&slot) = self.slots.get(&accessor) {
            return Ok(slot);
        }
        let desc = self.doc.accessor_desc(accessor)?;
        let data = read_accessor(&desc, self.views)?.to_f32(desc.normalized);
        self.series.push(AnimData {
            components: desc.num_components(),
            data,
        });
        let slot = self.series.len() - 1;
        self.slots.insert(accessor, slot);
        Ok(slot)
    }
}

pub(crate) fn build_animation(
    index: usize,
    def: &AnimationDef,
    doc: &Document,
    views: &[ResolvedView],
    nodes: &[Node],
) -> Result<AnimTrack> {
    let mut inputs = SeriesCache::new(doc, views);
    let mut outputs = SeriesCache::new(doc, views);
    let mut curves = Vec::with_capacity(def.channels.len());
    let mut roots: Vec<usize> = Vec::new();
    let mut corrected: Vec<usize> = Vec::new();

    for channel in &def.channels {
        let Some(node) = channel.target.node else {
            continue;
        };
        if node >= nodes.len() {
            return Err(GltfError::format(format!("Invalid animation target node: {}", node)));
        }
        let Some(property) = TargetProperty::from_path(&channel.target.path) else {
            log::warn!("skipping animation channel with path {}", channel.target.path);
            continue;
        };
        let sampler = def.samplers.get(channel.sampler).ok_or_else(|| {
            GltfError::format(format!("Invalid animation sampler index: {}", channel.sampler))
        })?;
        let interpolation = Interpolation::from_name(sampler.interpolation.as_deref())?;

        let input = inputs.slot(sampler.input)?;
        let output = outputs.slot(sampler.output)?;
        let keyframes = inputs.series[input].data.len();

        match property {
            // Cubic outputs hold an in-tangent, value and out-tangent per key.
            TargetProperty::Weights if keyframes > 0 => {
                let per_key = if interpolation == Interpolation::CubicSpline {
                    keyframes * 3
                } else {
                    keyframes
                };
                let series = &mut outputs.series[output];
                series.components = series.data.len() / per_key;
            }
            TargetProperty::LocalRotation
                if interpolation != Interpolation::CubicSpline && !corrected.contains(&output) =>
            {
                fix_quaternion_signs(&inputs.series[input].data, &mut outputs.series[output].data);
                corrected.push(output);
            }
            _ => {}
        }

        let root = path_to_root(nodes, node).last().copied().unwrap_or(node);
        if !roots.contains(&root) {
            roots.push(root);
        }

        curves.push(AnimCurve {
            input,
            output,
            interpolation,
            property,
            path: property_locator(nodes, node, property),
        });
    }

    let duration = inputs
        .series
        .iter()
        .filter_map(|s| s.data.last().copied())
        .fold(0.0f32, f32::max);

    Ok(AnimTrack {
        name: def.name.clone().unwrap_or_else(|| format!("animation_{}", index)),
        duration,
        inputs: inputs.series,
        outputs: outputs.series,
        curves,
        roots,
    })
}

/// Negate quaternion keyframes so that neighbours, taken in timestamp order,
/// never have a negative dot product.
pub fn fix_quaternion_signs(times: &[f32], quats: &mut [f32]) {
    let count = (quats.len() / 4).min(times.len());
    if count < 2 {
        return;
    }
    let mut order: Vec<usize> = (0..count).collect();
    order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

    let load = |q: &[f32], i: usize| Vec4::from_slice(&q[i * 4..i * 4 + 4]);
    for pair in order.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        let current = load(quats, cur);
        if load(quats, prev).dot(current) < 0.0 {
            (-current).write_to_slice(&mut quats[cur * 4..cur * 4 + 4]);
        }
    }
}
