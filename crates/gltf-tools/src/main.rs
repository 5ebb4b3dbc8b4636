//! gltf-inspect - load a glTF/GLB file and print what the loader produced.

use std::path::PathBuf;

use clap::Parser;
use gltf_io::uri::base_directory;
use gltf_io::{FsFetcher, GltfBundle, GltfError, GltfLoader, LoadOptions};

#[derive(Parser)]
#[command(name = "gltf-inspect")]
#[command(about = "Inspect the resources built from a glTF or GLB file")]
#[command(version)]
struct Cli {
    /// Input .gltf or .glb file
    input: PathBuf,

    /// Skip external buffers and images
    #[arg(long)]
    offline: bool,

    /// Treat the device as unable to use 32-bit indices
    #[arg(long)]
    no_u32_indices: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), GltfError> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let data = std::fs::read(&cli.input)?;
    let path = cli.input.to_string_lossy().into_owned();
    log::debug!("read {} bytes from {}", data.len(), path);
    let filename = cli.input.file_name().and_then(|n| n.to_str());

    let options = LoadOptions::default()
        .with_base_path(base_directory(&path))
        .with_u32_indices(!cli.no_u32_indices);
    let loader = GltfLoader::new(options).with_fetcher(FsFetcher::new());

    let bundle = if cli.offline {
        loader
            .parse_sync(&data, filename)
            .ok_or_else(|| GltfError::format(format!("Failed to parse {}", path)))?
    } else {
        futures::executor::block_on(loader.parse(&data, filename))?
    };

    log::info!(
        "loaded {}: {} nodes, {} meshes, {} animations",
        path,
        bundle.nodes.len(),
        bundle.geometry_groups.len(),
        bundle.animations.len()
    );
    print_summary(&path, &bundle);
    Ok(())
}

fn print_summary(path: &str, bundle: &GltfBundle) {
    println!("{}", path);
    println!(
        "  scenes: {} (default: {})",
        bundle.scenes.len(),
        bundle
            .default_scene
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".into())
    );
    println!("  nodes: {}", bundle.nodes.len());
    for (i, node) in bundle.nodes.iter().enumerate() {
        let depth = std::iter::successors(node.parent, |&p| bundle.nodes[p].parent).count();
        let mesh = bundle
            .node_models
            .get(i)
            .copied()
            .flatten()
            .map(|m| format!(" [mesh {}]", m))
            .unwrap_or_default();
        println!("    {}{}{}", "  ".repeat(depth), node.name, mesh);
    }

    println!("  meshes: {}", bundle.geometry_groups.len());
    for (i, group) in bundle.geometry_groups.iter().enumerate() {
        println!(
            "    {}: {} ({} primitives)",
            i,
            group.name.as_deref().unwrap_or("unnamed"),
            group.primitives.len()
        );
        for instance in &group.primitives {
            let geometry = &instance.geometry;
            let vb = &geometry.vertex_buffer;
            let semantics: Vec<&str> =
                vb.format.elements.iter().map(|e| e.semantic.name()).collect();
            println!(
                "      {:?}: {} vertices, stride {}, [{}], indices: {}, morph targets: {}",
                geometry.topology,
                vb.num_vertices,
                vb.format.stride,
                semantics.join(", "),
                geometry
                    .index_buffer
                    .as_ref()
                    .map(|ib| format!("{} ({:?})", ib.count, ib.format))
                    .unwrap_or_else(|| "none".into()),
                geometry.morph_targets.len()
            );
        }
    }

    println!("  materials: {}", bundle.materials.len());
    let loaded = bundle.textures.iter().filter(|t| t.is_some()).count();
    println!("  textures: {} ({} loaded)", bundle.textures.len(), loaded);
    println!("  cameras: {}", bundle.cameras.len());
    println!("  lights: {}", bundle.lights.len());
    println!("  skins: {}", bundle.skins.len());
    println!("  animations: {}", bundle.animations.len());
    for track in &bundle.animations {
        println!(
            "    {}: {:.3}s, {} curves",
            track.name,
            track.duration,
            track.curves.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["gltf-inspect", "scene.glb", "--offline", "-v"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("scene.glb"));
        assert!(cli.offline);
        assert!(cli.verbose);
        assert!(!cli.no_u32_indices);

        assert!(Cli::try_parse_from(["gltf-inspect"]).is_err());
    }
}
