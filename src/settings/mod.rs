use crate::api::{ApiOptions, ImageSize};
use crate::render::adaptive::RenderMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// In-process settings provider: target image sizes and the adaptive render
/// mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerSettings {
    pub base_image_size: ImageSize,
    pub base_panorama_size: ImageSize,
    pub render_mode: RenderMode,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            base_image_size: ImageSize::Size640,
            base_panorama_size: ImageSize::Size2048,
            render_mode: RenderMode::Fill,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "streetscope")]
#[command(about = "Street-level panorama viewer core")]
pub struct CliArgs {
    #[arg(long, env = "STREETSCOPE_IMAGE_HOST", default_value = "images.streetscope.net")]
    pub image_host: String,

    #[arg(long, env = "STREETSCOPE_MESH_HOST", default_value = "meshes.streetscope.net")]
    pub mesh_host: String,

    /// Origin tag attached to every image request.
    #[arg(long, env = "STREETSCOPE_ORIGIN", default_value = "streetscope.cli")]
    pub origin: String,

    #[command(subcommand)]
    pub operation_mode: OperationMode,
}

#[derive(Subcommand, Debug)]
pub enum OperationMode {
    /// Cache one node's assets and report progress and dimensions.
    Probe {
        key: String,

        /// Treat the node as a full panorama (larger image target).
        #[arg(long)]
        pano: bool,

        /// The node has a reconstruction mesh.
        #[arg(long)]
        merged: bool,
    },
    /// Cache a node and prefetch its neighborhood from a fixture graph.
    Warm {
        key: String,

        /// JSON graph fixture with nodes and edges.
        #[arg(long)]
        graph_file: PathBuf,

        /// Uniform traversal depth across all direction classes.
        #[arg(long, default_value_t = 1)]
        depth: u32,
    },
}

impl CliArgs {
    pub fn api_options(&self) -> ApiOptions {
        ApiOptions {
            image_host: self.image_host.clone(),
            mesh_host: self.mesh_host.clone(),
            origin: self.origin.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_probe_with_host_overrides() {
        let args = CliArgs::try_parse_from([
            "streetscope",
            "--image-host",
            "img.example.com",
            "probe",
            "abc123",
            "--pano",
        ])
        .unwrap();

        assert_eq!(args.api_options().image_host, "img.example.com");
        assert_eq!(args.api_options().mesh_host, "meshes.streetscope.net");
        match args.operation_mode {
            OperationMode::Probe { key, pano, merged } => {
                assert_eq!(key, "abc123");
                assert!(pano);
                assert!(!merged);
            }
            other => panic!("expected probe, got {:?}", other),
        }
    }

    #[test]
    fn parses_warm_with_a_default_depth() {
        let args = CliArgs::try_parse_from([
            "streetscope",
            "warm",
            "abc123",
            "--graph-file",
            "graph.json",
        ])
        .unwrap();

        match args.operation_mode {
            OperationMode::Warm { key, graph_file, depth } => {
                assert_eq!(key, "abc123");
                assert_eq!(graph_file, PathBuf::from("graph.json"));
                assert_eq!(depth, 1);
            }
            other => panic!("expected warm, got {:?}", other),
        }
    }

    #[test]
    fn default_settings_target_the_documented_sizes() {
        let settings = ViewerSettings::default();
        assert_eq!(settings.base_image_size, ImageSize::Size640);
        assert_eq!(settings.base_panorama_size, ImageSize::Size2048);
        assert_eq!(settings.render_mode, RenderMode::Fill);
    }
}
