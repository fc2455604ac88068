//! ROI Projector
//!
//! Loads a stereo calibration, projects a region of interest from camera 1 into
//! camera 2 and, when a detected quad is given, reports how well the two overlap.
//!
//! Usage:
//! ```bash
//! # Default rectangle (100,200)-(400,350) at depth 1000
//! cargo run --example roi_projector -- --calibration samples/stereo_calibration.json
//!
//! # Four corners as u v z triples, plus a detected quad in camera 2
//! cargo run --example roi_projector -- \
//!   --calibration samples/stereo_calibration.yaml \
//!   --corners 100 200 1000 400 200 1000 400 350 1000 100 350 1000 \
//!   --detected 20 190 330 190 330 345 20 345
//! ```

use clap::Parser;
use log::info;
use roi_projector::{
    is_fully_inside, is_sufficiently_contained, overlap, DepthMap, Point2D, Point3D, Projector,
    Quad, Rect,
};
use std::path::{Path, PathBuf};

/// Project a camera-1 region of interest into camera 2
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the stereo calibration (.json, .yaml or .yml)
    #[arg(short = 'c', long)]
    calibration: PathBuf,

    /// Four corners in camera 1 as `u v z` triples (12 numbers)
    #[arg(long, num_args = 12, allow_negative_numbers = true)]
    corners: Option<Vec<f64>>,

    /// Detected quad in camera 2 as `u v` pairs (8 numbers)
    #[arg(short = 'd', long, num_args = 8, allow_negative_numbers = true)]
    detected: Option<Vec<f64>>,

    /// Containment threshold for the overlap ratio
    #[arg(short = 't', long, default_value = "0.8")]
    threshold: f64,

    /// 16-bit depth map aligned with camera 1, used for an extra per-corner depth projection
    #[arg(long)]
    depth_map: Option<PathBuf>,

    /// Search radius in pixels for depth map lookups
    #[arg(long, default_value = "5")]
    search_radius: u32,
}

const DEFAULT_RECT: Rect = Rect {
    x: 100.0,
    y: 200.0,
    w: 300.0,
    h: 150.0,
};
const DEFAULT_DEPTH: f64 = 1000.0;

fn load(projector: &mut Projector, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => projector.load_from_yaml(path)?,
        Some("json") => projector.load_from_json(path)?,
        other => {
            return Err(format!(
                "Unsupported calibration format: {:?}. Supported: json, yaml, yml",
                other
            )
            .into())
        }
    }
    Ok(())
}

fn corners_from_args(values: Option<&[f64]>) -> [Point3D; 4] {
    match values {
        Some(v) => [
            Point3D::new(v[0], v[1], v[2]),
            Point3D::new(v[3], v[4], v[5]),
            Point3D::new(v[6], v[7], v[8]),
            Point3D::new(v[9], v[10], v[11]),
        ],
        None => DEFAULT_RECT
            .corners()
            .map(|c| Point3D::new(c.u, c.v, DEFAULT_DEPTH)),
    }
}

fn quad_from_args(v: &[f64]) -> Quad {
    [
        Point2D::new(v[0], v[1]),
        Point2D::new(v[2], v[3]),
        Point2D::new(v[4], v[5]),
        Point2D::new(v[6], v[7]),
    ]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    let cli = Cli::parse();

    println!("🎯 ROI PROJECTOR");
    println!("================");
    println!("Calibration: {:?}", cli.calibration);

    let mut projector = Projector::new();
    load(&mut projector, &cli.calibration)?;
    info!("Calibration loaded from {:?}", cli.calibration);

    let corners = corners_from_args(cli.corners.as_deref());
    println!("\n📐 Camera 1 corners (u, v, z):");
    for (i, c) in corners.iter().enumerate() {
        println!("  [{}] ({:.2}, {:.2}, {:.1})", i, c.u, c.v, c.z);
    }

    let projected = projector.project_corners(&corners)?;
    println!("\n📍 Camera 2 corners (u, v):");
    for (i, p) in projected.iter().enumerate() {
        println!("  [{}] ({:.2}, {:.2})", i, p.u, p.v);
    }
    if let Some(bounds) = Rect::bounding(&projected) {
        println!(
            "  Bounding box: x={:.2} y={:.2} w={:.2} h={:.2}",
            bounds.x, bounds.y, bounds.w, bounds.h
        );
    }

    if let Some(path) = &cli.depth_map {
        let depth_map = DepthMap::from_path(path)?;
        let roi = Rect::bounding(&corners.map(|c| Point2D::new(c.u, c.v)))
            .ok_or("corners do not span a rectangle")?;
        match projector.project_rect_with_depth_map(roi, &depth_map, cli.search_radius) {
            Ok(r) => println!(
                "\n🗺️  Depth map projection: x={:.2} y={:.2} w={:.2} h={:.2}",
                r.x, r.y, r.w, r.h
            ),
            Err(e) => println!("\n🗺️  Depth map projection failed: {}", e),
        }
    }

    if let Some(values) = cli.detected.as_deref() {
        let detected = quad_from_args(values);
        let ratio = overlap(&projected, &detected);
        let contained = is_sufficiently_contained(&projected, &detected, cli.threshold);
        let inside = is_fully_inside(&projected, &detected);

        println!("\n📊 Overlap report:");
        println!("  Overlap ratio:          {:.4}", ratio);
        println!(
            "  Contained (> {:.2}):     {}",
            cli.threshold,
            if contained { "✅ yes" } else { "❌ no" }
        );
        println!(
            "  All vertices inside:    {}",
            if inside { "✅ yes" } else { "❌ no" }
        );
        info!(
            "overlap={:.4} contained={} fully_inside={}",
            ratio, contained, inside
        );
    }

    Ok(())
}
