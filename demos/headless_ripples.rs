// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Runs the ripple scene for a few simulated seconds without a GPU and prints frame statistics.

```text
WAF_FRAME_SLOTS=2 cargo run --example headless_ripples
```
*/

use glam::{Mat4, Vec3};
use waves_and_frames::SimulatedAccelerator;
use waves_and_frames::bindings::{Geometry, Material, ObjectTransform, RenderLayer, SceneResources};
use waves_and_frames::frames::{FrameConfig, FrameOrchestrator, FrameSlot};
use waves_and_frames::waves::{GridIndices, HeightField, HeightFieldConfig};

const FRAME_TIME: f32 = 1.0 / 60.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = FrameConfig::from_env()?;
    let waves = HeightField::new(HeightFieldConfig::default())?;
    let indices = GridIndices::new(waves.rows(), waves.cols())?.to_u16()?;

    let mut scene = SceneResources::new(config.slot_count);
    let water = scene.add_material(
        "water",
        Material {
            diffuse_albedo: glam::Vec4::new(0.0, 0.2, 0.6, 0.5),
            fresnel_r0: Vec3::splat(0.1),
            roughness: 0.0,
            ..Material::default()
        },
    )?;
    let grid = scene.add_geometry(
        "waterGeo",
        Geometry {
            index_count: indices.len() as u32,
            start_index: 0,
            base_vertex: 0,
            dynamic: true,
        },
    )?;
    scene.add_item(
        ObjectTransform {
            tex_transform: Mat4::from_scale(Vec3::new(5.0, 5.0, 1.0)),
            ..ObjectTransform::default()
        },
        water,
        grid,
        RenderLayer::Transparent,
    )?;

    //completes each frame once the ring is full, so acquisition never stalls
    let accelerator = SimulatedAccelerator::lagging(config.slot_count.saturating_sub(1) as u64);
    let mut orchestrator = FrameOrchestrator::new(accelerator, &config, waves, scene)?;
    let eye = Vec3::new(0.0, 80.0, -150.0);
    orchestrator.set_camera(
        Mat4::look_at_lh(eye, Vec3::ZERO, Vec3::Y),
        Mat4::perspective_lh(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 1.0, 1000.0),
        eye,
    );

    let mut draws = 0usize;
    let mut renderer = |slot: &FrameSlot, scene: &SceneResources, _: &SimulatedAccelerator| {
        for layer in [RenderLayer::Opaque, RenderLayer::Transparent] {
            for item in scene.items_in(layer) {
                if scene.geometry(item.geometry).is_ok_and(|g| g.dynamic) {
                    debug_assert_eq!(slot.vertices().len(), 128 * 128);
                }
                draws += 1;
            }
        }
    };

    for frame in 0..600u32 {
        if frame % 90 == 0 {
            let row = 10 + (frame as usize * 7) % 100;
            let col = 10 + (frame as usize * 13) % 100;
            orchestrator.disturb(row, col, 0.6)?;
        }
        orchestrator.animate_material_scroll(water, 0.1, 0.02, FRAME_TIME)?;
        orchestrator.tick(FRAME_TIME, &mut renderer)?;
    }

    let stats = orchestrator.reporter().stats();
    println!(
        "{} frames, {} simulation steps, {} draws, peak height {:.4}",
        orchestrator.ring().last_issued(),
        orchestrator.waves().steps_taken(),
        draws,
        orchestrator.waves().max_abs_height()
    );
    println!(
        "recent: {:.0} fps, {:.3} ms cpu, {:.3} ms fence wait, {} blocking waits",
        stats.fps,
        stats.cpu_ms,
        stats.fence_wait_ms,
        orchestrator.ring().blocking_waits()
    );
    orchestrator.shutdown()?;
    Ok(())
}
