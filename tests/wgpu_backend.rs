// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
#![cfg(feature = "backend_wgpu")]

use waves_and_frames::bindings::{Material, SceneResources};
use waves_and_frames::frames::{
    Accelerator, FrameConfig, FrameConfigError, FrameOrchestrator, FrameSlot, SlotCapacity,
};
use waves_and_frames::waves::{HeightField, HeightFieldConfig};
use waves_and_frames::WgpuAccelerator;

#[test]
fn frames_complete_on_a_real_device() {
    let config = FrameConfig::default();
    let waves_config = HeightFieldConfig {
        rows: 32,
        cols: 32,
        ..HeightFieldConfig::default()
    };
    let capacity = SlotCapacity {
        vertices: waves_config.vertex_count(),
        objects: 4,
        materials: 4,
    };
    let accelerator = match test_executors::sleep_on(WgpuAccelerator::headless(config.slot_count, capacity)) {
        Ok(accelerator) => accelerator,
        Err(e) => {
            println!("skipping, no device: {e}");
            return;
        }
    };
    let mut scene = SceneResources::new(config.slot_count);
    let water = scene.add_material("water", Material::default()).unwrap();
    let waves = HeightField::new(waves_config).unwrap();
    let mut orchestrator = FrameOrchestrator::new(accelerator, &config, waves, scene).unwrap();
    orchestrator.disturb(16, 16, 0.5).unwrap();

    let mut renderer = |slot: &FrameSlot, _: &SceneResources, accelerator: &WgpuAccelerator| {
        assert!(accelerator.slot_buffers(slot.index()).is_some());
        let encoder = accelerator
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame"),
            });
        vec![encoder.finish()]
    };
    for expected in 1..=12 {
        orchestrator
            .animate_material_scroll(water, 0.1, 0.0, 1.0 / 60.0)
            .unwrap();
        assert_eq!(orchestrator.tick(1.0 / 60.0, &mut renderer), Ok(expected));
    }
    let completed = orchestrator.ring().accelerator().completed_value();
    assert!(completed <= 12);
    orchestrator.shutdown().unwrap();
}

#[test]
fn device_buffers_bound_the_configuration() {
    let capacity = SlotCapacity {
        vertices: 16 * 16,
        objects: 1,
        materials: 1,
    };
    let accelerator = match test_executors::sleep_on(WgpuAccelerator::headless(3, capacity)) {
        Ok(accelerator) => accelerator,
        Err(e) => {
            println!("skipping, no device: {e}");
            return;
        }
    };
    assert_eq!(accelerator.slot_limit(), Some(3));
    assert_eq!(accelerator.slot_capacity(), Some(capacity));
    let config = FrameConfig {
        slot_count: 4,
        ..FrameConfig::default()
    };
    let waves = HeightField::new(HeightFieldConfig {
        rows: 16,
        cols: 16,
        ..HeightFieldConfig::default()
    })
    .unwrap();
    let result = FrameOrchestrator::new(accelerator, &config, waves, SceneResources::new(4));
    assert!(matches!(
        result,
        Err(FrameConfigError::SlotLimit {
            slots: 4,
            available: 3
        })
    ));
}
