mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::*;
use ember_frame_graph::{
    FrameGraphBuilder, FrameGraphError, RgBufferSpec, RgComputePassDesc, RgCreationSpec, RgFrameData,
    RgGraphicsPassDesc, RgImageSpec, RgInitialData, RgPassRegistration, RgPhysical, RgPipeline, RgPipelineFactory,
    RgResourceState, RgResourceUsage, RgStage, RgTransitionTable, RgUsageType,
};
use ember_gfx::{
    backend::headless::HeadlessCommand, commands::one_time::one_time_exec, device::GfxDevice,
    resources::image::GfxImageCreateInfo, vk,
};

fn noop(_: &ember_frame_graph::RgExecutionContext<'_>) -> anyhow::Result<()> {
    Ok(())
}

fn compute(name: &str) -> RgPassRegistration {
    RgPassRegistration::compute(name, RgComputePassDesc::new(format!("{}.comp.spv", name)))
}

/// Lighting writes FinalImage, two later passes sample it.
fn final_image_passes() -> Vec<RgPassRegistration> {
    vec![
        compute("DeferredPbrLight")
            .usage(
                RgResourceUsage::write("FinalImage", RgUsageType::ImageStorage, RgStage::COMPUTE)
                    .create(storage_image(64, 64)),
            )
            .execute(|ctx| {
                ctx.cmd().cmd_dispatch(glam::UVec3::new(8, 8, 1));
                Ok(())
            }),
        compute("Bloom")
            .usage(RgResourceUsage::read("FinalImage", RgUsageType::SampledTexture, RgStage::COMPUTE))
            .execute(noop),
        compute("Tonemap")
            .usage(RgResourceUsage::read("FinalImage", RgUsageType::SampledTexture, RgStage::COMPUTE))
            .execute(noop),
    ]
}

#[test]
fn test_final_image_scenario() {
    let (device, mut vault) = setup();
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    for pass in final_image_passes() {
        builder.register_render_pass(pass).unwrap();
    }
    let mut graph = builder.build(None).unwrap();
    graph.print_execution_plan();

    let image = vault.get("FinalImage", 0).and_then(RgPhysical::image).unwrap().clone();
    device.take_commands();
    run_frame(&device, &mut graph, &mut vault, 0).unwrap();

    let barriers = barriers_for(&device, image.handle());
    assert_eq!(barriers.len(), 1);
    let expected = RgTransitionTable::global()
        .lookup(RgResourceState::General, RgResourceState::ShaderReadOnly, Some(image.format()))
        .unwrap();
    let barrier = barriers[0];
    assert_eq!(barrier.old_layout, vk::ImageLayout::GENERAL);
    assert_eq!(barrier.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    assert_eq!(barrier.src_stage, expected.src_stage);
    assert_eq!(barrier.dst_stage, expected.dst_stage);
    assert_eq!(barrier.src_access, expected.src_access);
    assert_eq!(barrier.dst_access, expected.dst_access);
    assert_eq!(barrier.aspect, vk::ImageAspectFlags::COLOR);

    // next frame: back to General for the write, then one read transition
    device.take_commands();
    run_frame(&device, &mut graph, &mut vault, 1).unwrap();
    let layouts: Vec<_> =
        barriers_for(&device, image.handle()).iter().map(|b| (b.old_layout, b.new_layout)).collect();
    assert_eq!(
        layouts,
        vec![
            (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::GENERAL),
            (vk::ImageLayout::GENERAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        ]
    );
    vault.destroy(&device);
}

#[test]
fn test_passes_run_in_registration_order() {
    let (device, mut vault) = setup();
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    for pass in final_image_passes() {
        builder.register_render_pass(pass).unwrap();
    }
    let mut graph = builder.build(None).unwrap();
    assert_eq!(graph.pass_names().collect::<Vec<_>>(), vec!["DeferredPbrLight", "Bloom", "Tonemap"]);

    device.take_commands();
    run_frame(&device, &mut graph, &mut vault, 0).unwrap();
    assert_eq!(labels(&device), vec!["frame", "DeferredPbrLight", "Bloom", "Tonemap"]);
    assert!(device.commands().iter().any(|c| matches!(
        c,
        HeadlessCommand::Dispatch { group_count, .. } if *group_count == glam::UVec3::new(8, 8, 1)
    )));
    vault.destroy(&device);
}

#[test]
fn test_one_resource_per_name() {
    let (device, mut vault) = setup();
    let spec = || RgCreationSpec::image(RgImageSpec::swapchain_sized(vk::Format::R16G16B16A16_SFLOAT));
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            compute("SSAO")
                .usage(
                    RgResourceUsage::write("SSAOImage", RgUsageType::ImageStorage, RgStage::COMPUTE).create(spec()),
                )
                .execute(noop),
        )
        .unwrap();
    builder
        .register_render_pass(
            compute("SSAOBlur")
                .usage(RgResourceUsage::read("SSAOImage", RgUsageType::SampledTexture, RgStage::COMPUTE).create(spec()))
                .execute(noop),
        )
        .unwrap();
    builder.build(None).unwrap();

    assert_eq!(vault.len(), 1);
    assert_eq!(device.images_created(), 1);
    // the first declaration decides the creation state
    let id = vault.lookup("SSAOImage").unwrap();
    assert_eq!(vault.resource(id).unwrap().creation_state(), RgResourceState::General);
    vault.destroy(&device);
}

#[test]
fn test_write_after_write_keeps_a_barrier() {
    let (device, mut vault) = setup();
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            compute("Clear")
                .usage(
                    RgResourceUsage::write("Accum", RgUsageType::ImageStorage, RgStage::COMPUTE)
                        .create(storage_image(16, 16)),
                )
                .execute(noop),
        )
        .unwrap();
    builder
        .register_render_pass(
            compute("Accumulate")
                .usage(RgResourceUsage::new("Accum", RgUsageType::ImageStorage, RW, RgStage::COMPUTE))
                .execute(noop),
        )
        .unwrap();
    let mut graph = builder.build(None).unwrap();

    let image = vault.get("Accum", 0).and_then(RgPhysical::image).unwrap().handle();
    device.take_commands();
    run_frame(&device, &mut graph, &mut vault, 0).unwrap();

    // no barrier for the first write after creation, one General -> General between the writers
    let barriers = barriers_for(&device, image);
    assert_eq!(barriers.len(), 1);
    assert_eq!(barriers[0].old_layout, vk::ImageLayout::GENERAL);
    assert_eq!(barriers[0].new_layout, vk::ImageLayout::GENERAL);
    assert!(barriers[0].src_access.contains(vk::AccessFlags2::SHADER_STORAGE_WRITE));
    vault.destroy(&device);
}

#[test]
fn test_multi_buffered_instances_are_isolated() {
    let (device, mut vault) = setup();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();

    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            compute("Cull")
                .usage(
                    RgResourceUsage::write("CompactedCullDrawBuf", RgUsageType::StructuredBuffer, RgStage::COMPUTE)
                        .create(RgCreationSpec::buffer(RgBufferSpec::new(1024)))
                        .multi_buffered(),
                )
                .execute(move |ctx| {
                    sink.borrow_mut().push((ctx.fif_index(), ctx.buffer("CompactedCullDrawBuf")?.handle()));
                    Ok(())
                }),
        )
        .unwrap();
    builder
        .register_render_pass(
            compute("DrawIndirect")
                .usage(RgResourceUsage::read(
                    "CompactedCullDrawBuf",
                    RgUsageType::StructuredBuffer,
                    RgStage::INDIRECT_DRAW,
                ))
                .execute(noop),
        )
        .unwrap();
    let mut graph = builder.build(None).unwrap();

    let id = vault.lookup("CompactedCullDrawBuf").unwrap();
    let handles: Vec<_> = (0..FIF_COUNT)
        .map(|i| vault.get("CompactedCullDrawBuf", i).and_then(RgPhysical::buffer).unwrap().handle())
        .collect();

    device.take_commands();
    run_frame(&device, &mut graph, &mut vault, 0).unwrap();
    assert_eq!(vault.state(id, 0), Some(RgResourceState::IndirectRead));
    assert_eq!(vault.state(id, 1), Some(RgResourceState::StorageReadWrite));
    assert_eq!(vault.state(id, 2), Some(RgResourceState::StorageReadWrite));
    assert!(device.buffer_barriers().iter().all(|b| b.buffer == handles[0]));

    device.take_commands();
    run_frame(&device, &mut graph, &mut vault, 1).unwrap();
    assert_eq!(vault.state(id, 1), Some(RgResourceState::IndirectRead));
    assert_eq!(vault.state(id, 2), Some(RgResourceState::StorageReadWrite));
    assert!(device.buffer_barriers().iter().all(|b| b.buffer == handles[1]));

    assert_eq!(*seen.borrow(), vec![(0, handles[0]), (1, handles[1])]);
    vault.destroy(&device);
}

#[test]
fn test_undeclared_transition_fails_the_build() {
    let (device, mut vault) = setup();
    let swapchain = device
        .create_image(&GfxImageCreateInfo::new_2d(
            "Swapchain",
            extent(),
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::COLOR_ATTACHMENT,
        ))
        .unwrap();
    vault.import_image("Swapchain", vec![swapchain.clone()], RgResourceState::Present).unwrap();

    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            compute("Composite")
                .usage(RgResourceUsage::write("Swapchain", RgUsageType::ImageStorage, RgStage::COMPUTE))
                .execute(noop),
        )
        .unwrap();
    let err = builder.build(None).unwrap_err();
    match err {
        FrameGraphError::UnsupportedTransition { pass, resource, old, new } => {
            assert_eq!(pass, "Composite");
            assert_eq!(resource, "Swapchain");
            assert_eq!(old, RgResourceState::Present);
            assert_eq!(new, RgResourceState::General);
        }
        other => panic!("unexpected error: {other}"),
    }
    vault.destroy(&device);
    device.destroy_image(swapchain);
}

#[test]
fn test_content_error_skips_dependent_passes_only() {
    let (device, mut vault) = setup();
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            compute("Reflections")
                .usage(
                    RgResourceUsage::read("ReflectTex", RgUsageType::SampledTexture, RgStage::COMPUTE).create(
                        RgCreationSpec::image(RgImageSpec::fixed(4, 4, vk::Format::R8G8B8A8_UNORM))
                            .with_initial_data(|_| anyhow::bail!("unsupported image extension: .hdr")),
                    ),
                )
                .usage(
                    RgResourceUsage::write("ReflectOut", RgUsageType::ImageStorage, RgStage::COMPUTE)
                        .create(storage_image(4, 4)),
                )
                .execute(|_| panic!("must not run")),
        )
        .unwrap();
    for pass in final_image_passes() {
        builder.register_render_pass(pass).unwrap();
    }
    let mut graph = builder.build(None).unwrap();

    assert_eq!(graph.is_pass_enabled("Reflections"), Some(false));
    assert_eq!(graph.is_pass_enabled("DeferredPbrLight"), Some(true));

    device.take_commands();
    run_frame(&device, &mut graph, &mut vault, 0).unwrap();
    assert_eq!(labels(&device), vec!["frame", "DeferredPbrLight", "Bloom", "Tonemap"]);
    vault.destroy(&device);
}

#[test]
fn test_undeclared_access_is_rejected() {
    let (device, mut vault) = setup();
    let checked = Rc::new(Cell::new(false));
    let flag = checked.clone();

    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            compute("Producer")
                .usage(
                    RgResourceUsage::write("A", RgUsageType::ImageStorage, RgStage::COMPUTE)
                        .create(storage_image(4, 4)),
                )
                .usage(
                    RgResourceUsage::write("B", RgUsageType::ImageStorage, RgStage::COMPUTE)
                        .create(storage_image(4, 4)),
                )
                .execute(noop),
        )
        .unwrap();
    builder
        .register_render_pass(
            compute("Consumer")
                .usage(RgResourceUsage::read("A", RgUsageType::SampledTexture, RgStage::COMPUTE))
                .execute(move |ctx| {
                    assert!(ctx.image_view("A").is_ok());
                    let err = ctx.image("B").unwrap_err();
                    assert!(matches!(
                        err,
                        FrameGraphError::UndeclaredAccess { ref pass, ref resource } if pass == "Consumer" && resource == "B"
                    ));
                    assert!(matches!(ctx.buffer("A"), Err(FrameGraphError::InvalidUsage { .. })));
                    flag.set(true);
                    // surfaces as a pass error
                    ctx.image("B")?;
                    Ok(())
                }),
        )
        .unwrap();
    let mut graph = builder.build(None).unwrap();

    let err = run_frame(&device, &mut graph, &mut vault, 0).unwrap_err();
    assert!(checked.get());
    assert!(matches!(err, FrameGraphError::PassExecution { ref pass, ref reason } if pass == "Consumer" && reason.contains("`B`")));
    vault.destroy(&device);
}

#[test]
fn test_registration_errors() {
    let (device, mut vault) = setup();
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(compute("Cull").usage(
            RgResourceUsage::write("CullBuf", RgUsageType::StructuredBuffer, RgStage::COMPUTE)
                .create(RgCreationSpec::buffer(RgBufferSpec::new(64))),
        ))
        .unwrap();

    assert!(matches!(
        builder.register_render_pass(compute("Cull")),
        Err(FrameGraphError::DuplicatePass(ref name)) if name == "Cull"
    ));
    assert!(matches!(builder.register_render_pass_exe("Nope", noop), Err(FrameGraphError::UnknownPass(_))));
    builder.register_render_pass_exe("Cull", noop).unwrap();
    assert!(matches!(
        builder.register_render_pass_exe("Cull", noop),
        Err(FrameGraphError::CallbackAlreadySet(_))
    ));

    builder.register_render_pass(compute("Orphan")).unwrap();
    assert!(matches!(builder.build(None), Err(FrameGraphError::MissingCallback(ref name)) if name == "Orphan"));
    vault.destroy(&device);
}

#[test]
fn test_unregister_keeps_resources() {
    let (device, mut vault) = setup();
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    for pass in final_image_passes() {
        builder.register_render_pass(pass).unwrap();
    }
    builder.unregister_render_pass("Bloom").unwrap();
    assert!(builder.unregister_render_pass("Bloom").is_err());
    let graph = builder.build(None).unwrap();

    assert_eq!(graph.pass_count(), 2);
    assert!(vault.lookup("FinalImage").is_some());
    assert_eq!(device.live_image_count(), 1);
    vault.destroy(&device);
}

#[test]
fn test_usage_validation() {
    let (device, mut vault) = setup();

    // writing a sampled texture
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            compute("Bad")
                .usage(
                    RgResourceUsage::write("Lut", RgUsageType::SampledTexture, RgStage::COMPUTE).create(
                        RgCreationSpec::image(RgImageSpec::fixed(4, 4, vk::Format::R8G8B8A8_UNORM))
                            .with_initial_data(|_| Ok(RgInitialData::Fill(0))),
                    ),
                )
                .execute(noop),
        )
        .unwrap();
    assert!(matches!(builder.build(None), Err(FrameGraphError::InvalidUsage { .. })));

    // using a sampled-only texture as a color attachment
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            RgPassRegistration::graphics(
                "DrawIntoLut",
                RgGraphicsPassDesc::new("v.spv", "f.spv").color_formats([vk::Format::R8G8B8A8_UNORM]),
            )
            .usage(RgResourceUsage::write("Lut", RgUsageType::ColorAttachment, RgStage::FRAGMENT))
            .execute(noop),
        )
        .unwrap();
    match builder.build(None) {
        Err(FrameGraphError::InvalidUsage { resource, reason, .. }) => {
            assert_eq!(resource, "Lut");
            assert!(reason.contains("COLOR_ATTACHMENT"));
        }
        _ => panic!("expected InvalidUsage"),
    }

    // unknown resource
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            compute("Lonely")
                .usage(RgResourceUsage::read("Nothing", RgUsageType::SampledTexture, RgStage::COMPUTE))
                .execute(noop),
        )
        .unwrap();
    assert!(matches!(
        builder.build(None),
        Err(FrameGraphError::UnknownResource { ref resource, .. }) if resource == "Nothing"
    ));
    vault.destroy(&device);
}

#[test]
fn test_graphics_attachment_validation() {
    let (device, mut vault) = setup();
    let color = |name: &str, format| {
        RgResourceUsage::write(name, RgUsageType::ColorAttachment, RgStage::FRAGMENT)
            .create(RgCreationSpec::image(RgImageSpec::swapchain_sized(format)))
    };
    let depth = RgResourceUsage::write("GeometryDepthImage", RgUsageType::DepthAttachment, RgStage::FRAGMENT)
        .create(RgCreationSpec::image(RgImageSpec::swapchain_sized(vk::Format::D32_SFLOAT)));

    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            RgPassRegistration::graphics(
                "Geometry",
                RgGraphicsPassDesc::new("standard_vert.spv", "standard_frag.spv")
                    .color_formats([vk::Format::R16G16B16A16_SFLOAT, vk::Format::R8G8B8A8_UNORM])
                    .depth_format(vk::Format::D32_SFLOAT),
            )
            .group("Geometry")
            .usage(color("Geometry0Image", vk::Format::R16G16B16A16_SFLOAT))
            .usage(color("Geometry1Image", vk::Format::R8G8B8A8_UNORM))
            .usage(depth.clone())
            .execute(|ctx| {
                assert_eq!(ctx.color_attachment_views().len(), 2);
                assert!(ctx.depth_attachment_view().is_some());
                Ok(())
            }),
        )
        .unwrap();
    let mut graph = builder.build(None).unwrap();
    run_frame(&device, &mut graph, &mut vault, 0).unwrap();

    // one color attachment short
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            RgPassRegistration::graphics(
                "Geometry",
                RgGraphicsPassDesc::new("standard_vert.spv", "standard_frag.spv")
                    .color_formats([vk::Format::R16G16B16A16_SFLOAT, vk::Format::R8G8B8A8_UNORM])
                    .depth_format(vk::Format::D32_SFLOAT),
            )
            .usage(color("Geometry0Image", vk::Format::R16G16B16A16_SFLOAT))
            .usage(depth.clone())
            .execute(noop),
        )
        .unwrap();
    assert!(matches!(builder.build(None), Err(FrameGraphError::InvalidPass { .. })));

    // attachments on a compute pass
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder.register_render_pass(compute("NotGraphics").usage(depth).execute(noop)).unwrap();
    assert!(matches!(builder.build(None), Err(FrameGraphError::InvalidPass { .. })));
    vault.destroy(&device);
}

#[derive(Default)]
struct CountingFactory {
    graphics: u32,
    compute: u32,
}

impl RgPipelineFactory for CountingFactory {
    fn create_graphics_pipeline(&mut self, _pass: &str, _desc: &RgGraphicsPassDesc) -> anyhow::Result<RgPipeline> {
        self.graphics += 1;
        Ok(RgPipeline {
            bind_point: vk::PipelineBindPoint::GRAPHICS,
            ..Default::default()
        })
    }

    fn create_compute_pipeline(&mut self, pass: &str, desc: &RgComputePassDesc) -> anyhow::Result<RgPipeline> {
        if desc.shader.is_empty() {
            anyhow::bail!("no shader for {}", pass);
        }
        self.compute += 1;
        Ok(RgPipeline {
            bind_point: vk::PipelineBindPoint::COMPUTE,
            ..Default::default()
        })
    }
}

#[test]
fn test_pipeline_factory() {
    let (device, mut vault) = setup();
    let mut factory = CountingFactory::default();

    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    for pass in final_image_passes() {
        builder.register_render_pass(pass).unwrap();
    }
    let mut graph = builder.build(Some(&mut factory)).unwrap();
    assert_eq!(factory.compute, 3);
    assert_eq!(graph.pipeline("Bloom").map(|p| p.bind_point), Some(vk::PipelineBindPoint::COMPUTE));
    run_frame(&device, &mut graph, &mut vault, 0).unwrap();

    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            RgPassRegistration::compute("Broken", RgComputePassDesc::new("")).execute(noop),
        )
        .unwrap();
    assert!(matches!(builder.build(Some(&mut factory)), Err(FrameGraphError::Pipeline { .. })));
    vault.destroy(&device);
}

#[test]
fn test_resize_resets_state_and_rebinds() {
    let (device, mut vault) = setup();
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            compute("Lighting")
                .usage(
                    RgResourceUsage::write("FinalImage", RgUsageType::ImageStorage, RgStage::COMPUTE).create(
                        RgCreationSpec::image(RgImageSpec::swapchain_sized(vk::Format::R16G16B16A16_SFLOAT)),
                    ),
                )
                .execute(noop),
        )
        .unwrap();
    builder
        .register_render_pass(
            compute("Present")
                .usage(RgResourceUsage::read("FinalImage", RgUsageType::SampledTexture, RgStage::COMPUTE))
                .execute(noop),
        )
        .unwrap();
    let mut graph = builder.build(None).unwrap();
    run_frame(&device, &mut graph, &mut vault, 0).unwrap();

    let id = vault.lookup("FinalImage").unwrap();
    assert_eq!(vault.state(id, 0), Some(RgResourceState::ShaderReadOnly));

    let new_extent = vk::Extent2D {
        width: 1920,
        height: 1080,
    };
    device.set_swapchain_extent(new_extent);
    vault.resize(&device, new_extent).unwrap();
    assert_eq!(vault.lookup("FinalImage"), Some(id));
    assert_eq!(vault.state(id, 0), Some(RgResourceState::General));

    let image = vault.get("FinalImage", 0).and_then(RgPhysical::image).unwrap().handle();
    device.take_commands();
    run_frame(&device, &mut graph, &mut vault, 1).unwrap();
    // fresh image: no barrier before the first write, one before the read
    assert_eq!(barriers_for(&device, image).len(), 1);
    vault.destroy(&device);
}

#[test]
fn test_failed_callback_keeps_vault_in_sync() {
    let (device, mut vault) = setup();
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            compute("Lighting")
                .usage(
                    RgResourceUsage::write("FinalImage", RgUsageType::ImageStorage, RgStage::COMPUTE)
                        .create(storage_image(64, 64)),
                )
                .execute(noop),
        )
        .unwrap();
    builder
        .register_render_pass(
            compute("Tonemap")
                .usage(RgResourceUsage::read("FinalImage", RgUsageType::SampledTexture, RgStage::COMPUTE))
                .execute(|_| anyhow::bail!("tonemap shader missing")),
        )
        .unwrap();
    let mut graph = builder.build(None).unwrap();

    let id = vault.lookup("FinalImage").unwrap();
    let image = vault.get("FinalImage", 0).and_then(RgPhysical::image).unwrap().handle();
    let err = run_frame(&device, &mut graph, &mut vault, 0).unwrap_err();
    assert!(matches!(err, FrameGraphError::PassExecution { ref pass, ref reason }
        if pass == "Tonemap" && reason.contains("tonemap shader missing")));
    // the read barrier went out, so the vault must know about it
    assert_eq!(vault.state(id, 0), Some(RgResourceState::ShaderReadOnly));

    device.take_commands();
    assert!(run_frame(&device, &mut graph, &mut vault, 1).is_err());
    let layouts: Vec<_> = barriers_for(&device, image).iter().map(|b| (b.old_layout, b.new_layout)).collect();
    assert_eq!(
        layouts,
        vec![
            (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::GENERAL),
            (vk::ImageLayout::GENERAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        ]
    );
    vault.destroy(&device);
}

#[test]
fn test_failed_resize_keeps_the_frame_running() {
    let (device, mut vault) = setup();
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            compute("Lighting")
                .usage(
                    RgResourceUsage::write("FinalImage", RgUsageType::ImageStorage, RgStage::COMPUTE).create(
                        RgCreationSpec::image(RgImageSpec::swapchain_sized(vk::Format::R16G16B16A16_SFLOAT)),
                    ),
                )
                .execute(noop),
        )
        .unwrap();
    let mut graph = builder.build(None).unwrap();
    run_frame(&device, &mut graph, &mut vault, 0).unwrap();

    let new_extent = vk::Extent2D {
        width: 1920,
        height: 1080,
    };
    device.set_swapchain_extent(new_extent);
    device.set_fail_allocations(true);
    assert!(vault.resize(&device, new_extent).is_err());
    device.set_fail_allocations(false);

    let image = vault.get("FinalImage", 0).and_then(RgPhysical::image).unwrap();
    assert_eq!(image.extent(), extent());

    device.take_commands();
    run_frame(&device, &mut graph, &mut vault, 1).unwrap();
    assert_eq!(labels(&device), vec!["frame", "Lighting"]);
    vault.destroy(&device);
}

#[test]
fn test_redeclaration_error_names_the_pass() {
    let (device, mut vault) = setup();
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    builder
        .register_render_pass(
            compute("Lighting")
                .usage(
                    RgResourceUsage::write("FinalImage", RgUsageType::ImageStorage, RgStage::COMPUTE)
                        .create(storage_image(64, 64)),
                )
                .execute(noop),
        )
        .unwrap();
    let err = builder
        .register_render_pass(
            compute("Bloom")
                .usage(
                    RgResourceUsage::write("FinalImage", RgUsageType::ImageStorage, RgStage::COMPUTE)
                        .create(storage_image(128, 64)),
                )
                .execute(noop),
        )
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("Bloom") && message.contains("FinalImage"), "{message}");
    match err {
        FrameGraphError::Declaration { pass, resource, source } => {
            assert_eq!(pass, "Bloom");
            assert_eq!(resource, "FinalImage");
            assert!(matches!(*source, FrameGraphError::IncompatibleSpec { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    vault.destroy(&device);
}

#[test]
fn test_out_of_range_frame_index_is_rejected() {
    let (device, mut vault) = setup();
    let mut builder = FrameGraphBuilder::new(&device, &mut vault);
    for pass in final_image_passes() {
        builder.register_render_pass(pass).unwrap();
    }
    let mut graph = builder.build(None).unwrap();

    let data = RgFrameData {
        fif_index: FIF_COUNT,
        ..frame(0)
    };
    device.take_commands();
    let err = one_time_exec(&device, "frame", |cmd| graph.execute(&mut vault, cmd, &data)).unwrap().unwrap_err();
    assert!(matches!(err, FrameGraphError::InvalidFrame { fif_index: 3, fif_count: 3 }));
    assert!(device.image_barriers().is_empty());
    vault.destroy(&device);
}
