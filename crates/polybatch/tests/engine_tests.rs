//! End-to-end batching behavior against the recording device.

use glam::Vec3;
use polybatch::{
    BatchSorter, PolyBatch, RenderState,
    items::{LitQuad3d, Poly2d, PolygonRegion, Quad2d, Quad3d, Texture},
    Region2d,
};
use polybatch_gpu::{DeviceCall, Primitive, RecordingDevice, ShaderHandle, TextureHandle};
use std::sync::Arc;

// Opt into flush tracing with RUST_LOG=polybatch=trace.
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn quad_batch(max_vertices: usize) -> (Arc<RecordingDevice>, PolyBatch<Quad2d>) {
    init_logs();
    let device = Arc::new(RecordingDevice::new());
    let mut batch = PolyBatch::new(Quad2d::new(), max_vertices, 0, device.clone());
    batch.set_shader(ShaderHandle(1));
    (device, batch)
}

fn tex(id: u64) -> Texture {
    Texture::new(TextureHandle(id), 16, 16)
}

fn sprite(texture: Texture) -> Quad2d {
    let mut quad = Quad2d::new();
    quad.texture(texture).size(1.0, 1.0);
    quad
}

#[test]
fn test_capacity_splits_draw_calls() {
    // Room for two quads per flush; five quads need three draw calls.
    let (device, mut batch) = quad_batch(8);
    let quad = sprite(tex(1));

    batch.begin();
    for _ in 0..5 {
        batch.draw(&quad);
    }
    batch.end();

    let draws = device.draw_calls();
    assert_eq!(draws.len(), 3);
    let counts: Vec<usize> = draws
        .iter()
        .map(|call| match call {
            DeviceCall::Draw { count, .. } => *count,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(counts, vec![12, 12, 6]);
}

#[test]
fn test_texture_change_costs_one_flush() {
    let (device, mut batch) = quad_batch(400);
    let first = sprite(tex(1));
    let second = sprite(tex(2));

    batch.begin();
    batch.draw(&first);
    batch.draw(&first);
    batch.draw(&second);
    batch.draw(&second);
    batch.end();

    assert_eq!(device.draw_calls().len(), 2);
    // The second texture is bound between the two draws.
    let calls = device.calls();
    let first_draw = calls
        .iter()
        .position(|c| matches!(c, DeviceCall::Draw { .. }))
        .unwrap();
    assert!(calls[first_draw..].iter().any(|c| matches!(
        c,
        DeviceCall::BindTexture {
            texture: TextureHandle(2),
            unit: 0,
        }
    )));
}

#[test]
fn test_texture_units_bind_in_unit_order() {
    let device = RecordingDevice::new();
    let mut state = RenderState::new();
    state.begin(&device);
    device.clear();

    state.set_texture_unit(Some(TextureHandle(30)), 2);
    state.set_texture_unit(Some(TextureHandle(10)), 0);
    state.set_texture_unit(Some(TextureHandle(20)), 1);
    state.apply_changes(&device);

    assert_eq!(
        device.calls(),
        vec![
            DeviceCall::BindTexture {
                texture: TextureHandle(10),
                unit: 0,
            },
            DeviceCall::BindTexture {
                texture: TextureHandle(20),
                unit: 1,
            },
            DeviceCall::BindTexture {
                texture: TextureHandle(30),
                unit: 2,
            },
        ]
    );
}

#[test]
fn test_fixed_topology_indices_uploaded_once() {
    let (device, _batch) = quad_batch(8);

    let calls = device.calls();
    let index_uploads: Vec<Vec<u16>> = calls
        .iter()
        .filter_map(|c| match c {
            DeviceCall::UploadIndices { indices } => Some(indices.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(index_uploads.len(), 1);
    // Base pattern offset by four vertices per item, all within range.
    assert_eq!(index_uploads[0], vec![0, 2, 1, 0, 3, 2, 4, 6, 5, 4, 7, 6]);
    assert!(index_uploads[0].iter().all(|&i| (i as usize) < 8));
}

#[test]
fn test_variable_topology_uploads_indices_per_flush() {
    let device = Arc::new(RecordingDevice::new());
    let mut batch = PolyBatch::new(Poly2d::new(), 100, 50, device.clone());
    batch.set_shader(ShaderHandle(1));

    let region = Arc::new(PolygonRegion::new(
        tex(1),
        Region2d::full(),
        vec![0.0, 0.0, 16.0, 0.0, 8.0, 16.0],
        vec![0, 1, 2],
    ));
    let mut poly = Poly2d::new();
    poly.region(region);

    batch.begin();
    batch.draw(&poly);
    batch.draw(&poly);
    batch.end();

    let calls = device.calls();
    let index_uploads: Vec<Vec<u16>> = calls
        .iter()
        .filter_map(|c| match c {
            DeviceCall::UploadIndices { indices } => Some(indices.clone()),
            _ => None,
        })
        .collect();
    // Second polygon's indices continue from the first's vertices.
    assert_eq!(index_uploads, vec![vec![0, 1, 2, 3, 4, 5]]);
    assert_eq!(device.draw_calls().len(), 1);
}

#[test]
fn test_sorter_groups_opaque_items_by_texture() {
    let device = Arc::new(RecordingDevice::new());
    let mut batch = PolyBatch::new(Quad3d::new(), 400, 0, device.clone());
    batch.set_shader(ShaderHandle(1));

    let mut a = Quad3d::new();
    a.texture(tex(1));
    let mut b = Quad3d::new();
    b.texture(tex(1));
    let mut c = Quad3d::new();
    c.texture(tex(2));

    let mut sorter = BatchSorter::new();
    sorter.add(&a);
    sorter.add(&c);
    sorter.add(&b);

    batch.begin();
    sorter.flush(&mut batch);
    batch.end();

    // Interleaved submission would cost three flushes; grouped costs two.
    assert_eq!(device.draw_calls().len(), 2);
}

#[test]
fn test_sorter_draws_blended_far_to_near() {
    let device = Arc::new(RecordingDevice::new());
    let mut batch = PolyBatch::new(Quad3d::new(), 400, 0, device.clone());
    batch.set_shader(ShaderHandle(1));

    // Size zero collapses every corner onto the position, making the vertex
    // stream a direct record of submission order.
    let mut near = Quad3d::new();
    near.blend().position(0.0, 0.0, 1.0);
    let mut far = Quad3d::new();
    far.blend().position(0.0, 0.0, 5.0);
    let mut middle = Quad3d::new();
    middle.blend().position(0.0, 0.0, 3.0);

    let mut sorter = BatchSorter::new();
    sorter.set_viewpoint(Vec3::ZERO);
    sorter.add(&near);
    sorter.add(&far);
    sorter.add(&middle);

    batch.begin();
    sorter.flush(&mut batch);
    batch.end();

    assert_eq!(device.draw_calls().len(), 1);
    let vertices = device.last_vertices();
    // Stride is 6 for the 3D quad layout; z sits at offset 2.
    assert_eq!(vertices[2], 5.0);
    assert_eq!(vertices[4 * 6 + 2], 3.0);
    assert_eq!(vertices[8 * 6 + 2], 1.0);
}

#[test]
fn test_second_flush_draws_nothing() {
    let (device, mut batch) = quad_batch(400);
    let quad = sprite(tex(1));

    batch.begin();
    batch.draw(&quad);
    batch.flush();
    assert_eq!(device.draw_calls().len(), 1);

    // Nothing queued: a second flush only reconciles state.
    batch.flush();
    assert_eq!(device.draw_calls().len(), 1);
    batch.end();
    assert_eq!(device.draw_calls().len(), 1);
}

#[test]
fn test_end_restores_device_defaults() {
    let (device, mut batch) = quad_batch(400);
    let quad = sprite(tex(1));

    batch.begin();
    batch.draw(&quad);
    batch.flush();
    device.clear();
    batch.end();

    let calls = device.calls();
    assert!(!calls.iter().any(|c| matches!(c, DeviceCall::Draw { .. })));
    // The sprite's shared state turned depth writes off; end turns them back.
    assert!(
        calls
            .iter()
            .any(|c| matches!(c, DeviceCall::SetDepthMask { enabled: true }))
    );
}

#[test]
fn test_scratch_item_submits_on_next_engine_call() {
    let (device, mut batch) = quad_batch(400);

    batch.begin();
    batch.item().texture(tex(1));
    assert_eq!(device.draw_calls().len(), 0);

    // Acquiring the scratch item again queues the previous one.
    batch.item();
    assert_eq!(device.draw_calls().len(), 0);
    batch.end();

    let draws = device.draw_calls();
    assert_eq!(draws.len(), 1);
    assert!(matches!(
        draws[0],
        DeviceCall::Draw {
            primitive: Primitive::Triangles,
            count: 12,
            ..
        }
    ));
}

#[test]
fn test_repeat_previous_flush_reissues_draw() {
    let (device, mut batch) = quad_batch(400);
    let quad = sprite(tex(1));

    batch.begin();
    batch.draw(&quad);
    batch.draw(&quad);
    batch.flush();
    batch.repeat_previous_flush();
    batch.end();

    let draws = device.draw_calls();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0], draws[1]);
}

#[test]
fn test_redraw_reuses_buffer_contents() {
    let (device, mut batch) = quad_batch(400);
    let quad = sprite(tex(1));

    batch.begin();
    batch.draw(&quad);
    batch.draw(&quad);
    batch.flush();

    batch.redraw(2);
    batch.flush();
    batch.end();

    let counts: Vec<usize> = device
        .draw_calls()
        .iter()
        .map(|call| match call {
            DeviceCall::Draw { count, .. } => *count,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(counts, vec![12, 12]);
}

#[test]
fn test_empty_session_issues_no_draws() {
    let (device, mut batch) = quad_batch(400);
    batch.begin();
    batch.end();
    assert_eq!(device.draw_calls().len(), 0);
}

#[test]
fn test_begin_assigns_matrix_and_sampler_uniforms() {
    let (device, mut batch) = quad_batch(400);
    batch.begin();
    batch.end();

    let calls = device.calls();
    assert!(calls.iter().any(|c| matches!(
        c,
        DeviceCall::SetUniformMatrix { name, .. } if name == "u_proj_trans"
    )));
    assert!(calls.iter().any(|c| matches!(
        c,
        DeviceCall::SetUniformInt { name, value: 0, .. } if name == "u_texture0"
    )));
}

#[test]
fn test_lit_quad_binds_three_units_in_declared_order() {
    let device = Arc::new(RecordingDevice::new());
    let mut batch = PolyBatch::new(LitQuad3d::new(), 400, 0, device.clone());
    batch.set_shader(ShaderHandle(1));

    let mut quad = LitQuad3d::new();
    quad.normal_map(tex(2)).specular_map(tex(3));
    quad.quad.texture(tex(1));

    batch.begin();
    batch.draw(&quad);
    batch.end();

    let bindings: Vec<(u64, u32)> = device
        .calls()
        .iter()
        .filter_map(|c| match c {
            DeviceCall::BindTexture { texture, unit } => Some((texture.0, *unit)),
            _ => None,
        })
        .collect();
    assert_eq!(bindings, vec![(1, 0), (2, 1), (3, 2)]);

    // One sampler uniform per declared texture slot.
    for slot in 0..3 {
        assert!(device.calls().iter().any(|c| matches!(
            c,
            DeviceCall::SetUniformInt { name, value, .. }
                if *value == slot && name == &format!("u_texture{slot}")
        )));
    }
}

#[test]
fn test_lit_quad_uploads_tangent_space_columns() {
    let device = Arc::new(RecordingDevice::new());
    let mut batch = PolyBatch::new(LitQuad3d::new(), 400, 0, device.clone());
    batch.set_shader(ShaderHandle(1));

    batch.begin();
    batch
        .item()
        .quad
        .texture(tex(1))
        .size(2.0, 2.0);
    batch.end();

    let vertices = device.last_vertices();
    // Stride is 15 for the lit layout; the normal column starts at offset 6.
    assert_eq!(vertices.len(), 4 * 15);
    for vertex in 0..4 {
        assert_eq!(&vertices[vertex * 15 + 6..vertex * 15 + 9], &[0.0, 0.0, 1.0]);
        assert_eq!(&vertices[vertex * 15 + 9..vertex * 15 + 12], &[1.0, 0.0, 0.0]);
        assert_eq!(&vertices[vertex * 15 + 12..vertex * 15 + 15], &[0.0, 1.0, 0.0]);
    }
}

#[test]
fn test_shader_change_flushes_mid_session() {
    let (device, mut batch) = quad_batch(400);
    let quad = sprite(tex(1));

    batch.begin();
    batch.draw(&quad);
    batch.set_shader(ShaderHandle(2));
    batch.draw(&quad);
    batch.end();

    let draws = device.draw_calls();
    assert_eq!(draws.len(), 2);
    assert!(matches!(
        draws[0],
        DeviceCall::Draw {
            shader: ShaderHandle(1),
            ..
        }
    ));
    assert!(matches!(
        draws[1],
        DeviceCall::Draw {
            shader: ShaderHandle(2),
            ..
        }
    ));
}
