use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use glam::{Mat4, Vec3, Vec4};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use raytracer::render::{
    create_renderer, render_with, Backend, GpuContext, RendererConfig, SoftwareRenderer,
};
use raytracer::tracing::GridSampler;
use raytracer::{BLIT_SHADER_ASSET, TRACER_SHADER_ASSET};
use scenegraph::{
    AssetLibrary, Camera, HeapBuffer, Material, MaterialLibrary, Scene, SceneNode, TriangleMesh,
};

fn main() {
    env_logger::init();

    let software = std::env::args().any(|arg| arg == "--software");
    let result = if software {
        render_offscreen()
    } else {
        run_windowed()
    };

    if let Err(err) = result {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn build_scene(materials: &mut MaterialLibrary) -> Scene {
    let orange = materials.create(Material::new(Vec4::new(0.9, 0.45, 0.1, 1.0)));
    let grey = materials.create(Material::new(Vec4::new(0.35, 0.35, 0.4, 1.0)));

    let mut scene = Scene::new(Vec4::new(0.08, 0.1, 0.18, 1.0));
    let cube = scene.add_mesh(TriangleMesh::cube(0.75));
    let floor = scene.add_mesh(TriangleMesh::ground_quad(4.0));

    scene
        .root_mut()
        .add_child(SceneNode::with_data("box", cube, orange));
    let floor_node = scene
        .root_mut()
        .add_child(SceneNode::with_data("floor", floor, grey));
    floor_node.set_transform(Mat4::from_translation(Vec3::new(0.0, -0.75, 0.0)));

    scene.add_camera(Camera::new(Vec3::new(2.5, 2.0, 4.0), Vec3::ZERO));
    scene
}

fn shader_assets() -> AssetLibrary {
    let mut assets = AssetLibrary::new();
    assets.add_asset(
        TRACER_SHADER_ASSET,
        HeapBuffer::from_bytes(include_str!("../shaders/tracer.wgsl").as_bytes()),
    );
    assets.add_asset(
        BLIT_SHADER_ASSET,
        HeapBuffer::from_bytes(include_str!("../shaders/blit.wgsl").as_bytes()),
    );
    assets
}

/// Render one frame on the CPU backend and write it to `output.png`.
fn render_offscreen() -> Result<(), Box<dyn Error>> {
    let mut materials = MaterialLibrary::new();
    let scene = build_scene(&mut materials);
    let camera = *scene.camera(0).ok_or("scene has no camera")?;

    let config = RendererConfig {
        backend: Backend::Software,
        width: 640,
        height: 480,
        samples: 4,
    };
    let mut renderer = SoftwareRenderer::new(Arc::new(materials), Box::new(GridSampler), &config);

    let started = Instant::now();
    render_with(&mut renderer, &scene, &camera)?;
    log::info!("traced frame in {:?}", started.elapsed());

    let (width, height) = renderer.size();
    image::save_buffer(
        "output.png",
        &renderer.to_rgba8(),
        width,
        height,
        image::ExtendedColorType::Rgba8,
    )?;
    log::info!("wrote output.png");
    Ok(())
}

fn run_windowed() -> Result<(), Box<dyn Error>> {
    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("raytracer")
            .with_inner_size(PhysicalSize::new(800, 600))
            .build(&event_loop)?,
    );
    let size = window.inner_size();

    let mut materials = MaterialLibrary::new();
    let mut scene = build_scene(&mut materials);

    let gpu = pollster::block_on(GpuContext::new(window.clone(), size.width, size.height))?;
    let config = RendererConfig {
        backend: Backend::Hardware,
        width: size.width,
        height: size.height,
        samples: 2,
    };
    let mut renderer = create_renderer(&config, Some(gpu), &shader_assets(), Arc::new(materials))?;

    let started = Instant::now();
    event_loop.run(move |event, elwt| match event {
        Event::AboutToWait => window.request_redraw(),
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::KeyboardInput { event, .. }
                if event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                elwt.exit();
            }
            WindowEvent::Resized(new_size) => {
                renderer.resize(new_size.width, new_size.height);
            }
            WindowEvent::RedrawRequested => {
                let angle = started.elapsed().as_secs_f32();
                if let Some(node) = scene.find_node_mut("box") {
                    node.set_transform(Mat4::from_rotation_y(angle));
                }

                let camera = *scene.camera(0).expect("scene has a camera");
                if let Err(err) = render_with(renderer.as_mut(), &scene, &camera) {
                    log::warn!("dropped frame: {err}");
                }
            }
            _ => {}
        },
        _ => {}
    })?;
    Ok(())
}
