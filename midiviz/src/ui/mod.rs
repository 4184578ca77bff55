use log::debug;
use winit::event::WindowEvent;

use crate::render::frame::Frame;
use crate::runtime::context::GraphicsContext;
use crate::runtime::session::Overlay;

pub mod panel;
pub mod style;

/// egui on top of the rendered scene: winit for input, wgpu for painting.
pub struct EguiOverlay {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl EguiOverlay {
    pub fn new(context: &GraphicsContext) -> Self {
        let ctx = egui::Context::default();
        style::apply(&ctx);

        let window = context.window();
        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            window.theme(),
            Some(context.device().limits().max_texture_dimension_2d as usize),
        );

        let renderer = egui_wgpu::Renderer::new(
            context.device(),
            context.format(),
            egui_wgpu::RendererOptions::default(),
        );

        Self {
            ctx,
            state,
            renderer,
        }
    }

    fn paint(
        &mut self,
        frame: &mut Frame,
        pixels_per_point: f32,
        jobs: &[egui::ClippedPrimitive],
    ) {
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: frame.size,
            pixels_per_point,
        };
        let (device, queue, encoder, view) = frame.parts();

        let callbacks =
            self.renderer
                .update_buffers(device, queue, encoder, jobs, &screen);

        {
            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("midiviz-ui"),
                    color_attachments: &[Some(
                        wgpu::RenderPassColorAttachment {
                            view,
                            resolve_target: None,
                            depth_slice: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Load,
                                store: wgpu::StoreOp::Store,
                            },
                        },
                    )],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();

            self.renderer.render(&mut render_pass, jobs, &screen);
        }

        if !callbacks.is_empty() {
            queue.submit(callbacks);
        }
    }
}

impl Overlay<GraphicsContext> for EguiOverlay {
    fn context(&self) -> &egui::Context {
        &self.ctx
    }

    fn begin_frame(&mut self, window: &GraphicsContext) {
        let input = self.state.take_egui_input(window.window());
        self.ctx.begin_pass(input);
    }

    fn end_frame(
        &mut self,
        window: &GraphicsContext,
        target: Option<&mut Frame>,
    ) {
        let mut output = self.ctx.end_pass();
        let platform_output = std::mem::take(&mut output.platform_output);
        self.state
            .handle_platform_output(window.window(), platform_output);

        // Texture updates arrive once, so apply them even without a frame.
        for (id, delta) in &output.textures_delta.set {
            self.renderer.update_texture(
                window.device(),
                window.queue(),
                *id,
                delta,
            );
        }

        if let Some(frame) = target {
            let shapes = std::mem::take(&mut output.shapes);
            let jobs = self.ctx.tessellate(shapes, output.pixels_per_point);
            self.paint(frame, output.pixels_per_point, &jobs);
        }

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }

    fn on_window_event(
        &mut self,
        window: &GraphicsContext,
        event: &WindowEvent,
    ) {
        let _ = self.state.on_window_event(window.window(), event);
    }

    // Release GPU textures while the device is still alive.
    fn shutdown(&mut self) {
        let ids: Vec<egui::TextureId> = self
            .ctx
            .tex_manager()
            .read()
            .allocated()
            .map(|(id, _)| *id)
            .collect();

        for id in &ids {
            self.renderer.free_texture(id);
        }
        debug!("released {} ui textures", ids.len());
    }
}
