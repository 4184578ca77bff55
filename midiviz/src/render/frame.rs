use std::sync::Arc;

/// One acquired surface texture and the encoder that draws into it.
pub struct Frame {
    pub surface_view: wgpu::TextureView,
    pub size: [u32; 2],
    encoder: wgpu::CommandEncoder,
    output: wgpu::SurfaceTexture,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl Frame {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        output: wgpu::SurfaceTexture,
    ) -> Self {
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("midiviz-frame-encoder"),
            });

        let size = [output.texture.width(), output.texture.height()];

        Self {
            surface_view,
            size,
            encoder,
            output,
            device,
            queue,
        }
    }

    /// Split borrows for passes that need the device next to the encoder.
    pub fn parts(
        &mut self,
    ) -> (
        &wgpu::Device,
        &wgpu::Queue,
        &mut wgpu::CommandEncoder,
        &wgpu::TextureView,
    ) {
        (&self.device, &self.queue, &mut self.encoder, &self.surface_view)
    }

    pub fn submit(self) {
        self.queue.submit(Some(self.encoder.finish()));
        self.output.present();
    }
}
