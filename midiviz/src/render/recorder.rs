use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use crate::config::{ExportFormat, Exporting};

pub const RECORDING_FORMAT: wgpu::TextureFormat =
    wgpu::TextureFormat::Rgba8Unorm;

pub struct RecordingStats {
    pub frames_captured: u32,
    pub output_path: PathBuf,
}

enum Sink {
    Ffmpeg {
        process: Child,
        stdin: Option<ChildStdin>,
    },
    Png {
        dir: PathBuf,
    },
}

/// Renders into an offscreen texture of the export size and writes every
/// captured frame before returning.
pub struct FrameRecorder {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    view: wgpu::TextureView,
    texture: wgpu::Texture,
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_bytes_per_row: u32,
    frame_bytes: Vec<u8>,
    sink: Sink,
    frames_captured: u32,
    output_path: PathBuf,
}

impl FrameRecorder {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        exporting: &Exporting,
        framebuffer_size: [u32; 2],
    ) -> Result<Self, String> {
        let output_path = exporting
            .path
            .clone()
            .ok_or_else(|| "no export path set".to_string())?;
        let [width, height] =
            resolve_size(exporting, framebuffer_size, device.limits())?;

        if exporting.framerate == 0 {
            return Err("export framerate must be positive".to_string());
        }

        let sink = match exporting.format {
            ExportFormat::Png => {
                fs::create_dir_all(&output_path).map_err(|err| {
                    format!(
                        "failed to create '{}': {}",
                        output_path.display(),
                        err
                    )
                })?;
                Sink::Png {
                    dir: output_path.clone(),
                }
            }
            ExportFormat::Mp4 | ExportFormat::ProRes => {
                let preset = std::env::var("MIDIVIZ_RECORDING_PRESET")
                    .unwrap_or_else(|_| "veryfast".to_string());
                let args = ffmpeg_args(
                    exporting,
                    &output_path,
                    [width, height],
                    &preset,
                );

                let mut process = Command::new("ffmpeg")
                    .args(&args)
                    .stdin(Stdio::piped())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .map_err(|err| format!("failed to start ffmpeg: {}", err))?;

                let stdin = process
                    .stdin
                    .take()
                    .ok_or_else(|| "failed to open ffmpeg stdin".to_string())?;

                Sink::Ffmpeg {
                    process,
                    stdin: Some(stdin),
                }
            }
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("midiviz-recording-target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: RECORDING_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let unpadded_bytes_per_row = width * 4;
        let padded_bytes_per_row = unpadded_bytes_per_row
            + compute_row_padding(unpadded_bytes_per_row);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("midiviz-recording-readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        info!(
            "recording {}x{} at {} fps to '{}'",
            width,
            height,
            exporting.framerate,
            output_path.display()
        );

        Ok(Self {
            device,
            queue,
            view,
            texture,
            buffer,
            width,
            height,
            padded_bytes_per_row,
            frame_bytes: vec![0; frame_byte_len(width, height)],
            sink,
            frames_captured: 0,
            output_path,
        })
    }

    pub fn target_view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Copies the offscreen target out of `encoder`, submits it and writes
    /// the frame.
    pub fn capture(
        &mut self,
        mut encoder: wgpu::CommandEncoder,
    ) -> Result<(), String> {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = self.buffer.slice(..);
        let (tx, rx) = mpsc::sync_channel(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        let map_result = loop {
            match rx.try_recv() {
                Ok(result) => break result,
                Err(mpsc::TryRecvError::Empty) => {
                    let _ = self.device.poll(wgpu::PollType::Poll);
                    thread::sleep(Duration::from_micros(250));
                }
                Err(mpsc::TryRecvError::Disconnected) => {
                    return Err("readback channel disconnected".to_string());
                }
            }
        };
        map_result.map_err(|err| format!("map failed: {:?}", err))?;

        {
            let data = slice.get_mapped_range();
            copy_padded_rows_to_contiguous(
                &data,
                &mut self.frame_bytes,
                self.height,
                self.width * 4,
                self.padded_bytes_per_row,
            );
        }
        self.buffer.unmap();

        match &mut self.sink {
            Sink::Ffmpeg { stdin, .. } => {
                let stdin = stdin
                    .as_mut()
                    .ok_or_else(|| "ffmpeg stdin already closed".to_string())?;
                stdin
                    .write_all(&self.frame_bytes)
                    .map_err(|err| format!("ffmpeg write failed: {}", err))?;
            }
            Sink::Png { dir } => {
                let path = png_frame_path(dir, self.frames_captured);
                write_png(&path, &self.frame_bytes, self.width, self.height)?;
            }
        }

        self.frames_captured += 1;
        Ok(())
    }

    pub fn stop(self) -> RecordingStats {
        if let Sink::Ffmpeg {
            mut process,
            mut stdin,
        } = self.sink
        {
            drop(stdin.take());
            match process.wait() {
                Ok(status) if !status.success() => {
                    error!("ffmpeg exited with status: {}", status);
                }
                Ok(_) => {}
                Err(err) => error!("failed to wait for ffmpeg: {}", err),
            }
        }

        info!(
            "recording complete: {} frames in '{}'",
            self.frames_captured,
            self.output_path.display()
        );

        RecordingStats {
            frames_captured: self.frames_captured,
            output_path: self.output_path,
        }
    }
}

fn resolve_size(
    exporting: &Exporting,
    framebuffer_size: [u32; 2],
    limits: wgpu::Limits,
) -> Result<[u32; 2], String> {
    let [mut width, mut height] = if exporting.size == [0, 0] {
        framebuffer_size
    } else {
        exporting.size
    };

    if width == 0 || height == 0 {
        return Err(format!("invalid export size {}x{}", width, height));
    }

    let max = limits.max_texture_dimension_2d;
    if width > max || height > max {
        return Err(format!(
            "export size {}x{} exceeds the device limit of {}",
            width, height, max
        ));
    }

    // yuv output needs even dimensions.
    if exporting.format.is_video() && (width % 2 == 1 || height % 2 == 1) {
        warn!("rounding export size {}x{} down to even", width, height);
        width -= width % 2;
        height -= height % 2;
        if width == 0 || height == 0 {
            return Err("export size too small for video".to_string());
        }
    }

    Ok([width, height])
}

fn ffmpeg_args(
    exporting: &Exporting,
    output_path: &Path,
    size: [u32; 2],
    preset: &str,
) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostats",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect();

    args.extend([
        "-s".to_string(),
        format!("{}x{}", size[0], size[1]),
        "-r".to_string(),
        exporting.framerate.to_string(),
        "-i".to_string(),
        "pipe:0".to_string(),
    ]);

    match exporting.format {
        ExportFormat::ProRes => {
            args.extend(
                ["-c:v", "prores_ks", "-profile:v", "3"]
                    .iter()
                    .map(|arg| arg.to_string()),
            );
            args.extend(["-pix_fmt".to_string(), "yuv422p10le".to_string()]);
        }
        _ => {
            args.extend([
                "-c:v".to_string(),
                "libx264".to_string(),
                "-b:v".to_string(),
                format!("{}M", exporting.bitrate),
                "-preset".to_string(),
                preset.to_string(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
            ]);
        }
    }

    args.push(output_path.display().to_string());
    args
}

fn png_frame_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("frame_{:06}.png", index))
}

fn write_png(
    path: &Path,
    rgba: &[u8],
    width: u32,
    height: u32,
) -> Result<(), String> {
    let file = fs::File::create(path).map_err(|err| {
        format!("failed to create '{}': {}", path.display(), err)
    })?;
    let mut writer = BufWriter::new(file);
    let mut encoder = png::Encoder::new(&mut writer, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Fast);
    let mut png_writer = encoder
        .write_header()
        .map_err(|err| format!("png header failed: {}", err))?;
    png_writer
        .write_image_data(rgba)
        .map_err(|err| format!("png write failed: {}", err))?;
    drop(png_writer);
    writer
        .flush()
        .map_err(|err| format!("png flush failed: {}", err))
}

fn copy_padded_rows_to_contiguous(
    data: &[u8],
    out: &mut [u8],
    height: u32,
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
) {
    let unpadded_bytes_per_row = unpadded_bytes_per_row as usize;
    let padded_bytes_per_row = padded_bytes_per_row as usize;

    for row in 0..height as usize {
        let src_start = row * padded_bytes_per_row;
        let dst_start = row * unpadded_bytes_per_row;
        out[dst_start..dst_start + unpadded_bytes_per_row].copy_from_slice(
            &data[src_start..src_start + unpadded_bytes_per_row],
        );
    }
}

// Tightly packed RGBA bytes for one frame.
fn frame_byte_len(width: u32, height: u32) -> usize {
    width as usize * 4 * height as usize
}

fn compute_row_padding(unpadded_bytes_per_row: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let rem = unpadded_bytes_per_row % align;
    if rem == 0 { 0 } else { align - rem }
}
