use gleam::gl::{self, GLuint, Gl};
use std::rc::Rc;
use thiserror::Error;
use voxvr_api::VREye;

#[derive(Debug, Clone, Error)]
pub enum TargetError {
    #[error("eye framebuffer incomplete, status {status:#x}")]
    Incomplete { status: u32 },
}

/// Offscreen eye render targets, as seen by the frame loop.
///
/// The trait seam keeps the loop independent of the GL objects so the render
/// ordering can be exercised without a context.
pub trait EyeTargets {
    /// Per-eye render resolution in pixels.
    fn size(&self) -> (u32, u32);

    /// Bind one eye's render framebuffer and set its viewport.
    fn bind(&mut self, eye: VREye);

    /// Return to the default framebuffer.
    fn unbind(&mut self);

    /// Resolve the eye's multisampled color into its sampling-ready texture.
    /// A no-op for single-sample targets.
    fn resolve(&mut self, eye: VREye);

    /// The texture handle to hand to the compositor for this eye.
    fn submit_texture(&self, eye: VREye) -> u32;

    /// Copy the eye's resolved image into a rectangle of the on-screen
    /// window, for the companion view.
    fn blit_to_window(&mut self, eye: VREye, dst: (i32, i32, i32, i32));
}

struct EyeBuffers {
    render_fbo: GLuint,
    depth_buffer: GLuint,
    /// Multisampled color renderbuffer, 0 on the single-sample path.
    color_buffer: GLuint,
    /// Framebuffer wrapping `resolve_texture`; equals `render_fbo` on the
    /// single-sample path.
    resolve_fbo: GLuint,
    resolve_texture: GLuint,
}

/// Dual offscreen render targets sized to the runtime's recommendation, with
/// an optional multisampled render pass resolved into a sampling-ready
/// texture per eye.
pub struct GlStereoTargets {
    gl: Rc<dyn Gl>,
    eyes: [EyeBuffers; 2],
    width: u32,
    height: u32,
    samples: i32,
}

impl GlStereoTargets {
    pub fn new(
        gl: Rc<dyn Gl>,
        width: u32,
        height: u32,
        msaa_samples: i32,
    ) -> Result<GlStereoTargets, TargetError> {
        let eyes = [
            Self::create_eye_buffers(&*gl, width, height, msaa_samples)?,
            Self::create_eye_buffers(&*gl, width, height, msaa_samples)?,
        ];
        Ok(GlStereoTargets {
            gl,
            eyes,
            width,
            height,
            samples: msaa_samples,
        })
    }

    fn create_eye_buffers(
        gl: &dyn Gl,
        width: u32,
        height: u32,
        samples: i32,
    ) -> Result<EyeBuffers, TargetError> {
        let w = width as i32;
        let h = height as i32;

        let render_fbo = gl.gen_framebuffers(1)[0];
        gl.bind_framebuffer(gl::FRAMEBUFFER, render_fbo);

        let depth_buffer = gl.gen_renderbuffers(1)[0];
        gl.bind_renderbuffer(gl::RENDERBUFFER, depth_buffer);
        if samples > 1 {
            gl.renderbuffer_storage_multisample(
                gl::RENDERBUFFER,
                samples,
                gl::DEPTH_COMPONENT24,
                w,
                h,
            );
        } else {
            gl.renderbuffer_storage(gl::RENDERBUFFER, gl::DEPTH_COMPONENT24, w, h);
        }
        gl.framebuffer_renderbuffer(
            gl::FRAMEBUFFER,
            gl::DEPTH_ATTACHMENT,
            gl::RENDERBUFFER,
            depth_buffer,
        );

        let buffers = if samples > 1 {
            let color_buffer = gl.gen_renderbuffers(1)[0];
            gl.bind_renderbuffer(gl::RENDERBUFFER, color_buffer);
            gl.renderbuffer_storage_multisample(gl::RENDERBUFFER, samples, gl::RGBA8, w, h);
            gl.framebuffer_renderbuffer(
                gl::FRAMEBUFFER,
                gl::COLOR_ATTACHMENT0,
                gl::RENDERBUFFER,
                color_buffer,
            );
            Self::check_complete(gl)?;

            let resolve_fbo = gl.gen_framebuffers(1)[0];
            gl.bind_framebuffer(gl::FRAMEBUFFER, resolve_fbo);
            let resolve_texture = Self::create_color_texture(gl, w, h);
            gl.framebuffer_texture_2d(
                gl::FRAMEBUFFER,
                gl::COLOR_ATTACHMENT0,
                gl::TEXTURE_2D,
                resolve_texture,
                0,
            );
            Self::check_complete(gl)?;

            EyeBuffers {
                render_fbo,
                depth_buffer,
                color_buffer,
                resolve_fbo,
                resolve_texture,
            }
        } else {
            let resolve_texture = Self::create_color_texture(gl, w, h);
            gl.framebuffer_texture_2d(
                gl::FRAMEBUFFER,
                gl::COLOR_ATTACHMENT0,
                gl::TEXTURE_2D,
                resolve_texture,
                0,
            );
            Self::check_complete(gl)?;

            EyeBuffers {
                render_fbo,
                depth_buffer,
                color_buffer: 0,
                resolve_fbo: render_fbo,
                resolve_texture,
            }
        };

        gl.bind_framebuffer(gl::FRAMEBUFFER, 0);
        Ok(buffers)
    }

    fn create_color_texture(gl: &dyn Gl, w: i32, h: i32) -> GLuint {
        let texture = gl.gen_textures(1)[0];
        gl.bind_texture(gl::TEXTURE_2D, texture);
        gl.tex_image_2d(
            gl::TEXTURE_2D,
            0,
            gl::RGBA8 as i32,
            w,
            h,
            0,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            None,
        );
        gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::LINEAR as i32);
        gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::LINEAR as i32);
        gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
        texture
    }

    fn check_complete(gl: &dyn Gl) -> Result<(), TargetError> {
        let status = gl.check_frame_buffer_status(gl::FRAMEBUFFER);
        if status != gl::FRAMEBUFFER_COMPLETE {
            return Err(TargetError::Incomplete { status });
        }
        Ok(())
    }
}

impl EyeTargets for GlStereoTargets {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn bind(&mut self, eye: VREye) {
        let fbo = self.eyes[eye.index()].render_fbo;
        self.gl.bind_framebuffer(gl::FRAMEBUFFER, fbo);
        self.gl.viewport(0, 0, self.width as i32, self.height as i32);
    }

    fn unbind(&mut self) {
        self.gl.bind_framebuffer(gl::FRAMEBUFFER, 0);
    }

    fn resolve(&mut self, eye: VREye) {
        if self.samples <= 1 {
            return;
        }
        let buffers = &self.eyes[eye.index()];
        let (w, h) = (self.width as i32, self.height as i32);
        self.gl.bind_framebuffer(gl::READ_FRAMEBUFFER, buffers.render_fbo);
        self.gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, buffers.resolve_fbo);
        self.gl
            .blit_framebuffer(0, 0, w, h, 0, 0, w, h, gl::COLOR_BUFFER_BIT, gl::NEAREST);
        self.gl.bind_framebuffer(gl::READ_FRAMEBUFFER, 0);
        self.gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, 0);
    }

    fn submit_texture(&self, eye: VREye) -> u32 {
        self.eyes[eye.index()].resolve_texture
    }

    fn blit_to_window(&mut self, eye: VREye, dst: (i32, i32, i32, i32)) {
        let buffers = &self.eyes[eye.index()];
        let (w, h) = (self.width as i32, self.height as i32);
        self.gl.bind_framebuffer(gl::READ_FRAMEBUFFER, buffers.resolve_fbo);
        self.gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, 0);
        self.gl.blit_framebuffer(
            0,
            0,
            w,
            h,
            dst.0,
            dst.1,
            dst.2,
            dst.3,
            gl::COLOR_BUFFER_BIT,
            gl::LINEAR,
        );
        self.gl.bind_framebuffer(gl::READ_FRAMEBUFFER, 0);
    }
}

impl Drop for GlStereoTargets {
    fn drop(&mut self) {
        for buffers in &self.eyes {
            if buffers.resolve_fbo != buffers.render_fbo {
                self.gl.delete_framebuffers(&[buffers.resolve_fbo]);
            }
            self.gl.delete_framebuffers(&[buffers.render_fbo]);
            self.gl.delete_textures(&[buffers.resolve_texture]);
            if buffers.color_buffer != 0 {
                self.gl.delete_renderbuffers(&[buffers.color_buffer]);
            }
            self.gl.delete_renderbuffers(&[buffers.depth_buffer]);
        }
    }
}
