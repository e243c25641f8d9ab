mod renderer;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use glam::Vec2;
use renderer::Renderer;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wgpu::{self, SurfaceError};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalPosition, PhysicalPosition},
    event::{ElementState, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorIcon, Window, WindowAttributes},
};

use crate::{
    config::Configuration,
    events::{GalleryCommand, GalleryLoaded, GestureEvent, GestureStatus},
    gallery::{Gallery, Viewport, layout::LayoutKind, scene::SceneComposer},
    tasks::gesture::GestureSession,
};

/// Browser-style pixels per wheel line.
const WHEEL_LINE_PX: f32 = 100.0;
/// A touch that moves less than this (physical px) is a tap.
const TAP_SLOP_PX: f64 = 8.0; // logical px
const GESTURE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
enum ViewerEvent {
    Cancelled,
}

type LoadedReceiver = mpsc::Receiver<GalleryLoaded>;

struct ActiveTouch {
    id: u64,
    start: LogicalPosition<f64>,
    moved: bool,
}

struct GestureLink {
    session: GestureSession,
    inbox: GestureInbox,
}

/// Receiving end of a gesture session. Closed once the session's task exits.
struct GestureInbox {
    events: Option<mpsc::Receiver<GestureEvent>>,
}

impl GestureInbox {
    fn new(events: mpsc::Receiver<GestureEvent>) -> Self {
        Self {
            events: Some(events),
        }
    }

    fn next_event(&mut self) -> Option<GestureEvent> {
        let events = self.events.as_mut()?;
        match events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                debug!("gesture session finished");
                self.events = None;
                None
            }
        }
    }
}

struct ViewerApp {
    cfg: Configuration,
    cancel: CancellationToken,
    runtime: Handle,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    surface_config: Option<wgpu::SurfaceConfiguration>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    renderer: Option<Renderer>,
    gallery: Gallery,
    composer: SceneComposer,
    from_loader: LoadedReceiver,
    pending_gallery: Option<GalleryLoaded>,
    gesture: Option<GestureLink>,
    gesture_status: GestureStatus,
    pointer: Vec2,
    hovered: Option<usize>,
    touch: Option<ActiveTouch>,
    title: String,
}

impl ViewerApp {
    fn new(
        cfg: Configuration,
        cancel: CancellationToken,
        runtime: Handle,
        from_loader: LoadedReceiver,
    ) -> Self {
        let gallery = Gallery::new(&cfg.viewer, cfg.gesture.drag_timeout, Instant::now());
        let composer = SceneComposer::new(cfg.viewer.particle_seed);
        Self {
            cfg,
            cancel,
            runtime,
            window: None,
            surface: None,
            surface_config: None,
            device: None,
            queue: None,
            renderer: None,
            gallery,
            composer,
            from_loader,
            pending_gallery: None,
            gesture: None,
            gesture_status: GestureStatus::Idle,
            pointer: Vec2::ZERO,
            hovered: None,
            touch: None,
            title: String::new(),
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let attrs = WindowAttributes::default().with_title(self.cfg.viewer.title.clone());
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                None
            }
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no supported formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("viewer-device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            ..Default::default()
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "viewer surface configured",
        );

        let renderer = Renderer::new(&device, format, config.width, config.height);

        self.surface = Some(surface);
        self.surface_config = Some(config);
        self.device = Some(device);
        self.queue = Some(queue);
        self.renderer = Some(renderer);

        if let Some(loaded) = self.pending_gallery.take() {
            self.install_gallery(loaded);
        }
        Ok(())
    }

    fn handle_resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        let (Some(surface), Some(device), Some(config)) = (
            self.surface.as_ref(),
            self.device.as_ref(),
            self.surface_config.as_mut(),
        ) else {
            return;
        };

        config.width = new_size.width.max(1);
        config.height = new_size.height.max(1);
        surface.configure(device, config);
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.resize(device, config.width, config.height);
        }
        debug!(
            width = config.width,
            height = config.height,
            "viewer surface resized",
        );
        self.request_redraw();
    }

    fn viewport(&self) -> Viewport {
        match self.surface_config.as_ref() {
            Some(config) => Viewport::new(config.width, config.height),
            None => self
                .window
                .as_ref()
                .map(|w| {
                    let size = w.inner_size();
                    Viewport::new(size.width, size.height)
                })
                .unwrap_or(Viewport::new(1, 1)),
        }
    }

    fn scale_factor(&self) -> f64 {
        self.window.as_ref().map_or(1.0, |w| w.scale_factor())
    }

    /// Window size in logical pixels, used for the compact breakpoint.
    fn logical_viewport(&self) -> Viewport {
        self.viewport().to_logical(self.scale_factor())
    }

    fn install_gallery(&mut self, loaded: GalleryLoaded) {
        let (Some(device), Some(queue), Some(renderer)) = (
            self.device.as_ref(),
            self.queue.as_ref(),
            self.renderer.as_mut(),
        ) else {
            self.pending_gallery = Some(loaded);
            return;
        };
        renderer.upload_gallery(device, queue, &loaded.images);
        self.gallery
            .set_items(loaded.images.iter().map(|img| (img.width, img.height)));
        self.hovered = None;
    }

    fn drain_loader(&mut self) {
        loop {
            match self.from_loader.try_recv() {
                Ok(loaded) => {
                    info!(count = loaded.images.len(), "gallery images received");
                    self.install_gallery(loaded);
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    fn drain_gesture(&mut self) {
        let Some(link) = self.gesture.as_mut() else {
            return;
        };
        while let Some(event) = link.inbox.next_event() {
            match event {
                GestureEvent::Status(status) => {
                    if status != self.gesture_status {
                        info!(%status, "gesture status changed");
                    }
                    self.gesture_status = status;
                }
                GestureEvent::Scroll { delta, at } => {
                    self.gallery.gesture_scroll(delta, at);
                }
            }
        }
    }

    fn apply(&mut self, cmd: GalleryCommand) {
        self.gallery.apply(cmd);
        if cmd == GalleryCommand::ToggleCamera {
            self.sync_gesture_session();
        }
    }

    /// Start or stop the gesture adapter so it matches the camera toggle.
    fn sync_gesture_session(&mut self) {
        match (self.gallery.camera_enabled(), self.gesture.is_some()) {
            (true, false) => {
                let (tx, rx) = mpsc::channel(GESTURE_CHANNEL_CAPACITY);
                let session = GestureSession::connect(&self.runtime, &self.cfg.gesture, tx, &self.cancel);
                self.gesture = Some(GestureLink {
                    session,
                    inbox: GestureInbox::new(rx),
                });
                self.gesture_status = GestureStatus::Loading;
            }
            (false, true) => {
                if let Some(link) = self.gesture.take() {
                    drop(link.session.stop());
                }
                self.gesture_status = GestureStatus::Idle;
            }
            _ => {}
        }
    }

    fn update_pointer(&mut self, position: PhysicalPosition<f64>) {
        self.pointer = self.viewport().normalize(position.x, position.y);
    }

    fn click_at_pointer(&mut self) {
        if let Some(index) = self.gallery.pick_at(self.pointer) {
            self.apply(GalleryCommand::Select(index));
        }
    }

    fn handle_touch(&mut self, touch: Touch) {
        let scale = self.scale_factor();
        let logical = touch.location.to_logical::<f64>(scale);
        let y = logical.y as f32;
        match touch.phase {
            TouchPhase::Started => {
                if self.touch.is_some() {
                    return;
                }
                self.touch = Some(ActiveTouch {
                    id: touch.id,
                    start: logical,
                    moved: false,
                });
                self.update_pointer(touch.location);
                self.gallery.touch_start(y);
            }
            TouchPhase::Moved => {
                let Some(active) = self.touch.as_mut().filter(|t| t.id == touch.id) else {
                    return;
                };
                let dx = logical.x - active.start.x;
                let dy = logical.y - active.start.y;
                if dx.hypot(dy) > TAP_SLOP_PX {
                    active.moved = true;
                }
                self.gallery.touch_move(y);
            }
            TouchPhase::Ended | TouchPhase::Cancelled => {
                let Some(active) = self.touch.take_if(|t| t.id == touch.id) else {
                    return;
                };
                self.gallery.touch_end();
                if touch.phase == TouchPhase::Ended && !active.moved {
                    self.update_pointer(touch.location);
                    self.click_at_pointer();
                }
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        let slot = match code {
            KeyCode::Digit1 => Some(1),
            KeyCode::Digit2 => Some(2),
            KeyCode::Digit3 => Some(3),
            KeyCode::Digit4 => Some(4),
            _ => None,
        };
        if let Some(kind) = slot.and_then(LayoutKind::from_selector_slot) {
            self.apply(GalleryCommand::SelectLayout(kind));
            return;
        }
        match code {
            KeyCode::Escape if self.gallery.is_focused() => self.apply(GalleryCommand::CloseFocus),
            KeyCode::KeyC => self.apply(GalleryCommand::ToggleCamera),
            _ => {}
        }
    }

    fn status_title(&self) -> String {
        let layout = self.gallery.layout();
        let focus = match self.gallery.focused_index() {
            Some(index) => format!("photo {}/{}", index + 1, self.gallery.len()),
            None => format!("{} photos", self.gallery.len()),
        };
        let camera = if self.gallery.camera_enabled() {
            format!("gesture {}", self.gesture_status)
        } else {
            "camera off".to_string()
        };
        format!(
            "{} | {} {} | {} | {}",
            self.cfg.viewer.title,
            layout.glyph(),
            layout,
            focus,
            camera
        )
    }

    fn refresh_chrome(&mut self) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let title = self.status_title();
        if title != self.title {
            window.set_title(&title);
            self.title = title;
        }

        let hovered = self.gallery.pick_at(self.pointer);
        if hovered.is_some() != self.hovered.is_some() {
            window.set_cursor(if hovered.is_some() {
                CursorIcon::Pointer
            } else {
                CursorIcon::Default
            });
        }
        self.hovered = hovered;
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        self.drain_loader();
        self.drain_gesture();

        let viewport = self.logical_viewport();
        self.gallery.tick(Instant::now(), viewport, self.pointer);
        let compact = self.gallery.is_compact(viewport);
        let snapshot = self
            .composer
            .compose(&self.gallery, self.gallery.camera(), compact);
        self.refresh_chrome();

        let (Some(surface), Some(device), Some(queue), Some(renderer)) = (
            self.surface.as_ref(),
            self.device.as_ref(),
            self.queue.as_ref(),
            self.renderer.as_mut(),
        ) else {
            return;
        };
        if let Some(field) = self.composer.take_particle_update() {
            renderer.upload_particles(device, field);
        }

        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("viewer surface lost; reconfiguring");
                if let Some(window) = self.window.clone() {
                    self.handle_resize(window.inner_size());
                }
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("viewer surface out of memory; exiting event loop");
                event_loop.exit();
                return;
            }
            Err(SurfaceError::Timeout) => {
                warn!("viewer surface acquisition timed out");
                return;
            }
            Err(SurfaceError::Other) => {
                warn!("viewer surface reported an unknown error; retrying");
                if let Some(window) = self.window.clone() {
                    self.handle_resize(window.inner_size());
                }
                return;
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("viewer-encoder"),
        });
        renderer.render(queue, &mut encoder, &view, &snapshot);
        queue.submit(std::iter::once(encoder.finish()));
        frame.present();
    }

    fn request_redraw(&self) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(link) = self.gesture.take() {
            drop(link.session.stop());
        }
        event_loop.exit();
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.device.is_none() {
            if let Err(err) = self.init_gpu(window) {
                error!(error = ?err, "failed to initialize GPU state");
                event_loop.exit();
                return;
            }
            if self.cfg.gesture.enabled && !self.gallery.camera_enabled() {
                self.apply(GalleryCommand::ToggleCamera);
            }
        }

        self.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.handle_resize(size);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.update_pointer(position);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                // Positive means "scroll down", matching DOM wheel events.
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y * WHEEL_LINE_PX,
                    MouseScrollDelta::PixelDelta(pos) => {
                        -(pos.to_logical::<f64>(self.scale_factor()).y as f32)
                    }
                };
                self.gallery.wheel(delta_y);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                self.click_at_pointer();
            }
            WindowEvent::Touch(touch) => {
                self.handle_touch(touch);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(code) = event.physical_key {
                        self.handle_key(code);
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // The scene animates every frame.
        self.request_redraw();
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                self.shutdown(event_loop);
            }
        }
    }
}

pub fn run_windowed(
    from_loader: LoadedReceiver,
    cancel: CancellationToken,
    cfg: Configuration,
) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    let proxy = event_loop.create_proxy();
    let runtime = Handle::try_current().context("viewer must run inside a tokio runtime")?;

    let cancel_task = {
        let cancel = cancel.clone();
        runtime.spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };

    let mut app = ViewerApp::new(cfg, cancel, runtime, from_loader);
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();

    run_result.context("viewer event loop failed")
}
