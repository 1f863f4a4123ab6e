use anyhow::Result;
use futures::executor::block_on;
use log::{debug, error};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_keyboard, delegate_layer, delegate_pointer, delegate_registry,
    delegate_seat, delegate_shm,
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        keyboard::{KeyEvent, KeyboardHandler, Keysym, Modifiers},
        pointer::{PointerEvent, PointerEventKind, PointerHandler, BTN_LEFT},
        Capability, SeatHandler, SeatState,
    },
    shell::{
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
        WaylandSurface,
    },
    shm::{slot::SlotPool, Shm, ShmHandler},
};
use std::{
    path::PathBuf,
    time::{Duration, Instant},
};
use wayland_client::{
    globals::registry_queue_init,
    protocol::{
        wl_keyboard::WlKeyboard, wl_output::Transform, wl_pointer::WlPointer, wl_seat::WlSeat,
        wl_shm, wl_surface::WlSurface,
    },
    Connection, QueueHandle,
};

use crate::{
    capture::V4lCamera,
    config::{Args, ScanConfig},
    decode::RqrrDecoder,
    report_detection,
    session::{PollOutcome, Session},
};

const MARGIN: i32 = 16;
const FPS: u64 = 30;

type CameraSession = Session<V4lCamera, RqrrDecoder>;

/// Overlay window showing whichever session surface is visible.
struct ScanWindow {
    registry_state: RegistryState,
    shm: Shm,
    seat_state: SeatState,

    pool: SlotPool,
    layer: LayerSurface,
    width: u32,
    height: u32,
    configured: bool,
    keyboard: Option<WlKeyboard>,
    pointer: Option<WlPointer>,

    exit: bool,
    last_draw: Instant,
    session: CameraSession,
    snapshot_path: Option<PathBuf>,
}

impl ScanWindow {
    pub fn draw(&mut self, qh: &QueueHandle<Self>, surface: &WlSurface) {
        self.last_draw = Instant::now();
        let (width, height) = (self.width as i32, self.height as i32);
        let (buffer, canvas) =
            match self
                .pool
                .create_buffer(width, height, width * 4, wl_shm::Format::Argb8888)
            {
                Ok(created) => created,
                Err(e) => {
                    error!("create buffer: {e}");
                    return;
                }
            };

        // premultiplied rgba to little-endian argb
        let pixmap = self.session.visible_surface().pixmap();
        canvas
            .chunks_exact_mut(4)
            .zip(pixmap.data().chunks_exact(4))
            .for_each(|(dst, src)| {
                dst.copy_from_slice(&[src[2], src[1], src[0], src[3]]);
            });

        surface.damage_buffer(0, 0, width, height);
        if let Err(e) = buffer.attach_to(surface) {
            error!("buffer attach: {e}");
            return;
        }

        // request redraw with current buffer and call frame callback
        surface.frame(qh, surface.clone());

        surface.commit();
    }

    fn reset(&mut self) {
        // failures are already reported by the session
        let _ = block_on(self.session.reset(Instant::now()));
    }
}

delegate_registry!(ScanWindow);
impl ProvidesRegistryState for ScanWindow {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }
    registry_handlers![SeatState];
}
delegate_compositor!(ScanWindow);
impl CompositorHandler for ScanWindow {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &WlSurface,
        _new_factor: i32,
    ) {
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &WlSurface,
        _new_transform: Transform,
    ) {
    }

    fn frame(&mut self, _conn: &Connection, qh: &QueueHandle<Self>, surface: &WlSurface, _time: u32) {
        let interval = Duration::from_millis(1000 / FPS);
        let elapsed = self.last_draw.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }

        self.session.refresh_live();
        if self.session.tick(Instant::now()) == Some(PollOutcome::Detected) {
            report_detection(&self.session, self.snapshot_path.as_deref());
        }
        self.draw(qh, surface);
    }
}

delegate_shm!(ScanWindow);
impl ShmHandler for ScanWindow {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}
delegate_layer!(ScanWindow);
impl LayerShellHandler for ScanWindow {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _layer: &LayerSurface) {
        self.exit = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        debug!("layer configured at {:?}", configure.new_size);
        // first configure starts the frame callback chain
        if !self.configured {
            self.configured = true;
            self.draw(qh, layer.wl_surface());
        }
    }
}
delegate_seat!(ScanWindow);
impl SeatHandler for ScanWindow {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: WlSeat) {}

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: WlSeat,
        capability: Capability,
    ) {
        if capability == Capability::Keyboard && self.keyboard.is_none() {
            match self.seat_state.get_keyboard(qh, &seat, None) {
                Ok(keyboard) => self.keyboard = Some(keyboard),
                Err(e) => error!("keyboard: {e}"),
            }
        }
        if capability == Capability::Pointer && self.pointer.is_none() {
            match self.seat_state.get_pointer(qh, &seat) {
                Ok(pointer) => self.pointer = Some(pointer),
                Err(e) => error!("pointer: {e}"),
            }
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: WlSeat,
        capability: Capability,
    ) {
        if capability == Capability::Keyboard {
            if let Some(keyboard) = self.keyboard.take() {
                keyboard.release();
            }
        }
        if capability == Capability::Pointer {
            if let Some(pointer) = self.pointer.take() {
                pointer.release();
            }
        }
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: WlSeat) {}
}

delegate_keyboard!(ScanWindow);
impl KeyboardHandler for ScanWindow {
    fn enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &WlKeyboard,
        _surface: &WlSurface,
        _serial: u32,
        _raw: &[u32],
        _keysyms: &[Keysym],
    ) {
    }

    fn leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &WlKeyboard,
        _surface: &WlSurface,
        _serial: u32,
    ) {
    }

    fn press_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &WlKeyboard,
        _serial: u32,
        event: KeyEvent,
    ) {
        if self.session.loader().blocks_keyboard() {
            return;
        }
        if event.keysym == Keysym::Escape {
            self.exit = true;
        } else if event.keysym == Keysym::r || event.keysym == Keysym::Return {
            self.reset();
        }
    }

    fn release_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &WlKeyboard,
        _serial: u32,
        _event: KeyEvent,
    ) {
    }

    fn update_modifiers(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &WlKeyboard,
        _serial: u32,
        _modifiers: Modifiers,
    ) {
    }
}
delegate_pointer!(ScanWindow);
impl PointerHandler for ScanWindow {
    fn pointer_frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _pointer: &WlPointer,
        events: &[PointerEvent],
    ) {
        let clicked = events.iter().any(|event| {
            matches!(event.kind, PointerEventKind::Release { button, .. } if button == BTN_LEFT)
        });
        if clicked {
            self.reset();
        }
    }
}

pub fn run(args: &Args) -> Result<()> {
    let conn = Connection::connect_to_env()?;
    let (globals, mut event_queue) = registry_queue_init::<ScanWindow>(&conn)?;
    let qh = event_queue.handle();

    let registry_state = RegistryState::new(&globals);
    let compositor = CompositorState::bind(&globals, &qh)?;
    let layer_shell = LayerShell::bind(&globals, &qh)?;
    let shm = Shm::bind(&globals, &qh)?;
    let seat_state = SeatState::new(&globals, &qh);

    let config = ScanConfig::from(args);
    let (width, height) = (config.constraints.width, config.constraints.height);
    let pool = SlotPool::new((width * height * 4) as usize, &shm)?;

    let surface = compositor.create_surface(&qh);
    let layer =
        layer_shell.create_layer_surface(&qh, surface, Layer::Overlay, Some("qrcam"), None);
    layer.set_anchor(Anchor::TOP | Anchor::RIGHT);
    layer.set_margin(MARGIN, MARGIN, 0, 0);
    layer.set_size(width, height);
    layer.set_keyboard_interactivity(KeyboardInteractivity::OnDemand);
    layer.commit();

    let mut session = Session::new(V4lCamera::new(args.device), RqrrDecoder, config)?;
    // a failed start is reported by the session and leaves the window idle
    let _ = block_on(session.start(Instant::now()));

    let mut window = ScanWindow {
        registry_state,
        shm,
        seat_state,

        pool,
        layer,
        width,
        height,
        configured: false,
        keyboard: None,
        pointer: None,

        exit: false,
        last_draw: Instant::now(),
        session,
        snapshot_path: args.snapshot.clone(),
    };

    loop {
        event_queue.blocking_dispatch(&mut window)?;
        if window.exit {
            break;
        }
    }
    debug!("closing {:?}", window.layer.wl_surface());

    Ok(())
}
