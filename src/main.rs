// SPDX-License-Identifier: MPL-2.0

//! Realtime weather widget using the Wayland layer-shell protocol.
//!
//! The widget is a borderless, always-on-top overlay showing the current
//! condition icon and text. It can be dragged anywhere with the left button;
//! a double-click opens the detailed forecast page. A tray icon restores the
//! window and quits the application.
//!
//! Everything runs on one calloop event loop:
//!
//! ```text
//! Wayland socket ─┐
//! refresh timer ──┼──▶ EventLoop<WeatherWidget> ──▶ draw / persist / exit
//! fetch results ──┤
//! tray + signals ─┘
//! ```

mod config;
mod i18n;
mod tray;
mod widget;

use config::{SettingsStore, WidgetConfig, WindowGeometry};
use tray::{CommandSink, TrayCommand, TrayHandle, TrayLabels};
use widget::icons::{ICON_DIR, TRAY_ICON_CODE};
use widget::pointer::{ClickTracker, DragTracker, BTN_LEFT};
use widget::refresh::{FetchResult, REFRESH_INTERVAL};
use widget::renderer::{render_widget, RenderParams};
use widget::weather::forecast_page_url;
use widget::{DisplayModel, IconResolver, QWeatherClient, RefreshController};
use std::fs::OpenOptions;

use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_layer, delegate_output, delegate_registry, delegate_shm,
    delegate_seat, delegate_pointer,
    output::{OutputHandler, OutputState},
    reexports::{
        calloop::{
            channel,
            timer::{TimeoutAction, Timer},
            EventLoop,
        },
        calloop_wayland_source::WaylandSource,
    },
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{Capability, SeatHandler, SeatState},
    seat::pointer::{PointerHandler, PointerEvent, PointerEventKind},
    shell::{
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
        WaylandSurface,
    },
    shm::{slot::SlotPool, Shm, ShmHandler},
};
use wayland_client::{
    globals::registry_queue_init,
    protocol::{wl_callback, wl_output, wl_pointer, wl_seat, wl_shm, wl_surface},
    Connection, Dispatch, QueueHandle,
};

const LAYER_NAMESPACE: &str = "weather-widget";

struct WeatherWidget {
    registry_state: RegistryState,
    output_state: OutputState,
    compositor_state: CompositorState,
    shm_state: Shm,
    layer_shell: LayerShell,
    seat_state: SeatState,
    qh: QueueHandle<Self>,

    /// The overlay surface; `None` while hidden
    layer_surface: Option<LayerSurface>,
    /// Set once the compositor has configured the current surface
    configured: bool,

    /// Memory pool for rendering
    pool: Option<SlotPool>,

    /// Configuration
    config: WidgetConfig,
    settings: SettingsStore,
    /// Current on-screen rectangle, persisted on exit
    geometry: WindowGeometry,

    /// Weather state
    display: DisplayModel,
    icons: IconResolver,
    refresh: RefreshController,

    tray: Option<TrayHandle>,

    /// Pointer gestures
    pointer: Option<wl_pointer::WlPointer>,
    drag: DragTracker,
    clicks: ClickTracker,

    /// Exit flag
    exit: bool,
}

impl CompositorHandler for WeatherWidget {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    /// Content only changes on refresh, so no frame callbacks are requested.
    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for WeatherWidget {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }
}

impl LayerShellHandler for WeatherWidget {
    fn closed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _layer: &LayerSurface,
    ) {
        log::info!("Layer surface closed by compositor");
        self.shutdown();
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        log::debug!("Layer surface configured: {:?}", configure.new_size);
        self.configured = true;
        self.draw();
    }
}

impl SeatHandler for WeatherWidget {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {}

    fn new_capability(&mut self, _conn: &Connection, qh: &QueueHandle<Self>, seat: wl_seat::WlSeat, capability: Capability) {
        if capability == Capability::Pointer && self.pointer.is_none() {
            match self.seat_state.get_pointer(qh, &seat) {
                Ok(pointer) => self.pointer = Some(pointer),
                Err(e) => log::warn!("Failed to get pointer: {}", e),
            }
        }
    }

    fn remove_capability(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat, capability: Capability) {
        if capability == Capability::Pointer {
            if let Some(pointer) = self.pointer.take() {
                pointer.release();
            }
            self.drag.release();
        }
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {}
}

impl PointerHandler for WeatherWidget {
    fn pointer_frame(
        &mut self,
        conn: &Connection,
        _qh: &QueueHandle<Self>,
        _pointer: &wl_pointer::WlPointer,
        events: &[PointerEvent],
    ) {
        // Only the latest position of a run of motions matters
        let mut motion = None;

        for event in events {
            if let PointerEventKind::Motion { .. } = event.kind {
                motion = Some(event.position);
                continue;
            }
            if let Some(position) = motion.take() {
                self.drag_to(conn, position);
            }

            match event.kind {
                PointerEventKind::Press { button, time, .. } if button == BTN_LEFT => {
                    if self.clicks.press(time, event.position) {
                        self.drag.release();
                        self.open_forecast_page();
                    } else {
                        self.drag.press(event.position);
                    }
                }
                PointerEventKind::Release { button, .. } if button == BTN_LEFT => {
                    if self.drag.is_dragging() {
                        log::debug!("Drag finished at ({}, {})", self.geometry.x, self.geometry.y);
                    }
                    self.drag.release();
                }
                PointerEventKind::Leave { .. } => {
                    self.drag.release();
                }
                _ => {}
            }
        }

        if let Some(position) = motion {
            self.drag_to(conn, position);
        }
    }
}

/// User data of the sync request that follows a margin change.
struct MarginApplied {
    offset: (i32, i32),
}

impl Dispatch<wl_callback::WlCallback, MarginApplied> for WeatherWidget {
    fn event(
        state: &mut Self,
        _callback: &wl_callback::WlCallback,
        event: wl_callback::Event,
        data: &MarginApplied,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_callback::Event::Done { .. } = event {
            state.drag.applied(data.offset);
        }
    }
}

impl ShmHandler for WeatherWidget {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm_state
    }
}

impl WeatherWidget {
    fn new(
        globals: &wayland_client::globals::GlobalList,
        qh: &QueueHandle<Self>,
        config: WidgetConfig,
        settings: SettingsStore,
        icons: IconResolver,
        refresh: RefreshController,
        tray: Option<TrayHandle>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let registry_state = RegistryState::new(globals);
        let output_state = OutputState::new(globals, qh);
        let compositor_state = CompositorState::bind(globals, qh)?;
        let shm_state = Shm::bind(globals, qh)?;
        let layer_shell = LayerShell::bind(globals, qh)?;
        let seat_state = SeatState::new(globals, qh);

        let geometry = config.initial_geometry();

        Ok(Self {
            registry_state,
            output_state,
            compositor_state,
            shm_state,
            layer_shell,
            seat_state,
            qh: qh.clone(),
            layer_surface: None,
            configured: false,
            pool: None,
            config,
            settings,
            geometry,
            display: DisplayModel::new(),
            icons,
            refresh,
            tray,
            pointer: None,
            drag: DragTracker::default(),
            clicks: ClickTracker::default(),
            exit: false,
        })
    }

    /// Map the overlay at the current geometry. No-op if already shown.
    fn show(&mut self) {
        if self.layer_surface.is_some() {
            return;
        }

        let surface = self.compositor_state.create_surface(&self.qh);
        let layer_surface = self.layer_shell.create_layer_surface(
            &self.qh,
            surface,
            Layer::Top,
            Some(LAYER_NAMESPACE),
            None,
        );

        layer_surface.set_anchor(Anchor::TOP | Anchor::LEFT);
        layer_surface.set_size(self.geometry.width, self.geometry.height);
        layer_surface.set_exclusive_zone(-1);
        log::debug!("Showing widget at {}", self.geometry);
        layer_surface.set_margin(self.geometry.y, 0, 0, self.geometry.x);
        layer_surface.set_keyboard_interactivity(KeyboardInteractivity::None);
        layer_surface.commit();

        self.layer_surface = Some(layer_surface);
        self.configured = false;
    }

    fn hide(&mut self) {
        if self.layer_surface.take().is_some() {
            log::debug!("Widget hidden");
        }
        self.configured = false;
        self.drag.release();
    }

    fn drag_to(&mut self, conn: &Connection, position: (f64, f64)) {
        let Some(offset) = self.drag.motion(position) else {
            return;
        };
        self.geometry = self.geometry.translate(offset.0, offset.1);

        match &self.layer_surface {
            Some(layer_surface) => {
                layer_surface.set_margin(self.geometry.y, 0, 0, self.geometry.x);
                layer_surface.commit();
                // Events after the sync reply see the surface at its new position
                conn.display().sync(&self.qh, MarginApplied { offset });
            }
            None => self.drag.applied(offset),
        }
    }

    fn open_forecast_page(&self) {
        let url = forecast_page_url(&self.config.location);
        log::info!("Opening forecast page {}", url);

        if let Err(e) = std::process::Command::new("xdg-open").arg(&url).spawn() {
            log::error!("Failed to launch browser: {}", e);
        }
    }

    fn draw(&mut self) {
        let Some(layer_surface) = &self.layer_surface else {
            return;
        };
        if !self.configured {
            return;
        }

        let width = self.geometry.width as i32;
        let height = self.geometry.height as i32;
        let stride = width * 4;

        if self.pool.is_none() {
            match SlotPool::new((stride * height) as usize, &self.shm_state) {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => {
                    log::error!("Failed to create shm pool: {}", e);
                    return;
                }
            }
        }
        let Some(pool) = self.pool.as_mut() else {
            return;
        };

        let (buffer, canvas) = match pool.create_buffer(width, height, stride, wl_shm::Format::Argb8888) {
            Ok(created) => created,
            Err(e) => {
                log::error!("Failed to create buffer: {}", e);
                return;
            }
        };

        let text = self.display.text();
        let params = RenderParams {
            width,
            height,
            text: &text,
            icon: self.display.icon(),
            stale: self.display.is_stale(),
        };
        if let Err(e) = render_widget(canvas, params) {
            log::error!("Rendering failed, skipping frame: {}", e);
            return;
        }

        let surface = layer_surface.wl_surface();
        surface.attach(Some(buffer.wl_buffer()), 0, 0);
        surface.damage_buffer(0, 0, width, height);
        surface.commit();

        log::trace!("Frame committed");
    }

    fn on_fetch_result(&mut self, result: FetchResult) {
        self.refresh.on_result(result, &mut self.display, &mut self.icons);
        log::debug!("Display now {:?}", self.display.visible());
        self.update_tray_tooltip();
        self.draw();
    }

    fn update_tray_tooltip(&self) {
        let Some(tray) = &self.tray else {
            return;
        };

        let body = match (self.display.snapshot(), self.display.updated_at()) {
            (Some(snapshot), _) if self.display.is_stale() => fl!(
                "tray-tooltip-stale",
                condition = snapshot.display_text().replace('\n', " ")
            ),
            (Some(snapshot), Some(updated)) => fl!(
                "tray-tooltip",
                condition = snapshot.display_text().replace('\n', " "),
                time = updated.format("%H:%M").to_string()
            ),
            _ => fl!("tray-no-data"),
        };
        tray.set_tooltip(body);
    }

    fn handle_command(&mut self, command: TrayCommand) {
        match command {
            TrayCommand::Restore => {
                self.show();
            }
            TrayCommand::Quit => {
                self.shutdown();
            }
        }
    }

    /// Persist geometry, hide the tray and stop the loop. Safe to call twice.
    fn shutdown(&mut self) {
        if self.exit {
            return;
        }

        if let Err(e) = self.settings.store_geometry(&self.geometry) {
            log::error!("Failed to save window geometry: {}", e);
        }
        if let Some(tray) = self.tray.take() {
            tray.hide();
        }
        self.hide();
        self.exit = true;
    }
}

delegate_compositor!(WeatherWidget);
delegate_output!(WeatherWidget);
delegate_shm!(WeatherWidget);
delegate_seat!(WeatherWidget);
delegate_pointer!(WeatherWidget);
delegate_layer!(WeatherWidget);

delegate_registry!(WeatherWidget);

impl ProvidesRegistryState for WeatherWidget {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }
    registry_handlers![OutputState, SeatState];
}

/// Log to `~/.cache/weather-widget/weather-widget.log`, or stderr if the
/// file cannot be opened.
fn init_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    let log_file = dirs::cache_dir().and_then(|dir| {
        let dir = dir.join("weather-widget");
        std::fs::create_dir_all(&dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("weather-widget.log"))
            .ok()
    });

    if let Some(file) = log_file {
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Ignore SIGPIPE so a closed socket becomes a normal EPIPE result, not a signal
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }

    init_logging();
    log::info!("Starting weather widget");

    let requested_languages = i18n_embed::DesktopLanguageRequester::requested_languages();
    i18n::init(&requested_languages);

    let settings = SettingsStore::open(SettingsStore::locate())?;
    let config = settings.widget_config();
    log::info!(
        "Settings loaded from {}: location={}, API key set: {}",
        settings.path().display(),
        config.location,
        !config.api_key.is_empty()
    );

    let conn = Connection::connect_to_env()?;
    let (globals, event_queue) = registry_queue_init(&conn)?;
    let qh = event_queue.handle();
    log::info!("Connected to Wayland server");

    let mut event_loop: EventLoop<WeatherWidget> = EventLoop::try_new()?;
    let loop_handle = event_loop.handle();
    WaylandSource::new(conn.clone(), event_queue)
        .insert(loop_handle.clone())
        .map_err(|e| e.error)?;

    // Tray menu and termination signals both arrive as commands
    let (command_tx, command_rx) = channel::channel::<TrayCommand>();
    loop_handle
        .insert_source(command_rx, |event, _, widget| {
            if let channel::Event::Msg(command) = event {
                widget.handle_command(command);
            }
        })
        .map_err(|e| e.error)?;

    let signal_tx = command_tx.clone();
    ctrlc::set_handler(move || {
        log::info!("Termination signal received");
        let _ = signal_tx.send(TrayCommand::Quit);
    })?;

    // Fetch results from the worker thread
    let (result_tx, result_rx) = channel::channel::<FetchResult>();
    loop_handle
        .insert_source(result_rx, |event, _, widget| {
            if let channel::Event::Msg(result) = event {
                widget.on_fetch_result(result);
            }
        })
        .map_err(|e| e.error)?;

    let client = QWeatherClient::new(&config)?;
    let refresh = RefreshController::spawn(client, move |result| {
        if result_tx.send(result).is_err() {
            log::debug!("Event loop gone, dropping fetch result");
        }
    })?;

    loop_handle
        .insert_source(Timer::from_duration(REFRESH_INTERVAL), |_, _, widget| {
            widget.refresh.tick();
            TimeoutAction::ToDuration(widget.refresh.interval())
        })
        .map_err(|e| e.error)?;

    let mut icons = IconResolver::new(ICON_DIR);
    let tray_icon = icons.resolve(TRAY_ICON_CODE);
    let sink: CommandSink = Box::new(move |command| {
        let _ = command_tx.send(command);
    });
    let labels = TrayLabels {
        title: fl!("app-title"),
        restore: fl!("menu-restore"),
        quit: fl!("menu-quit"),
    };
    let tray = match TrayHandle::spawn(labels, &tray_icon, sink) {
        Ok(tray) => Some(tray),
        Err(e) => {
            log::warn!("Tray icon unavailable: {}", e);
            None
        }
    };

    let mut widget = WeatherWidget::new(&globals, &qh, config, settings, icons, refresh, tray)?;
    widget.update_tray_tooltip();
    widget.refresh.tick();

    // Without a tray there would be no way to restore a hidden window
    if widget.tray.is_none() {
        widget.show();
    }

    log::info!("Widget initialized, entering main loop");
    while !widget.exit {
        event_loop.dispatch(None, &mut widget)?;
    }

    log::info!("Exit requested, shutting down");
    Ok(())
}
