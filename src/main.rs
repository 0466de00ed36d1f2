use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use clap::Parser;
#[cfg(feature = "gui")]
use eframe::egui;

use padseq::logging::{self, target};
use padseq::sequencer::editor::Expression;
use padseq::{
    midi, midi_note_name, Color, ControlEvent, ControllerInput, ControllerOutput, Event, LedSink,
    LedTarget, MemoryHost, NotePreview, RecordingLeds, Settings, StepSequencer, TickClock,
};

#[derive(Parser, Debug)]
#[command(name = "padseq", about = "Grid step sequencer for the APC40 mkII")]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = "padseq.toml")]
    config: PathBuf,

    /// Print the available MIDI ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Run without the mirror window
    #[arg(long)]
    headless: bool,
}

/// Sends every LED write to the controller and to the mirror.
struct MirroredLeds {
    output: ControllerOutput,
    mirror: Arc<Mutex<RecordingLeds>>,
}

impl LedSink for MirroredLeds {
    fn set_led(&mut self, target: LedTarget, color: Color) {
        self.output.set_led(target, color);
        if let Ok(mut mirror) = self.mirror.lock() {
            mirror.set_led(target, color);
        }
    }

    fn set_ring(&mut self, knob: usize, value: u8) {
        self.output.set_ring(knob, value);
        if let Ok(mut mirror) = self.mirror.lock() {
            mirror.set_ring(knob, value);
        }
    }
}

/// Single consumer of the event queue: the built-in transport, the sequencer
/// and the preview voice all live on this thread.
struct Engine {
    host: MemoryHost,
    sequencer: StepSequencer,
    leds: MirroredLeds,
    preview: NotePreview,
    tick_seconds: f64,
}

impl Engine {
    fn run(mut self, events: Receiver<Event>) {
        while let Ok(event) = events.recv() {
            match event {
                Event::Tick => self.on_tick(),
                Event::Control(ControlEvent::Play) => {
                    self.host.toggle_play();
                    if !self.host.is_playing() {
                        self.preview.stop_note();
                    }
                    tracing::info!(target: target::SESSION, "Transport {}", if self.host.is_playing() { "started" } else { "stopped" });
                }
                Event::Control(control) => {
                    self.sequencer.handle(control, &mut self.host, &mut self.leds)
                }
                Event::Shutdown => break,
            }
        }
        self.sequencer.exit(&mut self.leds);
        self.leds.output.disconnect();
    }

    fn on_tick(&mut self) {
        for note in self.host.advance(self.tick_seconds) {
            tracing::debug!(target: target::NOTES, "Play {} vel {}", midi_note_name(note.pitch), note.velocity);
            self.preview.trigger_note(note.pitch, note.velocity);
        }
        self.sequencer.tick(&mut self.host, &mut self.leds);
    }
}

fn list_ports() {
    println!("MIDI inputs:");
    for name in midi::input_ports() {
        println!("  {}", name);
    }
    println!("MIDI outputs:");
    for name in midi::output_ports() {
        println!("  {}", name);
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.list_ports {
        list_ports();
        return ExitCode::SUCCESS;
    }

    let settings = match Settings::load(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.log.filter);

    let (sender, receiver) = channel();
    let mirror = Arc::new(Mutex::new(RecordingLeds::new()));

    let output = match ControllerOutput::connect(&settings.midi.client_name, &settings.midi.output_port) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(target: target::MIDI, "No controller output ({}), LEDs only in the mirror", e);
            ControllerOutput::disconnected()
        }
    };
    let _input = match ControllerInput::connect(&settings.midi.client_name, &settings.midi.input_port, sender.clone()) {
        Ok(input) => Some(input),
        Err(e) => {
            tracing::warn!(target: target::MIDI, "No controller input ({})", e);
            None
        }
    };

    let preview = if settings.audio.preview {
        NotePreview::new(settings.audio.volume).unwrap_or_else(|e| {
            tracing::warn!(target: target::SESSION, "Preview disabled: {}", e);
            NotePreview::silent()
        })
    } else {
        NotePreview::silent()
    };

    let mut host = MemoryHost::new();
    host.set_bpm(settings.clock.tempo);

    let mut clock = TickClock::new(Duration::from_millis(settings.clock.tick_ms));
    let engine = Engine {
        host,
        sequencer: StepSequencer::new(Expression::new(
            settings.notes.default_velocity,
            settings.notes.default_pressure,
        )),
        leds: MirroredLeds {
            output,
            mirror: Arc::clone(&mirror),
        },
        preview,
        tick_seconds: clock.period().as_secs_f64(),
    };

    clock.start(sender.clone());
    let engine_thread = thread::spawn(move || engine.run(receiver));
    tracing::info!(target: target::SESSION, "Press User to enter the step sequencer, Play to start the transport");

    let status = run_front_end(args.headless, mirror, sender.clone());

    let _ = sender.send(Event::Shutdown);
    clock.stop();
    let _ = engine_thread.join();
    status
}

#[cfg(feature = "gui")]
fn run_front_end(headless: bool, mirror: Arc<Mutex<RecordingLeds>>, events: Sender<Event>) -> ExitCode {
    if headless {
        return wait_forever();
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([720.0, 520.0])
            .with_title("padseq - APC40 mirror"),
        ..Default::default()
    };

    let result = eframe::run_native(
        "padseq",
        options,
        Box::new(move |_cc| Ok(Box::new(MirrorApp::new(mirror, events)))),
    );
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(target: target::SESSION, "Mirror window failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(feature = "gui"))]
fn run_front_end(_headless: bool, _mirror: Arc<Mutex<RecordingLeds>>, _events: Sender<Event>) -> ExitCode {
    wait_forever()
}

/// Headless mode runs until the process is interrupted.
fn wait_forever() -> ExitCode {
    loop {
        thread::park();
    }
}

#[cfg(feature = "gui")]
struct MirrorApp {
    leds: Arc<Mutex<RecordingLeds>>,
    events: Sender<Event>,
    shift: bool,
}

#[cfg(feature = "gui")]
impl MirrorApp {
    fn new(leds: Arc<Mutex<RecordingLeds>>, events: Sender<Event>) -> Self {
        Self {
            leds,
            events,
            shift: false,
        }
    }

    fn fill(color: Color) -> egui::Color32 {
        let [r, g, b] = color.rgb();
        if color.is_off() {
            egui::Color32::from_rgb(40, 40, 40)
        } else {
            egui::Color32::from_rgb(r, g, b)
        }
    }

    fn led_button(ui: &mut egui::Ui, events: &Sender<Event>, leds: &RecordingLeds, target: LedTarget, label: &str, control: ControlEvent) {
        let button = egui::Button::new(label)
            .min_size(egui::vec2(60.0, 40.0))
            .fill(Self::fill(leds.color(target)));
        if ui.add(button).clicked() {
            let _ = events.send(Event::Control(control));
        }
    }
}

#[cfg(feature = "gui")]
impl eframe::App for MirrorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint_after(Duration::from_millis(30));

        let leds = match self.leds.lock() {
            Ok(leds) => leds.clone(),
            Err(_) => return,
        };
        let events = self.events.clone();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("padseq");
            ui.add_space(10.0);

            for row in 0..padseq::sequencer::view::ROWS {
                ui.horizontal(|ui| {
                    for column in 0..padseq::sequencer::view::STEPS_PER_PAGE {
                        Self::led_button(ui, &events, &leds, LedTarget::Pad { row, column }, "", ControlEvent::Pad { row, column });
                    }
                    ui.add_space(10.0);
                    Self::led_button(ui, &events, &leds, LedTarget::Scene(row), "▶", ControlEvent::Scene(row));
                });
            }

            ui.add_space(10.0);
            ui.horizontal(|ui| {
                for track in 0..padseq::sequencer::grid::TRACK_BUTTONS {
                    Self::led_button(ui, &events, &leds, LedTarget::ClipStop(track), "■", ControlEvent::ClipStop(track));
                }
                ui.add_space(10.0);
                Self::led_button(ui, &events, &leds, LedTarget::StopAll, "Stop All", ControlEvent::StopAll);
            });
            ui.horizontal(|ui| {
                for track in 0..padseq::sequencer::grid::TRACK_BUTTONS {
                    Self::led_button(ui, &events, &leds, LedTarget::TrackSelect(track), &format!("{}", track + 1), ControlEvent::TrackSelect(track));
                }
                ui.add_space(10.0);
                Self::led_button(ui, &events, &leds, LedTarget::Master, "Master", ControlEvent::Master);
            });

            ui.add_space(10.0);
            ui.horizontal(|ui| {
                let buttons = [
                    ("◀", ControlEvent::Left),
                    ("▶", ControlEvent::Right),
                    ("▲", ControlEvent::Up),
                    ("▼", ControlEvent::Down),
                    ("Dev ◀", ControlEvent::PrevDevice),
                    ("Dev ▶", ControlEvent::NextDevice),
                    ("User", ControlEvent::User),
                    ("Play", ControlEvent::Play),
                ];
                for (label, control) in buttons {
                    if ui.button(label).clicked() {
                        let _ = events.send(Event::Control(control));
                    }
                }
                if ui.checkbox(&mut self.shift, "Shift").changed() {
                    let _ = events.send(Event::Control(ControlEvent::Shift(self.shift)));
                }
            });

            ui.separator();
            ui.label("Click pads and buttons to drive the sequencer without hardware");
        });
    }
}
